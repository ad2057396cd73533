use std::sync::Arc;

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use dealflow_core::assignment::{normalize_key, AssignmentBook, RouteRule};
use dealflow_core::domain::assignment::{AssignmentId, BrandAssignment, RouteAssignment};
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};

use crate::repositories::assignment;
use crate::services::{ensure_role, new_id, ServiceError};
use crate::DbPool;

/// Maintenance of the brand and route assignment tables. Changes apply to
/// items resolved after the write; existing assignees are never touched.
pub struct AssignmentService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
}

impl AssignmentService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { pool, roles }
    }

    /// Points a brand at a procurement specialist. Re-pointing an existing
    /// brand updates the row in place; writing the same owner again is a
    /// no-op that returns the stored row.
    pub async fn upsert_brand_assignment(
        &self,
        org_id: &OrgId,
        brand: &str,
        user_id: &UserId,
        actor: &UserId,
    ) -> Result<BrandAssignment, ServiceError> {
        ensure_role(self.roles.as_ref(), org_id, actor, Role::Procurement, "assign a brand")?;
        let brand = normalized_value(brand, "brand")?;

        let mut tx = self.pool.begin().await?;
        let existing = assignment::list_brand_assignments(&mut *tx, org_id)
            .await?
            .into_iter()
            .find(|row| normalize_key(&row.brand) == brand);

        if let Some(row) = existing {
            if row.user_id == *user_id {
                tx.commit().await?;
                return Ok(row);
            }
        }

        let now = Utc::now();
        let record = BrandAssignment {
            id: AssignmentId(new_id("asg")),
            org_id: org_id.clone(),
            brand,
            user_id: user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        assignment::upsert_brand_assignment(&mut *tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            org_id = %org_id.0,
            brand = %record.brand,
            user_id = %user_id.0,
            "brand assignment upserted"
        );
        Ok(record)
    }

    /// Points a route pattern at a logistics specialist. Patterns may carry
    /// `*` wildcards; resolution specificity is decided at lookup time, so
    /// overlapping patterns are accepted here.
    pub async fn upsert_route_assignment(
        &self,
        org_id: &OrgId,
        pattern: &str,
        user_id: &UserId,
        actor: &UserId,
    ) -> Result<RouteAssignment, ServiceError> {
        ensure_role(self.roles.as_ref(), org_id, actor, Role::Logistics, "assign a route")?;
        let pattern = normalized_value(pattern, "pattern")?;
        if pattern.chars().all(|ch| ch == '*') {
            return Err(DomainError::validation(
                "route pattern must contain at least one literal character",
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let existing = assignment::list_route_assignments(&mut *tx, org_id)
            .await?
            .into_iter()
            .find(|row| normalize_key(&row.pattern) == pattern);

        if let Some(row) = existing {
            if row.user_id == *user_id {
                tx.commit().await?;
                return Ok(row);
            }
        }

        let now = Utc::now();
        let record = RouteAssignment {
            id: AssignmentId(new_id("asg")),
            org_id: org_id.clone(),
            pattern,
            user_id: user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        assignment::upsert_route_assignment(&mut *tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            org_id = %org_id.0,
            pattern = %record.pattern,
            user_id = %user_id.0,
            "route assignment upserted"
        );
        Ok(record)
    }

    pub async fn list_brand_assignments(
        &self,
        org_id: &OrgId,
    ) -> Result<Vec<BrandAssignment>, ServiceError> {
        Ok(assignment::list_brand_assignments(&self.pool, org_id).await?)
    }

    pub async fn list_route_assignments(
        &self,
        org_id: &OrgId,
    ) -> Result<Vec<RouteAssignment>, ServiceError> {
        Ok(assignment::list_route_assignments(&self.pool, org_id).await?)
    }
}

/// Snapshot of one organization's assignment tables, read inside the
/// caller's transaction so a quote write and its resolution agree.
pub(crate) async fn load_assignment_book(
    tx: &mut Transaction<'_, Sqlite>,
    org_id: &OrgId,
) -> Result<AssignmentBook, ServiceError> {
    let brands = assignment::list_brand_assignments(&mut **tx, org_id)
        .await?
        .into_iter()
        .map(|row| (row.brand, row.user_id))
        .collect();
    let routes = assignment::list_route_assignments(&mut **tx, org_id)
        .await?
        .into_iter()
        .map(|row| RouteRule { pattern: row.pattern, user_id: row.user_id })
        .collect();
    Ok(AssignmentBook::new(brands, routes))
}

fn normalized_value(raw: &str, field: &str) -> Result<String, ServiceError> {
    let value = normalize_key(raw);
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")).into());
    }
    Ok(value)
}
