use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::domain::assignment::{AssignmentId, BrandAssignment, RouteAssignment};
use dealflow_core::domain::{OrgId, UserId};

use crate::repositories::{decode_timestamp, RepositoryError};

pub fn map_brand_row(row: &SqliteRow) -> Result<BrandAssignment, RepositoryError> {
    Ok(BrandAssignment {
        id: AssignmentId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        brand: row.try_get("brand")?,
        user_id: UserId(row.try_get("user_id")?),
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_route_row(row: &SqliteRow) -> Result<RouteAssignment, RepositoryError> {
    Ok(RouteAssignment {
        id: AssignmentId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        pattern: row.try_get("pattern")?,
        user_id: UserId(row.try_get("user_id")?),
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

/// Re-pointing an existing brand at a new user keeps the original row id.
pub async fn upsert_brand_assignment<'e, E>(
    executor: E,
    assignment: &BrandAssignment,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO brand_assignments (id, org_id, brand, user_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (org_id, brand)
         DO UPDATE SET user_id = excluded.user_id, updated_at = excluded.updated_at",
    )
    .bind(&assignment.id.0)
    .bind(&assignment.org_id.0)
    .bind(&assignment.brand)
    .bind(&assignment.user_id.0)
    .bind(assignment.created_at.to_rfc3339())
    .bind(assignment.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn upsert_route_assignment<'e, E>(
    executor: E,
    assignment: &RouteAssignment,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO route_assignments (id, org_id, pattern, user_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (org_id, pattern)
         DO UPDATE SET user_id = excluded.user_id, updated_at = excluded.updated_at",
    )
    .bind(&assignment.id.0)
    .bind(&assignment.org_id.0)
    .bind(&assignment.pattern)
    .bind(&assignment.user_id.0)
    .bind(assignment.created_at.to_rfc3339())
    .bind(assignment.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn list_brand_assignments<'e, E>(
    executor: E,
    org_id: &OrgId,
) -> Result<Vec<BrandAssignment>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM brand_assignments WHERE org_id = ?1 ORDER BY brand")
        .bind(&org_id.0)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_brand_row).collect()
}

pub async fn list_route_assignments<'e, E>(
    executor: E,
    org_id: &OrgId,
) -> Result<Vec<RouteAssignment>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM route_assignments WHERE org_id = ?1 ORDER BY pattern")
        .bind(&org_id.0)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_route_row).collect()
}
