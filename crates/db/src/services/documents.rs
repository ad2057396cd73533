use std::sync::Arc;

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use dealflow_core::domain::contract::{DealId, SpecificationId};
use dealflow_core::domain::notification::{
    DocumentOwnerKind, DocumentRef, DocumentRefId, Notification, NotificationId,
    NotificationStatus,
};
use dealflow_core::domain::quote::QuoteId;
use dealflow_core::domain::settlement::InvoiceId;
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};

use crate::repositories::{contract, notification, quote, settlement};
use crate::services::{ensure_any_role, new_id, ServiceError};
use crate::DbPool;

/// Document pointers and the notification queue's status feedback. Neither
/// touches workflow state; both still go through the transactional surface
/// so ownership is checked against current rows.
pub struct DocumentService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
}

impl DocumentService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { pool, roles }
    }

    /// Records a pointer to an externally stored file against an owning
    /// row. The owner must exist and belong to the stated organization; the
    /// path itself is opaque here.
    pub async fn attach_document(
        &self,
        org_id: &OrgId,
        owner_kind: DocumentOwnerKind,
        owner_id: &str,
        path: &str,
        actor: &UserId,
    ) -> Result<DocumentRef, ServiceError> {
        ensure_any_role(
            self.roles.as_ref(),
            org_id,
            actor,
            &Role::ALL,
            "attach a document",
        )?;
        let path = path.trim();
        if path.is_empty() {
            return Err(DomainError::validation("document path must not be empty").into());
        }

        let mut tx = self.pool.begin().await?;
        let owner_org = resolve_owner_org(&mut tx, owner_kind, owner_id).await?;
        if owner_org != *org_id {
            return Err(DomainError::validation(
                "document owner belongs to a different organization",
            )
            .into());
        }

        let now = Utc::now();
        let record = DocumentRef {
            id: DocumentRefId(new_id("doc")),
            org_id: org_id.clone(),
            owner_kind,
            owner_id: owner_id.to_string(),
            path: path.to_string(),
            uploaded_by: actor.clone(),
            uploaded_at: now,
        };
        notification::insert_document_ref(&mut *tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            owner_kind = owner_kind.as_str(),
            owner_id = %record.owner_id,
            document_id = %record.id.0,
            "document attached"
        );
        Ok(record)
    }

    pub async fn list_documents(
        &self,
        owner_kind: DocumentOwnerKind,
        owner_id: &str,
    ) -> Result<Vec<DocumentRef>, ServiceError> {
        Ok(notification::list_documents_for_owner(&self.pool, owner_kind, owner_id).await?)
    }

    /// Status feedback from the dispatcher; the only write it is allowed.
    pub async fn update_notification_status(
        &self,
        notification_id: &NotificationId,
        status: NotificationStatus,
    ) -> Result<Notification, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let updated = notification::update_notification_status(
            &mut *tx,
            notification_id,
            status,
            &Utc::now().to_rfc3339(),
        )
        .await?;
        if updated == 0 {
            return Err(ServiceError::not_found("notification", notification_id.0.clone()));
        }
        let record = notification::find_notification(&mut *tx, notification_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("notification", notification_id.0.clone())
            })?;
        tx.commit().await?;

        tracing::debug!(
            notification_id = %record.id.0,
            status = status.as_str(),
            "notification status updated"
        );
        Ok(record)
    }

    pub async fn queued_notifications(
        &self,
        org_id: &OrgId,
        limit: i64,
    ) -> Result<Vec<Notification>, ServiceError> {
        Ok(notification::list_queued_notifications(&self.pool, org_id, limit).await?)
    }
}

async fn resolve_owner_org(
    tx: &mut Transaction<'_, Sqlite>,
    owner_kind: DocumentOwnerKind,
    owner_id: &str,
) -> Result<OrgId, ServiceError> {
    let org = match owner_kind {
        DocumentOwnerKind::Quote => quote::find_quote(&mut **tx, &QuoteId(owner_id.to_string()))
            .await?
            .map(|row| row.org_id),
        DocumentOwnerKind::Specification => {
            contract::find_specification(&mut **tx, &SpecificationId(owner_id.to_string()))
                .await?
                .map(|row| row.org_id)
        }
        DocumentOwnerKind::Deal => contract::find_deal(&mut **tx, &DealId(owner_id.to_string()))
            .await?
            .map(|row| row.org_id),
        DocumentOwnerKind::SupplierInvoice => {
            settlement::find_invoice(&mut **tx, &InvoiceId(owner_id.to_string()))
                .await?
                .map(|row| row.org_id)
        }
    };
    org.ok_or_else(|| ServiceError::not_found("document owner", owner_id))
}
