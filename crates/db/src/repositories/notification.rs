use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::domain::notification::{
    DocumentOwnerKind, DocumentRef, DocumentRefId, Notification, NotificationId,
    NotificationPriority, NotificationRecipient, NotificationStatus,
};
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::roles::Role;

use crate::repositories::{
    decode_domain, decode_timestamp, decode_timestamp_opt, RepositoryError,
};

pub fn map_notification_row(row: &SqliteRow) -> Result<Notification, RepositoryError> {
    let recipient_id: Option<String> = row.try_get("recipient_id")?;
    let recipient_role: Option<String> = row.try_get("recipient_role")?;
    let recipient = match (recipient_id, recipient_role) {
        (Some(user), None) => NotificationRecipient::User(UserId(user)),
        (None, Some(role)) => {
            NotificationRecipient::Department(decode_domain(Role::parse(&role), "recipient_role")?)
        }
        _ => {
            return Err(RepositoryError::Decode(
                "notification row must carry exactly one of recipient_id, recipient_role"
                    .to_string(),
            ))
        }
    };

    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;

    Ok(Notification {
        id: NotificationId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        recipient,
        kind: row.try_get("kind")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        priority: decode_domain(NotificationPriority::parse(&priority), "priority")?,
        status: decode_domain(NotificationStatus::parse(&status), "status")?,
        expires_at: decode_timestamp_opt(row.try_get("expires_at")?, "expires_at")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_document_row(row: &SqliteRow) -> Result<DocumentRef, RepositoryError> {
    let owner_kind: String = row.try_get("owner_kind")?;
    Ok(DocumentRef {
        id: DocumentRefId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        owner_kind: decode_domain(DocumentOwnerKind::parse(&owner_kind), "owner_kind")?,
        owner_id: row.try_get("owner_id")?,
        path: row.try_get("path")?,
        uploaded_by: UserId(row.try_get("uploaded_by")?),
        uploaded_at: decode_timestamp(&row.try_get::<String, _>("uploaded_at")?, "uploaded_at")?,
    })
}

pub async fn insert_notification<'e, E>(
    executor: E,
    notification: &Notification,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (recipient_id, recipient_role) = match &notification.recipient {
        NotificationRecipient::User(user) => (Some(user.0.clone()), None),
        NotificationRecipient::Department(role) => (None, Some(role.as_str())),
    };

    sqlx::query(
        "INSERT INTO notifications (
            id, org_id, recipient_id, recipient_role, kind, title, message, priority, status,
            expires_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&notification.id.0)
    .bind(&notification.org_id.0)
    .bind(recipient_id)
    .bind(recipient_role)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.priority.as_str())
    .bind(notification.status.as_str())
    .bind(notification.expires_at.map(|at| at.to_rfc3339()))
    .bind(notification.created_at.to_rfc3339())
    .bind(notification.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Returns how many rows changed; 0 means the notification does not exist.
pub async fn update_notification_status<'e, E>(
    executor: E,
    id: &NotificationId,
    status: NotificationStatus,
    updated_at: &str,
) -> Result<u64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE notifications SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&id.0)
        .bind(status.as_str())
        .bind(updated_at)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn find_notification<'e, E>(
    executor: E,
    id: &NotificationId,
) -> Result<Option<Notification>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM notifications WHERE id = ?1")
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_notification_row).transpose()
}

pub async fn list_queued_notifications<'e, E>(
    executor: E,
    org_id: &OrgId,
    limit: i64,
) -> Result<Vec<Notification>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT * FROM notifications
         WHERE org_id = ?1 AND status = 'queued'
         ORDER BY created_at, id
         LIMIT ?2",
    )
    .bind(&org_id.0)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_notification_row).collect()
}

pub async fn insert_document_ref<'e, E>(
    executor: E,
    document: &DocumentRef,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO document_refs (
            id, org_id, owner_kind, owner_id, path, uploaded_by, uploaded_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&document.id.0)
    .bind(&document.org_id.0)
    .bind(document.owner_kind.as_str())
    .bind(&document.owner_id)
    .bind(&document.path)
    .bind(&document.uploaded_by.0)
    .bind(document.uploaded_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn list_documents_for_owner<'e, E>(
    executor: E,
    owner_kind: DocumentOwnerKind,
    owner_id: &str,
) -> Result<Vec<DocumentRef>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT * FROM document_refs
         WHERE owner_kind = ?1 AND owner_id = ?2
         ORDER BY uploaded_at, id",
    )
    .bind(owner_kind.as_str())
    .bind(owner_id)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_document_row).collect()
}
