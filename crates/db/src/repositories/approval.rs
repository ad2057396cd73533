use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::approvals::{Amendment, ApprovalReason};
use dealflow_core::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use dealflow_core::domain::quote::{QuoteId, QuoteStatus};
use dealflow_core::domain::{OrgId, UserId};

use crate::repositories::{
    decode_domain, decode_json, decode_timestamp, decode_timestamp_opt, RepositoryError,
};

pub fn map_approval_row(row: &SqliteRow) -> Result<Approval, RepositoryError> {
    let status: String = row.try_get("status")?;
    let origin_status: String = row.try_get("origin_status")?;
    let reasons: Vec<ApprovalReason> =
        decode_json(&row.try_get::<String, _>("reasons")?, "reasons")?;
    let amendment: Option<Amendment> = row
        .try_get::<Option<String>, _>("amendment")?
        .map(|raw| decode_json(&raw, "amendment"))
        .transpose()?;

    Ok(Approval {
        id: ApprovalId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        status: decode_domain(ApprovalStatus::parse(&status), "status")?,
        reasons,
        origin_status: decode_domain(QuoteStatus::parse(&origin_status), "origin_status")?,
        requested_by: UserId(row.try_get("requested_by")?),
        decided_by: row.try_get::<Option<String>, _>("decided_by")?.map(UserId),
        decided_at: decode_timestamp_opt(row.try_get("decided_at")?, "decided_at")?,
        comment: row.try_get("comment")?,
        amendment,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub async fn insert_approval<'e, E>(executor: E, approval: &Approval) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let reasons = serde_json::to_string(&approval.reasons)
        .map_err(|err| RepositoryError::Decode(format!("column `reasons`: {err}")))?;
    let amendment = approval
        .amendment
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| RepositoryError::Decode(format!("column `amendment`: {err}")))?;

    sqlx::query(
        "INSERT INTO approvals (
            id, org_id, quote_id, status, reasons, origin_status, requested_by,
            decided_by, decided_at, comment, amendment, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )
    .bind(&approval.id.0)
    .bind(&approval.org_id.0)
    .bind(&approval.quote_id.0)
    .bind(approval.status.as_str())
    .bind(reasons)
    .bind(approval.origin_status.as_str())
    .bind(&approval.requested_by.0)
    .bind(approval.decided_by.as_ref().map(|id| id.0.clone()))
    .bind(approval.decided_at.map(|at| at.to_rfc3339()))
    .bind(&approval.comment)
    .bind(amendment)
    .bind(approval.created_at.to_rfc3339())
    .bind(approval.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_approval_decision<'e, E>(
    executor: E,
    approval: &Approval,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let amendment = approval
        .amendment
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| RepositoryError::Decode(format!("column `amendment`: {err}")))?;

    sqlx::query(
        "UPDATE approvals SET
            status = ?2, decided_by = ?3, decided_at = ?4, comment = ?5, amendment = ?6,
            updated_at = ?7
        WHERE id = ?1",
    )
    .bind(&approval.id.0)
    .bind(approval.status.as_str())
    .bind(approval.decided_by.as_ref().map(|id| id.0.clone()))
    .bind(approval.decided_at.map(|at| at.to_rfc3339()))
    .bind(&approval.comment)
    .bind(amendment)
    .bind(approval.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_approval<'e, E>(
    executor: E,
    id: &ApprovalId,
) -> Result<Option<Approval>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM approvals WHERE id = ?1")
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_approval_row).transpose()
}

pub async fn find_pending_approval_for_quote<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Option<Approval>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM approvals WHERE quote_id = ?1 AND status = 'pending'")
        .bind(&quote_id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_approval_row).transpose()
}

pub async fn list_approvals_for_quote<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Vec<Approval>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT * FROM approvals WHERE quote_id = ?1 ORDER BY created_at, id")
        .bind(&quote_id.0)
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_approval_row).collect()
}
