use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::domain::quote::{QuoteId, QuoteStatus};
use dealflow_core::domain::transition::{TransitionId, WorkflowTransition};
use dealflow_core::domain::UserId;
use dealflow_core::roles::Role;

use crate::repositories::{decode_domain, decode_timestamp, RepositoryError};

pub fn map_transition_row(row: &SqliteRow) -> Result<WorkflowTransition, RepositoryError> {
    let from_status: String = row.try_get("from_status")?;
    let to_status: String = row.try_get("to_status")?;
    let role: String = row.try_get("role")?;

    Ok(WorkflowTransition {
        id: TransitionId(row.try_get("id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        seq: row.try_get("seq")?,
        from_status: decode_domain(QuoteStatus::parse(&from_status), "from_status")?,
        to_status: decode_domain(QuoteStatus::parse(&to_status), "to_status")?,
        actor_id: UserId(row.try_get("actor_id")?),
        role: decode_domain(Role::parse(&role), "role")?,
        comment: row.try_get("comment")?,
        prev_hash: row.try_get("prev_hash")?,
        entry_hash: row.try_get("entry_hash")?,
        occurred_at: decode_timestamp(&row.try_get::<String, _>("occurred_at")?, "occurred_at")?,
    })
}

/// Rows are append-only; there is no update or delete statement in this
/// module on purpose.
pub async fn append_transition<'e, E>(
    executor: E,
    transition: &WorkflowTransition,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO workflow_transitions (
            id, quote_id, seq, from_status, to_status, actor_id, role, comment,
            prev_hash, entry_hash, occurred_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&transition.id.0)
    .bind(&transition.quote_id.0)
    .bind(transition.seq)
    .bind(transition.from_status.as_str())
    .bind(transition.to_status.as_str())
    .bind(&transition.actor_id.0)
    .bind(transition.role.as_str())
    .bind(&transition.comment)
    .bind(&transition.prev_hash)
    .bind(&transition.entry_hash)
    .bind(transition.occurred_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Last link of the quote's chain: `(seq, entry_hash)`, if any transition has
/// been recorded yet.
pub async fn chain_head<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Option<(i64, String)>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT seq, entry_hash FROM workflow_transitions
         WHERE quote_id = ?1
         ORDER BY seq DESC
         LIMIT 1",
    )
    .bind(&quote_id.0)
    .fetch_optional(executor)
    .await?;

    row.map(|row| {
        Ok::<_, RepositoryError>((row.try_get::<i64, _>("seq")?, row.try_get("entry_hash")?))
    })
    .transpose()
}

pub async fn list_transitions<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Vec<WorkflowTransition>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT * FROM workflow_transitions WHERE quote_id = ?1 ORDER BY seq",
    )
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_transition_row).collect()
}
