//! Read-only status surface. Everything here is a plain query over current
//! rows; nothing is cached and nothing writes. Deal totals in particular
//! are always summed live over the ledger.

use chrono::{NaiveDate, Utc};

use dealflow_core::chain::{verify_chain, ChainVerification};
use dealflow_core::domain::contract::{Deal, DealId, Specification, SpecificationStatus};
use dealflow_core::domain::quote::{Quote, QuoteId, QuoteItem, QuoteStatus};
use dealflow_core::domain::settlement::{CategoryKind, PlanFactStatus};
use dealflow_core::domain::transition::WorkflowTransition;
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::settlement::DealTotals;

use crate::repositories::{contract, quote, settlement, transition, RepositoryError};
use crate::DbPool;

/// Items waiting on one procurement specialist, across every quote that is
/// currently in procurement.
pub async fn items_pending_procurement(
    pool: &DbPool,
    user_id: &UserId,
) -> Result<Vec<QuoteItem>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {columns} FROM quote_items
         WHERE procurement_user_id = ?1
           AND procurement_status != 'completed'
           AND quote_id IN (SELECT id FROM quotes WHERE status = 'pending_procurement')
         ORDER BY created_at, id",
        columns = quote::ITEM_COLUMNS
    ))
    .bind(&user_id.0)
    .fetch_all(pool)
    .await?;
    rows.iter().map(quote::map_item_row).collect()
}

/// Quotes sitting in one status, oldest first; the per-department worklist.
pub async fn quotes_awaiting(
    pool: &DbPool,
    org_id: &OrgId,
    status: QuoteStatus,
) -> Result<Vec<Quote>, RepositoryError> {
    quote::list_quotes_by_status(pool, org_id, status).await
}

/// Issued specifications that nobody has signed yet.
pub async fn specifications_awaiting_signature(
    pool: &DbPool,
    org_id: &OrgId,
) -> Result<Vec<Specification>, RepositoryError> {
    contract::list_specifications_by_status(pool, org_id, SpecificationStatus::Issued).await
}

/// Active deals carrying at least one invoice whose due date has lapsed
/// without full cover. The date check is live, so an invoice that went past
/// due since its last write still shows up.
pub async fn deals_with_overdue_payments(
    pool: &DbPool,
    org_id: &OrgId,
) -> Result<Vec<Deal>, RepositoryError> {
    deals_with_overdue_payments_as_of(pool, org_id, Utc::now().date_naive()).await
}

pub async fn deals_with_overdue_payments_as_of(
    pool: &DbPool,
    org_id: &OrgId,
    today: NaiveDate,
) -> Result<Vec<Deal>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {columns} FROM deals
         WHERE org_id = ?1 AND status = 'active' AND id IN (
             SELECT deal_id FROM supplier_invoices
             WHERE deal_id IS NOT NULL
               AND status NOT IN ('paid', 'cancelled')
               AND due_date IS NOT NULL AND due_date < ?2
         )
         ORDER BY created_at, id",
        columns = contract::DEAL_COLUMNS
    ))
    .bind(&org_id.0)
    .bind(today.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(contract::map_deal_row).collect()
}

/// Active deals with a planned ledger line past its date and no actual
/// amount recorded.
pub async fn deals_with_overdue_plan_lines(
    pool: &DbPool,
    org_id: &OrgId,
) -> Result<Vec<Deal>, RepositoryError> {
    deals_with_overdue_plan_lines_as_of(pool, org_id, Utc::now().date_naive()).await
}

pub async fn deals_with_overdue_plan_lines_as_of(
    pool: &DbPool,
    org_id: &OrgId,
    today: NaiveDate,
) -> Result<Vec<Deal>, RepositoryError> {
    let rows = sqlx::query(&format!(
        "SELECT {columns} FROM deals
         WHERE org_id = ?1 AND status = 'active' AND id IN (
             SELECT deal_id FROM plan_fact_items
             WHERE status != 'cancelled'
               AND actual_amount IS NULL
               AND planned_date IS NOT NULL AND planned_date < ?2
         )
         ORDER BY created_at, id",
        columns = contract::DEAL_COLUMNS
    ))
    .bind(&org_id.0)
    .bind(today.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(contract::map_deal_row).collect()
}

/// Live planned/actual rollup over a deal's non-cancelled ledger lines.
/// Summed in decimal arithmetic on the fetched lines; nothing stored.
pub async fn deal_totals(pool: &DbPool, deal_id: &DealId) -> Result<DealTotals, RepositoryError> {
    let categories = settlement::list_categories(pool).await?;
    let lines = settlement::list_plan_fact_items(pool, deal_id).await?;

    let kind_of = |code: &str| {
        categories
            .iter()
            .find(|category| category.code == code)
            .map(|category| category.kind)
    };

    let mut totals = DealTotals::default();
    for line in lines {
        if line.status == PlanFactStatus::Cancelled {
            continue;
        }
        let Some(kind) = kind_of(&line.category_code) else {
            continue;
        };
        match kind {
            CategoryKind::Income => {
                if let Some(amount) = line.planned_amount {
                    totals.planned_income += amount;
                }
                if let Some(amount) = line.actual_base_amount {
                    totals.actual_income += amount;
                }
            }
            CategoryKind::Expense => {
                if let Some(amount) = line.planned_amount {
                    totals.planned_expense += amount;
                }
                if let Some(amount) = line.actual_base_amount {
                    totals.actual_expense += amount;
                }
            }
        }
    }
    Ok(totals)
}

/// A quote's full transition history in chain order.
pub async fn quote_history(
    pool: &DbPool,
    quote_id: &QuoteId,
) -> Result<Vec<WorkflowTransition>, RepositoryError> {
    transition::list_transitions(pool, quote_id).await
}

/// Re-verifies the hash chain over a quote's stored history.
pub async fn verify_quote_history(
    pool: &DbPool,
    quote_id: &QuoteId,
) -> Result<ChainVerification, RepositoryError> {
    let history = transition::list_transitions(pool, quote_id).await?;
    Ok(verify_chain(quote_id, &history))
}
