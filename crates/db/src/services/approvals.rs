use std::sync::Arc;

use chrono::Utc;

use dealflow_core::approvals::{Amendment, ApprovalPolicy};
use dealflow_core::domain::approval::{Approval, ApprovalId, ApprovalStatus};
use dealflow_core::domain::quote::{QuoteId, QuoteStatus};
use dealflow_core::domain::UserId;
use dealflow_core::errors::DomainError;
use dealflow_core::roles::RoleDirectory;
use dealflow_core::workflow::WorkflowEngine;

use crate::repositories::{approval, quote};
use crate::services::workflow::{
    apply_transition, enqueue_stage_notifications, gate_context, load_quote,
};
use crate::services::{ensure_role, new_id, unique_conflict, ServiceError};
use crate::DbPool;

/// Outcome of a senior-management review. An approving decision may carry
/// an amendment applied to the quote in the same commit; a rejecting one
/// must explain itself.
#[derive(Clone, Debug)]
pub enum ApprovalDecision {
    Approve { comment: Option<String>, amendment: Option<Amendment> },
    Reject { comment: String },
}

/// The senior-management detour: routing a flagged quote into
/// `pending_approval` and recording the decision that routes it back out.
pub struct ApprovalService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
    policy: ApprovalPolicy,
    engine: WorkflowEngine,
}

impl ApprovalService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>, policy: ApprovalPolicy) -> Self {
        Self { pool, roles, policy, engine: WorkflowEngine }
    }

    /// Opens a review request. Requires at least one fired predicate and no
    /// other pending request for the quote; records the fired reasons and
    /// where the quote came from, then moves it to `pending_approval`.
    pub async fn request_approval(
        &self,
        quote_id: &QuoteId,
        actor: &UserId,
    ) -> Result<Approval, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id).await?;

        let reasons = self.policy.evaluate(&quote);
        if reasons.is_empty() {
            return Err(DomainError::validation(
                "no approval predicate fired; the quote can be approved at quote control",
            )
            .into());
        }
        if approval::find_pending_approval_for_quote(&mut *tx, &quote.id).await?.is_some() {
            return Err(DomainError::conflict("quote already has a pending approval").into());
        }

        let context = gate_context(&mut tx, &quote, &self.policy).await?;
        let plan =
            self.engine.plan_operation(quote.status, QuoteStatus::PendingApproval, &context)?;
        ensure_role(self.roles.as_ref(), &quote.org_id, actor, plan.role, "request approval")?;

        let now = Utc::now();
        let record = Approval {
            id: ApprovalId(new_id("apv")),
            org_id: quote.org_id.clone(),
            quote_id: quote.id.clone(),
            status: ApprovalStatus::Pending,
            reasons,
            origin_status: quote.status,
            requested_by: actor.clone(),
            decided_by: None,
            decided_at: None,
            comment: None,
            amendment: None,
            created_at: now,
            updated_at: now,
        };
        approval::insert_approval(&mut *tx, &record)
            .await
            .map_err(|err| unique_conflict(err, "quote already has a pending approval"))?;

        let applied = apply_transition(&mut tx, &mut quote, &plan, actor, None, now).await?;
        enqueue_stage_notifications(&mut tx, &quote, &applied, now).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %quote.id.0,
            approval_id = %record.id.0,
            reasons = record.reasons.len(),
            origin = %record.origin_status,
            "approval requested"
        );
        Ok(record)
    }

    /// Records the decision and routes the quote in one commit. Approve
    /// applies the optional amendment first; reject sends the quote back to
    /// `client_negotiation` or to terminal `rejected`, depending on where
    /// the request originated.
    pub async fn decide_approval(
        &self,
        quote_id: &QuoteId,
        decision: ApprovalDecision,
        actor: &UserId,
    ) -> Result<Approval, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id).await?;

        let mut record = approval::find_pending_approval_for_quote(&mut *tx, &quote.id)
            .await?
            .ok_or_else(|| {
                ServiceError::Domain(DomainError::conflict(
                    "quote has no pending approval to decide",
                ))
            })?;

        let now = Utc::now();
        let target = match &decision {
            ApprovalDecision::Approve { comment, amendment } => {
                if let Some(amendment) = amendment {
                    let mut items = quote::list_items(&mut *tx, &quote.id).await?;
                    amendment.apply(&mut quote, &mut items)?;
                    for item in &mut items {
                        item.updated_at = now;
                        quote::update_item(&mut *tx, item).await?;
                    }
                    // Item-level amendments can move line totals.
                    quote.total_amount =
                        items.iter().map(|item| item.line_total()).sum();
                }
                record.status = ApprovalStatus::Approved;
                record.comment = comment.clone();
                record.amendment = amendment.clone();
                QuoteStatus::Approved
            }
            ApprovalDecision::Reject { comment } => {
                let comment = comment.trim();
                if comment.is_empty() {
                    return Err(
                        DomainError::validation("a rejection requires a comment").into()
                    );
                }
                record.status = ApprovalStatus::Rejected;
                record.comment = Some(comment.to_string());
                match record.origin_status {
                    QuoteStatus::ClientNegotiation => QuoteStatus::ClientNegotiation,
                    _ => QuoteStatus::Rejected,
                }
            }
        };
        record.decided_by = Some(actor.clone());
        record.decided_at = Some(now);
        record.updated_at = now;

        let context = gate_context(&mut tx, &quote, &self.policy).await?;
        let plan = self.engine.plan_operation(quote.status, target, &context)?;
        ensure_role(self.roles.as_ref(), &quote.org_id, actor, plan.role, "decide an approval")?;

        approval::update_approval_decision(&mut *tx, &record).await?;
        let applied =
            apply_transition(&mut tx, &mut quote, &plan, actor, record.comment.as_deref(), now)
                .await?;
        enqueue_stage_notifications(&mut tx, &quote, &applied, now).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %quote.id.0,
            approval_id = %record.id.0,
            decision = record.status.as_str(),
            to = %applied.to_status,
            "approval decided"
        );
        Ok(record)
    }

    pub async fn list_approvals(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<Approval>, ServiceError> {
        Ok(approval::list_approvals_for_quote(&self.pool, quote_id).await?)
    }
}
