use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

use dealflow_core::approvals::ApprovalPolicy;
use dealflow_core::chain::{entry_hash, GENESIS_HASH};
use dealflow_core::domain::notification::{
    Notification, NotificationId, NotificationPriority, NotificationRecipient, NotificationStatus,
};
use dealflow_core::domain::quote::{Quote, QuoteId, QuoteStatus};
use dealflow_core::domain::transition::{TransitionId, WorkflowTransition};
use dealflow_core::domain::UserId;
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};
use dealflow_core::workflow::{
    EdgeKind, GateContext, ParallelStage, TransitionEffect, TransitionPlan, WorkflowEngine,
};

use crate::repositories::{notification, quote, transition};
use crate::services::{ensure_role, new_id, ServiceError};
use crate::DbPool;

/// Generic advances plus the two stage-completion flags. The revision and
/// approval detours live in their own services but share
/// [`apply_transition`] so every status change lands in the same audit
/// chain.
pub struct WorkflowService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
    policy: ApprovalPolicy,
    engine: WorkflowEngine,
}

impl WorkflowService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>, policy: ApprovalPolicy) -> Self {
        Self { pool, roles, policy, engine: WorkflowEngine }
    }

    /// Moves the quote along a regular edge. Gates are evaluated against
    /// live child rows inside the transaction, so a stale completion flag
    /// can never slip a quote through.
    pub async fn advance(
        &self,
        quote_id: &QuoteId,
        to: QuoteStatus,
        actor: &UserId,
        comment: Option<String>,
    ) -> Result<WorkflowTransition, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id).await?;

        let context = gate_context(&mut tx, &quote, &self.policy).await?;
        let plan = self.engine.plan(quote.status, to, &context)?;
        ensure_role(self.roles.as_ref(), &quote.org_id, actor, plan.role, "advance the quote")?;

        let now = Utc::now();
        let applied =
            apply_transition(&mut tx, &mut quote, &plan, actor, comment.as_deref(), now).await?;
        enqueue_stage_notifications(&mut tx, &quote, &applied, now).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %applied.quote_id.0,
            from = %applied.from_status,
            to = %applied.to_status,
            actor = %actor.0,
            "quote advanced"
        );
        Ok(applied)
    }

    /// Sends the quote back to an earlier department. The comment is what
    /// the receiving department sees, so an empty one is rejected.
    pub async fn return_for_revision(
        &self,
        quote_id: &QuoteId,
        to: QuoteStatus,
        actor: &UserId,
        comment: String,
    ) -> Result<WorkflowTransition, ServiceError> {
        let comment = comment.trim().to_string();
        if comment.is_empty() {
            return Err(DomainError::validation("a revision return requires a comment").into());
        }

        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id).await?;

        let context = gate_context(&mut tx, &quote, &self.policy).await?;
        let plan = self.engine.plan_operation(quote.status, to, &context)?;
        if plan.kind != EdgeKind::RevisionReturn {
            return Err(DomainError::validation(format!(
                "transition from `{}` to `{to}` is not a revision return",
                quote.status
            ))
            .into());
        }
        ensure_role(
            self.roles.as_ref(),
            &quote.org_id,
            actor,
            plan.role,
            "return the quote for revision",
        )?;

        let now = Utc::now();
        let applied =
            apply_transition(&mut tx, &mut quote, &plan, actor, Some(&comment), now).await?;
        enqueue_stage_notifications(&mut tx, &quote, &applied, now).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %applied.quote_id.0,
            from = %applied.from_status,
            to = %applied.to_status,
            department = %plan.role,
            "quote returned for revision"
        );
        Ok(applied)
    }

    /// Marks one of the two parallel stages done. This is not a status
    /// change; it flips the flag the sales-review gate checks.
    pub async fn complete_stage(
        &self,
        quote_id: &QuoteId,
        stage: ParallelStage,
        actor: &UserId,
    ) -> Result<Quote, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id).await?;

        if !matches!(quote.status, QuoteStatus::PendingLogistics | QuoteStatus::PendingCustoms) {
            return Err(DomainError::conflict(format!(
                "stage completion applies while the quote is in a parallel stage, not `{}`",
                quote.status
            ))
            .into());
        }
        ensure_role(
            self.roles.as_ref(),
            &quote.org_id,
            actor,
            stage.role(),
            "complete the stage",
        )?;

        let now = Utc::now();
        match stage {
            ParallelStage::Logistics => {
                if quote.logistics_done_at.is_some() {
                    return Err(
                        DomainError::conflict("logistics stage already completed").into()
                    );
                }
                quote.logistics_done_at = Some(now);
            }
            ParallelStage::Customs => {
                if quote.customs_done_at.is_some() {
                    return Err(DomainError::conflict("customs stage already completed").into());
                }
                quote.customs_done_at = Some(now);
            }
        }
        quote.updated_at = now;
        quote::update_quote(&mut *tx, &quote).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %quote.id.0,
            stage = stage.as_str(),
            actor = %actor.0,
            "parallel stage completed"
        );
        Ok(quote)
    }
}

pub(crate) async fn load_quote(
    tx: &mut Transaction<'_, Sqlite>,
    quote_id: &QuoteId,
) -> Result<Quote, ServiceError> {
    quote::find_quote(&mut **tx, quote_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("quote", quote_id.0.clone()))
}

/// Rebuilds the gate context from current rows. Called inside the same
/// transaction that wants to transition.
pub(crate) async fn gate_context(
    tx: &mut Transaction<'_, Sqlite>,
    quote: &Quote,
    policy: &ApprovalPolicy,
) -> Result<GateContext, ServiceError> {
    let (item_count, procured_item_count) = quote::item_rollup(&mut **tx, &quote.id).await?;
    Ok(GateContext {
        item_count,
        procured_item_count,
        logistics_done: quote.logistics_done_at.is_some(),
        customs_done: quote.customs_done_at.is_some(),
        approval_reasons_fired: policy.evaluate(quote).len(),
    })
}

/// Applies an admitted plan: quote-level effects, the status write and the
/// hash-chained audit row, all in the caller's transaction.
pub(crate) async fn apply_transition(
    tx: &mut Transaction<'_, Sqlite>,
    quote: &mut Quote,
    plan: &TransitionPlan,
    actor: &UserId,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<WorkflowTransition, ServiceError> {
    for effect in &plan.effects {
        match effect {
            TransitionEffect::StampProcurementDone => quote.procurement_done_at = Some(now),
            TransitionEffect::StampSalesReviewDone => quote.sales_review_done_at = Some(now),
            TransitionEffect::SetRevisionReturn { department } => {
                quote.revision_department = Some(*department);
                quote.revision_comment = comment.map(str::to_string);
                quote.revision_requested_at = Some(now);
            }
            TransitionEffect::ClearRevisionReturn => {
                quote.revision_department = None;
                quote.revision_comment = None;
                quote.revision_requested_at = None;
            }
        }
    }
    quote.status = plan.to;
    quote.updated_at = now;
    quote::update_quote(&mut **tx, quote).await?;

    let (seq, prev_hash) = match transition::chain_head(&mut **tx, &quote.id).await? {
        Some((last_seq, last_hash)) => (last_seq + 1, last_hash),
        None => (1, GENESIS_HASH.to_string()),
    };
    let hash = entry_hash(
        &prev_hash,
        &quote.id,
        seq,
        plan.from.as_str(),
        plan.to.as_str(),
        &actor.0,
        &now.to_rfc3339(),
    );
    let record = WorkflowTransition {
        id: TransitionId(new_id("trn")),
        quote_id: quote.id.clone(),
        seq,
        from_status: plan.from,
        to_status: plan.to,
        actor_id: actor.clone(),
        role: plan.role,
        comment: comment.map(str::to_string),
        prev_hash,
        entry_hash: hash,
        occurred_at: now,
    };
    transition::append_transition(&mut **tx, &record).await?;
    Ok(record)
}

/// Queues a handoff notice for whoever owns the target stage. A resolved
/// assignee gets a personal row; stages without per-item assignees get a
/// department-addressed one.
pub(crate) async fn enqueue_stage_notifications(
    tx: &mut Transaction<'_, Sqlite>,
    quote: &Quote,
    applied: &WorkflowTransition,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let recipients = match applied.to_status.responsible_role() {
        None => vec![NotificationRecipient::User(quote.sales_manager_id.clone())],
        Some(Role::SalesManager) => {
            vec![NotificationRecipient::User(quote.sales_manager_id.clone())]
        }
        Some(Role::Procurement) => {
            let users = quote::distinct_procurement_users(&mut **tx, &quote.id).await?;
            if users.is_empty() {
                vec![NotificationRecipient::Department(Role::Procurement)]
            } else {
                users.into_iter().map(NotificationRecipient::User).collect()
            }
        }
        Some(Role::Logistics) => {
            let users = quote::distinct_logistics_users(&mut **tx, &quote.id).await?;
            if users.is_empty() {
                vec![NotificationRecipient::Department(Role::Logistics)]
            } else {
                users.into_iter().map(NotificationRecipient::User).collect()
            }
        }
        Some(role) => vec![NotificationRecipient::Department(role)],
    };

    let kind = if applied.to_status.is_terminal() { "quote.closed" } else { "quote.stage_ready" };
    let priority = if applied.to_status == QuoteStatus::PendingApproval {
        NotificationPriority::High
    } else {
        NotificationPriority::Normal
    };
    let title = format!("Quote {} is now {}", quote.number, applied.to_status);
    let message = match &applied.comment {
        Some(comment) => format!(
            "Moved from {} by {}: {comment}",
            applied.from_status, applied.actor_id.0
        ),
        None => format!("Moved from {} by {}", applied.from_status, applied.actor_id.0),
    };

    for recipient in recipients {
        let notice = Notification {
            id: NotificationId(new_id("ntf")),
            org_id: quote.org_id.clone(),
            recipient,
            kind: kind.to_string(),
            title: title.clone(),
            message: message.clone(),
            priority,
            status: NotificationStatus::Queued,
            expires_at: None,
            created_at: now,
            updated_at: now,
        };
        notification::insert_notification(&mut **tx, &notice).await?;
    }
    Ok(())
}
