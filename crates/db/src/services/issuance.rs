use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};

use dealflow_core::approvals::ApprovalPolicy;
use dealflow_core::domain::contract::{
    Deal, DealId, DealStatus, Specification, SpecificationId, SpecificationStatus,
};
use dealflow_core::domain::quote::{QuoteId, QuoteItem, QuoteStatus};
use dealflow_core::domain::settlement::{PlanFactItem, PlanFactItemId, PlanFactStatus};
use dealflow_core::domain::UserId;
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};
use dealflow_core::workflow::WorkflowEngine;

use crate::repositories::{contract, quote, settlement};
use crate::services::workflow::{
    apply_transition, enqueue_stage_notifications, gate_context, load_quote,
};
use crate::services::{ensure_role, new_id, unique_conflict, ServiceError};
use crate::DbPool;

/// From approved quote to executed deal: specification numbering, the
/// immutable snapshot, signature, and deal creation with its seeded
/// settlement ledger.
pub struct IssuanceService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
    policy: ApprovalPolicy,
    engine: WorkflowEngine,
}

impl IssuanceService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>, policy: ApprovalPolicy) -> Self {
        Self { pool, roles, policy, engine: WorkflowEngine }
    }

    /// Issues a specification for a quote in `pending_spec_control`. The
    /// number allocation is the first write of the transaction, so two
    /// issuers on the same contract serialize before either snapshots
    /// anything.
    pub async fn issue_specification(
        &self,
        quote_id: &QuoteId,
        actor: &UserId,
    ) -> Result<Specification, ServiceError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let allocated =
            contract::allocate_specification_no(&mut *tx, quote_id, &now.to_rfc3339()).await?;

        let mut quote = load_quote(&mut tx, quote_id).await?;
        let (contract_id, number) = allocated.ok_or_else(|| {
            ServiceError::Domain(DomainError::validation(
                "quote has no contract to issue a specification against",
            ))
        })?;

        let context = gate_context(&mut tx, &quote, &self.policy).await?;
        let plan =
            self.engine.plan_operation(quote.status, QuoteStatus::PendingSignature, &context)?;
        ensure_role(
            self.roles.as_ref(),
            &quote.org_id,
            actor,
            plan.role,
            "issue a specification",
        )?;

        let items = quote::list_items(&mut *tx, &quote.id).await?;
        let payload = serde_json::json!({
            "quote": quote,
            "items": items,
        });

        let record = Specification {
            id: SpecificationId(new_id("spec")),
            org_id: quote.org_id.clone(),
            quote_id: quote.id.clone(),
            contract_id,
            number,
            status: SpecificationStatus::Issued,
            currency: quote.currency.clone(),
            total_amount: quote.total_amount,
            payload,
            signed_at: None,
            created_at: now,
            updated_at: now,
        };
        contract::insert_specification(&mut *tx, &record).await?;

        let applied = apply_transition(&mut tx, &mut quote, &plan, actor, None, now).await?;
        enqueue_stage_notifications(&mut tx, &quote, &applied, now).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %quote.id.0,
            specification_id = %record.id.0,
            number = record.number,
            "specification issued"
        );
        Ok(record)
    }

    /// Flips an issued specification to signed. One-way: anything but
    /// `issued` is a conflict.
    pub async fn sign_specification(
        &self,
        specification_id: &SpecificationId,
        actor: &UserId,
    ) -> Result<Specification, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut record = contract::find_specification(&mut *tx, specification_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("specification", specification_id.0.clone())
            })?;
        ensure_role(
            self.roles.as_ref(),
            &record.org_id,
            actor,
            Role::QuoteControl,
            "sign a specification",
        )?;
        if record.status != SpecificationStatus::Issued {
            return Err(DomainError::conflict(format!(
                "specification is `{}`, only an issued one can be signed",
                record.status
            ))
            .into());
        }

        let now = Utc::now();
        record.status = SpecificationStatus::Signed;
        record.signed_at = Some(now);
        record.updated_at = now;
        contract::update_specification_status(&mut *tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            specification_id = %record.id.0,
            number = record.number,
            "specification signed"
        );
        Ok(record)
    }

    /// Turns a signed specification into the deal. Exactly one deal per
    /// specification; currency and amount are copied at this instant; the
    /// quote closes into its terminal `deal` status and the settlement
    /// ledger is seeded from the quote's items.
    pub async fn create_deal(
        &self,
        specification_id: &SpecificationId,
        actor: &UserId,
    ) -> Result<Deal, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let spec = contract::find_specification(&mut *tx, specification_id)
            .await?
            .ok_or_else(|| {
                ServiceError::not_found("specification", specification_id.0.clone())
            })?;
        if spec.status != SpecificationStatus::Signed {
            return Err(DomainError::validation(format!(
                "specification is `{}`, a deal requires a signed one",
                spec.status
            ))
            .into());
        }

        let mut quote = load_quote(&mut tx, &spec.quote_id).await?;
        let context = gate_context(&mut tx, &quote, &self.policy).await?;
        let plan = self.engine.plan_operation(quote.status, QuoteStatus::Deal, &context)?;
        ensure_role(self.roles.as_ref(), &quote.org_id, actor, plan.role, "create a deal")?;

        let deal_contract = contract::find_contract(&mut *tx, &spec.contract_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("contract", spec.contract_id.0.clone()))?;

        let now = Utc::now();
        let record = Deal {
            id: DealId(new_id("deal")),
            org_id: quote.org_id.clone(),
            specification_id: spec.id.clone(),
            quote_id: quote.id.clone(),
            number: format!("{}-S{}", deal_contract.number, spec.number),
            status: DealStatus::Active,
            currency: spec.currency.clone(),
            amount: spec.total_amount,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        contract::insert_deal(&mut *tx, &record)
            .await
            .map_err(|err| unique_conflict(err, "specification already has a deal"))?;

        let items = quote::list_items(&mut *tx, &quote.id).await?;
        seed_plan_fact_lines(&mut tx, &record, &items).await?;

        let applied = apply_transition(&mut tx, &mut quote, &plan, actor, None, now).await?;
        enqueue_stage_notifications(&mut tx, &quote, &applied, now).await?;
        tx.commit().await?;

        tracing::info!(
            deal_id = %record.id.0,
            specification_id = %spec.id.0,
            quote_id = %quote.id.0,
            amount = %record.amount,
            "deal created"
        );
        Ok(record)
    }

    pub async fn complete_deal(
        &self,
        deal_id: &DealId,
        actor: &UserId,
    ) -> Result<Deal, ServiceError> {
        self.close_deal(deal_id, DealStatus::Completed, actor).await
    }

    pub async fn cancel_deal(
        &self,
        deal_id: &DealId,
        actor: &UserId,
    ) -> Result<Deal, ServiceError> {
        self.close_deal(deal_id, DealStatus::Cancelled, actor).await
    }

    async fn close_deal(
        &self,
        deal_id: &DealId,
        next: DealStatus,
        actor: &UserId,
    ) -> Result<Deal, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut record = contract::find_deal(&mut *tx, deal_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("deal", deal_id.0.clone()))?;
        ensure_role(
            self.roles.as_ref(),
            &record.org_id,
            actor,
            Role::QuoteControl,
            "close a deal",
        )?;

        let now = Utc::now();
        record.transition_to(next)?;
        match next {
            DealStatus::Completed => record.completed_at = Some(now),
            DealStatus::Cancelled => record.cancelled_at = Some(now),
            DealStatus::Active => {}
        }
        record.updated_at = now;
        contract::update_deal_status(&mut *tx, &record).await?;
        tx.commit().await?;

        tracing::info!(deal_id = %record.id.0, status = record.status.as_str(), "deal closed");
        Ok(record)
    }
}

/// Seeds the plan-fact ledger from the deal: one income line for the sale
/// and expense lines aggregated from the items. Zero-amount lines are
/// skipped rather than written as noise.
async fn seed_plan_fact_lines(
    tx: &mut Transaction<'_, Sqlite>,
    deal: &Deal,
    items: &[QuoteItem],
) -> Result<(), ServiceError> {
    let purchase: Decimal = items
        .iter()
        .filter_map(|item| item.purchase_price.map(|price| price * item.quantity))
        .sum();
    let freight: Decimal = items.iter().map(QuoteItem::freight_cost).sum();
    let customs: Decimal = items.iter().map(QuoteItem::customs_cost).sum();

    let seeds = [
        ("goods_sale", "Goods sale", deal.amount),
        ("goods_purchase", "Goods purchase", purchase),
        ("freight", "Freight", freight),
        ("customs", "Customs", customs),
    ];

    let planned_date = deal.created_at.date_naive();
    for (code, title, amount) in seeds {
        if amount.is_zero() {
            continue;
        }
        let line = PlanFactItem {
            id: PlanFactItemId(new_id("pfi")),
            org_id: deal.org_id.clone(),
            deal_id: deal.id.clone(),
            category_code: code.to_string(),
            title: title.to_string(),
            planned_amount: Some(amount),
            planned_date: Some(planned_date),
            actual_amount: None,
            actual_currency: None,
            exchange_rate: None,
            actual_date: None,
            actual_base_amount: None,
            variance: None,
            variance_percent: None,
            status: PlanFactStatus::Planned,
            created_at: deal.created_at,
            updated_at: deal.created_at,
        };
        settlement::insert_plan_fact_item(&mut **tx, &line).await?;
    }
    Ok(())
}
