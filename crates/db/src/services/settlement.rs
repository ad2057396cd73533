use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, Transaction};

use dealflow_core::domain::contract::DealId;
use dealflow_core::domain::settlement::{
    InvoiceId, InvoiceStatus, PaymentId, PlanFactItem, PlanFactItemId, PlanFactStatus,
    SupplierInvoice, SupplierInvoicePayment,
};
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};
use dealflow_core::settlement::{covered_amount, derive_invoice_status, derive_plan_fact, ActualFact};

use crate::repositories::{contract, settlement};
use crate::services::{ensure_role, new_id, unique_conflict, ServiceError};
use crate::DbPool;

/// Planned side of a ledger line. Without an `id` a new line is opened;
/// with one, the planned pair of the existing line is replaced.
#[derive(Clone, Debug)]
pub struct PlanUpsert {
    pub id: Option<PlanFactItemId>,
    pub deal_id: DealId,
    pub category_code: String,
    pub title: String,
    pub planned_amount: Option<Decimal>,
    pub planned_date: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct NewInvoice {
    pub org_id: OrgId,
    pub deal_id: Option<DealId>,
    pub number: String,
    pub supplier: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    pub is_refund: bool,
    pub note: Option<String>,
}

/// Finance's ledger: plan-fact lines under deals and supplier invoices with
/// their payments. Every write re-derives the dependent columns inside the
/// same transaction.
pub struct SettlementService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
}

impl SettlementService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { pool, roles }
    }

    /// Opens or replans a ledger line. The derived columns and status are
    /// recomputed against whatever actual side the line already carries.
    pub async fn upsert_plan(
        &self,
        plan: PlanUpsert,
        actor: &UserId,
    ) -> Result<PlanFactItem, ServiceError> {
        let title = require_text(&plan.title, "title")?;
        if let Some(amount) = plan.planned_amount {
            require_non_negative(amount, "planned_amount")?;
        }

        let mut tx = self.pool.begin().await?;
        let deal = contract::find_deal(&mut *tx, &plan.deal_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("deal", plan.deal_id.0.clone()))?;
        ensure_role(self.roles.as_ref(), &deal.org_id, actor, Role::Finance, "plan a ledger line")?;

        let category = settlement::find_category(&mut *tx, &plan.category_code)
            .await?
            .ok_or_else(|| {
                ServiceError::Domain(DomainError::validation(format!(
                    "unknown settlement category `{}`",
                    plan.category_code
                )))
            })?;

        let now = Utc::now();
        let today = now.date_naive();
        let mut line = match &plan.id {
            Some(id) => {
                let line = load_line(&mut tx, id).await?;
                if line.deal_id != plan.deal_id {
                    return Err(ServiceError::not_found("plan-fact line", id.0.clone()));
                }
                ensure_line_open(&line)?;
                line
            }
            None => PlanFactItem {
                id: PlanFactItemId(new_id("pfi")),
                org_id: deal.org_id.clone(),
                deal_id: deal.id.clone(),
                category_code: category.code.clone(),
                title: title.clone(),
                planned_amount: None,
                planned_date: None,
                actual_amount: None,
                actual_currency: None,
                exchange_rate: None,
                actual_date: None,
                actual_base_amount: None,
                variance: None,
                variance_percent: None,
                status: PlanFactStatus::Planned,
                created_at: now,
                updated_at: now,
            },
        };

        line.category_code = category.code;
        line.title = title;
        line.planned_amount = plan.planned_amount;
        line.planned_date = plan.planned_date;
        rederive_line(&mut line, today);
        line.updated_at = now;

        if plan.id.is_some() {
            settlement::update_plan_fact_item(&mut *tx, &line).await?;
        } else {
            settlement::insert_plan_fact_item(&mut *tx, &line).await?;
        }
        tx.commit().await?;

        tracing::info!(
            deal_id = %line.deal_id.0,
            line_id = %line.id.0,
            category = %line.category_code,
            status = line.status.as_str(),
            "plan-fact line planned"
        );
        Ok(line)
    }

    /// Writes the actual side of a line and recomputes the derived columns
    /// from scratch.
    pub async fn record_actual(
        &self,
        line_id: &PlanFactItemId,
        actual: ActualFact,
        actor: &UserId,
    ) -> Result<PlanFactItem, ServiceError> {
        require_non_negative(actual.amount, "actual_amount")?;
        if let Some(rate) = actual.exchange_rate {
            require_positive(rate, "exchange_rate")?;
        }
        let currency = validate_currency(&actual.currency)?;

        let mut tx = self.pool.begin().await?;
        let mut line = load_line(&mut tx, line_id).await?;
        self.ensure_finance(&line, actor, "record an actual")?;
        ensure_line_open(&line)?;

        let now = Utc::now();
        line.actual_amount = Some(actual.amount);
        line.actual_currency = Some(currency);
        line.exchange_rate = actual.exchange_rate;
        line.actual_date = actual.date;
        rederive_line(&mut line, now.date_naive());
        line.updated_at = now;
        settlement::update_plan_fact_item(&mut *tx, &line).await?;
        tx.commit().await?;

        tracing::info!(
            line_id = %line.id.0,
            status = line.status.as_str(),
            variance = line.variance.map(|v| v.to_string()).as_deref().unwrap_or("-"),
            "plan-fact actual recorded"
        );
        Ok(line)
    }

    /// Clears the actual side; the derived columns go back to null and the
    /// status re-derives from the planned pair alone.
    pub async fn clear_actual(
        &self,
        line_id: &PlanFactItemId,
        actor: &UserId,
    ) -> Result<PlanFactItem, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut line = load_line(&mut tx, line_id).await?;
        self.ensure_finance(&line, actor, "clear an actual")?;
        ensure_line_open(&line)?;

        let now = Utc::now();
        line.actual_amount = None;
        line.actual_currency = None;
        line.exchange_rate = None;
        line.actual_date = None;
        rederive_line(&mut line, now.date_naive());
        line.updated_at = now;
        settlement::update_plan_fact_item(&mut *tx, &line).await?;
        tx.commit().await?;

        tracing::info!(line_id = %line.id.0, status = line.status.as_str(), "plan-fact actual cleared");
        Ok(line)
    }

    /// Cancels a line. Cancelled lines are excluded from deal totals and
    /// reject further writes.
    pub async fn cancel_plan_fact_item(
        &self,
        line_id: &PlanFactItemId,
        actor: &UserId,
    ) -> Result<PlanFactItem, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut line = load_line(&mut tx, line_id).await?;
        self.ensure_finance(&line, actor, "cancel a ledger line")?;
        if line.status == PlanFactStatus::Cancelled {
            return Err(DomainError::conflict("ledger line is already cancelled").into());
        }

        line.status = PlanFactStatus::Cancelled;
        line.updated_at = Utc::now();
        settlement::update_plan_fact_item(&mut *tx, &line).await?;
        tx.commit().await?;

        tracing::info!(line_id = %line.id.0, "plan-fact line cancelled");
        Ok(line)
    }

    pub async fn create_invoice(
        &self,
        new: NewInvoice,
        actor: &UserId,
    ) -> Result<SupplierInvoice, ServiceError> {
        ensure_role(self.roles.as_ref(), &new.org_id, actor, Role::Finance, "create an invoice")?;
        let number = require_text(&new.number, "number")?;
        let supplier = require_text(&new.supplier, "supplier")?;
        let currency = validate_currency(&new.currency)?;
        require_positive(new.total_amount, "total_amount")?;

        let mut tx = self.pool.begin().await?;
        if let Some(deal_id) = &new.deal_id {
            let deal = contract::find_deal(&mut *tx, deal_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("deal", deal_id.0.clone()))?;
            if deal.org_id != new.org_id {
                return Err(DomainError::validation(
                    "deal belongs to a different organization",
                )
                .into());
            }
        }

        let now = Utc::now();
        let record = SupplierInvoice {
            id: InvoiceId(new_id("inv")),
            org_id: new.org_id,
            deal_id: new.deal_id,
            number,
            supplier,
            total_amount: new.total_amount,
            currency,
            due_date: new.due_date,
            status: derive_invoice_status(
                new.total_amount,
                Decimal::ZERO,
                new.due_date,
                now.date_naive(),
                false,
            ),
            created_at: now,
            updated_at: now,
        };
        settlement::insert_invoice(&mut *tx, &record)
            .await
            .map_err(|err| unique_conflict(err, "invoice number already used for supplier"))?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %record.id.0,
            supplier = %record.supplier,
            number = %record.number,
            "invoice created"
        );
        Ok(record)
    }

    /// Cancels an invoice. The status sticks and payment registration is
    /// rejected from here on; existing payment rows stay for audit.
    pub async fn cancel_invoice(
        &self,
        invoice_id: &InvoiceId,
        actor: &UserId,
    ) -> Result<SupplierInvoice, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut invoice = load_invoice(&mut tx, invoice_id).await?;
        ensure_role(
            self.roles.as_ref(),
            &invoice.org_id,
            actor,
            Role::Finance,
            "cancel an invoice",
        )?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(DomainError::conflict("invoice is already cancelled").into());
        }

        invoice.status = InvoiceStatus::Cancelled;
        invoice.updated_at = Utc::now();
        settlement::update_invoice_status(&mut *tx, &invoice).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id.0, "invoice cancelled");
        Ok(invoice)
    }

    pub async fn register_payment(
        &self,
        invoice_id: &InvoiceId,
        input: PaymentInput,
        actor: &UserId,
    ) -> Result<SupplierInvoicePayment, ServiceError> {
        require_positive(input.amount, "amount")?;

        let mut tx = self.pool.begin().await?;
        let mut invoice = load_invoice(&mut tx, invoice_id).await?;
        ensure_role(
            self.roles.as_ref(),
            &invoice.org_id,
            actor,
            Role::Finance,
            "register a payment",
        )?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(
                DomainError::conflict("cancelled invoice does not accept payments").into()
            );
        }

        let now = Utc::now();
        let payment = SupplierInvoicePayment {
            id: PaymentId(new_id("pay")),
            invoice_id: invoice.id.clone(),
            amount: input.amount,
            paid_at: input.paid_at,
            is_refund: input.is_refund,
            note: input.note,
            created_at: now,
        };
        settlement::insert_payment(&mut *tx, &payment).await?;
        rederive_invoice(&mut tx, &mut invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id.0,
            payment_id = %payment.id.0,
            amount = %payment.amount,
            refund = payment.is_refund,
            status = invoice.status.as_str(),
            "payment registered"
        );
        Ok(payment)
    }

    pub async fn update_payment(
        &self,
        payment_id: &PaymentId,
        input: PaymentInput,
        actor: &UserId,
    ) -> Result<SupplierInvoicePayment, ServiceError> {
        require_positive(input.amount, "amount")?;

        let mut tx = self.pool.begin().await?;
        let mut payment = settlement::find_payment(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("payment", payment_id.0.clone()))?;
        let mut invoice = load_invoice(&mut tx, &payment.invoice_id).await?;
        ensure_role(
            self.roles.as_ref(),
            &invoice.org_id,
            actor,
            Role::Finance,
            "update a payment",
        )?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(
                DomainError::conflict("cancelled invoice does not accept payments").into()
            );
        }

        payment.amount = input.amount;
        payment.paid_at = input.paid_at;
        payment.is_refund = input.is_refund;
        payment.note = input.note;
        settlement::update_payment(&mut *tx, &payment).await?;
        rederive_invoice(&mut tx, &mut invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id.0,
            payment_id = %payment.id.0,
            status = invoice.status.as_str(),
            "payment updated"
        );
        Ok(payment)
    }

    /// Removes a payment and re-derives the invoice; a register-then-delete
    /// round trip restores the payment-free status.
    pub async fn delete_payment(
        &self,
        payment_id: &PaymentId,
        actor: &UserId,
    ) -> Result<SupplierInvoice, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let payment = settlement::find_payment(&mut *tx, payment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("payment", payment_id.0.clone()))?;
        let mut invoice = load_invoice(&mut tx, &payment.invoice_id).await?;
        ensure_role(
            self.roles.as_ref(),
            &invoice.org_id,
            actor,
            Role::Finance,
            "delete a payment",
        )?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(
                DomainError::conflict("cancelled invoice does not accept payments").into()
            );
        }

        settlement::delete_payment(&mut *tx, payment_id).await?;
        rederive_invoice(&mut tx, &mut invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id.0,
            payment_id = %payment_id.0,
            status = invoice.status.as_str(),
            "payment deleted"
        );
        Ok(invoice)
    }

    fn ensure_finance(
        &self,
        line: &PlanFactItem,
        actor: &UserId,
        action: &str,
    ) -> Result<(), ServiceError> {
        ensure_role(self.roles.as_ref(), &line.org_id, actor, Role::Finance, action)
    }
}

async fn load_line(
    tx: &mut Transaction<'_, Sqlite>,
    id: &PlanFactItemId,
) -> Result<PlanFactItem, ServiceError> {
    settlement::find_plan_fact_item(&mut **tx, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("plan-fact line", id.0.clone()))
}

async fn load_invoice(
    tx: &mut Transaction<'_, Sqlite>,
    id: &InvoiceId,
) -> Result<SupplierInvoice, ServiceError> {
    settlement::find_invoice(&mut **tx, id)
        .await?
        .ok_or_else(|| ServiceError::not_found("invoice", id.0.clone()))
}

fn ensure_line_open(line: &PlanFactItem) -> Result<(), ServiceError> {
    if line.status == PlanFactStatus::Cancelled {
        return Err(DomainError::conflict("cancelled ledger line rejects writes").into());
    }
    Ok(())
}

/// Recomputes the derived columns from the line's own planned and actual
/// sides. The single derivation rule lives in core; this only maps the
/// stored shape onto it.
fn rederive_line(line: &mut PlanFactItem, today: NaiveDate) {
    let actual = line.actual_amount.map(|amount| ActualFact {
        amount,
        currency: line.actual_currency.clone().unwrap_or_default(),
        exchange_rate: line.exchange_rate,
        date: line.actual_date,
    });
    let derived = derive_plan_fact(
        line.planned_amount,
        line.planned_date,
        actual.as_ref(),
        today,
        line.status == PlanFactStatus::Cancelled,
    );
    line.actual_base_amount = derived.actual_base_amount;
    line.variance = derived.variance;
    line.variance_percent = derived.variance_percent;
    line.status = derived.status;
}

async fn rederive_invoice(
    tx: &mut Transaction<'_, Sqlite>,
    invoice: &mut SupplierInvoice,
) -> Result<(), ServiceError> {
    let payments = settlement::list_payments(&mut **tx, &invoice.id).await?;
    let covered = covered_amount(&payments);
    invoice.status = derive_invoice_status(
        invoice.total_amount,
        covered,
        invoice.due_date,
        Utc::now().date_naive(),
        invoice.status == InvoiceStatus::Cancelled,
    );
    invoice.updated_at = Utc::now();
    settlement::update_invoice_status(&mut **tx, invoice).await?;
    Ok(())
}

fn require_text(raw: &str, field: &str) -> Result<String, ServiceError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")).into());
    }
    Ok(value.to_string())
}

fn validate_currency(raw: &str) -> Result<String, ServiceError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|ch| ch.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(DomainError::validation(format!("currency must be a 3-letter code, got `{raw}`")).into())
    }
}

fn require_positive(value: Decimal, field: &str) -> Result<(), ServiceError> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must be positive")).into());
    }
    Ok(())
}

fn require_non_negative(value: Decimal, field: &str) -> Result<(), ServiceError> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")).into());
    }
    Ok(())
}
