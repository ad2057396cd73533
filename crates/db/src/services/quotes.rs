use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use dealflow_core::assignment::normalize_key;
use dealflow_core::domain::quote::{
    DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
};
use dealflow_core::domain::{ContractId, OrgId, UserId};
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};

use crate::repositories::{contract, quote};
use crate::services::assignments::load_assignment_book;
use crate::services::{ensure_any_role, ensure_role, new_id, unique_conflict, ServiceError};
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct NewQuote {
    pub org_id: OrgId,
    pub number: String,
    pub customer: String,
    pub contract_id: Option<ContractId>,
    pub deal_type: DealType,
    pub currency: String,
    pub prepayment_percent: Decimal,
    pub markup_percent: Decimal,
    pub dm_reward: Option<Decimal>,
}

#[derive(Clone, Debug)]
pub struct NewQuoteItem {
    pub description: String,
    pub brand: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub route: Option<String>,
}

/// Field patch for one item. `None` leaves a field untouched; the nested
/// options clear their field when set to `Some(None)`.
#[derive(Clone, Debug, Default)]
pub struct QuoteItemPatch {
    pub description: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub route: Option<Option<String>>,
    pub procurement_status: Option<ProcurementStatus>,
    pub procurement_user_id: Option<Option<UserId>>,
    pub logistics_user_id: Option<Option<UserId>>,
    pub supplier: Option<String>,
    pub pickup_cost: Option<Decimal>,
    pub linehaul_cost: Option<Decimal>,
    pub delivery_cost: Option<Decimal>,
    pub transit_days: Option<i64>,
    pub customs_code: Option<String>,
    pub duty_percent: Option<Decimal>,
    pub customs_extra_cost: Option<Decimal>,
}

impl QuoteItemPatch {
    fn touches_commercial_fields(&self) -> bool {
        self.description.is_some()
            || self.brand.is_some()
            || self.quantity.is_some()
            || self.unit_price.is_some()
            || self.route.is_some()
    }

    fn touches_pricing(&self) -> bool {
        self.quantity.is_some() || self.unit_price.is_some()
    }
}

/// Quote creation and the item ledger under it.
pub struct QuoteService {
    pool: DbPool,
    roles: Arc<dyn RoleDirectory>,
}

impl QuoteService {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { pool, roles }
    }

    pub async fn create_quote(&self, new: NewQuote, actor: &UserId) -> Result<Quote, ServiceError> {
        ensure_role(self.roles.as_ref(), &new.org_id, actor, Role::SalesManager, "create a quote")?;

        let number = require_text(&new.number, "number")?;
        let customer = require_text(&new.customer, "customer")?;
        let currency = validate_currency(&new.currency)?;
        validate_percent(new.prepayment_percent, "prepayment_percent")?;
        require_non_negative(new.markup_percent, "markup_percent")?;
        if let Some(reward) = new.dm_reward {
            require_non_negative(reward, "dm_reward")?;
        }

        let mut tx = self.pool.begin().await?;
        if let Some(contract_id) = &new.contract_id {
            let contract = contract::find_contract(&mut *tx, contract_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("contract", contract_id.0.clone()))?;
            if contract.org_id != new.org_id {
                return Err(DomainError::validation(
                    "contract belongs to a different organization",
                )
                .into());
            }
        }

        let now = Utc::now();
        let record = Quote {
            id: QuoteId(new_id("quote")),
            org_id: new.org_id,
            number,
            customer,
            contract_id: new.contract_id,
            deal_type: new.deal_type,
            status: QuoteStatus::Draft,
            currency,
            total_amount: Decimal::ZERO,
            prepayment_percent: new.prepayment_percent,
            markup_percent: new.markup_percent,
            dm_reward: new.dm_reward,
            sales_manager_id: actor.clone(),
            procurement_done_at: None,
            logistics_done_at: None,
            customs_done_at: None,
            sales_review_done_at: None,
            revision_department: None,
            revision_comment: None,
            revision_requested_at: None,
            created_at: now,
            updated_at: now,
        };
        quote::insert_quote(&mut *tx, &record)
            .await
            .map_err(|err| unique_conflict(err, "quote number already used in organization"))?;
        tx.commit().await?;

        tracing::info!(quote_id = %record.id.0, number = %record.number, "quote created");
        Ok(record)
    }

    /// Adds an item and runs the assignment resolver for it. Allowed in
    /// draft and during procurement; a new item added mid-procurement
    /// re-blocks the gate until it too is completed.
    pub async fn add_item(
        &self,
        quote_id: &QuoteId,
        new: NewQuoteItem,
        actor: &UserId,
    ) -> Result<QuoteItem, ServiceError> {
        let description = require_text(&new.description, "description")?;
        let brand = require_text(&new.brand, "brand")?;
        require_positive(new.quantity, "quantity")?;
        require_non_negative(new.unit_price, "unit_price")?;

        let mut tx = self.pool.begin().await?;
        let mut quote = super::workflow::load_quote(&mut tx, quote_id).await?;
        ensure_role(
            self.roles.as_ref(),
            &quote.org_id,
            actor,
            Role::SalesManager,
            "add a quote item",
        )?;
        ensure_items_editable(&quote)?;

        let book = load_assignment_book(&mut tx, &quote.org_id).await?;
        let route = new.route.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty());
        let procurement_user_id = book.resolve_brand(&brand).cloned();
        let logistics_user_id = route
            .as_deref()
            .and_then(|route| book.resolve_route(route))
            .map(|rule| rule.user_id.clone());

        let now = Utc::now();
        let item = QuoteItem {
            id: QuoteItemId(new_id("item")),
            quote_id: quote.id.clone(),
            position: quote::next_item_position(&mut *tx, &quote.id).await?,
            description,
            brand,
            quantity: new.quantity,
            unit_price: new.unit_price,
            procurement_status: ProcurementStatus::Pending,
            purchase_price: None,
            supplier: None,
            procurement_user_id,
            procurement_completed_at: None,
            procurement_completed_by: None,
            route,
            logistics_user_id,
            pickup_cost: None,
            linehaul_cost: None,
            delivery_cost: None,
            transit_days: None,
            customs_code: None,
            duty_percent: None,
            customs_extra_cost: None,
            created_at: now,
            updated_at: now,
        };
        quote::insert_item(&mut *tx, &item).await?;
        refresh_quote_total(&mut tx, &mut quote).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %quote.id.0,
            item_id = %item.id.0,
            brand = %item.brand,
            assignee = item.procurement_user_id.as_ref().map(|id| id.0.as_str()).unwrap_or("-"),
            "quote item added"
        );
        Ok(item)
    }

    /// Applies a field patch. A changed brand or route re-runs the resolver
    /// for the affected assignee; an explicit assignee in the patch wins
    /// over resolution; everything else leaves assignments alone.
    pub async fn update_item(
        &self,
        quote_id: &QuoteId,
        item_id: &QuoteItemId,
        patch: QuoteItemPatch,
        actor: &UserId,
    ) -> Result<QuoteItem, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let mut quote = super::workflow::load_quote(&mut tx, quote_id).await?;
        ensure_any_role(
            self.roles.as_ref(),
            &quote.org_id,
            actor,
            &[Role::SalesManager, Role::Procurement, Role::Logistics, Role::Customs],
            "update a quote item",
        )?;
        if quote.status.is_terminal() {
            return Err(DomainError::validation(format!(
                "quote is closed (`{}`), items can no longer change",
                quote.status
            ))
            .into());
        }
        if patch.touches_commercial_fields() {
            ensure_items_editable(&quote)?;
        }

        let mut item = quote::find_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("quote item", item_id.0.clone()))?;
        if item.quote_id != quote.id {
            return Err(ServiceError::not_found("quote item", item_id.0.clone()));
        }

        if let Some(status) = patch.procurement_status {
            if item.procurement_status == ProcurementStatus::Completed {
                return Err(DomainError::conflict("item procurement already completed").into());
            }
            if status == ProcurementStatus::Completed {
                return Err(DomainError::validation(
                    "procurement completion is recorded through its dedicated operation",
                )
                .into());
            }
            item.procurement_status = status;
        }

        let brand_changed = match &patch.brand {
            Some(brand) => normalize_key(brand) != normalize_key(&item.brand),
            None => false,
        };
        let route_changed = match &patch.route {
            Some(route) => {
                route.as_deref().map(normalize_key) != item.route.as_deref().map(normalize_key)
            }
            None => false,
        };

        let touches_pricing = patch.touches_pricing();
        if let Some(description) = patch.description {
            item.description = require_text(&description, "description")?;
        }
        if let Some(brand) = patch.brand {
            item.brand = require_text(&brand, "brand")?;
        }
        if let Some(quantity) = patch.quantity {
            require_positive(quantity, "quantity")?;
            item.quantity = quantity;
        }
        if let Some(unit_price) = patch.unit_price {
            require_non_negative(unit_price, "unit_price")?;
            item.unit_price = unit_price;
        }
        if let Some(route) = patch.route {
            item.route = route.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty());
        }
        if let Some(supplier) = patch.supplier {
            item.supplier = Some(require_text(&supplier, "supplier")?);
        }
        if let Some(cost) = patch.pickup_cost {
            require_non_negative(cost, "pickup_cost")?;
            item.pickup_cost = Some(cost);
        }
        if let Some(cost) = patch.linehaul_cost {
            require_non_negative(cost, "linehaul_cost")?;
            item.linehaul_cost = Some(cost);
        }
        if let Some(cost) = patch.delivery_cost {
            require_non_negative(cost, "delivery_cost")?;
            item.delivery_cost = Some(cost);
        }
        if let Some(days) = patch.transit_days {
            if days < 0 {
                return Err(DomainError::validation("transit_days cannot be negative").into());
            }
            item.transit_days = Some(days);
        }
        if let Some(code) = patch.customs_code {
            item.customs_code = Some(require_text(&code, "customs_code")?);
        }
        if let Some(duty) = patch.duty_percent {
            validate_percent(duty, "duty_percent")?;
            item.duty_percent = Some(duty);
        }
        if let Some(extra) = patch.customs_extra_cost {
            require_non_negative(extra, "customs_extra_cost")?;
            item.customs_extra_cost = Some(extra);
        }

        // Resolver re-runs only for the attribute that actually changed;
        // an explicit assignee in the same patch takes precedence.
        if brand_changed || route_changed {
            let book = load_assignment_book(&mut tx, &quote.org_id).await?;
            if brand_changed && patch.procurement_user_id.is_none() {
                item.procurement_user_id = book.resolve_brand(&item.brand).cloned();
            }
            if route_changed && patch.logistics_user_id.is_none() {
                item.logistics_user_id = item
                    .route
                    .as_deref()
                    .and_then(|route| book.resolve_route(route))
                    .map(|rule| rule.user_id.clone());
            }
        }
        if let Some(assignee) = patch.procurement_user_id {
            item.procurement_user_id = assignee;
        }
        if let Some(assignee) = patch.logistics_user_id {
            item.logistics_user_id = assignee;
        }

        item.updated_at = Utc::now();
        quote::update_item(&mut *tx, &item).await?;
        if touches_pricing {
            refresh_quote_total(&mut tx, &mut quote).await?;
        }
        tx.commit().await?;

        tracing::info!(quote_id = %quote.id.0, item_id = %item.id.0, "quote item updated");
        Ok(item)
    }

    /// Marks one item purchased. The gate out of `pending_procurement`
    /// clears only when every item has been through here.
    pub async fn record_item_completion(
        &self,
        quote_id: &QuoteId,
        item_id: &QuoteItemId,
        purchase_price: Decimal,
        supplier: String,
        actor: &UserId,
    ) -> Result<QuoteItem, ServiceError> {
        require_non_negative(purchase_price, "purchase_price")?;
        let supplier = require_text(&supplier, "supplier")?;

        let mut tx = self.pool.begin().await?;
        let quote = super::workflow::load_quote(&mut tx, quote_id).await?;
        ensure_role(
            self.roles.as_ref(),
            &quote.org_id,
            actor,
            Role::Procurement,
            "record item completion",
        )?;
        if quote.status != QuoteStatus::PendingProcurement {
            return Err(DomainError::validation(format!(
                "items are completed during procurement, quote is `{}`",
                quote.status
            ))
            .into());
        }

        let mut item = quote::find_item(&mut *tx, item_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("quote item", item_id.0.clone()))?;
        if item.quote_id != quote.id {
            return Err(ServiceError::not_found("quote item", item_id.0.clone()));
        }
        if item.procurement_status == ProcurementStatus::Completed {
            return Err(DomainError::conflict("item procurement already completed").into());
        }

        let now = Utc::now();
        item.procurement_status = ProcurementStatus::Completed;
        item.purchase_price = Some(purchase_price);
        item.supplier = Some(supplier);
        item.procurement_completed_at = Some(now);
        item.procurement_completed_by = Some(actor.clone());
        item.updated_at = now;
        quote::update_item(&mut *tx, &item).await?;
        tx.commit().await?;

        tracing::info!(
            quote_id = %quote.id.0,
            item_id = %item.id.0,
            actor = %actor.0,
            "item procurement completed"
        );
        Ok(item)
    }
}

fn ensure_items_editable(quote: &Quote) -> Result<(), ServiceError> {
    match quote.status {
        QuoteStatus::Draft | QuoteStatus::PendingProcurement => Ok(()),
        other => Err(DomainError::validation(format!(
            "commercial item fields are frozen once the quote leaves procurement (status `{other}`)"
        ))
        .into()),
    }
}

/// The stored quote total is a rollup of line totals, refreshed on every
/// item write that can move it.
async fn refresh_quote_total(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    quote: &mut Quote,
) -> Result<(), ServiceError> {
    let items = quote::list_items(&mut **tx, &quote.id).await?;
    quote.total_amount = items.iter().map(QuoteItem::line_total).sum();
    quote.updated_at = Utc::now();
    quote::update_quote(&mut **tx, quote).await?;
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

fn validate_percent(value: Decimal, field: &str) -> Result<(), ServiceError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(
            DomainError::validation(format!("{field} must be between 0 and 100")).into()
        );
    }
    Ok(())
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
