//! Deterministic demo dataset: one organization with a quote in every
//! interesting shape: a draft, a quote mid-procurement with a real audit
//! chain, and a closed deal with a seeded settlement ledger. Re-seeding
//! removes the previous demo rows first, so the dataset is stable across
//! runs.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use dealflow_core::chain::{entry_hash, GENESIS_HASH};
use dealflow_core::domain::assignment::{AssignmentId, BrandAssignment, RouteAssignment};
use dealflow_core::domain::contract::{
    Contract, ContractId, Deal, DealId, DealStatus, Specification, SpecificationId,
    SpecificationStatus,
};
use dealflow_core::domain::quote::{
    DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
};
use dealflow_core::domain::settlement::{
    InvoiceId, InvoiceStatus, PaymentId, PlanFactItem, PlanFactItemId, PlanFactStatus,
    SupplierInvoice, SupplierInvoicePayment,
};
use dealflow_core::domain::transition::{TransitionId, WorkflowTransition};
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::roles::Role;

use crate::connection::DbPool;
use crate::repositories::{assignment, contract, quote, settlement, transition, RepositoryError};

const SEED_ORG: &str = "org-demo";
const SEED_SALES: &str = "user-demo-sales";
const SEED_PROCUREMENT: &str = "user-demo-procurement";
const SEED_LOGISTICS: &str = "user-demo-logistics";
const SEED_CUSTOMS: &str = "user-demo-customs";
const SEED_QUOTE_CONTROL: &str = "user-demo-quote-control";

/// What the seed produced, keyed for humans; the CLI prints this verbatim.
#[derive(Debug)]
pub struct SeedSummary {
    pub org_id: OrgId,
    pub quotes: Vec<SeedQuoteInfo>,
    pub deal_id: DealId,
    pub invoice_id: InvoiceId,
}

#[derive(Debug)]
pub struct SeedQuoteInfo {
    pub label: &'static str,
    pub quote_id: &'static str,
    pub number: &'static str,
    pub status: QuoteStatus,
    pub description: &'static str,
}

/// Removes any previous demo rows and writes the dataset fresh, all inside
/// one transaction.
pub async fn seed_demo_dataset(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let mut tx = pool.begin().await?;
    clean(&mut tx).await?;

    let org = OrgId(SEED_ORG.to_string());
    let t0 = seed_epoch();

    // Assignment tables the resolver reads.
    let brands = [("bosch", SEED_PROCUREMENT), ("siemens", SEED_PROCUREMENT)];
    for (index, (brand, user)) in brands.iter().enumerate() {
        let row = BrandAssignment {
            id: AssignmentId(format!("asg-demo-brand-{index}")),
            org_id: org.clone(),
            brand: (*brand).to_string(),
            user_id: UserId((*user).to_string()),
            created_at: t0,
            updated_at: t0,
        };
        assignment::upsert_brand_assignment(&mut *tx, &row).await?;
    }
    let routes = [("shanghai-*", SEED_LOGISTICS), ("hamburg-moscow", SEED_LOGISTICS)];
    for (index, (pattern, user)) in routes.iter().enumerate() {
        let row = RouteAssignment {
            id: AssignmentId(format!("asg-demo-route-{index}")),
            org_id: org.clone(),
            pattern: (*pattern).to_string(),
            user_id: UserId((*user).to_string()),
            created_at: t0,
            updated_at: t0,
        };
        assignment::upsert_route_assignment(&mut *tx, &row).await?;
    }

    let demo_contract = Contract {
        id: ContractId("contract-demo-001".to_string()),
        org_id: org.clone(),
        customer: "Vostok Trading LLC".to_string(),
        number: "CT-2026-014".to_string(),
        last_specification_no: 1,
        created_at: t0,
        updated_at: t0,
    };
    contract::insert_contract(&mut *tx, &demo_contract).await?;

    // Quote 1: fresh draft with unresolved items.
    let draft = seed_quote(
        &org,
        "quote-demo-draft",
        "Q-1001",
        "Severnaya Arma JSC",
        None,
        QuoteStatus::Draft,
        Decimal::new(481_000, 2),
        t0,
    );
    quote::insert_quote(&mut *tx, &draft).await?;
    let draft_items = [
        seed_item(&draft, 1, "Hydraulic pump", "bosch", 2, 185_000, Some("shanghai-moscow"), t0),
        seed_item(&draft, 2, "Control valve", "siemens", 3, 37_000, None, t0),
    ];
    for item in &draft_items {
        quote::insert_item(&mut *tx, item).await?;
    }

    // Quote 2: mid-procurement, one of two items already purchased, with
    // the audit chain that put it there.
    let mut procurement = seed_quote(
        &org,
        "quote-demo-procurement",
        "Q-1002",
        "Uralmash Service",
        Some(&demo_contract.id),
        QuoteStatus::PendingProcurement,
        Decimal::new(1_252_000, 2),
        t0,
    );
    procurement.prepayment_percent = Decimal::from(50);
    quote::insert_quote(&mut *tx, &procurement).await?;
    let mut purchased =
        seed_item(&procurement, 1, "Gear reducer", "bosch", 4, 228_000, Some("shanghai-ningbo"), t0);
    purchased.procurement_status = ProcurementStatus::Completed;
    purchased.purchase_price = Some(Decimal::new(171_000, 2));
    purchased.supplier = Some("Ninghai Drives Co".to_string());
    purchased.procurement_completed_at = Some(t0 + Duration::hours(30));
    purchased.procurement_completed_by = Some(UserId(SEED_PROCUREMENT.to_string()));
    quote::insert_item(&mut *tx, &purchased).await?;
    let open_item =
        seed_item(&procurement, 2, "Bearing kit", "siemens", 10, 34_000, Some("hamburg-moscow"), t0);
    quote::insert_item(&mut *tx, &open_item).await?;
    seed_chain(
        &mut tx,
        &procurement.id,
        &[(QuoteStatus::Draft, QuoteStatus::PendingProcurement, SEED_SALES, Role::SalesManager)],
        t0,
    )
    .await?;

    // Quote 3: the full happy path, closed into an active deal with its
    // seeded ledger and a half-paid supplier invoice.
    let deal_quote = seed_quote(
        &org,
        "quote-demo-deal",
        "Q-1003",
        "Vostok Trading LLC",
        Some(&demo_contract.id),
        QuoteStatus::Deal,
        Decimal::new(960_000, 2),
        t0,
    );
    quote::insert_quote(&mut *tx, &deal_quote).await?;
    let mut deal_item =
        seed_item(&deal_quote, 1, "Conveyor drive", "bosch", 3, 320_000, Some("shanghai-riga"), t0);
    deal_item.procurement_status = ProcurementStatus::Completed;
    deal_item.purchase_price = Some(Decimal::new(236_000, 2));
    deal_item.supplier = Some("Shanghai Heavy Industries".to_string());
    deal_item.pickup_cost = Some(Decimal::new(12_000, 2));
    deal_item.linehaul_cost = Some(Decimal::new(61_000, 2));
    deal_item.delivery_cost = Some(Decimal::new(9_000, 2));
    quote::insert_item(&mut *tx, &deal_item).await?;
    seed_chain(
        &mut tx,
        &deal_quote.id,
        &[
            (QuoteStatus::Draft, QuoteStatus::PendingProcurement, SEED_SALES, Role::SalesManager),
            (
                QuoteStatus::PendingProcurement,
                QuoteStatus::PendingLogistics,
                SEED_PROCUREMENT,
                Role::Procurement,
            ),
            (
                QuoteStatus::PendingLogistics,
                QuoteStatus::PendingSalesReview,
                SEED_LOGISTICS,
                Role::Logistics,
            ),
            (
                QuoteStatus::PendingSalesReview,
                QuoteStatus::PendingQuoteControl,
                SEED_SALES,
                Role::SalesManager,
            ),
            (
                QuoteStatus::PendingQuoteControl,
                QuoteStatus::Approved,
                SEED_QUOTE_CONTROL,
                Role::QuoteControl,
            ),
            (QuoteStatus::Approved, QuoteStatus::SentToClient, SEED_SALES, Role::SalesManager),
            (
                QuoteStatus::SentToClient,
                QuoteStatus::PendingSpecControl,
                SEED_SALES,
                Role::SalesManager,
            ),
            (
                QuoteStatus::PendingSpecControl,
                QuoteStatus::PendingSignature,
                SEED_QUOTE_CONTROL,
                Role::QuoteControl,
            ),
            (QuoteStatus::PendingSignature, QuoteStatus::Deal, SEED_QUOTE_CONTROL, Role::QuoteControl),
        ],
        t0,
    )
    .await?;

    let spec = Specification {
        id: SpecificationId("spec-demo-001".to_string()),
        org_id: org.clone(),
        quote_id: deal_quote.id.clone(),
        contract_id: demo_contract.id.clone(),
        number: 1,
        status: SpecificationStatus::Signed,
        currency: deal_quote.currency.clone(),
        total_amount: deal_quote.total_amount,
        payload: serde_json::json!({ "quote": deal_quote, "items": [deal_item] }),
        signed_at: Some(t0 + Duration::days(4)),
        created_at: t0 + Duration::days(3),
        updated_at: t0 + Duration::days(4),
    };
    contract::insert_specification(&mut *tx, &spec).await?;

    let deal = Deal {
        id: DealId("deal-demo-001".to_string()),
        org_id: org.clone(),
        specification_id: spec.id.clone(),
        quote_id: deal_quote.id.clone(),
        number: "CT-2026-014-S1".to_string(),
        status: DealStatus::Active,
        currency: spec.currency.clone(),
        amount: spec.total_amount,
        completed_at: None,
        cancelled_at: None,
        created_at: t0 + Duration::days(5),
        updated_at: t0 + Duration::days(5),
    };
    contract::insert_deal(&mut *tx, &deal).await?;

    let ledger = [
        ("pfi-demo-sale", "goods_sale", "Goods sale", deal.amount),
        ("pfi-demo-purchase", "goods_purchase", "Goods purchase", Decimal::new(708_000, 2)),
        ("pfi-demo-freight", "freight", "Freight", Decimal::new(82_000, 2)),
    ];
    for (id, code, title, amount) in ledger {
        let line = PlanFactItem {
            id: PlanFactItemId(id.to_string()),
            org_id: org.clone(),
            deal_id: deal.id.clone(),
            category_code: code.to_string(),
            title: title.to_string(),
            planned_amount: Some(amount),
            planned_date: Some(deal.created_at.date_naive() + Duration::days(30)),
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
        settlement::insert_plan_fact_item(&mut *tx, &line).await?;
    }

    let invoice = SupplierInvoice {
        id: InvoiceId("inv-demo-001".to_string()),
        org_id: org.clone(),
        deal_id: Some(deal.id.clone()),
        number: "SHI-44821".to_string(),
        supplier: "Shanghai Heavy Industries".to_string(),
        total_amount: Decimal::new(708_000, 2),
        currency: "USD".to_string(),
        due_date: Some(deal.created_at.date_naive() + Duration::days(45)),
        status: InvoiceStatus::PartiallyPaid,
        created_at: deal.created_at,
        updated_at: deal.created_at,
    };
    settlement::insert_invoice(&mut *tx, &invoice).await?;
    let payment = SupplierInvoicePayment {
        id: PaymentId("pay-demo-001".to_string()),
        invoice_id: invoice.id.clone(),
        amount: Decimal::new(354_000, 2),
        paid_at: deal.created_at.date_naive() + Duration::days(7),
        is_refund: false,
        note: Some("50% prepayment".to_string()),
        created_at: deal.created_at + Duration::days(7),
    };
    settlement::insert_payment(&mut *tx, &payment).await?;

    tx.commit().await?;

    Ok(SeedSummary {
        org_id: org,
        quotes: vec![
            SeedQuoteInfo {
                label: "draft",
                quote_id: "quote-demo-draft",
                number: "Q-1001",
                status: QuoteStatus::Draft,
                description: "Fresh draft with two unresolved items",
            },
            SeedQuoteInfo {
                label: "procurement",
                quote_id: "quote-demo-procurement",
                number: "Q-1002",
                status: QuoteStatus::PendingProcurement,
                description: "Mid-procurement, one of two items purchased",
            },
            SeedQuoteInfo {
                label: "deal",
                quote_id: "quote-demo-deal",
                number: "Q-1003",
                status: QuoteStatus::Deal,
                description: "Closed into an active deal with ledger and invoice",
            },
        ],
        deal_id: DealId("deal-demo-001".to_string()),
        invoice_id: InvoiceId("inv-demo-001".to_string()),
    })
}

async fn clean(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<(), RepositoryError> {
    let statements = [
        "DELETE FROM supplier_invoice_payments WHERE invoice_id IN
             (SELECT id FROM supplier_invoices WHERE org_id = ?1)",
        "DELETE FROM supplier_invoices WHERE org_id = ?1",
        "DELETE FROM plan_fact_items WHERE org_id = ?1",
        "DELETE FROM deals WHERE org_id = ?1",
        "DELETE FROM specifications WHERE org_id = ?1",
        "DELETE FROM workflow_transitions WHERE quote_id IN
             (SELECT id FROM quotes WHERE org_id = ?1)",
        "DELETE FROM approvals WHERE org_id = ?1",
        "DELETE FROM notifications WHERE org_id = ?1",
        "DELETE FROM document_refs WHERE org_id = ?1",
        "DELETE FROM quote_items WHERE quote_id IN (SELECT id FROM quotes WHERE org_id = ?1)",
        "DELETE FROM quotes WHERE org_id = ?1",
        "DELETE FROM brand_assignments WHERE org_id = ?1",
        "DELETE FROM route_assignments WHERE org_id = ?1",
        "DELETE FROM contracts WHERE org_id = ?1",
    ];
    for statement in statements {
        sqlx::query(statement).bind(SEED_ORG).execute(&mut **tx).await?;
    }
    Ok(())
}

/// Fixed anchor so re-seeding reproduces the same rows byte for byte.
fn seed_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_754_006_400, 0).unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn seed_quote(
    org: &OrgId,
    id: &str,
    number: &str,
    customer: &str,
    contract_id: Option<&ContractId>,
    status: QuoteStatus,
    total: Decimal,
    at: DateTime<Utc>,
) -> Quote {
    Quote {
        id: QuoteId(id.to_string()),
        org_id: org.clone(),
        number: number.to_string(),
        customer: customer.to_string(),
        contract_id: contract_id.cloned(),
        deal_type: DealType::Supply,
        status,
        currency: "USD".to_string(),
        total_amount: total,
        prepayment_percent: Decimal::from(100),
        markup_percent: Decimal::from(18),
        dm_reward: None,
        sales_manager_id: UserId(SEED_SALES.to_string()),
        procurement_done_at: None,
        logistics_done_at: None,
        customs_done_at: None,
        sales_review_done_at: None,
        revision_department: None,
        revision_comment: None,
        revision_requested_at: None,
        created_at: at,
        updated_at: at,
    }
}

#[allow(clippy::too_many_arguments)]
fn seed_item(
    quote: &Quote,
    position: i64,
    description: &str,
    brand: &str,
    quantity: i64,
    unit_price_cents: i64,
    route: Option<&str>,
    at: DateTime<Utc>,
) -> QuoteItem {
    QuoteItem {
        id: QuoteItemId(format!("{}-item-{position}", quote.id.0)),
        quote_id: quote.id.clone(),
        position,
        description: description.to_string(),
        brand: brand.to_string(),
        quantity: Decimal::from(quantity),
        unit_price: Decimal::new(unit_price_cents, 2),
        procurement_status: ProcurementStatus::Pending,
        purchase_price: None,
        supplier: None,
        procurement_user_id: Some(UserId(SEED_PROCUREMENT.to_string())),
        procurement_completed_at: None,
        procurement_completed_by: None,
        route: route.map(str::to_string),
        logistics_user_id: route.map(|_| UserId(SEED_LOGISTICS.to_string())),
        pickup_cost: None,
        linehaul_cost: None,
        delivery_cost: None,
        transit_days: None,
        customs_code: None,
        duty_percent: None,
        customs_extra_cost: None,
        created_at: at,
        updated_at: at,
    }
}

/// Writes a hash-linked history for a seeded quote; the chain verifies the
/// same way a live one does.
async fn seed_chain(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    quote_id: &QuoteId,
    steps: &[(QuoteStatus, QuoteStatus, &str, Role)],
    t0: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    let mut prev_hash = GENESIS_HASH.to_string();
    for (index, (from, to, actor, role)) in steps.iter().enumerate() {
        let seq = index as i64 + 1;
        let occurred_at = t0 + Duration::hours(12 * seq);
        let hash = entry_hash(
            &prev_hash,
            quote_id,
            seq,
            from.as_str(),
            to.as_str(),
            actor,
            &occurred_at.to_rfc3339(),
        );
        let record = WorkflowTransition {
            id: TransitionId(format!("{}-trn-{seq}", quote_id.0)),
            quote_id: quote_id.clone(),
            seq,
            from_status: *from,
            to_status: *to,
            actor_id: UserId((*actor).to_string()),
            role: *role,
            comment: None,
            prev_hash: prev_hash.clone(),
            entry_hash: hash.clone(),
            occurred_at,
        };
        transition::append_transition(&mut **tx, &record).await?;
        prev_hash = hash;
    }
    Ok(())
}
