//! Specification issuance and deal creation, including the concurrent
//! numbering guarantee over a shared on-disk database.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use dealflow_core::approvals::ApprovalPolicy;
use dealflow_core::domain::contract::{Contract, ContractId, SpecificationStatus};
use dealflow_core::domain::quote::{
    DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
};
use dealflow_core::domain::settlement::PlanFactStatus;
use dealflow_core::domain::{OrgId, UserId};
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, StaticRoleDirectory};
use dealflow_db::repositories::{contract, quote, settlement};
use dealflow_db::services::ServiceError;
use dealflow_db::{connect_with_settings, migrations, DbPool, Services};

fn org() -> OrgId {
    OrgId("org-test".to_string())
}

fn qc() -> UserId {
    UserId("user-qc".to_string())
}

fn test_services(pool: DbPool) -> Services {
    let directory = StaticRoleDirectory::default().grant(&org(), &qc(), Role::QuoteControl);
    Services::new(pool, Arc::new(directory), ApprovalPolicy::default())
}

async fn seed_contract(pool: &DbPool, id: &str, number: &str) -> ContractId {
    let now = Utc::now();
    let record = Contract {
        id: ContractId(id.to_string()),
        org_id: org(),
        customer: "Vostok Trading LLC".to_string(),
        number: number.to_string(),
        last_specification_no: 0,
        created_at: now,
        updated_at: now,
    };
    contract::insert_contract(pool, &record).await.expect("insert contract");
    record.id
}

/// Inserts a quote directly in `pending_spec_control`, past the pipeline
/// walk the other suites already exercise.
async fn seed_ready_quote(pool: &DbPool, id: &str, number: &str, contract_id: &ContractId) -> QuoteId {
    let now = Utc::now();
    let record = Quote {
        id: QuoteId(id.to_string()),
        org_id: org(),
        number: number.to_string(),
        customer: "Vostok Trading LLC".to_string(),
        contract_id: Some(contract_id.clone()),
        deal_type: DealType::Supply,
        status: QuoteStatus::PendingSpecControl,
        currency: "USD".to_string(),
        total_amount: Decimal::from(6_000),
        prepayment_percent: Decimal::from(100),
        markup_percent: Decimal::from(15),
        dm_reward: None,
        sales_manager_id: UserId("user-sales".to_string()),
        procurement_done_at: Some(now),
        logistics_done_at: Some(now),
        customs_done_at: Some(now),
        sales_review_done_at: Some(now),
        revision_department: None,
        revision_comment: None,
        revision_requested_at: None,
        created_at: now,
        updated_at: now,
    };
    quote::insert_quote(pool, &record).await.expect("insert quote");
    record.id
}

async fn seed_costed_item(pool: &DbPool, quote_id: &QuoteId) {
    let now = Utc::now();
    let item = QuoteItem {
        id: QuoteItemId(format!("{}-item-1", quote_id.0)),
        quote_id: quote_id.clone(),
        position: 1,
        description: "Hydraulic pump".to_string(),
        brand: "Bosch".to_string(),
        quantity: Decimal::from(2),
        unit_price: Decimal::from(3_000),
        procurement_status: ProcurementStatus::Completed,
        purchase_price: Some(Decimal::from(2_000)),
        supplier: Some("Ninghai Drives Co".to_string()),
        procurement_user_id: None,
        procurement_completed_at: Some(now),
        procurement_completed_by: Some(UserId("user-proc".to_string())),
        route: Some("shanghai-moscow".to_string()),
        logistics_user_id: None,
        pickup_cost: Some(Decimal::from(100)),
        linehaul_cost: Some(Decimal::from(500)),
        delivery_cost: Some(Decimal::from(150)),
        transit_days: Some(35),
        customs_code: Some("8413".to_string()),
        duty_percent: Some(Decimal::from(5)),
        customs_extra_cost: Some(Decimal::from(40)),
        created_at: now,
        updated_at: now,
    };
    quote::insert_item(pool, &item).await.expect("insert item");
}

#[tokio::test]
async fn issue_sign_and_create_deal_seeds_the_ledger() {
    let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    let services = test_services(pool.clone());

    let contract_id = seed_contract(&pool, "contract-t1", "CT-2026-001").await;
    let quote_id = seed_ready_quote(&pool, "quote-t1", "Q-4001", &contract_id).await;
    seed_costed_item(&pool, &quote_id).await;

    let spec = services.issuance.issue_specification(&quote_id, &qc()).await.expect("issue");
    assert_eq!(spec.number, 1);
    assert_eq!(spec.status, SpecificationStatus::Issued);
    assert_eq!(spec.total_amount, Decimal::from(6_000));
    assert!(spec.payload.get("items").is_some(), "payload snapshots the items");

    let premature = services.issuance.create_deal(&spec.id, &qc()).await;
    assert!(
        matches!(premature, Err(ServiceError::Domain(DomainError::Validation(_)))),
        "an unsigned specification cannot become a deal"
    );

    let signed = services.issuance.sign_specification(&spec.id, &qc()).await.expect("sign");
    assert!(signed.signed_at.is_some());

    let resign = services.issuance.sign_specification(&spec.id, &qc()).await;
    assert!(matches!(resign, Err(ServiceError::Domain(DomainError::Conflict(_)))));

    let deal = services.issuance.create_deal(&spec.id, &qc()).await.expect("create deal");
    assert_eq!(deal.number, "CT-2026-001-S1");
    assert_eq!(deal.amount, Decimal::from(6_000));

    let closed = quote::find_quote(&pool, &quote_id)
        .await
        .expect("load quote")
        .expect("quote exists");
    assert_eq!(closed.status, QuoteStatus::Deal, "the quote closes into its terminal status");

    let lines = settlement::list_plan_fact_items(&pool, &deal.id).await.expect("ledger lines");
    let amount_of = |code: &str| {
        lines
            .iter()
            .find(|line| line.category_code == code)
            .and_then(|line| line.planned_amount)
    };
    assert_eq!(amount_of("goods_sale"), Some(Decimal::from(6_000)));
    assert_eq!(amount_of("goods_purchase"), Some(Decimal::from(4_000)));
    assert_eq!(amount_of("freight"), Some(Decimal::from(750)));
    // duty: 2000 * 2 * 5% + 40
    assert_eq!(amount_of("customs"), Some(Decimal::from(240)));
    assert!(lines.iter().all(|line| line.status == PlanFactStatus::Planned));

    // The quote is terminal now, so a second attempt dies at admission.
    let duplicate = services.issuance.create_deal(&spec.id, &qc()).await;
    assert!(
        matches!(duplicate, Err(ServiceError::Domain(DomainError::InvalidTransition(_)))),
        "a closed quote cannot produce a second deal"
    );
}

#[tokio::test]
async fn quote_without_contract_cannot_issue() {
    let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    let services = test_services(pool.clone());

    let now = Utc::now();
    let record = Quote {
        id: QuoteId("quote-nc".to_string()),
        org_id: org(),
        number: "Q-4002".to_string(),
        customer: "Vostok Trading LLC".to_string(),
        contract_id: None,
        deal_type: DealType::Supply,
        status: QuoteStatus::PendingSpecControl,
        currency: "USD".to_string(),
        total_amount: Decimal::from(1_000),
        prepayment_percent: Decimal::from(100),
        markup_percent: Decimal::from(15),
        dm_reward: None,
        sales_manager_id: UserId("user-sales".to_string()),
        procurement_done_at: Some(now),
        logistics_done_at: Some(now),
        customs_done_at: Some(now),
        sales_review_done_at: Some(now),
        revision_department: None,
        revision_comment: None,
        revision_requested_at: None,
        created_at: now,
        updated_at: now,
    };
    quote::insert_quote(&pool, &record).await.expect("insert quote");

    let result = services.issuance.issue_specification(&record.id, &qc()).await;
    assert!(matches!(result, Err(ServiceError::Domain(DomainError::Validation(_)))));
}

#[tokio::test]
async fn concurrent_issuers_get_distinct_numbers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("issuance.db").display());
    let pool = connect_with_settings(&url, 4, 5_000).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    let services = Arc::new(test_services(pool.clone()));

    let contract_id = seed_contract(&pool, "contract-c1", "CT-2026-009").await;
    let first = seed_ready_quote(&pool, "quote-c1", "Q-4101", &contract_id).await;
    let second = seed_ready_quote(&pool, "quote-c2", "Q-4102", &contract_id).await;

    let issue = |quote_id: QuoteId| {
        let services = services.clone();
        tokio::spawn(async move {
            services.issuance.issue_specification(&quote_id, &qc()).await
        })
    };
    let (left, right) = tokio::join!(issue(first), issue(second));
    let left = left.expect("task").expect("issue first");
    let right = right.expect("task").expect("issue second");

    let mut numbers = [left.number, right.number];
    numbers.sort_unstable();
    assert_eq!(numbers, [1, 2], "allocation serializes on the contract row");

    let stored = contract::find_contract(&pool, &contract_id)
        .await
        .expect("load contract")
        .expect("contract exists");
    assert_eq!(stored.last_specification_no, 2);
}
