use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::domain::quote::{
    DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
};
use dealflow_core::domain::{ContractId, OrgId, UserId};
use dealflow_core::roles::Role;

use crate::repositories::{
    decode_decimal, decode_decimal_opt, decode_domain, decode_timestamp, decode_timestamp_opt,
    RepositoryError,
};

pub(crate) const QUOTE_COLUMNS: &str = "\
    id, org_id, number, customer, contract_id, deal_type, status, currency, \
    CAST(total_amount AS TEXT) AS total_amount_text, \
    CAST(prepayment_percent AS TEXT) AS prepayment_percent_text, \
    CAST(markup_percent AS TEXT) AS markup_percent_text, \
    CAST(dm_reward AS TEXT) AS dm_reward_text, \
    sales_manager_id, procurement_done_at, logistics_done_at, customs_done_at, \
    sales_review_done_at, revision_department, revision_comment, revision_requested_at, \
    created_at, updated_at";

pub(crate) const ITEM_COLUMNS: &str = "\
    id, quote_id, position, description, brand, \
    CAST(quantity AS TEXT) AS quantity_text, \
    CAST(unit_price AS TEXT) AS unit_price_text, \
    procurement_status, \
    CAST(purchase_price AS TEXT) AS purchase_price_text, \
    supplier, procurement_user_id, procurement_completed_at, procurement_completed_by, \
    route, logistics_user_id, \
    CAST(pickup_cost AS TEXT) AS pickup_cost_text, \
    CAST(linehaul_cost AS TEXT) AS linehaul_cost_text, \
    CAST(delivery_cost AS TEXT) AS delivery_cost_text, \
    transit_days, customs_code, \
    CAST(duty_percent AS TEXT) AS duty_percent_text, \
    CAST(customs_extra_cost AS TEXT) AS customs_extra_cost_text, \
    created_at, updated_at";

pub fn map_quote_row(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let deal_type: String = row.try_get("deal_type")?;
    let status: String = row.try_get("status")?;
    let revision_department: Option<String> = row.try_get("revision_department")?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        number: row.try_get("number")?,
        customer: row.try_get("customer")?,
        contract_id: row.try_get::<Option<String>, _>("contract_id")?.map(ContractId),
        deal_type: decode_domain(DealType::parse(&deal_type), "deal_type")?,
        status: decode_domain(QuoteStatus::parse(&status), "status")?,
        currency: row.try_get("currency")?,
        total_amount: decode_decimal(
            &row.try_get::<String, _>("total_amount_text")?,
            "total_amount",
        )?,
        prepayment_percent: decode_decimal(
            &row.try_get::<String, _>("prepayment_percent_text")?,
            "prepayment_percent",
        )?,
        markup_percent: decode_decimal(
            &row.try_get::<String, _>("markup_percent_text")?,
            "markup_percent",
        )?,
        dm_reward: decode_decimal_opt(row.try_get("dm_reward_text")?, "dm_reward")?,
        sales_manager_id: UserId(row.try_get("sales_manager_id")?),
        procurement_done_at: decode_timestamp_opt(
            row.try_get("procurement_done_at")?,
            "procurement_done_at",
        )?,
        logistics_done_at: decode_timestamp_opt(
            row.try_get("logistics_done_at")?,
            "logistics_done_at",
        )?,
        customs_done_at: decode_timestamp_opt(row.try_get("customs_done_at")?, "customs_done_at")?,
        sales_review_done_at: decode_timestamp_opt(
            row.try_get("sales_review_done_at")?,
            "sales_review_done_at",
        )?,
        revision_department: revision_department
            .map(|raw| decode_domain(Role::parse(&raw), "revision_department"))
            .transpose()?,
        revision_comment: row.try_get("revision_comment")?,
        revision_requested_at: decode_timestamp_opt(
            row.try_get("revision_requested_at")?,
            "revision_requested_at",
        )?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_item_row(row: &SqliteRow) -> Result<QuoteItem, RepositoryError> {
    let procurement_status: String = row.try_get("procurement_status")?;

    Ok(QuoteItem {
        id: QuoteItemId(row.try_get("id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        position: row.try_get("position")?,
        description: row.try_get("description")?,
        brand: row.try_get("brand")?,
        quantity: decode_decimal(&row.try_get::<String, _>("quantity_text")?, "quantity")?,
        unit_price: decode_decimal(&row.try_get::<String, _>("unit_price_text")?, "unit_price")?,
        procurement_status: decode_domain(
            ProcurementStatus::parse(&procurement_status),
            "procurement_status",
        )?,
        purchase_price: decode_decimal_opt(row.try_get("purchase_price_text")?, "purchase_price")?,
        supplier: row.try_get("supplier")?,
        procurement_user_id: row.try_get::<Option<String>, _>("procurement_user_id")?.map(UserId),
        procurement_completed_at: decode_timestamp_opt(
            row.try_get("procurement_completed_at")?,
            "procurement_completed_at",
        )?,
        procurement_completed_by: row
            .try_get::<Option<String>, _>("procurement_completed_by")?
            .map(UserId),
        route: row.try_get("route")?,
        logistics_user_id: row.try_get::<Option<String>, _>("logistics_user_id")?.map(UserId),
        pickup_cost: decode_decimal_opt(row.try_get("pickup_cost_text")?, "pickup_cost")?,
        linehaul_cost: decode_decimal_opt(row.try_get("linehaul_cost_text")?, "linehaul_cost")?,
        delivery_cost: decode_decimal_opt(row.try_get("delivery_cost_text")?, "delivery_cost")?,
        transit_days: row.try_get("transit_days")?,
        customs_code: row.try_get("customs_code")?,
        duty_percent: decode_decimal_opt(row.try_get("duty_percent_text")?, "duty_percent")?,
        customs_extra_cost: decode_decimal_opt(
            row.try_get("customs_extra_cost_text")?,
            "customs_extra_cost",
        )?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub async fn insert_quote<'e, E>(executor: E, quote: &Quote) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO quotes (
            id, org_id, number, customer, contract_id, deal_type, status, currency,
            total_amount, prepayment_percent, markup_percent, dm_reward, sales_manager_id,
            procurement_done_at, logistics_done_at, customs_done_at, sales_review_done_at,
            revision_department, revision_comment, revision_requested_at, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?21, ?22
        )",
    )
    .bind(&quote.id.0)
    .bind(&quote.org_id.0)
    .bind(&quote.number)
    .bind(&quote.customer)
    .bind(quote.contract_id.as_ref().map(|id| id.0.clone()))
    .bind(quote.deal_type.as_str())
    .bind(quote.status.as_str())
    .bind(&quote.currency)
    .bind(quote.total_amount.to_string())
    .bind(quote.prepayment_percent.to_string())
    .bind(quote.markup_percent.to_string())
    .bind(quote.dm_reward.map(|value| value.to_string()))
    .bind(&quote.sales_manager_id.0)
    .bind(quote.procurement_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.logistics_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.customs_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.sales_review_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.revision_department.map(|role| role.as_str()))
    .bind(&quote.revision_comment)
    .bind(quote.revision_requested_at.map(|at| at.to_rfc3339()))
    .bind(quote.created_at.to_rfc3339())
    .bind(quote.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_quote<'e, E>(executor: E, quote: &Quote) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE quotes SET
            contract_id = ?2, deal_type = ?3, status = ?4, currency = ?5, total_amount = ?6,
            prepayment_percent = ?7, markup_percent = ?8, dm_reward = ?9,
            procurement_done_at = ?10, logistics_done_at = ?11, customs_done_at = ?12,
            sales_review_done_at = ?13, revision_department = ?14, revision_comment = ?15,
            revision_requested_at = ?16, updated_at = ?17
        WHERE id = ?1",
    )
    .bind(&quote.id.0)
    .bind(quote.contract_id.as_ref().map(|id| id.0.clone()))
    .bind(quote.deal_type.as_str())
    .bind(quote.status.as_str())
    .bind(&quote.currency)
    .bind(quote.total_amount.to_string())
    .bind(quote.prepayment_percent.to_string())
    .bind(quote.markup_percent.to_string())
    .bind(quote.dm_reward.map(|value| value.to_string()))
    .bind(quote.procurement_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.logistics_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.customs_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.sales_review_done_at.map(|at| at.to_rfc3339()))
    .bind(quote.revision_department.map(|role| role.as_str()))
    .bind(&quote.revision_comment)
    .bind(quote.revision_requested_at.map(|at| at.to_rfc3339()))
    .bind(quote.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_quote<'e, E>(
    executor: E,
    id: &QuoteId,
) -> Result<Option<Quote>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?1"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_quote_row).transpose()
}

pub async fn list_quotes_by_status<'e, E>(
    executor: E,
    org_id: &OrgId,
    status: QuoteStatus,
) -> Result<Vec<Quote>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes
         WHERE org_id = ?1 AND status = ?2
         ORDER BY created_at, id"
    ))
    .bind(&org_id.0)
    .bind(status.as_str())
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_quote_row).collect()
}

pub async fn insert_item<'e, E>(executor: E, item: &QuoteItem) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO quote_items (
            id, quote_id, position, description, brand, quantity, unit_price,
            procurement_status, purchase_price, supplier, procurement_user_id,
            procurement_completed_at, procurement_completed_by, route, logistics_user_id,
            pickup_cost, linehaul_cost, delivery_cost, transit_days, customs_code,
            duty_percent, customs_extra_cost, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?21, ?22, ?23, ?24
        )",
    )
    .bind(&item.id.0)
    .bind(&item.quote_id.0)
    .bind(item.position)
    .bind(&item.description)
    .bind(&item.brand)
    .bind(item.quantity.to_string())
    .bind(item.unit_price.to_string())
    .bind(item.procurement_status.as_str())
    .bind(item.purchase_price.map(|value| value.to_string()))
    .bind(&item.supplier)
    .bind(item.procurement_user_id.as_ref().map(|id| id.0.clone()))
    .bind(item.procurement_completed_at.map(|at| at.to_rfc3339()))
    .bind(item.procurement_completed_by.as_ref().map(|id| id.0.clone()))
    .bind(&item.route)
    .bind(item.logistics_user_id.as_ref().map(|id| id.0.clone()))
    .bind(item.pickup_cost.map(|value| value.to_string()))
    .bind(item.linehaul_cost.map(|value| value.to_string()))
    .bind(item.delivery_cost.map(|value| value.to_string()))
    .bind(item.transit_days)
    .bind(&item.customs_code)
    .bind(item.duty_percent.map(|value| value.to_string()))
    .bind(item.customs_extra_cost.map(|value| value.to_string()))
    .bind(item.created_at.to_rfc3339())
    .bind(item.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_item<'e, E>(executor: E, item: &QuoteItem) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE quote_items SET
            description = ?2, brand = ?3, quantity = ?4, unit_price = ?5,
            procurement_status = ?6, purchase_price = ?7, supplier = ?8,
            procurement_user_id = ?9, procurement_completed_at = ?10,
            procurement_completed_by = ?11, route = ?12, logistics_user_id = ?13,
            pickup_cost = ?14, linehaul_cost = ?15, delivery_cost = ?16, transit_days = ?17,
            customs_code = ?18, duty_percent = ?19, customs_extra_cost = ?20, updated_at = ?21
        WHERE id = ?1",
    )
    .bind(&item.id.0)
    .bind(&item.description)
    .bind(&item.brand)
    .bind(item.quantity.to_string())
    .bind(item.unit_price.to_string())
    .bind(item.procurement_status.as_str())
    .bind(item.purchase_price.map(|value| value.to_string()))
    .bind(&item.supplier)
    .bind(item.procurement_user_id.as_ref().map(|id| id.0.clone()))
    .bind(item.procurement_completed_at.map(|at| at.to_rfc3339()))
    .bind(item.procurement_completed_by.as_ref().map(|id| id.0.clone()))
    .bind(&item.route)
    .bind(item.logistics_user_id.as_ref().map(|id| id.0.clone()))
    .bind(item.pickup_cost.map(|value| value.to_string()))
    .bind(item.linehaul_cost.map(|value| value.to_string()))
    .bind(item.delivery_cost.map(|value| value.to_string()))
    .bind(item.transit_days)
    .bind(&item.customs_code)
    .bind(item.duty_percent.map(|value| value.to_string()))
    .bind(item.customs_extra_cost.map(|value| value.to_string()))
    .bind(item.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_item<'e, E>(
    executor: E,
    id: &QuoteItemId,
) -> Result<Option<QuoteItem>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM quote_items WHERE id = ?1"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_item_row).transpose()
}

pub async fn list_items<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Vec<QuoteItem>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM quote_items WHERE quote_id = ?1 ORDER BY position"
    ))
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_item_row).collect()
}

pub async fn next_item_position<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<i64, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let position: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM quote_items WHERE quote_id = ?1",
    )
    .bind(&quote_id.0)
    .fetch_one(executor)
    .await?;
    Ok(position)
}

pub async fn distinct_procurement_users<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Vec<UserId>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT procurement_user_id FROM quote_items
         WHERE quote_id = ?1 AND procurement_user_id IS NOT NULL
         ORDER BY procurement_user_id",
    )
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(UserId).collect())
}

pub async fn distinct_logistics_users<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Vec<UserId>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT logistics_user_id FROM quote_items
         WHERE quote_id = ?1 AND logistics_user_id IS NOT NULL
         ORDER BY logistics_user_id",
    )
    .bind(&quote_id.0)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(UserId).collect())
}

/// Item rollup for the procurement gate, counted inside the transaction that
/// wants to take the edge.
pub async fn item_rollup<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<(usize, usize), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN procurement_status = 'completed' THEN 1 ELSE 0 END), 0)
                AS completed
         FROM quote_items WHERE quote_id = ?1",
    )
    .bind(&quote_id.0)
    .fetch_one(executor)
    .await?;
    let total: i64 = row.try_get("total")?;
    let completed: i64 = row.try_get("completed")?;
    Ok((total as usize, completed as usize))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use dealflow_core::domain::quote::{
        DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
    };
    use dealflow_core::domain::{OrgId, UserId};

    use super::{find_item, find_quote, insert_item, insert_quote, item_rollup, update_item};
    use crate::{connect_with_settings, migrations};

    fn sample_quote(id: &str) -> Quote {
        let now = Utc::now();
        Quote {
            id: QuoteId(id.to_string()),
            org_id: OrgId("org-1".to_string()),
            number: format!("Q-{id}"),
            customer: "Vostok Trading".to_string(),
            contract_id: None,
            deal_type: DealType::Supply,
            status: QuoteStatus::Draft,
            currency: "USD".to_string(),
            total_amount: Decimal::ZERO,
            prepayment_percent: Decimal::new(100, 0),
            markup_percent: Decimal::new(15, 0),
            dm_reward: None,
            sales_manager_id: UserId("sales-1".to_string()),
            procurement_done_at: None,
            logistics_done_at: None,
            customs_done_at: None,
            sales_review_done_at: None,
            revision_department: None,
            revision_comment: None,
            revision_requested_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_item(id: &str, quote_id: &str, position: i64) -> QuoteItem {
        let now = Utc::now();
        QuoteItem {
            id: QuoteItemId(id.to_string()),
            quote_id: QuoteId(quote_id.to_string()),
            position,
            description: "Gear pump".to_string(),
            brand: "Bosch Rexroth".to_string(),
            quantity: Decimal::new(4, 0),
            unit_price: Decimal::new(12_550, 2),
            procurement_status: ProcurementStatus::Pending,
            purchase_price: None,
            supplier: None,
            procurement_user_id: None,
            procurement_completed_at: None,
            procurement_completed_by: None,
            route: None,
            logistics_user_id: None,
            pickup_cost: None,
            linehaul_cost: None,
            delivery_cost: None,
            transit_days: None,
            customs_code: None,
            duty_percent: None,
            customs_extra_cost: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn quote_rows_round_trip_with_decimal_columns() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let mut quote = sample_quote("q-round-trip");
        quote.total_amount = Decimal::new(1_234_567, 2);
        quote.dm_reward = Some(Decimal::new(999, 2));
        insert_quote(&pool, &quote).await.expect("insert quote");

        let loaded = find_quote(&pool, &quote.id).await.expect("load").expect("quote exists");
        assert_eq!(loaded.total_amount, Decimal::new(1_234_567, 2));
        assert_eq!(loaded.dm_reward, Some(Decimal::new(999, 2)));
        assert_eq!(loaded.status, QuoteStatus::Draft);
        assert_eq!(loaded.number, quote.number);

        pool.close().await;
    }

    #[tokio::test]
    async fn item_rollup_counts_completed_rows() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5_000).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let quote = sample_quote("q-rollup");
        insert_quote(&pool, &quote).await.expect("insert quote");

        let first = sample_item("item-1", "q-rollup", 1);
        let mut second = sample_item("item-2", "q-rollup", 2);
        insert_item(&pool, &first).await.expect("insert first");
        insert_item(&pool, &second).await.expect("insert second");

        assert_eq!(item_rollup(&pool, &quote.id).await.expect("rollup"), (2, 0));

        second.procurement_status = ProcurementStatus::Completed;
        second.purchase_price = Some(Decimal::new(9_900, 2));
        second.procurement_completed_at = Some(Utc::now());
        second.procurement_completed_by = Some(UserId("proc-1".to_string()));
        update_item(&pool, &second).await.expect("update second");

        assert_eq!(item_rollup(&pool, &quote.id).await.expect("rollup"), (2, 1));

        let reloaded = find_item(&pool, &second.id).await.expect("load").expect("item exists");
        assert_eq!(reloaded.procurement_status, ProcurementStatus::Completed);
        assert_eq!(reloaded.purchase_price, Some(Decimal::new(9_900, 2)));

        pool.close().await;
    }
}
