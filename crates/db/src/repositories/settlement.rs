use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::domain::contract::DealId;
use dealflow_core::domain::settlement::{
    CategoryKind, InvoiceId, InvoiceStatus, PaymentId, PlanFactCategory, PlanFactItem,
    PlanFactItemId, PlanFactStatus, SupplierInvoice, SupplierInvoicePayment,
};
use dealflow_core::domain::OrgId;

use crate::repositories::{
    decode_date, decode_date_opt, decode_decimal, decode_decimal_opt, decode_domain,
    decode_timestamp, RepositoryError,
};

pub(crate) const PLAN_FACT_COLUMNS: &str = "\
    id, org_id, deal_id, category_code, title, \
    CAST(planned_amount AS TEXT) AS planned_amount_text, \
    planned_date, \
    CAST(actual_amount AS TEXT) AS actual_amount_text, \
    actual_currency, \
    CAST(exchange_rate AS TEXT) AS exchange_rate_text, \
    actual_date, \
    CAST(actual_base_amount AS TEXT) AS actual_base_amount_text, \
    CAST(variance AS TEXT) AS variance_text, \
    CAST(variance_percent AS TEXT) AS variance_percent_text, \
    status, created_at, updated_at";

pub(crate) const INVOICE_COLUMNS: &str = "\
    id, org_id, deal_id, number, supplier, \
    CAST(total_amount AS TEXT) AS total_amount_text, \
    currency, due_date, status, created_at, updated_at";

pub(crate) const PAYMENT_COLUMNS: &str = "\
    id, invoice_id, CAST(amount AS TEXT) AS amount_text, paid_at, is_refund, note, created_at";

pub fn map_category_row(row: &SqliteRow) -> Result<PlanFactCategory, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    Ok(PlanFactCategory {
        code: row.try_get("code")?,
        title: row.try_get("title")?,
        kind: decode_domain(CategoryKind::parse(&kind), "kind")?,
    })
}

pub fn map_plan_fact_row(row: &SqliteRow) -> Result<PlanFactItem, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(PlanFactItem {
        id: PlanFactItemId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        deal_id: DealId(row.try_get("deal_id")?),
        category_code: row.try_get("category_code")?,
        title: row.try_get("title")?,
        planned_amount: decode_decimal_opt(row.try_get("planned_amount_text")?, "planned_amount")?,
        planned_date: decode_date_opt(row.try_get("planned_date")?, "planned_date")?,
        actual_amount: decode_decimal_opt(row.try_get("actual_amount_text")?, "actual_amount")?,
        actual_currency: row.try_get("actual_currency")?,
        exchange_rate: decode_decimal_opt(row.try_get("exchange_rate_text")?, "exchange_rate")?,
        actual_date: decode_date_opt(row.try_get("actual_date")?, "actual_date")?,
        actual_base_amount: decode_decimal_opt(
            row.try_get("actual_base_amount_text")?,
            "actual_base_amount",
        )?,
        variance: decode_decimal_opt(row.try_get("variance_text")?, "variance")?,
        variance_percent: decode_decimal_opt(
            row.try_get("variance_percent_text")?,
            "variance_percent",
        )?,
        status: decode_domain(PlanFactStatus::parse(&status), "status")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_invoice_row(row: &SqliteRow) -> Result<SupplierInvoice, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(SupplierInvoice {
        id: InvoiceId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        deal_id: row.try_get::<Option<String>, _>("deal_id")?.map(DealId),
        number: row.try_get("number")?,
        supplier: row.try_get("supplier")?,
        total_amount: decode_decimal(
            &row.try_get::<String, _>("total_amount_text")?,
            "total_amount",
        )?,
        currency: row.try_get("currency")?,
        due_date: decode_date_opt(row.try_get("due_date")?, "due_date")?,
        status: decode_domain(InvoiceStatus::parse(&status), "status")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_payment_row(row: &SqliteRow) -> Result<SupplierInvoicePayment, RepositoryError> {
    Ok(SupplierInvoicePayment {
        id: PaymentId(row.try_get("id")?),
        invoice_id: InvoiceId(row.try_get("invoice_id")?),
        amount: decode_decimal(&row.try_get::<String, _>("amount_text")?, "amount")?,
        paid_at: decode_date(&row.try_get::<String, _>("paid_at")?, "paid_at")?,
        is_refund: row.try_get::<i64, _>("is_refund")? != 0,
        note: row.try_get("note")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
    })
}

pub async fn list_categories<'e, E>(executor: E) -> Result<Vec<PlanFactCategory>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query("SELECT code, kind, title FROM plan_fact_categories ORDER BY sort_order")
        .fetch_all(executor)
        .await?;
    rows.iter().map(map_category_row).collect()
}

pub async fn find_category<'e, E>(
    executor: E,
    code: &str,
) -> Result<Option<PlanFactCategory>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT code, kind, title FROM plan_fact_categories WHERE code = ?1")
        .bind(code)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_category_row).transpose()
}

pub async fn insert_plan_fact_item<'e, E>(
    executor: E,
    item: &PlanFactItem,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO plan_fact_items (
            id, org_id, deal_id, category_code, title, planned_amount, planned_date,
            actual_amount, actual_currency, exchange_rate, actual_date, actual_base_amount,
            variance, variance_percent, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
    )
    .bind(&item.id.0)
    .bind(&item.org_id.0)
    .bind(&item.deal_id.0)
    .bind(&item.category_code)
    .bind(&item.title)
    .bind(item.planned_amount.map(|value| value.to_string()))
    .bind(item.planned_date.map(|date| date.to_string()))
    .bind(item.actual_amount.map(|value| value.to_string()))
    .bind(&item.actual_currency)
    .bind(item.exchange_rate.map(|value| value.to_string()))
    .bind(item.actual_date.map(|date| date.to_string()))
    .bind(item.actual_base_amount.map(|value| value.to_string()))
    .bind(item.variance.map(|value| value.to_string()))
    .bind(item.variance_percent.map(|value| value.to_string()))
    .bind(item.status.as_str())
    .bind(item.created_at.to_rfc3339())
    .bind(item.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_plan_fact_item<'e, E>(
    executor: E,
    item: &PlanFactItem,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE plan_fact_items SET
            category_code = ?2, title = ?3, planned_amount = ?4, planned_date = ?5,
            actual_amount = ?6, actual_currency = ?7, exchange_rate = ?8, actual_date = ?9,
            actual_base_amount = ?10, variance = ?11, variance_percent = ?12, status = ?13,
            updated_at = ?14
        WHERE id = ?1",
    )
    .bind(&item.id.0)
    .bind(&item.category_code)
    .bind(&item.title)
    .bind(item.planned_amount.map(|value| value.to_string()))
    .bind(item.planned_date.map(|date| date.to_string()))
    .bind(item.actual_amount.map(|value| value.to_string()))
    .bind(&item.actual_currency)
    .bind(item.exchange_rate.map(|value| value.to_string()))
    .bind(item.actual_date.map(|date| date.to_string()))
    .bind(item.actual_base_amount.map(|value| value.to_string()))
    .bind(item.variance.map(|value| value.to_string()))
    .bind(item.variance_percent.map(|value| value.to_string()))
    .bind(item.status.as_str())
    .bind(item.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_plan_fact_item<'e, E>(
    executor: E,
    id: &PlanFactItemId,
) -> Result<Option<PlanFactItem>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {PLAN_FACT_COLUMNS} FROM plan_fact_items WHERE id = ?1"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_plan_fact_row).transpose()
}

pub async fn list_plan_fact_items<'e, E>(
    executor: E,
    deal_id: &DealId,
) -> Result<Vec<PlanFactItem>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {PLAN_FACT_COLUMNS} FROM plan_fact_items
         WHERE deal_id = ?1
         ORDER BY created_at, id"
    ))
    .bind(&deal_id.0)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_plan_fact_row).collect()
}

pub async fn insert_invoice<'e, E>(
    executor: E,
    invoice: &SupplierInvoice,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO supplier_invoices (
            id, org_id, deal_id, number, supplier, total_amount, currency, due_date, status,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&invoice.id.0)
    .bind(&invoice.org_id.0)
    .bind(invoice.deal_id.as_ref().map(|id| id.0.clone()))
    .bind(&invoice.number)
    .bind(&invoice.supplier)
    .bind(invoice.total_amount.to_string())
    .bind(&invoice.currency)
    .bind(invoice.due_date.map(|date| date.to_string()))
    .bind(invoice.status.as_str())
    .bind(invoice.created_at.to_rfc3339())
    .bind(invoice.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_invoice_status<'e, E>(
    executor: E,
    invoice: &SupplierInvoice,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE supplier_invoices SET status = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(&invoice.id.0)
        .bind(invoice.status.as_str())
        .bind(invoice.updated_at.to_rfc3339())
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn find_invoice<'e, E>(
    executor: E,
    id: &InvoiceId,
) -> Result<Option<SupplierInvoice>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {INVOICE_COLUMNS} FROM supplier_invoices WHERE id = ?1"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_invoice_row).transpose()
}

pub async fn insert_payment<'e, E>(
    executor: E,
    payment: &SupplierInvoicePayment,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO supplier_invoice_payments (
            id, invoice_id, amount, paid_at, is_refund, note, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&payment.id.0)
    .bind(&payment.invoice_id.0)
    .bind(payment.amount.to_string())
    .bind(payment.paid_at.to_string())
    .bind(i64::from(payment.is_refund))
    .bind(&payment.note)
    .bind(payment.created_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_payment<'e, E>(
    executor: E,
    payment: &SupplierInvoicePayment,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE supplier_invoice_payments
         SET amount = ?2, paid_at = ?3, is_refund = ?4, note = ?5
         WHERE id = ?1",
    )
    .bind(&payment.id.0)
    .bind(payment.amount.to_string())
    .bind(payment.paid_at.to_string())
    .bind(i64::from(payment.is_refund))
    .bind(&payment.note)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn delete_payment<'e, E>(executor: E, id: &PaymentId) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM supplier_invoice_payments WHERE id = ?1")
        .bind(&id.0)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn find_payment<'e, E>(
    executor: E,
    id: &PaymentId,
) -> Result<Option<SupplierInvoicePayment>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM supplier_invoice_payments WHERE id = ?1"
    ))
    .bind(&id.0)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_payment_row).transpose()
}

pub async fn list_payments<'e, E>(
    executor: E,
    invoice_id: &InvoiceId,
) -> Result<Vec<SupplierInvoicePayment>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM supplier_invoice_payments
         WHERE invoice_id = ?1
         ORDER BY paid_at, created_at, id"
    ))
    .bind(&invoice_id.0)
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_payment_row).collect()
}
