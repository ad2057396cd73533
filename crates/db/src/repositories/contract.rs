use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use dealflow_core::domain::contract::{
    Contract, ContractId, Deal, DealId, DealStatus, Specification, SpecificationId,
    SpecificationStatus,
};
use dealflow_core::domain::quote::QuoteId;
use dealflow_core::domain::OrgId;

use crate::repositories::{
    decode_decimal, decode_domain, decode_json, decode_timestamp, decode_timestamp_opt,
    RepositoryError,
};

pub(crate) const SPECIFICATION_COLUMNS: &str = "\
    id, org_id, quote_id, contract_id, number, status, currency, \
    CAST(total_amount AS TEXT) AS total_amount_text, \
    payload, signed_at, created_at, updated_at";

pub(crate) const DEAL_COLUMNS: &str = "\
    id, org_id, specification_id, quote_id, number, status, currency, \
    CAST(amount AS TEXT) AS amount_text, \
    completed_at, cancelled_at, created_at, updated_at";

pub fn map_contract_row(row: &SqliteRow) -> Result<Contract, RepositoryError> {
    Ok(Contract {
        id: ContractId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        customer: row.try_get("customer")?,
        number: row.try_get("number")?,
        last_specification_no: row.try_get("last_specification_no")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_specification_row(row: &SqliteRow) -> Result<Specification, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(Specification {
        id: SpecificationId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        contract_id: ContractId(row.try_get("contract_id")?),
        number: row.try_get("number")?,
        status: decode_domain(SpecificationStatus::parse(&status), "status")?,
        currency: row.try_get("currency")?,
        total_amount: decode_decimal(
            &row.try_get::<String, _>("total_amount_text")?,
            "total_amount",
        )?,
        payload: decode_json(&row.try_get::<String, _>("payload")?, "payload")?,
        signed_at: decode_timestamp_opt(row.try_get("signed_at")?, "signed_at")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub fn map_deal_row(row: &SqliteRow) -> Result<Deal, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(Deal {
        id: DealId(row.try_get("id")?),
        org_id: OrgId(row.try_get("org_id")?),
        specification_id: SpecificationId(row.try_get("specification_id")?),
        quote_id: QuoteId(row.try_get("quote_id")?),
        number: row.try_get("number")?,
        status: decode_domain(DealStatus::parse(&status), "status")?,
        currency: row.try_get("currency")?,
        amount: decode_decimal(&row.try_get::<String, _>("amount_text")?, "amount")?,
        completed_at: decode_timestamp_opt(row.try_get("completed_at")?, "completed_at")?,
        cancelled_at: decode_timestamp_opt(row.try_get("cancelled_at")?, "cancelled_at")?,
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at")?, "created_at")?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at")?, "updated_at")?,
    })
}

pub async fn insert_contract<'e, E>(executor: E, contract: &Contract) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO contracts (
            id, org_id, customer, number, last_specification_no, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&contract.id.0)
    .bind(&contract.org_id.0)
    .bind(&contract.customer)
    .bind(&contract.number)
    .bind(contract.last_specification_no)
    .bind(contract.created_at.to_rfc3339())
    .bind(contract.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_contract<'e, E>(
    executor: E,
    id: &ContractId,
) -> Result<Option<Contract>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM contracts WHERE id = ?1")
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_contract_row).transpose()
}

/// Burns the next specification number on the quote's contract. Issued as the
/// first write of the issuance transaction so concurrent issuers serialize on
/// the contract row before either has read anything stale.
pub async fn allocate_specification_no<'e, E>(
    executor: E,
    quote_id: &QuoteId,
    updated_at: &str,
) -> Result<Option<(ContractId, i64)>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "UPDATE contracts
         SET last_specification_no = last_specification_no + 1, updated_at = ?2
         WHERE id = (SELECT contract_id FROM quotes WHERE id = ?1)
         RETURNING id, last_specification_no",
    )
    .bind(&quote_id.0)
    .bind(updated_at)
    .fetch_optional(executor)
    .await?;

    row.map(|row| {
        Ok::<_, RepositoryError>((
            ContractId(row.try_get("id")?),
            row.try_get::<i64, _>("last_specification_no")?,
        ))
    })
    .transpose()
}

pub async fn insert_specification<'e, E>(
    executor: E,
    specification: &Specification,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO specifications (
            id, org_id, quote_id, contract_id, number, status, currency, total_amount,
            payload, signed_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&specification.id.0)
    .bind(&specification.org_id.0)
    .bind(&specification.quote_id.0)
    .bind(&specification.contract_id.0)
    .bind(specification.number)
    .bind(specification.status.as_str())
    .bind(&specification.currency)
    .bind(specification.total_amount.to_string())
    .bind(specification.payload.to_string())
    .bind(specification.signed_at.map(|at| at.to_rfc3339()))
    .bind(specification.created_at.to_rfc3339())
    .bind(specification.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_specification_status<'e, E>(
    executor: E,
    specification: &Specification,
) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE specifications SET status = ?2, signed_at = ?3, updated_at = ?4 WHERE id = ?1",
    )
    .bind(&specification.id.0)
    .bind(specification.status.as_str())
    .bind(specification.signed_at.map(|at| at.to_rfc3339()))
    .bind(specification.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_specification<'e, E>(
    executor: E,
    id: &SpecificationId,
) -> Result<Option<Specification>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {SPECIFICATION_COLUMNS} FROM specifications WHERE id = ?1"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_specification_row).transpose()
}

/// Latest specification issued for the quote, signed or not.
pub async fn latest_specification_for_quote<'e, E>(
    executor: E,
    quote_id: &QuoteId,
) -> Result<Option<Specification>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {SPECIFICATION_COLUMNS} FROM specifications
         WHERE quote_id = ?1
         ORDER BY number DESC
         LIMIT 1"
    ))
    .bind(&quote_id.0)
    .fetch_optional(executor)
    .await?;
    row.as_ref().map(map_specification_row).transpose()
}

pub async fn list_specifications_by_status<'e, E>(
    executor: E,
    org_id: &OrgId,
    status: SpecificationStatus,
) -> Result<Vec<Specification>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {SPECIFICATION_COLUMNS} FROM specifications
         WHERE org_id = ?1 AND status = ?2
         ORDER BY created_at, id"
    ))
    .bind(&org_id.0)
    .bind(status.as_str())
    .fetch_all(executor)
    .await?;
    rows.iter().map(map_specification_row).collect()
}

pub async fn insert_deal<'e, E>(executor: E, deal: &Deal) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO deals (
            id, org_id, specification_id, quote_id, number, status, currency, amount,
            completed_at, cancelled_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(&deal.id.0)
    .bind(&deal.org_id.0)
    .bind(&deal.specification_id.0)
    .bind(&deal.quote_id.0)
    .bind(&deal.number)
    .bind(deal.status.as_str())
    .bind(&deal.currency)
    .bind(deal.amount.to_string())
    .bind(deal.completed_at.map(|at| at.to_rfc3339()))
    .bind(deal.cancelled_at.map(|at| at.to_rfc3339()))
    .bind(deal.created_at.to_rfc3339())
    .bind(deal.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn update_deal_status<'e, E>(executor: E, deal: &Deal) -> Result<(), RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE deals SET status = ?2, completed_at = ?3, cancelled_at = ?4, updated_at = ?5
         WHERE id = ?1",
    )
    .bind(&deal.id.0)
    .bind(deal.status.as_str())
    .bind(deal.completed_at.map(|at| at.to_rfc3339()))
    .bind(deal.cancelled_at.map(|at| at.to_rfc3339()))
    .bind(deal.updated_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn find_deal<'e, E>(executor: E, id: &DealId) -> Result<Option<Deal>, RepositoryError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1"))
        .bind(&id.0)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(map_deal_row).transpose()
}
