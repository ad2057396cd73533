//! Row-level persistence. Every function is generic over [`sqlx::Executor`]
//! so the same statement runs against the pool or inside an open transaction;
//! services own transaction boundaries, repositories never begin one.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use dealflow_core::errors::DomainError;

pub mod approval;
pub mod assignment;
pub mod contract;
pub mod notification;
pub mod quote;
pub mod settlement;
pub mod transition;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Money columns are NUMERIC; they are selected as `CAST(col AS TEXT)` and
/// parsed here so no float conversion ever touches an amount.
pub(crate) fn decode_decimal(raw: &str, column: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}

pub(crate) fn decode_decimal_opt(
    raw: Option<String>,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    raw.map(|value| decode_decimal(&value, column)).transpose()
}

/// Timestamps are stored as RFC 3339 text. Keeping the stored string and the
/// hash material identical is what makes the transition chain verifiable.
pub(crate) fn decode_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}

pub(crate) fn decode_timestamp_opt(
    raw: Option<String>,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| decode_timestamp(&value, column)).transpose()
}

pub(crate) fn decode_date(raw: &str, column: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::from_str(raw)
        .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}

pub(crate) fn decode_date_opt(
    raw: Option<String>,
    column: &str,
) -> Result<Option<NaiveDate>, RepositoryError> {
    raw.map(|value| decode_date(&value, column)).transpose()
}

/// Enum columns round-trip through the domain `parse` constructors; a value
/// they reject is a corrupt row, not a caller error.
pub(crate) fn decode_domain<T>(
    parsed: Result<T, DomainError>,
    column: &str,
) -> Result<T, RepositoryError> {
    parsed.map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    column: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|err| RepositoryError::Decode(format!("column `{column}`: {err}")))
}
