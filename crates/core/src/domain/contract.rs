use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteId;
use crate::domain::OrgId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecificationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealId(pub String);

/// Customer contract; owner of the per-contract specification counter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub org_id: OrgId,
    pub customer: String,
    pub number: String,
    pub last_specification_no: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificationStatus {
    Issued,
    Signed,
    Cancelled,
}

impl SpecificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecificationStatus::Issued => "issued",
            SpecificationStatus::Signed => "signed",
            SpecificationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "issued" => Ok(SpecificationStatus::Issued),
            "signed" => Ok(SpecificationStatus::Signed),
            "cancelled" => Ok(SpecificationStatus::Cancelled),
            other => {
                Err(DomainError::validation(format!("unknown specification status `{other}`")))
            }
        }
    }
}

impl fmt::Display for SpecificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a quote issued against a contract. The payload
/// captures the quote and its items at issuance; later edits to the quote
/// never reach back into it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub id: SpecificationId,
    pub org_id: OrgId,
    pub quote_id: QuoteId,
    pub contract_id: ContractId,
    pub number: i64,
    pub status: SpecificationStatus,
    pub currency: String,
    pub total_amount: Decimal,
    pub payload: serde_json::Value,
    pub signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Active,
    Completed,
    Cancelled,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Active => "active",
            DealStatus::Completed => "completed",
            DealStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(DealStatus::Active),
            "completed" => Ok(DealStatus::Completed),
            "cancelled" => Ok(DealStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown deal status `{other}`"))),
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The executed deal behind a signed specification. Currency and amount are
/// copied at creation and never drift with later quote edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub org_id: OrgId,
    pub specification_id: SpecificationId,
    pub quote_id: QuoteId,
    pub number: String,
    pub status: DealStatus,
    pub currency: String,
    pub amount: Decimal,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Deals move one way: `active` is the only status with outgoing edges.
    pub fn can_transition_to(&self, next: DealStatus) -> bool {
        matches!(
            (self.status, next),
            (DealStatus::Active, DealStatus::Completed)
                | (DealStatus::Active, DealStatus::Cancelled)
        )
    }

    pub fn transition_to(&mut self, next: DealStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::validation(format!(
            "deal `{}` cannot move from `{}` to `{}`",
            self.number, self.status, next
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{
        Deal, DealId, DealStatus, SpecificationId, SpecificationStatus,
    };
    use crate::domain::quote::QuoteId;
    use crate::domain::OrgId;

    fn deal(status: DealStatus) -> Deal {
        Deal {
            id: DealId("deal-1".to_string()),
            org_id: OrgId("org-1".to_string()),
            specification_id: SpecificationId("spec-1".to_string()),
            quote_id: QuoteId("q-1".to_string()),
            number: "D-2026-0001".to_string(),
            status,
            currency: "USD".to_string(),
            amount: Decimal::new(125_000_00, 2),
            completed_at: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn active_deal_can_complete_or_cancel() {
        let mut completed = deal(DealStatus::Active);
        completed.transition_to(DealStatus::Completed).expect("active -> completed");

        let mut cancelled = deal(DealStatus::Active);
        cancelled.transition_to(DealStatus::Cancelled).expect("active -> cancelled");
    }

    #[test]
    fn completed_deal_cannot_be_cancelled() {
        let mut deal = deal(DealStatus::Completed);
        let error = deal
            .transition_to(DealStatus::Cancelled)
            .expect_err("completed deals are closed for good");
        assert!(error.to_string().contains("completed"));
    }

    #[test]
    fn specification_status_round_trips() {
        for status in [
            SpecificationStatus::Issued,
            SpecificationStatus::Signed,
            SpecificationStatus::Cancelled,
        ] {
            assert_eq!(
                SpecificationStatus::parse(status.as_str()).expect("round trip"),
                status
            );
        }
    }
}
