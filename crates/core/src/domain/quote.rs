use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contract::ContractId;
use crate::domain::{OrgId, UserId};
use crate::errors::DomainError;
use crate::roles::Role;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteItemId(pub String);

/// Commercial shape of the deal behind the quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Supply,
    Transit,
    Brokerage,
}

impl DealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::Supply => "supply",
            DealType::Transit => "transit",
            DealType::Brokerage => "brokerage",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "supply" => Ok(DealType::Supply),
            "transit" => Ok(DealType::Transit),
            "brokerage" => Ok(DealType::Brokerage),
            other => Err(DomainError::validation(format!("unknown deal type `{other}`"))),
        }
    }
}

/// The fixed quote lifecycle. The pipeline is not configurable: these
/// fifteen statuses and the edges between them are the whole state space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    PendingProcurement,
    PendingLogistics,
    PendingCustoms,
    PendingSalesReview,
    PendingQuoteControl,
    PendingApproval,
    Approved,
    SentToClient,
    ClientNegotiation,
    PendingSpecControl,
    PendingSignature,
    Deal,
    Rejected,
    Cancelled,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 15] = [
        QuoteStatus::Draft,
        QuoteStatus::PendingProcurement,
        QuoteStatus::PendingLogistics,
        QuoteStatus::PendingCustoms,
        QuoteStatus::PendingSalesReview,
        QuoteStatus::PendingQuoteControl,
        QuoteStatus::PendingApproval,
        QuoteStatus::Approved,
        QuoteStatus::SentToClient,
        QuoteStatus::ClientNegotiation,
        QuoteStatus::PendingSpecControl,
        QuoteStatus::PendingSignature,
        QuoteStatus::Deal,
        QuoteStatus::Rejected,
        QuoteStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::PendingProcurement => "pending_procurement",
            QuoteStatus::PendingLogistics => "pending_logistics",
            QuoteStatus::PendingCustoms => "pending_customs",
            QuoteStatus::PendingSalesReview => "pending_sales_review",
            QuoteStatus::PendingQuoteControl => "pending_quote_control",
            QuoteStatus::PendingApproval => "pending_approval",
            QuoteStatus::Approved => "approved",
            QuoteStatus::SentToClient => "sent_to_client",
            QuoteStatus::ClientNegotiation => "client_negotiation",
            QuoteStatus::PendingSpecControl => "pending_spec_control",
            QuoteStatus::PendingSignature => "pending_signature",
            QuoteStatus::Deal => "deal",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(QuoteStatus::Draft),
            "pending_procurement" => Ok(QuoteStatus::PendingProcurement),
            "pending_logistics" => Ok(QuoteStatus::PendingLogistics),
            "pending_customs" => Ok(QuoteStatus::PendingCustoms),
            "pending_sales_review" => Ok(QuoteStatus::PendingSalesReview),
            "pending_quote_control" => Ok(QuoteStatus::PendingQuoteControl),
            "pending_approval" => Ok(QuoteStatus::PendingApproval),
            "approved" => Ok(QuoteStatus::Approved),
            "sent_to_client" => Ok(QuoteStatus::SentToClient),
            "client_negotiation" => Ok(QuoteStatus::ClientNegotiation),
            "pending_spec_control" => Ok(QuoteStatus::PendingSpecControl),
            "pending_signature" => Ok(QuoteStatus::PendingSignature),
            "deal" => Ok(QuoteStatus::Deal),
            "rejected" => Ok(QuoteStatus::Rejected),
            "cancelled" => Ok(QuoteStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown quote status `{other}`"))),
        }
    }

    /// Terminal statuses have no outgoing edges, cancellation included.
    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Deal | QuoteStatus::Rejected | QuoteStatus::Cancelled)
    }

    /// The department expected to act while the quote sits in this status.
    /// Drives notification targeting after a transition commits.
    pub fn responsible_role(&self) -> Option<Role> {
        match self {
            QuoteStatus::Draft
            | QuoteStatus::Approved
            | QuoteStatus::SentToClient
            | QuoteStatus::ClientNegotiation
            | QuoteStatus::PendingSalesReview => Some(Role::SalesManager),
            QuoteStatus::PendingProcurement => Some(Role::Procurement),
            QuoteStatus::PendingLogistics => Some(Role::Logistics),
            QuoteStatus::PendingCustoms => Some(Role::Customs),
            QuoteStatus::PendingQuoteControl
            | QuoteStatus::PendingSpecControl
            | QuoteStatus::PendingSignature => Some(Role::QuoteControl),
            QuoteStatus::PendingApproval => Some(Role::SeniorManagement),
            QuoteStatus::Deal | QuoteStatus::Rejected | QuoteStatus::Cancelled => None,
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-item procurement progress. The quote-level gate out of
/// `pending_procurement` is a rollup over this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementStatus {
    Pending,
    InProgress,
    Completed,
}

impl ProcurementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementStatus::Pending => "pending",
            ProcurementStatus::InProgress => "in_progress",
            ProcurementStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ProcurementStatus::Pending),
            "in_progress" => Ok(ProcurementStatus::InProgress),
            "completed" => Ok(ProcurementStatus::Completed),
            other => {
                Err(DomainError::validation(format!("unknown procurement status `{other}`")))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub org_id: OrgId,
    pub number: String,
    pub customer: String,
    pub contract_id: Option<ContractId>,
    pub deal_type: DealType,
    pub status: QuoteStatus,
    pub currency: String,
    pub total_amount: Decimal,
    pub prepayment_percent: Decimal,
    pub markup_percent: Decimal,
    pub dm_reward: Option<Decimal>,
    pub sales_manager_id: UserId,
    pub procurement_done_at: Option<DateTime<Utc>>,
    pub logistics_done_at: Option<DateTime<Utc>>,
    pub customs_done_at: Option<DateTime<Utc>>,
    pub sales_review_done_at: Option<DateTime<Utc>>,
    pub revision_department: Option<Role>,
    pub revision_comment: Option<String>,
    pub revision_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: QuoteItemId,
    pub quote_id: QuoteId,
    pub position: i64,
    pub description: String,
    pub brand: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub procurement_status: ProcurementStatus,
    pub purchase_price: Option<Decimal>,
    pub supplier: Option<String>,
    pub procurement_user_id: Option<UserId>,
    pub procurement_completed_at: Option<DateTime<Utc>>,
    pub procurement_completed_by: Option<UserId>,
    pub route: Option<String>,
    pub logistics_user_id: Option<UserId>,
    pub pickup_cost: Option<Decimal>,
    pub linehaul_cost: Option<Decimal>,
    pub delivery_cost: Option<Decimal>,
    pub transit_days: Option<i64>,
    pub customs_code: Option<String>,
    pub duty_percent: Option<Decimal>,
    pub customs_extra_cost: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteItem {
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// Sum of the three freight legs, treating unset legs as zero.
    pub fn freight_cost(&self) -> Decimal {
        self.pickup_cost.unwrap_or(Decimal::ZERO)
            + self.linehaul_cost.unwrap_or(Decimal::ZERO)
            + self.delivery_cost.unwrap_or(Decimal::ZERO)
    }

    /// Duty over the purchase value plus any flat extra charge.
    pub fn customs_cost(&self) -> Decimal {
        let duty = match (self.purchase_price, self.duty_percent) {
            (Some(price), Some(duty_percent)) => {
                price * self.quantity * duty_percent / Decimal::ONE_HUNDRED
            }
            _ => Decimal::ZERO,
        };
        duty + self.customs_extra_cost.unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{DealType, ProcurementStatus, QuoteStatus};

    #[test]
    fn status_strings_round_trip_all_fifteen_values() {
        assert_eq!(QuoteStatus::ALL.len(), 15);
        for status in QuoteStatus::ALL {
            assert_eq!(QuoteStatus::parse(status.as_str()).expect("round trip"), status);
        }
    }

    #[test]
    fn unknown_status_string_is_a_validation_error() {
        let error = QuoteStatus::parse("shipped").expect_err("no such status");
        assert!(error.to_string().contains("shipped"));
    }

    #[test]
    fn terminal_statuses_are_deal_rejected_cancelled() {
        let terminal: Vec<QuoteStatus> =
            QuoteStatus::ALL.into_iter().filter(QuoteStatus::is_terminal).collect();
        assert_eq!(
            terminal,
            vec![QuoteStatus::Deal, QuoteStatus::Rejected, QuoteStatus::Cancelled]
        );
    }

    #[test]
    fn every_non_terminal_status_has_a_responsible_role() {
        for status in QuoteStatus::ALL {
            assert_eq!(status.responsible_role().is_none(), status.is_terminal());
        }
    }

    #[test]
    fn deal_type_round_trips() {
        for deal_type in [DealType::Supply, DealType::Transit, DealType::Brokerage] {
            assert_eq!(DealType::parse(deal_type.as_str()).expect("round trip"), deal_type);
        }
    }

    #[test]
    fn procurement_status_rejects_unknown_value() {
        assert!(ProcurementStatus::parse("ordered").is_err());
        assert_eq!(
            ProcurementStatus::parse("in_progress").expect("parse"),
            ProcurementStatus::InProgress
        );
    }

    #[test]
    fn customs_cost_combines_duty_and_extra_charge() {
        let mut item = crate::domain::quote::QuoteItem {
            id: crate::domain::quote::QuoteItemId("item-1".to_string()),
            quote_id: crate::domain::quote::QuoteId("q-1".to_string()),
            position: 1,
            description: "bearing assembly".to_string(),
            brand: "SKF".to_string(),
            quantity: Decimal::from(10),
            unit_price: Decimal::new(12_50, 2),
            procurement_status: ProcurementStatus::Completed,
            purchase_price: Some(Decimal::new(8_00, 2)),
            supplier: Some("Baltic Bearings".to_string()),
            procurement_user_id: None,
            procurement_completed_at: None,
            procurement_completed_by: None,
            route: None,
            logistics_user_id: None,
            pickup_cost: Some(Decimal::new(30_00, 2)),
            linehaul_cost: Some(Decimal::new(120_00, 2)),
            delivery_cost: None,
            transit_days: Some(12),
            customs_code: Some("8482 10".to_string()),
            duty_percent: Some(Decimal::from(5)),
            customs_extra_cost: Some(Decimal::new(15_00, 2)),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        // duty: 8.00 * 10 * 5% = 4.00, plus 15.00 extra
        assert_eq!(item.customs_cost(), Decimal::new(19_00, 2));
        assert_eq!(item.freight_cost(), Decimal::new(150_00, 2));
        assert_eq!(item.line_total(), Decimal::new(125_00, 2));

        item.duty_percent = None;
        assert_eq!(item.customs_cost(), Decimal::new(15_00, 2));
    }
}
