use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contract::DealId;
use crate::domain::OrgId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanFactItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

/// Direction of money movement for a settlement category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(DomainError::validation(format!("unknown category kind `{other}`"))),
        }
    }
}

/// Registry row for a settlement category. Seeded once by migration; ledger
/// lines reference categories by their stable code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFactCategory {
    pub code: String,
    pub title: String,
    pub kind: CategoryKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFactStatus {
    Planned,
    Partial,
    Completed,
    Cancelled,
    Overdue,
}

impl PlanFactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanFactStatus::Planned => "planned",
            PlanFactStatus::Partial => "partial",
            PlanFactStatus::Completed => "completed",
            PlanFactStatus::Cancelled => "cancelled",
            PlanFactStatus::Overdue => "overdue",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(PlanFactStatus::Planned),
            "partial" => Ok(PlanFactStatus::Partial),
            "completed" => Ok(PlanFactStatus::Completed),
            "cancelled" => Ok(PlanFactStatus::Cancelled),
            "overdue" => Ok(PlanFactStatus::Overdue),
            other => {
                Err(DomainError::validation(format!("unknown plan-fact status `{other}`")))
            }
        }
    }
}

impl fmt::Display for PlanFactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned-versus-actual settlement line owned by a deal. The planned
/// pair and the actual tuple are each optional; the derived columns are
/// recomputed on every write and never edited directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanFactItem {
    pub id: PlanFactItemId,
    pub org_id: OrgId,
    pub deal_id: DealId,
    pub category_code: String,
    pub title: String,
    pub planned_amount: Option<Decimal>,
    pub planned_date: Option<NaiveDate>,
    pub actual_amount: Option<Decimal>,
    pub actual_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub actual_date: Option<NaiveDate>,
    pub actual_base_amount: Option<Decimal>,
    pub variance: Option<Decimal>,
    pub variance_percent: Option<Decimal>,
    pub status: PlanFactStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InvoiceStatus::Pending),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(DomainError::validation(format!("unknown invoice status `{other}`"))),
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier invoice whose payment status is derived from its payments,
/// never set directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierInvoice {
    pub id: InvoiceId,
    pub org_id: OrgId,
    pub deal_id: Option<DealId>,
    pub number: String,
    pub supplier: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplierInvoicePayment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub paid_at: NaiveDate,
    pub is_refund: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{CategoryKind, InvoiceStatus, PlanFactStatus};

    #[test]
    fn plan_fact_status_round_trips() {
        for status in [
            PlanFactStatus::Planned,
            PlanFactStatus::Partial,
            PlanFactStatus::Completed,
            PlanFactStatus::Cancelled,
            PlanFactStatus::Overdue,
        ] {
            assert_eq!(PlanFactStatus::parse(status.as_str()).expect("round trip"), status);
        }
        assert!(PlanFactStatus::parse("settled").is_err());
    }

    #[test]
    fn invoice_status_round_trips() {
        for status in [
            InvoiceStatus::Pending,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(InvoiceStatus::parse(status.as_str()).expect("round trip"), status);
        }
    }

    #[test]
    fn category_kind_rejects_unknown_direction() {
        assert_eq!(CategoryKind::parse("income").expect("parse"), CategoryKind::Income);
        assert!(CategoryKind::parse("transfer").is_err());
    }
}
