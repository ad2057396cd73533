use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteItem, QuoteItemId};
use crate::errors::DomainError;

/// Conditions that pull a quote out of the normal pipeline into senior
/// review. Evaluated at the quote-control boundary against the current
/// quote, never against cached copies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalReason {
    NonBaseCurrency,
    PartialPrepayment,
    BelowMinimumMarkup,
    DecisionMakerReward,
}

impl ApprovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalReason::NonBaseCurrency => "non_base_currency",
            ApprovalReason::PartialPrepayment => "partial_prepayment",
            ApprovalReason::BelowMinimumMarkup => "below_minimum_markup",
            ApprovalReason::DecisionMakerReward => "decision_maker_reward",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "non_base_currency" => Ok(ApprovalReason::NonBaseCurrency),
            "partial_prepayment" => Ok(ApprovalReason::PartialPrepayment),
            "below_minimum_markup" => Ok(ApprovalReason::BelowMinimumMarkup),
            "decision_maker_reward" => Ok(ApprovalReason::DecisionMakerReward),
            other => Err(DomainError::validation(format!("unknown approval reason `{other}`"))),
        }
    }
}

impl fmt::Display for ApprovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organization-level thresholds the predicates are evaluated against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub base_currency: String,
    pub minimum_markup_percent: Decimal,
    pub full_prepayment_percent: Decimal,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            minimum_markup_percent: Decimal::from(10),
            full_prepayment_percent: Decimal::from(100),
        }
    }
}

impl ApprovalPolicy {
    /// Returns every fired predicate, in declaration order. An empty result
    /// means the quote may be approved directly at quote control.
    pub fn evaluate(&self, quote: &Quote) -> Vec<ApprovalReason> {
        let mut reasons = Vec::new();

        if !quote.currency.eq_ignore_ascii_case(&self.base_currency) {
            reasons.push(ApprovalReason::NonBaseCurrency);
        }
        if quote.prepayment_percent < self.full_prepayment_percent {
            reasons.push(ApprovalReason::PartialPrepayment);
        }
        if quote.markup_percent < self.minimum_markup_percent {
            reasons.push(ApprovalReason::BelowMinimumMarkup);
        }
        if quote.dm_reward.is_some_and(|reward| reward > Decimal::ZERO) {
            reasons.push(ApprovalReason::DecisionMakerReward);
        }

        reasons
    }
}

/// One field-level modification carried by an approval decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AmendmentOp {
    SetTotalAmount { value: Decimal },
    SetPrepaymentPercent { value: Decimal },
    SetMarkupPercent { value: Decimal },
    SetDmReward { value: Option<Decimal> },
    SetItemUnitPrice { item_id: QuoteItemId, value: Decimal },
    SetItemQuantity { item_id: QuoteItemId, value: Decimal },
}

/// Structured modification payload attached to an approving decision and
/// applied to the quote in the same commit as the decision itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub ops: Vec<AmendmentOp>,
    pub note: Option<String>,
}

impl Amendment {
    /// Applies every operation or none: the first invalid operation aborts
    /// with a validation error and callers must discard the mutated copies.
    pub fn apply(&self, quote: &mut Quote, items: &mut [QuoteItem]) -> Result<(), DomainError> {
        for op in &self.ops {
            match op {
                AmendmentOp::SetTotalAmount { value } => {
                    ensure_not_negative("total_amount", *value)?;
                    quote.total_amount = *value;
                }
                AmendmentOp::SetPrepaymentPercent { value } => {
                    ensure_percent("prepayment_percent", *value)?;
                    quote.prepayment_percent = *value;
                }
                AmendmentOp::SetMarkupPercent { value } => {
                    ensure_not_negative("markup_percent", *value)?;
                    quote.markup_percent = *value;
                }
                AmendmentOp::SetDmReward { value } => {
                    if let Some(reward) = value {
                        ensure_not_negative("dm_reward", *reward)?;
                    }
                    quote.dm_reward = *value;
                }
                AmendmentOp::SetItemUnitPrice { item_id, value } => {
                    ensure_not_negative("unit_price", *value)?;
                    find_item(items, item_id)?.unit_price = *value;
                }
                AmendmentOp::SetItemQuantity { item_id, value } => {
                    if *value <= Decimal::ZERO {
                        return Err(DomainError::validation(format!(
                            "quantity must be positive, got {value}"
                        )));
                    }
                    find_item(items, item_id)?.quantity = *value;
                }
            }
        }

        Ok(())
    }
}

fn find_item<'a>(
    items: &'a mut [QuoteItem],
    item_id: &QuoteItemId,
) -> Result<&'a mut QuoteItem, DomainError> {
    items.iter_mut().find(|item| &item.id == item_id).ok_or_else(|| {
        DomainError::validation(format!("amendment references unknown item `{}`", item_id.0))
    })
}

fn ensure_not_negative(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must not be negative, got {value}")));
    }
    Ok(())
}

fn ensure_percent(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(DomainError::validation(format!(
            "{field} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Amendment, AmendmentOp, ApprovalPolicy, ApprovalReason};
    use crate::domain::contract::ContractId;
    use crate::domain::quote::{
        DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
    };
    use crate::domain::{OrgId, UserId};

    fn quote() -> Quote {
        Quote {
            id: QuoteId("q-1".to_string()),
            org_id: OrgId("org-1".to_string()),
            number: "Q-2026-0001".to_string(),
            customer: "Nordwind Trading".to_string(),
            contract_id: Some(ContractId("c-1".to_string())),
            deal_type: DealType::Supply,
            status: QuoteStatus::PendingQuoteControl,
            currency: "USD".to_string(),
            total_amount: Decimal::new(50_000_00, 2),
            prepayment_percent: Decimal::from(100),
            markup_percent: Decimal::from(15),
            dm_reward: None,
            sales_manager_id: UserId("u-sales".to_string()),
            procurement_done_at: None,
            logistics_done_at: None,
            customs_done_at: None,
            sales_review_done_at: None,
            revision_department: None,
            revision_comment: None,
            revision_requested_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: &str) -> QuoteItem {
        QuoteItem {
            id: QuoteItemId(id.to_string()),
            quote_id: QuoteId("q-1".to_string()),
            position: 1,
            description: "hydraulic pump".to_string(),
            brand: "Bosch Rexroth".to_string(),
            quantity: Decimal::from(4),
            unit_price: Decimal::new(1_200_00, 2),
            procurement_status: ProcurementStatus::Completed,
            purchase_price: Some(Decimal::new(950_00, 2)),
            supplier: Some("Hydro Parts GmbH".to_string()),
            procurement_user_id: None,
            procurement_completed_at: None,
            procurement_completed_by: None,
            route: Some("Hamburg-Riga".to_string()),
            logistics_user_id: None,
            pickup_cost: None,
            linehaul_cost: None,
            delivery_cost: None,
            transit_days: None,
            customs_code: None,
            duty_percent: None,
            customs_extra_cost: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fully_conforming_quote_fires_nothing() {
        let policy = ApprovalPolicy::default();
        assert!(policy.evaluate(&quote()).is_empty());
    }

    #[test]
    fn each_predicate_fires_on_its_own_condition() {
        let policy = ApprovalPolicy::default();

        let mut foreign_currency = quote();
        foreign_currency.currency = "EUR".to_string();
        assert_eq!(policy.evaluate(&foreign_currency), vec![ApprovalReason::NonBaseCurrency]);

        let mut partial_prepayment = quote();
        partial_prepayment.prepayment_percent = Decimal::from(30);
        assert_eq!(
            policy.evaluate(&partial_prepayment),
            vec![ApprovalReason::PartialPrepayment]
        );

        let mut thin_markup = quote();
        thin_markup.markup_percent = Decimal::new(9_99, 2);
        assert_eq!(policy.evaluate(&thin_markup), vec![ApprovalReason::BelowMinimumMarkup]);

        let mut rewarded = quote();
        rewarded.dm_reward = Some(Decimal::new(500_00, 2));
        assert_eq!(policy.evaluate(&rewarded), vec![ApprovalReason::DecisionMakerReward]);
    }

    #[test]
    fn zero_reward_does_not_fire_the_reward_predicate() {
        let mut quote = quote();
        quote.dm_reward = Some(Decimal::ZERO);
        assert!(ApprovalPolicy::default().evaluate(&quote).is_empty());
    }

    #[test]
    fn currency_comparison_ignores_case() {
        let mut quote = quote();
        quote.currency = "usd".to_string();
        assert!(ApprovalPolicy::default().evaluate(&quote).is_empty());
    }

    #[test]
    fn multiple_predicates_fire_together_in_declaration_order() {
        let mut quote = quote();
        quote.currency = "EUR".to_string();
        quote.prepayment_percent = Decimal::from(50);
        quote.markup_percent = Decimal::from(5);
        quote.dm_reward = Some(Decimal::new(250_00, 2));

        assert_eq!(
            ApprovalPolicy::default().evaluate(&quote),
            vec![
                ApprovalReason::NonBaseCurrency,
                ApprovalReason::PartialPrepayment,
                ApprovalReason::BelowMinimumMarkup,
                ApprovalReason::DecisionMakerReward,
            ]
        );
    }

    #[test]
    fn amendment_applies_quote_and_item_changes() {
        let mut quote = quote();
        let mut items = vec![item("item-1"), item("item-2")];

        let amendment = Amendment {
            ops: vec![
                AmendmentOp::SetMarkupPercent { value: Decimal::from(12) },
                AmendmentOp::SetDmReward { value: None },
                AmendmentOp::SetItemUnitPrice {
                    item_id: QuoteItemId("item-2".to_string()),
                    value: Decimal::new(1_150_00, 2),
                },
            ],
            note: Some("hold the line on markup".to_string()),
        };

        amendment.apply(&mut quote, &mut items).expect("amendment should apply");

        assert_eq!(quote.markup_percent, Decimal::from(12));
        assert_eq!(quote.dm_reward, None);
        assert_eq!(items[1].unit_price, Decimal::new(1_150_00, 2));
        assert_eq!(items[0].unit_price, Decimal::new(1_200_00, 2));
    }

    #[test]
    fn amendment_rejects_unknown_item() {
        let mut quote = quote();
        let mut items = vec![item("item-1")];

        let amendment = Amendment {
            ops: vec![AmendmentOp::SetItemQuantity {
                item_id: QuoteItemId("item-9".to_string()),
                value: Decimal::from(2),
            }],
            note: None,
        };

        let error = amendment.apply(&mut quote, &mut items).expect_err("item-9 does not exist");
        assert!(error.to_string().contains("item-9"));
    }

    #[test]
    fn amendment_rejects_out_of_range_values() {
        let mut quote = quote();
        let mut items = vec![item("item-1")];

        let over_percent = Amendment {
            ops: vec![AmendmentOp::SetPrepaymentPercent { value: Decimal::from(140) }],
            note: None,
        };
        assert!(over_percent.apply(&mut quote, &mut items).is_err());

        let zero_quantity = Amendment {
            ops: vec![AmendmentOp::SetItemQuantity {
                item_id: QuoteItemId("item-1".to_string()),
                value: Decimal::ZERO,
            }],
            note: None,
        };
        assert!(zero_quantity.apply(&mut quote, &mut items).is_err());
    }

    #[test]
    fn amendment_serializes_with_tagged_ops() {
        let amendment = Amendment {
            ops: vec![AmendmentOp::SetMarkupPercent { value: Decimal::from(11) }],
            note: None,
        };

        let json = serde_json::to_value(&amendment).expect("serialize");
        assert_eq!(json["ops"][0]["op"], "set_markup_percent");

        let back: Amendment = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, amendment);
    }
}
