use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::settlement::PlanFactStatus;

/// The actual side of a ledger line as recorded by finance. The amount is in
/// the payment currency; `exchange_rate` converts it into the deal's base
/// currency and defaults to 1 when omitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualFact {
    pub amount: Decimal,
    pub currency: String,
    pub exchange_rate: Option<Decimal>,
    pub date: Option<NaiveDate>,
}

/// Derived columns for one plan-fact line. Recomputed from scratch on every
/// write to the planned or actual side; never patched incrementally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFactDerivation {
    pub actual_base_amount: Option<Decimal>,
    pub variance: Option<Decimal>,
    pub variance_percent: Option<Decimal>,
    pub status: PlanFactStatus,
}

/// Single derivation rule for plan-fact lines.
///
/// Status precedence: a cancelled line stays cancelled; an actual date means
/// the line is completed; an actual amount without a date is partial even
/// past the planned date (the money moved, only confirmation lags); a lapsed
/// planned date with no actual amount is overdue; everything else is planned.
pub fn derive_plan_fact(
    planned_amount: Option<Decimal>,
    planned_date: Option<NaiveDate>,
    actual: Option<&ActualFact>,
    today: NaiveDate,
    cancelled: bool,
) -> PlanFactDerivation {
    let actual_base_amount =
        actual.map(|fact| fact.amount * fact.exchange_rate.unwrap_or(Decimal::ONE));

    let variance =
        actual_base_amount.map(|base| base - planned_amount.unwrap_or(Decimal::ZERO));

    let variance_percent = match (variance, planned_amount) {
        (Some(variance), Some(planned)) if !planned.is_zero() => {
            Some((variance / planned * Decimal::ONE_HUNDRED).round_dp(2))
        }
        _ => None,
    };

    let status = if cancelled {
        PlanFactStatus::Cancelled
    } else if actual.is_some_and(|fact| fact.date.is_some()) {
        PlanFactStatus::Completed
    } else if actual.is_some() {
        PlanFactStatus::Partial
    } else if planned_date.is_some_and(|date| date < today) {
        PlanFactStatus::Overdue
    } else {
        PlanFactStatus::Planned
    };

    PlanFactDerivation { actual_base_amount, variance, variance_percent, status }
}

/// Live rollup over a deal's non-cancelled ledger lines. Always computed
/// with a fresh SUM; the values are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealTotals {
    pub planned_income: Decimal,
    pub planned_expense: Decimal,
    pub actual_income: Decimal,
    pub actual_expense: Decimal,
}

impl DealTotals {
    pub fn planned_profit(&self) -> Decimal {
        self.planned_income - self.planned_expense
    }

    pub fn actual_profit(&self) -> Decimal {
        self.actual_income - self.actual_expense
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{derive_plan_fact, ActualFact, DealTotals};
    use crate::domain::settlement::PlanFactStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn actual(amount: i64, rate: Option<Decimal>, completed: Option<NaiveDate>) -> ActualFact {
        ActualFact {
            amount: Decimal::new(amount, 2),
            currency: "EUR".to_string(),
            exchange_rate: rate,
            date: completed,
        }
    }

    #[test]
    fn bare_plan_before_its_date_is_planned() {
        let derived = derive_plan_fact(
            Some(Decimal::new(10_000_00, 2)),
            Some(date(2026, 9, 1)),
            None,
            date(2026, 8, 20),
            false,
        );

        assert_eq!(derived.status, PlanFactStatus::Planned);
        assert_eq!(derived.actual_base_amount, None);
        assert_eq!(derived.variance, None);
        assert_eq!(derived.variance_percent, None);
    }

    #[test]
    fn lapsed_plan_with_no_actual_is_overdue() {
        let derived = derive_plan_fact(
            Some(Decimal::new(10_000_00, 2)),
            Some(date(2026, 8, 1)),
            None,
            date(2026, 8, 20),
            false,
        );
        assert_eq!(derived.status, PlanFactStatus::Overdue);
    }

    #[test]
    fn actual_in_base_currency_gives_exact_variance() {
        let derived = derive_plan_fact(
            Some(Decimal::new(10_000_00, 2)),
            Some(date(2026, 8, 1)),
            Some(&actual(10_450_00, None, Some(date(2026, 8, 3)))),
            date(2026, 8, 20),
            false,
        );

        assert_eq!(derived.actual_base_amount, Some(Decimal::new(10_450_00, 2)));
        assert_eq!(derived.variance, Some(Decimal::new(450_00, 2)));
        assert_eq!(derived.variance_percent, Some(Decimal::new(4_50, 2)));
        assert_eq!(derived.status, PlanFactStatus::Completed);
    }

    #[test]
    fn exchange_rate_normalizes_the_actual_amount() {
        let derived = derive_plan_fact(
            Some(Decimal::new(11_000_00, 2)),
            None,
            Some(&actual(10_000_00, Some(Decimal::new(1_08, 2)), None)),
            date(2026, 8, 20),
            false,
        );

        assert_eq!(derived.actual_base_amount, Some(Decimal::new(10_800_0000, 4)));
        assert_eq!(derived.variance, Some(Decimal::new(-200_0000, 4)));
        assert_eq!(derived.status, PlanFactStatus::Partial);
    }

    #[test]
    fn amount_without_confirmation_date_stays_partial_past_the_planned_date() {
        let derived = derive_plan_fact(
            Some(Decimal::new(5_000_00, 2)),
            Some(date(2026, 7, 1)),
            Some(&actual(5_000_00, None, None)),
            date(2026, 8, 20),
            false,
        );
        assert_eq!(derived.status, PlanFactStatus::Partial);
    }

    #[test]
    fn fact_only_line_has_no_variance_percent() {
        let derived = derive_plan_fact(
            None,
            None,
            Some(&actual(3_200_00, None, Some(date(2026, 8, 10)))),
            date(2026, 8, 20),
            false,
        );

        assert_eq!(derived.variance, Some(Decimal::new(3_200_00, 2)));
        assert_eq!(derived.variance_percent, None);
        assert_eq!(derived.status, PlanFactStatus::Completed);
    }

    #[test]
    fn zero_plan_never_divides() {
        let derived = derive_plan_fact(
            Some(Decimal::ZERO),
            None,
            Some(&actual(100_00, None, None)),
            date(2026, 8, 20),
            false,
        );
        assert_eq!(derived.variance, Some(Decimal::new(100_00, 2)));
        assert_eq!(derived.variance_percent, None);
    }

    #[test]
    fn cancelled_wins_over_every_other_status() {
        let derived = derive_plan_fact(
            Some(Decimal::new(10_000_00, 2)),
            Some(date(2026, 8, 1)),
            Some(&actual(10_000_00, None, Some(date(2026, 8, 2)))),
            date(2026, 8, 20),
            true,
        );
        assert_eq!(derived.status, PlanFactStatus::Cancelled);
    }

    #[test]
    fn clearing_the_actual_resets_the_derived_columns() {
        let with_actual = derive_plan_fact(
            Some(Decimal::new(10_000_00, 2)),
            Some(date(2026, 9, 1)),
            Some(&actual(9_000_00, None, None)),
            date(2026, 8, 20),
            false,
        );
        assert_eq!(with_actual.status, PlanFactStatus::Partial);

        let cleared = derive_plan_fact(
            Some(Decimal::new(10_000_00, 2)),
            Some(date(2026, 9, 1)),
            None,
            date(2026, 8, 20),
            false,
        );
        assert_eq!(cleared.actual_base_amount, None);
        assert_eq!(cleared.variance, None);
        assert_eq!(cleared.variance_percent, None);
        assert_eq!(cleared.status, PlanFactStatus::Planned);
    }

    #[test]
    fn totals_profit_is_income_minus_expense() {
        let totals = DealTotals {
            planned_income: Decimal::new(120_000_00, 2),
            planned_expense: Decimal::new(90_000_00, 2),
            actual_income: Decimal::new(118_000_00, 2),
            actual_expense: Decimal::new(93_500_00, 2),
        };

        assert_eq!(totals.planned_profit(), Decimal::new(30_000_00, 2));
        assert_eq!(totals.actual_profit(), Decimal::new(24_500_00, 2));
    }
}
