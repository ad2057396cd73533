mod invoice;
mod plan_fact;

pub use invoice::{covered_amount, derive_invoice_status};
pub use plan_fact::{derive_plan_fact, ActualFact, DealTotals, PlanFactDerivation};
