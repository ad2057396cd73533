use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::settlement::{InvoiceStatus, SupplierInvoicePayment};

/// Net covered amount over an invoice's payments: refunds subtract.
pub fn covered_amount(payments: &[SupplierInvoicePayment]) -> Decimal {
    payments.iter().fold(Decimal::ZERO, |sum, payment| {
        if payment.is_refund {
            sum - payment.amount
        } else {
            sum + payment.amount
        }
    })
}

/// Payment status for a supplier invoice, derived from its payment rows.
///
/// Precedence: cancelled, paid (covered reaches the total), overdue (due
/// date lapsed with less than full cover), partially paid, pending.
pub fn derive_invoice_status(
    total_amount: Decimal,
    covered: Decimal,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
    cancelled: bool,
) -> InvoiceStatus {
    if cancelled {
        return InvoiceStatus::Cancelled;
    }
    if covered >= total_amount {
        return InvoiceStatus::Paid;
    }
    if due_date.is_some_and(|due| due < today) {
        return InvoiceStatus::Overdue;
    }
    if covered > Decimal::ZERO {
        return InvoiceStatus::PartiallyPaid;
    }
    InvoiceStatus::Pending
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{covered_amount, derive_invoice_status};
    use crate::domain::settlement::{
        InvoiceId, InvoiceStatus, PaymentId, SupplierInvoicePayment,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn payment(amount: i64, is_refund: bool) -> SupplierInvoicePayment {
        SupplierInvoicePayment {
            id: PaymentId(format!("pay-{amount}-{is_refund}")),
            invoice_id: InvoiceId("inv-1".to_string()),
            amount: Decimal::new(amount, 2),
            paid_at: date(2026, 8, 10),
            is_refund,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn refunds_subtract_from_cover() {
        let payments =
            vec![payment(6_000_00, false), payment(4_000_00, false), payment(1_500_00, true)];
        assert_eq!(covered_amount(&payments), Decimal::new(8_500_00, 2));
        assert_eq!(covered_amount(&[]), Decimal::ZERO);
    }

    #[test]
    fn full_cover_is_paid_even_past_due() {
        let status = derive_invoice_status(
            Decimal::new(10_000_00, 2),
            Decimal::new(10_000_00, 2),
            Some(date(2026, 7, 1)),
            date(2026, 8, 20),
            false,
        );
        assert_eq!(status, InvoiceStatus::Paid);
    }

    #[test]
    fn partial_cover_past_due_is_overdue() {
        let status = derive_invoice_status(
            Decimal::new(10_000_00, 2),
            Decimal::new(5_000_00, 2),
            Some(date(2026, 8, 1)),
            date(2026, 8, 20),
            false,
        );
        assert_eq!(status, InvoiceStatus::Overdue);
    }

    #[test]
    fn partial_cover_before_due_is_partially_paid() {
        let status = derive_invoice_status(
            Decimal::new(10_000_00, 2),
            Decimal::new(5_000_00, 2),
            Some(date(2026, 9, 1)),
            date(2026, 8, 20),
            false,
        );
        assert_eq!(status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn no_payments_and_no_due_date_is_pending() {
        let status = derive_invoice_status(
            Decimal::new(10_000_00, 2),
            Decimal::ZERO,
            None,
            date(2026, 8, 20),
            false,
        );
        assert_eq!(status, InvoiceStatus::Pending);
    }

    #[test]
    fn cancellation_freezes_the_status() {
        let status = derive_invoice_status(
            Decimal::new(10_000_00, 2),
            Decimal::new(10_000_00, 2),
            None,
            date(2026, 8, 20),
            true,
        );
        assert_eq!(status, InvoiceStatus::Cancelled);
    }

    #[test]
    fn register_then_delete_round_trips_to_the_payment_free_status() {
        let total = Decimal::new(10_000_00, 2);
        let today = date(2026, 8, 20);

        let with_payment = covered_amount(&[payment(10_000_00, false)]);
        assert_eq!(
            derive_invoice_status(total, with_payment, Some(date(2026, 9, 1)), today, false),
            InvoiceStatus::Paid
        );

        let after_delete = covered_amount(&[]);
        assert_eq!(
            derive_invoice_status(total, after_delete, Some(date(2026, 9, 1)), today, false),
            InvoiceStatus::Pending
        );
        assert_eq!(
            derive_invoice_status(total, after_delete, Some(date(2026, 7, 1)), today, false),
            InvoiceStatus::Overdue
        );
    }
}
