// libs/appointment-cell/src/services/refund.rs
use chrono::NaiveDate;
use tracing::debug;

use crate::models::RefundQuote;

/// Full refund when cancelled at least this many days ahead.
pub const FULL_REFUND_DAYS: i64 = 2;
/// Half refund when cancelled exactly this many days ahead.
pub const HALF_REFUND_DAYS: i64 = 1;

fn percentage_for(days_between: i64, doctor_changed: bool) -> u8 {
    if doctor_changed || days_between >= FULL_REFUND_DAYS {
        100
    } else if days_between >= HALF_REFUND_DAYS {
        50
    } else {
        0
    }
}

/// Refund for cancelling a booking on `work_date` when the cancellation happens
/// on `cancel_date`. A doctor-initiated schedule change always refunds in full.
pub fn evaluate_refund(deposit: i64, cancel_date: NaiveDate, work_date: NaiveDate, doctor_changed: bool) -> RefundQuote {
    let deposit = deposit.saturating_abs();
    let days_between = (work_date - cancel_date).num_days();
    let refund_percentage = percentage_for(days_between, doctor_changed);
    let refund_amount = deposit.saturating_mul(i64::from(refund_percentage)) / 100;

    debug!(
        "Refund quote: {} days ahead, doctor change {}, {}% of {}",
        days_between, doctor_changed, refund_percentage, deposit
    );

    RefundQuote {
        refund_amount,
        refund_percentage,
        days_between,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn three_days_ahead_refunds_everything() {
        let quote = evaluate_refund(200_000, d(2025, 3, 7), d(2025, 3, 10), false);
        assert_eq!(quote.refund_amount, 200_000);
        assert_eq!(quote.refund_percentage, 100);
        assert_eq!(quote.days_between, 3);
    }

    #[test]
    fn one_day_ahead_refunds_half() {
        let quote = evaluate_refund(200_000, d(2025, 3, 9), d(2025, 3, 10), false);
        assert_eq!(quote.refund_amount, 100_000);
        assert_eq!(quote.refund_percentage, 50);
    }

    #[test]
    fn same_day_refunds_nothing() {
        let quote = evaluate_refund(200_000, d(2025, 3, 10), d(2025, 3, 10), false);
        assert_eq!(quote.refund_amount, 0);
        assert_eq!(quote.refund_percentage, 0);
    }

    #[test]
    fn cancelling_after_the_visit_refunds_nothing() {
        let quote = evaluate_refund(200_000, d(2025, 3, 12), d(2025, 3, 10), false);
        assert_eq!(quote.refund_amount, 0);
        assert_eq!(quote.days_between, -2);
    }

    #[test]
    fn doctor_change_overrides_timing() {
        let quote = evaluate_refund(200_000, d(2025, 3, 10), d(2025, 3, 10), true);
        assert_eq!(quote.refund_amount, 200_000);
        assert_eq!(quote.refund_percentage, 100);
    }

    #[test]
    fn half_refund_is_floored_and_never_exceeds_deposit() {
        let quote = evaluate_refund(99_999, d(2025, 3, 9), d(2025, 3, 10), false);
        assert_eq!(quote.refund_amount, 49_999);

        let negative = evaluate_refund(-200_000, d(2025, 3, 1), d(2025, 3, 10), false);
        assert_eq!(negative.refund_amount, 200_000);

        for deposit in [0, 1, 7, 150_000] {
            for offset in -3..5 {
                let cancel = d(2025, 3, 10) - chrono::Duration::days(offset);
                let quote = evaluate_refund(deposit, cancel, d(2025, 3, 10), false);
                assert!(quote.refund_amount <= deposit);
            }
        }
    }
}
