use chrono::{DateTime, Utc};

use super::{Cents, TransactionStatus};

/// Status to show for a transaction at `now`.
///
/// First match wins:
/// 1. a recorded zero balance is `Paid`, whatever the stored tag says;
/// 2. a positive balance past its due date is `Overdue`;
/// 3. otherwise the stored status.
pub fn resolve_display_status(
    status: TransactionStatus,
    due_date: Option<DateTime<Utc>>,
    balance_due: Option<Cents>,
    now: DateTime<Utc>,
) -> TransactionStatus {
    match (balance_due, due_date) {
        (Some(0), _) => TransactionStatus::Paid,
        (Some(balance), Some(due)) if balance > 0 && now > due => TransactionStatus::Overdue,
        _ => status,
    }
}

/// Whether a stored status still expects money to move.
///
/// Ageing and outstanding totals use this, not [`resolve_display_status`]:
/// a `pending` invoice with a zero balance is still counted (with a zero
/// amount) and a `draft` past its due date is not.
pub fn resolve_is_open(status: TransactionStatus) -> bool {
    matches!(
        status,
        TransactionStatus::Pending | TransactionStatus::Overdue | TransactionStatus::PartiallyPaid
    )
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_zero_balance_is_paid_regardless_of_status() {
        let now = Utc::now();
        for status in TransactionStatus::ALL {
            assert_eq!(
                resolve_display_status(status, Some(now - Duration::days(90)), Some(0), now),
                TransactionStatus::Paid
            );
            assert_eq!(
                resolve_display_status(status, None, Some(0), now),
                TransactionStatus::Paid
            );
        }
    }

    #[test]
    fn test_positive_balance_past_due_is_overdue() {
        let now = Utc::now();
        for status in TransactionStatus::ALL {
            assert_eq!(
                resolve_display_status(status, Some(now - Duration::seconds(1)), Some(1), now),
                TransactionStatus::Overdue
            );
        }
    }

    #[test]
    fn test_due_exactly_now_is_not_overdue() {
        let now = Utc::now();
        assert_eq!(
            resolve_display_status(TransactionStatus::Pending, Some(now), Some(500), now),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_falls_back_to_stored_status() {
        let now = Utc::now();
        // No balance recorded
        assert_eq!(
            resolve_display_status(
                TransactionStatus::Approved,
                Some(now - Duration::days(3)),
                None,
                now
            ),
            TransactionStatus::Approved
        );
        // No due date
        assert_eq!(
            resolve_display_status(TransactionStatus::PartiallyPaid, None, Some(100), now),
            TransactionStatus::PartiallyPaid
        );
        // Not yet due
        assert_eq!(
            resolve_display_status(
                TransactionStatus::Pending,
                Some(now + Duration::days(3)),
                Some(100),
                now
            ),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_open_statuses() {
        let open: Vec<_> = TransactionStatus::ALL
            .into_iter()
            .filter(|s| resolve_is_open(*s))
            .collect();
        assert_eq!(
            open,
            vec![
                TransactionStatus::Pending,
                TransactionStatus::PartiallyPaid,
                TransactionStatus::Overdue,
            ]
        );
    }
}
