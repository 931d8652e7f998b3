use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    checked_accumulate, non_negative, percentage_of, Cents, MalformedInputError, Transaction,
    TransactionType,
};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Which side of the books an ageing run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeingKind {
    /// Money customers owe us (sales invoices)
    Receivables,
    /// Money we owe suppliers (purchase bills)
    Payables,
}

impl AgeingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeingKind::Receivables => "receivables",
            AgeingKind::Payables => "payables",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "receivables" | "receivable" | "ar" => Some(AgeingKind::Receivables),
            "payables" | "payable" | "ap" => Some(AgeingKind::Payables),
            _ => None,
        }
    }

    /// Transaction type the caller filters on before ageing.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            AgeingKind::Receivables => TransactionType::SalesInvoice,
            AgeingKind::Payables => TransactionType::PurchaseBill,
        }
    }
}

impl std::fmt::Display for AgeingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeingRange {
    Current,
    Days1To30,
    Days31To60,
    Days60Plus,
}

impl AgeingRange {
    pub const ALL: [AgeingRange; 4] = [
        AgeingRange::Current,
        AgeingRange::Days1To30,
        AgeingRange::Days31To60,
        AgeingRange::Days60Plus,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeingRange::Current => "Current",
            AgeingRange::Days1To30 => "1-30 days",
            AgeingRange::Days31To60 => "31-60 days",
            AgeingRange::Days60Plus => "60+ days",
        }
    }

    /// Boundaries are inclusive: 30 days overdue is still `Days1To30`.
    pub fn for_days_overdue(days: i64) -> Self {
        match days {
            d if d <= 0 => AgeingRange::Current,
            1..=30 => AgeingRange::Days1To30,
            31..=60 => AgeingRange::Days31To60,
            _ => AgeingRange::Days60Plus,
        }
    }
}

impl std::fmt::Display for AgeingRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whole days between `due_date` and `now`, rounded down.
/// Negative while the due date is still ahead.
pub fn days_overdue(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - due_date)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY)
}

/// Raw per-range totals of balance due.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeingSummary {
    pub current: Cents,
    pub days_1_to_30: Cents,
    pub days_31_to_60: Cents,
    pub days_60_plus: Cents,
}

impl AgeingSummary {
    pub fn amount(&self, range: AgeingRange) -> Cents {
        match range {
            AgeingRange::Current => self.current,
            AgeingRange::Days1To30 => self.days_1_to_30,
            AgeingRange::Days31To60 => self.days_31_to_60,
            AgeingRange::Days60Plus => self.days_60_plus,
        }
    }

    fn slot(&mut self, range: AgeingRange) -> &mut Cents {
        match range {
            AgeingRange::Current => &mut self.current,
            AgeingRange::Days1To30 => &mut self.days_1_to_30,
            AgeingRange::Days31To60 => &mut self.days_31_to_60,
            AgeingRange::Days60Plus => &mut self.days_60_plus,
        }
    }

    pub fn add(&mut self, range: AgeingRange, amount: Cents) -> Result<(), MalformedInputError> {
        let slot = self.slot(range);
        *slot = checked_accumulate(*slot, amount, range.label())?;
        Ok(())
    }

    /// Sum of all four ranges.
    pub fn total(&self) -> Result<Cents, MalformedInputError> {
        AgeingRange::ALL
            .into_iter()
            .try_fold(0, |total, range| {
                checked_accumulate(total, self.amount(range), "ageing")
            })
    }

    /// Combine two partial summaries computed over disjoint inputs.
    pub fn merge(mut self, other: AgeingSummary) -> Result<Self, MalformedInputError> {
        for range in AgeingRange::ALL {
            self.add(range, other.amount(range))?;
        }
        Ok(self)
    }

    /// The four ranges in order, with each one's share of the total.
    pub fn buckets(&self) -> Result<Vec<AgeingBucket>, MalformedInputError> {
        let total = self.total()?;
        Ok(AgeingRange::ALL
            .into_iter()
            .map(|range| {
                let amount = self.amount(range);
                AgeingBucket {
                    range,
                    amount,
                    percentage: percentage_of(amount, total),
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeingBucket {
    pub range: AgeingRange,
    pub amount: Cents,
    pub percentage: f64,
}

/// Per-counterparty ageing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyAgeing {
    /// `None` collects transactions with no counterparty recorded
    pub party: Option<String>,
    pub summary: AgeingSummary,
    pub total: Cents,
}

/// Where a single transaction lands, or `None` if it is left out of ageing.
///
/// Left out: closed statuses, no due date, no recorded balance.
pub fn ageing_placement(
    transaction: &Transaction,
    now: DateTime<Utc>,
) -> Result<Option<(AgeingRange, Cents)>, MalformedInputError> {
    if !transaction.is_open() {
        return Ok(None);
    }
    let Some(due_date) = transaction.due_date else {
        debug!(transaction = %transaction.reference(), "no due date, skipped from ageing");
        return Ok(None);
    };
    let Some(balance) = transaction.balance_due else {
        debug!(transaction = %transaction.reference(), "unknown balance due, skipped from ageing");
        return Ok(None);
    };
    let balance = non_negative(balance, "balance_due")?;

    let range = AgeingRange::for_days_overdue(days_overdue(due_date, now));
    Ok(Some((range, balance)))
}

/// Bucket open transactions by how far past due they are.
///
/// Type filtering (receivables vs payables) is up to the caller.
pub fn compute_ageing(
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> Result<AgeingSummary, MalformedInputError> {
    let mut summary = AgeingSummary::default();
    for transaction in transactions {
        if let Some((range, balance)) = ageing_placement(transaction, now)? {
            summary.add(range, balance)?;
        }
    }
    Ok(summary)
}

/// Same as [`compute_ageing`], shaped for display with percentages.
pub fn compute_ageing_buckets(
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> Result<Vec<AgeingBucket>, MalformedInputError> {
    compute_ageing(transactions, now)?.buckets()
}

/// Ageing split by counterparty, named parties first in name order.
pub fn compute_party_ageing(
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> Result<Vec<PartyAgeing>, MalformedInputError> {
    let mut named: BTreeMap<&str, AgeingSummary> = BTreeMap::new();
    let mut unassigned: Option<AgeingSummary> = None;

    for transaction in transactions {
        let Some((range, balance)) = ageing_placement(transaction, now)? else {
            continue;
        };
        let summary = match transaction.party.as_deref() {
            Some(party) => named.entry(party).or_default(),
            None => unassigned.get_or_insert_with(AgeingSummary::default),
        };
        summary.add(range, balance)?;
    }

    named
        .into_iter()
        .map(|(party, summary)| (Some(party.to_string()), summary))
        .chain(unassigned.map(|summary| (None, summary)))
        .map(|(party, summary)| {
            Ok::<_, MalformedInputError>(PartyAgeing {
                party,
                total: summary.total()?,
                summary,
            })
        })
        .collect()
}

/// Balance still owed across open transactions; an unrecorded balance counts as zero.
pub fn outstanding_total(transactions: &[Transaction]) -> Result<Cents, MalformedInputError> {
    transactions
        .iter()
        .filter(|t| t.is_open())
        .try_fold(0, |total, t| {
            let balance = non_negative(t.balance_due.unwrap_or(0), "balance_due")?;
            checked_accumulate(total, balance, "outstanding")
        })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::TransactionStatus;

    fn invoice(
        status: TransactionStatus,
        balance_due: Option<Cents>,
        due_date: Option<DateTime<Utc>>,
    ) -> Transaction {
        let mut txn = Transaction::new(TransactionType::SalesInvoice, 100_000, Utc::now())
            .with_status(status)
            .with_balance_due(balance_due);
        txn.due_date = due_date;
        txn
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-30T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_days_overdue_rounds_down() {
        let now = now();
        assert_eq!(days_overdue(now - Duration::days(5), now), 5);
        assert_eq!(days_overdue(now - Duration::hours(23), now), 0);
        assert_eq!(days_overdue(now + Duration::hours(1), now), -1);
        assert_eq!(days_overdue(now, now), 0);
    }

    #[test]
    fn test_range_boundaries() {
        assert_eq!(AgeingRange::for_days_overdue(-10), AgeingRange::Current);
        assert_eq!(AgeingRange::for_days_overdue(0), AgeingRange::Current);
        assert_eq!(AgeingRange::for_days_overdue(1), AgeingRange::Days1To30);
        assert_eq!(AgeingRange::for_days_overdue(30), AgeingRange::Days1To30);
        assert_eq!(AgeingRange::for_days_overdue(31), AgeingRange::Days31To60);
        assert_eq!(AgeingRange::for_days_overdue(60), AgeingRange::Days31To60);
        assert_eq!(AgeingRange::for_days_overdue(61), AgeingRange::Days60Plus);
    }

    #[test]
    fn test_empty_input_gives_four_zero_buckets() {
        let buckets = compute_ageing_buckets(&[], now()).unwrap();
        assert_eq!(buckets.len(), 4);
        for (bucket, range) in buckets.iter().zip(AgeingRange::ALL) {
            assert_eq!(bucket.range, range);
            assert_eq!(bucket.amount, 0);
            assert_eq!(bucket.percentage, 0.0);
        }
    }

    #[test]
    fn test_mixed_scenario() {
        let now = now();
        let transactions = vec![
            invoice(TransactionStatus::Pending, Some(10000), Some(now - Duration::days(5))),
            invoice(TransactionStatus::Pending, Some(5000), Some(now - Duration::days(35))),
            invoice(TransactionStatus::Paid, Some(0), Some(now - Duration::days(100))),
        ];

        let summary = compute_ageing(&transactions, now).unwrap();
        assert_eq!(summary.current, 0);
        assert_eq!(summary.days_1_to_30, 10000);
        assert_eq!(summary.days_31_to_60, 5000);
        assert_eq!(summary.days_60_plus, 0);
    }

    #[test]
    fn test_skips_closed_and_undated() {
        let now = now();
        let past = Some(now - Duration::days(10));
        let transactions = vec![
            invoice(TransactionStatus::Draft, Some(100), past),
            invoice(TransactionStatus::Cancelled, Some(100), past),
            invoice(TransactionStatus::Completed, Some(100), past),
            invoice(TransactionStatus::Approved, Some(100), past),
            invoice(TransactionStatus::Pending, Some(100), None),
            invoice(TransactionStatus::Overdue, None, past),
        ];

        assert_eq!(compute_ageing(&transactions, now).unwrap(), AgeingSummary::default());
    }

    #[test]
    fn test_amounts_are_conserved() {
        let now = now();
        let transactions: Vec<_> = (0..40)
            .map(|i| {
                invoice(
                    TransactionStatus::PartiallyPaid,
                    Some(1000 + i * 37),
                    Some(now - Duration::days(i * 3 - 20)),
                )
            })
            .collect();
        let expected: Cents = transactions.iter().filter_map(|t| t.balance_due).sum();

        let summary = compute_ageing(&transactions, now).unwrap();
        assert_eq!(summary.total().unwrap(), expected);
    }

    #[test]
    fn test_boundary_crossing_moves_amount_once() {
        let due = now() - Duration::days(30);
        let transactions = vec![invoice(TransactionStatus::Pending, Some(4200), Some(due))];

        let at_30 = compute_ageing(&transactions, now()).unwrap();
        let at_31 = compute_ageing(&transactions, now() + Duration::days(1)).unwrap();

        assert_eq!(at_30.days_1_to_30, 4200);
        assert_eq!(at_30.days_31_to_60, 0);
        assert_eq!(at_31.days_1_to_30, 0);
        assert_eq!(at_31.days_31_to_60, 4200);
        assert_eq!(at_31.current, 0);
        assert_eq!(at_31.days_60_plus, 0);
    }

    #[test]
    fn test_percentages() {
        let now = now();
        let transactions = vec![
            invoice(TransactionStatus::Pending, Some(7500), Some(now + Duration::days(3))),
            invoice(TransactionStatus::Overdue, Some(2500), Some(now - Duration::days(90))),
        ];
        let buckets = compute_ageing_buckets(&transactions, now).unwrap();

        assert_eq!(buckets[0].percentage, 75.0);
        assert_eq!(buckets[1].percentage, 0.0);
        assert_eq!(buckets[3].percentage, 25.0);
    }

    #[test]
    fn test_negative_balance_fails_whole_run() {
        let now = now();
        let transactions = vec![
            invoice(TransactionStatus::Pending, Some(100), Some(now)),
            invoice(TransactionStatus::Pending, Some(-1), Some(now)),
        ];
        assert_eq!(
            compute_ageing(&transactions, now),
            Err(MalformedInputError::Negative {
                field: "balance_due",
                value: -1
            })
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let now = now();
        let transactions = vec![
            invoice(TransactionStatus::Pending, Some(i64::MAX), Some(now)),
            invoice(TransactionStatus::Pending, Some(1), Some(now)),
        ];
        assert!(matches!(
            compute_ageing(&transactions, now),
            Err(MalformedInputError::Overflow { .. })
        ));
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let now = now();
        let transactions: Vec<_> = (0..12)
            .map(|i| {
                invoice(
                    TransactionStatus::Pending,
                    Some(500 * (i + 1)),
                    Some(now - Duration::days(i * 9)),
                )
            })
            .collect();
        let (left, right) = transactions.split_at(5);

        let merged = compute_ageing(left, now)
            .unwrap()
            .merge(compute_ageing(right, now).unwrap())
            .unwrap();
        assert_eq!(merged, compute_ageing(&transactions, now).unwrap());
    }

    #[test]
    fn test_party_ageing_groups_by_counterparty() {
        let now = now();
        let transactions = vec![
            invoice(TransactionStatus::Pending, Some(300), Some(now - Duration::days(2)))
                .with_party("Verma & Sons"),
            invoice(TransactionStatus::Pending, Some(200), Some(now - Duration::days(45)))
                .with_party("Agarwal Stores"),
            invoice(TransactionStatus::Pending, Some(100), Some(now - Duration::days(70)))
                .with_party("Verma & Sons"),
            invoice(TransactionStatus::Pending, Some(50), Some(now)),
        ];

        let parties = compute_party_ageing(&transactions, now).unwrap();
        assert_eq!(parties.len(), 3);
        assert_eq!(parties[0].party.as_deref(), Some("Agarwal Stores"));
        assert_eq!(parties[0].summary.days_31_to_60, 200);
        assert_eq!(parties[1].party.as_deref(), Some("Verma & Sons"));
        assert_eq!(parties[1].summary.days_1_to_30, 300);
        assert_eq!(parties[1].summary.days_60_plus, 100);
        assert_eq!(parties[1].total, 400);
        assert_eq!(parties[2].party, None);
        assert_eq!(parties[2].summary.current, 50);
    }

    #[test]
    fn test_outstanding_total_counts_open_only() {
        let transactions = vec![
            invoice(TransactionStatus::Pending, Some(1200), None),
            invoice(TransactionStatus::PartiallyPaid, None, None),
            invoice(TransactionStatus::Paid, Some(0), None),
            invoice(TransactionStatus::Draft, Some(9999), None),
        ];
        assert_eq!(outstanding_total(&transactions), Ok(1200));
    }
}
