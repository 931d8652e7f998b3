use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AgeingBucket, AgeingKind, Cents, LineItem, PartyAgeing, TaxBreakupRow, TaxBreakupTotals,
    Transaction, TransactionStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeingReport {
    pub kind: AgeingKind,
    pub as_of: DateTime<Utc>,
    pub buckets: Vec<AgeingBucket>,
    pub total: Cents,
    /// Open transactions that landed in a bucket
    pub included: usize,
    /// Open transactions left out for lack of a due date or balance
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyAgeingReport {
    pub kind: AgeingKind,
    pub as_of: DateTime<Utc>,
    pub parties: Vec<PartyAgeing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxBreakupReport {
    pub transaction: String,
    pub is_inter_state: bool,
    pub rows: Vec<TaxBreakupRow>,
    pub totals: TaxBreakupTotals,
}

/// Dashboard headline figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingSummary {
    pub as_of: DateTime<Utc>,
    pub total_receivables: Cents,
    pub total_payables: Cents,
    pub overdue_receivables: usize,
    pub overdue_payables: usize,
}

/// A transaction with everything a detail view needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub transaction: Transaction,
    pub display_status: TransactionStatus,
    pub is_open: bool,
    /// Whole days past the due date; `None` without a due date
    pub days_overdue: Option<i64>,
    pub line_items: Vec<LineItem>,
}
