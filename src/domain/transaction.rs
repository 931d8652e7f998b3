use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{resolve_display_status, resolve_is_open, Cents};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    SalesInvoice,
    PurchaseBill,
    SalesOrder,
    PurchaseOrder,
    Quotation,
    Receipt,
    Payment,
    CreditNote,
    DebitNote,
}

impl TransactionType {
    pub const ALL: [TransactionType; 9] = [
        TransactionType::SalesInvoice,
        TransactionType::PurchaseBill,
        TransactionType::SalesOrder,
        TransactionType::PurchaseOrder,
        TransactionType::Quotation,
        TransactionType::Receipt,
        TransactionType::Payment,
        TransactionType::CreditNote,
        TransactionType::DebitNote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SalesInvoice => "sales_invoice",
            TransactionType::PurchaseBill => "purchase_bill",
            TransactionType::SalesOrder => "sales_order",
            TransactionType::PurchaseOrder => "purchase_order",
            TransactionType::Quotation => "quotation",
            TransactionType::Receipt => "receipt",
            TransactionType::Payment => "payment",
            TransactionType::CreditNote => "credit_note",
            TransactionType::DebitNote => "debit_note",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored lifecycle tag. Set by whoever manages the transaction; the
/// computations in this crate only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Draft,
    Pending,
    Approved,
    PartiallyPaid,
    Paid,
    Overdue,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 8] = [
        TransactionStatus::Draft,
        TransactionStatus::Pending,
        TransactionStatus::Approved,
        TransactionStatus::PartiallyPaid,
        TransactionStatus::Paid,
        TransactionStatus::Overdue,
        TransactionStatus::Completed,
        TransactionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Draft => "draft",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::PartiallyPaid => "partially_paid",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Overdue => "overdue",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sales or purchase document: invoice, bill, order, note, receipt...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Document number shown to people (e.g. "INV-0042")
    pub number: Option<String>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Customer or supplier name
    pub party: Option<String>,
    /// Total value including tax
    pub amount: Cents,
    /// Unpaid remainder; `None` when the source never recorded one
    pub balance_due: Option<Cents>,
    pub due_date: Option<DateTime<Utc>>,
    /// Issue date of the document
    pub transaction_date: DateTime<Utc>,
    /// When we recorded this transaction in the system
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// New draft transaction with the whole amount still due.
    pub fn new(
        transaction_type: TransactionType,
        amount: Cents,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: None,
            transaction_type,
            status: TransactionStatus::Draft,
            party: None,
            amount,
            balance_due: Some(amount),
            due_date: None,
            transaction_date,
            created_at: Utc::now(),
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party = Some(party.into());
        self
    }

    pub fn with_balance_due(mut self, balance_due: Option<Cents>) -> Self {
        self.balance_due = balance_due;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Label for listings: the document number, or the id when there is none.
    pub fn reference(&self) -> String {
        self.number.clone().unwrap_or_else(|| self.id.to_string())
    }

    /// Status to show a person at `now` (paid/overdue override the stored tag).
    pub fn display_status(&self, now: DateTime<Utc>) -> TransactionStatus {
        resolve_display_status(self.status, self.due_date, self.balance_due, now)
    }

    /// Whether the stored status counts toward ageing and outstanding totals.
    pub fn is_open(&self) -> bool {
        resolve_is_open(self.status)
    }
}
