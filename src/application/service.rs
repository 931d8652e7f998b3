use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::{
    ageing_placement, compute_ageing, compute_party_ageing, compute_tax_breakup, days_overdue,
    outstanding_total, AgeingKind, Cents, LineItem, TaxBreakupTotals, TaxRate, Transaction,
    TransactionStatus, TransactionType,
};
use crate::storage::{Repository, TransactionFilter};

use super::{
    AgeingReport, AppError, OutstandingSummary, PartyAgeingReport, TaxBreakupReport,
    TransactionInfo,
};

/// Guarded balance updates tried before a payment gives up.
const MAX_PAYMENT_ATTEMPTS: usize = 8;

/// Application service for the books: the entry point for any client (CLI, API, ...).
pub struct AccountsService {
    repo: Repository,
}

/// Tax details of a line being added to a transaction.
#[derive(Debug, Clone, Default)]
pub struct LineItemInput {
    pub amount: Cents,
    pub tax_rate: Option<TaxRate>,
    pub tax_amount: Option<Cents>,
    pub description: Option<String>,
    pub hsn_code: Option<String>,
}

impl AccountsService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create (or open) a database at the given path and apply the schema.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Transactions
    // ========================

    /// Checks a transaction must pass before it is stored: a non-negative
    /// amount, a balance within `0..=amount`, and a document number not yet in use.
    pub async fn validate_transaction(&self, transaction: &Transaction) -> Result<(), AppError> {
        validate_amounts(transaction)?;
        if let Some(ref number) = transaction.number {
            if self.repo.get_transaction_by_number(number).await?.is_some() {
                return Err(AppError::TransactionAlreadyExists(number.clone()));
            }
        }
        Ok(())
    }

    /// Validate and store a transaction.
    pub async fn record_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, AppError> {
        self.validate_transaction(&transaction).await?;

        self.repo.save_transaction(&transaction).await?;
        info!(
            transaction = %transaction.reference(),
            transaction_type = %transaction.transaction_type,
            amount = transaction.amount,
            "recorded transaction"
        );
        Ok(transaction)
    }

    /// Look a transaction up by document number, falling back to its id.
    pub async fn get_transaction(&self, reference: &str) -> Result<Transaction, AppError> {
        if let Some(transaction) = self.repo.get_transaction_by_number(reference).await? {
            return Ok(transaction);
        }
        if let Ok(id) = uuid::Uuid::parse_str(reference) {
            if let Some(transaction) = self.repo.get_transaction(id).await? {
                return Ok(transaction);
            }
        }
        Err(AppError::TransactionNotFound(reference.to_string()))
    }

    pub async fn get_transaction_info(
        &self,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<TransactionInfo, AppError> {
        let transaction = self.get_transaction(reference).await?;
        let line_items = self.repo.list_line_items(transaction.id).await?;

        Ok(TransactionInfo {
            display_status: transaction.display_status(now),
            is_open: transaction.is_open(),
            days_overdue: transaction.due_date.map(|due| days_overdue(due, now)),
            line_items,
            transaction,
        })
    }

    pub async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions(filter).await?)
    }

    /// Apply a payment to an open transaction's balance.
    /// The status moves to `paid` once nothing is left, `partially_paid` otherwise.
    ///
    /// The balance is decremented in the store under a guard; when another
    /// payment lands first the transaction is re-read and checked again.
    pub async fn record_payment(
        &self,
        reference: &str,
        payment: Cents,
    ) -> Result<Transaction, AppError> {
        if payment <= 0 {
            return Err(AppError::InvalidAmount(
                "Payment must be positive".to_string(),
            ));
        }

        for attempt in 1..=MAX_PAYMENT_ATTEMPTS {
            let mut transaction = self.get_transaction(reference).await?;
            if !transaction.is_open() {
                return Err(AppError::TransactionNotOpen {
                    number: transaction.reference(),
                    status: transaction.status,
                });
            }
            let balance_due = transaction
                .balance_due
                .ok_or_else(|| AppError::UnknownBalance(transaction.reference()))?;
            if payment > balance_due {
                return Err(AppError::Overpayment {
                    number: transaction.reference(),
                    balance_due,
                    payment,
                });
            }

            let Some((remaining, status)) = self.repo.apply_payment(transaction.id, payment).await?
            else {
                debug!(
                    transaction = %transaction.reference(),
                    attempt,
                    "balance changed while paying, retrying"
                );
                continue;
            };

            info!(
                transaction = %transaction.reference(),
                payment,
                remaining,
                status = %status,
                "recorded payment"
            );
            transaction.balance_due = Some(remaining);
            transaction.status = status;
            return Ok(transaction);
        }

        Err(AppError::ConcurrentUpdate(reference.to_string()))
    }

    // ========================
    // Line items
    // ========================

    /// Checks a line must pass before it is attached: non-negative amounts and
    /// an existing transaction, which is returned.
    pub async fn validate_line_item(
        &self,
        reference: &str,
        input: &LineItemInput,
    ) -> Result<Transaction, AppError> {
        if input.amount < 0 || input.tax_amount.is_some_and(|tax| tax < 0) {
            return Err(AppError::InvalidAmount(
                "Line amounts cannot be negative".to_string(),
            ));
        }
        self.get_transaction(reference).await
    }

    pub async fn add_line_item(
        &self,
        reference: &str,
        input: LineItemInput,
    ) -> Result<LineItem, AppError> {
        let transaction = self.validate_line_item(reference, &input).await?;
        let item = LineItem {
            tax_rate: input.tax_rate,
            tax_amount: input.tax_amount,
            description: input.description,
            hsn_code: input.hsn_code,
            ..LineItem::new(transaction.id, input.amount)
        };

        self.repo.save_line_item(&item).await?;
        debug!(transaction = %transaction.reference(), amount = item.amount, "added line item");
        Ok(item)
    }

    pub async fn list_line_items(&self, reference: &str) -> Result<Vec<LineItem>, AppError> {
        let transaction = self.get_transaction(reference).await?;
        Ok(self.repo.list_line_items(transaction.id).await?)
    }

    // ========================
    // Reports
    // ========================

    async fn transactions_for(&self, kind: AgeingKind) -> Result<Vec<Transaction>, AppError> {
        self.list_transactions(&TransactionFilter::of_type(kind.transaction_type()))
            .await
    }

    /// Receivables or payables bucketed by days past due.
    pub async fn get_ageing_report(
        &self,
        kind: AgeingKind,
        now: DateTime<Utc>,
    ) -> Result<AgeingReport, AppError> {
        let transactions = self.transactions_for(kind).await?;

        let mut included = 0;
        let mut skipped = 0;
        for transaction in transactions.iter().filter(|t| t.is_open()) {
            match ageing_placement(transaction, now)? {
                Some(_) => included += 1,
                None => skipped += 1,
            }
        }

        let summary = compute_ageing(&transactions, now)?;
        debug!(kind = %kind, included, skipped, "computed ageing");

        Ok(AgeingReport {
            kind,
            as_of: now,
            buckets: summary.buckets()?,
            total: summary.total()?,
            included,
            skipped,
        })
    }

    pub async fn get_party_ageing_report(
        &self,
        kind: AgeingKind,
        now: DateTime<Utc>,
    ) -> Result<PartyAgeingReport, AppError> {
        let transactions = self.transactions_for(kind).await?;
        Ok(PartyAgeingReport {
            kind,
            as_of: now,
            parties: compute_party_ageing(&transactions, now)?,
        })
    }

    /// CGST/SGST/IGST breakup of a transaction's lines.
    /// Whether the supply crosses state lines is the caller's call.
    pub async fn get_tax_breakup(
        &self,
        reference: &str,
        is_inter_state: bool,
    ) -> Result<TaxBreakupReport, AppError> {
        let transaction = self.get_transaction(reference).await?;
        let line_items = self.repo.list_line_items(transaction.id).await?;

        let rows = compute_tax_breakup(&line_items, is_inter_state)?;
        let totals = TaxBreakupTotals::from_rows(&rows)?;

        Ok(TaxBreakupReport {
            transaction: transaction.reference(),
            is_inter_state,
            rows,
            totals,
        })
    }

    /// Outstanding receivables and payables with overdue counts.
    pub async fn get_outstanding_summary(
        &self,
        now: DateTime<Utc>,
    ) -> Result<OutstandingSummary, AppError> {
        let receivables = self
            .list_transactions(&TransactionFilter::of_type(TransactionType::SalesInvoice))
            .await?;
        let payables = self
            .list_transactions(&TransactionFilter::of_type(TransactionType::PurchaseBill))
            .await?;

        let overdue = |transactions: &[Transaction]| {
            transactions
                .iter()
                .filter(|t| t.is_open() && t.display_status(now) == TransactionStatus::Overdue)
                .count()
        };

        Ok(OutstandingSummary {
            as_of: now,
            total_receivables: outstanding_total(&receivables)?,
            total_payables: outstanding_total(&payables)?,
            overdue_receivables: overdue(receivables.as_slice()),
            overdue_payables: overdue(payables.as_slice()),
        })
    }
}

fn validate_amounts(transaction: &Transaction) -> Result<(), AppError> {
    if transaction.amount < 0 {
        return Err(AppError::InvalidAmount(
            "Amount cannot be negative".to_string(),
        ));
    }
    if let Some(balance) = transaction.balance_due {
        if balance < 0 || balance > transaction.amount {
            return Err(AppError::InvalidAmount(format!(
                "Balance due must be between 0 and the transaction amount ({})",
                transaction.amount
            )));
        }
    }
    Ok(())
}
