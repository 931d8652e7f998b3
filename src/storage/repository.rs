use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Cents, LineItem, TaxRate, Transaction, TransactionId, TransactionStatus, TransactionType,
};

use super::MIGRATION_001_INITIAL;

const TRANSACTION_COLUMNS: &str = "id, number, transaction_type, status, party, amount, \
    balance_due, due_date, transaction_date, created_at";

/// Optional filters for listing transactions. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub party: Option<String>,
    pub status: Option<TransactionStatus>,
    pub limit: Option<usize>,
}

impl TransactionFilter {
    pub fn of_type(transaction_type: TransactionType) -> Self {
        Self {
            transaction_type: Some(transaction_type),
            ..Self::default()
        }
    }
}

/// Repository for persisting and querying transactions and their line items.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Connect and migrate.
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Transactions
    // ========================

    pub async fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, number, transaction_type, status, party, amount,
                balance_due, due_date, transaction_date, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(&transaction.number)
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.status.as_str())
        .bind(&transaction.party)
        .bind(transaction.amount)
        .bind(transaction.balance_due)
        .bind(transaction.due_date.map(|dt| dt.to_rfc3339()))
        .bind(transaction.transaction_date.to_rfc3339())
        .bind(transaction.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    pub async fn get_transaction_by_number(&self, number: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM transactions WHERE number = ?",
            TRANSACTION_COLUMNS
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction by number")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// List transactions matching the filter, oldest document first.
    pub async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut query = format!("SELECT {} FROM transactions WHERE 1=1", TRANSACTION_COLUMNS);

        if filter.transaction_type.is_some() {
            query.push_str(" AND transaction_type = ?");
        }
        if filter.party.is_some() {
            query.push_str(" AND party = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }

        query.push_str(" ORDER BY transaction_date, created_at");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(transaction_type) = filter.transaction_type {
            sql_query = sql_query.bind(transaction_type.as_str());
        }
        if let Some(ref party) = filter.party {
            sql_query = sql_query.bind(party);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Take `payment` off an open transaction's balance in a single statement.
    ///
    /// The row only changes while it is still open with at least `payment`
    /// outstanding, so concurrent payments cannot overwrite each other.
    /// Returns the new balance and status, or `None` when the guard did not match.
    pub async fn apply_payment(
        &self,
        id: TransactionId,
        payment: Cents,
    ) -> Result<Option<(Cents, TransactionStatus)>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET balance_due = balance_due - ?,
                status = CASE WHEN balance_due = ? THEN ? ELSE ? END
            WHERE id = ?
              AND balance_due >= ?
              AND status IN (?, ?, ?)
            RETURNING balance_due, status
            "#,
        )
        .bind(payment)
        .bind(payment)
        .bind(TransactionStatus::Paid.as_str())
        .bind(TransactionStatus::PartiallyPaid.as_str())
        .bind(id.to_string())
        .bind(payment)
        .bind(TransactionStatus::Pending.as_str())
        .bind(TransactionStatus::Overdue.as_str())
        .bind(TransactionStatus::PartiallyPaid.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to apply payment")?;

        match row {
            Some(row) => {
                let balance_due: Cents = row.get("balance_due");
                let status_str: String = row.get("status");
                let status = TransactionStatus::from_str(&status_str)
                    .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?;
                Ok(Some((balance_due, status)))
            }
            None => Ok(None),
        }
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let type_str: String = row.get("transaction_type");
        let status_str: String = row.get("status");
        let due_date_str: Option<String> = row.get("due_date");
        let transaction_date_str: String = row.get("transaction_date");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            number: row.get("number"),
            transaction_type: TransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            party: row.get("party"),
            amount: row.get("amount"),
            balance_due: row.get("balance_due"),
            due_date: due_date_str
                .map(|s| parse_rfc3339(&s))
                .transpose()
                .context("Invalid due_date timestamp")?,
            transaction_date: parse_rfc3339(&transaction_date_str)
                .context("Invalid transaction_date timestamp")?,
            created_at: parse_rfc3339(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Line items
    // ========================

    /// Append a line item after the transaction's existing lines.
    pub async fn save_line_item(&self, item: &LineItem) -> Result<()> {
        let transaction_id = item.transaction_id.to_string();
        sqlx::query(
            r#"
            INSERT INTO line_items (
                id, transaction_id, position, description, hsn_code,
                amount, tax_rate, tax_amount
            )
            VALUES (
                ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM line_items WHERE transaction_id = ?),
                ?, ?, ?, ?, ?
            )
            "#,
        )
        .bind(item.id.to_string())
        .bind(&transaction_id)
        .bind(&transaction_id)
        .bind(&item.description)
        .bind(&item.hsn_code)
        .bind(item.amount)
        .bind(item.tax_rate.map(|rate| rate.0))
        .bind(item.tax_amount)
        .execute(&self.pool)
        .await
        .context("Failed to save line item")?;
        Ok(())
    }

    /// Line items of a transaction in entry order.
    pub async fn list_line_items(&self, transaction_id: TransactionId) -> Result<Vec<LineItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, description, hsn_code, amount, tax_rate, tax_amount
            FROM line_items
            WHERE transaction_id = ?
            ORDER BY position
            "#,
        )
        .bind(transaction_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list line items")?;

        rows.iter().map(Self::row_to_line_item).collect()
    }

    fn row_to_line_item(row: &sqlx::sqlite::SqliteRow) -> Result<LineItem> {
        let id_str: String = row.get("id");
        let transaction_id_str: String = row.get("transaction_id");
        let tax_rate: Option<i64> = row.get("tax_rate");

        Ok(LineItem {
            id: Uuid::parse_str(&id_str).context("Invalid line item ID")?,
            transaction_id: Uuid::parse_str(&transaction_id_str)
                .context("Invalid line item transaction ID")?,
            description: row.get("description"),
            hsn_code: row.get("hsn_code"),
            amount: row.get("amount"),
            tax_rate: tax_rate.map(TaxRate),
            tax_amount: row.get("tax_amount"),
        })
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
