// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use hisaab::application::{AccountsService, LineItemInput};
use hisaab::domain::{Cents, TaxRate, Transaction, TransactionStatus, TransactionType};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountsService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = AccountsService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Record an open transaction due on `due` (YYYY-MM-DD).
pub async fn record_due(
    service: &AccountsService,
    number: &str,
    transaction_type: TransactionType,
    party: &str,
    balance: Cents,
    due: &str,
) -> Result<Transaction> {
    let transaction = Transaction::new(transaction_type, balance, parse_date("2024-01-01"))
        .with_number(number)
        .with_party(party)
        .with_status(TransactionStatus::Pending)
        .with_due_date(parse_date(due));
    Ok(service.record_transaction(transaction).await?)
}

/// Add a line with an already computed tax amount.
pub async fn add_line(
    service: &AccountsService,
    number: &str,
    amount: Cents,
    rate_percent: i64,
    tax_amount: Cents,
) -> Result<()> {
    service
        .add_line_item(
            number,
            LineItemInput {
                amount,
                tax_rate: Some(TaxRate::percent(rate_percent)),
                tax_amount: Some(tax_amount),
                ..LineItemInput::default()
            },
        )
        .await?;
    Ok(())
}
