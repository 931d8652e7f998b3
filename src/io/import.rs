use std::collections::HashSet;
use std::io::Read;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::application::{AccountsService, AppError, LineItemInput};
use crate::domain::{
    parse_cents, Cents, MalformedInputError, TaxRate, Transaction, TransactionStatus,
    TransactionType,
};

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// A row that could not be imported
#[derive(Debug, Clone)]
pub struct ImportError {
    /// CSV line number, or 1-based record index for JSON
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate every row without writing anything
    pub dry_run: bool,
    /// Count rows whose document number already exists as skipped instead of failed
    pub skip_duplicates: bool,
}

/// A monetary value as it arrives from outside: a JSON number or any text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    /// Blank text reads as "not recorded".
    pub fn to_cents(&self, field: &'static str) -> Result<Option<Cents>, MalformedInputError> {
        let text = match self {
            RawAmount::Number(n) => n.to_string(),
            RawAmount::Text(s) if s.trim().is_empty() => return Ok(None),
            RawAmount::Text(s) => s.clone(),
        };
        parse_cents(&text)
            .map(Some)
            .map_err(|_| MalformedInputError::NotNumeric { field, value: text })
    }
}

/// A transaction record before validation. Accepts snake_case or camelCase keys.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(alias = "transactionType")]
    pub transaction_type: String,
    pub status: String,
    #[serde(default)]
    pub party: Option<String>,
    pub amount: RawAmount,
    #[serde(default, alias = "balanceDue")]
    pub balance_due: Option<RawAmount>,
    #[serde(default, alias = "dueDate")]
    pub due_date: Option<String>,
    #[serde(alias = "transactionDate")]
    pub transaction_date: String,
}

/// Field-level failure while turning a raw record into a domain value.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

impl FieldError {
    fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self {
            field,
            error: error.into(),
        }
    }
}

impl From<MalformedInputError> for FieldError {
    fn from(e: MalformedInputError) -> Self {
        let field = match &e {
            MalformedInputError::NotNumeric { field, .. }
            | MalformedInputError::Negative { field, .. }
            | MalformedInputError::Overflow { field } => *field,
        };
        FieldError::new(field, e.to_string())
    }
}

impl RawTransaction {
    pub fn into_transaction(self) -> std::result::Result<Transaction, FieldError> {
        let transaction_type =
            TransactionType::from_str(&self.transaction_type).ok_or_else(|| {
                FieldError::new(
                    "transaction_type",
                    format!("unknown type '{}'", self.transaction_type),
                )
            })?;
        let status = TransactionStatus::from_str(&self.status)
            .ok_or_else(|| FieldError::new("status", format!("unknown status '{}'", self.status)))?;
        let amount = self
            .amount
            .to_cents("amount")?
            .ok_or_else(|| FieldError::new("amount", "amount is required"))?;
        let balance_due = match &self.balance_due {
            Some(raw) => raw.to_cents("balance_due")?,
            None => None,
        };
        let transaction_date = parse_timestamp(&self.transaction_date)
            .map_err(|e| FieldError::new("transaction_date", e.to_string()))?;
        let due_date = self
            .due_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| FieldError::new("due_date", e.to_string()))?;

        let mut transaction = Transaction::new(transaction_type, amount, transaction_date)
            .with_status(status)
            .with_balance_due(balance_due);
        transaction.number = non_empty(self.number);
        transaction.party = non_empty(self.party);
        transaction.due_date = due_date;
        Ok(transaction)
    }
}

/// Importer for loading transactions and line items into the books
pub struct Importer<'a> {
    service: &'a AccountsService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a AccountsService) -> Self {
        Self { service }
    }

    /// Import transactions from CSV with a header row naming the columns
    /// (`number, transaction_type, status, party, amount, balance_due, due_date,
    /// transaction_date`).
    pub async fn import_transactions_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = |record: &csv::StringRecord, name: &str| -> String {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .and_then(|i| record.get(i))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let mut raws = Vec::new();
        let mut result = ImportResult::default();
        for (line_num, record) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    result.reject(line, None, format!("CSV parse error: {}", e));
                    continue;
                }
            };
            let balance_due = column(&record, "balance_due");
            let due_date = column(&record, "due_date");
            raws.push((
                line,
                RawTransaction {
                    number: Some(column(&record, "number")),
                    transaction_type: column(&record, "transaction_type"),
                    status: column(&record, "status"),
                    party: Some(column(&record, "party")),
                    amount: RawAmount::Text(column(&record, "amount")),
                    balance_due: Some(RawAmount::Text(balance_due)),
                    due_date: Some(due_date),
                    transaction_date: column(&record, "transaction_date"),
                },
            ));
        }

        self.import_raw_transactions(raws, options, result).await
    }

    /// Import transactions from a JSON array of records.
    pub async fn import_transactions_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let raws: Vec<RawTransaction> = serde_json::from_reader(reader)?;
        let numbered = raws
            .into_iter()
            .enumerate()
            .map(|(i, raw)| (i + 1, raw))
            .collect();
        self.import_raw_transactions(numbered, options, ImportResult::default())
            .await
    }

    async fn import_raw_transactions(
        &self,
        raws: Vec<(usize, RawTransaction)>,
        options: ImportOptions,
        mut result: ImportResult,
    ) -> Result<ImportResult> {
        // Numbers a dry run has accepted so far; a real run finds them in the store.
        let mut accepted = HashSet::new();

        for (line, raw) in raws {
            let transaction = match raw.into_transaction() {
                Ok(t) => t,
                Err(e) => {
                    result.reject(line, Some(e.field), e.error);
                    continue;
                }
            };

            let outcome = if options.dry_run {
                let checked = match transaction.number {
                    Some(ref number) if accepted.contains(number) => {
                        Err(AppError::TransactionAlreadyExists(number.clone()))
                    }
                    _ => self.service.validate_transaction(&transaction).await,
                };
                if let (Ok(()), Some(number)) = (&checked, transaction.number) {
                    accepted.insert(number);
                }
                checked
            } else {
                self.service.record_transaction(transaction).await.map(|_| ())
            };

            match outcome {
                Ok(()) => result.imported += 1,
                Err(AppError::TransactionAlreadyExists(_)) if options.skip_duplicates => {
                    result.skipped += 1;
                }
                Err(e) => result.reject(line, None, format!("Transaction not recorded: {}", e)),
            }
        }

        info!(
            imported = result.imported,
            skipped = result.skipped,
            errors = result.errors.len(),
            "transaction import finished"
        );
        Ok(result)
    }

    /// Import line items from CSV
    /// (`transaction, description, hsn_code, amount, tax_rate, tax_amount`),
    /// attaching each to the transaction with that document number.
    pub async fn import_line_items_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let column = |record: &csv::StringRecord, name: &str| -> String {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .and_then(|i| record.get(i))
                .unwrap_or("")
                .trim()
                .to_string()
        };

        let mut result = ImportResult::default();
        for (line_num, record) in csv_reader.records().enumerate() {
            let line = line_num + 2;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    result.reject(line, None, format!("CSV parse error: {}", e));
                    continue;
                }
            };

            let reference = column(&record, "transaction");
            let input = match parse_line_item(
                &column(&record, "amount"),
                &column(&record, "tax_rate"),
                &column(&record, "tax_amount"),
            ) {
                Ok(input) => LineItemInput {
                    description: non_empty(Some(column(&record, "description"))),
                    hsn_code: non_empty(Some(column(&record, "hsn_code"))),
                    ..input
                },
                Err(e) => {
                    result.reject(line, Some(e.field), e.error);
                    continue;
                }
            };

            let outcome = if options.dry_run {
                self.service
                    .validate_line_item(&reference, &input)
                    .await
                    .map(|_| ())
            } else {
                self.service
                    .add_line_item(&reference, input)
                    .await
                    .map(|_| ())
            };

            match outcome {
                Ok(()) => result.imported += 1,
                Err(e @ AppError::InvalidAmount(_)) => {
                    result.reject(line, Some("amount"), e.to_string())
                }
                Err(e) => result.reject(line, Some("transaction"), e.to_string()),
            }
        }

        info!(
            imported = result.imported,
            errors = result.errors.len(),
            "line item import finished"
        );
        Ok(result)
    }
}

impl ImportResult {
    fn reject(&mut self, line: usize, field: Option<&str>, error: String) {
        warn!(line, field = field.unwrap_or("-"), %error, "import row rejected");
        self.errors.push(ImportError {
            line,
            field: field.map(str::to_string),
            error,
        });
    }
}

fn parse_line_item(
    amount: &str,
    tax_rate: &str,
    tax_amount: &str,
) -> std::result::Result<LineItemInput, FieldError> {
    let amount = RawAmount::Text(amount.to_string())
        .to_cents("amount")?
        .ok_or_else(|| FieldError::new("amount", "amount is required"))?;
    let tax_rate = if tax_rate.is_empty() {
        None
    } else {
        Some(TaxRate::parse(tax_rate).map_err(|_| {
            FieldError::from(MalformedInputError::NotNumeric {
                field: "tax_rate",
                value: tax_rate.to_string(),
            })
        })?)
    };
    let tax_amount = RawAmount::Text(tax_amount.to_string()).to_cents("tax_amount")?;

    Ok(LineItemInput {
        amount,
        tax_rate,
        tax_amount,
        ..LineItemInput::default()
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    anyhow::bail!("Invalid date format: '{}'", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawTransaction {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_raw_amount_accepts_numbers_and_text() {
        assert_eq!(
            RawAmount::Number(serde_json::Number::from_f64(12.5).unwrap()).to_cents("amount"),
            Ok(Some(1250))
        );
        assert_eq!(
            RawAmount::Text("1,180.00".into()).to_cents("amount"),
            Ok(Some(118000))
        );
        assert_eq!(RawAmount::Text("  ".into()).to_cents("amount"), Ok(None));
    }

    #[test]
    fn test_raw_amount_rejects_garbage() {
        assert_eq!(
            RawAmount::Text("twelve".into()).to_cents("balance_due"),
            Err(MalformedInputError::NotNumeric {
                field: "balance_due",
                value: "twelve".into()
            })
        );
    }

    #[test]
    fn test_camel_case_record() {
        let transaction = raw(
            r#"{"number":"INV-7","transactionType":"sales_invoice","status":"pending",
                "amount":1180,"balanceDue":"590.50","dueDate":"2024-03-01",
                "transactionDate":"2024-02-01T09:30:00Z"}"#,
        )
        .into_transaction()
        .unwrap();

        assert_eq!(transaction.transaction_type, TransactionType::SalesInvoice);
        assert_eq!(transaction.amount, 118000);
        assert_eq!(transaction.balance_due, Some(59050));
        assert_eq!(
            transaction.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-03-01".to_string())
        );
    }

    #[test]
    fn test_null_balance_stays_unrecorded() {
        let transaction = raw(
            r#"{"transaction_type":"purchase_bill","status":"pending","amount":"100",
                "balance_due":null,"transaction_date":"2024-01-01"}"#,
        )
        .into_transaction()
        .unwrap();
        assert_eq!(transaction.balance_due, None);
        assert_eq!(transaction.due_date, None);
    }

    #[test]
    fn test_malformed_balance_names_field() {
        let err = raw(
            r#"{"transaction_type":"sales_invoice","status":"pending","amount":100,
                "balance_due":"n/a","transaction_date":"2024-01-01"}"#,
        )
        .into_transaction()
        .unwrap_err();
        assert_eq!(err.field, "balance_due");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let err = raw(
            r#"{"transaction_type":"sales_invoice","status":"void","amount":100,
                "transaction_date":"2024-01-01"}"#,
        )
        .into_transaction()
        .unwrap_err();
        assert_eq!(err.field, "status");
    }
}
