use std::io::Write;

use anyhow::Result;

use crate::application::{AccountsService, AgeingReport, PartyAgeingReport, TaxBreakupReport};
use crate::domain::format_cents;
use crate::storage::TransactionFilter;

/// Exporter for writing books data out as CSV
pub struct Exporter<'a> {
    service: &'a AccountsService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a AccountsService) -> Self {
        Self { service }
    }

    /// Export transactions in the same column layout the CSV importer reads.
    pub async fn export_transactions_csv<W: Write>(
        &self,
        writer: W,
        filter: &TransactionFilter,
    ) -> Result<usize> {
        let transactions = self.service.list_transactions(filter).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "number",
            "transaction_type",
            "status",
            "party",
            "amount",
            "balance_due",
            "due_date",
            "transaction_date",
        ])?;

        for transaction in &transactions {
            csv_writer.write_record([
                transaction.number.clone().unwrap_or_default(),
                transaction.transaction_type.as_str().to_string(),
                transaction.status.as_str().to_string(),
                transaction.party.clone().unwrap_or_default(),
                format_cents(transaction.amount),
                transaction
                    .balance_due
                    .map(format_cents)
                    .unwrap_or_default(),
                transaction
                    .due_date
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_default(),
                transaction.transaction_date.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }
}

/// Write an ageing report's buckets as `range,amount,percentage` rows.
pub fn write_ageing_csv<W: Write>(report: &AgeingReport, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["range", "amount", "percentage"])?;
    for bucket in &report.buckets {
        csv_writer.write_record([
            bucket.range.label().to_string(),
            format_cents(bucket.amount),
            format!("{:.2}", bucket.percentage),
        ])?;
    }
    csv_writer.flush()?;
    Ok(report.buckets.len())
}

/// Write one row per party: `party,current,days_1_30,days_31_60,days_60_plus,total`.
/// Transactions without a party come last with an empty `party` column.
pub fn write_party_ageing_csv<W: Write>(report: &PartyAgeingReport, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "party",
        "current",
        "days_1_30",
        "days_31_60",
        "days_60_plus",
        "total",
    ])?;
    for party in &report.parties {
        csv_writer.write_record([
            party.party.clone().unwrap_or_default(),
            format_cents(party.summary.current),
            format_cents(party.summary.days_1_to_30),
            format_cents(party.summary.days_31_to_60),
            format_cents(party.summary.days_60_plus),
            format_cents(party.total),
        ])?;
    }
    csv_writer.flush()?;
    Ok(report.parties.len())
}

/// Write the per-rate rows of a tax breakup followed by a `total` row.
pub fn write_tax_breakup_csv<W: Write>(report: &TaxBreakupReport, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["rate", "taxable_amount", "cgst", "sgst", "igst", "total"])?;
    for row in &report.rows {
        csv_writer.write_record([
            row.rate.to_string(),
            format_cents(row.taxable_amount),
            format_cents(row.cgst),
            format_cents(row.sgst),
            format_cents(row.igst),
            format_cents(row.total),
        ])?;
    }
    let totals = &report.totals;
    csv_writer.write_record([
        "total".to_string(),
        format_cents(totals.taxable_amount),
        format_cents(totals.cgst),
        format_cents(totals.sgst),
        format_cents(totals.igst),
        format_cents(totals.total),
    ])?;
    csv_writer.flush()?;
    Ok(report.rows.len())
}
