use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::application::{AccountsService, LineItemInput};
use crate::domain::{
    format_cents, parse_cents, AgeingKind, TaxRate, Transaction, TransactionStatus,
    TransactionType,
};
use crate::io::{
    parse_timestamp, write_ageing_csv, write_party_ageing_csv, write_tax_breakup_csv, Exporter,
    ImportOptions, ImportResult, Importer,
};
use crate::storage::TransactionFilter;

/// Hisaab - receivables, payables and GST books
#[derive(Parser)]
#[command(name = "hisaab")]
#[command(about = "Ageing and GST breakup over sales and purchase transactions")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "HISAAB_DATABASE", default_value = "hisaab.db")]
    pub database: String,

    /// Enable debug logging (overridden by HISAAB_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Transaction commands
    #[command(subcommand)]
    #[command(name = "txn")]
    Transaction(TransactionCommands),

    /// Generate reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Import transactions or line items
    Import {
        /// What to import: transactions, line-items
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Input format: csv, json (json is transactions only)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Validate without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip transactions whose number already exists
        #[arg(long)]
        skip_duplicates: bool,
    },

    /// Export transactions or an ageing report to CSV
    Export {
        /// What to export: transactions, ageing
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Ageing side: receivables, payables
        #[arg(long, default_value = "receivables")]
        kind: String,

        /// Reference date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        as_of: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a new transaction
    Create {
        /// Document number (must be unique), e.g. INV-001
        number: String,

        /// Type: sales_invoice, purchase_bill, sales_order, purchase_order, quotation,
        /// receipt, payment, credit_note, debit_note
        #[arg(short = 't', long = "type")]
        transaction_type: String,

        /// Total amount (e.g. "1180.00")
        #[arg(short, long)]
        amount: String,

        /// Stored status
        #[arg(short, long, default_value = "pending")]
        status: String,

        /// Customer or supplier
        #[arg(short, long)]
        party: Option<String>,

        /// Balance due (defaults to the full amount)
        #[arg(long)]
        balance: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Document date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// List transactions
    List {
        /// Filter by type
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,

        /// Filter by party
        #[arg(short, long)]
        party: Option<String>,

        /// Filter by stored status
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of transactions to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Reference date for the displayed status (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Show a transaction with its lines
    Show {
        /// Document number or ID
        reference: String,

        /// Reference date for the displayed status (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Record a payment against a transaction
    Pay {
        /// Document number or ID
        reference: String,

        /// Amount paid
        amount: String,
    },

    /// Add a line item to a transaction
    Item {
        /// Document number or ID
        reference: String,

        /// Taxable amount
        #[arg(short, long)]
        amount: String,

        /// Tax rate in percent (e.g. 18 or 2.5)
        #[arg(short, long)]
        rate: Option<String>,

        /// Tax amount already computed for the line
        #[arg(long)]
        tax: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// HSN code
        #[arg(long)]
        hsn: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Receivables or payables by days past due
    Ageing {
        /// receivables or payables
        #[arg(default_value = "receivables")]
        kind: String,

        /// Reference date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        as_of: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Ageing split by customer or supplier
    PartyAgeing {
        /// receivables or payables
        #[arg(default_value = "receivables")]
        kind: String,

        /// Reference date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        as_of: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// CGST/SGST/IGST breakup of a transaction
    Tax {
        /// Document number or ID
        reference: String,

        /// Supply crosses state lines (IGST instead of CGST + SGST)
        #[arg(long)]
        inter_state: bool,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Outstanding receivables and payables
    Outstanding {
        /// Reference date (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        as_of: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                AccountsService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Transaction(cmd) => {
                let service = AccountsService::connect(&self.database).await?;
                run_transaction_command(&service, cmd).await?;
            }

            Commands::Report(cmd) => {
                let service = AccountsService::connect(&self.database).await?;
                run_report_command(&service, cmd).await?;
            }

            Commands::Import {
                import_type,
                input,
                format,
                dry_run,
                skip_duplicates,
            } => {
                let service = AccountsService::connect(&self.database).await?;
                let options = ImportOptions {
                    dry_run,
                    skip_duplicates,
                };
                run_import_command(&service, &import_type, input.as_deref(), &format, options)
                    .await?;
            }

            Commands::Export {
                export_type,
                output,
                kind,
                as_of,
            } => {
                let service = AccountsService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref(), &kind, as_of)
                    .await?;
            }
        }

        Ok(())
    }
}

async fn run_transaction_command(
    service: &AccountsService,
    cmd: TransactionCommands,
) -> Result<()> {
    match cmd {
        TransactionCommands::Create {
            number,
            transaction_type,
            amount,
            status,
            party,
            balance,
            due,
            date,
        } => {
            let transaction_type = parse_transaction_type(&transaction_type)?;
            let status = parse_status(&status)?;
            let amount = parse_cents(&amount).context("Invalid amount format. Use '1180.00'")?;
            let balance = balance
                .map(|b| parse_cents(&b))
                .transpose()
                .context("Invalid balance format")?
                .unwrap_or(amount);
            let transaction_date = parse_as_of(date)?;

            let mut transaction = Transaction::new(transaction_type, amount, transaction_date)
                .with_number(number)
                .with_status(status)
                .with_balance_due(Some(balance));
            if let Some(party) = party {
                transaction = transaction.with_party(party);
            }
            if let Some(due) = due {
                transaction = transaction.with_due_date(
                    parse_timestamp(&due)
                        .with_context(|| format!("Invalid due date '{}'. Use YYYY-MM-DD", due))?,
                );
            }

            let transaction = service.record_transaction(transaction).await?;
            println!(
                "Recorded {} {}: {} ({})",
                transaction.transaction_type,
                transaction.reference(),
                format_cents(transaction.amount),
                transaction.status
            );
        }

        TransactionCommands::List {
            transaction_type,
            party,
            status,
            limit,
            as_of,
        } => {
            let now = parse_as_of(as_of)?;
            let filter = TransactionFilter {
                transaction_type: transaction_type
                    .as_deref()
                    .map(parse_transaction_type)
                    .transpose()?,
                party,
                status: status.as_deref().map(parse_status).transpose()?,
                limit,
            };
            let transactions = service.list_transactions(&filter).await?;

            if transactions.is_empty() {
                println!("No transactions found.");
                return Ok(());
            }

            println!(
                "{:<12} {:<15} {:<20} {:>12} {:>12} {:<10} {:<15}",
                "DATE", "NUMBER", "PARTY", "AMOUNT", "BALANCE", "DUE", "STATUS"
            );
            println!("{}", "-".repeat(102));
            for t in &transactions {
                println!(
                    "{:<12} {:<15} {:<20} {:>12} {:>12} {:<10} {:<15}",
                    t.transaction_date.format("%Y-%m-%d"),
                    truncate(&t.reference(), 15),
                    truncate(t.party.as_deref().unwrap_or("-"), 20),
                    format_cents(t.amount),
                    t.balance_due.map(format_cents).unwrap_or_else(|| "-".into()),
                    t.due_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "-".into()),
                    t.display_status(now).to_string()
                );
            }
        }

        TransactionCommands::Show { reference, as_of } => {
            let now = parse_as_of(as_of)?;
            let info = service.get_transaction_info(&reference, now).await?;
            let t = &info.transaction;

            println!("Transaction: {}", t.reference());
            println!("  ID:             {}", t.id);
            println!("  Type:           {}", t.transaction_type);
            println!("  Party:          {}", t.party.as_deref().unwrap_or("-"));
            println!("  Date:           {}", t.transaction_date.format("%Y-%m-%d"));
            println!("  Amount:         {}", format_cents(t.amount));
            println!(
                "  Balance due:    {}",
                t.balance_due
                    .map(format_cents)
                    .unwrap_or_else(|| "(not recorded)".into())
            );
            if let Some(due) = t.due_date {
                println!("  Due:            {}", due.format("%Y-%m-%d"));
            }
            if let Some(days) = info.days_overdue.filter(|d| *d > 0) {
                println!("  Days overdue:   {}", days);
            }
            println!("  Stored status:  {}", t.status);
            println!("  Status:         {}", info.display_status);

            if !info.line_items.is_empty() {
                println!();
                println!(
                    "  {:<30} {:<10} {:>12} {:>7} {:>10}",
                    "DESCRIPTION", "HSN", "AMOUNT", "RATE", "TAX"
                );
                for item in &info.line_items {
                    println!(
                        "  {:<30} {:<10} {:>12} {:>6}% {:>10}",
                        truncate(item.description.as_deref().unwrap_or("-"), 30),
                        item.hsn_code.as_deref().unwrap_or("-"),
                        format_cents(item.amount),
                        item.effective_rate().to_string(),
                        format_cents(item.tax_amount.unwrap_or(0))
                    );
                }
            }
        }

        TransactionCommands::Pay { reference, amount } => {
            let amount = parse_cents(&amount).context("Invalid amount format. Use '500.00'")?;
            let transaction = service.record_payment(&reference, amount).await?;
            println!(
                "Recorded payment of {} on {}; balance due {} ({})",
                format_cents(amount),
                transaction.reference(),
                format_cents(transaction.balance_due.unwrap_or(0)),
                transaction.status
            );
        }

        TransactionCommands::Item {
            reference,
            amount,
            rate,
            tax,
            description,
            hsn,
        } => {
            let input = LineItemInput {
                amount: parse_cents(&amount).context("Invalid amount format")?,
                tax_rate: rate
                    .map(|r| TaxRate::parse(&r))
                    .transpose()
                    .context("Invalid tax rate. Use e.g. '18' or '2.5'")?,
                tax_amount: tax
                    .map(|t| parse_cents(&t))
                    .transpose()
                    .context("Invalid tax amount format")?,
                description,
                hsn_code: hsn,
            };
            let item = service.add_line_item(&reference, input).await?;
            println!(
                "Added line to {}: {} @ {}%",
                reference,
                format_cents(item.amount),
                item.effective_rate()
            );
        }
    }

    Ok(())
}

async fn run_report_command(service: &AccountsService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Ageing {
            kind,
            as_of,
            format,
        } => {
            let kind = parse_kind(&kind)?;
            let now = parse_as_of(as_of)?;
            let report = service.get_ageing_report(kind, now).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "csv" => {
                    write_ageing_csv(&report, std::io::stdout())?;
                }
                _ => {
                    println!("Ageing Report ({})", report.kind);
                    println!("As of: {}", now.format("%Y-%m-%d"));
                    println!();
                    println!("{:<15} {:>15} {:>8}", "RANGE", "AMOUNT", "PERCENT");
                    println!("{}", "-".repeat(40));
                    for bucket in &report.buckets {
                        println!(
                            "{:<15} {:>15} {:>7.1}%",
                            bucket.range.label(),
                            format_cents(bucket.amount),
                            bucket.percentage
                        );
                    }
                    println!("{}", "-".repeat(40));
                    println!("{:<15} {:>15}", "TOTAL", format_cents(report.total));
                    if report.skipped > 0 {
                        println!();
                        println!(
                            "{} open transaction(s) without a due date or balance were left out",
                            report.skipped
                        );
                    }
                }
            }
        }

        ReportCommands::PartyAgeing {
            kind,
            as_of,
            format,
        } => {
            let kind = parse_kind(&kind)?;
            let now = parse_as_of(as_of)?;
            let report = service.get_party_ageing_report(kind, now).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "csv" => {
                    write_party_ageing_csv(&report, std::io::stdout())?;
                }
                _ => {
                    println!("Party Ageing Report ({})", report.kind);
                    println!("As of: {}", now.format("%Y-%m-%d"));
                    println!();
                    println!(
                        "{:<20} {:>12} {:>12} {:>12} {:>12} {:>12}",
                        "PARTY", "CURRENT", "1-30", "31-60", "60+", "TOTAL"
                    );
                    println!("{}", "-".repeat(85));
                    for p in &report.parties {
                        println!(
                            "{:<20} {:>12} {:>12} {:>12} {:>12} {:>12}",
                            truncate(p.party.as_deref().unwrap_or("(no party)"), 20),
                            format_cents(p.summary.current),
                            format_cents(p.summary.days_1_to_30),
                            format_cents(p.summary.days_31_to_60),
                            format_cents(p.summary.days_60_plus),
                            format_cents(p.total)
                        );
                    }
                }
            }
        }

        ReportCommands::Tax {
            reference,
            inter_state,
            format,
        } => {
            let report = service.get_tax_breakup(&reference, inter_state).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "csv" => {
                    write_tax_breakup_csv(&report, std::io::stdout())?;
                }
                _ => {
                    println!("Tax Breakup: {}", report.transaction);
                    println!(
                        "Supply: {}",
                        if report.is_inter_state {
                            "inter-state (IGST)"
                        } else {
                            "intra-state (CGST + SGST)"
                        }
                    );
                    println!();
                    println!(
                        "{:>7} {:>14} {:>12} {:>12} {:>12} {:>12}",
                        "RATE", "TAXABLE", "CGST", "SGST", "IGST", "TOTAL"
                    );
                    println!("{}", "-".repeat(74));
                    for row in &report.rows {
                        println!(
                            "{:>6}% {:>14} {:>12} {:>12} {:>12} {:>12}",
                            row.rate.to_string(),
                            format_cents(row.taxable_amount),
                            format_cents(row.cgst),
                            format_cents(row.sgst),
                            format_cents(row.igst),
                            format_cents(row.total)
                        );
                    }
                    println!("{}", "-".repeat(74));
                    let totals = &report.totals;
                    println!(
                        "{:>7} {:>14} {:>12} {:>12} {:>12} {:>12}",
                        "TOTAL",
                        format_cents(totals.taxable_amount),
                        format_cents(totals.cgst),
                        format_cents(totals.sgst),
                        format_cents(totals.igst),
                        format_cents(totals.total)
                    );
                }
            }
        }

        ReportCommands::Outstanding { as_of, format } => {
            let now = parse_as_of(as_of)?;
            let summary = service.get_outstanding_summary(now).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                _ => {
                    println!("Outstanding as of {}", now.format("%Y-%m-%d"));
                    println!();
                    println!(
                        "Receivables: {:>15}  ({} overdue)",
                        format_cents(summary.total_receivables),
                        summary.overdue_receivables
                    );
                    println!(
                        "Payables:    {:>15}  ({} overdue)",
                        format_cents(summary.total_payables),
                        summary.overdue_payables
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &AccountsService,
    import_type: &str,
    input: Option<&str>,
    format: &str,
    options: ImportOptions,
) -> Result<()> {
    let reader: Box<dyn Read> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Cannot open {}", path))?,
        )),
        None => Box::new(std::io::stdin()),
    };
    let dry_run = options.dry_run;
    let importer = Importer::new(service);

    let result = match (import_type, format) {
        ("transactions", "csv") => importer.import_transactions_csv(reader, options).await?,
        ("transactions", "json") => importer.import_transactions_json(reader, options).await?,
        ("line-items", "csv") => importer.import_line_items_csv(reader, options).await?,
        _ => bail!(
            "Unsupported import '{}' as {}. Use transactions (csv, json) or line-items (csv)",
            import_type,
            format
        ),
    };

    print_import_result(&result, dry_run);
    Ok(())
}

fn print_import_result(result: &ImportResult, dry_run: bool) {
    if dry_run {
        println!("Validation complete");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!(
                "  Line {}{}: {}",
                error.line,
                error
                    .field
                    .as_ref()
                    .map(|f| format!(" ({})", f))
                    .unwrap_or_default(),
                error.error
            );
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }
}

async fn run_export_command(
    service: &AccountsService,
    export_type: &str,
    output: Option<&str>,
    kind: &str,
    as_of: Option<String>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Cannot create {}", path))?,
        )),
        None => Box::new(std::io::stdout()),
    };

    match export_type {
        "transactions" => {
            let count = Exporter::new(service)
                .export_transactions_csv(writer, &TransactionFilter::default())
                .await?;
            eprintln!("Exported {} transactions", count);
        }
        "ageing" => {
            let report = service
                .get_ageing_report(parse_kind(kind)?, parse_as_of(as_of)?)
                .await?;
            write_ageing_csv(&report, writer)?;
            eprintln!("Exported {} ageing report", report.kind);
        }
        _ => bail!(
            "Unknown export type '{}'. Use transactions or ageing",
            export_type
        ),
    }

    Ok(())
}

fn parse_transaction_type(s: &str) -> Result<TransactionType> {
    TransactionType::from_str(s).with_context(|| format!("Unknown transaction type '{}'", s))
}

fn parse_status(s: &str) -> Result<TransactionStatus> {
    TransactionStatus::from_str(s).with_context(|| format!("Unknown status '{}'", s))
}

fn parse_kind(s: &str) -> Result<AgeingKind> {
    AgeingKind::from_str(s)
        .with_context(|| format!("Unknown ageing kind '{}'. Use receivables or payables", s))
}

fn parse_as_of(date: Option<String>) -> Result<DateTime<Utc>> {
    match date {
        Some(date_str) => parse_timestamp(&date_str)
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)),
        None => Ok(Utc::now()),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
