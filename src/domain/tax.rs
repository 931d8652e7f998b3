use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{checked_accumulate, non_negative, Cents, LineItem, MalformedInputError, TaxRate};

/// GST collected at one rate, split into its central/state/integrated parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakupRow {
    pub rate: TaxRate,
    pub taxable_amount: Cents,
    pub cgst: Cents,
    pub sgst: Cents,
    pub igst: Cents,
    pub total: Cents,
}

impl TaxBreakupRow {
    fn new(rate: TaxRate) -> Self {
        Self {
            rate,
            taxable_amount: 0,
            cgst: 0,
            sgst: 0,
            igst: 0,
            total: 0,
        }
    }

    /// Split the accumulated tax. Intra-state tax halves into CGST and SGST,
    /// with any odd paisa going to SGST so the halves add back to the total.
    fn split(&mut self, is_inter_state: bool) {
        if is_inter_state {
            self.igst = self.total;
            self.cgst = 0;
            self.sgst = 0;
        } else {
            self.cgst = self.total / 2;
            self.sgst = self.total - self.cgst;
            self.igst = 0;
        }
    }
}

/// Totals row under a breakup table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakupTotals {
    pub taxable_amount: Cents,
    pub cgst: Cents,
    pub sgst: Cents,
    pub igst: Cents,
    pub total: Cents,
}

impl TaxBreakupTotals {
    pub fn from_rows(rows: &[TaxBreakupRow]) -> Result<Self, MalformedInputError> {
        rows.iter().try_fold(Self::default(), |acc, row| {
            Ok(Self {
                taxable_amount: checked_accumulate(
                    acc.taxable_amount,
                    row.taxable_amount,
                    "taxable_amount",
                )?,
                cgst: checked_accumulate(acc.cgst, row.cgst, "cgst")?,
                sgst: checked_accumulate(acc.sgst, row.sgst, "sgst")?,
                igst: checked_accumulate(acc.igst, row.igst, "igst")?,
                total: checked_accumulate(acc.total, row.total, "tax_amount")?,
            })
        })
    }
}

/// Group line items by tax rate and split each group's tax.
///
/// Rows come out in the order their rate first appears. Whether the supply
/// is inter-state is decided by the caller.
pub fn compute_tax_breakup(
    line_items: &[LineItem],
    is_inter_state: bool,
) -> Result<Vec<TaxBreakupRow>, MalformedInputError> {
    let mut rows: Vec<TaxBreakupRow> = Vec::new();
    let mut index: HashMap<TaxRate, usize> = HashMap::new();

    for item in line_items {
        let amount = non_negative(item.amount, "amount")?;
        let tax_amount = non_negative(item.tax_amount.unwrap_or(0), "tax_amount")?;

        let rate = item.effective_rate();
        let slot = *index.entry(rate).or_insert_with(|| {
            rows.push(TaxBreakupRow::new(rate));
            rows.len() - 1
        });
        let row = &mut rows[slot];
        row.taxable_amount = checked_accumulate(row.taxable_amount, amount, "taxable_amount")?;
        row.total = checked_accumulate(row.total, tax_amount, "tax_amount")?;
    }

    for row in &mut rows {
        row.split(is_inter_state);
    }
    Ok(rows)
}
