use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{parse_cents, Cents, ParseCentsError, TransactionId};

pub type LineItemId = Uuid;

/// A tax percentage in hundredths of a percent: 18% = 1800, 2.5% = 250.
///
/// Rates are tags for grouping; nothing checks them against a rate schedule.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaxRate(pub i64);

impl TaxRate {
    pub const ZERO: TaxRate = TaxRate(0);

    /// Whole-percent constructor: `TaxRate::percent(18)`.
    pub const fn percent(value: i64) -> Self {
        TaxRate(value * 100)
    }

    pub fn parse(input: &str) -> Result<Self, ParseCentsError> {
        parse_cents(input.trim().trim_end_matches('%')).map(TaxRate)
    }
}

impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (whole, fraction) = (abs / 100, abs % 100);
        if fraction == 0 {
            write!(f, "{}{}", sign, whole)
        } else if fraction % 10 == 0 {
            write!(f, "{}{}.{}", sign, whole, fraction / 10)
        } else {
            write!(f, "{}{}.{:02}", sign, whole, fraction)
        }
    }
}

/// One line of a transaction. Tax is computed upstream; we only aggregate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub transaction_id: TransactionId,
    pub description: Option<String>,
    /// Product classification code, opaque here
    pub hsn_code: Option<String>,
    /// Taxable (pre-tax) value
    pub amount: Cents,
    pub tax_rate: Option<TaxRate>,
    pub tax_amount: Option<Cents>,
}

impl LineItem {
    pub fn new(transaction_id: TransactionId, amount: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            description: None,
            hsn_code: None,
            amount,
            tax_rate: None,
            tax_amount: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_hsn_code(mut self, hsn_code: impl Into<String>) -> Self {
        self.hsn_code = Some(hsn_code.into());
        self
    }

    pub fn with_tax(mut self, rate: TaxRate, tax_amount: Cents) -> Self {
        self.tax_rate = Some(rate);
        self.tax_amount = Some(tax_amount);
        self
    }

    /// Rate used for grouping; a missing rate groups with 0%.
    pub fn effective_rate(&self) -> TaxRate {
        self.tax_rate.unwrap_or(TaxRate::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_display() {
        assert_eq!(TaxRate::percent(18).to_string(), "18");
        assert_eq!(TaxRate(250).to_string(), "2.5");
        assert_eq!(TaxRate(25).to_string(), "0.25");
        assert_eq!(TaxRate::ZERO.to_string(), "0");
    }

    #[test]
    fn test_tax_rate_parse() {
        assert_eq!(TaxRate::parse("18"), Ok(TaxRate(1800)));
        assert_eq!(TaxRate::parse("2.5%"), Ok(TaxRate(250)));
        assert!(TaxRate::parse("GST").is_err());
    }

    #[test]
    fn test_missing_rate_groups_as_zero() {
        let item = LineItem::new(Uuid::new_v4(), 1000);
        assert_eq!(item.effective_rate(), TaxRate::ZERO);
    }
}
