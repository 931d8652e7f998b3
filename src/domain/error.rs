use thiserror::Error;

use super::Cents;

/// Input that cannot be aggregated into a trustworthy figure.
///
/// Every computation in the domain either succeeds over the whole input or
/// fails with one of these; there is no partial result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInputError {
    /// A raw field that should hold a number could not be read as one.
    #[error("{field}: '{value}' is not a number")]
    NotNumeric { field: &'static str, value: String },

    /// A monetary field holds a negative value.
    #[error("{field} is negative ({value})")]
    Negative { field: &'static str, value: Cents },

    /// A running total left the representable range.
    #[error("{field} total overflowed")]
    Overflow { field: &'static str },
}

/// Add `amount` to `total`, reporting overflow against `field`.
pub(crate) fn checked_accumulate(
    total: Cents,
    amount: Cents,
    field: &'static str,
) -> Result<Cents, MalformedInputError> {
    total
        .checked_add(amount)
        .ok_or(MalformedInputError::Overflow { field })
}

/// Reject negative monetary values.
pub(crate) fn non_negative(
    value: Cents,
    field: &'static str,
) -> Result<Cents, MalformedInputError> {
    if value < 0 {
        Err(MalformedInputError::Negative { field, value })
    } else {
        Ok(value)
    }
}
