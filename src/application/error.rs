use thiserror::Error;

use crate::domain::{Cents, MalformedInputError, TransactionStatus};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Transaction already exists: {0}")]
    TransactionAlreadyExists(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transaction {number} is {status}, payments need an open transaction")]
    TransactionNotOpen {
        number: String,
        status: TransactionStatus,
    },

    #[error("Payment of {payment} exceeds balance due of {balance_due} on {number}")]
    Overpayment {
        number: String,
        balance_due: Cents,
        payment: Cents,
    },

    #[error("Balance due on {0} is not recorded")]
    UnknownBalance(String),

    #[error("Balance due on {0} kept changing, payment not recorded")]
    ConcurrentUpdate(String),

    #[error("Could not compute: {0}")]
    MalformedInput(#[from] MalformedInputError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
