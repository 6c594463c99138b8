// src/core/errors.rs

use thiserror::Error;

/// Validation failures for a single claim. Every variant is terminal for the
/// claim being processed; batch callers catch per item and continue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("Could not find benefit with name `{0}`.")]
    BenefitNotFound(String),

    #[error("No category '{category}' found for benefit '{benefit}'.")]
    CategoryNotFound { benefit: String, category: String },

    #[error("Purchase date '{0}' must be in YYYY-MM-DD format.")]
    InvalidDateFormat(String),

    #[error("Amount '{0}' must be in the format 0.00.")]
    InvalidAmountFormat(String),

    #[error("Receipt path '{0}' does not exist.")]
    ReceiptNotFound(String),
}

/// Failures from the Forma API layer. Never retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Something went wrong while {context} - expected `{expected}` response, got `{status}`.")]
    UnexpectedStatus {
        context: &'static str,
        expected: String,
        status: String,
    },

    #[error("Failed to read receipt file '{path}': {source}")]
    ReceiptRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Your access token seems to be invalid or expired. Please run `clawback login` again.")]
    InvalidAuthToken,

    #[error("Something went wrong while {context} - the response body indicated that the request was not successful: {body}.")]
    Unsuccessful { context: &'static str, body: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
