//! Google Sheets API v4 client.
//!
//! The tracking sheet is read and written one range at a time through the
//! `values` endpoints:
//!
//! - `GET {spreadsheet}/values/{range}`
//! - `PUT {spreadsheet}/values/{range}?valueInputOption=USER_ENTERED`
//! - `POST {spreadsheet}/values/{range}:append?valueInputOption=USER_ENTERED`
//!
//! Authentication uses a service account (see [`auth`]).

pub mod auth;
mod client;
mod range;

pub use client::SheetsClient;
pub use range::{ColumnValues, start_row_of};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use ticket_ledger_core::SpreadsheetRow;

use crate::throttle::RateLimitAware;

/// Errors that can occur when interacting with the Google Sheets API.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Google.
    #[error("Rate limited, retry after {} seconds", retry_after.map_or_else(|| "default".to_string(), |s| s.to_string()))]
    RateLimited { retry_after: Option<u64> },

    /// Still rate limited after every allowed retry.
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Spreadsheet or range not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Token rejected or lacking access to the spreadsheet.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Service-account token could not be obtained.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl RateLimitAware for SheetsError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => retry_after.map(Duration::from_secs),
            _ => None,
        }
    }

    fn rate_limit_exceeded(attempts: u32) -> Self {
        Self::RateLimitExceeded { attempts }
    }
}

/// Row-level access to the tracking sheet.
///
/// Row numbers are 1-based sheet rows.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// The variant id column (B), with the sheet row its first value sits on.
    async fn variant_column(&self) -> Result<ColumnValues, SheetsError>;

    /// Cells A..H of `row` as strings; shorter when trailing cells are empty.
    async fn read_row(&self, row: u32) -> Result<Vec<String>, SheetsError>;

    /// Overwrite cells A..H of `row`.
    async fn write_row(&self, row: u32, values: &SpreadsheetRow) -> Result<(), SheetsError>;

    /// Append `values` after the last row of the table.
    async fn append_row(&self, values: &SpreadsheetRow) -> Result<(), SheetsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_error() {
        let err = SheetsError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_other_errors_are_not_rate_limited() {
        let err = SheetsError::Auth("bad key".to_string());
        assert!(!err.is_rate_limited());
        assert_eq!(err.retry_after(), None);
        assert_eq!(err.to_string(), "Authentication failed: bad key");
    }
}
