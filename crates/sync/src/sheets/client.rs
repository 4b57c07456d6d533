//! Google Sheets HTTP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ticket_ledger_core::SpreadsheetRow;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use urlencoding::encode;

use super::auth::{ServiceAccountToken, fetch_access_token};
use super::range::{row_range, table_range, variant_column_range};
use super::{ColumnValues, SheetStore, SheetsError, start_row_of};
use crate::config::SheetsConfig;
use crate::throttle::parse_retry_after;

const USER_ENTERED: [(&str, &str); 1] = [("valueInputOption", "USER_ENTERED")];

/// Google Sheets API client bound to one spreadsheet and sheet.
///
/// # Authentication
///
/// Access tokens are obtained from the service-account credential on first
/// use, cached in memory and re-issued when they are about to expire.
#[derive(Clone)]
pub struct SheetsClient {
    inner: Arc<SheetsClientInner>,
}

struct SheetsClientInner {
    client: reqwest::Client,
    config: SheetsConfig,
    /// In-memory token cache
    token: RwLock<Option<ServiceAccountToken>>,
}

/// `ValueRange` resource.
#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Request body for update and append.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: [Vec<Value>; 1],
}

impl<'a> ValueRangeBody<'a> {
    fn single_row(range: &'a str, row: &SpreadsheetRow) -> Self {
        Self {
            range,
            major_dimension: "ROWS",
            values: [row.to_cells()],
        }
    }
}

fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl SheetsClient {
    /// Create a new Sheets API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &SheetsConfig) -> Result<Self, SheetsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(SheetsClientInner {
                client,
                config: config.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Current access token, fetching a new one when missing or expiring.
    async fn access_token(&self) -> Result<SecretString, SheetsError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        let mut cached = self.inner.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref()
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting new service account access token");
        let token = fetch_access_token(&self.inner.client, &self.inner.config).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Clear the cached token.
    async fn clear_token(&self) {
        *self.inner.token.write().await = None;
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.inner.config.api_base,
            encode(&self.inner.config.spreadsheet_id),
            encode(range)
        )
    }

    async fn get_values(&self, range: &str) -> Result<ValueRange, SheetsError> {
        let token = self.access_token().await?;
        let response = self
            .inner
            .client
            .get(self.values_url(range))
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| SheetsError::Parse(format!("Failed to parse value range: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    async fn send_values(&self, request: reqwest::RequestBuilder) -> Result<(), SheetsError> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token.expose_secret())
            .query(&USER_ENTERED)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the Sheets API.
    async fn parse_error(&self, response: reqwest::Response) -> SheetsError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = parse_retry_after(response.headers().get("Retry-After"));
            return SheetsError::RateLimited { retry_after };
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            401 => {
                self.clear_token().await;
                SheetsError::Unauthorized(message)
            }
            403 => SheetsError::Unauthorized(message),
            404 => SheetsError::NotFound(message),
            _ => SheetsError::Api { status, message },
        }
    }
}

#[async_trait]
impl SheetStore for SheetsClient {
    #[instrument(skip(self), fields(sheet = %self.inner.config.sheet_name))]
    async fn variant_column(&self) -> Result<ColumnValues, SheetsError> {
        let range = variant_column_range(&self.inner.config.sheet_name);
        let body = self.get_values(&range).await?;

        let start_row = body.range.as_deref().and_then(start_row_of).unwrap_or(1);
        let values = body
            .values
            .iter()
            .map(|row| row.first().map(cell_to_string).unwrap_or_default())
            .collect();

        Ok(ColumnValues::new(start_row, values))
    }

    #[instrument(skip(self), fields(sheet = %self.inner.config.sheet_name))]
    async fn read_row(&self, row: u32) -> Result<Vec<String>, SheetsError> {
        let range = row_range(&self.inner.config.sheet_name, row);
        let body = self.get_values(&range).await?;

        Ok(body
            .values
            .into_iter()
            .next()
            .map(|cells| cells.iter().map(cell_to_string).collect())
            .unwrap_or_default())
    }

    #[instrument(skip(self, values), fields(sheet = %self.inner.config.sheet_name, variant_id = %values.variant_id))]
    async fn write_row(&self, row: u32, values: &SpreadsheetRow) -> Result<(), SheetsError> {
        let range = row_range(&self.inner.config.sheet_name, row);
        let request = self
            .inner
            .client
            .put(self.values_url(&range))
            .json(&ValueRangeBody::single_row(&range, values));
        self.send_values(request).await
    }

    #[instrument(skip(self, values), fields(sheet = %self.inner.config.sheet_name, variant_id = %values.variant_id))]
    async fn append_row(&self, values: &SpreadsheetRow) -> Result<(), SheetsError> {
        let range = table_range(&self.inner.config.sheet_name);
        let url = format!("{}:append", self.values_url(&range));
        let request = self
            .inner
            .client
            .post(url)
            .json(&ValueRangeBody::single_row(&range, values));
        self.send_values(request).await
    }
}

impl std::fmt::Debug for SheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsClient")
            .field("spreadsheet_id", &self.inner.config.spreadsheet_id)
            .field("sheet_name", &self.inner.config.sheet_name)
            .finish_non_exhaustive()
    }
}
