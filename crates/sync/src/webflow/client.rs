//! Webflow HTTP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use ticket_ledger_core::{CollectionId, ItemId, ProductId, SiteId, VariantId};
use tracing::instrument;
use urlencoding::encode;

use super::{
    CollectionItem, CommerceApi, Inventory, OrdersPage, OrdersQuery, ProductResponse, WebflowError,
};
use crate::config::WebflowConfig;
use crate::throttle::parse_retry_after;

/// Webflow Data API client.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct WebflowClient {
    inner: Arc<WebflowClientInner>,
}

struct WebflowClientInner {
    client: reqwest::Client,
    api_base: String,
    site_id: SiteId,
}

impl WebflowClient {
    /// Create a new Webflow API client.
    ///
    /// # Errors
    ///
    /// Returns error if the token is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &WebflowConfig) -> Result<Self, WebflowError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_token.expose_secret());
        let mut auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| WebflowError::Parse(format!("Invalid API token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth_value);

        headers.insert(
            "accept-version",
            HeaderValue::from_str(&config.api_version)
                .map_err(|e| WebflowError::Parse(format!("Invalid API version: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(WebflowClientInner {
                client,
                api_base: config.api_base.clone(),
                site_id: config.site_id.clone(),
            }),
        })
    }

    /// The site whose orders and products are read.
    #[must_use]
    pub fn site_id(&self) -> &SiteId {
        &self.inner.site_id
    }

    /// Execute a GET request against the Webflow API.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, WebflowError> {
        let url = format!("{}{path}", self.inner.api_base);
        let response = self.inner.client.get(&url).query(query).send().await?;
        Self::handle_response(response).await
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, WebflowError> {
        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| WebflowError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    /// Parse error response from the Webflow API.
    async fn parse_error(response: reqwest::Response) -> WebflowError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = parse_retry_after(response.headers().get("Retry-After"));
            return WebflowError::RateLimited { retry_after };
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        match status {
            401 | 403 => WebflowError::Unauthorized(message),
            404 => WebflowError::NotFound(message),
            _ => WebflowError::Api { status, message },
        }
    }
}

#[async_trait]
impl CommerceApi for WebflowClient {
    #[instrument(skip(self), fields(site_id = %self.inner.site_id))]
    async fn list_orders(&self, query: &OrdersQuery) -> Result<OrdersPage, WebflowError> {
        let path = format!("/sites/{}/orders", encode(self.inner.site_id.as_str()));

        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(status) = query.status {
            params.push(("status", status.to_string()));
        }

        self.get(&path, &params).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductResponse, WebflowError> {
        let path = format!(
            "/sites/{}/products/{}",
            encode(self.inner.site_id.as_str()),
            encode(product_id.as_str())
        );
        self.get(&path, &[]).await
    }

    #[instrument(skip(self), fields(collection_id = %collection_id, item_id = %item_id))]
    async fn get_collection_item(
        &self,
        collection_id: &CollectionId,
        item_id: &ItemId,
    ) -> Result<CollectionItem, WebflowError> {
        let path = format!(
            "/collections/{}/items/{}",
            encode(collection_id.as_str()),
            encode(item_id.as_str())
        );
        self.get(&path, &[]).await
    }

    #[instrument(skip(self), fields(collection_id = %collection_id, variant_id = %variant_id))]
    async fn get_inventory(
        &self,
        collection_id: &CollectionId,
        variant_id: &VariantId,
    ) -> Result<Inventory, WebflowError> {
        let path = format!(
            "/collections/{}/items/{}/inventory",
            encode(collection_id.as_str()),
            encode(variant_id.as_str())
        );
        self.get(&path, &[]).await
    }
}

impl std::fmt::Debug for WebflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebflowClient")
            .field("api_base", &self.inner.api_base)
            .field("site_id", &self.inner.site_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderMap as ResponseHeaders, StatusCode, header};
    use secrecy::SecretString;

    use super::*;
    use crate::config::{
        CmsCollections, DEFAULT_WEBFLOW_API_BASE, DEFAULT_WEBFLOW_API_VERSION,
    };

    /// Serve a fixed status on every path of a loopback listener.
    async fn serve_status(status: StatusCode, retry_after: Option<&'static str>) -> String {
        let app = axum::Router::new().fallback(move || async move {
            let mut headers = ResponseHeaders::new();
            if let Some(secs) = retry_after {
                headers.insert(header::RETRY_AFTER, HeaderValue::from_static(secs));
            }
            (status, headers, "upstream refused")
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client_for(api_base: String) -> WebflowClient {
        WebflowClient::new(&WebflowConfig {
            api_base,
            ..config()
        })
        .unwrap()
    }

    fn config() -> WebflowConfig {
        WebflowConfig {
            api_base: DEFAULT_WEBFLOW_API_BASE.to_string(),
            api_version: DEFAULT_WEBFLOW_API_VERSION.to_string(),
            site_id: SiteId::new("site-123"),
            api_token: SecretString::from("wf_super_secret_token"),
            collections: CmsCollections::default(),
        }
    }

    #[test]
    fn test_client_debug_hides_token() {
        let client = WebflowClient::new(&config()).unwrap();
        let debug = format!("{client:?}");

        assert!(debug.contains("site-123"));
        assert!(!debug.contains("wf_super_secret_token"));
    }

    #[test]
    fn test_client_rejects_unprintable_token() {
        let mut config = config();
        config.api_token = SecretString::from("bad\ntoken");

        let err = WebflowClient::new(&config).unwrap_err();
        assert!(matches!(err, WebflowError::Parse(_)));
    }

    #[tokio::test]
    async fn test_429_maps_to_rate_limited_with_retry_after() {
        let client = client_for(serve_status(StatusCode::TOO_MANY_REQUESTS, Some("5")).await);

        let err = client
            .list_orders(&OrdersQuery::fulfilled(0, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, WebflowError::RateLimited { retry_after: Some(5) }));
    }

    #[tokio::test]
    async fn test_429_without_header_has_no_retry_after() {
        let client = client_for(serve_status(StatusCode::TOO_MANY_REQUESTS, None).await);

        let err = client
            .get_product(&ProductId::new("p1"))
            .await
            .unwrap_err();

        assert!(matches!(err, WebflowError::RateLimited { retry_after: None }));
    }

    #[tokio::test]
    async fn test_error_statuses_map_to_variants() {
        let unauthorized = client_for(serve_status(StatusCode::UNAUTHORIZED, None).await);
        let err = unauthorized
            .get_product(&ProductId::new("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebflowError::Unauthorized(_)));

        let missing = client_for(serve_status(StatusCode::NOT_FOUND, None).await);
        let err = missing
            .get_collection_item(&CollectionId::new("venues"), &ItemId::new("i1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebflowError::NotFound(_)));

        let broken = client_for(serve_status(StatusCode::BAD_GATEWAY, None).await);
        let err = broken
            .get_inventory(&CollectionId::new("skus"), &VariantId::new("v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebflowError::Api { status: 502, .. }));
    }
}
