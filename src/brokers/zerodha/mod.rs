//! Zerodha Kite Connect adapter

use crate::brokers::types::*;
use crate::brokers::{AuthorizedClient, TradingApi};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::time::Duration;

const BASE_URL: &str = "https://api.kite.trade";
const LOGIN_URL: &str = "https://kite.zerodha.com/connect/login";
const KITE_VERSION: &str = "3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Zerodha Kite Connect implementation
pub struct KiteConnect {
    client: Client,
    api_base: String,
    login_base: String,
}

impl KiteConnect {
    pub fn new() -> Result<Self> {
        Self::with_endpoints(BASE_URL, LOGIN_URL)
    }

    /// Point the adapter at a different API host (sandbox or test server)
    pub fn with_endpoints(api_base: &str, login_base: &str) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            login_base: login_base.to_string(),
        })
    }

    fn get_headers(&self, auth: Option<&AuthorizedClient>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("X-Kite-Version", HeaderValue::from_static(KITE_VERSION));

        if let Some(auth) = auth {
            let value = HeaderValue::from_str(&auth.authorization())
                .map_err(|e| AppError::Validation(format!("Invalid session token: {}", e)))?;
            headers.insert("Authorization", value);
        }

        Ok(headers)
    }

    /// Generate checksum for Zerodha auth
    fn generate_checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        hasher.update(request_token.as_bytes());
        hasher.update(api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, auth: &AuthorizedClient) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .headers(self.get_headers(Some(auth))?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Unwrap the Kite envelope, mapping token rejections to `AppError::Auth`
    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        let http_status = response.status();
        let body = response.text().await?;

        let envelope: KiteEnvelope = serde_json::from_str(&body).map_err(|_| {
            AppError::Upstream(format!(
                "Unexpected response from Kite (HTTP {})",
                http_status.as_u16()
            ))
        })?;

        if envelope.status != "success" || !http_status.is_success() {
            let message = envelope
                .message
                .unwrap_or_else(|| format!("Kite request failed (HTTP {})", http_status.as_u16()));

            let token_rejected = envelope.error_type.as_deref() == Some("TokenException")
                || http_status == StatusCode::FORBIDDEN;

            return Err(if token_rejected {
                AppError::Auth(message)
            } else {
                AppError::Upstream(message)
            });
        }

        let data = envelope
            .data
            .ok_or_else(|| AppError::Upstream("No data in Kite response".to_string()))?;

        serde_json::from_value(data)
            .map_err(|e| AppError::Upstream(format!("Unexpected Kite payload: {}", e)))
    }
}

#[async_trait]
impl TradingApi for KiteConnect {
    fn name(&self) -> &'static str {
        "Zerodha"
    }

    fn login_url(&self, api_key: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &self.login_base,
            &[("api_key", api_key), ("v", KITE_VERSION)],
        )
        .map_err(|e| AppError::Config(format!("Invalid login URL: {}", e)))?;

        Ok(url.into())
    }

    async fn generate_session(
        &self,
        api_key: &str,
        request_token: &str,
        api_secret: &str,
    ) -> Result<SessionTokens> {
        let checksum = Self::generate_checksum(api_key, request_token, api_secret);

        let params = [
            ("api_key", api_key),
            ("request_token", request_token),
            ("checksum", checksum.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/session/token", self.api_base))
            .headers(self.get_headers(None)?)
            .form(&params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn orders(&self, auth: &AuthorizedClient) -> Result<Vec<Order>> {
        self.get("/orders", auth).await
    }

    async fn positions(&self, auth: &AuthorizedClient) -> Result<PositionBook> {
        self.get("/portfolio/positions", auth).await
    }
}
