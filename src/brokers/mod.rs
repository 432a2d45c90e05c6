//! Broker adapters module

pub mod kite_time;
pub mod types;
pub mod zerodha;

use crate::error::Result;
use async_trait::async_trait;
use types::*;

/// Trading API surface the service depends on
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Broker display name, used in log messages
    fn name(&self) -> &'static str;

    /// URL the user visits to log in and obtain a request token
    fn login_url(&self, api_key: &str) -> Result<String>;

    /// Exchange a request token for session tokens
    async fn generate_session(
        &self,
        api_key: &str,
        request_token: &str,
        api_secret: &str,
    ) -> Result<SessionTokens>;

    /// Get order book
    async fn orders(&self, auth: &AuthorizedClient) -> Result<Vec<Order>>;

    /// Get net and day positions
    async fn positions(&self, auth: &AuthorizedClient) -> Result<PositionBook>;
}

/// Credentials attached to every authenticated call
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizedClient {
    pub api_key: String,
    pub access_token: String,
}

impl AuthorizedClient {
    pub fn new(api_key: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            access_token: access_token.into(),
        }
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("token {}:{}", self.api_key, self.access_token)
    }
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("api_key", &self.api_key)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
