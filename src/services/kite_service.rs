//! Kite Service
//!
//! Login URL generation, request-token exchange and the authenticated
//! reads the scheduler polls. Every public operation catches its own
//! failures and returns a result value; nothing here returns `Err`.

use super::types::{ApiResponse, ApiResult};
use crate::brokers::types::{Order, PositionBook};
use crate::brokers::{AuthorizedClient, TradingApi};
use crate::error::{AppError, Result};
use crate::logging::{LogLevel, RemoteLogger};
use crate::storage::{AppCredentials, SessionRecord, SessionStore};
use chrono::Utc;
use chrono_tz::Asia::Kolkata;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Kite service for business logic
pub struct KiteService {
    api: Arc<dyn TradingApi>,
    sessions: Arc<SessionStore>,
    credentials_path: PathBuf,
    logger: RemoteLogger,
    client: RwLock<Option<AuthorizedClient>>,
}

impl KiteService {
    pub fn new(
        api: Arc<dyn TradingApi>,
        sessions: Arc<SessionStore>,
        credentials_path: PathBuf,
        logger: RemoteLogger,
    ) -> Self {
        Self {
            api,
            sessions,
            credentials_path,
            logger,
            client: RwLock::new(None),
        }
    }

    /// Whether a session file has been written
    pub fn has_session(&self) -> bool {
        self.sessions.exists()
    }

    /// Build the URL the user follows to log in
    pub async fn generate_login_url(&self) -> ApiResponse {
        self.logger
            .info(&format!("Generating {} login URL", self.api.name()))
            .await;

        match self.try_login_url() {
            Ok(url) => {
                self.logger.info("Login URL generated successfully").await;
                ApiResponse::login_url(url)
            }
            Err(e) => {
                self.log_failure("Error generating login URL", &e).await;
                ApiResponse::error(&e.to_string())
                    .with_details("An error occurred during URL generation")
            }
        }
    }

    fn try_login_url(&self) -> Result<String> {
        let credentials = AppCredentials::load(&self.credentials_path)?;
        self.api.login_url(&credentials.api_key)
    }

    /// Exchange a request token for a session and persist it.
    ///
    /// The session file is only written after the handshake fully
    /// succeeds. Token values never appear in the response.
    pub async fn exchange_token(&self, request_token: &str) -> ApiResponse {
        self.logger.info("Generating access token").await;

        match self.try_exchange(request_token).await {
            Ok(()) => {
                self.logger
                    .info("Access token generated and saved successfully")
                    .await;
                ApiResponse::success_with_message("Session generated.")
            }
            Err(e) => {
                self.log_failure("Error generating access token", &e).await;
                ApiResponse::error(&e.to_string())
                    .with_details("An error occurred during token generation")
            }
        }
    }

    async fn try_exchange(&self, request_token: &str) -> Result<()> {
        let credentials = AppCredentials::load(&self.credentials_path)?;

        let tokens = self
            .api
            .generate_session(&credentials.api_key, request_token, &credentials.api_secret)
            .await?;

        if tokens.access_token.trim().is_empty() {
            return Err(AppError::Upstream(
                "Kite returned an empty access token".to_string(),
            ));
        }

        self.logger.info("Session generated successfully").await;

        let record = SessionRecord {
            api_key: credentials.api_key,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            enctoken: tokens.enctoken,
            public_token: tokens.public_token,
            request_token: request_token.to_string(),
            generated_at: Utc::now().with_timezone(&Kolkata).naive_local(),
        };

        self.sessions.save(&record)?;

        *self.client.write() = Some(AuthorizedClient::new(record.api_key, record.access_token));
        Ok(())
    }

    /// Return the authenticated client, loading it from the session file
    /// once if nothing is cached.
    pub async fn ensure_client(&self) -> Option<AuthorizedClient> {
        if let Some(client) = self.client.read().clone() {
            return Some(client);
        }

        self.logger.info("Loading credentials from session").await;

        let record = match self.sessions.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.logger.warn("Session file does not exist").await;
                return None;
            }
            Err(e) => {
                self.logger
                    .error(&format!("Error loading session: {}", e))
                    .await;
                return None;
            }
        };

        if !record.is_usable() {
            self.logger
                .error("Missing API key or access token in session data")
                .await;
            return None;
        }

        let client = AuthorizedClient::new(record.api_key, record.access_token);
        *self.client.write() = Some(client.clone());
        Some(client)
    }

    /// Forget the cached client so the next call reloads the session file
    pub fn invalidate(&self) {
        *self.client.write() = None;
    }

    /// Get all orders for the day
    pub async fn get_orders(&self) -> ApiResult<Vec<Order>> {
        let Some(client) = self.ensure_client().await else {
            return ApiResult::NoSession;
        };

        self.logger.info("Fetching orders").await;

        match self.api.orders(&client).await {
            Ok(orders) => {
                let count = orders.len();
                ApiResult::Success {
                    payload: orders,
                    count,
                }
            }
            Err(e) => self.upstream_failure("fetching orders", e).await,
        }
    }

    /// Get current positions
    pub async fn get_positions(&self) -> ApiResult<PositionBook> {
        let Some(client) = self.ensure_client().await else {
            return ApiResult::NoSession;
        };

        self.logger.info("Fetching positions").await;

        match self.api.positions(&client).await {
            Ok(book) => {
                let count = book.len();
                ApiResult::Success {
                    payload: book,
                    count,
                }
            }
            Err(e) => self.upstream_failure("fetching positions", e).await,
        }
    }

    async fn upstream_failure<T>(&self, action: &str, error: AppError) -> ApiResult<T> {
        if error.is_auth_failure() {
            self.invalidate();
        }

        self.log_failure(&format!("Error {}", action), &error).await;

        ApiResult::Error {
            message: error.to_string(),
        }
    }

    /// Log a failure with its error code and the broker it came from
    async fn log_failure(&self, context: &str, error: &AppError) {
        let mut attributes = Map::new();
        attributes.insert("error.code".to_string(), Value::from(error.code()));
        attributes.insert("broker".to_string(), Value::from(self.api.name()));

        self.logger
            .log(LogLevel::Error, &format!("{}: {}", context, error), Some(attributes))
            .await;
    }
}
