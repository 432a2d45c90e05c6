//! Test doubles shared by the unit tests

use crate::brokers::types::{Order, Position, PositionBook, SessionTokens};
use crate::brokers::{AuthorizedClient, TradingApi};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serve `app` on an ephemeral local port
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Write a valid `login_credentials.json` into `dir`
pub fn write_credentials(dir: &Path) -> PathBuf {
    let path = dir.join("login_credentials.json");
    std::fs::write(
        &path,
        r#"{"api_key": "test_api_key", "api_secret": "test_api_secret"}"#,
    )
    .unwrap();
    path
}

pub fn sample_order(order_id: &str) -> Order {
    serde_json::from_value(serde_json::json!({
        "order_id": order_id,
        "status": "OPEN",
        "tradingsymbol": "INFY",
        "exchange": "NSE",
        "transaction_type": "BUY",
        "quantity": 1,
        "order_timestamp": "2024-03-05 09:15:00"
    }))
    .unwrap()
}

fn sample_position(symbol: &str) -> Position {
    serde_json::from_value(serde_json::json!({"tradingsymbol": symbol, "quantity": 1})).unwrap()
}

#[derive(Debug, Clone)]
pub enum FakeFailure {
    Upstream(String),
    TokenExpired,
}

impl FakeFailure {
    fn to_error(&self) -> AppError {
        match self {
            FakeFailure::Upstream(message) => AppError::Upstream(message.clone()),
            FakeFailure::TokenExpired => {
                AppError::Auth("Incorrect `api_key` or `access_token`.".to_string())
            }
        }
    }
}

/// Scripted `TradingApi`
#[derive(Default)]
pub struct FakeKite {
    session_failure: Mutex<Option<String>>,
    read_failure: Mutex<Option<FakeFailure>>,
    orders: Mutex<Vec<Order>>,
    positions: Mutex<PositionBook>,
    last_client: Mutex<Option<AuthorizedClient>>,
    session_calls: AtomicUsize,
    orders_calls: AtomicUsize,
}

impl FakeKite {
    pub fn fail_session_with(&self, message: &str) {
        *self.session_failure.lock() = Some(message.to_string());
    }

    pub fn fail_reads_with(&self, failure: FakeFailure) {
        *self.read_failure.lock() = Some(failure);
    }

    pub fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.lock() = orders;
    }

    pub fn set_positions(&self, net: usize, day: usize) {
        *self.positions.lock() = PositionBook {
            net: (0..net).map(|i| sample_position(&format!("NET{}", i))).collect(),
            day: (0..day).map(|i| sample_position(&format!("DAY{}", i))).collect(),
        };
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn orders_calls(&self) -> usize {
        self.orders_calls.load(Ordering::SeqCst)
    }

    pub fn last_client(&self) -> Option<AuthorizedClient> {
        self.last_client.lock().clone()
    }

    fn read_guard(&self, auth: &AuthorizedClient) -> Result<()> {
        *self.last_client.lock() = Some(auth.clone());
        match self.read_failure.lock().as_ref() {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TradingApi for FakeKite {
    fn name(&self) -> &'static str {
        "Fake Kite"
    }

    fn login_url(&self, api_key: &str) -> Result<String> {
        Ok(format!("https://kite.example/connect/login?api_key={}&v=3", api_key))
    }

    async fn generate_session(
        &self,
        _api_key: &str,
        _request_token: &str,
        _api_secret: &str,
    ) -> Result<SessionTokens> {
        let call = self.session_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(message) = self.session_failure.lock().clone() {
            return Err(AppError::Upstream(message));
        }

        Ok(SessionTokens {
            access_token: format!("access-{}", call),
            refresh_token: format!("refresh-{}", call),
            enctoken: format!("enc-{}", call),
            public_token: format!("public-{}", call),
            user_id: "AB1234".to_string(),
            user_name: None,
        })
    }

    async fn orders(&self, auth: &AuthorizedClient) -> Result<Vec<Order>> {
        self.orders_calls.fetch_add(1, Ordering::SeqCst);
        self.read_guard(auth)?;
        Ok(self.orders.lock().clone())
    }

    async fn positions(&self, auth: &AuthorizedClient) -> Result<PositionBook> {
        self.read_guard(auth)?;
        Ok(self.positions.lock().clone())
    }
}
