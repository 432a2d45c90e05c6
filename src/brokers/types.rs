//! Kite Connect wire types
//!
//! Only the fields we act on are typed. Kite adds fields over time and
//! some of them nest further records (`meta`, `tags`, iceberg legs), so
//! everything else is kept verbatim in `extra`.

use crate::brokers::kite_time;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard Kite response envelope
#[derive(Debug, Deserialize)]
pub struct KiteEnvelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// Tokens returned by `POST /session/token`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub enctoken: String,
    #[serde(default)]
    pub public_token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

/// Order from the order book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub exchange_order_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub tradingsymbol: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub transaction_type: String, // BUY or SELL
    #[serde(default)]
    pub order_type: String, // MARKET, LIMIT, SL, SL-M
    #[serde(default)]
    pub product: String, // CNC, MIS, NRML
    #[serde(default)]
    pub variety: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub filled_quantity: i64,
    #[serde(default)]
    pub pending_quantity: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub trigger_price: f64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default, with = "kite_time::datetime_opt")]
    pub order_timestamp: Option<NaiveDateTime>,
    #[serde(default, with = "kite_time::datetime_opt")]
    pub exchange_timestamp: Option<NaiveDateTime>,
    #[serde(default, with = "kite_time::datetime_opt")]
    pub exchange_update_timestamp: Option<NaiveDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub tradingsymbol: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub overnight_quantity: i64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default)]
    pub m2m: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Net and day-wise positions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionBook {
    #[serde(default)]
    pub net: Vec<Position>,
    #[serde(default)]
    pub day: Vec<Position>,
}

impl PositionBook {
    pub fn net_count(&self) -> usize {
        self.net.len()
    }

    pub fn day_count(&self) -> usize {
        self.day.len()
    }

    /// Total records across both books
    pub fn len(&self) -> usize {
        self.net.len() + self.day.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
