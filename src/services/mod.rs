//! Services Layer
//!
//! Business logic shared by the HTTP handlers and the scheduled jobs.
//!
//! ```text
//! HTTP handlers ──┐
//!                 ├──> KiteService --> TradingApi / SessionStore
//! Scheduled jobs ─┘
//! ```

pub mod kite_service;
pub mod types;

pub use kite_service::KiteService;
pub use types::{ApiResponse, ApiResult};
