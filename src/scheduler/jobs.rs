//! Built-in periodic jobs
//!
//! - `order_status_job` polls the order book on a fixed interval
//! - `hourly_health_check_job` reports session and position state once an
//!   hour and retires itself after a configured number of runs

use super::cadence::Cadence;
use super::runner::{JobContext, JobRunner};
use crate::brokers::kite_time;
use crate::brokers::types::Order;
use crate::config::Config;
use crate::error::Result;
use crate::logging::{LogLevel, RemoteLogger};
use crate::services::{ApiResult, KiteService};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Asia::Kolkata;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const ORDER_STATUS_JOB: &str = "order_status_job";
pub const HEALTH_CHECK_JOB: &str = "hourly_health_check_job";

/// Register the order poll and the hourly health check
pub fn register_default_jobs(
    runner: &JobRunner,
    service: Arc<KiteService>,
    logger: RemoteLogger,
    config: &Config,
) -> Result<()> {
    {
        let service = service.clone();
        let logger = logger.clone();
        runner.register(
            ORDER_STATUS_JOB,
            Cadence::every(config.order_poll_interval())?,
            None,
            move |_ctx| {
                let service = service.clone();
                let logger = logger.clone();
                async move {
                    check_order_status(&service, &logger).await;
                }
            },
        )?;
    }

    runner.register(
        HEALTH_CHECK_JOB,
        Cadence::hourly_at(config.health_check_minute)?,
        Some(config.health_check_limit),
        move |ctx| {
            let service = service.clone();
            let logger = logger.clone();
            async move {
                hourly_health_check(&service, &logger, ctx).await;
            }
        },
    )?;

    Ok(())
}

/// Fetch the order book and log what came back
pub async fn check_order_status(
    service: &KiteService,
    logger: &RemoteLogger,
) -> ApiResult<Vec<Order>> {
    let result = service.get_orders().await;

    match &result {
        ApiResult::Success { payload, count } => {
            let body = serde_json::to_string_pretty(payload)
                .unwrap_or_else(|e| format!("<unserializable orders: {}>", e));
            logger
                .info(&format!("Successfully retrieved {} orders - {}", count, body))
                .await;
        }
        ApiResult::NoSession => {
            logger.warn("No active session found").await;
        }
        ApiResult::Error { message } => {
            logger
                .warn(&format!("Failed to retrieve orders: {}", message))
                .await;
        }
    }

    result
}

/// Snapshot produced by each health check run
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub message: String,
    #[serde(with = "kite_time::datetime")]
    pub checked_at: NaiveDateTime,
    #[serde(with = "kite_time::date")]
    pub trading_day: NaiveDate,
    pub run: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    pub session_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_positions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_positions: Option<usize>,
}

pub async fn hourly_health_check(
    service: &KiteService,
    logger: &RemoteLogger,
    ctx: JobContext,
) -> HealthReport {
    let progress = match ctx.limit {
        Some(limit) => format!("{}/{}", ctx.count, limit),
        None => ctx.count.to_string(),
    };
    logger
        .info(&format!("Running hourly health check {}", progress))
        .await;

    let now = Utc::now().with_timezone(&Kolkata).naive_local();
    let mut report = HealthReport {
        status: "ok".to_string(),
        message: "Kite App is running".to_string(),
        checked_at: now,
        trading_day: now.date(),
        run: ctx.count,
        limit: ctx.limit,
        session_present: service.has_session(),
        net_positions: None,
        day_positions: None,
    };

    if report.session_present {
        match service.get_positions().await {
            ApiResult::Success { payload, .. } => {
                report.net_positions = Some(payload.net_count());
                report.day_positions = Some(payload.day_count());
            }
            ApiResult::NoSession => {
                report.status = "degraded".to_string();
                report.message = "Session file present but unusable".to_string();
            }
            ApiResult::Error { message } => {
                report.status = "degraded".to_string();
                report.message = format!("Position check failed: {}", message);
            }
        }
    }

    let attributes = match serde_json::to_value(&report) {
        Ok(Value::Object(map)) => Some(map),
        _ => None::<Map<String, Value>>,
    };
    let level = if report.status == "ok" {
        LogLevel::Info
    } else {
        LogLevel::Warning
    };
    logger
        .log(level, &format!("Health check: {}", report.message), attributes)
        .await;

    if ctx.is_final() {
        logger
            .info("Reached maximum executions for hourly health check job, removing from scheduler")
            .await;
    }

    report
}
