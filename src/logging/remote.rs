//! Remote log shipping
//!
//! Each call posts exactly one entry to the collector and waits for the
//! answer (5 second timeout). Nothing is buffered. Shipping failures are
//! reported on the local subscriber and never reach the caller.

use crate::config::SERVICE_NAME;
use crate::error::Result;
use chrono::Utc;
use chrono_tz::Asia::Kolkata;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SHIP_TIMEOUT: Duration = Duration::from_secs(5);

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Value written to the `log.level` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

struct Shipper {
    client: Client,
    endpoint: String,
    api_key: String,
}

struct Inner {
    shipper: Option<Shipper>,
    service_name: String,
    environment: String,
}

/// Handle to the log sink. Cloning is cheap; all clones share one client.
#[derive(Clone)]
pub struct RemoteLogger {
    inner: Arc<Inner>,
}

impl RemoteLogger {
    /// Create a logger that ships to `endpoint` when an API key is present
    pub fn new(endpoint: &str, api_key: Option<String>, environment: &str) -> Result<Self> {
        let shipper = match api_key {
            Some(api_key) => Some(Shipper {
                client: Client::builder().timeout(SHIP_TIMEOUT).build()?,
                endpoint: endpoint.to_string(),
                api_key,
            }),
            None => {
                warn!("New Relic API key not found. Logs will only be saved locally.");
                None
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                shipper,
                service_name: SERVICE_NAME.to_string(),
                environment: environment.to_string(),
            }),
        })
    }

    /// Logger that only writes to the local subscriber
    pub fn local(environment: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                shipper: None,
                service_name: SERVICE_NAME.to_string(),
                environment: environment.to_string(),
            }),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.inner.shipper.is_some()
    }

    /// Log a message with optional extra attributes.
    ///
    /// Returns `true` when the collector accepted the entry.
    pub async fn log(
        &self,
        level: LogLevel,
        message: &str,
        attributes: Option<Map<String, Value>>,
    ) -> bool {
        emit_local(level, message, attributes.as_ref());

        let Some(shipper) = &self.inner.shipper else {
            return false;
        };

        let payload = self.build_payload(self.build_entry(level, message, attributes.as_ref()));

        let response = shipper
            .client
            .post(&shipper.endpoint)
            .header("Api-Key", &shipper.api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status() == StatusCode::ACCEPTED => true,
            Ok(resp) => {
                warn!(
                    target: "remote_log",
                    "Failed to send log to New Relic. Status code: {}",
                    resp.status().as_u16()
                );
                false
            }
            Err(e) => {
                warn!(
                    target: "remote_log",
                    timeout = e.is_timeout(),
                    "Error sending log to New Relic: {}",
                    e
                );
                false
            }
        }
    }

    pub async fn info(&self, message: &str) -> bool {
        self.log(LogLevel::Info, message, None).await
    }

    pub async fn warn(&self, message: &str) -> bool {
        self.log(LogLevel::Warning, message, None).await
    }

    pub async fn debug(&self, message: &str) -> bool {
        self.log(LogLevel::Debug, message, None).await
    }

    pub async fn error(&self, message: &str) -> bool {
        self.log(LogLevel::Error, message, None).await
    }

    pub async fn critical(&self, message: &str) -> bool {
        self.log(LogLevel::Critical, message, None).await
    }

    /// Build one log entry. Attributes are merged over the standard fields.
    fn build_entry(
        &self,
        level: LogLevel,
        message: &str,
        attributes: Option<&Map<String, Value>>,
    ) -> Value {
        let mut entry = Map::new();
        entry.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().with_timezone(&Kolkata).to_rfc3339()),
        );
        entry.insert("message".to_string(), Value::String(message.to_string()));
        entry.insert("log.level".to_string(), Value::String(level.as_str().to_string()));
        entry.insert(
            "service.name".to_string(),
            Value::String(self.inner.service_name.clone()),
        );

        if let Some(attributes) = attributes {
            for (key, value) in attributes {
                entry.insert(key.clone(), value.clone());
            }
        }

        Value::Object(entry)
    }

    fn build_payload(&self, entry: Value) -> Value {
        json!([{
            "common": {
                "attributes": {
                    "service": self.inner.service_name,
                    "environment": self.inner.environment,
                }
            },
            "logs": [entry]
        }])
    }
}

fn emit_local(level: LogLevel, message: &str, attributes: Option<&Map<String, Value>>) {
    macro_rules! emit {
        ($mac:ident) => {
            match attributes {
                Some(attrs) => {
                    let attrs = Value::Object(attrs.clone());
                    $mac!(attributes = %attrs, "{}", message)
                }
                None => $mac!("{}", message),
            }
        };
    }

    match level {
        LogLevel::Debug => emit!(debug),
        LogLevel::Info => emit!(info),
        LogLevel::Warning => emit!(warn),
        LogLevel::Error | LogLevel::Critical => emit!(error),
    }
}
