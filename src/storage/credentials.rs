//! Kite app credentials
//!
//! Provisioned out-of-band as `login_credentials.json` and never written
//! by the service.

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Clone, Deserialize)]
pub struct AppCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl AppCredentials {
    /// Read and validate the credentials file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read credentials file {:?}: {}", path, e))
        })?;

        let credentials: AppCredentials = serde_json::from_str(&data).map_err(|e| {
            AppError::Config(format!("Invalid credentials file {:?}: {}", path, e))
        })?;

        if credentials.api_key.trim().is_empty() {
            return Err(AppError::Config("api_key is empty".to_string()));
        }
        if credentials.api_secret.trim().is_empty() {
            return Err(AppError::Config("api_secret is empty".to_string()));
        }

        Ok(credentials)
    }
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}
