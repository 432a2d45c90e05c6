//! Application state shared by the HTTP handlers

use crate::brokers::zerodha::KiteConnect;
use crate::config::Config;
use crate::error::Result;
use crate::logging::RemoteLogger;
use crate::security::AccessGuard;
use crate::services::KiteService;
use crate::storage::SessionStore;
use std::sync::Arc;

pub struct AppState {
    /// Access code check for the /api routes
    pub guard: AccessGuard,

    pub kite: Arc<KiteService>,

    pub logger: RemoteLogger,
}

impl AppState {
    pub fn new(guard: AccessGuard, kite: Arc<KiteService>, logger: RemoteLogger) -> Self {
        Self {
            guard,
            kite,
            logger,
        }
    }

    /// Build the production state from configuration
    pub fn from_config(config: &Config, logger: RemoteLogger) -> Result<Self> {
        let api = Arc::new(KiteConnect::new()?);
        let sessions = Arc::new(SessionStore::new(config.session_path.clone()));
        let kite = Arc::new(KiteService::new(
            api,
            sessions,
            config.credentials_path.clone(),
            logger.clone(),
        ));

        Ok(Self::new(AccessGuard::new(&config.code), kite, logger))
    }
}
