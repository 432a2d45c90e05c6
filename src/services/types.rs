//! Result shapes returned by the service layer

use crate::error::ErrorBody;
use serde::Serialize;

/// JSON body for the login endpoints and the status route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiResponse {
    fn with_status(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            url: None,
            message: Some(message.to_string()),
            details: None,
        }
    }

    pub fn up(message: &str) -> Self {
        Self::with_status("up", message)
    }

    pub fn success_with_message(message: &str) -> Self {
        Self::with_status("success", message)
    }

    pub fn login_url(url: String) -> Self {
        Self {
            url: Some(url),
            ..Self::success_with_message("Use this URL to complete the authentication process")
        }
    }

    pub fn error(message: &str) -> Self {
        Self::with_status("error", message)
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

impl From<ErrorBody> for ApiResponse {
    fn from(body: ErrorBody) -> Self {
        Self {
            status: body.status,
            url: None,
            message: Some(body.message),
            details: body.details,
        }
    }
}

/// Outcome of an upstream read.
///
/// Serialized as `{"status": "success", "data": .., "count": n}`,
/// `{"status": "error", "message": ..}` or `{"status": "no_session"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApiResult<T> {
    Success {
        #[serde(rename = "data")]
        payload: T,
        count: usize,
    },
    Error {
        message: String,
    },
    NoSession,
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            ApiResult::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
