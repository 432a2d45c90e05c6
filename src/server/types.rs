//! Query parameters accepted by the HTTP routes

use serde::Deserialize;

/// `GET /api/url?code=..`
#[derive(Debug, Default, Deserialize)]
pub struct UrlQuery {
    pub code: Option<String>,
}

/// `GET /api/token?code=..&request_token=..`
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub code: Option<String>,
    pub request_token: Option<String>,
}

impl TokenQuery {
    /// The request token, with blank values treated as missing
    pub fn request_token(&self) -> Option<&str> {
        self.request_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
