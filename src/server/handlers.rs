//! HTTP endpoint handlers
//!
//! Protected routes check the access code first, then their parameters,
//! and only then reach the Kite service.

use super::types::{TokenQuery, UrlQuery};
use crate::error::ErrorBody;
use crate::services::ApiResponse;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

pub const STATUS_MESSAGE: &str = "Kite App is running";

const MISSING_REQUEST_TOKEN: &str = "Missing request_token parameter";

/// Status endpoint - GET / or GET /health
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.logger.info("Status endpoint accessed").await;
    Json(ApiResponse::up(STATUS_MESSAGE))
}

/// Login URL endpoint - GET /api/url
pub async fn login_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> impl IntoResponse {
    state.logger.info("URL generation endpoint accessed").await;

    if let Err(body) = state.guard.validate(query.code.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(ApiResponse::from(body)));
    }

    (StatusCode::OK, Json(state.kite.generate_login_url().await))
}

/// Token exchange endpoint - GET /api/token
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> impl IntoResponse {
    state.logger.info("Token generation endpoint accessed").await;

    if let Err(body) = state.guard.validate(query.code.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(ApiResponse::from(body)));
    }

    let Some(request_token) = query.request_token() else {
        state.logger.warn("Token request without request_token").await;
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::from(ErrorBody::new(MISSING_REQUEST_TOKEN))),
        );
    };

    (StatusCode::OK, Json(state.kite.exchange_token(request_token).await))
}
