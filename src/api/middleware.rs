//! HTTP middleware for the API layer.

use axum::{
    body::Body,
    extract::State,
    http::{Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use crate::domain::{AppError, TokenPayload};

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

/// Bearer-token authentication middleware.
///
/// Verifies the `Authorization: Bearer <token>` header and stashes the
/// verified [`TokenPayload`] in the request extensions for handlers that
/// need the caller's identity.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let header = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok());

    let Some(header) = header else {
        return AppError::Authentication("authorization header is not provided".to_string())
            .into_response();
    };

    let mut fields = header.split_whitespace();
    let (Some(auth_type), Some(token)) = (fields.next(), fields.next()) else {
        return AppError::Authentication("invalid authorization header format".to_string())
            .into_response();
    };

    if !auth_type.eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
        return AppError::Authentication(format!(
            "unsupported authorization type {auth_type}"
        ))
        .into_response();
    }

    let payload: TokenPayload = match state.token_maker.verify_token(token) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "token verification failed");
            return AppError::Token(e).into_response();
        }
    };

    request.extensions_mut().insert(payload);
    next.run(request).await
}
