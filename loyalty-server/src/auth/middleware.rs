//! Authentication middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppError;
use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;

/// Require a valid staff token
///
/// Reads `Authorization: Bearer <token>`, validates it and injects the
/// [`CurrentUser`] into the request extensions.
///
/// | Failure | Status |
/// |---------|--------|
/// | No header | 401 NotAuthenticated |
/// | Expired token | 401 TokenExpired |
/// | Bad token | 401 TokenInvalid |
/// | Non-staff role | 403 PermissionDenied |
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // CORS preflight
    if req.method() == http::Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
        None => {
            security_log!("auth_missing", uri = req.uri());
            return Err(AppError::unauthorized());
        }
    };

    let claims = match state.jwt_service.validate_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            security_log!("auth_failed", error = e, uri = req.uri());
            return Err(match e {
                JwtError::ExpiredToken => AppError::token_expired(),
                _ => AppError::invalid_token("Invalid token"),
            });
        }
    };

    let user = CurrentUser::from(claims);
    if !user.is_staff() {
        security_log!("role_denied", user_id = user.id, role = user.role);
        return Err(AppError::permission_denied("Staff role required"));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
