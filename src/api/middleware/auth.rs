use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::verify_token;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Bearer-token check for `/api`. Without a configured secret every
/// request passes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = state.security.jwt_secret.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let Some(token) = token else {
        return Err(AppError::Unauthorized("missing bearer token".to_string()));
    };

    match verify_token(&token, secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => Err(AppError::Unauthorized("invalid or expired token".to_string())),
    }
}
