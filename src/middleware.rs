use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

/// Caller identity for user routes.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Caller identity for admin routes.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub admin_id: Uuid,
}

fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Access token required".to_string()))
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = state.auth.verify_token(bearer_token(req.headers())?)?;

    if claims.role.is_admin() {
        warn!("Admin token used on a user route: {}", claims.sub);
        return Err(AppError::Forbidden("User token required".to_string()));
    }

    let user_id = claims.subject_id()?;
    req.extensions_mut().insert(AuthenticatedUser { user_id });
    Ok(next.run(req).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let claims = state.auth.verify_token(bearer_token(req.headers())?)?;

    if !claims.role.is_admin() {
        warn!("Non-admin token used on an admin route: {}", claims.sub);
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    let admin_id = claims.subject_id()?;
    req.extensions_mut().insert(AdminSession { admin_id });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }
}
