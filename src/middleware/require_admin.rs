use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::AuthUser;
use crate::error::CoreError;

/// Gate for the administrative route tier. This is the only place in the
/// system that produces Forbidden; cross-tenant record access elsewhere is
/// reported as NotFound so existence never leaks.
pub async fn require_admin_middleware(
    request: Request,
    next: Next,
) -> Result<Response, CoreError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| CoreError::unauthenticated("authentication required"))?;

    if !auth_user.is_admin() {
        tracing::warn!(
            "admin access denied for {} (role {})",
            auth_user.email,
            auth_user.role
        );
        return Err(CoreError::forbidden("admin access required"));
    }

    Ok(next.run(request).await)
}
