// Public auth tier: registration and credential issuance.
//
// The RoleResolver arrives by Extension rather than ambient config so both
// issuance sites (login and refresh) share one injected allow-list.

use axum::{extract::Extension, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::auth::roles::{Role, RoleResolver};
use crate::auth::{self, password, session, Claims};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::directory::{Directory, Principal};
use crate::error::CoreError;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::tenancy::provisioner;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/register - create a Principal and eagerly provision its
/// partitions. Duplicate email (case-insensitive) yields 409.
pub async fn register(Json(payload): Json<RegisterRequest>) -> ApiResult<Value> {
    if payload.name.trim().is_empty() || payload.password.is_empty() {
        return Err(CoreError::invalid_operation(
            "name, email, and password are required",
        ));
    }
    if !payload.email.contains('@') {
        return Err(CoreError::invalid_operation("a valid email is required"));
    }

    let pool = DatabaseManager::pool().await?;
    let directory = Directory::new(pool.clone());

    let password_hash = password::hash_password(&payload.password)?;
    let principal = directory
        .create(payload.name.trim(), &payload.email, Some(&password_hash))
        .await?;

    // Eager provisioning, as a convenience. A failure here is not fatal to
    // registration: the provisioned flag stays false and the next access
    // through the gateway retries.
    if let Err(e) = provisioner::ensure_provisioned(&pool, principal.id).await {
        warn!("eager provisioning for {} failed: {}", principal.id, e);
    }

    Ok(ApiResponse::created(json!({
        "id": principal.id,
        "name": principal.name,
        "email": principal.email,
    })))
}

/// POST /auth/login - verify credentials, resolve the effective role, and
/// issue an access JWT plus an opaque refresh token.
pub async fn login(
    Extension(resolver): Extension<RoleResolver>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let directory = Directory::new(pool.clone());

    let principal = directory
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let hash = principal.password_hash.as_deref().ok_or_else(invalid_credentials)?;
    if !password::verify_password(&payload.password, hash)? {
        return Err(invalid_credentials());
    }

    let effective = resolve_and_reconcile(&resolver, &directory, &principal).await;
    issue_tokens(&pool, &principal, effective).await
}

/// POST /auth/refresh - rotate a refresh token. The effective role is
/// re-resolved against the live allow-list so allow-list changes take effect
/// without a full re-authentication.
pub async fn refresh(
    Extension(resolver): Extension<RoleResolver>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let directory = Directory::new(pool.clone());

    let live = session::find_valid_session(&pool, &payload.refresh_token)
        .await?
        .ok_or_else(|| CoreError::unauthenticated("invalid or expired refresh token"))?;

    // The principal may have been torn down since the token was issued
    let principal = directory
        .find_by_id(live.principal_id)
        .await?
        .ok_or_else(|| CoreError::unauthenticated("invalid or expired refresh token"))?;

    let effective = resolve_and_reconcile(&resolver, &directory, &principal).await;

    let new_token = session::generate_refresh_token();
    session::rotate_session(&pool, live.id, principal.id, &new_token).await?;

    let claims = Claims::new(
        principal.id,
        principal.name.clone(),
        principal.email.clone(),
        effective,
    );
    let token = auth::generate_jwt(&claims)?;

    Ok(ApiResponse::success(json!({
        "token": token,
        "refresh_token": new_token,
        "expires_in": config::config().security.jwt_expiry_hours * 3600,
        "principal": principal_view(&principal, effective),
    })))
}

fn invalid_credentials() -> CoreError {
    // One message for unknown email and bad password alike
    CoreError::unauthenticated("invalid email or password")
}

/// Merge allow-list and persisted role, then reconcile the directory row
/// best-effort. The allow-list wins at decision time even if reconciliation
/// fails.
async fn resolve_and_reconcile(
    resolver: &RoleResolver,
    directory: &Directory,
    principal: &Principal,
) -> Role {
    let effective = resolver.resolve(&principal.email, principal.role());

    if Some(effective) != principal.role() {
        if let Err(e) = directory.set_role(principal.id, effective).await {
            warn!(
                "role reconciliation for {} failed (continuing with {}): {}",
                principal.email, effective, e
            );
        }
    }

    effective
}

async fn issue_tokens(
    pool: &sqlx::PgPool,
    principal: &Principal,
    effective: Role,
) -> ApiResult<Value> {
    let claims = Claims::new(
        principal.id,
        principal.name.clone(),
        principal.email.clone(),
        effective,
    );
    let token = auth::generate_jwt(&claims)?;

    let refresh_token = session::generate_refresh_token();
    session::create_session(pool, principal.id, &refresh_token).await?;

    Ok(ApiResponse::success(json!({
        "token": token,
        "refresh_token": refresh_token,
        "expires_in": config::config().security.jwt_expiry_hours * 3600,
        "principal": principal_view(principal, effective),
    })))
}

fn principal_view(principal: &Principal, effective: Role) -> Value {
    json!({
        "id": principal.id,
        "name": principal.name,
        "email": principal.email,
        "role": effective.as_str(),
    })
}
