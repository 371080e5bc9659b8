// User-management surface: per-principal rollup, explicit role changes, and
// tenant teardown.

use axum::extract::{Extension, Path};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::roles::Role;
use crate::database::manager::DatabaseManager;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::tenancy::aggregator::{Aggregator, RollupReport};
use crate::tenancy::teardown;

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: String,
}

/// GET /api/admin/principals - every principal with its partition counts
pub async fn rollup() -> ApiResult<RollupReport> {
    let pool = DatabaseManager::pool().await?;
    let report = Aggregator::new(pool).rollup().await?;
    Ok(ApiResponse::success(report))
}

/// PATCH /api/admin/principals/:id - the explicit role-change operation,
/// the only elevation path besides the allow-list. Takes effect at the
/// target's next credential issuance or refresh.
pub async fn change_role(
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleChangeRequest>,
) -> ApiResult<Value> {
    let role: Role = payload
        .role
        .parse()
        .map_err(|_| CoreError::invalid_operation("role must be 'user' or 'admin'"))?;

    let pool = DatabaseManager::pool().await?;
    let updated = Directory::new(pool).set_role(id, role).await?;
    if !updated {
        return Err(CoreError::not_found("principal not found"));
    }

    Ok(ApiResponse::success(json!({ "id": id, "role": role.as_str() })))
}

/// DELETE /api/admin/principals/:id - cascading teardown of a tenant.
/// Self-deletion is rejected before anything is touched; repeating the call
/// on an already-deleted tenant succeeds.
pub async fn delete(
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    teardown::ensure_not_self(caller.id, id)?;

    let pool = DatabaseManager::pool().await?;
    teardown::delete_tenant(&pool, id).await?;
    Ok(ApiResponse::<()>::no_content())
}
