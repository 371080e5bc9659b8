// Gateway CRUD over the current principal's partitions.
//
// :kind parses into a PartitionKind; anything else is 404, the same as a
// record id that does not resolve inside the caller's own partition. The
// gateway stamps owner/timestamps and filters the sentinel on every read.

use axum::extract::{Extension, Path};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::error::CoreError;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::tenancy::gateway::{DomainRecord, Partition, TenantGateway};
use crate::tenancy::naming::PartitionKind;

#[derive(Debug, Deserialize)]
pub struct CreateRecordRequest {
    pub name: String,
    #[serde(default)]
    pub attrs: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub name: Option<String>,
    pub attrs: Option<Value>,
}

fn parse_kind(kind: &str) -> Result<PartitionKind, CoreError> {
    kind.parse()
        .map_err(|_| CoreError::not_found(format!("unknown collection '{}'", kind)))
}

fn parse_id(id: &str) -> Result<Uuid, CoreError> {
    // A malformed id can never name a record here; same answer as absent
    Uuid::parse_str(id).map_err(|_| CoreError::not_found("record not found"))
}

async fn partition(user: &AuthUser, kind: &str) -> Result<Partition, CoreError> {
    let kind = parse_kind(kind)?;
    let pool = DatabaseManager::pool().await?;
    let gateway = TenantGateway::open(pool, user.id).await?;
    Ok(gateway.partition(kind))
}

/// GET /api/data/:kind - list the caller's records, newest first
pub async fn list(
    Extension(user): Extension<AuthUser>,
    Path(kind): Path<String>,
) -> ApiResult<Vec<DomainRecord>> {
    let partition = partition(&user, &kind).await?;
    Ok(ApiResponse::success(partition.list().await?))
}

/// POST /api/data/:kind - create a record in the caller's partition
pub async fn create(
    Extension(user): Extension<AuthUser>,
    Path(kind): Path<String>,
    Json(payload): Json<CreateRecordRequest>,
) -> ApiResult<DomainRecord> {
    if payload.name.trim().is_empty() {
        return Err(CoreError::invalid_operation("name is required"));
    }

    let partition = partition(&user, &kind).await?;
    let attrs = payload.attrs.unwrap_or_else(|| json!({}));
    let record = partition.insert(payload.name.trim(), attrs).await?;
    Ok(ApiResponse::created(record))
}

/// GET /api/data/:kind/:id
pub async fn get(
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<DomainRecord> {
    let record_id = parse_id(&id)?;
    let partition = partition(&user, &kind).await?;
    Ok(ApiResponse::success(partition.get(record_id).await?))
}

/// PUT /api/data/:kind/:id - full update (name and attrs required)
pub async fn replace(
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(String, String)>,
    Json(payload): Json<CreateRecordRequest>,
) -> ApiResult<DomainRecord> {
    if payload.name.trim().is_empty() {
        return Err(CoreError::invalid_operation("name is required"));
    }

    let record_id = parse_id(&id)?;
    let partition = partition(&user, &kind).await?;
    let attrs = payload.attrs.unwrap_or_else(|| json!({}));
    let record = partition
        .update(record_id, Some(payload.name.trim()), Some(attrs))
        .await?;
    Ok(ApiResponse::success(record))
}

/// PATCH /api/data/:kind/:id - partial update
pub async fn patch(
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(String, String)>,
    Json(payload): Json<UpdateRecordRequest>,
) -> ApiResult<DomainRecord> {
    let record_id = parse_id(&id)?;
    let partition = partition(&user, &kind).await?;
    let record = partition
        .update(record_id, payload.name.as_deref(), payload.attrs)
        .await?;
    Ok(ApiResponse::success(record))
}

/// DELETE /api/data/:kind/:id
pub async fn delete(
    Extension(user): Extension<AuthUser>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let record_id = parse_id(&id)?;
    let partition = partition(&user, &kind).await?;
    partition.delete(record_id).await?;
    Ok(ApiResponse::<()>::no_content())
}
