use axum::extract::Path;

use crate::database::manager::DatabaseManager;
use crate::error::CoreError;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::tenancy::aggregator::{AggregatedList, Aggregator};
use crate::tenancy::naming::PartitionKind;

/// GET /api/admin/data/:kind - every tenant's records of a kind, annotated
/// with owner metadata and merged newest-first
pub async fn list_all(Path(kind): Path<String>) -> ApiResult<AggregatedList> {
    let kind: PartitionKind = kind
        .parse()
        .map_err(|_| CoreError::not_found(format!("unknown collection '{}'", kind)))?;

    let pool = DatabaseManager::pool().await?;
    let list = Aggregator::new(pool).list_all(kind).await?;
    Ok(ApiResponse::success(list))
}
