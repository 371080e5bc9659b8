use crate::database::manager::DatabaseManager;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::tenancy::aggregator::{Aggregator, Stats};

/// GET /api/admin/stats - dashboard summary across all tenants
pub async fn get() -> ApiResult<Stats> {
    let pool = DatabaseManager::pool().await?;
    let stats = Aggregator::new(pool).stats().await?;
    Ok(ApiResponse::success(stats))
}
