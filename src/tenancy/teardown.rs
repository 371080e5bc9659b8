//! Cascading tenant deletion.
//!
//! Order matters for partial-failure recovery: partitions first, then
//! sessions, then the directory row. Every step tolerates already-missing
//! pieces, so re-running a partly failed teardown completes it instead of
//! erroring.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::session;
use crate::database::manager::DatabaseManager;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::tenancy::naming::{partition_name, PartitionKind};

/// Self-deletion guard for the administrative surface. Checked before any
/// destructive step so a rejected call has no effect.
pub fn ensure_not_self(caller_id: Uuid, target_id: Uuid) -> Result<(), CoreError> {
    if caller_id == target_id {
        return Err(CoreError::invalid_operation(
            "cannot delete your own account",
        ));
    }
    Ok(())
}

/// Remove a principal's partitions, sessions, and directory row. Idempotent:
/// invoking it on an already-deleted tenant succeeds without effect.
pub async fn delete_tenant(pool: &PgPool, target_id: Uuid) -> Result<(), CoreError> {
    // (1) drop both partitions; a missing partition is not an error
    for kind in PartitionKind::ALL {
        let table = partition_name(kind, target_id);
        let sql = format!(
            "DROP TABLE IF EXISTS {}",
            DatabaseManager::quote_identifier(&table)
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    // (2) remove credential/session records
    session::delete_for_principal(pool, target_id).await?;

    // (3) remove the directory row itself
    let removed = Directory::new(pool.clone()).delete(target_id).await?;
    if removed {
        info!("tenant {} deleted", target_id);
    }

    Ok(())
}
