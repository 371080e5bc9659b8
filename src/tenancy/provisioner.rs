//! Exactly-once partition provisioning.
//!
//! Every statement here is individually idempotent - CREATE TABLE IF NOT
//! EXISTS, CREATE UNIQUE INDEX IF NOT EXISTS, and a sentinel insert with ON
//! CONFLICT DO NOTHING against a partial unique index over the sentinel
//! name - and every invocation re-runs all of them. Two concurrent
//! first-touch requests converge on the same end state - two partitions,
//! one sentinel each - without any lock, and a partial failure (a table
//! created but its sentinel never inserted, or one kind set up and the
//! other not) is completed by the next invocation rather than skipped.

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::tenancy::naming::{partition_name, PartitionKind};
use crate::tenancy::SENTINEL_NAME;

/// Ensure both of a principal's partitions exist, each holding exactly one
/// sentinel row. Idempotent under sequential and concurrent invocation.
/// Never called from pure read paths - the aggregator does not provision.
pub async fn ensure_provisioned(pool: &PgPool, principal_id: Uuid) -> Result<(), CoreError> {
    let directory = Directory::new(pool.clone());

    // Partitions exist only for principals the directory knows. A stale
    // credential for a torn-down tenant must not resurrect its tables.
    let principal = directory
        .find_by_id(principal_id)
        .await?
        .ok_or_else(|| CoreError::unauthenticated("unknown principal"))?;

    // Fast path: the flag on the principal row is the provisioning-status
    // record; structure below reconciles it when it is stale.
    if principal.provisioned {
        return Ok(());
    }

    // No table-existence check: a table that exists without its sentinel
    // (a prior attempt failed between DDL and insert) must still get the
    // insert, and every statement below is a no-op when already applied.
    for kind in PartitionKind::ALL {
        let table = partition_name(kind, principal_id);
        create_partition(pool, kind, principal_id, &table).await?;
    }

    // Best-effort flag reconciliation; the structural state above is already
    // correct even if this update fails.
    if let Err(e) = directory.set_provisioned(principal_id).await {
        warn!("failed to mark principal {} provisioned: {}", principal_id, e);
    }

    Ok(())
}

async fn create_partition(
    pool: &PgPool,
    kind: PartitionKind,
    principal_id: Uuid,
    table: &str,
) -> Result<(), CoreError> {
    let quoted = DatabaseManager::quote_identifier(table);

    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            owner_id UUID NOT NULL,
            attrs JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        quoted
    );
    sqlx::query(&ddl)
        .execute(pool)
        .await
        .map_err(|e| provision_error(principal_id, table, e))?;

    // Partial unique index over the sentinel identity: a concurrent
    // duplicate sentinel insert becomes a benign conflict, not a second row.
    // DDL cannot take bind parameters, so the sentinel literal is inlined.
    let index = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (name) WHERE name = '{}'",
        DatabaseManager::quote_identifier(&format!("{}_sentinel", table)),
        quoted,
        SENTINEL_NAME.replace('\'', "''"),
    );
    sqlx::query(&index)
        .execute(pool)
        .await
        .map_err(|e| provision_error(principal_id, table, e))?;

    let insert = format!(
        "INSERT INTO {} (name, owner_id, attrs) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        quoted
    );
    sqlx::query(&insert)
        .bind(SENTINEL_NAME)
        .bind(principal_id)
        .bind(json!({
            "description": format!("{} collection for user", kind),
        }))
        .execute(pool)
        .await
        .map_err(|e| provision_error(principal_id, table, e))?;

    debug!("provisioned partition {}", table);
    Ok(())
}

fn provision_error(principal_id: Uuid, what: &str, err: sqlx::Error) -> CoreError {
    warn!("provisioning {} for {}: {}", what, principal_id, err);
    CoreError::provision(format!("could not set up tenant data ({})", what))
}
