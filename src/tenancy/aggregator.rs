//! Cross-tenant aggregation for the administrative surface.
//!
//! Partitions are discovered structurally from pg_tables by the naming
//! convention - nothing registers them anywhere else. Owner metadata is
//! resolved with a single bulk directory lookup, and per-partition work runs
//! as a bounded-concurrency fan-out with a per-partition timeout: one slow or
//! broken partition is skipped and counted, never merged as zero and never
//! fatal to the whole operation.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::directory::Directory;
use crate::error::CoreError;
use crate::tenancy::naming::{owner_of, partition_name, PartitionKind};
use crate::tenancy::SENTINEL_NAME;

/// A discovered partition and the principal derived from its name.
#[derive(Debug, Clone)]
pub struct PartitionRef {
    pub table: String,
    pub owner_id: Uuid,
}

/// A tenant record annotated with its resolved owner.
#[derive(Debug, Serialize)]
pub struct AdminRecord {
    pub id: Uuid,
    pub name: String,
    pub attrs: Value,
    pub created_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub owner_name: String,
    pub owner_email: String,
}

#[derive(Debug, Serialize)]
pub struct AggregatedList {
    pub records: Vec<AdminRecord>,
    pub partitions: usize,
    /// Partitions that errored or timed out - distinguishable from empty.
    pub skipped_partitions: usize,
}

#[derive(Debug, Serialize)]
pub struct AggregateCount {
    pub total: i64,
    pub partitions: usize,
    pub skipped_partitions: usize,
}

#[derive(Debug, Serialize)]
pub struct PrincipalRollup {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub provisioned: bool,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub group_count: i64,
}

#[derive(Debug, Serialize)]
pub struct RollupReport {
    pub principals: Vec<PrincipalRollup>,
    pub skipped_partitions: usize,
}

#[derive(Debug, Serialize)]
pub struct RecentPrincipal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_principals: i64,
    pub total_items: i64,
    pub total_groups: i64,
    pub recent_principals: Vec<RecentPrincipal>,
    pub skipped_partitions: usize,
}

const RECENT_PRINCIPALS: i64 = 5;

pub struct Aggregator {
    pool: PgPool,
}

impl Aggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Discover every partition of a kind system-wide. The LIKE scan can
    /// over-match (`_` is a wildcard, and unrelated tables may share the
    /// prefix); `owner_of` keeps only names that parse exactly.
    pub async fn enumerate(&self, kind: PartitionKind) -> Result<Vec<PartitionRef>, CoreError> {
        let pattern = format!("{}_%", kind.as_str());
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT tablename FROM pg_tables WHERE schemaname = 'public' AND tablename LIKE $1",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(tables
            .into_iter()
            .filter_map(|table| {
                owner_of(kind, &table).map(|owner_id| PartitionRef { table, owner_id })
            })
            .collect())
    }

    /// All non-sentinel records of a kind across every tenant, annotated
    /// with owner metadata and merged newest-first.
    pub async fn list_all(&self, kind: PartitionKind) -> Result<AggregatedList, CoreError> {
        let refs = self.enumerate(kind).await?;
        let partitions = refs.len();

        let owner_ids: Vec<Uuid> = refs.iter().map(|r| r.owner_id).collect();
        let owners = Directory::new(self.pool.clone()).find_owners(&owner_ids).await?;

        let agg = &config::config().aggregation;
        let budget = Duration::from_millis(agg.partition_timeout_ms);

        let results: Vec<(PartitionRef, Option<Vec<PartitionRow>>)> =
            stream::iter(refs.into_iter().map(|part| {
                let pool = self.pool.clone();
                async move {
                    let rows = match tokio::time::timeout(budget, fetch_rows(&pool, &part.table)).await {
                        Ok(Ok(rows)) => Some(rows),
                        Ok(Err(e)) => {
                            warn!("skipping partition {}: {}", part.table, e);
                            None
                        }
                        Err(_) => {
                            warn!("skipping partition {}: timed out", part.table);
                            None
                        }
                    };
                    (part, rows)
                }
            }))
            .buffer_unordered(agg.fanout_concurrency)
            .collect()
            .await;

        let mut records = Vec::new();
        let mut skipped_partitions = 0;
        for (part, rows) in results {
            let Some(rows) = rows else {
                skipped_partitions += 1;
                continue;
            };
            let (owner_name, owner_email) = match owners.get(&part.owner_id) {
                Some(owner) => (owner.name.clone(), owner.email.clone()),
                None => ("Unknown".to_string(), "Unknown".to_string()),
            };
            for row in rows {
                records.push(AdminRecord {
                    id: row.id,
                    name: row.name,
                    attrs: row.attrs,
                    created_at: row.created_at,
                    owner_id: part.owner_id,
                    owner_name: owner_name.clone(),
                    owner_email: owner_email.clone(),
                });
            }
        }

        sort_newest_first(&mut records);

        Ok(AggregatedList {
            records,
            partitions,
            skipped_partitions,
        })
    }

    /// Global non-sentinel record count for a kind. Uses the same name
    /// filter as every ordinary read.
    pub async fn count_all(&self, kind: PartitionKind) -> Result<AggregateCount, CoreError> {
        let refs = self.enumerate(kind).await?;
        let partitions = refs.len();

        let (counts, skipped_partitions) = self.count_partitions(refs).await;
        let total = counts.values().sum();

        Ok(AggregateCount {
            total,
            partitions,
            skipped_partitions,
        })
    }

    /// Per-principal record counts for the user-management view. A partition
    /// that was never provisioned counts as zero - absence is not an error.
    pub async fn rollup(&self) -> Result<RollupReport, CoreError> {
        let directory = Directory::new(self.pool.clone());
        let principals = directory.list_all().await?;

        // One enumeration pass for both kinds, then one bounded fan-out of
        // counts - never a query per principal.
        let mut refs = Vec::new();
        for kind in PartitionKind::ALL {
            refs.extend(self.enumerate(kind).await?);
        }
        let (counts, skipped_partitions) = self.count_partitions(refs).await;

        let rollups = principals
            .into_iter()
            .map(|p| {
                let item_count = counts
                    .get(&partition_name(PartitionKind::Items, p.id))
                    .copied()
                    .unwrap_or(0);
                let group_count = counts
                    .get(&partition_name(PartitionKind::Groups, p.id))
                    .copied()
                    .unwrap_or(0);
                PrincipalRollup {
                    id: p.id,
                    name: p.name,
                    email: p.email,
                    role: p.role,
                    provisioned: p.provisioned,
                    created_at: p.created_at,
                    item_count,
                    group_count,
                }
            })
            .collect();

        Ok(RollupReport {
            principals: rollups,
            skipped_partitions,
        })
    }

    /// Dashboard summary: directory size, global counts, newest principals.
    pub async fn stats(&self) -> Result<Stats, CoreError> {
        let directory = Directory::new(self.pool.clone());

        let total_principals = directory.count().await?;
        let items = self.count_all(PartitionKind::Items).await?;
        let groups = self.count_all(PartitionKind::Groups).await?;

        let recent_principals = directory
            .recent(RECENT_PRINCIPALS)
            .await?
            .into_iter()
            .map(|p| RecentPrincipal {
                id: p.id,
                name: p.name,
                email: p.email,
                created_at: p.created_at,
            })
            .collect();

        Ok(Stats {
            total_principals,
            total_items: items.total,
            total_groups: groups.total,
            recent_principals,
            skipped_partitions: items.skipped_partitions + groups.skipped_partitions,
        })
    }

    /// Bounded fan-out of sentinel-excluded counts; returns table -> count
    /// plus the number of partitions skipped for errors or timeouts.
    async fn count_partitions(&self, refs: Vec<PartitionRef>) -> (HashMap<String, i64>, usize) {
        let agg = &config::config().aggregation;
        let budget = Duration::from_millis(agg.partition_timeout_ms);

        let results: Vec<(String, Option<i64>)> = stream::iter(refs.into_iter().map(|part| {
            let pool = self.pool.clone();
            async move {
                let count = match tokio::time::timeout(budget, fetch_count(&pool, &part.table)).await {
                    Ok(Ok(n)) => Some(n),
                    Ok(Err(e)) => {
                        warn!("skipping partition {}: {}", part.table, e);
                        None
                    }
                    Err(_) => {
                        warn!("skipping partition {}: timed out", part.table);
                        None
                    }
                };
                (part.table, count)
            }
        }))
        .buffer_unordered(agg.fanout_concurrency)
        .collect()
        .await;

        let mut counts = HashMap::new();
        let mut skipped = 0;
        for (table, count) in results {
            match count {
                Some(n) => {
                    counts.insert(table, n);
                }
                None => skipped += 1,
            }
        }
        (counts, skipped)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PartitionRow {
    id: Uuid,
    name: String,
    attrs: Value,
    created_at: DateTime<Utc>,
}

async fn fetch_rows(pool: &PgPool, table: &str) -> Result<Vec<PartitionRow>, sqlx::Error> {
    let sql = format!(
        "SELECT id, name, attrs, created_at FROM {} WHERE name <> $1",
        DatabaseManager::quote_identifier(table)
    );
    sqlx::query_as::<_, PartitionRow>(&sql)
        .bind(SENTINEL_NAME)
        .fetch_all(pool)
        .await
}

async fn fetch_count(pool: &PgPool, table: &str) -> Result<i64, sqlx::Error> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE name <> $1",
        DatabaseManager::quote_identifier(table)
    );
    sqlx::query_scalar(&sql).bind(SENTINEL_NAME).fetch_one(pool).await
}

fn sort_newest_first(records: &mut [AdminRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
