//! Per-principal data access, scoped to one partition.
//!
//! Partition naming is the authorization boundary: a gateway is constructed
//! from the authenticated principal's id and can only ever address that
//! principal's tables. Foreign or unknown record ids therefore surface as
//! NotFound - never Forbidden - so probing cannot reveal whether a record
//! exists in another tenant's partition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::error::CoreError;
use crate::tenancy::naming::{partition_name, PartitionKind};
use crate::tenancy::{provisioner, SENTINEL_NAME};

/// Ordinary tenant-owned record. `owner_id` is stamped redundantly as
/// defense in depth; it is not consulted for authorization.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DomainRecord {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub attrs: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reject writes that would collide with the sentinel marker. Without this
/// check a record named like the sentinel would be silently hidden from
/// every listing.
pub fn reject_reserved_name(name: &str) -> Result<(), CoreError> {
    if name == SENTINEL_NAME {
        return Err(CoreError::invalid_operation(format!(
            "'{}' is a reserved name",
            SENTINEL_NAME
        )));
    }
    Ok(())
}

pub struct TenantGateway {
    pool: PgPool,
    principal_id: Uuid,
}

impl TenantGateway {
    /// Resolve the current principal to its partitions, provisioning on
    /// first touch (the provisioner fast-paths on the provisioned flag).
    pub async fn open(pool: PgPool, principal_id: Uuid) -> Result<Self, CoreError> {
        provisioner::ensure_provisioned(&pool, principal_id).await?;
        Ok(Self { pool, principal_id })
    }

    pub fn partition(&self, kind: PartitionKind) -> Partition {
        Partition {
            pool: self.pool.clone(),
            owner: self.principal_id,
            table: partition_name(kind, self.principal_id),
        }
    }
}

/// Handle bound to one physical partition table.
pub struct Partition {
    pool: PgPool,
    owner: Uuid,
    table: String,
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("42P01"))
}

impl Partition {
    fn quoted(&self) -> String {
        DatabaseManager::quote_identifier(&self.table)
    }

    /// A table missing despite the provisioned flag means flag and structure
    /// drifted apart; re-provision once and retry, otherwise propagate.
    async fn heal(&self, err: sqlx::Error) -> Result<(), CoreError> {
        if is_undefined_table(&err) {
            tracing::warn!("partition {} missing despite flag, re-provisioning", self.table);
            provisioner::ensure_provisioned(&self.pool, self.owner).await
        } else {
            Err(err.into())
        }
    }

    /// All non-sentinel records, newest first.
    pub async fn list(&self) -> Result<Vec<DomainRecord>, CoreError> {
        match self.try_list().await {
            Ok(records) => Ok(records),
            Err(e) => {
                self.heal(e).await?;
                Ok(self.try_list().await?)
            }
        }
    }

    async fn try_list(&self) -> Result<Vec<DomainRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT id, name, owner_id, attrs, created_at, updated_at
             FROM {} WHERE name <> $1 ORDER BY created_at DESC",
            self.quoted()
        );
        sqlx::query_as::<_, DomainRecord>(&sql)
            .bind(SENTINEL_NAME)
            .fetch_all(&self.pool)
            .await
    }

    /// Non-sentinel record count; uses the same name filter as `list`, so
    /// the two can never disagree by the sentinel.
    pub async fn count(&self) -> Result<i64, CoreError> {
        match self.try_count().await {
            Ok(n) => Ok(n),
            Err(e) => {
                self.heal(e).await?;
                Ok(self.try_count().await?)
            }
        }
    }

    async fn try_count(&self) -> Result<i64, sqlx::Error> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE name <> $1", self.quoted());
        sqlx::query_scalar(&sql)
            .bind(SENTINEL_NAME)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<DomainRecord, CoreError> {
        let sql = format!(
            "SELECT id, name, owner_id, attrs, created_at, updated_at
             FROM {} WHERE id = $1 AND name <> $2",
            self.quoted()
        );
        let record = match sqlx::query_as::<_, DomainRecord>(&sql)
            .bind(id)
            .bind(SENTINEL_NAME)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.heal(e).await?;
                None
            }
        };

        record.ok_or_else(|| CoreError::not_found("record not found"))
    }

    pub async fn insert(&self, name: &str, attrs: Value) -> Result<DomainRecord, CoreError> {
        reject_reserved_name(name)?;

        let sql = format!(
            "INSERT INTO {} (name, owner_id, attrs) VALUES ($1, $2, $3)
             RETURNING id, name, owner_id, attrs, created_at, updated_at",
            self.quoted()
        );
        match sqlx::query_as::<_, DomainRecord>(&sql)
            .bind(name)
            .bind(self.owner)
            .bind(&attrs)
            .fetch_one(&self.pool)
            .await
        {
            Ok(record) => Ok(record),
            Err(e) => {
                self.heal(e).await?;
                let record = sqlx::query_as::<_, DomainRecord>(&sql)
                    .bind(name)
                    .bind(self.owner)
                    .bind(&attrs)
                    .fetch_one(&self.pool)
                    .await?;
                Ok(record)
            }
        }
    }

    /// Partial update; None leaves the column untouched. Renaming to the
    /// sentinel name is rejected like any other reserved-name write.
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        attrs: Option<Value>,
    ) -> Result<DomainRecord, CoreError> {
        if let Some(name) = name {
            reject_reserved_name(name)?;
        }

        let sql = format!(
            "UPDATE {} SET
                name = COALESCE($3, name),
                attrs = COALESCE($4, attrs),
                updated_at = now()
             WHERE id = $1 AND name <> $2
             RETURNING id, name, owner_id, attrs, created_at, updated_at",
            self.quoted()
        );
        let record = match sqlx::query_as::<_, DomainRecord>(&sql)
            .bind(id)
            .bind(SENTINEL_NAME)
            .bind(name)
            .bind(&attrs)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                self.heal(e).await?;
                None
            }
        };

        record.ok_or_else(|| CoreError::not_found("record not found"))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND name <> $2", self.quoted());
        let affected = match sqlx::query(&sql)
            .bind(id)
            .bind(SENTINEL_NAME)
            .execute(&self.pool)
            .await
        {
            Ok(result) => result.rows_affected(),
            Err(e) => {
                self.heal(e).await?;
                0
            }
        };

        if affected == 0 {
            return Err(CoreError::not_found("record not found"));
        }
        Ok(())
    }
}
