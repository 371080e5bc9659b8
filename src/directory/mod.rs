//! Identity Directory: one `principals` row per authenticated identity, the
//! root of trust for role and identity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::roles::Role;
use crate::error::{is_unique_violation, CoreError};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub provisioned: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Persisted role, tolerating unknown values from older rows.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

/// Owner display metadata for cross-tenant views.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerInfo {
    pub name: String,
    pub email: String,
}

const PRINCIPAL_COLUMNS: &str =
    "id, name, email, role, provisioned, password_hash, created_at, updated_at";

pub struct Directory {
    pool: PgPool,
}

impl Directory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a principal on first registration. Emails are stored lowercase;
    /// a duplicate (case-insensitive) surfaces as Conflict.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<Principal, CoreError> {
        let sql = format!(
            "INSERT INTO principals (name, email, password_hash)
             VALUES ($1, lower($2), $3)
             RETURNING {}",
            PRINCIPAL_COLUMNS
        );

        sqlx::query_as::<_, Principal>(&sql)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    CoreError::conflict("a user with this email already exists")
                } else {
                    e.into()
                }
            })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, CoreError> {
        let sql = format!("SELECT {} FROM principals WHERE id = $1", PRINCIPAL_COLUMNS);
        Ok(sqlx::query_as::<_, Principal>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, CoreError> {
        let sql = format!(
            "SELECT {} FROM principals WHERE lower(email) = lower($1)",
            PRINCIPAL_COLUMNS
        );
        Ok(sqlx::query_as::<_, Principal>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Bulk owner lookup for aggregation - one query regardless of how many
    /// tenants exist, never one query per partition.
    pub async fn find_owners(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, OwnerInfo>, CoreError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (Uuid, String, String)>(
            "SELECT id, name, email FROM principals WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, email)| (id, OwnerInfo { name, email }))
            .collect())
    }

    pub async fn list_all(&self) -> Result<Vec<Principal>, CoreError> {
        let sql = format!(
            "SELECT {} FROM principals ORDER BY created_at DESC",
            PRINCIPAL_COLUMNS
        );
        Ok(sqlx::query_as::<_, Principal>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Principal>, CoreError> {
        let sql = format!(
            "SELECT {} FROM principals ORDER BY created_at DESC LIMIT $1",
            PRINCIPAL_COLUMNS
        );
        Ok(sqlx::query_as::<_, Principal>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn count(&self) -> Result<i64, CoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM principals")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Persist a role. Returns false when the principal does not exist.
    pub async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, CoreError> {
        let result =
            sqlx::query("UPDATE principals SET role = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the provisioning flag after the partitions verifiably exist.
    pub async fn set_provisioned(&self, id: Uuid) -> Result<(), CoreError> {
        sqlx::query("UPDATE principals SET provisioned = true, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove the directory row (teardown step 3). Idempotent.
    pub async fn delete(&self, id: Uuid) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM principals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
