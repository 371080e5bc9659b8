use sqlx::PgPool;
use tracing::info;

use crate::error::CoreError;

/// Create the identity directory and session tables if missing. Safe to run
/// repeatedly; every statement is IF NOT EXISTS. Partition tables are not
/// created here - the provisioner creates those lazily per principal.
pub async fn init_directory(pool: &PgPool) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS principals (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            provisioned BOOLEAN NOT NULL DEFAULT false,
            password_hash TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Emails are unique case-insensitively; rows always store lowercase
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS principals_email_key ON principals (lower(email))",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            principal_id UUID NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            expires_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS sessions_principal_idx ON sessions (principal_id)")
        .execute(pool)
        .await?;

    info!("Identity directory schema ready");
    Ok(())
}
