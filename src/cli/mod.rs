//! Operations CLI: database bootstrap and maintenance actions that bypass
//! the HTTP surface (the explicit role-change path reachable from tooling).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::auth::roles::Role;
use crate::database::bootstrap;
use crate::database::manager::DatabaseManager;
use crate::directory::Directory;
use crate::tenancy::teardown;

#[derive(Parser)]
#[command(name = "tenetctl")]
#[command(about = "Tenet CLI - operations tooling for the tenant-data service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the identity directory tables if missing")]
    InitDb,

    #[command(about = "Check database connectivity")]
    Health,

    #[command(about = "Persist the admin role for a principal")]
    GrantAdmin {
        #[arg(help = "Email of the principal to elevate")]
        email: String,
    },

    #[command(about = "Persist the user role for a principal")]
    RevokeAdmin {
        #[arg(help = "Email of the principal to demote")]
        email: String,
    },

    #[command(about = "Delete a tenant: partitions, sessions, directory row")]
    Teardown {
        #[arg(help = "Email of the principal to remove")]
        email: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool()
        .await
        .context("could not connect to database")?;

    match cli.command {
        Commands::InitDb => {
            bootstrap::init_directory(&pool).await?;
            println!("directory schema ready");
        }
        Commands::Health => {
            DatabaseManager::health_check().await?;
            println!("database ok");
        }
        Commands::GrantAdmin { email } => {
            set_role(&pool, &email, Role::Admin).await?;
        }
        Commands::RevokeAdmin { email } => {
            set_role(&pool, &email, Role::User).await?;
        }
        Commands::Teardown { email } => {
            let directory = Directory::new(pool.clone());
            let principal = directory
                .find_by_email(&email)
                .await?
                .with_context(|| format!("no principal with email {}", email))?;

            teardown::delete_tenant(&pool, principal.id).await?;
            println!("tenant {} ({}) deleted", principal.id, email);
        }
    }

    Ok(())
}

async fn set_role(pool: &sqlx::PgPool, email: &str, role: Role) -> anyhow::Result<()> {
    let directory = Directory::new(pool.clone());
    let principal = match directory.find_by_email(email).await? {
        Some(p) => p,
        None => bail!("no principal with email {}", email),
    };

    directory.set_role(principal.id, role).await?;
    println!("{} is now {}", email, role);
    Ok(())
}
