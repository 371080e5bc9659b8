#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Allow-listed admin email the test server is spawned with.
pub const ADMIN_EMAIL: &str = "admin-tests@example.com";
pub const PASSWORD: &str = "test-password-1";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        let mut cmd = Command::new("target/debug/tenet-api");
        cmd.env("TENET_API_PORT", port.to_string())
            .env("SECURITY_ADMIN_EMAILS", ADMIN_EMAIL)
            .env("SECURITY_JWT_SECRET", "integration-test-secret")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server sees DATABASE_URL
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                // Ready on any health answer, even degraded
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Most tests need a real database behind the server; skip cleanly when the
/// environment does not provide one.
pub fn db_available() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skipping: DATABASE_URL not set");
        return false;
    }
    true
}

/// Dedicated pool for direct database access from a test body. Each test
/// builds its own pool because a shared static pool's connections are bound
/// to whichever `#[tokio::test]` runtime created them; reusing them from a
/// later test's runtime hangs until the acquire timeout.
pub async fn test_pool() -> Result<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    sqlx::postgres::PgPoolOptions::new()
        .connect(&url)
        .await
        .context("failed to connect test pool")
}

static EMAIL_SEQ: AtomicU32 = AtomicU32::new(0);

/// Unique per-run email so repeated test runs never collide on the
/// case-insensitive unique index.
pub fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let seq = EMAIL_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}@example.com", prefix, nanos, seq)
}

pub async fn register(
    server: &TestServer,
    client: &reqwest::Client,
    name: &str,
    email: &str,
) -> Result<Value> {
    let res = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "register failed: {}",
        res.status()
    );
    Ok(res.json().await?)
}

/// Register a fresh principal and log it in; returns (access token, id).
pub async fn register_and_login(
    server: &TestServer,
    client: &reqwest::Client,
    email: &str,
) -> Result<(String, String)> {
    let body = register(server, client, "Test User", email).await?;
    let id = body["data"]["id"].as_str().context("no id")?.to_string();
    let token = login(server, client, email).await?;
    Ok((token, id))
}

pub async fn login(
    server: &TestServer,
    client: &reqwest::Client,
    email: &str,
) -> Result<String> {
    let res = client
        .post(format!("{}/auth/login", server.base_url))
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
    let body: Value = res.json().await?;
    body["data"]["token"]
        .as_str()
        .map(|s| s.to_string())
        .context("no token in login response")
}

/// An access token for the allow-listed admin, registering it on first use.
pub async fn admin_token(server: &TestServer, client: &reqwest::Client) -> Result<String> {
    // Registration may 409 from an earlier test run; login decides
    let _ = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&json!({ "name": "Admin", "email": ADMIN_EMAIL, "password": PASSWORD }))
        .send()
        .await?;
    login(server, client, ADMIN_EMAIL).await
}
