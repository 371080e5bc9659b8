use axum::{extract::Extension, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use tenet_api::auth::roles::RoleResolver;
use tenet_api::database::manager::DatabaseManager;
use tenet_api::handlers;
use tenet_api::middleware::{auth::jwt_auth_middleware, require_admin::require_admin_middleware};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = tenet_api::config::config();
    tracing::info!("Starting Tenet API in {:?} mode", config.environment);

    // The allow-list leaves ambient config exactly once, here, and travels
    // to both issuance sites as an injected value.
    let resolver = RoleResolver::new(config.security.admin_emails.iter().cloned());

    // Best-effort directory bootstrap; health stays degraded until the
    // database is reachable.
    match DatabaseManager::pool().await {
        Ok(pool) => {
            if let Err(e) = tenet_api::database::bootstrap::init_directory(&pool).await {
                tracing::warn!("directory bootstrap failed: {}", e);
            }
        }
        Err(e) => tracing::warn!("database not reachable at startup: {}", e),
    }

    let app = app(resolver);

    // Allow tests or deployments to override port via env
    let port = std::env::var("TENET_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Tenet API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(resolver: RoleResolver) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Protected API (JWT)
        .merge(protected_routes())
        // Admin API (JWT + effective role admin)
        .merge(admin_routes())
        // Global middleware
        .layer(Extension(resolver));

    if tenet_api::config::config().security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router {
    use axum::routing::post;
    use handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
}

fn protected_routes() -> Router {
    use handlers::protected::{auth, data};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        // Collection-level operations
        .route("/api/data/:kind", get(data::list).post(data::create))
        // Record-level operations
        .route(
            "/api/data/:kind/:id",
            get(data::get)
                .put(data::replace)
                .patch(data::patch)
                .delete(data::delete),
        )
        .route_layer(axum::middleware::from_fn(jwt_auth_middleware))
}

fn admin_routes() -> Router {
    use axum::routing::patch;
    use handlers::admin::{data, principals, stats};

    Router::new()
        .route("/api/admin/stats", get(stats::get))
        .route("/api/admin/data/:kind", get(data::list_all))
        .route("/api/admin/principals", get(principals::rollup))
        .route(
            "/api/admin/principals/:id",
            patch(principals::change_role).delete(principals::delete),
        )
        // jwt runs first, then the admin gate
        .route_layer(axum::middleware::from_fn(require_admin_middleware))
        .route_layer(axum::middleware::from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Tenet API",
            "version": version,
            "description": "Multi-tenant inventory backend with per-principal data partitions",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/register, /auth/login, /auth/refresh (public)",
                "whoami": "/api/auth/whoami (protected)",
                "data": "/api/data/:kind[/:id] (protected)",
                "admin": "/api/admin/* (admin only)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
