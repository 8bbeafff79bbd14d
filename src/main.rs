use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use admin_dashboard::{
    auth::{bootstrap::init_providers, oauth::build_oauth_providers},
    config::AppConfig,
    db::{connection, dao::DaoContext},
    logging::init_tracing,
    middleware::{catch_panic_layer, json_error_middleware},
    routes::router,
    state::AppState,
    storage::build_store,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        eprintln!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().context("failed to load config")?;
    init_tracing(&cfg.logging.rust_log);

    let db_cfg = cfg
        .database
        .as_ref()
        .context("database config is required (APP_DATABASE__URL)")?;
    let auth_cfg = cfg
        .auth
        .as_ref()
        .context("auth config is required (APP_AUTH__JWT_SECRET and admin credentials)")?;

    let db = connection::connect(db_cfg).await?;
    let daos = DaoContext::new(&db);
    let auth_providers = init_providers(auth_cfg, &daos).await?;
    let oauth_providers = build_oauth_providers(&cfg.oauth)?;
    let storage = build_store(&cfg.storage)?;

    let addr: SocketAddr = format!("{}:{}", cfg.general.host, cfg.general.port)
        .parse()
        .context("invalid host/port")?;
    let state = AppState::new(cfg, db, auth_providers, oauth_providers, storage);

    let app = Router::new()
        .merge(router(Arc::clone(&state)))
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http());

    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
