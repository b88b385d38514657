use std::sync::Arc;

use anyhow::{anyhow, Context};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use log::info;
use tower_http::cors::CorsLayer;

use datadesk::api_router::configure_api_routes;
use datadesk::config::AppConfig;
use datadesk::notify;
use datadesk::shared::state::AppState;
use datadesk::shared::utils::create_conn;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url).context("failed to build connection pool")?;

    {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().context("failed to get migration connection")?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| anyhow!("migrations failed: {e}"))?;
            Ok::<_, anyhow::Error>(())
        })
        .await??;
    }
    info!("database migrations are up to date");

    let notifier = notify::spawn(
        pool.clone(),
        config.email.clone(),
        config.server.base_url.clone(),
    );

    let state = Arc::new(AppState::new(pool, config.clone(), notifier));
    let app = configure_api_routes(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("datadesk listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
