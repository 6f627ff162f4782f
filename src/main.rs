use std::sync::Arc;
use tracing::info;

use tnplots_server::config::AppConfig;
use tnplots_server::{app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログ初期化
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env()?;

    // データベース初期化
    let pool = db::init_db(&db::db_url_for_path(&config.db_path)).await?;

    // 画像保存先を用意
    tokio::fs::create_dir_all(config.media_dir.join("plots")).await?;

    let state = Arc::new(AppState {
        db: pool,
        media_dir: config.media_dir.clone(),
        public_base_url: config.public_base_url.clone(),
        admin: config.admin.clone(),
    });

    let app = app(state);

    info!("🚀 TNPlots API Server listening on {}", config.listen_addr);
    info!("📦 Media dir: {}", config.media_dir.display());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
