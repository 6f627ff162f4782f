//! TNPlots API Server
//! 土地区画マーケットプレイスのバックエンドAPI

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod query;
pub mod whatsapp;
pub mod wizard;

use config::AdminCredentials;
use db::DbPool;

/// 全ハンドラで共有する状態
pub struct AppState {
    pub db: DbPool,
    pub media_dir: PathBuf,
    pub public_base_url: String,
    pub admin: AdminCredentials,
}

/// ルーター構築
pub fn app(state: Arc<AppState>) -> Router {
    let media_service = ServeDir::new(&state.media_dir);

    Router::new()
        .route("/api/health", get(health_check))
        .route(
            "/api/plots",
            get(handlers::plots::list_plots).post(handlers::plots::create_plot),
        )
        .route("/api/plots/search", get(handlers::plots::search_plots))
        .route("/api/plots/:plot_id", get(handlers::plots::get_plot))
        .route("/api/uploads", post(handlers::uploads::upload_image))
        .route(
            "/api/submissions/validate",
            post(handlers::submissions::validate_step),
        )
        .route("/api/submissions", post(handlers::submissions::submit_listing))
        .route("/api/admin/login", post(handlers::admin::login))
        .route("/api/admin/pending", get(handlers::admin::list_pending))
        .route("/api/admin/approve", post(handlers::admin::approve_plot))
        .route("/api/admin/reject", post(handlers::admin::reject_plot))
        .nest_service("/media", media_service)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 写真1枚(5MB) + 余裕
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ========================================
// Health Check
// ========================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// ヘルスチェック
async fn health_check() -> axum::response::Json<HealthResponse> {
    axum::response::Json(HealthResponse {
        status: "ok".to_string(),
        service: "tnplots-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
