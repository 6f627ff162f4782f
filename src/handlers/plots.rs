//! Plots API Handlers
//! /api/plots エンドポイント - 物件の検索・閲覧・直接作成

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::handlers::admin::require_admin;
use crate::models::{
    self, plot_status, verification_status, CreatePlotRequest, Plot, PlotImage, PlotResponse,
    Seller,
};
use crate::query::{self, PlotFilter, PlotPage, Visibility, DEFAULT_PAGE_SIZE};
use crate::wizard;
use crate::AppState;

// ========================================
// Response Types
// ========================================

#[derive(Serialize)]
pub struct PlotListResponse {
    pub success: bool,
    pub plots: Vec<PlotResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
pub struct PlotDetailResponse {
    pub success: bool,
    pub plot: PlotResponse,
}

#[derive(Serialize)]
pub struct PlotCreateResponse {
    pub success: bool,
    pub plot: PlotResponse,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

// ========================================
// Handlers
// ========================================

/// GET /api/plots/search - 購入者向け検索（active かつ approved のみ）
///
/// ストレージ障害時はエラーではなく空ページを返す（フェイルソフト）。
pub async fn search_plots(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PlotFilter>,
) -> Json<PlotListResponse> {
    // 購入者向けは1ページ12件で固定
    let page = query::fetch_page(&state.db, &filter, Visibility::Public, DEFAULT_PAGE_SIZE)
        .await
        .unwrap_or_else(|e| {
            warn!("Plot search failed: {}", e);
            PlotPage::empty(filter.page(), DEFAULT_PAGE_SIZE)
        });

    Json(page_to_response(&state, page).await)
}

/// GET /api/plots - 汎用一覧（active のみ・per_page 上書き可）
pub async fn list_plots(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<PlotFilter>,
) -> Json<PlotListResponse> {
    let per_page = filter.per_page();
    let page = query::fetch_page(&state.db, &filter, Visibility::ActiveOnly, per_page)
        .await
        .unwrap_or_else(|e| {
            warn!("Plot list failed: {}", e);
            PlotPage::empty(filter.page(), per_page)
        });

    Json(page_to_response(&state, page).await)
}

/// GET /api/plots/:plot_id - 物件詳細（公開中のもののみ）
pub async fn get_plot(
    State(state): State<Arc<AppState>>,
    Path(plot_id): Path<String>,
) -> Result<Json<PlotDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let plot: Option<Plot> = sqlx::query_as(
        "SELECT * FROM plots WHERE id = ? AND status = ? AND verification_status = ?",
    )
    .bind(&plot_id)
    .bind(plot_status::ACTIVE)
    .bind(verification_status::APPROVED)
    .fetch_optional(&state.db)
    .await
    .unwrap_or_else(|e| {
        // 読み取り系は生のエラーを返さない
        warn!("Plot detail query failed: {}", e);
        None
    });

    let plot = plot.ok_or_else(|| {
        error_response(StatusCode::NOT_FOUND, "Plot not found".to_string())
    })?;

    // 閲覧カウンタはベストエフォート（失敗しても詳細は返す）
    if let Err(e) = sqlx::query("UPDATE plots SET view_count = view_count + 1 WHERE id = ?")
        .bind(&plot_id)
        .execute(&state.db)
        .await
    {
        warn!("View count update failed: plot_id={}, {}", plot_id, e);
    }

    Ok(Json(PlotDetailResponse {
        success: true,
        plot: plot_to_response(&state, &plot).await,
    }))
}

/// POST /api/plots - Plot直接作成（管理セッション必須・シード投入用）
///
/// active で作成された場合のみ published_at をこの時点で記録する。
pub async fn create_plot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreatePlotRequest>,
) -> Result<Json<PlotCreateResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers).await.map_err(|(status, msg)| {
        error_response(status, msg)
    })?;

    let now_ms = chrono::Utc::now().timestamp_millis();

    if !models::category::is_valid(&req.category) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid category: {}", req.category),
        ));
    }
    if req.status != plot_status::ACTIVE && req.status != plot_status::PENDING {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid status: {}", req.status),
        ));
    }

    // Seller存在チェック
    let seller_exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM sellers WHERE id = ?")
        .bind(&req.seller_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            warn!("DB error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create plot".to_string())
        })?;

    if seller_exists.is_none() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Seller not found: {}", req.seller_id),
        ));
    }

    let plot_id = models::generate_plot_id();
    let is_active = req.status == plot_status::ACTIVE;
    let verification = if is_active {
        verification_status::APPROVED
    } else {
        verification_status::PENDING
    };
    let published_at_ms = if is_active { Some(now_ms) } else { None };
    let price_per_sqft = req
        .price_per_sqft
        .unwrap_or_else(|| wizard::derive_price_per_sqft(req.total_price, req.size_sqft));
    let features_json = serde_json::to_string(&req.features).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(r#"
        INSERT INTO plots (
            id, title_en, title_ta, description_en, description_ta,
            category, village, taluk, district, state, survey_number,
            latitude, longitude, distance_from_main_road, road_width,
            size_sqft, size_cents, total_price, price_per_sqft, is_negotiable,
            features, status, verification_status, is_featured, view_count,
            seller_id, published_at_ms, created_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
    "#)
    .bind(&plot_id)
    .bind(&req.title_en)
    .bind(&req.title_ta)
    .bind(&req.description_en)
    .bind(&req.description_ta)
    .bind(&req.category)
    .bind(&req.village)
    .bind(&req.taluk)
    .bind(&req.district)
    .bind(&req.state)
    .bind(&req.survey_number)
    .bind(req.latitude)
    .bind(req.longitude)
    .bind(req.distance_from_main_road)
    .bind(req.road_width)
    .bind(req.size_sqft)
    .bind(req.size_cents)
    .bind(req.total_price)
    .bind(price_per_sqft)
    .bind(req.is_negotiable as i64)
    .bind(&features_json)
    .bind(&req.status)
    .bind(verification)
    .bind(req.is_featured as i64)
    .bind(&req.seller_id)
    .bind(published_at_ms)
    .bind(now_ms)
    .execute(&state.db)
    .await
    .map_err(|e| {
        warn!("DB error: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create plot".to_string())
    })?;

    info!("Plot created: plot_id={}, status={}", plot_id, req.status);

    let plot: Plot = sqlx::query_as("SELECT * FROM plots WHERE id = ?")
        .bind(&plot_id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| {
            warn!("DB error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create plot".to_string())
        })?;

    Ok(Json(PlotCreateResponse {
        success: true,
        plot: plot_to_response(&state, &plot).await,
    }))
}

// ========================================
// Helper Functions
// ========================================

/// PlotPage を画像・Seller連絡先込みのレスポンスに展開
async fn page_to_response(state: &Arc<AppState>, page: PlotPage) -> PlotListResponse {
    let mut plots = Vec::with_capacity(page.plots.len());
    for plot in &page.plots {
        plots.push(plot_to_response(state, plot).await);
    }

    PlotListResponse {
        success: true,
        plots,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
    }
}

/// 関連行（画像はギャラリー順・Seller連絡先）を読み込んで変換
///
/// 関連の読み取りに失敗しても本体は返す。
pub(crate) async fn plot_to_response(state: &Arc<AppState>, plot: &Plot) -> PlotResponse {
    let images: Vec<PlotImage> = sqlx::query_as(
        "SELECT * FROM plot_images WHERE plot_id = ? ORDER BY display_order ASC",
    )
    .bind(&plot.id)
    .fetch_all(&state.db)
    .await
    .unwrap_or_else(|e| {
        warn!("Image load failed: plot_id={}, {}", plot.id, e);
        Vec::new()
    });

    let seller: Option<Seller> = sqlx::query_as("SELECT * FROM sellers WHERE id = ?")
        .bind(&plot.seller_id)
        .fetch_optional(&state.db)
        .await
        .unwrap_or_else(|e| {
            warn!("Seller load failed: plot_id={}, {}", plot.id, e);
            None
        });

    PlotResponse::from_parts(plot, &images, seller.as_ref())
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("API Error: {}", message);
    (status, Json(ErrorResponse { success: false, error: message }))
}
