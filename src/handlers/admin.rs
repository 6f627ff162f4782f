//! Admin API Handlers
//! /api/admin エンドポイント - ログインと出品審査ワークフロー
//!
//! 審査の遷移は pending → {active+approved, rejected+rejected} のみ。
//! どちらも終端で、決定済みのPlotを再審査する経路はない。

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::plots::plot_to_response;
use crate::models::{
    plot_status, verification_status, AdminSession, Plot, PlotResponse, DEFAULT_REJECT_REASON,
};
use crate::AppState;

/// セッショントークンの有効期間 (24時間)
const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// 管理セッションを渡すヘッダ名
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

// ========================================
// Request / Response Types
// ========================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub plot_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub plot_id: String,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct PendingListResponse {
    pub success: bool,
    pub plots: Vec<PlotResponse>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ReviewResponse {
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

/// POST /api/admin/login - 固定管理者の認証とトークン発行
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    if req.username != state.admin.username || req.password != state.admin.password {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials".to_string(),
        ));
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let token = Uuid::new_v4().to_string();
    let expires_at_ms = now_ms + SESSION_TTL_MS;

    sqlx::query(
        "INSERT INTO admin_sessions (token, created_at_ms, expires_at_ms) VALUES (?, ?, ?)",
    )
    .bind(&token)
    .bind(now_ms)
    .bind(expires_at_ms)
    .execute(&state.db)
    .await
    .map_err(|e| {
        warn!("Session insert failed: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to log in".to_string())
    })?;

    info!("Admin login: token issued");

    Ok(Json(LoginResponse {
        success: true,
        token,
        expires_at_ms,
    }))
}

/// GET /api/admin/pending - 審査待ちPlot一覧（新しい申請順）
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PendingListResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)
        .await
        .map_err(|(status, msg)| error_response(status, msg))?;

    let plots: Vec<Plot> = sqlx::query_as(
        "SELECT * FROM plots WHERE status = ? AND verification_status = ? ORDER BY submitted_at_ms DESC",
    )
    .bind(plot_status::PENDING)
    .bind(verification_status::PENDING)
    .fetch_all(&state.db)
    .await
    .map_err(|e| {
        warn!("Pending list failed: {}", e);
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch pending plots".to_string(),
        )
    })?;

    let mut responses = Vec::with_capacity(plots.len());
    for plot in &plots {
        responses.push(plot_to_response(&state, plot).await);
    }

    let total = responses.len();
    Ok(Json(PendingListResponse {
        success: true,
        plots: responses,
        total,
    }))
}

/// POST /api/admin/approve - 出品を承認して公開する
///
/// published_at は未設定の場合のみこの時点で記録する（set-once）。
pub async fn approve_plot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ReviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)
        .await
        .map_err(|(status, msg)| error_response(status, msg))?;

    let plot = fetch_pending_plot(&state, &req.plot_id).await?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    sqlx::query(r#"
        UPDATE plots SET
            status = ?,
            verification_status = ?,
            reviewed_at_ms = ?,
            published_at_ms = COALESCE(published_at_ms, ?)
        WHERE id = ?
    "#)
    .bind(plot_status::ACTIVE)
    .bind(verification_status::APPROVED)
    .bind(now_ms)
    .bind(now_ms)
    .bind(&plot.id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        warn!("Approve update failed: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to approve plot".to_string())
    })?;

    info!("Plot approved: plot_id={}", plot.id);

    review_response(&state, &plot.id).await
}

/// POST /api/admin/reject - 出品を却下する（理由は省略可）
pub async fn reject_plot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RejectRequest>,
) -> Result<Json<ReviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_admin(&state, &headers)
        .await
        .map_err(|(status, msg)| error_response(status, msg))?;

    let plot = fetch_pending_plot(&state, &req.plot_id).await?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());

    sqlx::query(r#"
        UPDATE plots SET
            status = ?,
            verification_status = ?,
            reviewed_at_ms = ?,
            review_notes = ?
        WHERE id = ?
    "#)
    .bind(plot_status::REJECTED)
    .bind(verification_status::REJECTED)
    .bind(now_ms)
    .bind(&reason)
    .bind(&plot.id)
    .execute(&state.db)
    .await
    .map_err(|e| {
        warn!("Reject update failed: {}", e);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to reject plot".to_string())
    })?;

    info!("Plot rejected: plot_id={}, reason={}", plot.id, reason);

    review_response(&state, &plot.id).await
}

// ========================================
// Session Guard
// ========================================

/// 管理セッションの検証
///
/// X-Admin-Token ヘッダのトークンが有効期限内であること。
pub async fn require_admin(
    state: &Arc<AppState>,
    headers: &HeaderMap,
) -> Result<(), (StatusCode, String)> {
    let token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Admin token required".to_string()))?;

    let session: Option<AdminSession> =
        sqlx::query_as("SELECT * FROM admin_sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&state.db)
            .await
            .map_err(|e| {
                warn!("Session lookup failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to verify session".to_string())
            })?;

    let session =
        session.ok_or((StatusCode::UNAUTHORIZED, "Invalid admin token".to_string()))?;

    let now_ms = chrono::Utc::now().timestamp_millis();
    if session.expires_at_ms <= now_ms {
        // 期限切れトークンは掃除しておく
        let _ = sqlx::query("DELETE FROM admin_sessions WHERE token = ?")
            .bind(&session.token)
            .execute(&state.db)
            .await;
        return Err((StatusCode::UNAUTHORIZED, "Admin session expired".to_string()));
    }

    Ok(())
}

// ========================================
// Helper Functions
// ========================================

/// 審査対象のPlotを取得する
///
/// 存在しなければ404、決定済みなら409（pendingのみ審査可能）。
async fn fetch_pending_plot(
    state: &Arc<AppState>,
    plot_id: &str,
) -> Result<Plot, (StatusCode, Json<ErrorResponse>)> {
    let plot: Option<Plot> = sqlx::query_as("SELECT * FROM plots WHERE id = ?")
        .bind(plot_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            warn!("Plot lookup failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch plot".to_string())
        })?;

    let plot = plot.ok_or_else(|| {
        error_response(StatusCode::NOT_FOUND, "Plot not found".to_string())
    })?;

    if plot.status != plot_status::PENDING {
        return Err(error_response(
            StatusCode::CONFLICT,
            format!("Plot already reviewed: status={}", plot.status),
        ));
    }

    Ok(plot)
}

async fn review_response(
    state: &Arc<AppState>,
    plot_id: &str,
) -> Result<Json<ReviewResponse>, (StatusCode, Json<ErrorResponse>)> {
    let plot: Plot = sqlx::query_as("SELECT * FROM plots WHERE id = ?")
        .bind(plot_id)
        .fetch_one(&state.db)
        .await
        .map_err(|e| {
            warn!("Plot reload failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch plot".to_string())
        })?;

    Ok(Json(ReviewResponse {
        success: true,
        plot: plot_to_response(state, &plot).await,
    }))
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("API Error: {}", message);
    (status, Json(ErrorResponse { success: false, error: message }))
}
