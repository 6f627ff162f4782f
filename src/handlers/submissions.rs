//! Submissions API Handlers
//! /api/submissions エンドポイント - Wizardドライバと最終Submit

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Seller, SubmitListingRequest, SubmitListingResponse};
use crate::wizard::{self, SubmissionDraft, ValidationErrors, WizardStep, MAX_PHOTOS};
use crate::AppState;

// ========================================
// Request / Response Types
// ========================================

/// Wizardの操作種別
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardAction {
    #[default]
    Next,
    Back,
}

#[derive(Debug, Deserialize)]
pub struct ValidateStepRequest {
    /// 1始まりのステップ番号（1=BasicInfo .. 6=Review）
    pub step: u8,
    #[serde(default)]
    pub action: WizardAction,
    pub draft: SubmissionDraft,
}

#[derive(Serialize)]
pub struct ValidateStepResponse {
    pub success: bool,
    pub step: u8,
    pub next_step: u8,
    /// 導出値（price_per_sqft）反映後のドラフト
    pub draft: SubmissionDraft,
}

/// フィールド単位の検証エラー
#[derive(Serialize)]
pub struct ValidationFailureResponse {
    pub success: bool,
    pub errors: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

// ========================================
// Handlers
// ========================================

/// POST /api/submissions/validate - Wizardドライバ
///
/// "next" は該当ステップを検証して進める（失敗時は422でフィールド別
/// エラーを返し、ステップは進まない）。"back" は検証なしで戻る。
pub async fn validate_step(
    Json(req): Json<ValidateStepRequest>,
) -> Result<Json<ValidateStepResponse>, Response> {
    let step = WizardStep::from_index(req.step).ok_or_else(|| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid step: {}", req.step))
            .into_response()
    })?;

    let mut draft = req.draft;

    let next_step = match req.action {
        WizardAction::Back => wizard::back(step),
        WizardAction::Next => wizard::advance(&mut draft, step).map_err(validation_failure)?,
    };

    Ok(Json(ValidateStepResponse {
        success: true,
        step: step.index(),
        next_step: next_step.index(),
        draft,
    }))
}

/// POST /api/submissions - 最終Submit
///
/// Wizard完走後のドラフトを pending の Plot として永続化する。
/// Sellerは電話番号で find-or-create。画像行は親行の後に1件ずつ挿入し、
/// 途中で失敗した分はログに残してスキップする（補償はしない）。
pub async fn submit_listing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitListingRequest>,
) -> Result<Json<SubmitListingResponse>, Response> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let draft = &req.draft;

    // データを持つ全ステップを再検証（信頼できるのはサーバ側の判定のみ）
    let mut errors = ValidationErrors::default();
    errors.merge(wizard::validate_step(WizardStep::BasicInfo, draft));
    errors.merge(wizard::validate_step(WizardStep::PlotDetails, draft));
    errors.merge(wizard::validate_step(WizardStep::Contact, draft));
    if req.image_urls.is_empty() {
        errors.add("image_urls", "Please upload at least 1 photo");
    } else if req.image_urls.len() > MAX_PHOTOS {
        errors.add("image_urls", "Maximum 8 photos allowed");
    }
    if !errors.is_empty() {
        return Err(validation_failure(errors));
    }

    // Seller find-or-create（電話番号が自然キー。ユニーク制約により
    // 同時Submitでも二重登録にはならない）
    let seller = find_or_create_seller(&state, draft, now_ms)
        .await
        .map_err(|e| {
            warn!("Seller upsert failed: {}", e);
            submit_failed()
        })?;

    let plot_id = crate::models::generate_plot_id();
    let price_per_sqft = draft.price_per_sqft.unwrap_or_else(|| {
        wizard::derive_price_per_sqft(draft.total_price.unwrap_or(0), draft.size_sqft.unwrap_or(1.0))
    });
    let features_json =
        serde_json::to_string(&draft.features).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(r#"
        INSERT INTO plots (
            id, title_en, category, village, taluk, district, survey_number,
            latitude, longitude, distance_from_main_road, road_width,
            size_sqft, size_cents, total_price, price_per_sqft,
            features, status, verification_status,
            seller_id, submitted_at_ms, created_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 'pending', ?, ?, ?)
    "#)
    .bind(&plot_id)
    .bind(draft.title.clone().unwrap_or_default())
    .bind(draft.category.clone().unwrap_or_default())
    .bind(draft.village.clone().unwrap_or_default())
    .bind(draft.taluk.clone().unwrap_or_default())
    .bind(draft.district.clone().unwrap_or_default())
    .bind(&draft.survey_number)
    .bind(draft.latitude)
    .bind(draft.longitude)
    .bind(draft.distance_from_main_road)
    .bind(draft.road_width)
    .bind(draft.size_sqft.unwrap_or(0.0))
    .bind(draft.size_cents)
    .bind(draft.total_price.unwrap_or(0))
    .bind(price_per_sqft)
    .bind(&features_json)
    .bind(&seller.id)
    .bind(now_ms)
    .bind(now_ms)
    .execute(&state.db)
    .await
    .map_err(|e| {
        warn!("Plot insert failed: {}", e);
        submit_failed()
    })?;

    // 画像行の作成。親行は存在するので、個々の失敗は許容して続行する。
    for (index, url) in req.image_urls.iter().enumerate() {
        let result = sqlx::query(r#"
            INSERT INTO plot_images (id, plot_id, url, public_id, display_order, is_featured, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#)
        .bind(Uuid::new_v4().to_string())
        .bind(&plot_id)
        .bind(url)
        .bind(format!("tnplots/{}_{}", plot_id, index))
        .bind(index as i64)
        .bind((index == 0) as i64)
        .bind(now_ms)
        .execute(&state.db)
        .await;

        if let Err(e) = result {
            warn!("Image insert failed: plot_id={}, index={}, {}", plot_id, index, e);
        }
    }

    info!(
        "Listing submitted: plot_id={}, seller={}, images={}",
        plot_id,
        seller.id,
        req.image_urls.len()
    );

    Ok(Json(SubmitListingResponse {
        success: true,
        plot_id,
    }))
}

// ========================================
// Helper Functions
// ========================================

/// 電話番号でSellerを検索し、なければ作成する
async fn find_or_create_seller(
    state: &Arc<AppState>,
    draft: &SubmissionDraft,
    now_ms: i64,
) -> Result<Seller, sqlx::Error> {
    let phone = draft.phone_number.clone().unwrap_or_default();

    sqlx::query(r#"
        INSERT INTO sellers (id, name, phone_number, whatsapp_number, email, created_at_ms)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(phone_number) DO NOTHING
    "#)
    .bind(Uuid::new_v4().to_string())
    .bind(draft.seller_name.clone().unwrap_or_default())
    .bind(&phone)
    .bind(draft.effective_whatsapp_number())
    .bind(&draft.email)
    .bind(now_ms)
    .execute(&state.db)
    .await?;

    sqlx::query_as("SELECT * FROM sellers WHERE phone_number = ?")
        .bind(&phone)
        .fetch_one(&state.db)
        .await
}

fn validation_failure(errors: ValidationErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ValidationFailureResponse {
            success: false,
            errors: errors.errors,
        }),
    )
        .into_response()
}

fn submit_failed() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to submit listing".to_string(),
    )
    .into_response()
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("API Error: {}", message);
    (status, Json(ErrorResponse { success: false, error: message }))
}
