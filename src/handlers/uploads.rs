//! Uploads API Handlers
//! /api/uploads エンドポイント - 画像の受け取りとローカル保存
//!
//! クライアント側のWizardが同じ制限で事前に弾くが、ここでも
//! サイズ・種別を検証する（二重の防衛線）。保存した画像は /media
//! 以下で静的配信される。

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::wizard::MAX_PHOTO_BYTES;
use crate::AppState;

/// サムネイルの上限サイズ（これより大きい画像のみ縮小）
const THUMB_MAX_WIDTH: u32 = 1200;
const THUMB_MAX_HEIGHT: u32 = 800;

// ========================================
// Response Types
// ========================================

#[derive(serde::Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub public_id: String,
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

// ========================================
// Errors
// ========================================

/// 画像保存まわりの失敗
#[derive(Debug, Error)]
enum MediaStoreError {
    #[error("file is not a decodable image")]
    UnsupportedFormat,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ========================================
// Handlers
// ========================================

/// POST /api/uploads - 画像アップロード（Multipart・1リクエスト1枚）
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut original_filename: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            original_filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| {
                        error_response(StatusCode::BAD_REQUEST, format!("File read error: {}", e))
                    })?
                    .to_vec(),
            );
        }
    }

    let file_data = file_data.ok_or_else(|| {
        error_response(StatusCode::BAD_REQUEST, "No file provided".to_string())
    })?;

    // 種別チェック
    let content_type = content_type.unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "File must be an image".to_string(),
        ));
    }

    // サイズチェック (5MB)
    if file_data.len() as u64 > MAX_PHOTO_BYTES {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "File size must be less than 5MB".to_string(),
        ));
    }

    let extension = original_filename
        .as_deref()
        .and_then(|f| f.rsplit('.').next())
        .unwrap_or("jpg")
        .to_lowercase();

    let stored = store_image(&state.media_dir, &file_data, &extension)
        .await
        .map_err(|e| match e {
            MediaStoreError::UnsupportedFormat => error_response(
                StatusCode::BAD_REQUEST,
                "File must be an image".to_string(),
            ),
            MediaStoreError::Io(e) => {
                warn!("Image store failed: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to upload image".to_string(),
                )
            }
        })?;

    let url = format!("{}/media/plots/{}", state.public_base_url, stored.filename);

    info!("Image uploaded: public_id={}, bytes={}", stored.public_id, file_data.len());

    Ok(Json(UploadResponse {
        success: true,
        url,
        public_id: stored.public_id,
    }))
}

// ========================================
// Helper Functions
// ========================================

struct StoredImage {
    filename: String,
    public_id: String,
}

/// 画像本体とサムネイルをディスクに保存する
///
/// ファイル名は内容のSHA256先頭16桁（同一画像の重複保存は上書きで収束）。
async fn store_image(
    media_dir: &Path,
    data: &[u8],
    extension: &str,
) -> Result<StoredImage, MediaStoreError> {
    // デコードできないものは画像として扱わない
    let decoded = image::load_from_memory(data).map_err(|_| MediaStoreError::UnsupportedFormat)?;

    let digest = compute_sha256(data);
    let short_digest = &digest[..16];
    let filename = format!("{}.{}", short_digest, extension);

    let plots_dir = media_dir.join("plots");
    fs::create_dir_all(&plots_dir).await?;

    let target_path = plots_dir.join(&filename);
    let mut file = fs::File::create(&target_path).await?;
    file.write_all(data).await?;

    // サムネイル生成はベストエフォート（失敗しても本体は有効）
    if let Err(e) = write_thumbnail(&plots_dir, short_digest, extension, &decoded) {
        warn!("Thumbnail generation failed: {}: {}", filename, e);
    }

    Ok(StoredImage {
        filename,
        public_id: format!("plots/{}", short_digest),
    })
}

/// 1200x800 に収まるサムネイルを保存（cover.jpg → cover_thumb.jpg の命名）
fn write_thumbnail(
    plots_dir: &Path,
    short_digest: &str,
    extension: &str,
    decoded: &image::DynamicImage,
) -> Result<(), image::ImageError> {
    let thumb = if decoded.width() > THUMB_MAX_WIDTH || decoded.height() > THUMB_MAX_HEIGHT {
        decoded.thumbnail(THUMB_MAX_WIDTH, THUMB_MAX_HEIGHT)
    } else {
        decoded.clone()
    };

    let thumb_path = plots_dir.join(format!("{}_thumb.{}", short_digest, extension));
    thumb.save(thumb_path)
}

fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("API Error: {}", message);
    (status, Json(ErrorResponse { success: false, error: message }))
}
