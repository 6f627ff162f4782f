//! Data Models
//! Plot, Seller, PlotImage などのデータ構造定義

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::whatsapp::{self, WhatsAppMessageParams};
use crate::wizard::SubmissionDraft;

// ========================================
// Status Constants
// ========================================

pub mod plot_status {
    pub const PENDING: &str = "pending";
    pub const ACTIVE: &str = "active";
    pub const REJECTED: &str = "rejected";
}

pub mod verification_status {
    pub const PENDING: &str = "pending";
    pub const APPROVED: &str = "approved";
    pub const REJECTED: &str = "rejected";
}

pub mod category {
    pub const RESIDENTIAL: &str = "residential";
    pub const AGRICULTURAL: &str = "agricultural";
    pub const COMMERCIAL: &str = "commercial";

    pub const ALL: [&str; 3] = [RESIDENTIAL, AGRICULTURAL, COMMERCIAL];

    pub fn is_valid(value: &str) -> bool {
        ALL.contains(&value)
    }
}

/// 却下理由が未入力だった場合の既定文言
pub const DEFAULT_REJECT_REASON: &str = "Submission rejected";

// ========================================
// Seller
// ========================================

/// Seller (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub whatsapp_number: Option<String>,
    pub email: Option<String>,
    pub created_at_ms: i64,
}

/// Seller 連絡先（API返却用サブセット）
#[derive(Debug, Clone, Serialize)]
pub struct SellerContact {
    pub name: String,
    pub phone_number: String,
    pub whatsapp_number: Option<String>,
}

impl SellerContact {
    pub fn from_seller(s: &Seller) -> Self {
        Self {
            name: s.name.clone(),
            phone_number: s.phone_number.clone(),
            whatsapp_number: s.whatsapp_number.clone(),
        }
    }
}

// ========================================
// Plot
// ========================================

/// Plot (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plot {
    pub id: String,
    pub title_en: String,
    pub title_ta: Option<String>,
    pub description_en: Option<String>,
    pub description_ta: Option<String>,
    pub category: String,
    pub village: String,
    pub taluk: String,
    pub district: String,
    pub state: String,
    pub survey_number: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_from_main_road: Option<f64>,
    pub road_width: Option<f64>,
    pub size_sqft: f64,
    pub size_cents: Option<f64>,
    pub total_price: i64,
    pub price_per_sqft: Option<i64>,
    pub is_negotiable: i64,
    pub features: Option<String>, // JSON: amenity名 → bool
    pub status: String,
    pub verification_status: String,
    pub is_featured: i64,
    pub view_count: i64,
    pub review_notes: Option<String>,
    pub seller_id: String,
    pub submitted_at_ms: Option<i64>,
    pub published_at_ms: Option<i64>,
    pub reviewed_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

/// Plot 直接作成リクエスト（管理系パス・シード投入用）
#[derive(Debug, Deserialize)]
pub struct CreatePlotRequest {
    pub title_en: String,
    pub title_ta: Option<String>,
    pub description_en: Option<String>,
    pub description_ta: Option<String>,
    pub category: String,
    pub village: String,
    #[serde(default)]
    pub taluk: String,
    pub district: String,
    #[serde(default = "default_state")]
    pub state: String,
    pub survey_number: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_from_main_road: Option<f64>,
    pub road_width: Option<f64>,
    pub size_sqft: f64,
    pub size_cents: Option<f64>,
    pub total_price: i64,
    pub price_per_sqft: Option<i64>,
    #[serde(default)]
    pub is_negotiable: bool,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default = "default_active_status")]
    pub status: String,
    #[serde(default)]
    pub is_featured: bool,
    pub seller_id: String,
}

fn default_state() -> String { "Tamil Nadu".to_string() }
fn default_active_status() -> String { plot_status::ACTIVE.to_string() }

/// Plot レスポンス（API返却用）
#[derive(Debug, Serialize)]
pub struct PlotResponse {
    pub id: String,
    pub title_en: String,
    pub title_ta: Option<String>,
    pub description_en: Option<String>,
    pub description_ta: Option<String>,
    pub category: String,
    pub village: String,
    pub taluk: String,
    pub district: String,
    pub state: String,
    pub survey_number: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_from_main_road: Option<f64>,
    pub road_width: Option<f64>,
    pub size_sqft: f64,
    pub size_cents: Option<f64>,
    pub total_price: i64,
    pub price_per_sqft: Option<i64>,
    pub is_negotiable: bool,
    pub features: BTreeMap<String, bool>,
    pub status: String,
    pub verification_status: String,
    pub is_featured: bool,
    pub view_count: i64,
    pub review_notes: Option<String>,
    pub submitted_at_ms: Option<i64>,
    pub published_at_ms: Option<i64>,
    pub reviewed_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub images: Vec<PlotImageResponse>,
    pub seller: Option<SellerContact>,
    /// 問い合わせ用WhatsAppディープリンク（Seller連絡先がある場合のみ）
    pub whatsapp_url: Option<String>,
}

impl PlotResponse {
    pub fn from_parts(plot: &Plot, images: &[PlotImage], seller: Option<&Seller>) -> Self {
        let features: BTreeMap<String, bool> = plot
            .features
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();

        let whatsapp_url = seller.map(|s| {
            whatsapp::generate_whatsapp_url(&WhatsAppMessageParams {
                phone: s.whatsapp_number.clone().unwrap_or_else(|| s.phone_number.clone()),
                plot_id: plot.id.clone(),
                plot_title: plot.title_en.clone(),
                price: plot.total_price,
                location: plot.village.clone(),
                language: whatsapp::Language::En,
            })
        });

        Self {
            id: plot.id.clone(),
            title_en: plot.title_en.clone(),
            title_ta: plot.title_ta.clone(),
            description_en: plot.description_en.clone(),
            description_ta: plot.description_ta.clone(),
            category: plot.category.clone(),
            village: plot.village.clone(),
            taluk: plot.taluk.clone(),
            district: plot.district.clone(),
            state: plot.state.clone(),
            survey_number: plot.survey_number.clone(),
            latitude: plot.latitude,
            longitude: plot.longitude,
            distance_from_main_road: plot.distance_from_main_road,
            road_width: plot.road_width,
            size_sqft: plot.size_sqft,
            size_cents: plot.size_cents,
            total_price: plot.total_price,
            price_per_sqft: plot.price_per_sqft,
            is_negotiable: plot.is_negotiable == 1,
            features,
            status: plot.status.clone(),
            verification_status: plot.verification_status.clone(),
            is_featured: plot.is_featured == 1,
            view_count: plot.view_count,
            review_notes: plot.review_notes.clone(),
            submitted_at_ms: plot.submitted_at_ms,
            published_at_ms: plot.published_at_ms,
            reviewed_at_ms: plot.reviewed_at_ms,
            created_at_ms: plot.created_at_ms,
            images: images.iter().map(PlotImageResponse::from_image).collect(),
            seller: seller.map(SellerContact::from_seller),
            whatsapp_url,
        }
    }
}

// ========================================
// PlotImage
// ========================================

/// PlotImage (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlotImage {
    pub id: String,
    pub plot_id: String,
    pub url: String,
    pub public_id: String,
    pub display_order: i64,
    pub is_featured: i64,
    pub created_at_ms: i64,
}

/// PlotImage レスポンス（API返却用）
#[derive(Debug, Serialize)]
pub struct PlotImageResponse {
    pub url: String,
    pub public_id: String,
    pub display_order: i64,
    pub is_featured: bool,
}

impl PlotImageResponse {
    pub fn from_image(img: &PlotImage) -> Self {
        Self {
            url: img.url.clone(),
            public_id: img.public_id.clone(),
            display_order: img.display_order,
            is_featured: img.is_featured == 1,
        }
    }
}

// ========================================
// Submission
// ========================================

/// 最終Submitリクエスト
///
/// Wizard完走後のDraft一式 + アップロード済み画像URL（投稿順）。
#[derive(Debug, Deserialize)]
pub struct SubmitListingRequest {
    #[serde(flatten)]
    pub draft: SubmissionDraft,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Submitレスポンス
#[derive(Debug, Serialize)]
pub struct SubmitListingResponse {
    pub success: bool,
    pub plot_id: String,
}

// ========================================
// Admin Session
// ========================================

/// AdminSession (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminSession {
    pub token: String,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

// ========================================
// Helper Functions
// ========================================

/// Plot ID を生成（例: "PLOT_4R7N2K9A"）
pub fn generate_plot_id() -> String {
    let random_bytes: [u8; 5] = rand::thread_rng().gen();
    let encoded = base32::encode(base32::Alphabet::Crockford, &random_bytes);
    format!("PLOT_{}", &encoded[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_validation_accepts_known_values() {
        assert!(category::is_valid("residential"));
        assert!(category::is_valid("agricultural"));
        assert!(category::is_valid("commercial"));
        assert!(!category::is_valid("industrial"));
        assert!(!category::is_valid(""));
    }

    #[test]
    fn plot_id_has_fixed_shape() {
        let id = generate_plot_id();
        assert!(id.starts_with("PLOT_"));
        assert_eq!(id.len(), 13);
    }
}
