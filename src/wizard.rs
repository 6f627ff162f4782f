//! Submission Wizard State Machine
//! 6ステップの出品フォームをステップ単位で検証しながら進める
//!
//! ステップは直線で分岐なし: BasicInfo → PlotDetails → Features →
//! Photos → Contact → Review。"next" は該当ステップのみ検証して進み、
//! "back" は無条件で戻る（入力済みデータは保持）。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::category;

/// 1枚あたりの画像サイズ上限 (5 MiB)
pub const MAX_PHOTO_BYTES: u64 = 5 * 1024 * 1024;
/// 1出品あたりの画像枚数上限
pub const MAX_PHOTOS: usize = 8;

// ========================================
// Steps
// ========================================

/// Wizard のステップ（1始まりのインデックスと1対1対応）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    BasicInfo,
    PlotDetails,
    Features,
    Photos,
    Contact,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 6] = [
        WizardStep::BasicInfo,
        WizardStep::PlotDetails,
        WizardStep::Features,
        WizardStep::Photos,
        WizardStep::Contact,
        WizardStep::Review,
    ];

    /// 1始まりのステップ番号
    pub fn index(self) -> u8 {
        match self {
            WizardStep::BasicInfo => 1,
            WizardStep::PlotDetails => 2,
            WizardStep::Features => 3,
            WizardStep::Photos => 4,
            WizardStep::Contact => 5,
            WizardStep::Review => 6,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index.checked_sub(1)? as usize).copied()
    }

    /// 次のステップ（Review は終端）
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// 前のステップ（BasicInfo は先頭）
    pub fn prev(self) -> Option<Self> {
        Self::from_index(self.index().wrapping_sub(1))
    }
}

// ========================================
// Draft
// ========================================

/// 候補画像のメタデータ（バイナリ本体は別経路でアップロード済み）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPhoto {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Wizard が蓄積する出品ドラフト
///
/// 最終Submitまでサーバ側には保存されない。途中離脱したドラフトは破棄。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionDraft {
    // Basic Info
    pub title: Option<String>,
    pub category: Option<String>,
    pub village: Option<String>,
    pub taluk: Option<String>,
    pub district: Option<String>,
    pub survey_number: Option<String>,

    // Plot Details
    pub size_sqft: Option<f64>,
    pub size_cents: Option<f64>,
    pub total_price: Option<i64>,
    pub price_per_sqft: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_from_main_road: Option<f64>,
    pub road_width: Option<f64>,

    // Features（未選択は false）
    #[serde(default)]
    pub features: BTreeMap<String, bool>,

    // Photos
    #[serde(default)]
    pub photos: Vec<DraftPhoto>,

    // Contact
    pub seller_name: Option<String>,
    pub phone_number: Option<String>,
    pub whatsapp_number: Option<String>,
    pub email: Option<String>,
}

impl SubmissionDraft {
    /// Submit時に使うWhatsApp番号（未指定なら電話番号と同一扱い）
    pub fn effective_whatsapp_number(&self) -> Option<String> {
        self.whatsapp_number
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.phone_number.clone())
    }

    /// 画像バッチを追加する
    ///
    /// 不適合な画像（非画像・サイズ超過・枚数超過）は1枚ずつ弾き、
    /// 同じバッチ内の適合画像はそのまま受け入れる。
    pub fn add_photos(&mut self, batch: Vec<DraftPhoto>) -> Vec<PhotoRejection> {
        let mut rejections = Vec::new();

        for photo in batch {
            if !photo.content_type.starts_with("image/") {
                rejections.push(PhotoRejection {
                    file_name: photo.file_name,
                    reason: "is not an image file".to_string(),
                });
                continue;
            }
            if photo.size_bytes > MAX_PHOTO_BYTES {
                rejections.push(PhotoRejection {
                    file_name: photo.file_name,
                    reason: "is larger than 5MB".to_string(),
                });
                continue;
            }
            if self.photos.len() >= MAX_PHOTOS {
                rejections.push(PhotoRejection {
                    file_name: photo.file_name,
                    reason: "Maximum 8 photos allowed".to_string(),
                });
                continue;
            }
            self.photos.push(photo);
        }

        rejections
    }
}

/// バッチ追加で弾かれた画像
#[derive(Debug, Clone, Serialize)]
pub struct PhotoRejection {
    pub file_name: String,
    pub reason: String,
}

// ========================================
// Validation
// ========================================

/// フィールド名 → エラーメッセージ（表示順を安定させるためBTreeMap）
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.insert(field.to_string(), message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }
}

/// ステップ単位の検証
///
/// Review は新規の検証を持たず、全データステップの検証をまとめて返す。
pub fn validate_step(step: WizardStep, draft: &SubmissionDraft) -> ValidationErrors {
    match step {
        WizardStep::BasicInfo => validate_basic_info(draft),
        WizardStep::PlotDetails => validate_plot_details(draft),
        WizardStep::Features => ValidationErrors::default(),
        WizardStep::Photos => validate_photos(draft),
        WizardStep::Contact => validate_contact(draft),
        WizardStep::Review => {
            let mut errors = validate_basic_info(draft);
            errors.merge(validate_plot_details(draft));
            errors.merge(validate_photos(draft));
            errors.merge(validate_contact(draft));
            errors
        }
    }
}

fn validate_basic_info(draft: &SubmissionDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if is_blank(&draft.title) {
        errors.add("title", "Plot title is required");
    }
    if is_blank(&draft.village) {
        errors.add("village", "Village name is required");
    }
    if is_blank(&draft.district) {
        errors.add("district", "District is required");
    }
    match draft.category.as_deref() {
        None | Some("") => errors.add("category", "Category is required"),
        Some(c) if !category::is_valid(c) => errors.add("category", "Invalid category"),
        Some(_) => {}
    }

    errors
}

fn validate_plot_details(draft: &SubmissionDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if !draft.size_sqft.is_some_and(|v| v > 0.0) {
        errors.add("size_sqft", "Plot size is required");
    }
    if !draft.total_price.is_some_and(|v| v > 0) {
        errors.add("total_price", "Total price is required");
    }

    errors
}

fn validate_photos(draft: &SubmissionDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if draft.photos.is_empty() {
        errors.add("photos", "Please upload at least 1 photo");
    } else if draft.photos.len() > MAX_PHOTOS {
        errors.add("photos", "Maximum 8 photos allowed");
    } else {
        for photo in &draft.photos {
            if !photo.content_type.starts_with("image/") {
                errors.add("photos", &format!("{} is not an image file", photo.file_name));
                break;
            }
            if photo.size_bytes > MAX_PHOTO_BYTES {
                errors.add("photos", &format!("{} is larger than 5MB", photo.file_name));
                break;
            }
        }
    }

    errors
}

fn validate_contact(draft: &SubmissionDraft) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if is_blank(&draft.seller_name) {
        errors.add("seller_name", "Your name is required");
    }
    match draft.phone_number.as_deref() {
        None | Some("") => errors.add("phone_number", "Phone number is required"),
        Some(phone) if !is_valid_phone(phone) => {
            errors.add("phone_number", "Invalid phone number format")
        }
        Some(_) => {}
    }
    if let Some(email) = draft.email.as_deref() {
        if !email.is_empty() && !is_valid_email(email) {
            errors.add("email", "Invalid email format");
        }
    }

    errors
}

// ========================================
// Transitions
// ========================================

/// "next" アクション
///
/// 該当ステップを検証し、失敗時はエラーを返してステップは進めない。
/// 成功時は次のステップを返す（Review は終端なのでそのまま）。
/// PlotDetails を通過する際は price_per_sqft を導出して上書きする。
pub fn advance(draft: &mut SubmissionDraft, step: WizardStep) -> Result<WizardStep, ValidationErrors> {
    let errors = validate_step(step, draft);
    if !errors.is_empty() {
        return Err(errors);
    }

    if step == WizardStep::PlotDetails {
        if let (Some(size), Some(price)) = (draft.size_sqft, draft.total_price) {
            draft.price_per_sqft = Some(derive_price_per_sqft(price, size));
        }
    }

    Ok(step.next().unwrap_or(step))
}

/// "back" アクション（検証なし・データは保持）
pub fn back(step: WizardStep) -> WizardStep {
    step.prev().unwrap_or(step)
}

/// 単価の導出: 総額 ÷ 面積、四捨五入
pub fn derive_price_per_sqft(total_price: i64, size_sqft: f64) -> i64 {
    (total_price as f64 / size_sqft).round() as i64
}

// ========================================
// Helper Functions
// ========================================

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// 電話番号: 数字・空白・+・-・括弧のみ許可
fn is_valid_phone(phone: &str) -> bool {
    !phone.is_empty()
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
}

/// メール: local@domain.tld の素朴な形状チェック
fn is_valid_email(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let (Some(local), Some(domain)) = (parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() || local.contains(char::is_whitespace) {
        return false;
    }
    if domain.contains('@') || domain.contains(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(name: &str, content_type: &str, size_bytes: u64) -> DraftPhoto {
        DraftPhoto {
            file_name: name.to_string(),
            content_type: content_type.to_string(),
            size_bytes,
        }
    }

    fn complete_draft() -> SubmissionDraft {
        SubmissionDraft {
            title: Some("Premium Residential Plot in Cheyyar".to_string()),
            category: Some("residential".to_string()),
            village: Some("Cheyyar".to_string()),
            district: Some("Tiruvannamalai".to_string()),
            size_sqft: Some(2400.0),
            total_price: Some(1_200_000),
            photos: vec![photo("plot1.jpg", "image/jpeg", 120_000)],
            seller_name: Some("Rajesh Kumar".to_string()),
            phone_number: Some("+91 98765 43210".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn steps_are_linear() {
        assert_eq!(WizardStep::BasicInfo.next(), Some(WizardStep::PlotDetails));
        assert_eq!(WizardStep::Contact.next(), Some(WizardStep::Review));
        assert_eq!(WizardStep::Review.next(), None);
        assert_eq!(WizardStep::BasicInfo.prev(), None);
        assert_eq!(WizardStep::Review.prev(), Some(WizardStep::Contact));
        assert_eq!(WizardStep::from_index(1), Some(WizardStep::BasicInfo));
        assert_eq!(WizardStep::from_index(6), Some(WizardStep::Review));
        assert_eq!(WizardStep::from_index(0), None);
        assert_eq!(WizardStep::from_index(7), None);
    }

    #[test]
    fn empty_title_blocks_basic_info() {
        let mut draft = complete_draft();
        draft.title = None;

        let result = advance(&mut draft, WizardStep::BasicInfo);

        let errors = result.unwrap_err();
        assert_eq!(errors.errors.get("title").unwrap(), "Plot title is required");
    }

    #[test]
    fn whitespace_title_blocks_basic_info() {
        let mut draft = complete_draft();
        draft.title = Some("   ".to_string());

        assert!(advance(&mut draft, WizardStep::BasicInfo).is_err());
    }

    #[test]
    fn unknown_category_blocks_basic_info() {
        let mut draft = complete_draft();
        draft.category = Some("industrial".to_string());

        let errors = advance(&mut draft, WizardStep::BasicInfo).unwrap_err();
        assert!(errors.errors.contains_key("category"));
    }

    #[test]
    fn advancing_plot_details_derives_price_per_sqft() {
        let mut draft = complete_draft();
        draft.price_per_sqft = Some(999); // 古い値は上書きされる

        let next = advance(&mut draft, WizardStep::PlotDetails).unwrap();

        assert_eq!(next, WizardStep::Features);
        assert_eq!(draft.price_per_sqft, Some(500));
    }

    #[test]
    fn zero_size_blocks_plot_details() {
        let mut draft = complete_draft();
        draft.size_sqft = Some(0.0);

        let errors = advance(&mut draft, WizardStep::PlotDetails).unwrap_err();
        assert!(errors.errors.contains_key("size_sqft"));
    }

    #[test]
    fn features_step_has_no_required_fields() {
        let mut draft = SubmissionDraft::default();
        assert_eq!(advance(&mut draft, WizardStep::Features).unwrap(), WizardStep::Photos);
    }

    #[test]
    fn zero_photos_blocks_photos_step() {
        let mut draft = complete_draft();
        draft.photos.clear();

        let errors = advance(&mut draft, WizardStep::Photos).unwrap_err();
        assert_eq!(errors.errors.get("photos").unwrap(), "Please upload at least 1 photo");
    }

    #[test]
    fn nine_photos_blocks_photos_step() {
        let mut draft = complete_draft();
        draft.photos = (0..9)
            .map(|i| photo(&format!("p{}.jpg", i), "image/jpeg", 1000))
            .collect();

        let errors = advance(&mut draft, WizardStep::Photos).unwrap_err();
        assert_eq!(errors.errors.get("photos").unwrap(), "Maximum 8 photos allowed");
    }

    #[test]
    fn photo_batch_is_accepted_partially() {
        let mut draft = SubmissionDraft::default();

        let rejections = draft.add_photos(vec![
            photo("ok.jpg", "image/jpeg", 1000),
            photo("doc.pdf", "application/pdf", 1000),
            photo("big.png", "image/png", MAX_PHOTO_BYTES + 1),
            photo("ok2.png", "image/png", MAX_PHOTO_BYTES),
        ]);

        assert_eq!(draft.photos.len(), 2);
        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].file_name, "doc.pdf");
        assert_eq!(rejections[0].reason, "is not an image file");
        assert_eq!(rejections[1].file_name, "big.png");
        assert_eq!(rejections[1].reason, "is larger than 5MB");
    }

    #[test]
    fn photo_batch_overflow_rejects_only_excess() {
        let mut draft = SubmissionDraft::default();
        for i in 0..7 {
            draft.photos.push(photo(&format!("p{}.jpg", i), "image/jpeg", 1000));
        }

        let rejections = draft.add_photos(vec![
            photo("eighth.jpg", "image/jpeg", 1000),
            photo("ninth.jpg", "image/jpeg", 1000),
        ]);

        assert_eq!(draft.photos.len(), 8);
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].file_name, "ninth.jpg");
        assert_eq!(rejections[0].reason, "Maximum 8 photos allowed");
    }

    #[test]
    fn contact_rejects_bad_phone_and_email() {
        let mut draft = complete_draft();
        draft.phone_number = Some("98765abc".to_string());
        draft.email = Some("not-an-email".to_string());

        let errors = advance(&mut draft, WizardStep::Contact).unwrap_err();
        assert_eq!(errors.errors.get("phone_number").unwrap(), "Invalid phone number format");
        assert_eq!(errors.errors.get("email").unwrap(), "Invalid email format");
    }

    #[test]
    fn contact_accepts_formatted_phone_and_email() {
        let mut draft = complete_draft();
        draft.phone_number = Some("+91 (98765) 43-210".to_string());
        draft.email = Some("seller@example.com".to_string());

        assert_eq!(advance(&mut draft, WizardStep::Contact).unwrap(), WizardStep::Review);
    }

    #[test]
    fn back_never_validates_or_discards() {
        let draft = SubmissionDraft::default();

        assert_eq!(back(WizardStep::Contact), WizardStep::Photos);
        assert_eq!(back(WizardStep::BasicInfo), WizardStep::BasicInfo);
        // back はドラフトに触れない
        assert!(draft.title.is_none());
    }

    #[test]
    fn review_validates_everything() {
        let mut draft = SubmissionDraft::default();

        let errors = advance(&mut draft, WizardStep::Review).unwrap_err();
        assert!(errors.errors.contains_key("title"));
        assert!(errors.errors.contains_key("size_sqft"));
        assert!(errors.errors.contains_key("photos"));
        assert!(errors.errors.contains_key("phone_number"));
    }

    #[test]
    fn whatsapp_number_falls_back_to_phone() {
        let mut draft = complete_draft();
        draft.whatsapp_number = None;
        assert_eq!(
            draft.effective_whatsapp_number().as_deref(),
            Some("+91 98765 43210")
        );

        draft.whatsapp_number = Some("9000000000".to_string());
        assert_eq!(draft.effective_whatsapp_number().as_deref(), Some("9000000000"));
    }
}
