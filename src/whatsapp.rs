//! WhatsApp Deep Link
//! 問い合わせメッセージ付き wa.me リンクの生成（純粋関数・副作用なし）

use serde::{Deserialize, Serialize};

/// インド国番号。番号が既にこのプレフィックスで始まっていなければ付与する。
const COUNTRY_CODE: &str = "91";

/// メッセージテンプレートの言語
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ta,
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

/// リンク生成の入力一式
#[derive(Debug, Clone)]
pub struct WhatsAppMessageParams {
    pub phone: String,
    pub plot_id: String,
    pub plot_title: String,
    pub price: i64,
    pub location: String,
    pub language: Language,
}

/// 問い合わせ用のWhatsAppディープリンクを生成する
///
/// 同じ入力に対して常に同じURL文字列を返す。
pub fn generate_whatsapp_url(params: &WhatsAppMessageParams) -> String {
    // 数字以外を除去
    let clean_phone: String = params.phone.chars().filter(|c| c.is_ascii_digit()).collect();

    // 国番号がなければ付与
    let phone_with_country_code = if clean_phone.starts_with(COUNTRY_CODE) {
        clean_phone
    } else {
        format!("{}{}", COUNTRY_CODE, clean_phone)
    };

    let price_in_lakhs = format_lakhs(params.price);

    let message = match params.language {
        Language::En => format!(
            "Hi, I'm interested in the plot listed on TNPlots:\n\nPlot ID: {}\nTitle: {}\nPrice: ₹{} Lakhs\nLocation: {}\n\nCould you share more details?",
            params.plot_id, params.plot_title, price_in_lakhs, params.location
        ),
        Language::Ta => format!(
            "வணக்கம், TNPlots இல் கண்ட நிலம் குறித்து மேலும் விவரங்கள் தெரிந்து கொள்ள விரும்புகிறேன்:\n\nID: {}\nதலைப்பு: {}\nவிலை: ₹{} லட்சம்\nஇடம்: {}\n\nமேலும் விவரங்கள் தரமுடியுமா?",
            params.plot_id, params.plot_title, price_in_lakhs, params.location
        ),
    };

    format!(
        "https://wa.me/{}?text={}",
        phone_with_country_code,
        urlencoding::encode(&message)
    )
}

/// 物件ページ共有用のWhatsAppリンク（宛先なし）
pub fn generate_share_whatsapp_url(plot_url: &str, plot_title: &str) -> String {
    let message = format!("Check out this plot on TNPlots: {}\n{}", plot_title, plot_url);
    format!("https://wa.me/?text={}", urlencoding::encode(&message))
}

/// 表示用の電話番号フォーマット（例: "+91 98765 43210"）
pub fn format_phone_number(phone: &str) -> String {
    let cleaned: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if cleaned.len() == 10 {
        return format!("+91 {} {}", &cleaned[..5], &cleaned[5..]);
    }
    if cleaned.len() == 12 && cleaned.starts_with(COUNTRY_CODE) {
        return format!("+91 {} {}", &cleaned[2..7], &cleaned[7..]);
    }

    phone.to_string()
}

/// 価格をラク単位（1ラク = 10万）の小数2桁で整形
fn format_lakhs(price: i64) -> String {
    format!("{:.2}", price as f64 / 100_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> WhatsAppMessageParams {
        WhatsAppMessageParams {
            phone: "9876543210".to_string(),
            plot_id: "p1".to_string(),
            plot_title: "Plot A".to_string(),
            price: 1_200_000,
            location: "Cheyyar".to_string(),
            language: Language::En,
        }
    }

    #[test]
    fn url_is_deterministic() {
        let first = generate_whatsapp_url(&params());
        let second = generate_whatsapp_url(&params());
        assert_eq!(first, second);
    }

    #[test]
    fn country_code_is_prepended_once() {
        let url = generate_whatsapp_url(&params());
        assert!(url.starts_with("https://wa.me/919876543210?text="));

        let mut already_prefixed = params();
        already_prefixed.phone = "919876543210".to_string();
        let url = generate_whatsapp_url(&already_prefixed);
        assert!(url.starts_with("https://wa.me/919876543210?text="));
    }

    #[test]
    fn non_digits_are_stripped_from_phone() {
        let mut formatted = params();
        formatted.phone = "+91 (98765) 43-210".to_string();
        let url = generate_whatsapp_url(&formatted);
        assert!(url.starts_with("https://wa.me/919876543210?text="));
    }

    #[test]
    fn price_renders_in_lakhs_with_two_decimals() {
        let url = generate_whatsapp_url(&params());
        // 1,200,000 → "12.00"（URLエンコード後のメッセージに含まれる）
        assert!(url.contains("12.00"));
        assert!(url.contains(urlencoding::encode("₹12.00 Lakhs").as_ref()));
    }

    #[test]
    fn english_message_embeds_all_fields() {
        let url = generate_whatsapp_url(&params());
        assert!(url.contains(urlencoding::encode("Plot ID: p1").as_ref()));
        assert!(url.contains(urlencoding::encode("Title: Plot A").as_ref()));
        assert!(url.contains(urlencoding::encode("Location: Cheyyar").as_ref()));
    }

    #[test]
    fn tamil_variant_is_deterministic_and_distinct() {
        let mut tamil = params();
        tamil.language = Language::Ta;
        let first = generate_whatsapp_url(&tamil);
        let second = generate_whatsapp_url(&tamil);
        assert_eq!(first, second);
        assert_ne!(first, generate_whatsapp_url(&params()));
        assert!(first.contains(urlencoding::encode("லட்சம்").as_ref()));
    }

    #[test]
    fn share_url_has_no_recipient() {
        let url = generate_share_whatsapp_url("https://tnplots.example/plots/p1", "Plot A");
        assert!(url.starts_with("https://wa.me/?text="));
        assert!(url.contains(urlencoding::encode("Plot A").as_ref()));
    }

    #[test]
    fn phone_formats_for_display() {
        assert_eq!(format_phone_number("9876543210"), "+91 98765 43210");
        assert_eq!(format_phone_number("919876543210"), "+91 98765 43210");
        assert_eq!(format_phone_number("+91 98765 43210"), "+91 98765 43210");
        // 想定外の長さはそのまま返す
        assert_eq!(format_phone_number("12345"), "12345");
    }
}
