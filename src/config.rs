//! Server Configuration
//! 環境変数から読み込む設定

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

/// アプリケーション設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTPリッスンアドレス（例: "0.0.0.0:3000"）
    pub listen_addr: String,
    /// SQLiteデータベースファイルのパス
    pub db_path: String,
    /// アップロード画像の保存先ディレクトリ
    pub media_dir: PathBuf,
    /// 公開URLのベース（レスポンス内の画像URL生成に使用）
    pub public_base_url: String,
    /// 管理者認証情報（デフォルト値なし・必須）
    pub admin: AdminCredentials,
}

/// 管理者の固定認証情報
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AppConfig {
    /// 環境変数から設定を組み立てる
    ///
    /// ADMIN_USERNAME / ADMIN_PASSWORD は必須。未設定の場合は起動を中止する。
    pub fn from_env() -> Result<Self> {
        let listen_addr =
            env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let db_path = env::var("DB_PATH").unwrap_or_else(|_| "/data/tnplots/tnplots.db".to_string());
        let media_dir = PathBuf::from(
            env::var("MEDIA_DIR").unwrap_or_else(|_| "/data/tnplots/media".to_string()),
        );
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        // 末尾スラッシュはURL結合時に二重になるので落とす
        let public_base_url = public_base_url.trim_end_matches('/').to_string();

        let username = match env::var("ADMIN_USERNAME") {
            Ok(v) if !v.is_empty() => v,
            _ => bail!("ADMIN_USERNAME is not set"),
        };
        let password = match env::var("ADMIN_PASSWORD") {
            Ok(v) if !v.is_empty() => v,
            _ => bail!("ADMIN_PASSWORD is not set"),
        };

        Ok(Self {
            listen_addr,
            db_path,
            media_dir,
            public_base_url,
            admin: AdminCredentials { username, password },
        })
    }
}
