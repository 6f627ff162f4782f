//! Database Module
//! SQLite を使用した plots/sellers/plot_images/admin_sessions の管理

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

/// データベース接続プール
pub type DbPool = Pool<Sqlite>;

/// データベースを初期化
pub async fn init_db(db_url: &str) -> Result<DbPool> {
    info!("Initializing database: {}", db_url);

    // 外部キー制約は全接続で有効にする（plot_images の ON DELETE CASCADE 用）
    let options = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // スキーマ作成
    create_schema(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// ファイルパスから接続URLを組み立てる
pub fn db_url_for_path(db_path: &str) -> String {
    format!("sqlite:{}?mode=rwc", db_path)
}

/// スキーマ作成
async fn create_schema(pool: &DbPool) -> Result<()> {
    // sellers テーブル（電話番号が自然キー）
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS sellers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone_number TEXT NOT NULL,
            whatsapp_number TEXT,
            email TEXT,
            created_at_ms INTEGER NOT NULL
        )
    "#)
    .execute(pool)
    .await?;

    // 同一電話番号のSellerは常に1件（find-or-create の前提）
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_sellers_phone ON sellers(phone_number)")
        .execute(pool)
        .await?;

    // plots テーブル
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS plots (
            id TEXT PRIMARY KEY,
            title_en TEXT NOT NULL,
            title_ta TEXT,
            description_en TEXT,
            description_ta TEXT,
            category TEXT NOT NULL,
            village TEXT NOT NULL,
            taluk TEXT NOT NULL DEFAULT '',
            district TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'Tamil Nadu',
            survey_number TEXT,
            latitude REAL,
            longitude REAL,
            distance_from_main_road REAL,
            road_width REAL,
            size_sqft REAL NOT NULL,
            size_cents REAL,
            total_price INTEGER NOT NULL,
            price_per_sqft INTEGER,
            is_negotiable INTEGER NOT NULL DEFAULT 0,
            features TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            verification_status TEXT NOT NULL DEFAULT 'pending',
            is_featured INTEGER NOT NULL DEFAULT 0,
            view_count INTEGER NOT NULL DEFAULT 0,
            review_notes TEXT,
            seller_id TEXT NOT NULL,
            submitted_at_ms INTEGER,
            published_at_ms INTEGER,
            reviewed_at_ms INTEGER,
            created_at_ms INTEGER NOT NULL,
            FOREIGN KEY (seller_id) REFERENCES sellers(id)
        )
    "#)
    .execute(pool)
    .await?;

    // plot_images テーブル（Plot削除時に一括削除）
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS plot_images (
            id TEXT PRIMARY KEY,
            plot_id TEXT NOT NULL,
            url TEXT NOT NULL,
            public_id TEXT NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0,
            is_featured INTEGER NOT NULL DEFAULT 0,
            created_at_ms INTEGER NOT NULL,
            FOREIGN KEY (plot_id) REFERENCES plots(id) ON DELETE CASCADE
        )
    "#)
    .execute(pool)
    .await?;

    // admin_sessions テーブル（ログイン発行トークン）
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS admin_sessions (
            token TEXT PRIMARY KEY,
            created_at_ms INTEGER NOT NULL,
            expires_at_ms INTEGER NOT NULL
        )
    "#)
    .execute(pool)
    .await?;

    // インデックス作成
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plots_status ON plots(status, verification_status)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plots_category ON plots(category)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plots_village ON plots(village)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plots_featured ON plots(is_featured, published_at_ms)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plots_seller ON plots(seller_id)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_plot_images_plot ON plot_images(plot_id)")
        .execute(pool).await?;

    Ok(())
}
