//! Plot Query Builder
//! 検索条件 → WHERE述語 + ページング + 固定ソートへの変換
//!
//! 構造化フィルタはベース述語とANDで結合し、フリーテキスト検索だけは
//! 内部3条件（タイトル / 村名 / 地番）をORで束ねた上で全体にANDする。

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::DbPool;
use crate::models::{plot_status, verification_status, Plot};

/// 1ページの既定件数（購入者向けブラウズは固定、汎用エンドポイントは上書き可）
pub const DEFAULT_PAGE_SIZE: i64 = 12;
/// 汎用エンドポイントで許可する1ページ件数の上限
pub const MAX_PAGE_SIZE: i64 = 100;

/// 検索・絞り込みパラメータ（すべて任意）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlotFilter {
    pub category: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_size: Option<f64>,
    pub max_size: Option<f64>,
    pub village: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PlotFilter {
    /// 1始まりのページ番号（不正値は1に丸める）
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// 汎用エンドポイント向けの1ページ件数
    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// ベース述語の強さ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// 購入者向け: status = active かつ verification = approved
    Public,
    /// 汎用パス: status = active のみ（承認状態は問わない）
    ActiveOnly,
}

/// 1ページ分の結果
#[derive(Debug)]
pub struct PlotPage {
    pub plots: Vec<Plot>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PlotPage {
    /// 読み取り失敗時のフェイルソフト値（空ページ）
    pub fn empty(page: i64, per_page: i64) -> Self {
        Self {
            plots: Vec::new(),
            total: 0,
            page,
            per_page,
            total_pages: 0,
        }
    }
}

/// フィルタを適用した1ページ分のPlotと総件数を取得する
///
/// 件数は独立したCOUNTクエリで数える（ページ内容からは導出しない）。
pub async fn fetch_page(
    pool: &DbPool,
    filter: &PlotFilter,
    visibility: Visibility,
    per_page: i64,
) -> Result<PlotPage, sqlx::Error> {
    let page = filter.page();
    let offset = (page - 1) * per_page;

    let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM plots");
    push_predicate(&mut count_query, filter, visibility);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut select_query = QueryBuilder::new("SELECT * FROM plots");
    push_predicate(&mut select_query, filter, visibility);
    // ソートは固定: Featured優先、次に公開日時の新しい順
    select_query.push(" ORDER BY is_featured DESC, published_at_ms DESC");
    select_query.push(" LIMIT ");
    select_query.push_bind(per_page);
    select_query.push(" OFFSET ");
    select_query.push_bind(offset);

    let plots: Vec<Plot> = select_query.build_query_as().fetch_all(pool).await?;

    Ok(PlotPage {
        plots,
        total,
        page,
        per_page,
        total_pages: total_pages(total, per_page),
    })
}

/// WHERE句を組み立てる（COUNTと本体で共用）
fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PlotFilter, visibility: Visibility) {
    qb.push(" WHERE status = ");
    qb.push_bind(plot_status::ACTIVE);

    if visibility == Visibility::Public {
        qb.push(" AND verification_status = ");
        qb.push_bind(verification_status::APPROVED);
    }

    if let Some(category) = &filter.category {
        qb.push(" AND category = ");
        qb.push_bind(category.clone());
    }
    if let Some(min_price) = filter.min_price {
        qb.push(" AND total_price >= ");
        qb.push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        qb.push(" AND total_price <= ");
        qb.push_bind(max_price);
    }
    if let Some(min_size) = filter.min_size {
        qb.push(" AND size_sqft >= ");
        qb.push_bind(min_size);
    }
    if let Some(max_size) = filter.max_size {
        qb.push(" AND size_sqft <= ");
        qb.push_bind(max_size);
    }
    if let Some(village) = &filter.village {
        // SQLiteのLIKEはASCIIに対して大文字小文字を区別しない
        qb.push(" AND village LIKE ");
        qb.push_bind(like_pattern(village));
        qb.push(" ESCAPE '\\'");
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (title_en LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR village LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR survey_number LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
}

/// 部分一致パターン（LIKEメタ文字はエスケープ）
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// 総ページ数 = ceil(total ÷ per_page)
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}
