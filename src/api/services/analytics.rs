//! Analytics API 端点
//!
//! 面板查询接口（Bearer token 保护）：
//! - 单链接统计 / 主页统计
//! - 点击计数（单个与批量补零）
//! - 原始事件 CSV 导出

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use serde::{Deserialize, Serialize};
use tracing::error;
use ts_rs::TS;

use crate::api::auth::verify_dashboard_token;
use crate::api::helpers::error_from_linkpulse;
use crate::errors::LinkpulseError;
use crate::services::AnalyticsService;
use crate::storage::{LinkDirectory, SeaOrmStorage};

/// 输出目录常量
const TS_EXPORT_PATH: &str = "../dashboard/src/api/types.generated.ts";

/// 导出行数默认上限
const EXPORT_DEFAULT_LIMIT: u64 = 10_000;
/// 导出行数硬上限
const EXPORT_MAX_LIMIT: u64 = 100_000;

// ============ 请求参数 ============

/// Analytics 查询参数
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// 开始日期 (RFC3339 或 YYYY-MM-DD，含当天)
    pub start_date: Option<String>,
    /// 结束日期 (RFC3339 或 YYYY-MM-DD，含当天)
    pub end_date: Option<String>,
    /// 是否包含 bot 点击
    pub include_bots: Option<bool>,
    /// 导出行数限制（仅 export 端点使用）
    pub limit: Option<u64>,
}

/// 批量计数查询参数
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct CountsQuery {
    /// 逗号分隔的链接 id 列表
    pub ids: Option<String>,
    pub include_bots: Option<bool>,
}

// ============ 响应结构 ============

/// 单链接计数
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct CountResponse {
    pub count: u64,
}

/// 批量计数（无事件的链接补零）
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct CountsResponse {
    pub counts: BTreeMap<String, u64>,
}

// ============ 辅助函数 ============

fn unauthorized() -> HttpResponse {
    error_from_linkpulse(&LinkpulseError::unauthorized(
        "Invalid or missing dashboard token",
    ))
}

/// 解析逗号分隔的 id 列表，忽略空白项
fn parse_ids(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

// ============ API 端点 ============

/// GET /api/analytics/links/{link_id} - 单链接统计
pub async fn get_link_stats(
    req: HttpRequest,
    link_id: web::Path<String>,
    query: web::Query<AnalyticsQuery>,
    service: web::Data<Arc<AnalyticsService>>,
    storage: web::Data<Arc<SeaOrmStorage>>,
) -> ActixResult<HttpResponse> {
    if !verify_dashboard_token(&req) {
        return Ok(unauthorized());
    }

    let link_id = link_id.into_inner();

    // 未知链接返回 404 而不是空统计
    match storage.find_link(&link_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Ok(error_from_linkpulse(&LinkpulseError::not_found(
                "Link not found",
            )));
        }
        Err(e) => return Ok(error_from_linkpulse(&e)),
    }

    let (start, end) = match AnalyticsService::parse_date_range_strict(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    ) {
        Ok(range) => range,
        Err(e) => return Ok(error_from_linkpulse(&e)),
    };
    let include_bots = query.include_bots.unwrap_or(false);

    match service
        .get_link_stats(&link_id, start, end, include_bots)
        .await
    {
        Ok(stats) => Ok(HttpResponse::Ok().json(stats)),
        Err(e) => {
            error!("Failed to query link stats for '{}': {}", link_id, e);
            Ok(error_from_linkpulse(&e))
        }
    }
}

/// GET /api/analytics/profiles/{profile_id} - 主页统计
///
/// 无链接的主页返回零值结构，不报错。
pub async fn get_profile_stats(
    req: HttpRequest,
    profile_id: web::Path<String>,
    query: web::Query<AnalyticsQuery>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    if !verify_dashboard_token(&req) {
        return Ok(unauthorized());
    }

    let profile_id = profile_id.into_inner();

    let (start, end) = match AnalyticsService::parse_date_range_strict(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    ) {
        Ok(range) => range,
        Err(e) => return Ok(error_from_linkpulse(&e)),
    };
    let include_bots = query.include_bots.unwrap_or(false);

    match service
        .get_profile_stats(&profile_id, start, end, include_bots)
        .await
    {
        Ok(stats) => Ok(HttpResponse::Ok().json(stats)),
        Err(e) => {
            error!("Failed to query profile stats for '{}': {}", profile_id, e);
            Ok(error_from_linkpulse(&e))
        }
    }
}

/// GET /api/analytics/links/{link_id}/count - 单链接计数（带短缓存）
///
/// 未知链接计为 0，面板角标不需要区分未知与无点击。
pub async fn get_link_count(
    req: HttpRequest,
    link_id: web::Path<String>,
    query: web::Query<CountsQuery>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    if !verify_dashboard_token(&req) {
        return Ok(unauthorized());
    }

    let include_bots = query.include_bots.unwrap_or(false);

    match service.get_link_click_count(&link_id, include_bots).await {
        Ok(count) => Ok(HttpResponse::Ok().json(CountResponse { count })),
        Err(e) => {
            error!("Failed to count clicks for '{}': {}", link_id, e);
            Ok(error_from_linkpulse(&e))
        }
    }
}

/// GET /api/analytics/counts?ids=a,b,c - 批量计数
///
/// 空 id 列表返回 `{counts: {}}`。
pub async fn get_links_counts(
    req: HttpRequest,
    query: web::Query<CountsQuery>,
    service: web::Data<Arc<AnalyticsService>>,
) -> ActixResult<HttpResponse> {
    if !verify_dashboard_token(&req) {
        return Ok(unauthorized());
    }

    let ids = parse_ids(query.ids.as_deref());
    let include_bots = query.include_bots.unwrap_or(false);

    match service.get_links_click_counts(&ids, include_bots).await {
        Ok(counts) => Ok(HttpResponse::Ok().json(CountsResponse { counts })),
        Err(e) => {
            error!("Failed to count clicks for {} links: {}", ids.len(), e);
            Ok(error_from_linkpulse(&e))
        }
    }
}

/// CSV 导出行
#[derive(Serialize)]
struct ExportRow<'a> {
    link_id: &'a str,
    clicked_at: String,
    country: &'a str,
    device: &'a str,
    browser: &'a str,
    referrer: &'a str,
    is_bot: bool,
}

/// GET /api/analytics/links/{link_id}/export - 导出原始事件 CSV
pub async fn export_link_events(
    req: HttpRequest,
    link_id: web::Path<String>,
    query: web::Query<AnalyticsQuery>,
    service: web::Data<Arc<AnalyticsService>>,
    storage: web::Data<Arc<SeaOrmStorage>>,
) -> ActixResult<HttpResponse> {
    if !verify_dashboard_token(&req) {
        return Ok(unauthorized());
    }

    let link_id = link_id.into_inner();

    match storage.find_link(&link_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Ok(error_from_linkpulse(&LinkpulseError::not_found(
                "Link not found",
            )));
        }
        Err(e) => return Ok(error_from_linkpulse(&e)),
    }

    let (start, end) = match AnalyticsService::parse_date_range_strict(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    ) {
        Ok(range) => range,
        Err(e) => return Ok(error_from_linkpulse(&e)),
    };
    let include_bots = query.include_bots.unwrap_or(false);
    let limit = query
        .limit
        .unwrap_or(EXPORT_DEFAULT_LIMIT)
        .min(EXPORT_MAX_LIMIT);

    let events = match service
        .export_link_events(&link_id, start, end, include_bots, limit)
        .await
    {
        Ok(events) => events,
        Err(e) => {
            error!("Failed to export events for '{}': {}", link_id, e);
            return Ok(error_from_linkpulse(&e));
        }
    };

    // 生成 CSV（表头取自 ExportRow 字段名）
    let mut writer = csv::Writer::from_writer(Vec::new());
    for event in &events {
        let row = ExportRow {
            link_id: &event.link_id,
            clicked_at: event.clicked_at.to_rfc3339(),
            country: event.country.as_deref().unwrap_or(""),
            device: event.device.as_deref().unwrap_or(""),
            browser: event.browser.as_deref().unwrap_or(""),
            referrer: event.referrer.as_deref().unwrap_or(""),
            is_bot: event.is_bot,
        };
        if let Err(e) = writer.serialize(row) {
            error!("Failed to serialize CSV row: {}", e);
            return Ok(error_from_linkpulse(&LinkpulseError::serialization(
                e.to_string(),
            )));
        }
    }

    let csv_bytes = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to finalize CSV export: {}", e);
            return Ok(error_from_linkpulse(&LinkpulseError::serialization(
                e.to_string(),
            )));
        }
    };

    let start_label = start.map_or_else(|| "all".to_string(), |d| d.format("%Y%m%d").to_string());
    let end_label = end.map_or_else(|| "all".to_string(), |d| d.format("%Y%m%d").to_string());

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            "Content-Disposition",
            format!(
                "attachment; filename=\"clicks_{}_{}_{}.csv\"",
                link_id, start_label, end_label
            ),
        ))
        .body(csv_bytes))
}

/// Analytics 路由配置
pub fn analytics_routes() -> actix_web::Scope {
    web::scope("/analytics")
        .route("/counts", web::get().to(get_links_counts))
        // /links/{link_id}/* 必须在 /links/{link_id} 之前注册
        .route("/links/{link_id}/export", web::get().to(export_link_events))
        .route("/links/{link_id}/count", web::get().to(get_link_count))
        .route("/links/{link_id}", web::get().to(get_link_stats))
        .route("/profiles/{profile_id}", web::get().to(get_profile_stats))
}
