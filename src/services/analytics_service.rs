//! Analytics service layer
//!
//! Provides unified business logic for analytics queries, shared between
//! the HTTP API and CLI interfaces.
//!
//! 所有聚合都是实时查询 click_events 表；日期分组在数据库端完成
//! （按 UTC 日历日），排序约定由各查询自身保证。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{DbBackend, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;

use crate::errors::LinkpulseError;
use crate::storage::SeaOrmStorage;

use migration::entities::click_event;

/// 输出目录常量
const TS_EXPORT_PATH: &str = "../dashboard/src/api/types.generated.ts";

// ============ 公共类型定义 ============

/// 单日点击数
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct TrendPoint {
    /// UTC 日历日（YYYY-MM-DD）
    pub date: String,
    pub clicks: u64,
}

/// 按国家统计
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct CountryCount {
    pub country: String,
    pub clicks: u64,
}

/// 按设备统计
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct DeviceCount {
    pub device: String,
    pub clicks: u64,
}

/// 按浏览器统计
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct BrowserCount {
    pub browser: String,
    pub clicks: u64,
}

/// 热门链接条目
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct TopLink {
    pub link_id: String,
    pub clicks: u64,
}

/// 单链接统计
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub link_id: String,
    pub total_clicks: u64,
    pub clicks_over_time: Vec<TrendPoint>,
    pub clicks_by_country: Vec<CountryCount>,
    pub clicks_by_device: Vec<DeviceCount>,
    pub clicks_by_browser: Vec<BrowserCount>,
    pub referrers: Vec<String>,
}

/// 主页（全链接）统计
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub profile_id: String,
    pub total_clicks: u64,
    pub top_links: Vec<TopLink>,
    pub clicks_over_time: Vec<TrendPoint>,
}

/// 分类标签缺失时的归一化值
const UNKNOWN_LABEL: &str = "Unknown";

// ============ AnalyticsService ============

/// Analytics 服务
pub struct AnalyticsService {
    storage: Arc<SeaOrmStorage>,
}

impl AnalyticsService {
    /// 创建 AnalyticsService 实例
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self { storage }
    }

    /// 严格解析日期范围，解析失败时返回错误
    ///
    /// 支持 RFC3339 与 YYYY-MM-DD 两种格式；两端各自可选，
    /// 缺省的一端不参与过滤（全量）。
    pub fn parse_date_range_strict(
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), LinkpulseError> {
        let start = match start_date {
            Some(s) => Some(Self::parse_date(s).ok_or_else(|| {
                LinkpulseError::invalid_date_range(format!(
                    "Invalid start date format: '{}'. Supported formats: RFC3339 or YYYY-MM-DD",
                    s
                ))
            })?),
            None => None,
        };
        let end = match end_date {
            Some(e) => Some(Self::parse_date(e).ok_or_else(|| {
                LinkpulseError::invalid_date_range(format!(
                    "Invalid end date format: '{}'. Supported formats: RFC3339 or YYYY-MM-DD",
                    e
                ))
            })?),
            None => None,
        };
        if let (Some(start), Some(end)) = (start, end)
            && start > end
        {
            return Err(LinkpulseError::invalid_date_range(
                "Start date must not be later than end date",
            ));
        }
        Ok((start, end))
    }

    fn parse_date(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
            })
    }

    fn get_db_backend(&self) -> DbBackend {
        match self.storage.get_backend_name() {
            "sqlite" => DbBackend::Sqlite,
            "mysql" => DbBackend::MySql,
            _ => DbBackend::Postgres,
        }
    }

    /// 按 UTC 日历日分组的日期格式化表达式
    fn date_format_expr(&self) -> Expr {
        match self.get_db_backend() {
            DbBackend::Sqlite => Expr::cust("strftime('%Y-%m-%d', clicked_at)"),
            DbBackend::MySql => Expr::cust("DATE_FORMAT(clicked_at, '%Y-%m-%d')"),
            _ => Expr::cust("TO_CHAR(clicked_at AT TIME ZONE 'UTC', 'YYYY-MM-DD')"),
        }
    }

    /// 获取单链接统计
    ///
    /// 使用 `tokio::try_join!` 并发执行 6 个查询，减少响应时间
    pub async fn get_link_stats(
        &self,
        link_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
    ) -> Result<LinkStats, LinkpulseError> {
        info!(
            "Analytics: get_link_stats for '{}' from {:?} to {:?}, include_bots={}",
            link_id, start, end, include_bots
        );

        let ids = vec![link_id.to_string()];
        let date_expr = self.date_format_expr();

        let (total_clicks, trend_rows, country_rows, device_rows, browser_rows, referrers) =
            tokio::try_join!(
                self.storage.count_events(&ids, start, end, include_bots),
                self.storage
                    .get_trend(&ids, start, end, include_bots, date_expr),
                self.storage.get_breakdown(
                    &ids,
                    start,
                    end,
                    include_bots,
                    click_event::Column::Country
                ),
                self.storage.get_breakdown(
                    &ids,
                    start,
                    end,
                    include_bots,
                    click_event::Column::Device
                ),
                self.storage.get_breakdown(
                    &ids,
                    start,
                    end,
                    include_bots,
                    click_event::Column::Browser
                ),
                self.storage.get_referrers(&ids, start, end, include_bots),
            )
            .map_err(|e| LinkpulseError::analytics_query(e.to_string()))?;

        let clicks_over_time = trend_rows
            .into_iter()
            .map(|r| TrendPoint {
                date: r.label,
                clicks: r.count as u64,
            })
            .collect::<Vec<_>>();

        debug!(
            "Analytics: get_link_stats for '{}' returned {} clicks, {} trend points",
            link_id,
            total_clicks,
            clicks_over_time.len()
        );

        Ok(LinkStats {
            link_id: link_id.to_string(),
            total_clicks,
            clicks_over_time,
            clicks_by_country: country_rows
                .into_iter()
                .map(|r| CountryCount {
                    country: normalize_label(r.label),
                    clicks: r.count as u64,
                })
                .collect(),
            clicks_by_device: device_rows
                .into_iter()
                .map(|r| DeviceCount {
                    device: normalize_label(r.label),
                    clicks: r.count as u64,
                })
                .collect(),
            clicks_by_browser: browser_rows
                .into_iter()
                .map(|r| BrowserCount {
                    browser: normalize_label(r.label),
                    clicks: r.count as u64,
                })
                .collect(),
            referrers,
        })
    }

    /// 获取主页统计（聚合该主页全部链接）
    ///
    /// 先解析主页的链接集合；空主页直接返回零值结构，不触发事件查询。
    pub async fn get_profile_stats(
        &self,
        profile_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
    ) -> Result<ProfileStats, LinkpulseError> {
        use crate::storage::LinkDirectory;

        info!(
            "Analytics: get_profile_stats for '{}' from {:?} to {:?}, include_bots={}",
            profile_id, start, end, include_bots
        );

        let link_ids = self.storage.link_ids_for_profile(profile_id).await?;
        if link_ids.is_empty() {
            debug!("Analytics: profile '{}' has no links", profile_id);
            return Ok(ProfileStats {
                profile_id: profile_id.to_string(),
                total_clicks: 0,
                top_links: Vec::new(),
                clicks_over_time: Vec::new(),
            });
        }

        let top_limit = crate::config::get_config().analytics.top_links_limit;
        let date_expr = self.date_format_expr();

        let (total_clicks, top_rows, trend_rows) = tokio::try_join!(
            self.storage
                .count_events(&link_ids, start, end, include_bots),
            self.storage
                .get_top_links(&link_ids, start, end, include_bots, top_limit),
            self.storage
                .get_trend(&link_ids, start, end, include_bots, date_expr),
        )
        .map_err(|e| LinkpulseError::analytics_query(e.to_string()))?;

        debug!(
            "Analytics: get_profile_stats for '{}' returned {} clicks over {} links",
            profile_id,
            total_clicks,
            link_ids.len()
        );

        Ok(ProfileStats {
            profile_id: profile_id.to_string(),
            total_clicks,
            top_links: top_rows
                .into_iter()
                .map(|r| TopLink {
                    link_id: r.link_id,
                    clicks: r.count as u64,
                })
                .collect(),
            clicks_over_time: trend_rows
                .into_iter()
                .map(|r| TrendPoint {
                    date: r.label,
                    clicks: r.count as u64,
                })
                .collect(),
        })
    }

    /// 单链接点击总数（仪表盘角标，带短缓存）
    pub async fn get_link_click_count(
        &self,
        link_id: &str,
        include_bots: bool,
    ) -> Result<u64, LinkpulseError> {
        self.storage
            .cached_link_count(link_id, include_bots)
            .await
            .map_err(|e| LinkpulseError::analytics_query(e.to_string()))
    }

    /// 批量链接点击计数，无事件的链接补零
    pub async fn get_links_click_counts(
        &self,
        link_ids: &[String],
        include_bots: bool,
    ) -> Result<BTreeMap<String, u64>, LinkpulseError> {
        let mut counts: BTreeMap<String, u64> =
            link_ids.iter().map(|id| (id.clone(), 0)).collect();

        if link_ids.is_empty() {
            return Ok(counts);
        }

        let rows = self
            .storage
            .get_per_link_counts(link_ids, include_bots)
            .await
            .map_err(|e| LinkpulseError::analytics_query(e.to_string()))?;

        for row in rows {
            counts.insert(row.link_id, row.count as u64);
        }
        Ok(counts)
    }

    /// 导出单链接事件明细
    pub async fn export_link_events(
        &self,
        link_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
        limit: u64,
    ) -> Result<Vec<click_event::Model>, LinkpulseError> {
        info!(
            "Analytics: export_link_events for '{}' from {:?} to {:?}, limit={}",
            link_id, start, end, limit
        );

        self.storage
            .export_events(link_id, start, end, include_bots, limit)
            .await
            .map_err(|e| LinkpulseError::analytics_query(e.to_string()))
    }
}

/// 缺失的分类值归一化为 "Unknown"
fn normalize_label(label: Option<String>) -> String {
    match label {
        Some(value) if !value.is_empty() => value,
        _ => UNKNOWN_LABEL.to_string(),
    }
}
