//! SeaORM storage backend
//!
//! This module provides database storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod analytics;
mod click_store;
mod connection;
mod links;
pub mod retry;

use std::time::Duration;

use moka::sync::Cache;
use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::errors::{LinkpulseError, Result};
use crate::storage::models::LinkRecord;

pub use analytics::{CategoryRow, LinkCountRow, TrendRow};
pub use connection::{connect_generic, connect_sqlite, run_migrations};

/// 链接目录缓存 TTL（秒）
const LINK_CACHE_TTL_SECS: u64 = 30;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite://")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(LinkpulseError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    /// 单链接点击计数缓存（仪表盘角标用，TTL 由配置决定）
    count_cache: Cache<String, u64>,
    /// 链接目录缓存（入口活性检查用，TTL 30 秒，含负缓存）
    link_cache: Cache<String, Option<LinkRecord>>,
    /// 重试配置
    retry_config: retry::RetryConfig,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(LinkpulseError::database_config(
                "DATABASE_URL 未设置".to_string(),
            ));
        }

        // 读取重试与缓存配置
        let config = crate::config::get_config();
        let retry_config = retry::RetryConfig {
            max_retries: config.database.retry_count,
            base_delay_ms: config.database.retry_base_delay_ms,
            max_delay_ms: config.database.retry_max_delay_ms,
        };
        let count_cache_ttl = config.analytics.count_cache_ttl_secs;

        // 根据不同数据库类型配置连接选项
        let db = if backend_name == "sqlite" {
            connect_sqlite(database_url).await?
        } else {
            connect_generic(database_url, backend_name).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
            count_cache: Cache::builder()
                .time_to_live(Duration::from_secs(count_cache_ttl))
                .max_capacity(1000)
                .build(),
            link_cache: Cache::builder()
                .time_to_live(Duration::from_secs(LINK_CACHE_TTL_SECS))
                .max_capacity(1024)
                .build(),
            retry_config,
        };

        // 运行迁移
        run_migrations(&storage.db).await?;

        warn!(
            "{} Storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    pub fn get_backend_name(&self) -> &str {
        &self.backend_name
    }

    /// 获取数据库连接（测试与诊断场景直接访问数据库）
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 清除某链接的计数缓存（事件写入后调用）
    pub(crate) fn invalidate_link_count(&self, link_id: &str) {
        self.count_cache
            .invalidate(&count_cache_key(link_id, false));
        self.count_cache.invalidate(&count_cache_key(link_id, true));
    }

    /// 清除全部计数缓存
    pub fn invalidate_count_cache(&self) {
        self.count_cache.invalidate_all();
    }
}

/// 计数缓存 key
pub(crate) fn count_cache_key(link_id: &str, include_bots: bool) -> String {
    format!("count:{}:bots={}", link_id, include_bots)
}
