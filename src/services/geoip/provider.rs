//! GeoIP Provider 抽象层
//!
//! 统一的国家代码查询接口，根据配置自动选择实现：
//! 1. 检查 maxminddb_path 是否配置且文件可读
//! 2. 可读 → MaxMindProvider
//! 3. 不可读 → geoip_api_url 配置时用 ExternalApiProvider
//! 4. 都没有 → Disabled（始终返回 None）

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::external_api::ExternalApiProvider;
use super::maxmind::MaxMindProvider;
use crate::config::AnalyticsConfig;

/// GeoIP 查询 trait
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    /// 查询 IP 地址的国家代码（ISO 3166-1 alpha-2，如 "CN"、"US"）
    async fn lookup_country(&self, ip: &str) -> Option<String>;

    /// 获取 provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 未配置任何数据源时的空实现
struct DisabledProvider;

#[async_trait]
impl GeoIpLookup for DisabledProvider {
    async fn lookup_country(&self, _ip: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "Disabled"
    }
}

/// 统一 GeoIP Provider
///
/// 启动时根据配置自动选择实现
pub struct GeoIpProvider {
    inner: Arc<dyn GeoIpLookup>,
}

impl GeoIpProvider {
    /// 根据 AnalyticsConfig 初始化
    pub fn new(config: &AnalyticsConfig) -> Self {
        let inner: Arc<dyn GeoIpLookup> = if let Some(ref path) = config.maxminddb_path {
            match MaxMindProvider::new(path) {
                Ok(provider) => {
                    info!("GeoIP: Using MaxMind database at {}", path);
                    Arc::new(provider)
                }
                Err(e) => match config.geoip_api_url {
                    Some(ref url) => {
                        warn!(
                            "GeoIP: Failed to load MaxMind database at {}: {}, falling back to external API",
                            path, e
                        );
                        Arc::new(ExternalApiProvider::new(url))
                    }
                    None => {
                        warn!(
                            "GeoIP: Failed to load MaxMind database at {}: {}, lookups disabled",
                            path, e
                        );
                        Arc::new(DisabledProvider)
                    }
                },
            }
        } else if let Some(ref url) = config.geoip_api_url {
            debug!("GeoIP: No MaxMind database configured, using external API");
            Arc::new(ExternalApiProvider::new(url))
        } else {
            debug!("GeoIP: No data source configured, lookups disabled");
            Arc::new(DisabledProvider)
        };

        info!("GeoIP: Initialized with {} provider", inner.name());
        Self { inner }
    }

    /// 查询 IP 地址的国家代码
    pub async fn lookup_country(&self, ip: &str) -> Option<String> {
        self.inner.lookup_country(ip).await
    }

    /// 获取当前使用的 provider 名称
    pub fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

impl Clone for GeoIpProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
