use crate::config::get_config;
use crate::services::{AnalyticsService, GeoIpProvider};
use crate::storage::{ClickStore, SeaOrmStorage, StorageFactory};
use crate::tracking::{ClickIngestionEngine, ClientClassifier, TrackingPolicy};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 服务器启动所需的共享组件
pub struct StartupContext {
    pub storage: Arc<SeaOrmStorage>,
    pub engine: Arc<ClickIngestionEngine>,
    pub analytics_service: Arc<AnalyticsService>,
    pub geoip: GeoIpProvider,
}

/// CLI 模式预处理（预留扩展点）
#[cfg(feature = "cli")]
pub async fn cli_pre_startup() {
    // Reserved for future CLI-specific initialization
}

/// 准备服务器启动的上下文
/// 包括存储、摄取引擎、分析服务和 GeoIP 解析器
pub async fn prepare_server_startup() -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install rustls crypto provider: {:?}", e))?;

    let storage = StorageFactory::create()
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", storage.get_backend_name());

    let config = get_config();

    // 摄取引擎：UA 分类器与准入策略都来自静态配置
    let classifier = ClientClassifier::new(&config.tracking.bot_tokens);
    let policy = TrackingPolicy::from_config();
    let store: Arc<dyn ClickStore> = storage.clone();
    let engine = Arc::new(ClickIngestionEngine::new(store, classifier, policy));
    info!(
        "Click ingestion ready: dedup window {}s, rate limit {} clicks per {}s",
        policy.duplicate_window_secs, policy.rate_limit_max_clicks, policy.rate_limit_window_secs
    );

    let analytics_service = Arc::new(AnalyticsService::new(storage.clone()));

    // GeoIP 在启动时初始化，未配置时退化为 Disabled 实现
    let geoip = GeoIpProvider::new(&config.analytics);
    info!("GeoIP provider: {}", geoip.provider_name());

    validate_dashboard_token();

    debug!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );

    Ok(StartupContext {
        storage,
        engine,
        analytics_service,
        geoip,
    })
}

/// 校验面板 token 配置并输出启动提示
fn validate_dashboard_token() {
    let config = get_config();
    match config.api.dashboard_token.as_deref() {
        None | Some("") => {
            warn!(
                "No dashboard token configured. Analytics endpoints will reject all queries. \
                 Set api.dashboard_token to enable dashboard access."
            );
        }
        Some(token) if token.len() < 8 => {
            warn!("WARNING: Dashboard token is very short. Consider using a stronger token.");
        }
        Some(_) => {}
    }
}
