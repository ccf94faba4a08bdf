use serde::{Deserialize, Serialize};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// 包含基础设施配置：
/// - server: 服务器地址、端口、CPU 数量
/// - database: 数据库连接配置
/// - logging: 日志配置
/// - tracking: 点击跟踪策略（去重窗口、限流、bot 识别）
/// - analytics: 分析统计配置
/// - api: API 层配置（面板 token、CORS、入口限流）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：LP，分隔符：__
    /// 示例：LP__SERVER__PORT=9999
    pub fn load() -> Self {
        use config::{Config, Environment, File};

        let path = "config.toml";

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 LP，分隔符 __
            .add_source(
                Environment::with_prefix("LP")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if std::path::Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub unix_socket: Option<String>,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_database_timeout")]
    pub timeout: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_log_rotation")]
    pub enable_rotation: bool,
    #[serde(default = "default_log_max_backups")]
    pub max_backups: u32,
}

/// 点击跟踪策略配置
///
/// 窗口与上限是产品决策而不是协议常量，默认值：
/// 60 秒窗口内最多 10 次点击，5 秒近期重复窗口，幂等键按 1 秒取整。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_rate_limit_max_clicks")]
    pub rate_limit_max_clicks: u64,
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
    #[serde(default = "default_track_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_track_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// UA 子串黑名单，命中即标记为 bot
    #[serde(default = "default_bot_tokens")]
    pub bot_tokens: Vec<String>,
    /// 边缘网关注入的国家码请求头（缺失时回退 GeoIP 解析）
    #[serde(default = "default_country_header")]
    pub country_header: String,
    /// 受信任的反向代理（IP 或 CIDR），用于 X-Forwarded-For 解析
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 分析统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_top_links_limit")]
    pub top_links_limit: u64,
    #[serde(default = "default_count_cache_ttl_secs")]
    pub count_cache_ttl_secs: u64,
    /// MaxMind GeoIP 数据库路径（如 GeoLite2-Country.mmdb）
    #[serde(default)]
    pub maxminddb_path: Option<String>,
    /// 外部 GeoIP API 地址（{ip} 占位符），maxminddb 未配置时使用
    #[serde(default)]
    pub geoip_api_url: Option<String>,
}

/// API 层配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 仪表盘查询接口的 Bearer token，未设置时拒绝所有分析查询
    #[serde(default)]
    pub dashboard_token: Option<String>,
    #[serde(default)]
    pub cors: CorsConfig,
    /// 入口限流：每个客户端 IP 的令牌补充间隔（秒）
    #[serde(default = "default_intake_seconds_per_request")]
    pub intake_seconds_per_request: u64,
    /// 入口限流：突发容量
    #[serde(default = "default_intake_burst_size")]
    pub intake_burst_size: u32,
}

/// CORS 配置
///
/// 点击上报来自任意 bio 页面域名，默认放开 `*`（不带凭证）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cors_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_cors_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_cors_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
    #[serde(default)]
    pub allow_credentials: bool,
}

// ============================================================
// Default value functions for static config
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "linkpulse.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_database_timeout() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_log_rotation() -> bool {
    true
}

fn default_log_max_backups() -> u32 {
    7
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_rate_limit_max_clicks() -> u64 {
    10
}

fn default_duplicate_window_secs() -> u64 {
    5
}

fn default_track_retry_max_attempts() -> u32 {
    3
}

fn default_track_retry_delay_ms() -> u64 {
    1000
}

fn default_bot_tokens() -> Vec<String> {
    [
        "bot",
        "crawler",
        "spider",
        "scraper",
        "curl",
        "wget",
        "python",
        "java",
        "go-http",
        "httpie",
        "postman",
        "insomnia",
        "headless",
        "phantom",
        "selenium",
        "webdriver",
        "puppeteer",
        "playwright",
        "googlebot",
        "bingbot",
        "slurp",
        "duckduckbot",
        "baiduspider",
        "yandexbot",
        "sogou",
        "exabot",
        "facebot",
        "ia_archiver",
        "archive.org_bot",
        "msnbot",
        "ahrefs",
        "semrush",
        "mj12bot",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_country_header() -> String {
    "x-vercel-ip-country".to_string()
}

fn default_top_links_limit() -> u64 {
    10
}

fn default_count_cache_ttl_secs() -> u64 {
    30
}

fn default_intake_seconds_per_request() -> u64 {
    1
}

fn default_intake_burst_size() -> u32 {
    20
}

fn default_cors_enabled() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string()]
}

fn default_cors_headers() -> Vec<String> {
    vec![
        "Content-Type".to_string(),
        "Authorization".to_string(),
        "Accept".to_string(),
    ]
}

fn default_cors_max_age() -> u64 {
    3600
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            unix_socket: None,
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            timeout: default_database_timeout(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            enable_rotation: default_log_rotation(),
            max_backups: default_log_max_backups(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max_clicks: default_rate_limit_max_clicks(),
            duplicate_window_secs: default_duplicate_window_secs(),
            retry_max_attempts: default_track_retry_max_attempts(),
            retry_delay_ms: default_track_retry_delay_ms(),
            bot_tokens: default_bot_tokens(),
            country_header: default_country_header(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_links_limit: default_top_links_limit(),
            count_cache_ttl_secs: default_count_cache_ttl_secs(),
            maxminddb_path: None,
            geoip_api_url: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            dashboard_token: None,
            cors: CorsConfig::default(),
            intake_seconds_per_request: default_intake_seconds_per_request(),
            intake_burst_size: default_intake_burst_size(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: default_cors_enabled(),
            allowed_origins: default_cors_origins(),
            allowed_methods: default_cors_methods(),
            allowed_headers: default_cors_headers(),
            max_age: default_cors_max_age(),
            allow_credentials: false,
        }
    }
}
