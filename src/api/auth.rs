//! API 认证与限流
//!
//! - 面板查询接口使用 Bearer token 鉴权（常量时间比较）
//! - 跟踪入口使用基于客户端 IP 的 Governor 限流

use actix_governor::{Governor, GovernorConfigBuilder, KeyExtractor, SimpleKeyExtractionError};
use actix_web::HttpRequest;
use actix_web::dev::ServiceRequest;
use governor::middleware::NoOpMiddleware;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::config::get_config;
use crate::utils::ip::is_trusted_proxy;

/// 常量时间比较两个 token
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// 校验面板查询接口的 Bearer token
///
/// 未配置 dashboard_token 时拒绝所有请求（默认关闭查询面）。
pub fn verify_dashboard_token(req: &HttpRequest) -> bool {
    let config = get_config();
    let Some(ref expected) = config.api.dashboard_token else {
        return false;
    };

    let Some(auth_header) = req.headers().get("Authorization") else {
        return false;
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return false;
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return false;
    };

    token_matches(token, expected)
}

/// 基于 IP 地址的限流 key 提取器（安全版）
///
/// 策略：
/// - 默认使用连接 IP（peer_addr），无法被伪造
/// - 如果连接来自配置的可信代理，则使用 X-Forwarded-For
#[derive(Clone, Copy)]
pub struct IntakeKeyExtractor;

impl KeyExtractor for IntakeKeyExtractor {
    type Key = String;
    type KeyExtractionError = SimpleKeyExtractionError<&'static str>;

    fn extract(&self, req: &ServiceRequest) -> Result<Self::Key, Self::KeyExtractionError> {
        let conn_info = req.connection_info();

        // 获取连接 IP（TCP peer address，无法伪造）
        let peer_ip = conn_info
            .peer_addr()
            .ok_or_else(|| SimpleKeyExtractionError::new("Unable to extract peer IP"))?;

        // 检查是否启用了可信代理
        let config = get_config();
        let trusted_proxies = &config.tracking.trusted_proxies;

        if !trusted_proxies.is_empty() && is_trusted_proxy(peer_ip, trusted_proxies) {
            // 来自可信代理，使用 X-Forwarded-For
            let real_ip = conn_info.realip_remote_addr().unwrap_or(peer_ip);
            debug!("Intake rate limit key from trusted proxy: {}", real_ip);
            Ok(real_ip.to_string())
        } else {
            // 默认：使用连接 IP
            Ok(peer_ip.to_string())
        }
    }
}

/// 创建跟踪入口限流器
///
/// 令牌补充速率与突发容量从配置读取，超限返回 HTTP 429 Too Many Requests。
/// 超限不触发客户端退避重试（429 属于 4xx，终态）。
pub fn intake_rate_limiter() -> Governor<IntakeKeyExtractor, NoOpMiddleware> {
    let config = get_config();
    let governor_config = GovernorConfigBuilder::default()
        .seconds_per_request(config.api.intake_seconds_per_request)
        .burst_size(config.api.intake_burst_size)
        .key_extractor(IntakeKeyExtractor)
        .finish()
        .expect("Invalid rate limit config");

    debug!(
        "Intake rate limiter created: 1 req/{}s, burst {}",
        config.api.intake_seconds_per_request, config.api.intake_burst_size
    );
    Governor::new(&governor_config)
}
