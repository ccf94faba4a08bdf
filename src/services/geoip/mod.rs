//! GeoIP 服务模块
//!
//! 为点击事件补全国家代码，支持：
//! - MaxMind GeoLite2 本地数据库
//! - 外部 API fallback (ip-api.com)
//! - 两者均未配置时关闭查询

mod external_api;
mod maxmind;
mod provider;

pub use provider::{GeoIpLookup, GeoIpProvider};
