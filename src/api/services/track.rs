//! 跟踪入口端点
//!
//! `POST /api/track` 接收点击上报，补全请求元数据后交给
//! ClickIngestionEngine。策略拒绝与成功同样返回 200；只有
//! 存储失败（success=false）返回 503，驱动客户端退避重试。

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Result as ActixResult, web};
use serde::Deserialize;
use tracing::{debug, warn};
use ts_rs::TS;

use crate::api::auth::intake_rate_limiter;
use crate::api::helpers::{error_from_linkpulse, error_response};
use crate::config::get_config;
use crate::errors::LinkpulseError;
use crate::services::GeoIpProvider;
use crate::storage::{LinkDirectory, SeaOrmStorage};
use crate::tracking::{ClickAttempt, ClickIngestionEngine, TrackingResult};
use crate::utils::ip::extract_client_ip;

/// 输出目录常量
const TS_EXPORT_PATH: &str = "../dashboard/src/api/types.generated.ts";

/// 跟踪请求体
#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub link_id: String,
}

/// 读取单个请求头，空值视为缺失
fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 访客是否声明了 Do Not Track / Global Privacy Control
fn privacy_opt_out(req: &HttpRequest) -> bool {
    let dnt = header_value(req, "dnt");
    if matches!(dnt.as_deref(), Some("1") | Some("yes")) {
        return true;
    }
    matches!(header_value(req, "sec-gpc").as_deref(), Some("1"))
}

/// Track Service
pub struct TrackService;

impl TrackService {
    /// POST /api/track - 点击上报
    pub async fn track(
        req: HttpRequest,
        body: web::Json<TrackRequest>,
        engine: web::Data<Arc<ClickIngestionEngine>>,
        storage: web::Data<Arc<SeaOrmStorage>>,
        geoip: web::Data<GeoIpProvider>,
    ) -> ActixResult<HttpResponse> {
        let link_id = body.link_id.trim();
        if link_id.is_empty() {
            return Ok(error_response(
                StatusCode::BAD_REQUEST,
                "E005",
                "linkId is required",
            ));
        }

        // DNT / Sec-GPC 访客：不做指纹推导，直接回执
        if privacy_opt_out(&req) {
            debug!("Tracking skipped for '{}': visitor opted out", link_id);
            return Ok(HttpResponse::Ok().json(TrackingResult::do_not_track()));
        }

        // 链接有效性检查（带短缓存的索引查询）
        match storage.find_link(link_id).await {
            Ok(Some(link)) if link.is_active => {}
            Ok(_) => {
                debug!("Tracking rejected: unknown or inactive link '{}'", link_id);
                return Ok(error_from_linkpulse(&LinkpulseError::not_found(
                    "Link not found",
                )));
            }
            Err(e) => {
                warn!("Link lookup failed for '{}': {}", link_id, e);
                return Ok(error_from_linkpulse(&e));
            }
        }

        // 采集请求元数据
        let ip_address = extract_client_ip(&req);
        let user_agent = header_value(&req, "user-agent");
        let referrer = header_value(&req, "referer");
        let accept_language = header_value(&req, "accept-language");
        let accept_encoding = header_value(&req, "accept-encoding");

        // 国家代码：优先边缘节点注入的请求头，缺失时回退 GeoIP
        let config = get_config();
        let country = match header_value(&req, &config.tracking.country_header) {
            Some(c) => Some(c),
            None => match ip_address {
                Some(ref ip) => geoip.lookup_country(ip).await,
                None => None,
            },
        };

        let attempt = ClickAttempt {
            ip_address,
            user_agent,
            accept_language,
            accept_encoding,
            referrer,
            country,
            ..ClickAttempt::new(link_id)
        };

        let result = engine.track_with_retry(&attempt).await;

        // success=false 是存储问题，503 让客户端退避重试；
        // 策略拒绝（tracked=false 但 success=true）仍是 200
        let status = if result.success {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        Ok(HttpResponse::build(status).json(result))
    }
}

/// Track 路由配置
pub fn track_routes() -> actix_web::Scope {
    web::scope("/track").route(
        "",
        web::post().to(TrackService::track).wrap(intake_rate_limiter()),
    )
}
