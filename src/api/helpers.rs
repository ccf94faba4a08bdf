//! API 帮助函数
//!
//! 成功响应直接输出各端点的裸 JSON 结构；错误响应统一为
//! `{code, message}` 信封，状态码由 LinkpulseError 映射。

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde::Serialize;

use crate::errors::LinkpulseError;

/// 错误响应体
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// 构建错误响应
pub fn error_response(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> HttpResponse {
    HttpResponse::build(status)
        .append_header(("Content-Type", "application/json; charset=utf-8"))
        .json(ErrorBody {
            code,
            message: message.into(),
        })
}

/// 从 LinkpulseError 构建错误响应（自动映射 HTTP 状态码）
pub fn error_from_linkpulse(err: &LinkpulseError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, err.code(), err.message())
}
