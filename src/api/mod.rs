//! HTTP API 模块
//!
//! - `services`: 端点实现（intake、analytics、health）
//! - `auth`: 面板 token 校验与入口限流
//! - `helpers`: 错误响应构建

pub mod auth;
pub mod helpers;
pub mod services;
