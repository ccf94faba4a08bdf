//! 点击跟踪核心：指纹推导、UA 分类、准入引擎
//!
//! 三个子模块都不持有全局状态：
//! - `fingerprint`：纯函数，从请求元数据推导会话指纹与幂等键
//! - `classifier`：纯函数，按有序规则表识别 bot / 设备 / 浏览器
//! - `engine`：准入状态机，唯一的序列化点是存储层的唯一索引

pub mod classifier;
pub mod engine;
pub mod fingerprint;

pub use classifier::{Browser, ClientClassifier, Device};
pub use engine::{
    ClickAttempt, ClickIngestionEngine, TrackingPolicy, TrackingReason, TrackingResult,
};
pub use fingerprint::{derive_idempotency_key, derive_session_fingerprint};
