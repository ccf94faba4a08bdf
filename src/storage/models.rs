//! 存储层领域类型与 trait 接口
//!
//! `ClickStore` 是准入引擎与存储之间的接缝，`LinkDirectory` 是链接目录
//! 的只读接缝。两者都由 `SeaOrmStorage` 实现，测试可以提供替身。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// 链接目录条目（外部应用拥有，本服务只读）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: String,
    pub profile_id: String,
    pub title: String,
    pub url: String,
    pub is_active: bool,
}

/// 待写入的点击事件（准入后的全部派生字段）
#[derive(Debug, Clone)]
pub struct NewClickEvent {
    pub id: String,
    pub link_id: String,
    pub clicked_at: DateTime<Utc>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_fingerprint: String,
    pub idempotency_key: String,
    pub is_bot: bool,
}

/// 插入结果：唯一键冲突不是错误，是并发竞争的正常裁决
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    DuplicateKey,
}

/// 点击事件账本的写入与窗口查询接口
#[async_trait]
pub trait ClickStore: Send + Sync {
    /// 幂等键是否已有记录
    async fn idempotency_key_exists(&self, key: &str) -> Result<bool>;

    /// `(link_id, fingerprint)` 在 `since` 之后是否已有准入点击
    async fn has_click_since(
        &self,
        link_id: &str,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<bool>;

    /// 统计 `(link_id, fingerprint)` 在 `since` 之后的点击数
    async fn count_clicks_since(
        &self,
        link_id: &str,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<u64>;

    /// 插入一条事件；幂等键冲突返回 `Ok(DuplicateKey)` 而非 `Err`
    async fn insert_click(&self, event: NewClickEvent) -> Result<InsertOutcome>;
}

/// 链接目录只读接口
#[async_trait]
pub trait LinkDirectory: Send + Sync {
    /// 按 id 查找链接（含 is_active 标志）
    async fn find_link(&self, link_id: &str) -> Result<Option<LinkRecord>>;

    /// 某主页名下的全部链接 id
    async fn link_ids_for_profile(&self, profile_id: &str) -> Result<Vec<String>>;
}
