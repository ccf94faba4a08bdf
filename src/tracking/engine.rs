//! 点击摄取引擎
//!
//! 单次追踪请求的准入决策与落库。状态机不持久化，
//! 每次请求基于存储查询现算：
//! 精确去重 → 短窗口去重 → 频率限制 → 分类 → 写入。
//! 策略拒绝不是错误；只有存储失败才会进入重试路径。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::classifier::ClientClassifier;
use super::fingerprint::{derive_idempotency_key, derive_session_fingerprint};
use crate::storage::models::{ClickStore, InsertOutcome, NewClickEvent};

/// 输出目录常量
const TS_EXPORT_PATH: &str = "../dashboard/src/api/types.generated.ts";

/// 摄取策略（去重窗口、频率限制与重试参数）
#[derive(Debug, Clone, Copy)]
pub struct TrackingPolicy {
    /// 短窗口去重时长（秒）
    pub duplicate_window_secs: u64,
    /// 频率限制窗口时长（秒）
    pub rate_limit_window_secs: u64,
    /// 频率限制窗口内允许的最大点击数
    pub rate_limit_max_clicks: u64,
    /// 存储失败时的最大尝试次数（含首次）
    pub retry_max_attempts: u32,
    /// 线性退避基础延迟（毫秒）
    pub retry_delay_ms: u64,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self {
            duplicate_window_secs: 5,
            rate_limit_window_secs: 60,
            rate_limit_max_clicks: 10,
            retry_max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl TrackingPolicy {
    pub fn from_config() -> Self {
        let config = crate::config::get_config();
        Self {
            duplicate_window_secs: config.tracking.duplicate_window_secs,
            rate_limit_window_secs: config.tracking.rate_limit_window_secs,
            rate_limit_max_clicks: config.tracking.rate_limit_max_clicks,
            retry_max_attempts: config.tracking.retry_max_attempts,
            retry_delay_ms: config.tracking.retry_delay_ms,
        }
    }
}

/// 终态原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
pub enum TrackingReason {
    /// 幂等键已存在（同一秒内的重复点击）
    Duplicate,
    /// 短窗口内已有同会话点击（跨秒边界的连击）
    RateLimitedDuplicate,
    /// 超出频率限制窗口的点击上限
    RateLimited,
    /// 请求携带 DNT 信号，引擎未被调用
    DoNotTrack,
    /// 存储操作失败（可重试）
    DatabaseError,
    /// 重试耗尽
    MaxRetriesExceeded,
}

/// 单次追踪的最终结果
///
/// `success=false` 提示调用方可以重试；`success=true, tracked=false`
/// 是确定的策略拒绝，重试没有意义。
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResult {
    pub success: bool,
    pub tracked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<TrackingReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

impl TrackingResult {
    pub fn tracked(idempotency_key: String) -> Self {
        Self {
            success: true,
            tracked: true,
            reason: None,
            idempotency_key: Some(idempotency_key),
        }
    }

    /// 策略拒绝：正确地选择了不记录
    pub fn rejected(reason: TrackingReason, idempotency_key: String) -> Self {
        Self {
            success: true,
            tracked: false,
            reason: Some(reason),
            idempotency_key: Some(idempotency_key),
        }
    }

    pub fn do_not_track() -> Self {
        Self {
            success: true,
            tracked: false,
            reason: Some(TrackingReason::DoNotTrack),
            idempotency_key: None,
        }
    }

    pub fn database_error(idempotency_key: String) -> Self {
        Self {
            success: false,
            tracked: false,
            reason: Some(TrackingReason::DatabaseError),
            idempotency_key: Some(idempotency_key),
        }
    }

    pub fn max_retries_exceeded() -> Self {
        Self {
            success: false,
            tracked: false,
            reason: Some(TrackingReason::MaxRetriesExceeded),
            idempotency_key: None,
        }
    }
}

/// 单次追踪请求的输入快照
///
/// `occurred_at` 在构造时取当前时间，窗口判定全部以它为基准，
/// 测试可以直接注入固定时间。
#[derive(Debug, Clone)]
pub struct ClickAttempt {
    pub link_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub accept_encoding: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ClickAttempt {
    pub fn new(link_id: impl Into<String>) -> Self {
        Self {
            link_id: link_id.into(),
            ip_address: None,
            user_agent: None,
            accept_language: None,
            accept_encoding: None,
            referrer: None,
            country: None,
            occurred_at: Utc::now(),
        }
    }
}

/// 点击摄取引擎
pub struct ClickIngestionEngine {
    store: Arc<dyn ClickStore>,
    classifier: ClientClassifier,
    policy: TrackingPolicy,
}

impl ClickIngestionEngine {
    pub fn new(
        store: Arc<dyn ClickStore>,
        classifier: ClientClassifier,
        policy: TrackingPolicy,
    ) -> Self {
        Self {
            store,
            classifier,
            policy,
        }
    }

    /// 单次准入决策
    ///
    /// 永不返回 Err：存储失败折叠为 `database_error` 结果，
    /// 访客的页面加载不能因为追踪失败而失败。
    pub async fn track(&self, attempt: &ClickAttempt) -> TrackingResult {
        let fingerprint = derive_session_fingerprint(
            attempt.ip_address.as_deref(),
            attempt.user_agent.as_deref(),
            attempt.accept_language.as_deref(),
            attempt.accept_encoding.as_deref(),
        );
        let idempotency_key = derive_idempotency_key(
            &attempt.link_id,
            &fingerprint,
            attempt.occurred_at.timestamp_millis(),
        );

        // 精确去重：幂等键已存在
        match self.store.idempotency_key_exists(&idempotency_key).await {
            Ok(true) => {
                debug!(
                    "Duplicate click ignored (link: {}, key: {})",
                    attempt.link_id, idempotency_key
                );
                return TrackingResult::rejected(TrackingReason::Duplicate, idempotency_key);
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Idempotency lookup failed (link: {}): {}", attempt.link_id, e);
                return TrackingResult::database_error(idempotency_key);
            }
        }

        // 短窗口去重：跨秒边界的连击
        let duplicate_since =
            attempt.occurred_at - Duration::seconds(self.policy.duplicate_window_secs as i64);
        match self
            .store
            .has_click_since(&attempt.link_id, &fingerprint, duplicate_since)
            .await
        {
            Ok(true) => {
                debug!(
                    "Near-duplicate click ignored (link: {}, fingerprint: {})",
                    attempt.link_id, fingerprint
                );
                return TrackingResult::rejected(
                    TrackingReason::RateLimitedDuplicate,
                    idempotency_key,
                );
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    "Duplicate-window lookup failed (link: {}): {}",
                    attempt.link_id, e
                );
                return TrackingResult::database_error(idempotency_key);
            }
        }

        // 频率限制：长窗口内的点击计数
        let rate_since =
            attempt.occurred_at - Duration::seconds(self.policy.rate_limit_window_secs as i64);
        match self
            .store
            .count_clicks_since(&attempt.link_id, &fingerprint, rate_since)
            .await
        {
            Ok(count) if count >= self.policy.rate_limit_max_clicks => {
                debug!(
                    "Rate limit hit (link: {}, fingerprint: {}, count: {})",
                    attempt.link_id, fingerprint, count
                );
                return TrackingResult::rejected(TrackingReason::RateLimited, idempotency_key);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "Rate-limit lookup failed (link: {}): {}",
                    attempt.link_id, e
                );
                return TrackingResult::database_error(idempotency_key);
            }
        }

        // 分类与写入
        let user_agent = attempt.user_agent.as_deref();
        let event = NewClickEvent {
            id: Uuid::new_v4().to_string(),
            link_id: attempt.link_id.clone(),
            clicked_at: attempt.occurred_at,
            referrer: attempt.referrer.clone(),
            country: attempt.country.clone(),
            device: self.classifier.detect_device(user_agent).map(|d| d.to_string()),
            browser: self
                .classifier
                .detect_browser(user_agent)
                .map(|b| b.to_string()),
            ip_address: attempt.ip_address.clone(),
            user_agent: attempt.user_agent.clone(),
            session_fingerprint: fingerprint,
            idempotency_key: idempotency_key.clone(),
            is_bot: self.classifier.is_bot(user_agent),
        };

        match self.store.insert_click(event).await {
            Ok(InsertOutcome::Inserted) => TrackingResult::tracked(idempotency_key),
            // 并发相同请求抢先写入了同一幂等键
            Ok(InsertOutcome::DuplicateKey) => {
                debug!(
                    "Concurrent duplicate resolved (link: {}, key: {})",
                    attempt.link_id, idempotency_key
                );
                TrackingResult::rejected(TrackingReason::Duplicate, idempotency_key)
            }
            Err(e) => {
                warn!("Click insert failed (link: {}): {}", attempt.link_id, e);
                TrackingResult::database_error(idempotency_key)
            }
        }
    }

    /// 带线性退避的重试包装
    ///
    /// 只在 `database_error` 结果上重试；任何其他结果立即返回。
    /// 第 n 次失败后等待 `retry_delay_ms * n` 毫秒再试。
    pub async fn track_with_retry(&self, attempt: &ClickAttempt) -> TrackingResult {
        let max_attempts = self.policy.retry_max_attempts;
        for attempt_number in 1..=max_attempts {
            let result = self.track(attempt).await;
            if result.reason != Some(TrackingReason::DatabaseError) {
                return result;
            }
            if attempt_number < max_attempts {
                let delay = self.policy.retry_delay_ms * u64::from(attempt_number);
                debug!(
                    "Tracking attempt {}/{} failed, retrying in {} ms (link: {})",
                    attempt_number, max_attempts, delay, attempt.link_id
                );
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            }
        }

        warn!(
            "Tracking gave up after {} attempts (link: {})",
            max_attempts, attempt.link_id
        );
        TrackingResult::max_retries_exceeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LinkpulseError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 内存实现的 ClickStore，可注入指定次数的写入失败
    struct MemoryClickStore {
        events: Mutex<Vec<NewClickEvent>>,
        insert_failures: AtomicU32,
        insert_calls: AtomicU32,
    }

    impl MemoryClickStore {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                insert_failures: AtomicU32::new(0),
                insert_calls: AtomicU32::new(0),
            }
        }

        fn with_failures(n: u32) -> Self {
            let store = Self::new();
            store.insert_failures.store(n, Ordering::SeqCst);
            store
        }

        fn seed(&self, event: NewClickEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn event_count(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ClickStore for MemoryClickStore {
        async fn idempotency_key_exists(&self, key: &str) -> crate::errors::Result<bool> {
            let events = self.events.lock().unwrap();
            Ok(events.iter().any(|e| e.idempotency_key == key))
        }

        async fn has_click_since(
            &self,
            link_id: &str,
            fingerprint: &str,
            since: DateTime<Utc>,
        ) -> crate::errors::Result<bool> {
            Ok(self.count_clicks_since(link_id, fingerprint, since).await? > 0)
        }

        async fn count_clicks_since(
            &self,
            link_id: &str,
            fingerprint: &str,
            since: DateTime<Utc>,
        ) -> crate::errors::Result<u64> {
            let events = self.events.lock().unwrap();
            Ok(events
                .iter()
                .filter(|e| {
                    e.link_id == link_id
                        && e.session_fingerprint == fingerprint
                        && e.clicked_at >= since
                })
                .count() as u64)
        }

        async fn insert_click(
            &self,
            event: NewClickEvent,
        ) -> crate::errors::Result<InsertOutcome> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            if self.insert_failures.load(Ordering::SeqCst) > 0 {
                self.insert_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(LinkpulseError::database_operation(
                    "simulated insert failure",
                ));
            }
            let mut events = self.events.lock().unwrap();
            if events
                .iter()
                .any(|e| e.idempotency_key == event.idempotency_key)
            {
                return Ok(InsertOutcome::DuplicateKey);
            }
            events.push(event);
            Ok(InsertOutcome::Inserted)
        }
    }

    fn test_classifier() -> ClientClassifier {
        ClientClassifier::new(&crate::config::TrackingConfig::default().bot_tokens)
    }

    fn fast_policy() -> TrackingPolicy {
        TrackingPolicy {
            retry_delay_ms: 1, // 测试中不等待真实退避
            ..TrackingPolicy::default()
        }
    }

    fn engine_with(store: Arc<MemoryClickStore>) -> ClickIngestionEngine {
        ClickIngestionEngine::new(store, test_classifier(), fast_policy())
    }

    fn attempt_at(link_id: &str, occurred_at: DateTime<Utc>) -> ClickAttempt {
        ClickAttempt {
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            accept_language: Some("en-US,en;q=0.9".to_string()),
            accept_encoding: Some("gzip, deflate, br".to_string()),
            referrer: Some("https://example.com/profile".to_string()),
            country: Some("US".to_string()),
            occurred_at,
            ..ClickAttempt::new(link_id)
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    // ===== 准入路径 =====

    #[tokio::test]
    async fn first_click_is_tracked() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());

        let result = engine.track(&attempt_at("L1", base_time())).await;

        assert!(result.success);
        assert!(result.tracked);
        assert!(result.reason.is_none());
        assert_eq!(store.event_count(), 1);

        let events = store.events.lock().unwrap();
        assert_eq!(events[0].idempotency_key, result.idempotency_key.unwrap());
        assert_eq!(events[0].device.as_deref(), Some("desktop"));
        assert_eq!(events[0].browser.as_deref(), Some("chrome"));
        assert!(!events[0].is_bot);
    }

    #[tokio::test]
    async fn same_second_click_is_exact_duplicate() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());
        let at = base_time();

        let first = engine.track(&attempt_at("L1", at)).await;
        let second = engine.track(&attempt_at("L1", at)).await;

        assert!(first.tracked);
        assert!(second.success);
        assert!(!second.tracked);
        assert_eq!(second.reason, Some(TrackingReason::Duplicate));
        assert_eq!(second.idempotency_key, first.idempotency_key);
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn click_inside_short_window_is_near_duplicate() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());
        let at = base_time();

        engine.track(&attempt_at("L1", at)).await;
        // 3 秒后：幂等键不同，但落在 5 秒去重窗口内
        let result = engine
            .track(&attempt_at("L1", at + Duration::seconds(3)))
            .await;

        assert!(result.success);
        assert!(!result.tracked);
        assert_eq!(result.reason, Some(TrackingReason::RateLimitedDuplicate));
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn click_outside_short_window_is_tracked() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());
        let at = base_time();

        engine.track(&attempt_at("L1", at)).await;
        let result = engine
            .track(&attempt_at("L1", at + Duration::seconds(6)))
            .await;

        assert!(result.tracked);
        assert_eq!(store.event_count(), 2);
    }

    #[tokio::test]
    async fn eleventh_click_in_window_is_rate_limited() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());
        let at = base_time();
        let attempt = attempt_at("L1", at);

        let fingerprint = derive_session_fingerprint(
            attempt.ip_address.as_deref(),
            attempt.user_agent.as_deref(),
            attempt.accept_language.as_deref(),
            attempt.accept_encoding.as_deref(),
        );

        // 预置 10 条同会话点击，最近一条在 6 秒前（避开短窗口去重）
        for i in 0..10u32 {
            let clicked_at = at - Duration::seconds(6 + i64::from(i) * 5);
            store.seed(NewClickEvent {
                id: format!("seed-{}", i),
                link_id: "L1".to_string(),
                clicked_at,
                referrer: None,
                country: None,
                device: None,
                browser: None,
                ip_address: attempt.ip_address.clone(),
                user_agent: attempt.user_agent.clone(),
                session_fingerprint: fingerprint.clone(),
                idempotency_key: format!("seed-key-{}", i),
                is_bot: false,
            });
        }

        let result = engine.track(&attempt).await;

        assert!(result.success);
        assert!(!result.tracked);
        assert_eq!(result.reason, Some(TrackingReason::RateLimited));
        assert_eq!(store.event_count(), 10);
    }

    #[tokio::test]
    async fn different_sessions_do_not_collide() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());
        let at = base_time();

        let first = attempt_at("L1", at);
        let second = ClickAttempt {
            ip_address: Some("198.51.100.42".to_string()),
            ..attempt_at("L1", at)
        };

        assert!(engine.track(&first).await.tracked);
        assert!(engine.track(&second).await.tracked);
        assert_eq!(store.event_count(), 2);
    }

    #[tokio::test]
    async fn bot_click_is_tracked_and_flagged() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());

        let attempt = ClickAttempt {
            user_agent: Some(
                "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
                    .to_string(),
            ),
            ..attempt_at("L1", base_time())
        };
        let result = engine.track(&attempt).await;

        assert!(result.tracked);
        let events = store.events.lock().unwrap();
        assert!(events[0].is_bot);
    }

    // ===== 失败与重试 =====

    #[tokio::test]
    async fn insert_failure_becomes_database_error() {
        let store = Arc::new(MemoryClickStore::with_failures(1));
        let engine = engine_with(store.clone());

        let result = engine.track(&attempt_at("L1", base_time())).await;

        assert!(!result.success);
        assert!(!result.tracked);
        assert_eq!(result.reason, Some(TrackingReason::DatabaseError));
        assert!(result.idempotency_key.is_some());
        assert_eq!(store.event_count(), 0);
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let store = Arc::new(MemoryClickStore::with_failures(2));
        let engine = engine_with(store.clone());

        let result = engine.track_with_retry(&attempt_at("L1", base_time())).await;

        assert!(result.success);
        assert!(result.tracked);
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.event_count(), 1);
    }

    #[tokio::test]
    async fn retry_exhaustion_reports_max_retries() {
        let store = Arc::new(MemoryClickStore::with_failures(10));
        let engine = engine_with(store.clone());

        let result = engine.track_with_retry(&attempt_at("L1", base_time())).await;

        assert!(!result.success);
        assert!(!result.tracked);
        assert_eq!(result.reason, Some(TrackingReason::MaxRetriesExceeded));
        assert!(result.idempotency_key.is_none());
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn policy_rejection_is_not_retried() {
        let store = Arc::new(MemoryClickStore::new());
        let engine = engine_with(store.clone());
        let at = base_time();

        engine.track(&attempt_at("L1", at)).await;
        let inserts_before = store.insert_calls.load(Ordering::SeqCst);

        let result = engine.track_with_retry(&attempt_at("L1", at)).await;

        assert_eq!(result.reason, Some(TrackingReason::Duplicate));
        // 重复命中发生在写入之前，不应产生新的写入尝试
        assert_eq!(store.insert_calls.load(Ordering::SeqCst), inserts_before);
    }

    // ===== 序列化 =====

    #[test]
    fn tracking_result_uses_camel_case_keys() {
        let value = serde_json::to_value(TrackingResult::tracked("abc123".to_string())).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "success": true,
                "tracked": true,
                "idempotencyKey": "abc123"
            })
        );
    }

    #[test]
    fn rejection_reason_serializes_snake_case() {
        let value = serde_json::to_value(TrackingResult::rejected(
            TrackingReason::RateLimitedDuplicate,
            "k".to_string(),
        ))
        .unwrap();
        assert_eq!(value["reason"], "rate_limited_duplicate");
        assert_eq!(value["success"], true);
        assert_eq!(value["tracked"], false);
    }
}
