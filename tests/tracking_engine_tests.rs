//! 摄取引擎 + SQLite 存储集成测试
//!
//! 覆盖准入阶梯在真实数据库上的裁决：
//! 精确去重、短窗口去重、频率限制、bot 标记、
//! 并发同键写入与跨链接的指纹隔离。

use std::sync::{Arc, Once};

use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tempfile::TempDir;

use linkpulse::config::init_config;
use linkpulse::storage::SeaOrmStorage;
use linkpulse::tracking::{
    ClickAttempt, ClickIngestionEngine, ClientClassifier, TrackingPolicy, TrackingReason,
};
use migration::entities::{click_event, link};

// =============================================================================
// 全局初始化与辅助函数
// =============================================================================

static INIT: Once = Once::new();

fn init_static_config() {
    INIT.call_once(|| {
        init_config();
    });
}

async fn create_temp_storage() -> (Arc<SeaOrmStorage>, TempDir) {
    init_static_config();
    let td = TempDir::new().unwrap();
    let p = td.path().join("engine_test.db");
    let u = format!("sqlite://{}?mode=rwc", p.display());
    let s = SeaOrmStorage::new(&u, "sqlite").await.unwrap();
    (Arc::new(s), td)
}

async fn seed_link(storage: &SeaOrmStorage, id: &str, profile_id: &str, active: bool) {
    let model = link::ActiveModel {
        id: Set(id.to_string()),
        profile_id: Set(profile_id.to_string()),
        title: Set(format!("Link {}", id)),
        url: Set(format!("https://example.com/{}", id)),
        is_active: Set(active),
    };
    link::Entity::insert(model)
        .exec(storage.get_db())
        .await
        .unwrap();
}

fn make_engine(storage: &Arc<SeaOrmStorage>) -> ClickIngestionEngine {
    let bot_tokens = vec![
        "googlebot".to_string(),
        "bot".to_string(),
        "headless".to_string(),
    ];
    ClickIngestionEngine::new(
        storage.clone(),
        ClientClassifier::new(&bot_tokens),
        TrackingPolicy::default(),
    )
}

/// 固定基准时间，窗口判定以 `occurred_at` 为基准，测试可离线复现
fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn visitor_attempt(link_id: &str, ip: &str, at: DateTime<Utc>) -> ClickAttempt {
    ClickAttempt {
        ip_address: Some(ip.to_string()),
        user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Safari/604.1".to_string()),
        accept_language: Some("en-US,en;q=0.9".to_string()),
        accept_encoding: Some("gzip, deflate, br".to_string()),
        occurred_at: at,
        ..ClickAttempt::new(link_id)
    }
}

async fn count_rows(storage: &SeaOrmStorage) -> u64 {
    click_event::Entity::find()
        .count(storage.get_db())
        .await
        .unwrap()
}

// =============================================================================
// 准入阶梯测试
// =============================================================================

#[cfg(test)]
mod admission_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_click_is_recorded() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);

        let result = engine
            .track(&visitor_attempt("lnk-1", "203.0.113.1", base_time()))
            .await;

        assert!(result.success);
        assert!(result.tracked);
        assert!(result.reason.is_none());
        assert!(result.idempotency_key.is_some());
        assert_eq!(count_rows(&storage).await, 1);
    }

    #[tokio::test]
    async fn test_same_second_repeat_is_exact_duplicate() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);
        let attempt = visitor_attempt("lnk-1", "203.0.113.1", base_time());

        let first = engine.track(&attempt).await;
        let second = engine.track(&attempt).await;

        assert!(first.tracked);
        assert!(second.success, "策略拒绝不是失败");
        assert!(!second.tracked);
        assert_eq!(second.reason, Some(TrackingReason::Duplicate));
        // 两次得到同一个幂等键
        assert_eq!(first.idempotency_key, second.idempotency_key);
        assert_eq!(count_rows(&storage).await, 1);
    }

    #[tokio::test]
    async fn test_rapid_clicks_across_seconds_hit_duplicate_window() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);
        let t0 = base_time();

        let first = engine.track(&visitor_attempt("lnk-1", "203.0.113.1", t0)).await;
        // 2 秒后：幂等键不同，但仍在 5 秒去重窗口内
        let second = engine
            .track(&visitor_attempt("lnk-1", "203.0.113.1", t0 + Duration::seconds(2)))
            .await;

        assert!(first.tracked);
        assert!(!second.tracked);
        assert_eq!(second.reason, Some(TrackingReason::RateLimitedDuplicate));
        assert_ne!(first.idempotency_key, second.idempotency_key);
        assert_eq!(count_rows(&storage).await, 1);
    }

    #[tokio::test]
    async fn test_eleventh_click_in_window_is_rate_limited() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);
        let t0 = base_time();

        // 每 6 秒一次点击，避开 5 秒去重窗口，10 次都应被记录
        for i in 0..10i64 {
            let result = engine
                .track(&visitor_attempt(
                    "lnk-1",
                    "203.0.113.1",
                    t0 + Duration::seconds(i * 6),
                ))
                .await;
            assert!(result.tracked, "第 {} 次点击应被记录: {:?}", i + 1, result);
        }

        // 第 11 次仍在 60 秒窗口内（窗口起点恰好包含 t0 的点击）
        let eleventh = engine
            .track(&visitor_attempt(
                "lnk-1",
                "203.0.113.1",
                t0 + Duration::seconds(60),
            ))
            .await;

        assert!(eleventh.success);
        assert!(!eleventh.tracked);
        assert_eq!(eleventh.reason, Some(TrackingReason::RateLimited));
        assert_eq!(count_rows(&storage).await, 10);
    }

    #[tokio::test]
    async fn test_distinct_visitors_are_not_limited() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);
        let t0 = base_time();

        // 11 个不同 IP 在同一窗口内各点一次，指纹互不相同
        for i in 0..11i64 {
            let ip = format!("203.0.113.{}", 10 + i);
            let result = engine
                .track(&visitor_attempt("lnk-1", &ip, t0 + Duration::seconds(i)))
                .await;
            assert!(result.tracked, "访客 {} 不应被限流", ip);
        }

        assert_eq!(count_rows(&storage).await, 11);
    }

    #[tokio::test]
    async fn test_same_visitor_different_links_not_deduplicated() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        seed_link(&storage, "lnk-2", "prof-1", true).await;
        let engine = make_engine(&storage);
        let t0 = base_time();

        // 同一秒内点击两个不同链接：幂等键含 link_id，互不影响
        let first = engine.track(&visitor_attempt("lnk-1", "203.0.113.1", t0)).await;
        let second = engine.track(&visitor_attempt("lnk-2", "203.0.113.1", t0)).await;

        assert!(first.tracked);
        assert!(second.tracked);
        assert_eq!(count_rows(&storage).await, 2);
    }
}

// =============================================================================
// bot 标记与并发写入
// =============================================================================

#[cfg(test)]
mod classification_tests {
    use super::*;

    #[tokio::test]
    async fn test_bot_clicks_are_recorded_and_flagged() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);

        let attempt = ClickAttempt {
            ip_address: Some("66.249.66.1".to_string()),
            user_agent: Some(
                "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
                    .to_string(),
            ),
            occurred_at: base_time(),
            ..ClickAttempt::new("lnk-1")
        };
        let result = engine.track(&attempt).await;

        // bot 点击照常入账，只做标记，过滤交给查询端
        assert!(result.tracked);

        let row = click_event::Entity::find()
            .filter(click_event::Column::LinkId.eq("lnk-1"))
            .one(storage.get_db())
            .await
            .unwrap()
            .expect("事件应已写入");
        assert!(row.is_bot);
    }

    #[tokio::test]
    async fn test_device_and_browser_derived_from_user_agent() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);

        let result = engine
            .track(&visitor_attempt("lnk-1", "203.0.113.1", base_time()))
            .await;
        assert!(result.tracked);

        let row = click_event::Entity::find()
            .one(storage.get_db())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.device.as_deref(), Some("mobile"));
        assert_eq!(row.browser.as_deref(), Some("safari"));
        assert!(!row.is_bot);
    }

    #[tokio::test]
    async fn test_concurrent_same_attempt_writes_single_row() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = Arc::new(make_engine(&storage));
        let attempt = visitor_attempt("lnk-1", "203.0.113.1", base_time());

        let (r1, r2) = tokio::join!(engine.track(&attempt), engine.track(&attempt));

        // 唯一索引是最终裁决：恰好一行落库
        assert_eq!(count_rows(&storage).await, 1);
        let tracked_count = [&r1, &r2].iter().filter(|r| r.tracked).count();
        assert_eq!(tracked_count, 1, "恰好一次写入成功: {:?} {:?}", r1, r2);
        for r in [&r1, &r2] {
            if !r.tracked {
                assert_eq!(r.reason, Some(TrackingReason::Duplicate));
            }
        }
    }
}

// =============================================================================
// 元数据缺失时的回退
// =============================================================================

#[cfg(test)]
mod fallback_tests {
    use super::*;

    #[tokio::test]
    async fn test_click_without_metadata_still_recorded() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);

        // 无 IP、无 UA：指纹退化为 "unknown" 占位的哈希，仍可入账
        let attempt = ClickAttempt {
            occurred_at: base_time(),
            ..ClickAttempt::new("lnk-1")
        };
        let result = engine.track(&attempt).await;

        assert!(result.tracked);
        let row = click_event::Entity::find()
            .one(storage.get_db())
            .await
            .unwrap()
            .unwrap();
        assert!(row.ip_address.is_none());
        assert!(row.device.is_none());
        assert!(row.browser.is_none());
        assert_eq!(row.session_fingerprint.len(), 16);
        assert_eq!(row.idempotency_key.len(), 32);
    }

    #[tokio::test]
    async fn test_anonymous_visitors_share_fingerprint() {
        let (storage, _td) = create_temp_storage().await;
        seed_link(&storage, "lnk-1", "prof-1", true).await;
        let engine = make_engine(&storage);
        let t0 = base_time();

        // 两个无元数据的请求共享同一退化指纹，第二次落入去重窗口
        let first = engine
            .track(&ClickAttempt {
                occurred_at: t0,
                ..ClickAttempt::new("lnk-1")
            })
            .await;
        let second = engine
            .track(&ClickAttempt {
                occurred_at: t0 + Duration::seconds(3),
                ..ClickAttempt::new("lnk-1")
            })
            .await;

        assert!(first.tracked);
        assert!(!second.tracked);
        assert_eq!(second.reason, Some(TrackingReason::RateLimitedDuplicate));
    }
}
