//! ClickStore implementation for SeaOrmStorage
//!
//! 点击事件的写入与去重窗口查询。所有查询走参数化 DSL，
//! 唯一索引冲突通过 `DbErr::sql_err()` 按类型识别，不做字符串匹配。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, SqlErr};
use tracing::debug;

use super::{SeaOrmStorage, retry};
use crate::errors::{LinkpulseError, Result};
use crate::storage::models::{ClickStore, InsertOutcome, NewClickEvent};

use migration::entities::click_event;

#[async_trait]
impl ClickStore for SeaOrmStorage {
    async fn idempotency_key_exists(&self, key: &str) -> Result<bool> {
        let db = &self.db;
        let key_owned = key.to_string();

        let count = retry::with_retry("idempotency_key_exists", self.retry_config, || async {
            click_event::Entity::find()
                .filter(click_event::Column::IdempotencyKey.eq(&key_owned))
                .count(db)
                .await
        })
        .await
        .map_err(|e| {
            LinkpulseError::database_operation(format!("幂等键查询失败（重试后仍失败）: {}", e))
        })?;

        Ok(count > 0)
    }

    async fn has_click_since(
        &self,
        link_id: &str,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let count = self.count_clicks_since(link_id, fingerprint, since).await?;
        Ok(count > 0)
    }

    async fn count_clicks_since(
        &self,
        link_id: &str,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<u64> {
        let db = &self.db;
        let link_owned = link_id.to_string();
        let fp_owned = fingerprint.to_string();

        let count = retry::with_retry("count_clicks_since", self.retry_config, || async {
            click_event::Entity::find()
                .filter(click_event::Column::LinkId.eq(&link_owned))
                .filter(click_event::Column::SessionFingerprint.eq(&fp_owned))
                .filter(click_event::Column::ClickedAt.gte(since))
                .count(db)
                .await
        })
        .await
        .map_err(|e| {
            LinkpulseError::database_operation(format!("窗口计数查询失败（重试后仍失败）: {}", e))
        })?;

        Ok(count)
    }

    async fn insert_click(&self, event: NewClickEvent) -> Result<InsertOutcome> {
        let db = &self.db;

        let model = click_event::ActiveModel {
            id: Set(event.id.clone()),
            link_id: Set(event.link_id.clone()),
            clicked_at: Set(event.clicked_at),
            referrer: Set(event.referrer.clone()),
            country: Set(event.country.clone()),
            device: Set(event.device.clone()),
            browser: Set(event.browser.clone()),
            ip_address: Set(event.ip_address.clone()),
            user_agent: Set(event.user_agent.clone()),
            session_fingerprint: Set(event.session_fingerprint.clone()),
            idempotency_key: Set(event.idempotency_key.clone()),
            is_bot: Set(event.is_bot),
        };

        let result = retry::with_retry("insert_click", self.retry_config, || async {
            click_event::Entity::insert(model.clone()).exec(db).await
        })
        .await;

        match result {
            Ok(_) => {
                self.invalidate_link_count(&event.link_id);
                debug!(
                    "Click event written to {} database (link: {})",
                    self.backend_name.to_uppercase(),
                    event.link_id
                );
                Ok(InsertOutcome::Inserted)
            }
            // 唯一索引命中：并发写入同一幂等键，按类型识别后交给调用方归类
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                debug!(
                    "Idempotency key collision on insert (link: {}, key: {})",
                    event.link_id, event.idempotency_key
                );
                Ok(InsertOutcome::DuplicateKey)
            }
            Err(e) => Err(LinkpulseError::database_operation(format!(
                "点击事件写入失败（重试后仍失败）: {}",
                e
            ))),
        }
    }
}
