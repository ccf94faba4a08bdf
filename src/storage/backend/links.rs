//! LinkDirectory implementation for SeaOrmStorage
//!
//! 链接目录只读查询，入口热路径带 30 秒短缓存（含负缓存）。

use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use tracing::error;

use super::{SeaOrmStorage, retry};
use crate::errors::{LinkpulseError, Result};
use crate::storage::models::{LinkDirectory, LinkRecord};

use migration::entities::link;

impl SeaOrmStorage {
    /// 链接总数（健康检查用，不走缓存不重试）
    pub async fn count_links(&self) -> Result<u64> {
        link::Entity::find()
            .count(&self.db)
            .await
            .map_err(|e| LinkpulseError::database_operation(format!("Failed to count links: {}", e)))
    }
}

impl From<link::Model> for LinkRecord {
    fn from(model: link::Model) -> Self {
        LinkRecord {
            id: model.id,
            profile_id: model.profile_id,
            title: model.title,
            url: model.url,
            is_active: model.is_active,
        }
    }
}

#[async_trait]
impl LinkDirectory for SeaOrmStorage {
    async fn find_link(&self, link_id: &str) -> Result<Option<LinkRecord>> {
        if let Some(cached) = self.link_cache.get(link_id) {
            return Ok(cached);
        }

        let db = &self.db;
        let id_owned = link_id.to_string();

        let result = retry::with_retry(
            &format!("find_link({})", link_id),
            self.retry_config,
            || async { link::Entity::find_by_id(&id_owned).one(db).await },
        )
        .await;

        match result {
            Ok(model) => {
                let record = model.map(LinkRecord::from);
                self.link_cache
                    .insert(link_id.to_string(), record.clone());
                Ok(record)
            }
            Err(e) => {
                error!("查询链接失败（重试后仍失败）: {}", e);
                Err(LinkpulseError::database_operation(format!(
                    "Failed to look up link '{}': {}",
                    link_id, e
                )))
            }
        }
    }

    async fn link_ids_for_profile(&self, profile_id: &str) -> Result<Vec<String>> {
        let db = &self.db;
        let profile_owned = profile_id.to_string();

        let ids = retry::with_retry("link_ids_for_profile", self.retry_config, || async {
            link::Entity::find()
                .filter(link::Column::ProfileId.eq(&profile_owned))
                .select_only()
                .column(link::Column::Id)
                .into_tuple::<String>()
                .all(db)
                .await
        })
        .await
        .map_err(|e| {
            LinkpulseError::database_operation(format!(
                "Failed to list links for profile '{}': {}",
                profile_id, e
            ))
        })?;

        Ok(ids)
    }
}
