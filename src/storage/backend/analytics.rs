//! Analytics 相关的数据库查询
//!
//! 提供点击事件的统计查询方法，供 AnalyticsService 调用。
//! 所有方法均为只读；link_ids 为空集时由上层短路，这里不做特判
//! （sea-query 会把空 IN 展开为恒假条件，结果自然为零/空）。

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::Expr,
};

use migration::entities::click_event;

// ============ 查询结果类型 ============

/// 趋势查询结果行（label 为数据库端格式化后的日期串）
#[derive(Debug, FromQueryResult)]
pub struct TrendRow {
    pub label: String,
    pub count: i64,
}

/// 分类统计结果行（country/device/browser 均可为 NULL）
#[derive(Debug, FromQueryResult)]
pub struct CategoryRow {
    pub label: Option<String>,
    pub count: i64,
}

/// 按链接聚合的计数行
#[derive(Debug, FromQueryResult)]
pub struct LinkCountRow {
    pub link_id: String,
    pub count: i64,
}

// ============ SeaOrmStorage Analytics 方法 ============

impl super::SeaOrmStorage {
    /// 构造事件查询的统一过滤条件（gte/lte 独立生效，支持半开区间）
    fn scope_condition(
        link_ids: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
    ) -> Condition {
        let mut cond = Condition::all()
            .add(click_event::Column::LinkId.is_in(link_ids.iter().map(String::as_str)));
        if let Some(start) = start {
            cond = cond.add(click_event::Column::ClickedAt.gte(start));
        }
        if let Some(end) = end {
            cond = cond.add(click_event::Column::ClickedAt.lte(end));
        }
        if !include_bots {
            cond = cond.add(click_event::Column::IsBot.eq(false));
        }
        cond
    }

    /// 统计指定链接集合的事件总数
    pub async fn count_events(
        &self,
        link_ids: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
    ) -> anyhow::Result<u64> {
        click_event::Entity::find()
            .filter(Self::scope_condition(link_ids, start, end, include_bots))
            .count(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 获取点击趋势（按数据库端日期表达式分组，label 升序）
    pub async fn get_trend(
        &self,
        link_ids: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
        date_expr: Expr,
    ) -> anyhow::Result<Vec<TrendRow>> {
        click_event::Entity::find()
            .select_only()
            .column_as(date_expr.clone(), "label")
            .column_as(click_event::Column::Id.count(), "count")
            .filter(Self::scope_condition(link_ids, start, end, include_bots))
            .group_by(date_expr)
            .order_by_asc(Expr::cust("label"))
            .into_model::<TrendRow>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 按单个分类列（country/device/browser）统计，count 降序
    pub async fn get_breakdown(
        &self,
        link_ids: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
        column: click_event::Column,
    ) -> anyhow::Result<Vec<CategoryRow>> {
        click_event::Entity::find()
            .select_only()
            .column_as(column, "label")
            .column_as(click_event::Column::Id.count(), "count")
            .filter(Self::scope_condition(link_ids, start, end, include_bots))
            .group_by(column)
            .order_by_desc(Expr::cust("count"))
            .into_model::<CategoryRow>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 获取去重后的非空 referrer 列表
    pub async fn get_referrers(
        &self,
        link_ids: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
    ) -> anyhow::Result<Vec<String>> {
        let rows = click_event::Entity::find()
            .select_only()
            .column(click_event::Column::Referrer)
            .distinct()
            .filter(Self::scope_condition(link_ids, start, end, include_bots))
            .filter(click_event::Column::Referrer.is_not_null())
            .into_tuple::<Option<String>>()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().flatten().collect())
    }

    /// 获取链接集合内的热门链接（count 降序，截断到 limit）
    pub async fn get_top_links(
        &self,
        link_ids: &[String],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
        limit: u64,
    ) -> anyhow::Result<Vec<LinkCountRow>> {
        click_event::Entity::find()
            .select_only()
            .column(click_event::Column::LinkId)
            .column_as(click_event::Column::Id.count(), "count")
            .filter(Self::scope_condition(link_ids, start, end, include_bots))
            .group_by(click_event::Column::LinkId)
            .order_by_desc(Expr::cust("count"))
            .limit(limit)
            .into_model::<LinkCountRow>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 获取链接集合的逐链接计数（全量，缺失的链接由上层补零）
    pub async fn get_per_link_counts(
        &self,
        link_ids: &[String],
        include_bots: bool,
    ) -> anyhow::Result<Vec<LinkCountRow>> {
        click_event::Entity::find()
            .select_only()
            .column(click_event::Column::LinkId)
            .column_as(click_event::Column::Id.count(), "count")
            .filter(Self::scope_condition(link_ids, None, None, include_bots))
            .group_by(click_event::Column::LinkId)
            .into_model::<LinkCountRow>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 单链接计数（带 TTL 缓存，供仪表盘角标高频轮询）
    pub async fn cached_link_count(&self, link_id: &str, include_bots: bool) -> anyhow::Result<u64> {
        let cache_key = super::count_cache_key(link_id, include_bots);
        if let Some(cached) = self.count_cache.get(&cache_key) {
            return Ok(cached);
        }

        let ids = [link_id.to_string()];
        let count = self.count_events(&ids, None, None, include_bots).await?;
        self.count_cache.insert(cache_key, count);
        Ok(count)
    }

    /// 导出点击事件明细（最近优先）
    pub async fn export_events(
        &self,
        link_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        include_bots: bool,
        limit: u64,
    ) -> anyhow::Result<Vec<click_event::Model>> {
        let ids = [link_id.to_string()];
        click_event::Entity::find()
            .filter(Self::scope_condition(&ids, start, end, include_bots))
            .order_by_desc(click_event::Column::ClickedAt)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }
}
