//! 点击事件表迁移
//!
//! 创建 click_events 表作为只追加的点击事件账本，包括：
//! - 去重键 (idempotency_key，全局唯一)
//! - 会话指纹 (session_fingerprint)
//! - 时间戳、来源、设备分类、地理位置信息

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 click_events 表
        manager
            .create_table(
                Table::create()
                    .table(ClickEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ClickEvents::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::LinkId)
                            .string_len(36)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::ClickedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ClickEvents::Referrer).text().null())
                    .col(ColumnDef::new(ClickEvents::Country).string_len(2).null())
                    .col(ColumnDef::new(ClickEvents::Device).string_len(16).null())
                    .col(ColumnDef::new(ClickEvents::Browser).string_len(16).null())
                    .col(
                        ColumnDef::new(ClickEvents::IpAddress)
                            .string_len(45)
                            .null(),
                    )
                    .col(ColumnDef::new(ClickEvents::UserAgent).text().null())
                    .col(
                        ColumnDef::new(ClickEvents::SessionFingerprint)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::IdempotencyKey)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClickEvents::IsBot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        // 唯一索引：idempotency_key 是事件的自然键，并发竞争由它唯一裁决
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_click_events_idempotency_key")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 复合索引（用于近期重复与限流窗口查询）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_link_fp_time")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::LinkId)
                    .col(ClickEvents::SessionFingerprint)
                    .col(ClickEvents::ClickedAt)
                    .to_owned(),
            )
            .await?;

        // 复合索引（用于单链接时间序列聚合）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_click_events_link_time")
                    .table(ClickEvents::Table)
                    .col(ClickEvents::LinkId)
                    .col(ClickEvents::ClickedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除索引
        manager
            .drop_index(
                Index::drop()
                    .name("idx_click_events_link_time")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_click_events_link_fp_time")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("uq_click_events_idempotency_key")
                    .to_owned(),
            )
            .await?;

        // 删除表
        manager
            .drop_table(Table::drop().table(ClickEvents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ClickEvents {
    #[sea_orm(iden = "click_events")]
    Table,
    Id,
    LinkId,
    ClickedAt,
    Referrer,
    Country,
    Device,
    Browser,
    IpAddress,
    UserAgent,
    SessionFingerprint,
    IdempotencyKey,
    IsBot,
}
