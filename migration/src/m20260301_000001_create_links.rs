use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 links 表（链接目录，由外部应用维护，本服务只读）
        manager
            .create_table(
                Table::create()
                    .table(Links::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Links::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Links::ProfileId).string_len(36).not_null())
                    .col(ColumnDef::new(Links::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Links::Url).text().not_null())
                    .col(
                        ColumnDef::new(Links::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 profile_id 索引（用于按主页聚合查询）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_links_profile_id")
                    .table(Links::Table)
                    .col(Links::ProfileId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除索引
        manager
            .drop_index(Index::drop().name("idx_links_profile_id").to_owned())
            .await?;

        // 删除表
        manager
            .drop_table(Table::drop().table(Links::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Links {
    #[sea_orm(iden = "links")]
    Table,
    Id,
    ProfileId,
    Title,
    Url,
    IsActive,
}
