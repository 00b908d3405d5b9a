use sea_orm_migration::prelude::*;

/// 卡牌目录
#[derive(DeriveIden)]
enum Cards {
    Table,
    Id,
    Description,
    Image,
    CreatedAt,
    UpdatedAt,
}

/// Bot 用户（tg_id 为 Telegram 用户 ID）
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    TgId,
    Subscription,
    Requests,
    LastRequest,
    History,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// history 列保存 JSON 对象: {"<card id>": "<ISO-8601 时间戳>"}
/// requests 同时作为乐观锁版本号使用（每次发卡 +1）
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Cards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Cards::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Cards::Description).text().not_null())
                    .col(ColumnDef::new(Cards::Image).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Cards::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Cards::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::TgId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Users::Subscription)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::Requests)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::LastRequest)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Users::History).json().not_null())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个 Telegram 用户只有一条记录
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_tg_id_unique")
                    .table(Users::Table)
                    .col(Users::TgId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 每日推送按订阅状态筛选
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_subscription")
                    .table(Users::Table)
                    .col(Users::Subscription)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Cards::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
