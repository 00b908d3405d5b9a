use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Bot 用户实体
/// - tg_id: Telegram 用户 ID（唯一）
/// - requests: 累计发卡次数，同时用作乐观锁版本号
/// - history: JSON 对象 {"<card id>": "<ISO-8601>"}，读取时经 CardHistory 校验
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub tg_id: i64,
    pub subscription: bool,
    pub requests: i64,
    pub last_request: Option<DateTime<Utc>>,
    #[sea_orm(column_type = "Json")]
    pub history: Json,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
