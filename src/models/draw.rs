use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::card_entity;

/// 一次交互式抽卡的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOutcome {
    /// 已发卡并写入历史
    Issued(card_entity::Model),
    /// 今日次数已用完
    LimitReached { limit: u32 },
    /// 所有卡牌都在冷却期
    Exhausted,
}

/// 每日推送统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// 订阅用户数
    pub subscribers: u32,
    /// 成功送达卡牌
    pub delivered: u32,
    /// 无可用卡牌（已发送提示）
    pub exhausted: u32,
    /// 处理失败（写入或发送出错）
    pub failed: u32,
    /// 卡牌目录为空，未处理任何用户
    pub no_cards: bool,
}
