use serde::Serialize;
use utoipa::ToSchema;

/// 管理后台统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatisticsResponse {
    pub total_users: u64,
    pub subscribers: u64,
    pub total_cards: u64,
    /// 今天（参考时区）发出的卡牌数
    pub cards_issued_today: u64,
}
