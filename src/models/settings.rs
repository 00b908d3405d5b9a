use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 可由管理员修改的 Bot 设置（settings.json）
///
/// 每次请求 / 每次推送只读取一份快照，计算过程中不再读取文件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct BotSettings {
    /// "购买卡牌" 按钮链接
    pub buy_cards_link: String,
    /// "完整牌阵" 按钮链接
    pub full_card_link: String,
    /// 每日推送的小时 (0-23, 参考时区)
    pub notification_time: u32,
    /// 推送的星期: "0"=周一 ... "6"=周日
    pub notification_days: Vec<String>,
    /// 每日最多抽卡次数；为空时使用默认值 3
    pub cards_limit: Option<u32>,
    /// 定时推送是否开启
    pub scheduler_status: bool,
    pub help_text: String,
    pub start_text: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            buy_cards_link: "https://www.google.com/".to_string(),
            full_card_link: "https://www.google.com/".to_string(),
            notification_time: 0,
            notification_days: vec!["0".to_string()],
            cards_limit: Some(3),
            scheduler_status: false,
            help_text: "Empty. Заполните вручную".to_string(),
            start_text: "Empty. Заполните вручную".to_string(),
        }
    }
}

const FALLBACK_LINK: &str = "https://example.com/";

impl BotSettings {
    pub fn buy_cards_url(&self) -> &str {
        if self.buy_cards_link.is_empty() {
            FALLBACK_LINK
        } else {
            &self.buy_cards_link
        }
    }

    pub fn full_card_url(&self) -> &str {
        if self.full_card_link.is_empty() {
            FALLBACK_LINK
        } else {
            &self.full_card_link
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateLinksRequest {
    #[schema(example = "https://shop.example.com/cards")]
    pub buy_cards_link: Option<String>,
    pub full_card_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateTextsRequest {
    pub help_text: Option<String>,
    pub start_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateLimitsRequest {
    #[schema(example = 3)]
    pub cards_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateNotificationTimeRequest {
    /// 0-23
    #[schema(example = 9)]
    pub hour: u32,
}

/// 定时推送状态
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerStatusResponse {
    /// 后台任务是否在运行
    pub running: bool,
    /// settings.json 中记录的开关
    pub scheduler_status: bool,
    pub notification_time: u32,
    pub notification_days: Vec<String>,
    /// 例如 "0 9 * * mon,fri"
    pub cron: String,
}
