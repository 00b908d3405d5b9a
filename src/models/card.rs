use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::card_entity;

const LABEL_CHARS: usize = 40;

/// 卡牌信息响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardResponse {
    pub id: i32,
    /// 列表中显示的简短标题（描述前 40 个字符）
    pub label: String,
    pub description: String,
    /// 图片文件路径
    pub image: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<card_entity::Model> for CardResponse {
    fn from(m: card_entity::Model) -> Self {
        CardResponse {
            id: m.id,
            label: card_label(&m.description),
            description: m.description,
            image: m.image,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 新建卡牌：描述 + base64 编码的图片
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateCardRequest {
    pub description: String,
    /// JPEG/PNG 图片内容 (base64)
    pub image_base64: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateCardRequest {
    pub description: String,
}

pub fn card_label(description: &str) -> String {
    let mut label: String = description.chars().take(LABEL_CHARS).collect();
    if description.chars().count() > LABEL_CHARS {
        label.push_str("...");
    }
    label
}
