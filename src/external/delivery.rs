use crate::error::AppResult;
use async_trait::async_trait;
use serde::Serialize;

/// One inline button: either a callback action or an external link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Telegram `InlineKeyboardMarkup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// 按 sizes 分行：sizes = (2, 1) 表示第一行 2 个，之后每行 1 个；
    /// 最后一个数值重复使用直到按钮用完。
    pub fn from_buttons(buttons: Vec<InlineButton>, sizes: &[usize]) -> Self {
        let mut rows: Vec<Vec<InlineButton>> = Vec::new();
        let mut iter = buttons.into_iter().peekable();
        let mut size_idx = 0;

        while iter.peek().is_some() {
            let size = sizes
                .get(size_idx)
                .or(sizes.last())
                .copied()
                .unwrap_or(1)
                .max(1);
            rows.push(iter.by_ref().take(size).collect());
            size_idx += 1;
        }

        Self {
            inline_keyboard: rows,
        }
    }
}

/// 向用户发送消息的通道（Telegram 实现见 TelegramService）
#[async_trait]
pub trait CardDelivery: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> AppResult<()>;

    /// 发送卡牌图片（本地文件）并附带说明文字
    async fn send_card(&self, chat_id: i64, image_path: &str, caption: &str) -> AppResult<()>;

    /// 结束按钮的 loading 状态；不支持回调的通道可忽略
    async fn answer_callback(&self, _callback_id: &str) -> AppResult<()> {
        Ok(())
    }
}
