use crate::config::TelegramConfig;
use crate::error::{AppError, AppResult};
use crate::external::delivery::{CardDelivery, InlineKeyboard};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 文本消息与图片说明统一使用 HTML 格式
const PARSE_MODE: &str = "HTML";

/// Bot API 统一响应外壳
#[derive(Debug, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

// ---- 入站 webhook 数据（只保留用到的字段） ----

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    config: TelegramConfig,
}

impl TelegramService {
    pub fn new(config: TelegramConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    /// 校验 webhook 请求头中的 secret token（未配置时放行）
    pub fn verify_secret(&self, header: Option<&str>) -> bool {
        match self.config.webhook_secret.as_deref() {
            None | Some("") => true,
            Some(expected) => header == Some(expected),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> AppResult<()> {
        let body = SendMessageRequest {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
            reply_markup: keyboard,
        };
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;
        Self::check_response("sendMessage", chat_id, response).await
    }

    pub async fn send_photo(&self, chat_id: i64, image_path: &str, caption: &str) -> AppResult<()> {
        let bytes = tokio::fs::read(image_path).await?;
        let file_name = Path::new(image_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("card.jpg")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")?;
        let form = photo_fields(chat_id, caption)
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part("photo", part);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        Self::check_response("sendPhoto", chat_id, response).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str, text: Option<&str>) -> AppResult<()> {
        let body = AnswerCallbackQueryRequest {
            callback_query_id,
            text,
        };
        let response = self
            .client
            .post(self.method_url("answerCallbackQuery"))
            .json(&body)
            .send()
            .await?;
        Self::check_response("answerCallbackQuery", 0, response).await
    }

    async fn check_response(method: &str, chat_id: i64, response: reqwest::Response) -> AppResult<()> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let parsed: Option<TelegramResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(body) if status.is_success() && body.ok => {
                log::debug!("Telegram {method} ok: chat {chat_id}");
                Ok(())
            }
            Some(body) => {
                let description = body.description.unwrap_or_else(|| status.to_string());
                log::error!("Telegram {method} failed: chat {chat_id}, Error: {description}");
                Err(AppError::ExternalApiError(format!(
                    "Telegram {method} failed: {description}"
                )))
            }
            None => {
                log::error!("Telegram {method} failed: chat {chat_id}, HTTP {status}: {text}");
                Err(AppError::ExternalApiError(format!(
                    "Telegram {method} failed: HTTP {status}"
                )))
            }
        }
    }
}

#[async_trait]
impl CardDelivery for TelegramService {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> AppResult<()> {
        self.send_message(chat_id, text, keyboard).await
    }

    async fn send_card(&self, chat_id: i64, image_path: &str, caption: &str) -> AppResult<()> {
        self.send_photo(chat_id, image_path, caption).await
    }

    async fn answer_callback(&self, callback_id: &str) -> AppResult<()> {
        self.answer_callback_query(callback_id, None).await
    }
}

/// sendPhoto 表单中除图片外的字段
fn photo_fields(chat_id: i64, caption: &str) -> [(&'static str, String); 3] {
    [
        ("chat_id", chat_id.to_string()),
        ("caption", caption.to_string()),
        ("parse_mode", PARSE_MODE.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base_url: "https://api.telegram.org/".to_string(),
            webhook_secret: secret.map(str::to_string),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_method_url() {
        let service = TelegramService::new(config(None)).unwrap();
        assert_eq!(
            service.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_message_and_photo_share_parse_mode() {
        let body = serde_json::to_value(SendMessageRequest {
            chat_id: 7,
            text: "<b>hi</b>",
            parse_mode: PARSE_MODE,
            reply_markup: None,
        })
        .unwrap();
        assert_eq!(body["parse_mode"], "HTML");
        assert!(body.get("reply_markup").is_none());

        let fields = photo_fields(7, "<b>Карта дня</b>");
        assert!(fields.contains(&("parse_mode", "HTML".to_string())));
        assert!(fields.contains(&("chat_id", "7".to_string())));
    }

    #[test]
    fn test_verify_secret() {
        let open = TelegramService::new(config(None)).unwrap();
        assert!(open.verify_secret(None));

        let guarded = TelegramService::new(config(Some("s3cret"))).unwrap();
        assert!(guarded.verify_secret(Some("s3cret")));
        assert!(!guarded.verify_secret(Some("nope")));
        assert!(!guarded.verify_secret(None));
    }

    #[test]
    fn test_parse_callback_update() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "callback_query": {
                "id": "cb1",
                "from": { "id": 555, "is_bot": false, "first_name": "Ann" },
                "message": {
                    "message_id": 3,
                    "chat": { "id": 555, "type": "private" },
                    "date": 1700000000,
                    "text": "Главное меню"
                },
                "chat_instance": "x",
                "data": "card"
            }
        }))
        .unwrap();

        let callback = update.callback_query.unwrap();
        assert_eq!(callback.from.id, 555);
        assert_eq!(callback.data.as_deref(), Some("card"));
        assert_eq!(callback.message.unwrap().chat.id, 555);
    }
}
