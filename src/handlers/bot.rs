use crate::error::{AppError, AppResult};
use crate::external::{CallbackQuery, CardDelivery, InlineButton, InlineKeyboard, Message, TelegramService, Update};
use crate::models::{BotSettings, DrawOutcome};
use crate::services::{DrawService, SettingsService};
use crate::utils::texts;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{debug, error, info, warn};
use std::sync::Arc;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

pub const CALLBACK_CARD: &str = "card";
pub const CALLBACK_SUBSCRIBE: &str = "subscribe";
pub const CALLBACK_UNSUBSCRIBE: &str = "unsubscribe";

/// Bot 对话所需的服务
#[derive(Clone)]
pub struct BotContext {
    pub delivery: Arc<dyn CardDelivery>,
    pub draws: DrawService,
    pub settings: SettingsService,
}

/// 主菜单：第一行 "Карта дня" + "Купить карты"，之后每行一个
pub fn main_menu(settings: &BotSettings, subscribed: bool) -> InlineKeyboard {
    let toggle = if subscribed {
        InlineButton::callback(texts::UNSUBSCRIBE_BUTTON, CALLBACK_UNSUBSCRIBE)
    } else {
        InlineButton::callback(texts::SUBSCRIBE_BUTTON, CALLBACK_SUBSCRIBE)
    };
    InlineKeyboard::from_buttons(
        vec![
            InlineButton::callback(texts::CARD_OF_THE_DAY_BUTTON, CALLBACK_CARD),
            InlineButton::link(texts::BUY_CARDS_BUTTON, settings.buy_cards_url()),
            InlineButton::link(texts::FULL_SPREAD_BUTTON, settings.full_card_url()),
            toggle,
        ],
        &[2, 1],
    )
}

/// Telegram webhook
///
/// 载荷能解析就返回 200，避免 Telegram 重复投递；处理失败只记日志。
pub async fn telegram_webhook(
    req: HttpRequest,
    body: web::Bytes,
    telegram: web::Data<TelegramService>,
    ctx: web::Data<BotContext>,
) -> Result<HttpResponse> {
    let secret = req
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if !telegram.verify_secret(secret) {
        warn!("Rejected Telegram webhook with invalid secret token");
        return Ok(HttpResponse::Unauthorized().finish());
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            error!("Invalid Telegram update payload: {e}");
            return Ok(HttpResponse::BadRequest().finish());
        }
    };

    let update_id = update.update_id;
    if let Err(e) = handle_update(&ctx, update).await {
        error!("Failed to handle Telegram update {update_id}: {e}");
    }
    Ok(HttpResponse::Ok().finish())
}

pub async fn handle_update(ctx: &BotContext, update: Update) -> AppResult<()> {
    if let Some(callback) = update.callback_query {
        return handle_callback(ctx, callback).await;
    }
    if let Some(message) = update.message {
        return handle_message(ctx, message).await;
    }
    debug!("Ignoring update {} without message or callback", update.update_id);
    Ok(())
}

/// `/start@my_bot payload` -> `/start`
fn command_of(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    Some(first.split('@').next().unwrap_or(first))
}

async fn handle_message(ctx: &BotContext, message: Message) -> AppResult<()> {
    let Some(from) = message.from.as_ref().filter(|u| !u.is_bot) else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    let settings = ctx.settings.snapshot().await;

    match message.text.as_deref().and_then(command_of) {
        Some("/start") => {
            let user = ctx.draws.users().ensure_user(from.id).await?;
            info!("/start from tg_id={}", from.id);
            ctx.delivery
                .send_text(
                    chat_id,
                    &settings.start_text,
                    Some(&main_menu(&settings, user.subscription)),
                )
                .await
        }
        Some("/help") => ctx.delivery.send_text(chat_id, &settings.help_text, None).await,
        _ => Ok(()),
    }
}

async fn handle_callback(ctx: &BotContext, callback: CallbackQuery) -> AppResult<()> {
    if let Err(e) = ctx.delivery.answer_callback(&callback.id).await {
        warn!("answerCallbackQuery failed for {}: {e}", callback.id);
    }

    let tg_id = callback.from.id;
    let chat_id = callback
        .message
        .as_ref()
        .map(|m| m.chat.id)
        .unwrap_or(tg_id);
    let settings = ctx.settings.snapshot().await;

    match callback.data.as_deref() {
        Some(CALLBACK_CARD) => send_card_of_the_day(ctx, tg_id, chat_id, &settings).await,
        Some(CALLBACK_SUBSCRIBE) => set_subscription(ctx, tg_id, chat_id, &settings, true).await,
        Some(CALLBACK_UNSUBSCRIBE) => set_subscription(ctx, tg_id, chat_id, &settings, false).await,
        other => {
            debug!("Unknown callback data {other:?} from tg_id={tg_id}");
            Ok(())
        }
    }
}

async fn send_card_of_the_day(
    ctx: &BotContext,
    tg_id: i64,
    chat_id: i64,
    settings: &BotSettings,
) -> AppResult<()> {
    match ctx.draws.draw(tg_id, settings).await {
        Ok(DrawOutcome::Issued(card)) => {
            ctx.delivery
                .send_card(chat_id, &card.image, &texts::card_caption(&card.description))
                .await
        }
        Ok(DrawOutcome::LimitReached { limit }) => {
            ctx.delivery
                .send_text(chat_id, &texts::limit_reached(limit), None)
                .await
        }
        Ok(DrawOutcome::Exhausted) => ctx.delivery.send_text(chat_id, texts::EXHAUSTED, None).await,
        Err(AppError::NoCardsAvailable) => {
            warn!("Card requested by tg_id={tg_id} but the catalog is empty");
            ctx.delivery.send_text(chat_id, texts::NO_CARDS, None).await
        }
        Err(e) => {
            error!("Draw failed for tg_id={tg_id}: {e}");
            ctx.delivery.send_text(chat_id, texts::ERROR, None).await
        }
    }
}

async fn set_subscription(
    ctx: &BotContext,
    tg_id: i64,
    chat_id: i64,
    settings: &BotSettings,
    subscribed: bool,
) -> AppResult<()> {
    let user = ctx.draws.users().set_subscription(tg_id, subscribed).await?;
    let text = if user.subscription {
        texts::SUBSCRIBED
    } else {
        texts::UNSUBSCRIBED
    };
    ctx.delivery
        .send_text(chat_id, text, Some(&main_menu(settings, user.subscription)))
        .await
}

pub fn bot_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/telegram", web::post().to(telegram_webhook)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::draw_service::tests::fixture;
    use crate::services::sweep_service::tests::{RecordingDelivery, Sent};
    use serde_json::json;

    async fn context(cards: usize) -> (BotContext, Arc<RecordingDelivery>) {
        let f = fixture(cards).await;
        let path = std::env::temp_dir()
            .join(format!("daily-card-bot-{}", uuid::Uuid::new_v4()))
            .join("settings.json");
        let settings = SettingsService::load(path).await.unwrap();
        let delivery = Arc::new(RecordingDelivery::default());
        let ctx = BotContext {
            delivery: delivery.clone(),
            draws: f.draws,
            settings,
        };
        (ctx, delivery)
    }

    fn callback(tg_id: i64, data: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 1,
            "callback_query": {
                "id": "cb",
                "from": { "id": tg_id, "is_bot": false },
                "message": { "message_id": 1, "chat": { "id": tg_id } },
                "data": data
            }
        }))
        .unwrap()
    }

    fn text(tg_id: i64, text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 2,
            "message": {
                "message_id": 5,
                "chat": { "id": tg_id },
                "from": { "id": tg_id, "is_bot": false },
                "text": text
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_main_menu_layout() {
        let settings = BotSettings::default();
        let menu = main_menu(&settings, false);
        let shape: Vec<usize> = menu.inline_keyboard.iter().map(Vec::len).collect();
        assert_eq!(shape, vec![2, 1, 1]);
        assert_eq!(
            menu.inline_keyboard[0][0].callback_data.as_deref(),
            Some(CALLBACK_CARD)
        );
        assert_eq!(
            menu.inline_keyboard[0][1].url.as_deref(),
            Some(settings.buy_cards_link.as_str())
        );
        assert_eq!(
            menu.inline_keyboard[2][0].callback_data.as_deref(),
            Some(CALLBACK_SUBSCRIBE)
        );

        let menu = main_menu(&settings, true);
        assert_eq!(
            menu.inline_keyboard[2][0].callback_data.as_deref(),
            Some(CALLBACK_UNSUBSCRIBE)
        );
    }

    #[test]
    fn test_command_of() {
        assert_eq!(command_of("/start"), Some("/start"));
        assert_eq!(command_of("/start@tarot_bot ref42"), Some("/start"));
        assert_eq!(command_of("hello"), None);
        assert_eq!(command_of(""), None);
    }

    #[tokio::test]
    async fn test_start_registers_user() {
        let (ctx, delivery) = context(1).await;
        handle_update(&ctx, text(10, "/start")).await.unwrap();

        assert!(ctx.draws.users().find_by_tg_id(10).await.unwrap().is_some());
        let start_text = ctx.settings.snapshot().await.start_text;
        assert_eq!(delivery.sent(), vec![Sent::Text(10, start_text)]);
    }

    #[tokio::test]
    async fn test_card_callback_then_limit() {
        let (ctx, delivery) = context(5).await;
        ctx.settings.set_cards_limit(1).await.unwrap();

        handle_update(&ctx, callback(3, CALLBACK_CARD)).await.unwrap();
        handle_update(&ctx, callback(3, CALLBACK_CARD)).await.unwrap();

        let sent = delivery.sent();
        assert!(matches!(sent[0], Sent::Card(3, _)));
        assert_eq!(sent[1], Sent::Text(3, texts::limit_reached(1)));
    }

    #[tokio::test]
    async fn test_card_callback_with_empty_catalog() {
        let (ctx, delivery) = context(0).await;
        handle_update(&ctx, callback(3, CALLBACK_CARD)).await.unwrap();
        assert_eq!(delivery.sent(), vec![Sent::Text(3, texts::NO_CARDS.to_string())]);
    }

    #[tokio::test]
    async fn test_subscribe_toggle() {
        let (ctx, delivery) = context(1).await;

        handle_update(&ctx, callback(4, CALLBACK_SUBSCRIBE)).await.unwrap();
        assert!(ctx.draws.users().find_by_tg_id(4).await.unwrap().unwrap().subscription);

        handle_update(&ctx, callback(4, CALLBACK_UNSUBSCRIBE)).await.unwrap();
        assert!(!ctx.draws.users().find_by_tg_id(4).await.unwrap().unwrap().subscription);

        assert_eq!(
            delivery.sent(),
            vec![
                Sent::Text(4, texts::SUBSCRIBED.to_string()),
                Sent::Text(4, texts::UNSUBSCRIBED.to_string()),
            ]
        );
    }
}
