//! User-facing bot messages.

pub const CARD_OF_THE_DAY_BUTTON: &str = "Карта дня 🔮";
pub const BUY_CARDS_BUTTON: &str = "Купить карты 🛒";
pub const FULL_SPREAD_BUTTON: &str = "🃏 Дать полный расклад карт 🃏";
pub const SUBSCRIBE_BUTTON: &str = "📩 Подписаться на ежедневную карту 📩";
pub const UNSUBSCRIBE_BUTTON: &str = "❌ Отписаться от ежедневной карты ❌";

pub const SUBSCRIBED: &str = "Вы подписались на ежедневную карту 📩";
pub const UNSUBSCRIBED: &str = "Вы отписались от ежедневной карты";
pub const NO_CARDS: &str = "Карты пока не добавлены 😞";
pub const EXHAUSTED: &str = "Все карты уже выпали. Возвращайтесь через 24 часа ⏳";
pub const ERROR: &str = "Произошла ошибка 😞...";

pub fn card_caption(description: &str) -> String {
    format!("🔮 Карта дня:\n{description}")
}

pub fn daily_card_caption(description: &str) -> String {
    format!("📅 Ежедневная карта:\n{description}")
}

pub fn limit_reached(limit: u32) -> String {
    format!("Вы уже получили {limit} карт(ы) сегодня. Возвращайтесь завтра 🌙")
}
