pub mod admin;
pub mod bot;

pub use admin::admin_config;
pub use bot::{BotContext, bot_config};
