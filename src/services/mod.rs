pub mod card_service;
pub mod draw_service;
pub mod settings_service;
pub mod sweep_service;
pub mod user_service;

pub use card_service::*;
pub use draw_service::*;
pub use settings_service::*;
pub use sweep_service::*;
pub use user_service::*;
