pub mod card;
pub mod common;
pub mod draw;
pub mod history;
pub mod settings;
pub mod statistics;

pub use card::*;
pub use common::*;
pub use draw::*;
pub use history::*;
pub use settings::*;
pub use statistics::*;
