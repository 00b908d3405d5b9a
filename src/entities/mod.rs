pub mod cards;
pub mod users;

pub use cards as card_entity;
pub use users as user_entity;
