pub mod delivery;
pub mod telegram;

pub use delivery::*;
pub use telegram::*;
