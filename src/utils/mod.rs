pub mod card_selection;
pub mod clock;
pub mod daily_limit;
pub mod schedule;
pub mod texts;
pub mod user_locks;

pub use card_selection::{Selection, eligible_cards, is_cooling, select_card};
pub use clock::{Clock, FixedClock, SystemClock};
pub use daily_limit::{DEFAULT_CARDS_LIMIT, can_draw_today, effective_limit, issued_today};
pub use schedule::NotificationSchedule;
pub use user_locks::UserLocks;
