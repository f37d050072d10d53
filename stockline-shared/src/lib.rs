pub mod codes;
pub mod models;
pub mod money;

pub use codes::{CodeKind, DisplayCode};
pub use models::events::FulfillmentEvent;
pub use money::{round_cents, line_amount, MONEY_TOLERANCE};
