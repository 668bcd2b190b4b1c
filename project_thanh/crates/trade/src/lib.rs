pub mod board;
pub mod error;
pub mod session;

pub use board::TradeBoard;
pub use error::TradeError;
pub use session::{ItemRef, PendingInvite, PlayerId, TradeId, TradeOffer, TradeSession};
