use thiserror::Error;

/// Precondition failures surfaced to the acting player. None of these is
/// fatal; the command layer turns them into player-facing text.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TradeError {
    #[error("player is already in an active trade")]
    AlreadyInTrade,

    #[error("target already has a pending trade invitation")]
    InvitePending,

    #[error("no matching trade invitation")]
    NoSuchInvite,

    #[error("player is not in a trade")]
    NotInTrade,

    #[error("own side of the trade is locked")]
    TradeLocked,

    #[error("both sides must lock before confirming")]
    BothSidesMustLock,
}
