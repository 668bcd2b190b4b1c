use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeId(pub u64);

/// Opaque reference to one item instance. The negotiator never inspects
/// contents, only order and count; the inventory service resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemRef(pub String);

impl From<&str> for ItemRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side's staged terms. `locked` is a one-way gate: once set, the
/// items and gold of this side are immutable until the session ends.
/// `confirmed` may only be set while both sides are locked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeOffer {
    pub items: Vec<ItemRef>,
    pub gold: u64,
    pub locked: bool,
    pub confirmed: bool,
}

/// An active two-party negotiation. Purely in-memory: a restart drops all
/// pending trades, which is acceptable for a barter that has not settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSession {
    pub id: TradeId,
    pub initiator_id: PlayerId,
    pub target_id: PlayerId,
    pub initiator: TradeOffer,
    pub target: TradeOffer,
}

impl TradeSession {
    pub(crate) fn new(id: TradeId, initiator_id: PlayerId, target_id: PlayerId) -> Self {
        Self {
            id,
            initiator_id,
            target_id,
            initiator: TradeOffer::default(),
            target: TradeOffer::default(),
        }
    }

    pub fn is_initiator(&self, player: PlayerId) -> bool {
        self.initiator_id == player
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.initiator_id == player || self.target_id == player
    }

    pub fn offer_of(&self, player: PlayerId) -> Option<&TradeOffer> {
        if player == self.initiator_id {
            Some(&self.initiator)
        } else if player == self.target_id {
            Some(&self.target)
        } else {
            None
        }
    }

    pub fn offer_of_mut(&mut self, player: PlayerId) -> Option<&mut TradeOffer> {
        if player == self.initiator_id {
            Some(&mut self.initiator)
        } else if player == self.target_id {
            Some(&mut self.target)
        } else {
            None
        }
    }

    pub fn other_party(&self, player: PlayerId) -> Option<PlayerId> {
        if player == self.initiator_id {
            Some(self.target_id)
        } else if player == self.target_id {
            Some(self.initiator_id)
        } else {
            None
        }
    }

    pub fn both_locked(&self) -> bool {
        self.initiator.locked && self.target.locked
    }

    pub fn both_confirmed(&self) -> bool {
        self.initiator.confirmed && self.target.confirmed
    }
}

/// A trade offer awaiting the target's answer. Keyed by target in the
/// board, so a player can hold at most one at a time.
#[derive(Debug, Clone)]
pub struct PendingInvite {
    pub inviter: PlayerId,
    pub created_at: Instant,
}
