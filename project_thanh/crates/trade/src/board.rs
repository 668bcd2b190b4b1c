use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::error::TradeError;
use crate::session::{ItemRef, PendingInvite, PlayerId, TradeId, TradeOffer, TradeSession};

/// All trade negotiation state for the shard: pending invitations keyed by
/// target, active sessions keyed by trade id with a per-player index.
///
/// The board is owned by the game loop and mutated only through these
/// operations, one command at a time; the identity-keyed maps guarantee a
/// player is in at most one session and holds at most one invitation.
#[derive(Debug, Default)]
pub struct TradeBoard {
    trades: BTreeMap<TradeId, TradeSession>,
    by_player: BTreeMap<PlayerId, TradeId>,
    invites: BTreeMap<PlayerId, PendingInvite>,
    next_id: u64,
}

impl TradeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invitation from `inviter` to `target`.
    pub fn invite(&mut self, inviter: PlayerId, target: PlayerId) -> Result<(), TradeError> {
        if self.by_player.contains_key(&inviter) || self.by_player.contains_key(&target) {
            return Err(TradeError::AlreadyInTrade);
        }
        if self.invites.contains_key(&target) {
            return Err(TradeError::InvitePending);
        }
        self.invites.insert(
            target,
            PendingInvite {
                inviter,
                created_at: Instant::now(),
            },
        );
        tracing::debug!(%inviter, %target, "trade invitation recorded");
        Ok(())
    }

    /// Accept the invitation `inviter` sent to `target`, opening a session
    /// with both sides in staging. The inviter becomes the initiator.
    ///
    /// Accepting with a mismatched inviter is rejected, not corrected. The
    /// in-trade check is repeated here: either party may have entered
    /// another trade since the invitation was sent, and in that case the
    /// invitation stays on the board.
    pub fn accept(&mut self, target: PlayerId, inviter: PlayerId) -> Result<TradeId, TradeError> {
        match self.invites.get(&target) {
            Some(invite) if invite.inviter == inviter => {}
            _ => return Err(TradeError::NoSuchInvite),
        }
        if self.by_player.contains_key(&inviter) || self.by_player.contains_key(&target) {
            return Err(TradeError::AlreadyInTrade);
        }
        self.invites.remove(&target);

        let id = TradeId(self.next_id);
        self.next_id += 1;
        self.trades.insert(id, TradeSession::new(id, inviter, target));
        self.by_player.insert(inviter, id);
        self.by_player.insert(target, id);
        tracing::info!(trade = id.0, initiator = %inviter, %target, "trade session opened");
        Ok(id)
    }

    /// Decline the invitation `inviter` sent to `target`. Same matching
    /// rule as [`accept`](Self::accept); removes the invitation only.
    pub fn decline(&mut self, target: PlayerId, inviter: PlayerId) -> Result<(), TradeError> {
        match self.invites.get(&target) {
            Some(invite) if invite.inviter == inviter => {}
            _ => return Err(TradeError::NoSuchInvite),
        }
        self.invites.remove(&target);
        tracing::debug!(%inviter, %target, "trade invitation declined");
        Ok(())
    }

    pub fn pending_invite(&self, target: PlayerId) -> Option<&PendingInvite> {
        self.invites.get(&target)
    }

    /// The session `player` is part of, plus whether they initiated it
    /// (the initiator and target sides are mutated through different
    /// fields, so callers need the asymmetry).
    pub fn trade_of(&self, player: PlayerId) -> Option<(&TradeSession, bool)> {
        let id = self.by_player.get(&player)?;
        let session = self.trades.get(id)?;
        Some((session, session.is_initiator(player)))
    }

    /// Stage one item on the caller's side, preserving insertion order.
    /// Duplicates are allowed; each entry is an independent item instance.
    /// Only the caller's own lock matters here.
    pub fn add_item(&mut self, player: PlayerId, item: ItemRef) -> Result<(), TradeError> {
        let offer = self.own_offer_mut(player)?;
        if offer.locked {
            return Err(TradeError::TradeLocked);
        }
        offer.items.push(item);
        Ok(())
    }

    /// Stage a gold amount on the caller's side. Overwrites, never
    /// accumulates: staging 30 then 100 offers 100, not 130.
    pub fn set_gold(&mut self, player: PlayerId, amount: u64) -> Result<(), TradeError> {
        let offer = self.own_offer_mut(player)?;
        if offer.locked {
            return Err(TradeError::TradeLocked);
        }
        offer.gold = amount;
        Ok(())
    }

    /// Lock the caller's side. One-way: there is no unlock — a party that
    /// wants different terms after locking must cancel and re-invite.
    /// Locking an already-locked side is a no-op.
    pub fn lock(&mut self, player: PlayerId) -> Result<(), TradeError> {
        let offer = self.own_offer_mut(player)?;
        offer.locked = true;
        tracing::debug!(%player, "trade side locked");
        Ok(())
    }

    /// Set the caller's confirmed flag, allowed only once both sides are
    /// locked. Returns whether both sides are now confirmed; the caller is
    /// responsible for triggering settlement when true — confirming never
    /// settles by itself.
    pub fn confirm(&mut self, player: PlayerId) -> Result<bool, TradeError> {
        let session = self.session_mut(player)?;
        if !session.both_locked() {
            return Err(TradeError::BothSidesMustLock);
        }
        if let Some(offer) = session.offer_of_mut(player) {
            offer.confirmed = true;
        }
        Ok(session.both_confirmed())
    }

    /// Remove the session and hand its final snapshot to the caller, who
    /// executes the actual item/gold transfer. Confirmation state is NOT
    /// re-checked here; the caller must only invoke this after
    /// [`confirm`](Self::confirm) reported both sides confirmed, with no
    /// other trade-mutating operation in between.
    pub fn complete(&mut self, id: TradeId) -> Option<TradeSession> {
        let session = self.trades.remove(&id)?;
        self.by_player.remove(&session.initiator_id);
        self.by_player.remove(&session.target_id);
        tracing::info!(trade = id.0, "trade session completed");
        Some(session)
    }

    /// Tear down the caller's session from any active state. Returns the
    /// removed session so the caller can notify the other party.
    pub fn cancel(&mut self, player: PlayerId) -> Result<TradeSession, TradeError> {
        let id = *self.by_player.get(&player).ok_or(TradeError::NotInTrade)?;
        let session = self.trades.remove(&id).ok_or(TradeError::NotInTrade)?;
        self.by_player.remove(&session.initiator_id);
        self.by_player.remove(&session.target_id);
        tracing::info!(trade = id.0, cancelled_by = %player, "trade session cancelled");
        Ok(session)
    }

    /// Drop invitations older than `ttl`, returning (target, inviter)
    /// pairs so both parties can be notified.
    pub fn expire_invites(&mut self, ttl: Duration) -> Vec<(PlayerId, PlayerId)> {
        let now = Instant::now();
        let expired: Vec<PlayerId> = self
            .invites
            .iter()
            .filter(|(_, invite)| now.duration_since(invite.created_at) >= ttl)
            .map(|(target, _)| *target)
            .collect();
        expired
            .into_iter()
            .filter_map(|target| {
                self.invites
                    .remove(&target)
                    .map(|invite| (target, invite.inviter))
            })
            .collect()
    }

    pub fn active_trades(&self) -> usize {
        self.trades.len()
    }

    pub fn pending_invites(&self) -> usize {
        self.invites.len()
    }

    fn session_mut(&mut self, player: PlayerId) -> Result<&mut TradeSession, TradeError> {
        let id = *self.by_player.get(&player).ok_or(TradeError::NotInTrade)?;
        self.trades.get_mut(&id).ok_or(TradeError::NotInTrade)
    }

    fn own_offer_mut(&mut self, player: PlayerId) -> Result<&mut TradeOffer, TradeError> {
        self.session_mut(player)?
            .offer_of_mut(player)
            .ok_or(TradeError::NotInTrade)
    }
}
