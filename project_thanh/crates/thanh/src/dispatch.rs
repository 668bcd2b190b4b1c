use trade::{PlayerId, TradeBoard, TradeError, TradeSession};

use crate::channels::{OutputTx, PlayerMessage, TradeAction};

/// Executes the staged exchange once both sides have confirmed. The real
/// implementation moves items and gold between player inventories inside
/// one database transaction; until that service is wired in, the server
/// installs [`LedgerSettlement`].
pub trait Settlement {
    fn transfer(&mut self, session: &TradeSession);
}

/// Stand-in settlement that only writes the exchange to the log.
pub struct LedgerSettlement;

impl Settlement for LedgerSettlement {
    fn transfer(&mut self, session: &TradeSession) {
        tracing::info!(
            trade = session.id.0,
            initiator = %session.initiator_id,
            target = %session.target_id,
            initiator_items = session.initiator.items.len(),
            initiator_gold = session.initiator.gold,
            target_items = session.target.items.len(),
            target_gold = session.target.gold,
            "trade settled"
        );
    }
}

/// Run one player command against the board and queue the resulting
/// player messages. Runs on the game loop, one command at a time, so the
/// confirm → complete → transfer sequence below can never interleave with
/// another mutation of the same session.
pub fn handle_trade_action(
    board: &mut TradeBoard,
    player: PlayerId,
    action: TradeAction,
    outputs: &OutputTx,
    settlement: &mut dyn Settlement,
) {
    match action {
        TradeAction::Invite { target } => match board.invite(player, target) {
            Ok(()) => {
                send(
                    outputs,
                    player,
                    format!("Đã gửi lời mời giao dịch đến người chơi {}.", target),
                );
                send(
                    outputs,
                    target,
                    format!(
                        "Người chơi {} muốn giao dịch với bạn. Gõ 'giaodich dongy' để chấp nhận.",
                        player
                    ),
                );
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
        TradeAction::Accept { inviter } => match board.accept(player, inviter) {
            Ok(_) => {
                send(
                    outputs,
                    player,
                    format!("Bắt đầu giao dịch với người chơi {}.", inviter),
                );
                send(
                    outputs,
                    inviter,
                    format!("Người chơi {} đã chấp nhận lời mời giao dịch.", player),
                );
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
        TradeAction::Decline { inviter } => match board.decline(player, inviter) {
            Ok(()) => {
                send(outputs, player, "Đã từ chối lời mời giao dịch.");
                send(
                    outputs,
                    inviter,
                    format!("Người chơi {} đã từ chối lời mời giao dịch của bạn.", player),
                );
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
        TradeAction::Show => match board.trade_of(player) {
            Some((session, _)) => send(outputs, player, render_session(session, player)),
            None => send(outputs, player, error_message(&TradeError::NotInTrade)),
        },
        TradeAction::AddItem { item } => {
            let label = item.clone();
            match board.add_item(player, item) {
                Ok(()) => {
                    send(
                        outputs,
                        player,
                        format!("Đã đặt {} lên bàn giao dịch.", label),
                    );
                    if let Some(other) = counterparty(board, player) {
                        send(
                            outputs,
                            other,
                            format!("Người chơi {} đặt {} lên bàn giao dịch.", player, label),
                        );
                    }
                }
                Err(e) => send(outputs, player, error_message(&e)),
            }
        }
        TradeAction::SetGold { amount } => match board.set_gold(player, amount) {
            Ok(()) => {
                send(
                    outputs,
                    player,
                    format!("Đã đặt {} vàng lên bàn giao dịch.", amount),
                );
                if let Some(other) = counterparty(board, player) {
                    send(
                        outputs,
                        other,
                        format!("Người chơi {} đặt {} vàng lên bàn giao dịch.", player, amount),
                    );
                }
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
        TradeAction::Lock => match board.lock(player) {
            Ok(()) => {
                send(outputs, player, "Bạn đã khoá giao dịch.");
                if let Some(other) = counterparty(board, player) {
                    send(
                        outputs,
                        other,
                        format!("Người chơi {} đã khoá giao dịch.", player),
                    );
                }
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
        TradeAction::Confirm => match board.confirm(player) {
            Ok(false) => {
                send(outputs, player, "Đã xác nhận. Chờ đối phương xác nhận...");
                if let Some(other) = counterparty(board, player) {
                    send(
                        outputs,
                        other,
                        format!("Người chơi {} đã xác nhận giao dịch.", player),
                    );
                }
            }
            Ok(true) => {
                // Both sides agreed: settle immediately, before any other
                // command can touch this session.
                let id = board.trade_of(player).map(|(session, _)| session.id);
                if let Some(snapshot) = id.and_then(|id| board.complete(id)) {
                    settlement.transfer(&snapshot);
                    send(outputs, snapshot.initiator_id, "Giao dịch hoàn tất!");
                    send(outputs, snapshot.target_id, "Giao dịch hoàn tất!");
                }
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
        TradeAction::Cancel => match board.cancel(player) {
            Ok(removed) => {
                send(outputs, player, "Đã huỷ giao dịch.");
                if let Some(other) = removed.other_party(player) {
                    send(
                        outputs,
                        other,
                        format!("Người chơi {} đã huỷ giao dịch.", player),
                    );
                }
            }
            Err(e) => send(outputs, player, error_message(&e)),
        },
    }
}

/// Player-facing text for each precondition failure.
pub fn error_message(err: &TradeError) -> &'static str {
    match err {
        TradeError::AlreadyInTrade => "Bạn hoặc đối phương đang trong một giao dịch khác.",
        TradeError::InvitePending => "Người chơi này đang có một lời mời giao dịch chưa trả lời.",
        TradeError::NoSuchInvite => "Không tìm thấy lời mời giao dịch nào như vậy.",
        TradeError::NotInTrade => "Bạn không ở trong giao dịch nào.",
        TradeError::TradeLocked => "Bạn đã khoá giao dịch, không thể thay đổi nữa.",
        TradeError::BothSidesMustLock => "Cả hai bên phải khoá giao dịch trước khi xác nhận.",
    }
}

fn render_session(session: &TradeSession, viewer: PlayerId) -> String {
    let mut out = String::from("=== GIAO DỊCH ===\n");
    for (owner, offer) in [
        (session.initiator_id, &session.initiator),
        (session.target_id, &session.target),
    ] {
        let who = if owner == viewer {
            "Bạn".to_string()
        } else {
            format!("Người chơi {}", owner)
        };
        let mut flags = String::new();
        if offer.locked {
            flags.push_str(" [ĐÃ KHOÁ]");
        }
        if offer.confirmed {
            flags.push_str(" [ĐÃ XÁC NHẬN]");
        }
        out.push_str(&format!("{}{}:\n", who, flags));
        if offer.items.is_empty() {
            out.push_str("  (chưa có vật phẩm)\n");
        } else {
            for item in &offer.items {
                out.push_str(&format!("  - {}\n", item));
            }
        }
        out.push_str(&format!("  Vàng: {}\n", offer.gold));
    }
    out
}

fn counterparty(board: &TradeBoard, player: PlayerId) -> Option<PlayerId> {
    board
        .trade_of(player)
        .and_then(|(session, _)| session.other_party(player))
}

fn send(outputs: &OutputTx, player: PlayerId, text: impl Into<String>) {
    // The gateway side may already be gone during shutdown.
    let _ = outputs.send(PlayerMessage::new(player, text));
}
