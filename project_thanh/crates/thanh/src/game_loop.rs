use std::time::Duration;

use tokio::sync::watch;

use trade::TradeBoard;

use crate::channels::{CommandRx, GameCommand, OutputTx, PlayerMessage};
use crate::dispatch::{handle_trade_action, Settlement};

/// The game loop owns the trade board; every mutation is serialized
/// through the command channel, so board operations never race.
///
/// Exits when shutdown is signaled or when all command senders are gone.
pub async fn run_game_loop(
    mut commands: CommandRx,
    outputs: OutputTx,
    mut shutdown: watch::Receiver<bool>,
    invite_ttl: Duration,
    mut settlement: impl Settlement,
) {
    let mut board = TradeBoard::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow_and_update() {
                    break;
                }
            }
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    GameCommand::Trade { player, action } => {
                        handle_trade_action(&mut board, player, action, &outputs, &mut settlement);
                    }
                    GameCommand::SweepInvites => {
                        if invite_ttl.is_zero() {
                            continue;
                        }
                        for (target, inviter) in board.expire_invites(invite_ttl) {
                            let _ = outputs.send(PlayerMessage::new(
                                target,
                                "Lời mời giao dịch đã hết hạn.",
                            ));
                            let _ = outputs.send(PlayerMessage::new(
                                inviter,
                                format!("Lời mời giao dịch gửi cho người chơi {} đã hết hạn.", target),
                            ));
                        }
                    }
                }
            }
        }
    }

    tracing::info!(
        active_trades = board.active_trades(),
        pending_invites = board.pending_invites(),
        "game loop stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use trade::{PlayerId, TradeSession};

    use crate::channels::TradeAction;

    struct NoopSettlement;
    impl Settlement for NoopSettlement {
        fn transfer(&mut self, _session: &TradeSession) {}
    }

    #[tokio::test]
    async fn processes_commands_and_stops_on_shutdown() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_game_loop(
            command_rx,
            output_tx,
            shutdown_rx,
            Duration::from_secs(60),
            NoopSettlement,
        ));

        command_tx
            .send(GameCommand::Trade {
                player: PlayerId(1),
                action: TradeAction::Invite { target: PlayerId(2) },
            })
            .unwrap();

        let msg = output_rx.recv().await.unwrap();
        assert_eq!(msg.player, PlayerId(1));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_all_senders_dropped() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, _output_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_game_loop(
            command_rx,
            output_tx,
            shutdown_rx,
            Duration::ZERO,
            NoopSettlement,
        ));

        drop(command_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sweep_expires_stale_invites() {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // A nanosecond TTL: anything already on the board is stale.
        let handle = tokio::spawn(run_game_loop(
            command_rx,
            output_tx,
            shutdown_rx,
            Duration::from_nanos(1),
            NoopSettlement,
        ));

        command_tx
            .send(GameCommand::Trade {
                player: PlayerId(1),
                action: TradeAction::Invite { target: PlayerId(2) },
            })
            .unwrap();
        command_tx.send(GameCommand::SweepInvites).unwrap();

        // Two invite notifications, then two expiry notifications.
        let mut texts = Vec::new();
        for _ in 0..4 {
            texts.push(output_rx.recv().await.unwrap().text);
        }
        assert!(texts[2].contains("hết hạn"));
        assert!(texts[3].contains("hết hạn"));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
