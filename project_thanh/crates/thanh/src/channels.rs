use tokio::sync::mpsc;

use trade::{ItemRef, PlayerId};

/// One player's trade command, as parsed by the gateway.
#[derive(Debug)]
pub enum TradeAction {
    Invite { target: PlayerId },
    Accept { inviter: PlayerId },
    Decline { inviter: PlayerId },
    Show,
    AddItem { item: ItemRef },
    SetGold { amount: u64 },
    Lock,
    Confirm,
    Cancel,
}

/// Messages into the game loop: player commands from the gateway plus
/// housekeeping triggered off the tick scheduler.
#[derive(Debug)]
pub enum GameCommand {
    Trade { player: PlayerId, action: TradeAction },
    /// Drop pending invitations older than the configured TTL.
    SweepInvites,
}

/// Outbound text for one player, to be delivered by the gateway.
#[derive(Debug, Clone)]
pub struct PlayerMessage {
    pub player: PlayerId,
    pub text: String,
}

impl PlayerMessage {
    pub fn new(player: PlayerId, text: impl Into<String>) -> Self {
        Self {
            player,
            text: text.into(),
        }
    }
}

/// Sender from gateway tasks (and scheduler bridges) to the game loop.
pub type CommandTx = mpsc::UnboundedSender<GameCommand>;
/// Receiver in the game loop.
pub type CommandRx = mpsc::UnboundedReceiver<GameCommand>;

/// Sender from the game loop to the gateway's output side.
pub type OutputTx = mpsc::UnboundedSender<PlayerMessage>;
/// Receiver on the gateway's output side.
pub type OutputRx = mpsc::UnboundedReceiver<PlayerMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_channel_roundtrip() {
        let (tx, mut rx) = mpsc::unbounded_channel::<GameCommand>();

        tx.send(GameCommand::Trade {
            player: PlayerId(1),
            action: TradeAction::Invite { target: PlayerId(2) },
        })
        .unwrap();
        tx.send(GameCommand::SweepInvites).unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            GameCommand::Trade {
                player: PlayerId(1),
                action: TradeAction::Invite { target: PlayerId(2) },
            }
        ));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second, GameCommand::SweepInvites));
    }

    #[tokio::test]
    async fn output_channel_roundtrip() {
        let (tx, mut rx) = mpsc::unbounded_channel::<PlayerMessage>();

        tx.send(PlayerMessage::new(PlayerId(7), "Chào mừng!")).unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.player, PlayerId(7));
        assert_eq!(msg.text, "Chào mừng!");
    }
}
