mod config;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use thanh::channels::{GameCommand, PlayerMessage};
use thanh::dispatch::LedgerSettlement;
use thanh::game_loop::run_game_loop;
use tick::{Cadence, TickScheduler};

use crate::config::parse_cli_args;
use crate::shutdown::{shutdown_channel, wait_for_signal};

#[tokio::main]
async fn main() {
    observability::init_logging();

    let config = parse_cli_args();
    tracing::info!("Vong Tích Thành server starting...");

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
    let (output_tx, mut output_rx) = tokio::sync::mpsc::unbounded_channel::<PlayerMessage>();

    let scheduler = Arc::new(TickScheduler::new());
    scheduler.start();

    // Background cadence drives the invitation-expiry sweep. The callback
    // only forwards a command; the board itself is touched exclusively by
    // the game loop.
    let sweep_tx = command_tx.clone();
    scheduler.subscribe(Cadence::Background, move |_| {
        let _ = sweep_tx.send(GameCommand::SweepInvites);
    });

    // Periodic scheduler diagnostics.
    if config.tick.stats_interval > 0 {
        let every = config.tick.stats_interval;
        let stats_scheduler = Arc::clone(&scheduler);
        scheduler.subscribe(Cadence::Background, move |signal| {
            if signal.count % every == 0 {
                for stats in stats_scheduler.stats().cadences {
                    tracing::info!(
                        cadence = %stats.cadence,
                        count = stats.count,
                        subscribers = stats.subscribers,
                        "cadence stats"
                    );
                }
            }
        });
    }

    // Game loop owns the trade board.
    let invite_ttl = Duration::from_secs(config.trade.invite_ttl_secs);
    let game = tokio::spawn(run_game_loop(
        command_rx,
        output_tx,
        shutdown_rx.clone().into_inner(),
        invite_ttl,
        LedgerSettlement,
    ));

    // Gateway attach point: `command_tx` is what the network gateway will
    // feed; until it is wired in, outbound player messages go to the log.
    let mut output_shutdown = shutdown_rx.into_inner();
    let output_router = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = output_shutdown.changed() => {
                    if changed.is_err() || *output_shutdown.borrow_and_update() {
                        break;
                    }
                }
                msg = output_rx.recv() => {
                    let Some(msg) = msg else { break };
                    tracing::info!(player = %msg.player, "{}", msg.text);
                }
            }
        }
    });

    wait_for_signal().await;
    tracing::info!("Shutdown signal received, stopping server...");
    shutdown_tx.trigger();
    scheduler.stop();

    let _ = game.await;
    let _ = output_router.await;
    tracing::info!("Server stopped.");
}
