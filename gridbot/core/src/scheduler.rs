//! Scheduler
//!
//! Drains the command queue at a fixed rate, one unit action per tick.
//!
//! ```text
//!            enqueue (wake)
//!   ┌──────┐ ─────────────▶ ┌──────────┐
//!   │ Idle │                │ Draining │──┐ tick: apply one action
//!   └──────┘ ◀───────────── └──────────┘◀─┘
//!            tick finds queue empty
//! ```
//!
//! The first action after a wake-up is applied one full interval later, and
//! the tick that discovers an empty queue applies nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::grid::{RobotGrid, TickOutcome};

/// Default delay between applied actions
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Owns the tick loop for one [`RobotGrid`]
pub struct Scheduler {
    grid: Arc<RobotGrid>,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler ticking every `interval`
    #[must_use]
    pub fn new(grid: Arc<RobotGrid>, interval: Duration) -> Self {
        Self { grid, interval }
    }

    /// Spawn the tick loop on the current runtime
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Scheduler started");

        'outer: loop {
            tokio::select! {
                () = self.grid.work_available() => {}
                _ = wait_shutdown(&mut shutdown) => break 'outer,
            }

            debug!(pending = self.grid.pending(), "Scheduler draining");
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wait_shutdown(&mut shutdown) => break 'outer,
                }

                match self.grid.tick() {
                    TickOutcome::Applied {
                        action,
                        snapshot,
                        remaining,
                    } => {
                        debug!(
                            %action,
                            x = snapshot.x,
                            y = snapshot.y,
                            heading = %snapshot.heading,
                            remaining,
                            "Applied action"
                        );
                    }
                    TickOutcome::Idle => {
                        debug!("Queue empty, scheduler idle");
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}

/// Resolves once shutdown is requested or the sender is gone
async fn wait_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // An Err means the sender was dropped, which also ends the loop
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::PendingAction;
    use crate::grid::DrainPhase;
    use crate::robot::Heading;

    const TICK: Duration = Duration::from_millis(500);

    fn start() -> (Arc<RobotGrid>, watch::Sender<bool>, JoinHandle<()>) {
        let grid = RobotGrid::shared();
        let (tx, rx) = watch::channel(false);
        let handle = Scheduler::new(Arc::clone(&grid), TICK).spawn(rx);
        (grid, tx, handle)
    }

    /// Let spawned tasks run without moving the paused clock
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_action_per_tick() {
        let (grid, shutdown, handle) = start();
        settle().await;

        grid.enqueue(PendingAction::StepForward, 3);
        settle().await;
        assert_eq!(grid.snapshot().wire(), "7 7 0");

        time::advance(TICK).await;
        settle().await;
        assert_eq!(grid.snapshot().wire(), "7 6 0");

        time::advance(TICK).await;
        settle().await;
        time::advance(TICK).await;
        settle().await;
        assert_eq!(grid.snapshot().wire(), "7 4 0");
        assert_eq!(grid.pending(), 0);

        // Next tick discovers the empty queue
        time::advance(TICK).await;
        settle().await;
        assert_eq!(grid.phase(), DrainPhase::Idle);
        assert_eq!(grid.snapshot().wire(), "7 4 0");

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_not_early() {
        let (grid, _shutdown, _handle) = start();
        settle().await;

        grid.enqueue(PendingAction::TurnRight, 1);
        settle().await;
        time::advance(TICK - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(grid.snapshot().heading, Heading::North);

        time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(grid.snapshot().heading, Heading::East);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wakes_again_after_idle() {
        let (grid, _shutdown, _handle) = start();
        settle().await;

        grid.enqueue(PendingAction::StepForward, 1);
        settle().await;
        time::advance(TICK).await;
        settle().await;
        time::advance(TICK).await;
        settle().await;
        assert_eq!(grid.phase(), DrainPhase::Idle);

        grid.enqueue(PendingAction::StepBackward, 1);
        assert_eq!(grid.phase(), DrainPhase::Draining);
        settle().await;
        time::advance(TICK).await;
        settle().await;
        assert_eq!(grid.snapshot().wire(), "7 7 0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let (grid, shutdown, handle) = start();
        settle().await;
        grid.enqueue(PendingAction::StepForward, 10);
        settle().await;

        shutdown.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(grid.pending(), 10);
    }
}
