//! Robot Grid
//!
//! The single owner of robot state, the command queue and the state notifier.
//! Every mutation happens under one lock so that enqueue, apply and notify are
//! atomic with respect to each other, whichever task triggers them.
//!
//! ```text
//!   ProtocolServer ──execute()──┐
//!                               ▼
//!                      ┌──────────────────┐      publish()     ┌──────────┐
//!                      │ RobotState       │ ─────────────────▶ │ Notifier │──▶ view
//!                      │ CommandQueue     │                    └──────────┘
//!                      │ DrainPhase       │
//!                      └──────────────────┘
//!                               ▲
//!   Scheduler ─────tick()───────┘
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::command::{Command, PendingAction};
use crate::notifier::{StateNotifier, StateSubscriber};
use crate::protocol::Reply;
use crate::queue::CommandQueue;
use crate::robot::{RobotSnapshot, RobotState, GRID_HEIGHT, GRID_WIDTH};

/// Scheduler phase tracked alongside the queue
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainPhase {
    /// Nothing queued, no ticking
    Idle,
    /// Ticker active, one action applied per tick
    Draining,
}

/// Result of one scheduler tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// An action was applied
    Applied {
        /// The unit action that ran
        action: PendingAction,
        /// State after applying it
        snapshot: RobotSnapshot,
        /// Unit actions still queued
        remaining: u64,
    },
    /// The queue was empty; the grid is now idle
    Idle,
}

struct GridInner {
    robot: RobotState,
    queue: CommandQueue,
    phase: DrainPhase,
}

/// Shared robot + queue handle
pub struct RobotGrid {
    inner: Mutex<GridInner>,
    notifier: StateNotifier,
    wake: Notify,
}

impl Default for RobotGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotGrid {
    /// Robot at the centre facing North, empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(RobotState::new())
    }

    /// Start from an explicit robot state
    #[must_use]
    pub fn with_state(robot: RobotState) -> Self {
        let notifier = StateNotifier::new(robot.snapshot());
        Self {
            inner: Mutex::new(GridInner {
                robot,
                queue: CommandQueue::new(),
                phase: DrainPhase::Idle,
            }),
            notifier,
            wake: Notify::new(),
        }
    }

    /// Convenience constructor returning a shareable handle
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Grid size as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (GRID_WIDTH, GRID_HEIGHT)
    }

    /// Current robot snapshot
    #[must_use]
    pub fn snapshot(&self) -> RobotSnapshot {
        self.inner.lock().robot.snapshot()
    }

    /// Unit actions waiting in the queue
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.inner.lock().queue.len()
    }

    /// Current scheduler phase
    #[must_use]
    pub fn phase(&self) -> DrainPhase {
        self.inner.lock().phase
    }

    /// Subscribe to state changes
    #[must_use]
    pub fn subscribe(&self) -> StateSubscriber {
        self.notifier.subscribe()
    }

    /// Carry out a parsed command and produce its reply
    ///
    /// Queries read the current state. `CENTER` is applied immediately.
    /// Turns and steps are queued and wake the scheduler if it was idle.
    pub fn execute(&self, command: Command) -> Reply {
        match command {
            Command::GetDimensions => {
                let (width, height) = self.dimensions();
                Reply::Dimensions { width, height }
            }
            Command::GetPosition => Reply::Position(self.snapshot()),
            Command::Center => {
                let mut inner = self.inner.lock();
                inner.robot.center();
                let snapshot = inner.robot.snapshot();
                self.notifier.publish(snapshot);
                info!(x = snapshot.x, y = snapshot.y, heading = %snapshot.heading, "Robot centered");
                Reply::Ok
            }
            Command::Turn(_) | Command::Forward(_) | Command::Backward(_) => {
                if let Some((action, count)) = command.queued_actions() {
                    self.enqueue(action, count);
                }
                Reply::Ok
            }
        }
    }

    /// Append `count` unit actions
    pub fn enqueue(&self, action: PendingAction, count: u32) {
        let mut inner = self.inner.lock();
        inner.queue.push(action, count);
        let pending = inner.queue.len();
        debug!(%action, count, pending, "Actions queued");

        if inner.phase == DrainPhase::Idle && pending > 0 {
            inner.phase = DrainPhase::Draining;
            // Stores a permit if the scheduler is not parked yet
            self.wake.notify_one();
        }
    }

    /// Apply the oldest queued action, or go idle if there is none
    pub fn tick(&self) -> TickOutcome {
        let mut inner = self.inner.lock();
        let Some(action) = inner.queue.pop() else {
            inner.phase = DrainPhase::Idle;
            return TickOutcome::Idle;
        };

        match action {
            PendingAction::TurnLeft => inner.robot.turn_left(),
            PendingAction::TurnRight => inner.robot.turn_right(),
            PendingAction::StepForward => inner.robot.move_forward(1),
            PendingAction::StepBackward => inner.robot.move_backward(1),
        }

        let snapshot = inner.robot.snapshot();
        self.notifier.publish(snapshot);

        TickOutcome::Applied {
            action,
            snapshot,
            remaining: inner.queue.len(),
        }
    }

    /// Wait until an enqueue moves the grid out of `Idle`
    pub(crate) async fn work_available(&self) {
        self.wake.notified().await;
    }
}

impl std::fmt::Debug for RobotGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RobotGrid")
            .field("robot", &inner.robot)
            .field("pending", &inner.queue.len())
            .field("phase", &inner.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{parse_line, TurnDirection};
    use crate::robot::Heading;

    fn run(grid: &RobotGrid, line: &str) -> Reply {
        grid.execute(parse_line(line).unwrap())
    }

    fn drain(grid: &RobotGrid) -> usize {
        let mut applied = 0;
        while let TickOutcome::Applied { .. } = grid.tick() {
            applied += 1;
        }
        applied
    }

    #[test]
    fn test_queries() {
        let grid = RobotGrid::new();
        assert_eq!(run(&grid, "GET_DIMENSIONS").to_string(), "15 15");
        assert_eq!(run(&grid, "GET_POSITION").to_string(), "7 7 0");
    }

    #[test]
    fn test_repeated_position_is_stable() {
        let grid = RobotGrid::new();
        run(&grid, "FORWARD 2");
        let first = run(&grid, "GET_POSITION");
        let second = run(&grid, "GET_POSITION");
        assert_eq!(first, second);
    }

    #[test]
    fn test_forward_three_ticks() {
        let grid = RobotGrid::new();
        assert_eq!(run(&grid, "FORWARD 3"), Reply::Ok);
        assert_eq!(grid.pending(), 3);
        assert_eq!(grid.phase(), DrainPhase::Draining);

        for _ in 0..3 {
            assert!(matches!(grid.tick(), TickOutcome::Applied { .. }));
        }
        assert_eq!(run(&grid, "GET_POSITION").to_string(), "7 4 0");

        // The tick that finds the queue empty applies nothing
        assert_eq!(grid.tick(), TickOutcome::Idle);
        assert_eq!(grid.phase(), DrainPhase::Idle);
        assert_eq!(grid.snapshot().wire(), "7 4 0");
    }

    #[test]
    fn test_turn_is_queued() {
        let grid = RobotGrid::new();
        run(&grid, "TURN RIGHT");
        // Not applied until the scheduler ticks
        assert_eq!(grid.snapshot().heading, Heading::North);

        let outcome = grid.tick();
        assert_eq!(
            outcome,
            TickOutcome::Applied {
                action: PendingAction::TurnRight,
                snapshot: RobotSnapshot {
                    x: 7,
                    y: 7,
                    heading: Heading::East
                },
                remaining: 0,
            }
        );
    }

    #[test]
    fn test_forward_then_backward_restores_position() {
        let grid = RobotGrid::with_state(RobotState::at(1, 13, Heading::South));
        let before = grid.snapshot();
        run(&grid, "FORWARD 5");
        run(&grid, "BACKWARD 5");
        assert_eq!(drain(&grid), 10);
        assert_eq!(grid.snapshot(), before);
    }

    #[test]
    fn test_center_applies_immediately_and_keeps_queue() {
        let grid = RobotGrid::with_state(RobotState::at(0, 0, Heading::West));
        run(&grid, "FORWARD 2");
        assert_eq!(run(&grid, "CENTER"), Reply::Ok);

        let snap = grid.snapshot();
        assert_eq!((snap.x, snap.y, snap.heading), (7, 7, Heading::West));
        assert_eq!(grid.pending(), 2);

        drain(&grid);
        assert_eq!(grid.snapshot().wire(), "5 7 270");
    }

    #[test]
    fn test_zero_steps_stay_idle() {
        let grid = RobotGrid::new();
        assert_eq!(run(&grid, "FORWARD 0"), Reply::Ok);
        assert_eq!(grid.pending(), 0);
        assert_eq!(grid.phase(), DrainPhase::Idle);
    }

    #[test]
    fn test_ticks_publish_snapshots() {
        let grid = RobotGrid::new();
        let sub = grid.subscribe();
        grid.execute(Command::Turn(TurnDirection::Left));
        grid.tick();
        assert_eq!(sub.latest().heading, Heading::West);
    }

    #[tokio::test]
    async fn test_enqueue_wakes_scheduler_permit() {
        let grid = RobotGrid::new();
        // Permit is stored even though nobody is waiting yet
        grid.enqueue(PendingAction::StepForward, 1);
        tokio::time::timeout(std::time::Duration::from_secs(1), grid.work_available())
            .await
            .expect("wake permit should be available");
    }
}
