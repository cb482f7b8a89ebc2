//! Text view of the robot
//!
//! Follows the grid's state notifier and logs a status line for every
//! change. With `--grid` the whole board is also drawn, one row per line.

use gridbot_core::{RobotSnapshot, StateSubscriber, GRID_HEIGHT, GRID_WIDTH};
use tokio::sync::watch;
use tracing::info;

/// `Grid: 15x15 | Position: (x, y), Facing: Up`
pub fn status_line(snapshot: &RobotSnapshot) -> String {
    format!("Grid: {GRID_WIDTH}x{GRID_HEIGHT} | {}", snapshot.describe())
}

/// ASCII board with `.` for empty cells and the heading glyph for the robot
pub fn render_grid(snapshot: &RobotSnapshot) -> String {
    let mut out = String::with_capacity(((GRID_WIDTH * 2 + 1) * GRID_HEIGHT) as usize);
    for y in 0..GRID_HEIGHT {
        for x in 0..GRID_WIDTH {
            if x > 0 {
                out.push(' ');
            }
            if x == snapshot.x && y == snapshot.y {
                out.push(snapshot.heading.glyph());
            } else {
                out.push('.');
            }
        }
        out.push('\n');
    }
    out
}

fn show(snapshot: &RobotSnapshot, draw_grid: bool) {
    info!(x = snapshot.x, y = snapshot.y, heading = %snapshot.heading, "{}", status_line(snapshot));
    if draw_grid {
        println!("{}", render_grid(snapshot));
    }
}

/// Render until shutdown or until the grid goes away
pub async fn run(mut states: StateSubscriber, draw_grid: bool, mut shutdown: watch::Receiver<bool>) {
    show(&states.latest(), draw_grid);

    loop {
        tokio::select! {
            next = states.changed() => match next {
                Some(snapshot) => show(&snapshot, draw_grid),
                None => break,
            },
            _ = shutdown.wait_for(|stop| *stop) => break,
        }
    }
}
