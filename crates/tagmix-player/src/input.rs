//! Keyboard input handling
//!
//! Reads commands from stdin on a dedicated thread. Marker placements go
//! straight to the shared [`MarkerBoard`]; session commands (track
//! navigation, projection nudges, quit) are pushed to the session loop
//! over a lock-free queue.

use std::io::BufRead;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use rtrb::Producer;
use tagmix_core::engine::{ControlCommand, OFFSET_STEP, SCALE_STEP};

use crate::scene::MarkerBoard;

/// Capacity of the session command queue
///
/// The session loop drains the queue every tick, so this only has to
/// absorb one tick's worth of typing.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Delay between attempts to hand a quit command to a full queue
const QUIT_RETRY_DELAY: Duration = Duration::from_millis(2);

/// A parsed input line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    /// Forward a command to the session loop
    Command(ControlCommand),
    /// Place or move a marker on the board
    Place { id: u32, x: f32, y: f32 },
    /// Remove a marker from the board
    Remove(u32),
    /// Remove all markers
    Clear,
}

impl InputAction {
    /// Parse one input line into an action
    ///
    /// Line format:
    /// - `m <id> <x> <y>`: place or move marker `<id>` at screen position
    /// - `r <id>`: remove marker `<id>`
    /// - `c`: remove all markers
    /// - `n` / `p`: next / previous track
    /// - `+` / `-`: grow / shrink the projection scale
    /// - `h` / `l`: shift the projection left / right
    /// - `j` / `k`: shift the projection down / up
    /// - `q`: quit
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let head = parts.next()?;

        match head {
            "m" => {
                let id = parts.next()?.parse().ok()?;
                let x = parts.next()?.parse().ok()?;
                let y = parts.next()?.parse().ok()?;
                Some(Self::Place { id, x, y })
            }
            "r" => {
                let id = parts.next()?.parse().ok()?;
                Some(Self::Remove(id))
            }
            "c" => Some(Self::Clear),
            "n" => Some(Self::Command(ControlCommand::NextTrack)),
            "p" => Some(Self::Command(ControlCommand::PrevTrack)),
            "+" => Some(Self::Command(ControlCommand::NudgeScale(SCALE_STEP))),
            "-" => Some(Self::Command(ControlCommand::NudgeScale(-SCALE_STEP))),
            "h" => Some(Self::Command(ControlCommand::NudgeOffsetX(-OFFSET_STEP))),
            "l" => Some(Self::Command(ControlCommand::NudgeOffsetX(OFFSET_STEP))),
            "j" => Some(Self::Command(ControlCommand::NudgeOffsetY(OFFSET_STEP))),
            "k" => Some(Self::Command(ControlCommand::NudgeOffsetY(-OFFSET_STEP))),
            "q" => Some(Self::Command(ControlCommand::Quit)),
            _ => None,
        }
    }
}

/// Spawn the stdin reader thread
///
/// The thread exits after delivering a quit command, or when stdin
/// closes (which also quits the session).
pub fn spawn_input_thread(
    commands: Producer<ControlCommand>,
    board: MarkerBoard,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("tagmix-input".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            read_commands(stdin.lock(), &board, commands);
        })
        .context("Failed to spawn input thread")?;

    Ok(handle)
}

/// Forward parsed lines until a quit command has been delivered or the
/// reader ends
///
/// Ordinary commands are dropped with a warning when the queue is full;
/// a quit command is never dropped.
fn read_commands<R: BufRead>(
    reader: R,
    board: &MarkerBoard,
    mut commands: Producer<ControlCommand>,
) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("Error reading input: {}", e);
                break;
            }
        };

        let action = match InputAction::parse(&line) {
            Some(action) => action,
            None => {
                if !line.trim().is_empty() {
                    log::warn!("Unrecognized input {:?} (see startup banner)", line);
                }
                continue;
            }
        };

        match action {
            InputAction::Place { id, x, y } => board.place(id, x, y),
            InputAction::Remove(id) => board.remove(id),
            InputAction::Clear => board.clear(),
            InputAction::Command(ControlCommand::Quit) => {
                push_quit(&mut commands);
                return;
            }
            InputAction::Command(command) => {
                if commands.push(command).is_err() {
                    log::warn!("Command queue full, dropping {:?}", command);
                }
            }
        }
    }

    // reader closed; quit the session rather than running headless forever
    log::info!("Input stream closed, quitting");
    push_quit(&mut commands);
}

/// Deliver a quit command, waiting out a full queue
///
/// Quit is the one command that must not be dropped. The session loop
/// drains the queue every tick, so a slot opens within a tick interval.
fn push_quit(commands: &mut Producer<ControlCommand>) {
    while commands.push(ControlCommand::Quit).is_err() {
        thread::sleep(QUIT_RETRY_DELAY);
    }
}
