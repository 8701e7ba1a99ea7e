//! Client console.
//!
//! Text commands that stand in for a keyboard and a touch stick on a
//! headless client. Input commands act on `SharedInput` directly; anything
//! that needs the run loop is handed back to the caller.

use crate::input::{Key, SharedInput};

/// What the caller should do after a console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOutcome {
    /// Done; print these lines.
    Output(Vec<String>),
    /// Ask the run loop for its status.
    Status,
    Quit,
}

/// Stick geometry used by `stick <dx> <dy>`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickParams {
    pub radius: f32,
    pub deadzone: f32,
}

pub fn exec_console(line: &str, input: &SharedInput, stick: StickParams) -> ConsoleOutcome {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(cmd) = tokens.first() else {
        return ConsoleOutcome::Output(Vec::new());
    };
    let num = |i: usize| tokens.get(i).and_then(|t| t.parse::<f32>().ok());
    let out = |s: &str| ConsoleOutcome::Output(vec![s.to_string()]);

    match *cmd {
        "move" => match num(1) {
            Some(n) if n > 0.0 => {
                input.press(Key::Forward);
                out("Moving forward")
            }
            Some(n) if n < 0.0 => {
                input.press(Key::Back);
                out("Moving back")
            }
            Some(_) => {
                input.release(Key::Forward);
                out("Move released")
            }
            None => out("Usage: move <n>"),
        },
        "turn" => match num(1) {
            Some(n) if n > 0.0 => {
                input.press(Key::Left);
                out("Turning left")
            }
            Some(n) if n < 0.0 => {
                input.press(Key::Right);
                out("Turning right")
            }
            Some(_) => {
                input.release(Key::Left);
                out("Turn released")
            }
            None => out("Usage: turn <n>"),
        },
        "stick" => match (num(1), num(2)) {
            (Some(dx), Some(dy)) => {
                input.drag_stick(dx, dy, stick.radius, stick.deadzone);
                out("Stick moved")
            }
            _ => out("Usage: stick <dx> <dy>"),
        },
        "release" => {
            input.release_stick();
            out("Stick released")
        }
        "stop" => {
            input.clear();
            out("All input released")
        }
        "status" => ConsoleOutcome::Status,
        "quit" | "exit" => ConsoleOutcome::Quit,
        "help" => ConsoleOutcome::Output(
            [
                "move <n>        - forward (>0), back (<0), release (0)",
                "turn <n>        - left (>0), right (<0), release (0)",
                "stick <dx> <dy> - drag the virtual stick (screen pixels, y down)",
                "release         - let go of the stick",
                "stop            - release everything",
                "status          - show client status",
                "quit            - leave and exit",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ),
        other => ConsoleOutcome::Output(vec![format!("Unknown command: {other}")]),
    }
}
