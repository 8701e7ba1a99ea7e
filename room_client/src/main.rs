//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p room_client -- [--config room.json] [--addr 127.0.0.1:2567] [--room my_room]
//!
//! The client joins the room, samples console-driven input, renders
//! headlessly and follows its own player with a chase viewpoint.
//!
//! Console commands:
//!   move <n>         - Forward (>0), back (<0), release (0)
//!   turn <n>         - Left (>0), right (<0), release (0)
//!   stick <dx> <dy>  - Drag the virtual stick
//!   release          - Let go of the stick
//!   stop             - Release all input
//!   status           - Show client status
//!   quit             - Leave and exit

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use room_client::{
    client::{ClientControl, GameClient},
    console::{exec_console, ConsoleOutcome, StickParams},
    input::SharedInput,
};
use room_shared::{config::RoomConfig, render::NullVisuals};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

fn parse_args() -> anyhow::Result<RoomConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            RoomConfig::load(path)?
        }
        None => RoomConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--room" if i + 1 < args.len() => {
                cfg.room_name = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(server = %cfg.server_addr, room = %cfg.room_name, "Starting client");

    let mut client = GameClient::connect(&cfg, NullVisuals::default())
        .await
        .context("connect")?;

    let input = SharedInput::new();
    let (control_tx, control_rx) = mpsc::channel::<ClientControl>(8);

    // Stdin reader thread.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    // Ctrl-C goes through the run loop so the leave is sent cleanly.
    let interrupt_tx = control_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = interrupt_tx.send(ClientControl::Quit).await;
        }
    });

    // Console task: input commands apply directly, the rest go to the run loop.
    let console_input = input.clone();
    let stick = StickParams {
        radius: cfg.stick_radius,
        deadzone: cfg.stick_deadzone,
    };
    tokio::spawn(async move {
        while let Some(line) = console_rx.recv().await {
            match exec_console(&line, &console_input, stick) {
                ConsoleOutcome::Output(lines) => {
                    for out in lines {
                        println!("{out}");
                    }
                }
                ConsoleOutcome::Status => {
                    let (reply, rx) = oneshot::channel();
                    if control_tx.send(ClientControl::Status(reply)).await.is_err() {
                        break;
                    }
                    if let Ok(lines) = rx.await {
                        for out in lines {
                            println!("{out}");
                        }
                    }
                }
                ConsoleOutcome::Quit => {
                    let _ = control_tx.send(ClientControl::Quit).await;
                    break;
                }
            }
        }
    });

    println!(
        "Joined as session {}. Type 'help' for commands, 'quit' to exit.",
        client.session_id
    );
    println!();

    client.run(&input, control_rx).await?;
    info!("Client exiting");
    Ok(())
}
