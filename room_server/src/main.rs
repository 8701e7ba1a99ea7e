//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p room_server -- [--config room.json] [--addr 127.0.0.1:2567]
//!                               [--room my_room] [--max-clients 4]
//!
//! Console commands:
//!   status  - Show room occupancy and player poses
//!   quit    - Shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use room_server::server::RoomServer;
use room_shared::config::RoomConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> anyhow::Result<RoomConfig> {
    let args: Vec<String> = env::args().collect();

    // A config file is the base; flags override it.
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
            "--max-clients" if i + 1 < args.len() => {
                cfg.max_clients = args[i + 1].parse().unwrap_or(cfg.max_clients);
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
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(
        addr = %cfg.server_addr,
        room = %cfg.room_name,
        max_clients = cfg.max_clients,
        "Starting server"
    );

    let server = RoomServer::bind(cfg).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

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

    println!("Server ready. Type 'status' for info, 'quit' to exit.");
    println!();

    let server = std::sync::Arc::new(server);
    let accept = {
        let server = server.clone();
        tokio::spawn(async move { server.run().await })
    };

    loop {
        tokio::select! {
            line = console_rx.recv() => {
                let Some(line) = line else {
                    // Stdin closed; keep serving until ctrl-c.
                    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
                    break;
                };
                if matches!(line.as_str(), "quit" | "exit") {
                    break;
                }
                for out in server.exec_console(&line).await? {
                    println!("{out}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    info!("Server shutting down");
    accept.abort();
    server.shutdown();
    Ok(())
}
