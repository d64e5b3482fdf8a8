//! Lifegrid terminal client.
//!
//! Connects to the simulation server, keeps the session and framebuffer in
//! sync with it, and drives everything from line commands on stdin (`help`
//! lists them). Logging goes through `env_logger`; set `RUST_LOG=info` to
//! see connection lifecycle messages.

mod config;
mod input;
mod state;

use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use config::AppConfig;
use lifegrid_collab::{CommandEmitter, SyncClient};
use state::{AppState, Reply};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    info!(
        "Lifegrid client starting, server {} ({})",
        config.service_url, config.client.url
    );

    let mut client = SyncClient::spawn(config.client.clone());
    let Some(mut events) = client.take_event_rx() else {
        error!("client event stream unavailable");
        return;
    };

    let mut app = match AppState::new(CommandEmitter::new(client.handle()), config.player.clone()) {
        Ok(app) => app,
        Err(e) => {
            error!("failed to create framebuffer: {e}");
            client.shutdown().await;
            return;
        }
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", input::HELP);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(stats) = app.handle_client_event(event) {
                        log::debug!("frame: {stats:?}");
                    }
                }
                None => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => match input::parse(&line) {
                    Ok(Some(cmd)) => match app.handle_input(cmd) {
                        Reply::Nothing => {}
                        Reply::Text(text) => println!("{text}"),
                        Reply::Quit => break,
                    },
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                },
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Err(e) => {
                    error!("stdin read failed: {e}");
                    break;
                }
            },
        }
    }

    info!("shutting down after {} redraws", app.renderer.redraws());
    client.shutdown().await;
}
