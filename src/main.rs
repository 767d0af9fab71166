//! `lanwire` binary: host a relay server or chat from the terminal.

mod cli;

use std::{net::SocketAddr, time::Duration};

use clap::Parser;
use cli::{Cli, Command};
use lanwire::{
    client::{ClientEvents, FixedInterval, LanClient},
    message::Message,
    server::{LanServer, ServerEvents, ServerHandle},
    session::SessionError,
    tag::Tag,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

struct ServerLog;

impl ServerEvents for ServerLog {
    fn on_client_connect(&self, _server: &ServerHandle, id: u8, nickname: &str) {
        info!(client = id, %nickname, "client joined");
    }

    fn on_client_disconnect(&self, _server: &ServerHandle, id: u8, nickname: Option<&str>) {
        info!(client = id, nickname = nickname.unwrap_or("-"), "client left");
    }

    fn on_receive(&self, server: &ServerHandle, from: u8, message: &Message) {
        info!(client = from, text = %message.text, "message for server");
        // Echo so the sender can see the server application is alive.
        if let Err(e) = server.send_to(from, message) {
            warn!(client = from, error = %e, "echo failed");
        }
    }

    fn on_error(&self, _server: &ServerHandle, client: Option<u8>, error: &SessionError) {
        warn!(?client, %error, "session error");
    }
}

struct Terminal;

impl ClientEvents for Terminal {
    fn on_connected(&self) { println!("* connected"); }

    fn on_client_connect(&self, nickname: &str) { println!("* {nickname} joined"); }

    fn on_client_disconnect(&self, nickname: &str) { println!("* {nickname} left"); }

    fn on_lost_connection(&self) { println!("* connection lost"); }

    fn on_reconnection_attempt(&self) { println!("* reconnecting"); }

    fn on_receive(&self, from: &str, message: &Message) {
        println!("<{from}> {}", message.text);
    }

    fn on_error(&self, error: &SessionError) { eprintln!("* error: {error}"); }
}

async fn serve(bind: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let server = LanServer::new().events(ServerLog).bind(bind)?;
    if let Some(addr) = server.local_addr() {
        info!(%addr, "listening");
    }
    server.run().await?;
    Ok(())
}

fn submit(client: &LanClient, line: &str) {
    let sent = if let Some(rest) = line.strip_prefix("/to ") {
        let (nickname, text) = rest.split_once(' ').unwrap_or((rest, ""));
        client.send_to(nickname, &Message::new(Tag::ClientToClient).with_text(text))
    } else if let Some(text) = line.strip_prefix("/server ") {
        client.send_to_server(&Message::new(Tag::ClientToServer).with_text(text))
    } else {
        client.send_to_all(&Message::new(Tag::ClientToAll).with_text(line))
    };
    if let Err(e) = sent {
        eprintln!("* not sent: {e}");
    }
}

async fn chat(
    server: SocketAddr,
    nickname: String,
    retry: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = LanClient::builder()
        .retry_policy(FixedInterval(retry))
        .events(Terminal)
        .start(server, nickname);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) if !line.trim().is_empty() => submit(&client, line.trim_end()),
                Some(_) => {}
                None => break,
            },
        }
    }
    client.disconnect_and_stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Command::Serve { bind } => serve(bind).await,
        Command::Chat {
            server,
            nickname,
            retry_ms,
        } => chat(server, nickname, Duration::from_millis(retry_ms)).await,
    }
}
