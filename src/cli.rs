//! Command line interface for the `lanwire` binary.
//!
//! Two subcommands: `serve` hosts a relay server and `chat` joins one from
//! the terminal.

use std::net::SocketAddr;

use clap::{Parser, Subcommand};

/// Command line arguments for the `lanwire` binary.
#[derive(Debug, Parser)]
#[command(name = "lanwire", version, about = "LAN chat server and client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a relay server.
    Serve {
        /// Address to listen on.
        #[arg(short, long, default_value = "0.0.0.0:7777")]
        bind: SocketAddr,
    },
    /// Join a server and chat over stdin.
    ///
    /// Plain lines go to everyone. `/to NAME TEXT` sends to one peer and
    /// `/server TEXT` to the server application.
    Chat {
        /// Server address.
        #[arg(short, long, default_value = "127.0.0.1:7777")]
        server: SocketAddr,
        /// Nickname to ask for.
        #[arg(short, long)]
        nickname: String,
        /// Milliseconds between reconnect attempts.
        #[arg(long, default_value_t = 1000)]
        retry_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn serve_defaults_to_wildcard_address() {
        let cli = Cli::parse_from(["lanwire", "serve"]);
        let Command::Serve { bind } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(bind.port(), 7777);
        assert!(bind.ip().is_unspecified());
    }

    #[test]
    fn chat_requires_a_nickname() {
        assert!(Cli::try_parse_from(["lanwire", "chat"]).is_err());
        let cli = Cli::parse_from([
            "lanwire",
            "chat",
            "--server",
            "10.0.0.2:9000",
            "--nickname",
            "Sam",
        ]);
        let Command::Chat {
            server,
            nickname,
            retry_ms,
        } = cli.command
        else {
            panic!("expected chat");
        };
        assert_eq!(server.port(), 9000);
        assert_eq!(nickname, "Sam");
        assert_eq!(retry_ms, 1000);
    }
}
