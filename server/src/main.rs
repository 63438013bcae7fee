use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use relay_server::config::ServerConfig;
use relay_server::console::{self, AdminCommand};
use relay_server::engine::relay::ChatRelay;
use relay_server::net::listener::Server;
use relay_server::snapshot::StateSnapshot;

/// Multi-channel chat relay server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(long, default_value = "relay.toml")]
    config: String,

    /// Flat-file state (channels, passwords, block list) to load at startup.
    #[arg(long)]
    state: Option<String>,

    /// Run without the stdin admin console; stop with Ctrl-C.
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(&args.config)?;
    if let Some(state) = args.state {
        config.server.state_file = Some(state);
    }

    // A state file's endpoint wins over the TOML file; env vars still win over both.
    let snapshot = match &config.server.state_file {
        Some(path) => {
            let snapshot = StateSnapshot::load(path)?;
            if let Some(host) = &snapshot.host {
                config.server.host.clone_from(host);
            }
            if let Some(port) = snapshot.port {
                config.server.port = port;
            }
            config.apply_env_overrides();
            Some(snapshot)
        }
        None => None,
    };

    let relay = Arc::new(ChatRelay::new(config.to_settings()));
    if let Some(snapshot) = &snapshot {
        relay.load_snapshot(snapshot)?;
    }

    let mut server = Server::new(relay);
    let addr = server
        .start()
        .await
        .with_context(|| format!("cannot start relay on {}", config.address()))?;
    info!("Relay server started on {}", addr);

    if args.no_console {
        let interrupted = tokio::select! {
            result = server.wait() => {
                result?;
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted {
            server.stop().await?;
        }
    } else {
        run_console(&mut server).await;
        server.stop().await?;
    }
    Ok(())
}

/// Read admin commands from stdin until `exit`, EOF, or Ctrl-C. The server
/// may be stopped and started any number of times in between.
async fn run_console(server: &mut Server) {
    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("console closed; stopping");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "console read failed; stopping");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match AdminCommand::parse(&line) {
                    Ok(command) => {
                        let exit = command == AdminCommand::Exit;
                        println!("{}", console::execute(server, command).await);
                        if exit {
                            break;
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
        }
    }
}
