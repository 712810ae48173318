//! lumed — LAN peer discovery, chat and file transfer.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lume_core::{LocalIdentity, LumeConfig};
use lume_services::{EngineSettings, LumeContext};
use lumed::console::{self, ConsoleSink};
use lumed::{net, Node};

/// Lume: find peers on the local network, chat with them and send files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Display name announced to peers (at most 31 bytes)
    #[arg(requires = "port")]
    username: Option<String>,

    /// TCP port to accept connections on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Prompt for a username and port and save them as the default profile
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with console output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let config = LumeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LumeConfig::default()
    });

    if let Some(Cmd::Config) = args.command {
        return configure(config);
    }

    let identity = match (&args.username, args.port) {
        (Some(username), Some(port)) => LocalIdentity::new(username, port),
        _ => config.identity(),
    };
    let identity = match identity {
        Ok(identity) => identity.with_address(net::local_ipv4()),
        Err(e) => {
            if args.username.is_none() {
                eprintln!(
                    "Error: no usable profile in {} ({e})",
                    LumeConfig::file_path().display()
                );
                eprintln!("Please run 'lumed config' to set up your profile or provide arguments:");
            } else {
                eprintln!("Error: {e}");
            }
            eprintln!("  lumed <username> <tcp_port>  (Start with specific settings)");
            eprintln!("  lumed config                 (Configure interactively)");
            eprintln!("  lumed                        (Start using saved config)");
            std::process::exit(1);
        }
    };

    tracing::info!(
        name = %identity.name,
        port = identity.tcp_port,
        addr = %identity.display_address(),
        "lumed starting"
    );

    let settings = EngineSettings::from(&config);
    let sink = ConsoleSink::new(settings.offer_timeout);
    let ctx = LumeContext::new(identity, settings, Arc::new(sink));

    ctx.status(format!(
        "Welcome to Lume, {}! [{}:{}]",
        ctx.identity().name,
        ctx.identity().display_address(),
        ctx.identity().tcp_port
    ));
    ctx.status(format!("Listening on port {}...", ctx.identity().tcp_port));
    ctx.status("Type /help for available commands");

    let node = Node::start(ctx.clone()).await;
    let console_task = tokio::spawn(console::run(ctx, node.subscribe_shutdown()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
        r = console_task => match r {
            Ok(Ok(())) => tracing::info!("console closed"),
            Ok(Err(e)) => tracing::error!(error = %e, "console failed"),
            Err(e) => tracing::error!(error = %e, "console task panicked"),
        },
    }

    node.shutdown().await;
    Ok(())
}

/// `lumed config`: prompt for the profile and save it.
fn configure(mut config: LumeConfig) -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    let username = prompt(&mut input, "Enter username: ")?;
    let port = prompt(&mut input, "Enter port: ")?;
    let port = match port.parse::<u16>() {
        Ok(p) if p >= 1 => p,
        _ => {
            eprintln!("Invalid port. Port must be between 1 and 65535.");
            std::process::exit(1);
        }
    };
    if let Err(e) = LocalIdentity::new(&username, port) {
        eprintln!("Invalid username: {e}");
        std::process::exit(1);
    }

    config.identity.username = username;
    config.identity.port = port;
    let path = config.save().context("failed to save configuration")?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn prompt(input: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read stdin")?;
    Ok(line.trim().to_string())
}
