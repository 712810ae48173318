//! Line-oriented console front-end.
//!
//! Renders engine events on stdout and turns stdin lines into commands.
//! Anything that is not a recognised command is sent as a chat message to
//! the selected peer.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use lume_core::PeerName;
use lume_services::{EventSink, LumeContext, Peer};

use crate::send;

// ── Output ────────────────────────────────────────────────────────────────────

/// Prints every engine event as plain lines on stdout.
pub struct ConsoleSink {
    offer_timeout: Duration,
}

impl ConsoleSink {
    pub fn new(offer_timeout: Duration) -> Self {
        Self { offer_timeout }
    }
}

impl EventSink for ConsoleSink {
    fn on_peer_discovered(&self, peer: &Peer) {
        println!("New peer discovered: {}", peer.name);
    }

    fn on_chat_message(&self, sender: &PeerName, body: &str) {
        println!("{sender}: {body}");
    }

    fn on_file_offer(&self, sender: &PeerName, filename: &str, size: u64) {
        print!("{}", render_offer(sender, filename, size, self.offer_timeout));
    }

    fn on_status(&self, text: &str) {
        println!("{text}");
    }
}

fn render_offer(sender: &PeerName, filename: &str, size: u64, timeout: Duration) -> String {
    format!(
        "\nIncoming file transfer:\n  From: {sender}\n  File: {filename}\n  Size: {size} bytes\n\n  \
         /accept - Accept the file\n  /reject - Reject the file\n\n\
         (Will auto-reject in {} seconds)\n\n",
        timeout.as_secs()
    )
}

const HELP: &str = "\
Available commands:
  /peers          - List discovered peers
  /select <n>     - Select peer number n
  /next, /prev    - Select the next or previous peer
  /file <path>    - Send a file to the selected peer
  /accept         - Accept an incoming file transfer
  /reject         - Reject an incoming file transfer
  /help           - Show this help message
  /quit           - Quit
Any other line is sent as a message to the selected peer.";

/// One line per peer, numbered from 1, the selected one marked.
fn render_peers(peers: &[Peer], selected: usize) -> Vec<String> {
    if peers.is_empty() {
        return vec!["Scanning for peers...".to_string()];
    }
    peers
        .iter()
        .enumerate()
        .map(|(i, peer)| {
            let marker = if i == selected { '>' } else { ' ' };
            format!(
                "{marker} {}. {} {} (seen {}s ago)",
                i + 1,
                peer.name,
                peer.socket_addr(),
                peer.last_seen.elapsed().as_secs()
            )
        })
        .collect()
}

// ── Input ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Peers,
    /// Zero-based registry index.
    Select(usize),
    Next,
    Prev,
    Accept,
    Reject,
    File(PathBuf),
    Quit,
    Text(String),
    Usage(&'static str),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Command::Empty;
        }
        match line.trim() {
            "/help" => return Command::Help,
            "/peers" => return Command::Peers,
            "/next" => return Command::Next,
            "/prev" => return Command::Prev,
            "/accept" => return Command::Accept,
            "/reject" => return Command::Reject,
            "/quit" => return Command::Quit,
            "/file" => return Command::Usage("Usage: /file <path>"),
            "/select" => return Command::Usage("Usage: /select <n>"),
            _ => {}
        }
        if let Some(path) = line.strip_prefix("/file ") {
            let path = path.trim();
            if path.is_empty() {
                return Command::Usage("Usage: /file <path>");
            }
            return Command::File(PathBuf::from(path));
        }
        if let Some(n) = line.strip_prefix("/select ") {
            return match n.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Command::Select(n - 1),
                _ => Command::Usage("Usage: /select <n>"),
            };
        }
        Command::Text(line.to_string())
    }
}

/// Console state: the selected peer.
pub struct Console {
    ctx: LumeContext,
    selected: usize,
}

impl Console {
    pub fn new(ctx: LumeContext) -> Self {
        Self { ctx, selected: 0 }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Execute one command. Returns false when the console should exit.
    pub async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Empty => {}
            Command::Help => println!("{HELP}"),
            Command::Usage(text) => println!("{text}"),
            Command::Peers => {
                for line in render_peers(&self.ctx.registry().snapshot(), self.selected) {
                    println!("{line}");
                }
            }
            Command::Select(index) => {
                if index < self.ctx.registry().count() {
                    self.selected = index;
                    self.announce_selection();
                } else {
                    println!("No peer number {}", index + 1);
                }
            }
            Command::Next => self.step(1),
            Command::Prev => self.step(-1),
            Command::Accept => {
                self.ctx.decide_pending_transfer(true);
            }
            Command::Reject => {
                self.ctx.decide_pending_transfer(false);
            }
            Command::File(path) => {
                if let Err(e) = send::send_file(&self.ctx, self.selected, &path).await {
                    tracing::debug!(error = %e, "file send failed");
                }
            }
            Command::Text(text) => {
                if let Err(e) = send::send_text(&self.ctx, self.selected, &text).await {
                    tracing::debug!(error = %e, "text send failed");
                }
            }
            Command::Quit => return false,
        }
        true
    }

    fn step(&mut self, delta: isize) {
        let count = self.ctx.registry().count();
        if count == 0 {
            return;
        }
        self.selected = (self.selected as isize + delta).rem_euclid(count as isize) as usize;
        self.announce_selection();
    }

    fn announce_selection(&self) {
        if let Some(peer) = self.ctx.registry().lookup_by_index(self.selected) {
            println!("Selected {}: {}", self.selected + 1, peer.name);
        }
    }
}

/// Read commands from stdin until /quit, end of input or shutdown.
pub async fn run(ctx: LumeContext, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let mut console = Console::new(ctx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = shutdown.recv() => return Ok(()),
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    tracing::info!("stdin closed");
                    return Ok(());
                };
                if !console.handle(Command::parse(&line)).await {
                    return Ok(());
                }
            }
        }
    }
}
