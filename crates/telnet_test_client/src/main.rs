//! # MUD Telnet Load Client
//!
//! Connects a number of simulated players to a running server, has each of
//! them gossip a few times, then quits and reports what every player heard.
//!
//! ```bash
//! simulate --address 127.0.0.1:2323 --players 10 --messages 5
//! ```

use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Parser, Debug, Clone)]
#[command(name = "simulate")]
#[command(about = "MUD telnet load client")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:2323")]
    address: String,

    /// Number of simultaneous players
    #[arg(short, long, default_value = "5")]
    players: u32,

    /// Gossip lines sent by each player
    #[arg(short, long, default_value = "3")]
    messages: u32,

    /// Pause between lines in milliseconds
    #[arg(short, long, default_value = "250")]
    interval_ms: u64,

    /// How long to keep listening before quitting, in milliseconds
    #[arg(short, long, default_value = "1000")]
    linger_ms: u64,
}

/// Turns raw server bytes into text lines, dropping telnet commands.
#[derive(Debug, Default)]
struct LineDecoder {
    pending: Vec<u8>,
    line: Vec<u8>,
}

impl LineDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        let mut i = 0;

        while i < self.pending.len() {
            let byte = self.pending[i];
            if byte == IAC {
                match self.command_len(i) {
                    Some(len) => i += len,
                    None => break,
                }
                continue;
            }

            match byte {
                b'\n' => lines.push(String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned()),
                b'\r' | 0 => {}
                _ => self.line.push(byte),
            }
            i += 1;
        }

        self.pending.drain(..i);
        lines
    }

    /// Length of the command starting at `start`, or `None` when it is cut off.
    fn command_len(&self, start: usize) -> Option<usize> {
        let rest = &self.pending[start..];
        match rest.get(1)? {
            &IAC => Some(2),
            &SB => rest
                .windows(2)
                .position(|pair| pair == [IAC, SE])
                .map(|end| end + 2),
            &verb if verb > SB => rest.get(2).map(|_| 3),
            _ => Some(2),
        }
    }
}

#[derive(Debug, Default)]
struct PlayerReport {
    lines: Vec<String>,
    gossip_heard: usize,
    said_goodbye: bool,
}

async fn simulate_player(index: u32, args: Args) -> Result<PlayerReport, Box<dyn std::error::Error + Send + Sync>> {
    let stream = TcpStream::connect(&args.address).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();
    info!("🔗 Player {} connected to {}", index, args.address);

    let listener = tokio::spawn(async move {
        let mut decoder = LineDecoder::default();
        let mut lines = Vec::new();
        let mut buffer = [0u8; 1024];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => lines.extend(decoder.feed(&buffer[..n])),
                Err(e) => {
                    warn!("⚠️ Read failed: {}", e);
                    break;
                }
            }
        }
        lines
    });

    for message in 0..args.messages {
        let line = format!("gossip hello from player {index} #{message}\r\n");
        writer.write_all(line.as_bytes()).await?;
        sleep(Duration::from_millis(args.interval_ms)).await;
    }

    sleep(Duration::from_millis(args.linger_ms)).await;
    writer.write_all(b"quit\r\n").await?;

    let lines = match timeout(Duration::from_secs(5), listener).await {
        Ok(joined) => joined?,
        Err(_) => {
            warn!("⏰ Player {} never saw the connection close", index);
            Vec::new()
        }
    };

    Ok(PlayerReport {
        gossip_heard: lines.iter().filter(|line| line.contains(" gossips: ")).count(),
        said_goodbye: lines.iter().any(|line| line == "Goodbye."),
        lines,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    info!("🚀 Starting telnet simulation");
    info!("   • Server: {}", args.address);
    info!("   • Players: {}", args.players);
    info!("   • Gossip per player: {}", args.messages);

    let mut handles = Vec::new();
    for index in 0..args.players {
        let args = args.clone();
        handles.push(tokio::spawn(async move { (index, simulate_player(index, args).await) }));

        // Stagger connections
        sleep(Duration::from_millis(50)).await;
    }

    let expected = (args.players * args.messages) as usize;
    let mut complete = 0;
    for handle in handles {
        match handle.await? {
            (index, Ok(report)) => {
                info!(
                    "📋 Player {}: {} lines, {}/{} gossip heard, goodbye: {}",
                    index,
                    report.lines.len(),
                    report.gossip_heard,
                    expected,
                    report.said_goodbye
                );
                if report.gossip_heard == expected && report.said_goodbye {
                    complete += 1;
                }
            }
            (index, Err(e)) => error!("❌ Player {} simulation failed: {}", index, e),
        }
    }

    info!("✅ Simulation complete: {}/{} players heard everything", complete, args.players);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_strips_negotiation() {
        let mut decoder = LineDecoder::default();
        let lines = decoder.feed(&[255, 254, 1, 255, 251, 1, b'h', b'i', b'\r', b'\n']);
        assert_eq!(lines, vec!["hi"]);
    }

    #[test]
    fn test_decoder_holds_split_command_and_line() {
        let mut decoder = LineDecoder::default();
        assert!(decoder.feed(&[b'a', 255]).is_empty());
        assert!(decoder.feed(&[251]).is_empty());
        assert_eq!(decoder.feed(&[3, b'b', b'\r', b'\n', b'c']), vec!["ab"]);
        assert_eq!(decoder.feed(b"\r\n"), vec!["c"]);
    }

    #[test]
    fn test_decoder_skips_subnegotiation() {
        let mut decoder = LineDecoder::default();
        let lines = decoder.feed(&[255, 250, 24, 0, b'x', 255, 240, b'o', b'k', b'\n']);
        assert_eq!(lines, vec!["ok"]);
    }
}
