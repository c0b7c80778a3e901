use clap::{Args, Parser, Subcommand};
use relay_feed::datagram::{DEFAULT_LOCAL_ADDR, DEFAULT_RELAY_ADDR};
use relay_feed::ring::DEFAULT_RING_PATH;
use std::net::SocketAddr;
use std::path::PathBuf;

/// tickstream: print market-data ticks from a feed relay
#[derive(Parser, Debug)]
#[command(name = "tickstream")]
pub struct Config {
    #[command(subcommand)]
    pub transport: Transport,
}

#[derive(Subcommand, Debug)]
pub enum Transport {
    /// Subscribe to symbols over datagrams
    Udp(UdpArgs),
    /// Tail the relay's shared-memory ring buffer
    Shm(ShmArgs),
}

#[derive(Args, Debug)]
pub struct UdpArgs {
    /// Relay control endpoint
    #[arg(long, env = "RELAY_ADDR", default_value = DEFAULT_RELAY_ADDR)]
    pub relay_addr: SocketAddr,

    /// Local address to bind
    #[arg(long, env = "LOCAL_ADDR", default_value = DEFAULT_LOCAL_ADDR)]
    pub local_addr: SocketAddr,

    /// Receive timeout in milliseconds (0 blocks)
    #[arg(long, env = "RECV_TIMEOUT_MS", default_value = "200")]
    pub recv_timeout_ms: u64,

    /// Comma-separated symbols (e.g. binance-futures:btcusdt,bybit:BTCUSDT)
    #[arg(
        long,
        env = "RELAY_SYMBOLS",
        value_delimiter = ',',
        default_value = "binance-futures:btcusdt,binance:btcusdt"
    )]
    pub symbols: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ShmArgs {
    /// Path of the shared region
    #[arg(long, env = "RING_PATH", default_value = DEFAULT_RING_PATH)]
    pub path: PathBuf,

    /// Slot count of the ring
    #[arg(long, env = "RING_CAPACITY", default_value = "100000")]
    pub capacity: usize,

    /// Sleep between polls once caught up, in microseconds (0 spins)
    #[arg(long, env = "RING_IDLE_SLEEP_US", default_value = "1")]
    pub idle_sleep_us: u64,

    /// Comma-separated instrument names as id=symbol (e.g. 1=binance-futures:btcusdt)
    #[arg(long, env = "RING_INSTRUMENTS", value_delimiter = ',', value_parser = parse_instrument)]
    pub instruments: Vec<(i32, String)>,
}

/// Parse `id=symbol`
pub fn parse_instrument(raw: &str) -> Result<(i32, String), String> {
    let (id, symbol) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected id=symbol, got {:?}", raw))?;
    let id = id
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid instrument id {:?}: {}", id, e))?;
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(format!("empty symbol in {:?}", raw));
    }
    Ok((id, symbol.to_string()))
}
