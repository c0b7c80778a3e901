mod config;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use relay_feed::{
    DatagramConfig, DatagramFeed, FeedError, FeedEvent, RingConfig, RingFeed, ShutdownToken,
};
use tracing::{error, info, warn};

use config::{Config, ShmArgs, Transport, UdpArgs};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_feed=info,tickstream=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let shutdown = ShutdownToken::new();
    let handle = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        handle.shutdown();
    }) {
        error!(error = %e, "failed to install signal handler");
        return ExitCode::FAILURE;
    }

    let result = match config.transport {
        Transport::Udp(args) => run_udp(args, &shutdown),
        Transport::Shm(args) => run_shm(args, &shutdown),
    };

    match result {
        Ok(()) => {
            info!("tickstream stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "tickstream failed");
            ExitCode::FAILURE
        }
    }
}

fn run_udp(args: UdpArgs, shutdown: &ShutdownToken) -> Result<(), FeedError> {
    let config = DatagramConfig {
        relay_addr: args.relay_addr,
        local_addr: args.local_addr,
        recv_timeout: (args.recv_timeout_ms > 0).then(|| Duration::from_millis(args.recv_timeout_ms)),
    };
    let mut feed = DatagramFeed::bind(&config)?;

    for symbol in &args.symbols {
        if let Err(e) = feed.subscribe(symbol) {
            warn!(symbol = %symbol, error = %e, "failed to subscribe");
        }
    }

    feed.run(shutdown, print_event)
}

fn run_shm(args: ShmArgs, shutdown: &ShutdownToken) -> Result<(), FeedError> {
    let config = RingConfig {
        path: args.path,
        capacity: args.capacity,
        idle_sleep: Duration::from_micros(args.idle_sleep_us),
    };
    let mut feed = RingFeed::open(&config)?;
    for (id, symbol) in &args.instruments {
        feed.registry_mut().confirm(*id, symbol);
    }

    feed.run(shutdown, print_event);
    Ok(())
}

fn print_event(event: FeedEvent) {
    match event {
        FeedEvent::Tick(t) => {
            let label = match t.kind {
                relay_feed::TickKind::TopOfBook => "ticker",
                relay_feed::TickKind::DepthLevel => "depth",
                relay_feed::TickKind::Trade => "trade",
            };
            println!(
                "{}: {}, {}, {}, {}, latency:{}ns",
                t.symbol,
                label,
                t.side,
                t.price(),
                t.size(),
                t.latency_ns
            );
        }
        FeedEvent::Depth(d) => {
            println!(
                "{}: depth, {}, {}, latency:{}ns",
                d.symbol, d.snapshot.ask_count, d.snapshot.bid_count, d.latency_ns
            );
            let side = |levels: &[relay_feed::Level]| {
                levels
                    .iter()
                    .map(|l| format!("{}:{}", l.price, l.size))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!("asks: {}", side(d.asks()));
            println!("bids: {}", side(d.bids()));
        }
    }
}
