/// Datagram feed client
///
/// One socket carries both directions of the control protocol and the
/// binary data stream. Datagrams from the relay's control port are
/// confirmations; everything else is data. There is no reconnect state:
/// a bound client is active until dropped.

use crate::clock::{Clock, SystemClock};
use crate::control::{self, Confirmation};
use crate::decoder::{DecodeError, Decoder, Message};
use crate::error::{FeedError, FeedResult};
use crate::event::{DepthEvent, FeedEvent, TickEvent};
use crate::registry::SubscriptionRegistry;
use crate::shutdown::ShutdownToken;
use crate::stats::{DropReason, FeedStats};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest datagram the relay sends
pub const DATAGRAM_BUF_SIZE: usize = 65536;

pub const DEFAULT_RELAY_ADDR: &str = "10.11.4.97:9080";
pub const DEFAULT_LOCAL_ADDR: &str = "0.0.0.0:9088";

/// Send/receive primitive the client runs on
pub trait DatagramChannel {
    fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl DatagramChannel for UdpSocket {
    fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, payload, target)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

#[derive(Debug, Clone)]
pub struct DatagramConfig {
    /// Relay control endpoint; its port identifies confirmations
    pub relay_addr: SocketAddr,
    pub local_addr: SocketAddr,
    /// Bounds each receive so the shutdown flag is observed. None blocks.
    pub recv_timeout: Option<Duration>,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        DatagramConfig {
            relay_addr: SocketAddr::from(([10, 11, 4, 97], 9080)),
            local_addr: SocketAddr::from(([0, 0, 0, 0], 9088)),
            recv_timeout: Some(Duration::from_millis(200)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotFound,
}

pub struct DatagramFeed<C = UdpSocket, K = SystemClock> {
    channel: C,
    clock: K,
    relay_addr: SocketAddr,
    registry: SubscriptionRegistry,
    stats: FeedStats,
    buf: Vec<u8>,
}

impl DatagramFeed<UdpSocket, SystemClock> {
    /// Bind the local socket. Failure here is fatal to the caller.
    pub fn bind(config: &DatagramConfig) -> FeedResult<Self> {
        let setup_err = |source| FeedError::TransportSetup {
            target: config.local_addr.to_string(),
            source,
        };

        let socket = UdpSocket::bind(config.local_addr).map_err(setup_err)?;
        socket.set_read_timeout(config.recv_timeout).map_err(setup_err)?;

        info!(
            local = %config.local_addr,
            relay = %config.relay_addr,
            "datagram feed bound"
        );
        Ok(Self::with_channel(socket, SystemClock, config.relay_addr))
    }
}

impl<C: DatagramChannel, K: Clock> DatagramFeed<C, K> {
    pub fn with_channel(channel: C, clock: K, relay_addr: SocketAddr) -> Self {
        DatagramFeed {
            channel,
            clock,
            relay_addr,
            registry: SubscriptionRegistry::new(),
            stats: FeedStats::new(),
            buf: vec![0u8; DATAGRAM_BUF_SIZE],
        }
    }

    /// Ask the relay for `symbol`. The index binding arrives later as a
    /// confirmation picked up by `poll`.
    pub fn subscribe(&mut self, symbol: &str) -> FeedResult<()> {
        let payload = control::subscribe_payload(symbol)?;
        info!(symbol, "subscribing");
        self.channel.send_to(&payload, self.relay_addr)?;
        Ok(())
    }

    /// Tell the relay to stop sending `symbol` and forget it locally without
    /// waiting for an acknowledgement. The entry is kept if the send fails.
    pub fn unsubscribe(&mut self, symbol: &str) -> FeedResult<UnsubscribeOutcome> {
        if !self.registry.contains(symbol) {
            info!(symbol, "symbol not found in subscriptions");
            return Ok(UnsubscribeOutcome::NotFound);
        }

        let payload = control::unsubscribe_payload(symbol)?;
        info!(symbol, "unsubscribing");
        self.channel.send_to(&payload, self.relay_addr)?;
        self.registry.remove(symbol);
        Ok(UnsubscribeOutcome::Removed)
    }

    /// Unsubscribe every current entry. Keeps going past failures and
    /// reports the symbols that could not be unsubscribed.
    pub fn unsubscribe_all(&mut self) -> FeedResult<usize> {
        let mut removed = 0;
        let mut failed = Vec::new();

        for symbol in self.registry.symbols() {
            match self.unsubscribe(&symbol) {
                Ok(UnsubscribeOutcome::Removed) => removed += 1,
                Ok(UnsubscribeOutcome::NotFound) => {}
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "unsubscribe failed");
                    failed.push(symbol);
                }
            }
        }

        if failed.is_empty() {
            Ok(removed)
        } else {
            Err(FeedError::UnsubscribeFailed { failed })
        }
    }

    pub fn resolve(&self, index: i32) -> Option<&str> {
        self.registry.resolve(index)
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Receive one datagram and turn it into an event.
    ///
    /// Ok(None) covers confirmations, dropped data and receive timeouts.
    /// Err is a transport failure; the caller decides whether to continue.
    pub fn poll(&mut self) -> FeedResult<Option<FeedEvent>> {
        let mut buf = std::mem::take(&mut self.buf);
        let received = self.channel.recv_from(&mut buf);

        let result = match received {
            Ok((len, from)) => Ok(self.dispatch(&buf[..len], from)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => {
                self.stats.record_io_error();
                Err(FeedError::TransportIo(e))
            }
        };

        self.buf = buf;
        result
    }

    /// Pull events until `shutdown` is set, then unsubscribe everything.
    pub fn run<F>(&mut self, shutdown: &ShutdownToken, mut on_event: F) -> FeedResult<()>
    where
        F: FnMut(FeedEvent),
    {
        info!("starting to receive data");
        self.registry.log_status();
        while !shutdown.is_shutdown() {
            match self.poll() {
                Ok(Some(event)) => on_event(event),
                Ok(None) => {}
                Err(e) => {
                    if !shutdown.is_shutdown() {
                        warn!(error = %e, "failed to receive data");
                    }
                }
            }
        }

        info!("shutting down, unsubscribing");
        self.registry.log_status();
        let cleanup = self.unsubscribe_all();
        self.stats.log_summary();
        cleanup.map(|_| ())
    }

    fn dispatch(&mut self, payload: &[u8], from: SocketAddr) -> Option<FeedEvent> {
        if from.port() == self.relay_addr.port() {
            self.handle_confirmation(payload);
            return None;
        }
        self.handle_data(payload)
    }

    fn handle_confirmation(&mut self, payload: &[u8]) {
        match control::parse_confirmation(payload) {
            Ok(Confirmation { index, symbol }) => {
                self.registry.confirm(index, &symbol);
            }
            Err(e) => {
                warn!(error = %e, len = payload.len(), "dropping malformed confirmation");
                self.stats.record_drop(DropReason::MalformedControl);
            }
        }
    }

    fn handle_data(&mut self, payload: &[u8]) -> Option<FeedEvent> {
        let header = match Decoder::decode_header(payload) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "data too short, skipping");
                self.stats.record_drop(DropReason::Malformed);
                return None;
            }
        };

        // In-flight data after an unsubscribe lands here
        let symbol = match self.registry.resolve(header.index) {
            Some(symbol) => symbol.to_string(),
            None => {
                debug!(index = header.index, "no subscription for index");
                self.stats.record_drop(DropReason::UnresolvedIndex);
                return None;
            }
        };

        let message = match Decoder::decode(payload) {
            Ok(message) => message,
            Err(DecodeError::UnknownKind(kind)) => {
                debug!(kind, symbol = %symbol, "ignoring unknown message kind");
                self.stats.record_drop(DropReason::UnknownKind);
                return None;
            }
            Err(e) => {
                warn!(error = %e, symbol = %symbol, "failed to parse message");
                self.stats.record_drop(DropReason::Malformed);
                return None;
            }
        };

        let latency_ns = self.clock.now_ns().saturating_sub(message.local_time_ns());
        let event = match message {
            Message::Depth(snapshot, levels) => FeedEvent::Depth(DepthEvent {
                symbol,
                snapshot,
                levels,
                latency_ns,
            }),
            Message::TopOfBook(tick) | Message::Trade(tick) => {
                FeedEvent::Tick(TickEvent::from_tick(symbol, tick, latency_ns)?)
            }
        };

        self.stats.record_event(payload.len(), latency_ns);
        Some(event)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Side, Tick};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_ns(&self) -> i64 {
            self.0
        }
    }

    #[derive(Default)]
    struct ScriptedChannel {
        inbound: RefCell<VecDeque<(Vec<u8>, SocketAddr)>>,
        sent: RefCell<Vec<Vec<u8>>>,
        fail_sends: bool,
    }

    impl DatagramChannel for ScriptedChannel {
        fn send_to(&self, payload: &[u8], _target: SocketAddr) -> io::Result<usize> {
            if self.fail_sends {
                return Err(io::Error::new(io::ErrorKind::Other, "send failed"));
            }
            self.sent.borrow_mut().push(payload.to_vec());
            Ok(payload.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            match self.inbound.borrow_mut().pop_front() {
                Some((data, from)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok((data.len(), from))
                }
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    fn relay() -> SocketAddr {
        "127.0.0.1:9080".parse().unwrap()
    }

    fn publisher() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn feed(channel: ScriptedChannel) -> DatagramFeed<ScriptedChannel, FixedClock> {
        DatagramFeed::with_channel(channel, FixedClock(1_000_500), relay())
    }

    fn push(feed: &DatagramFeed<ScriptedChannel, FixedClock>, data: &[u8], from: SocketAddr) {
        feed.channel.inbound.borrow_mut().push_back((data.to_vec(), from));
    }

    #[test]
    fn test_confirmation_then_tick() {
        let mut feed = feed(ScriptedChannel::default());
        push(&feed, b"7:binance:btcusdt", relay());
        assert_eq!(feed.poll().unwrap(), None);
        assert_eq!(feed.resolve(7), Some("binance:btcusdt"));

        let tick = Tick {
            kind: 1,
            index: 7,
            tx_time_ms: 1,
            event_time_ms: 1,
            local_time_ns: 1_000_000,
            sequence: 1,
            price: 65000.5,
            size: 0.01,
        };
        push(&feed, &tick.encode(), publisher());

        match feed.poll().unwrap() {
            Some(FeedEvent::Tick(event)) => {
                assert_eq!(event.symbol, "binance:btcusdt");
                assert_eq!(event.side, Side::Bid);
                assert_eq!(event.price(), 65000.5);
                assert_eq!(event.size(), 0.01);
                assert_eq!(event.latency_ns, 500);
            }
            other => panic!("expected tick event, got {:?}", other),
        }
        assert_eq!(feed.stats().total_events(), 1);
    }

    #[test]
    fn test_timeout_is_not_an_error() {
        let mut feed = feed(ScriptedChannel::default());
        assert_eq!(feed.poll().unwrap(), None);
    }

    #[test]
    fn test_unsubscribe_send_failure_keeps_entry() {
        let channel = ScriptedChannel {
            fail_sends: true,
            ..Default::default()
        };
        let mut feed = feed(channel);
        feed.registry.confirm(1, "bybit:BTCUSDT");

        assert!(feed.unsubscribe("bybit:BTCUSDT").is_err());
        assert!(feed.registry().contains("bybit:BTCUSDT"));

        match feed.unsubscribe_all() {
            Err(FeedError::UnsubscribeFailed { failed }) => {
                assert_eq!(failed, vec!["bybit:BTCUSDT".to_string()]);
            }
            other => panic!("expected aggregated failure, got {:?}", other),
        }
    }

    #[test]
    fn test_subscribe_rejects_long_symbol() {
        let mut feed = feed(ScriptedChannel::default());
        let result = feed.subscribe(&"x".repeat(65));
        assert!(matches!(result, Err(FeedError::MalformedControl(_))));
        assert!(feed.channel.sent.borrow().is_empty());
    }
}
