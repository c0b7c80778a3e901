/// Decoded events delivered to the caller
///
/// Both transports terminate here: a decoded record plus the symbol its
/// index resolved to, and the relay-to-consumer latency at decode time.

use crate::protocol::{DepthSnapshot, Level, Side, Tick, TickKind};

#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub symbol: String,
    pub kind: TickKind,
    pub side: Side,
    pub tick: Tick,
    pub latency_ns: i64,
}

impl TickEvent {
    /// None when the tick's kind carries no side
    pub fn from_tick(symbol: String, tick: Tick, latency_ns: i64) -> Option<Self> {
        Some(TickEvent {
            symbol,
            kind: TickKind::from_kind(tick.kind)?,
            side: Side::from_kind(tick.kind)?,
            tick,
            latency_ns,
        })
    }

    pub fn price(&self) -> f64 {
        self.tick.price
    }

    pub fn size(&self) -> f64 {
        self.tick.size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthEvent {
    pub symbol: String,
    pub snapshot: DepthSnapshot,
    /// Asks first, then bids, in wire order
    pub levels: Vec<Level>,
    pub latency_ns: i64,
}

impl DepthEvent {
    pub fn asks(&self) -> &[Level] {
        &self.levels[..self.split()]
    }

    pub fn bids(&self) -> &[Level] {
        &self.levels[self.split()..]
    }

    // Decoding guarantees ask_count <= levels.len(); clamp anyway for
    // hand-built events.
    fn split(&self) -> usize {
        usize::try_from(self.snapshot.ask_count)
            .unwrap_or(0)
            .min(self.levels.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Tick(TickEvent),
    Depth(DepthEvent),
}

impl FeedEvent {
    pub fn symbol(&self) -> &str {
        match self {
            FeedEvent::Tick(e) => &e.symbol,
            FeedEvent::Depth(e) => &e.symbol,
        }
    }

    pub fn latency_ns(&self) -> i64 {
        match self {
            FeedEvent::Tick(e) => e.latency_ns,
            FeedEvent::Depth(e) => e.latency_ns,
        }
    }
}
