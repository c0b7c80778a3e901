/// Relay wire formats
///
/// Datagram messages share an 8-byte prefix so they can be demultiplexed
/// before a full decode:
///   - kind: i32  (±1 top-of-book, 2 depth snapshot, ±3 trade; sign is the side)
///   - index: i32 (subscription index assigned by the relay)
///
/// Tick (56 bytes):
///   [kind(4)][index(4)][tx_ms(8)][event_ms(8)][local_ns(8)][seq(8)][price(8)][size(8)]
///
/// Depth snapshot (56 + 16 * levels bytes):
///   [kind(4)][index(4)][tx_ms(8)][event_ms(8)][local_ns(8)][seq(8)]
///   [ask_offset(4)][ask_count(4)][bid_offset(4)][bid_count(4)] then levels, asks first
///
/// Ring slot (80 bytes), the shared-memory producer's layout:
///   [instrument_id(8)][kind(8)][tx_ms(8)][event_ms(8)][local_ns(8)][seq(8)]
///   [price text(16)][size text(16)]
///
/// All integers and floats are little-endian.

use byteorder::{ByteOrder, LittleEndian};

pub const HEADER_PREFIX_SIZE: usize = 8;
pub const TICK_SIZE: usize = 56;
pub const DEPTH_HEADER_SIZE: usize = 56;
pub const LEVEL_SIZE: usize = 16;

pub const RING_HEADER_SIZE: usize = 24;
pub const SLOT_SIZE: usize = 80;
pub const RING_CAPACITY: usize = 100_000;
pub const FLOAT_TEXT_SIZE: usize = 16;

pub const KIND_TOP_OF_BOOK: i32 = 1;
pub const KIND_DEPTH: i32 = 2;
pub const KIND_TRADE: i32 = 3;

/// Total byte length of a ring region with `capacity` slots, or None if it
/// does not fit in `usize`.
pub const fn ring_region_size(capacity: usize) -> Option<usize> {
    match capacity.checked_mul(SLOT_SIZE) {
        Some(slots) => slots.checked_add(RING_HEADER_SIZE),
        None => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
    Buy,
    Sell,
}

impl Side {
    /// Side encoded in the sign of a tick kind. Returns None for kinds that carry no side.
    pub fn from_kind(kind: i32) -> Option<Self> {
        match kind {
            1 | 2 => Some(Side::Bid),
            -1 | -2 => Some(Side::Ask),
            3 => Some(Side::Buy),
            -3 => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single-record tick describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickKind {
    TopOfBook,
    /// Single depth level; only produced by the ring transport
    DepthLevel,
    Trade,
}

impl TickKind {
    pub fn from_kind(kind: i32) -> Option<Self> {
        match kind.checked_abs()? {
            KIND_TOP_OF_BOOK => Some(TickKind::TopOfBook),
            KIND_DEPTH => Some(TickKind::DepthLevel),
            KIND_TRADE => Some(TickKind::Trade),
            _ => None,
        }
    }
}

/// The shared 8-byte prefix of every data datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub kind: i32,
    pub index: i32,
}

/// Top-of-book update or trade print
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub kind: i32,
    pub index: i32,
    pub tx_time_ms: i64,
    pub event_time_ms: i64,
    pub local_time_ns: i64,
    /// Sequence number for quotes, trade id for trades
    pub sequence: i64,
    pub price: f64,
    pub size: f64,
}

impl Tick {
    pub fn side(&self) -> Option<Side> {
        Side::from_kind(self.kind)
    }

    /// Encode into the 56-byte datagram layout
    pub fn encode(&self) -> [u8; TICK_SIZE] {
        let mut buf = [0u8; TICK_SIZE];
        LittleEndian::write_i32(&mut buf[0..4], self.kind);
        LittleEndian::write_i32(&mut buf[4..8], self.index);
        write_times(&mut buf[8..40], self.tx_time_ms, self.event_time_ms, self.local_time_ns, self.sequence);
        LittleEndian::write_f64(&mut buf[40..48], self.price);
        LittleEndian::write_f64(&mut buf[48..56], self.size);
        buf
    }
}

/// Fixed header of a depth snapshot; the levels follow it on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSnapshot {
    pub kind: i32,
    pub index: i32,
    pub tx_time_ms: i64,
    pub event_time_ms: i64,
    pub local_time_ns: i64,
    pub sequence: i64,
    pub ask_offset: i32, // unused by the relay
    pub ask_count: i32,
    pub bid_offset: i32, // unused by the relay
    pub bid_count: i32,
}

impl DepthSnapshot {
    /// Total number of level records that must follow the header.
    /// None if either count is negative.
    pub fn level_count(&self) -> Option<usize> {
        let asks = usize::try_from(self.ask_count).ok()?;
        let bids = usize::try_from(self.bid_count).ok()?;
        asks.checked_add(bids)
    }

    /// Exact wire length implied by the header counts
    pub fn wire_len(&self) -> Option<usize> {
        self.level_count()?
            .checked_mul(LEVEL_SIZE)?
            .checked_add(DEPTH_HEADER_SIZE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

/// Encode a depth snapshot header followed by `levels` (asks then bids).
/// The counts written are the ones stored in `snapshot`.
pub fn encode_depth(snapshot: &DepthSnapshot, levels: &[Level]) -> Vec<u8> {
    let mut buf = vec![0u8; DEPTH_HEADER_SIZE + levels.len() * LEVEL_SIZE];
    LittleEndian::write_i32(&mut buf[0..4], snapshot.kind);
    LittleEndian::write_i32(&mut buf[4..8], snapshot.index);
    write_times(
        &mut buf[8..40],
        snapshot.tx_time_ms,
        snapshot.event_time_ms,
        snapshot.local_time_ns,
        snapshot.sequence,
    );
    LittleEndian::write_i32(&mut buf[40..44], snapshot.ask_offset);
    LittleEndian::write_i32(&mut buf[44..48], snapshot.ask_count);
    LittleEndian::write_i32(&mut buf[48..52], snapshot.bid_offset);
    LittleEndian::write_i32(&mut buf[52..56], snapshot.bid_count);

    for (i, level) in levels.iter().enumerate() {
        let offset = DEPTH_HEADER_SIZE + i * LEVEL_SIZE;
        LittleEndian::write_f64(&mut buf[offset..offset + 8], level.price);
        LittleEndian::write_f64(&mut buf[offset + 8..offset + 16], level.size);
    }
    buf
}

/// Header of the shared ring region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingHeader {
    pub sequence: i64,
    pub from_index: i64,
    pub to_index: i64,
}

impl RingHeader {
    pub fn encode(&self) -> [u8; RING_HEADER_SIZE] {
        let mut buf = [0u8; RING_HEADER_SIZE];
        LittleEndian::write_i64(&mut buf[0..8], self.sequence);
        LittleEndian::write_i64(&mut buf[8..16], self.from_index);
        LittleEndian::write_i64(&mut buf[16..24], self.to_index);
        buf
    }
}

/// Encode a tick in the ring slot layout. Price and size are written as
/// NUL-padded decimal text. A value whose shortest text is longer than the
/// 16-byte field is written in exponent form at the widest precision that
/// fits, so it decodes to the nearest representable value rather than
/// exactly.
pub fn encode_slot(tick: &Tick) -> [u8; SLOT_SIZE] {
    let mut buf = [0u8; SLOT_SIZE];
    LittleEndian::write_i64(&mut buf[0..8], tick.index as i64);
    LittleEndian::write_i64(&mut buf[8..16], tick.kind as i64);
    write_times(&mut buf[16..48], tick.tx_time_ms, tick.event_time_ms, tick.local_time_ns, tick.sequence);
    write_float_text(&mut buf[48..64], tick.price);
    write_float_text(&mut buf[64..80], tick.size);
    buf
}

fn write_times(buf: &mut [u8], tx_ms: i64, event_ms: i64, local_ns: i64, sequence: i64) {
    LittleEndian::write_i64(&mut buf[0..8], tx_ms);
    LittleEndian::write_i64(&mut buf[8..16], event_ms);
    LittleEndian::write_i64(&mut buf[16..24], local_ns);
    LittleEndian::write_i64(&mut buf[24..32], sequence);
}

fn write_float_text(field: &mut [u8], value: f64) {
    let text = float_text(value);
    field[..text.len()].copy_from_slice(text.as_bytes());
}

fn float_text(value: f64) -> String {
    let text = value.to_string();
    if text.len() <= FLOAT_TEXT_SIZE {
        return text;
    }
    // "-1e-308" is the longest zero-precision form, so some precision fits
    (0..FLOAT_TEXT_SIZE)
        .rev()
        .map(|precision| format!("{:.*e}", precision, value))
        .find(|text| text.len() <= FLOAT_TEXT_SIZE)
        .unwrap_or_default()
}

// Compile-time layout checks
const _: () = {
    assert!(TICK_SIZE == HEADER_PREFIX_SIZE + 6 * 8);
    assert!(DEPTH_HEADER_SIZE == HEADER_PREFIX_SIZE + 4 * 8 + 4 * 4);
    assert!(SLOT_SIZE == 6 * 8 + 2 * FLOAT_TEXT_SIZE);
    assert!(RING_HEADER_SIZE == 3 * 8);
};
