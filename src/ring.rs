/// Shared-memory ring buffer consumer
///
/// Tails a fixed-capacity slot array that an external producer overwrites
/// continuously. The only coordination is the producer's header cursors:
/// it writes a slot, then advances `to_index`. The consumer never writes,
/// never blocks the producer, and silently loses slots if it falls more than
/// a full lap behind.
///
/// The header cursors are loaded as atomics with Acquire ordering, pairing
/// with the producer's Release store of `to_index`; slots are copied only
/// after that load.
///
/// A slot can be overwritten while it is being copied out (torn read). That
/// cannot be detected from this side; decoding only rejects slots that are
/// structurally invalid, and the cursor moves on either way.

use crate::clock::{Clock, SystemClock};
use crate::decoder::Decoder;
use crate::error::{FeedError, FeedResult};
use crate::event::{FeedEvent, TickEvent};
use crate::protocol::{ring_region_size, RingHeader, RING_CAPACITY, RING_HEADER_SIZE, SLOT_SIZE};
use crate::registry::SubscriptionRegistry;
use crate::shutdown::ShutdownToken;
use crate::stats::{DropReason, FeedStats};
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_RING_PATH: &str = "/dev/shm/msg_queue";

const DEFAULT_IDLE_SLEEP: Duration = Duration::from_micros(1);

// Byte offsets of the header cursors
const SEQUENCE_OFFSET: usize = 0;
const FROM_INDEX_OFFSET: usize = 8;
const TO_INDEX_OFFSET: usize = 16;

#[derive(Debug, Clone)]
pub struct RingConfig {
    pub path: PathBuf,
    pub capacity: usize,
    /// Pause between polls once caught up. Zero spins.
    pub idle_sleep: Duration,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            path: PathBuf::from(DEFAULT_RING_PATH),
            capacity: RING_CAPACITY,
            idle_sleep: DEFAULT_IDLE_SLEEP,
        }
    }
}

/// Next cursor position, wrapping at `capacity`
#[inline]
pub fn advance(cursor: usize, capacity: usize) -> usize {
    (cursor + 1) % capacity
}

/// Interpret a published header cursor. None if it is outside the slot array.
#[inline]
pub fn cursor_from(raw: i64, capacity: usize) -> Option<usize> {
    usize::try_from(raw).ok().filter(|&c| c < capacity)
}

pub struct RingFeed<K = SystemClock> {
    map: Mmap,
    capacity: usize,
    cursor: usize,
    // Last observed to_index; the header is re-read only when the cursor reaches it
    to_index: usize,
    idle_sleep: Duration,
    clock: K,
    registry: SubscriptionRegistry,
    stats: FeedStats,
}

impl RingFeed<SystemClock> {
    /// Map the shared region read-only and start at the producer's `from_index`
    pub fn open(config: &RingConfig) -> FeedResult<Self> {
        let setup_err = |source| FeedError::TransportSetup {
            target: config.path.display().to_string(),
            source,
        };

        let file = File::open(&config.path).map_err(setup_err)?;
        // SAFETY: the mapping is only read through atomic cursor loads and
        // volatile slot copies, and every decoded value is treated as untrusted.
        let map = unsafe { Mmap::map(&file) }.map_err(setup_err)?;

        let mut feed = Self::from_mmap(map, config.capacity, SystemClock)?;
        feed.idle_sleep = config.idle_sleep;
        info!(
            path = %config.path.display(),
            capacity = config.capacity,
            cursor = feed.cursor,
            "ring buffer mapped"
        );
        Ok(feed)
    }
}

impl<K: Clock> RingFeed<K> {
    pub fn from_mmap(map: Mmap, capacity: usize, clock: K) -> FeedResult<Self> {
        let invalid = |reason: &str| FeedError::TransportSetup {
            target: "ring buffer".to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
        };

        if capacity == 0 {
            return Err(invalid("capacity must be non-zero"));
        }
        let need = ring_region_size(capacity)
            .ok_or_else(|| invalid("capacity overflows the region size"))?;
        // Mappings start on a page boundary; the cursor atomics rely on it
        if map.as_ptr() as usize % std::mem::align_of::<AtomicI64>() != 0 {
            return Err(invalid("region is not 8-byte aligned"));
        }
        if map.len() < need {
            return Err(FeedError::RegionTooSmall {
                need,
                have: map.len(),
            });
        }

        let mut feed = RingFeed {
            map,
            capacity,
            cursor: 0,
            to_index: 0,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            clock,
            registry: SubscriptionRegistry::new(),
            stats: FeedStats::new(),
        };

        let from_index = feed.load_cursor(FROM_INDEX_OFFSET);
        feed.cursor = cursor_from(from_index, capacity).unwrap_or_else(|| {
            warn!(from_index, "from_index out of range, starting at 0");
            0
        });
        feed.to_index = feed.cursor;
        Ok(feed)
    }

    /// Current producer header. Each field is loaded on its own, so the
    /// three values may come from different producer updates.
    pub fn header(&self) -> RingHeader {
        RingHeader {
            sequence: self.load_cursor(SEQUENCE_OFFSET),
            from_index: self.load_cursor(FROM_INDEX_OFFSET),
            to_index: self.load_cursor(TO_INDEX_OFFSET),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_sleep(&self) -> Duration {
        self.idle_sleep
    }

    pub fn set_idle_sleep(&mut self, idle_sleep: Duration) {
        self.idle_sleep = idle_sleep;
    }

    /// True when every slot published at the last header read has been consumed
    pub fn is_caught_up(&self) -> bool {
        self.cursor == self.to_index
    }

    /// Instrument id -> symbol table. The ring carries no handshake, so the
    /// caller seeds it; unresolved ids are reported by number.
    pub fn registry_mut(&mut self) -> &mut SubscriptionRegistry {
        &mut self.registry
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Consume at most one slot. None when caught up or when the slot was dropped.
    pub fn poll(&mut self) -> Option<FeedEvent> {
        if self.is_caught_up() {
            // Acquire: slots written before this to_index are visible below
            let to_index = self.load_cursor(TO_INDEX_OFFSET);
            match cursor_from(to_index, self.capacity) {
                Some(to) => self.to_index = to,
                None => {
                    debug!(to_index, "to_index out of range, ignoring header");
                    return None;
                }
            }
            if self.is_caught_up() {
                return None;
            }
        }

        let slot_cursor = self.cursor;
        let slot: [u8; SLOT_SIZE] = self.read_region(RING_HEADER_SIZE + slot_cursor * SLOT_SIZE);
        self.cursor = advance(self.cursor, self.capacity);

        let tick = match Decoder::decode_slot(&slot) {
            Ok(tick) => tick,
            Err(e) => {
                warn!(cursor = slot_cursor, error = %e, "skipping malformed slot");
                self.stats.record_drop(DropReason::Malformed);
                return None;
            }
        };

        let symbol = match self.registry.resolve(tick.index) {
            Some(symbol) => symbol.to_string(),
            None => tick.index.to_string(),
        };
        let latency_ns = self.clock.now_ns().saturating_sub(tick.local_time_ns);

        match TickEvent::from_tick(symbol, tick, latency_ns) {
            Some(event) => {
                self.stats.record_event(SLOT_SIZE, latency_ns);
                Some(FeedEvent::Tick(event))
            }
            None => {
                debug!(cursor = slot_cursor, kind = tick.kind, "ignoring unknown slot kind");
                self.stats.record_drop(DropReason::UnknownKind);
                None
            }
        }
    }

    /// Tail the ring until `shutdown` is set
    pub fn run<F>(&mut self, shutdown: &ShutdownToken, mut on_event: F)
    where
        F: FnMut(FeedEvent),
    {
        let idle_sleep = self.idle_sleep;
        info!(cursor = self.cursor, "tailing ring buffer");
        while !shutdown.is_shutdown() {
            match self.poll() {
                Some(event) => on_event(event),
                None if self.is_caught_up() => {
                    if idle_sleep.is_zero() {
                        std::hint::spin_loop();
                    } else {
                        std::thread::sleep(idle_sleep);
                    }
                }
                None => {}
            }
        }
        self.stats.log_summary();
    }

    fn load_cursor(&self, offset: usize) -> i64 {
        debug_assert!(offset % 8 == 0 && offset + 8 <= RING_HEADER_SIZE);
        // SAFETY: from_mmap checked the base is 8-aligned and the region holds
        // the header, so `offset` names an aligned in-bounds i64. The producer
        // stores it atomically; the file layout is little-endian.
        let cell = unsafe { &*(self.map.as_ptr().add(offset) as *const AtomicI64) };
        i64::from_le(cell.load(Ordering::Acquire))
    }

    fn read_region<const N: usize>(&self, offset: usize) -> [u8; N] {
        let region = &self.map[offset..offset + N];
        // SAFETY: `region` is N in-bounds bytes and [u8; N] has alignment 1.
        // The producer may be writing these bytes; a volatile copy keeps the
        // read from being elided or split, and the copy is decoded defensively.
        unsafe { std::ptr::read_volatile(region.as_ptr() as *const [u8; N]) }
    }
}
