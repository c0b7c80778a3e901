/// Synthetic ring buffer producer
///
/// Creates a region in the layout the relay publishes and keeps writing random
/// top-of-book, depth and trade slots into it, advancing `to_index` after each
/// one. Point `tickstream shm --path` at the same file to tail it.

use memmap2::MmapMut;
use rand::Rng;
use relay_feed::protocol::{
    encode_slot, ring_region_size, RingHeader, Tick, RING_CAPACITY, RING_HEADER_SIZE, SLOT_SIZE,
};
use std::env;
use std::fs::OpenOptions;
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const INSTRUMENTS: i32 = 4;

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

// Release pairs with the consumer's Acquire load, so the slot written above
// is visible before the new to_index is
fn publish_to_index(map: &mut MmapMut, to_index: i64) {
    // SAFETY: the mapping is page-aligned and offset 16 lies in the header
    let cell = unsafe { &*(map.as_mut_ptr().add(16) as *const AtomicI64) };
    cell.store(to_index.to_le(), Ordering::Release);
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = env::args().collect();

    let path = if args.len() > 1 {
        args[1].clone()
    } else {
        "/tmp/msg_queue".to_string()
    };

    let message_count: usize = if args.len() > 2 {
        args[2].parse().unwrap_or(10000)
    } else {
        10000
    };

    let interval = Duration::from_micros(if args.len() > 3 {
        args[3].parse().unwrap_or(100)
    } else {
        100
    });

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;
    let region_size = ring_region_size(RING_CAPACITY).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "ring capacity too large")
    })?;
    file.set_len(region_size as u64)?;
    // SAFETY: this process is the only writer of the file it just created.
    let mut map = unsafe { MmapMut::map_mut(&file)? };

    let mut rng = rand::thread_rng();
    let mut mid = [65000.0f64, 3500.0, 150.0, 0.6];
    let mut cursor = 0usize;

    println!("Writing {} slots to {}", message_count, path);
    let empty = RingHeader {
        sequence: 0,
        from_index: 0,
        to_index: 0,
    };
    map[..RING_HEADER_SIZE].copy_from_slice(&empty.encode());

    for sequence in 0..message_count as i64 {
        let index = rng.gen_range(0..INSTRUMENTS);
        let price = &mut mid[index as usize];
        *price *= 1.0 + rng.gen_range(-0.0005..0.0005);

        let magnitude = rng.gen_range(1..=3);
        let kind = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
        let now_ms = now_ns() / 1_000_000;

        let tick = Tick {
            kind,
            index,
            tx_time_ms: now_ms,
            event_time_ms: now_ms,
            local_time_ns: now_ns(),
            sequence,
            price: (*price * 100.0).round() / 100.0,
            size: (rng.gen_range(0.001..5.0f64) * 1000.0).round() / 1000.0,
        };

        let offset = RING_HEADER_SIZE + cursor * SLOT_SIZE;
        map[offset..offset + SLOT_SIZE].copy_from_slice(&encode_slot(&tick));
        cursor = (cursor + 1) % RING_CAPACITY;

        map[..8].copy_from_slice(&sequence.to_le_bytes());
        publish_to_index(&mut map, cursor as i64);

        if sequence % 1000 == 0 && sequence > 0 {
            println!("Wrote {} slots", sequence);
        }
        thread::sleep(interval);
    }

    map.flush()?;
    println!("Producer complete: {} slots, to_index {}", message_count, cursor);

    Ok(())
}
