/// Fixed-offset message decoder
///
/// Every decode checks the buffer length for the field group it reads before
/// touching it, so truncated payloads fail with `TooShort` instead of panicking.
/// Decoding is pure: no I/O, no allocation except the depth level vector.

use crate::protocol::*;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },

    #[error("invalid level counts: asks {ask_count}, bids {bid_count}")]
    InvalidCount { ask_count: i32, bid_count: i32 },

    #[error("unknown message kind: {0}")]
    UnknownKind(i32),

    #[error("field {field} is not numeric text")]
    InvalidText { field: &'static str },

    #[error("field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// A fully decoded datagram
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    TopOfBook(Tick),
    Trade(Tick),
    Depth(DepthSnapshot, Vec<Level>),
}

impl Message {
    pub fn index(&self) -> i32 {
        match self {
            Message::TopOfBook(t) | Message::Trade(t) => t.index,
            Message::Depth(d, _) => d.index,
        }
    }

    pub fn local_time_ns(&self) -> i64 {
        match self {
            Message::TopOfBook(t) | Message::Trade(t) => t.local_time_ns,
            Message::Depth(d, _) => d.local_time_ns,
        }
    }
}

#[inline]
fn ensure_len(buffer: &[u8], need: usize) -> DecodeResult<()> {
    if buffer.len() < need {
        return Err(DecodeError::TooShort {
            need,
            have: buffer.len(),
        });
    }
    Ok(())
}

pub struct Decoder;

impl Decoder {
    /// Read the shared kind/index prefix
    pub fn decode_header(buffer: &[u8]) -> DecodeResult<MessageHeader> {
        ensure_len(buffer, HEADER_PREFIX_SIZE)?;
        Ok(MessageHeader {
            kind: LittleEndian::read_i32(&buffer[0..4]),
            index: LittleEndian::read_i32(&buffer[4..8]),
        })
    }

    /// Unpack the 56-byte tick layout. The kind is not validated here.
    pub fn decode_tick(buffer: &[u8]) -> DecodeResult<Tick> {
        ensure_len(buffer, TICK_SIZE)?;
        Ok(Tick {
            kind: LittleEndian::read_i32(&buffer[0..4]),
            index: LittleEndian::read_i32(&buffer[4..8]),
            tx_time_ms: LittleEndian::read_i64(&buffer[8..16]),
            event_time_ms: LittleEndian::read_i64(&buffer[16..24]),
            local_time_ns: LittleEndian::read_i64(&buffer[24..32]),
            sequence: LittleEndian::read_i64(&buffer[32..40]),
            price: LittleEndian::read_f64(&buffer[40..48]),
            size: LittleEndian::read_f64(&buffer[48..56]),
        })
    }

    /// Unpack a depth snapshot header and its level array.
    ///
    /// Levels are returned in wire order: the first `ask_count` are asks,
    /// the remaining `bid_count` are bids.
    pub fn decode_depth(buffer: &[u8]) -> DecodeResult<(DepthSnapshot, Vec<Level>)> {
        ensure_len(buffer, DEPTH_HEADER_SIZE)?;

        let snapshot = DepthSnapshot {
            kind: LittleEndian::read_i32(&buffer[0..4]),
            index: LittleEndian::read_i32(&buffer[4..8]),
            tx_time_ms: LittleEndian::read_i64(&buffer[8..16]),
            event_time_ms: LittleEndian::read_i64(&buffer[16..24]),
            local_time_ns: LittleEndian::read_i64(&buffer[24..32]),
            sequence: LittleEndian::read_i64(&buffer[32..40]),
            ask_offset: LittleEndian::read_i32(&buffer[40..44]),
            ask_count: LittleEndian::read_i32(&buffer[44..48]),
            bid_offset: LittleEndian::read_i32(&buffer[48..52]),
            bid_count: LittleEndian::read_i32(&buffer[52..56]),
        };

        let (total, need) = match (snapshot.level_count(), snapshot.wire_len()) {
            (Some(total), Some(need)) => (total, need),
            _ => {
                return Err(DecodeError::InvalidCount {
                    ask_count: snapshot.ask_count,
                    bid_count: snapshot.bid_count,
                })
            }
        };
        ensure_len(buffer, need)?;

        let levels = buffer[DEPTH_HEADER_SIZE..need]
            .chunks_exact(LEVEL_SIZE)
            .map(|chunk| Level {
                price: LittleEndian::read_f64(&chunk[0..8]),
                size: LittleEndian::read_f64(&chunk[8..16]),
            })
            .collect::<Vec<_>>();
        debug_assert_eq!(levels.len(), total);

        Ok((snapshot, levels))
    }

    /// Header-first dispatch into the tagged message variants
    pub fn decode(buffer: &[u8]) -> DecodeResult<Message> {
        let header = Self::decode_header(buffer)?;
        match header.kind {
            KIND_DEPTH => {
                let (snapshot, levels) = Self::decode_depth(buffer)?;
                Ok(Message::Depth(snapshot, levels))
            }
            1 | -1 => Ok(Message::TopOfBook(Self::decode_tick(buffer)?)),
            3 | -3 => Ok(Message::Trade(Self::decode_tick(buffer)?)),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }

    /// Read the ring region header
    pub fn decode_ring_header(buffer: &[u8]) -> DecodeResult<RingHeader> {
        ensure_len(buffer, RING_HEADER_SIZE)?;
        Ok(RingHeader {
            sequence: LittleEndian::read_i64(&buffer[0..8]),
            from_index: LittleEndian::read_i64(&buffer[8..16]),
            to_index: LittleEndian::read_i64(&buffer[16..24]),
        })
    }

    /// Decode one ring slot into a tick.
    ///
    /// The slot may have been overwritten mid-read by the producer; only
    /// structural problems are detected (short buffer, non-numeric text,
    /// integer fields that do not fit).
    pub fn decode_slot(buffer: &[u8]) -> DecodeResult<Tick> {
        ensure_len(buffer, SLOT_SIZE)?;

        let instrument_id = LittleEndian::read_i64(&buffer[0..8]);
        let kind = LittleEndian::read_i64(&buffer[8..16]);

        Ok(Tick {
            index: narrow("instrument_id", instrument_id)?,
            kind: narrow("kind", kind)?,
            tx_time_ms: LittleEndian::read_i64(&buffer[16..24]),
            event_time_ms: LittleEndian::read_i64(&buffer[24..32]),
            local_time_ns: LittleEndian::read_i64(&buffer[32..40]),
            sequence: LittleEndian::read_i64(&buffer[40..48]),
            price: parse_float_text("price", &buffer[48..64])?,
            size: parse_float_text("size", &buffer[64..80])?,
        })
    }
}

fn narrow(field: &'static str, value: i64) -> DecodeResult<i32> {
    i32::try_from(value).map_err(|_| DecodeError::OutOfRange { field, value })
}

/// Parse a NUL-padded fixed-width decimal field
fn parse_float_text(field: &'static str, raw: &[u8]) -> DecodeResult<f64> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end])
        .ok()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or(DecodeError::InvalidText { field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tick(kind: i32) -> Tick {
        Tick {
            kind,
            index: 7,
            tx_time_ms: 1_700_000_000_000,
            event_time_ms: 1_700_000_000_001,
            local_time_ns: 1_700_000_000_002_000_000,
            sequence: 42,
            price: 65000.5,
            size: 0.01,
        }
    }

    #[test]
    fn test_decode_header() {
        let bytes = sample_tick(-3).encode();
        let header = Decoder::decode_header(&bytes).unwrap();
        assert_eq!(header, MessageHeader { kind: -3, index: 7 });
    }

    #[test]
    fn test_header_too_short() {
        let result = Decoder::decode_header(&[0u8; 7]);
        assert_eq!(result, Err(DecodeError::TooShort { need: 8, have: 7 }));
    }

    #[test]
    fn test_decode_tick_fields() {
        let tick = sample_tick(1);
        let decoded = Decoder::decode_tick(&tick.encode()).unwrap();
        assert_eq!(decoded, tick);
        assert_eq!(decoded.side(), Some(Side::Bid));
    }

    #[test]
    fn test_tick_too_short() {
        let bytes = sample_tick(1).encode();
        let result = Decoder::decode_tick(&bytes[..55]);
        assert!(matches!(result, Err(DecodeError::TooShort { need: 56, have: 55 })));
    }

    #[test]
    fn test_decode_dispatch_unknown_kind() {
        let bytes = sample_tick(9).encode();
        assert_eq!(Decoder::decode(&bytes), Err(DecodeError::UnknownKind(9)));
    }

    #[test]
    fn test_negative_depth_is_unknown() {
        // Only kind == 2 is a depth snapshot on the datagram wire
        let bytes = sample_tick(-2).encode();
        assert_eq!(Decoder::decode(&bytes), Err(DecodeError::UnknownKind(-2)));
    }

    #[test]
    fn test_depth_negative_count() {
        let mut bytes = vec![0u8; DEPTH_HEADER_SIZE];
        LittleEndian::write_i32(&mut bytes[0..4], 2);
        LittleEndian::write_i32(&mut bytes[44..48], -1);
        let result = Decoder::decode_depth(&bytes);
        assert!(matches!(result, Err(DecodeError::InvalidCount { ask_count: -1, .. })));
    }

    #[test]
    fn test_depth_huge_count_does_not_overflow() {
        let mut bytes = vec![0u8; DEPTH_HEADER_SIZE];
        LittleEndian::write_i32(&mut bytes[0..4], 2);
        LittleEndian::write_i32(&mut bytes[44..48], i32::MAX);
        LittleEndian::write_i32(&mut bytes[52..56], i32::MAX);
        let result = Decoder::decode_depth(&bytes);
        assert!(matches!(result, Err(DecodeError::TooShort { have: 56, .. })));
    }

    #[test]
    fn test_decode_slot() {
        let tick = sample_tick(-1);
        let slot = encode_slot(&tick);
        let decoded = Decoder::decode_slot(&slot).unwrap();
        assert_eq!(decoded, tick);
    }

    #[test]
    fn test_slot_with_garbage_text() {
        let mut slot = encode_slot(&sample_tick(1));
        slot[48..64].copy_from_slice(b"65x00.5\0\0\0\0\0\0\0\0\0");
        assert_eq!(
            Decoder::decode_slot(&slot),
            Err(DecodeError::InvalidText { field: "price" })
        );
    }

    #[test]
    fn test_slot_empty_size_text() {
        let mut slot = encode_slot(&sample_tick(1));
        slot[64..80].fill(0);
        assert_eq!(
            Decoder::decode_slot(&slot),
            Err(DecodeError::InvalidText { field: "size" })
        );
    }

    #[test]
    fn test_slot_instrument_out_of_range() {
        let mut slot = encode_slot(&sample_tick(1));
        LittleEndian::write_i64(&mut slot[0..8], i64::MAX);
        assert!(matches!(
            Decoder::decode_slot(&slot),
            Err(DecodeError::OutOfRange { field: "instrument_id", .. })
        ));
    }

    #[test]
    fn test_float_text_with_padding_spaces() {
        assert_eq!(parse_float_text("price", b" 12.5 \0\0"), Ok(12.5));
    }
}
