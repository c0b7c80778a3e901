/// Session-level errors
///
/// Only setup failures are fatal. Everything on the data path is logged and
/// dropped by the feed loops; these variants surface where a caller asked
/// for something directly (subscribe, unsubscribe, a transport read).

use crate::control::ControlError;
use crate::decoder::DecodeError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("transport setup failed for {target}: {source}")]
    TransportSetup {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("transport i/o failed: {0}")]
    TransportIo(#[from] io::Error),

    #[error("malformed control message: {0}")]
    MalformedControl(#[from] ControlError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("no subscription for index {0}")]
    UnresolvedIndex(i32),

    #[error("unsubscribe failed for {failed:?}")]
    UnsubscribeFailed { failed: Vec<String> },

    #[error("shared region too small: need {need} bytes, have {have}")]
    RegionTooSmall { need: usize, have: usize },
}

impl FeedError {
    /// Only setup failures should end the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::TransportSetup { .. } | FeedError::RegionTooSmall { .. })
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
