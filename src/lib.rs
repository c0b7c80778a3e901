/// Relay Feed - Market Data Relay Client
///
/// Client side of a multiplexing market-data relay. Features include:
/// - Symbol subscription handshake over datagrams (symbol <-> relay index)
/// - Fixed-offset binary decoding of top-of-book, trade and depth messages
/// - Datagram feed client with control/data demultiplexing by source port
/// - Lock-free tailing of the relay's shared-memory ring buffer
/// - Latency and drop statistics

pub mod protocol;
pub mod decoder;
pub mod control;
pub mod registry;
pub mod event;
pub mod datagram;
pub mod ring;
pub mod clock;
pub mod shutdown;
pub mod stats;
pub mod error;

pub use protocol::{DepthSnapshot, Level, MessageHeader, RingHeader, Side, Tick, TickKind};
pub use decoder::{DecodeError, DecodeResult, Decoder, Message};
pub use control::{Confirmation, ControlError};
pub use registry::{ConfirmOutcome, Subscription, SubscriptionRegistry, MAX_SUBSCRIPTIONS};
pub use event::{DepthEvent, FeedEvent, TickEvent};
pub use datagram::{DatagramChannel, DatagramConfig, DatagramFeed, UnsubscribeOutcome};
pub use ring::{RingConfig, RingFeed};
pub use clock::{Clock, SystemClock};
pub use shutdown::ShutdownToken;
pub use stats::{DropReason, FeedStats, LatencyStats};
pub use error::{FeedError, FeedResult};
