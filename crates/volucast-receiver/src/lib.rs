//! Receiver pipeline: collects video/parity/audio packets, recovers
//! losses by XOR parity and retransmission requests, delivers frames in
//! order with keyframe catch-up, and feeds reports back to the sender.

use std::time::Duration;

pub mod audio;
pub mod classifier;
pub mod collection;
pub mod color;
pub mod config;
pub mod decode;
pub mod recover;

/// An incomplete frame older than this is given up on.
pub const ABANDON_TIMEOUT: Duration = Duration::from_secs(1);

/// Minimum wait before (re-)requesting missing fragments of a frame.
pub const REQUEST_HOLDOFF: Duration = Duration::from_millis(30);

/// Cadence of receiver heartbeats.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);

/// Connect retry cadence while no sender traffic has arrived yet.
pub const CONNECT_RETRY: Duration = Duration::from_millis(500);
