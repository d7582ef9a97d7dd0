//! Sender pipeline: captures RGB-D frames, encodes and packetizes them,
//! transmits video/parity/audio packets to connected receivers, and
//! serves their feedback (acks and retransmission requests).

use std::time::Duration;

pub mod audio;
pub mod capture;
pub mod classifier;
pub mod color;
pub mod config;
pub mod encode;
pub mod remote;
pub mod storage;
pub mod video;

/// A receiver that has been silent this long is torn down.
pub const RECEIVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Unacknowledged frames older than this leave the retransmission store.
pub const RETENTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Cadence of sender heartbeats.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);
