//! Audio codec wrappers and the capture-side PCM ring buffer.
//!
//! The microphone itself is an external collaborator: whatever captures
//! audio pushes float PCM into the ring buffer, and the audio packet
//! sender drains it one Opus frame at a time.

pub mod decoder;
pub mod encoder;
pub mod ring;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use ring::{pcm_ring, PcmConsumer, PcmProducer};

/// Sample rate of the audio stream.
pub const SAMPLE_RATE: u32 = 48_000;

/// Samples per encoded audio frame (20 ms at 48 kHz, mono).
pub const SAMPLES_PER_FRAME: usize = 960;

/// Target encoder bitrate in bits per second.
pub const BITRATE: i32 = 48_000;

/// Largest Opus payload an audio packet can carry.
pub const MAX_AUDIO_PACKET_CONTENT_SIZE: usize =
    volucast_protocol::types::MAX_PACKET_SIZE - volucast_protocol::sender::AUDIO_PACKET_HEADER_SIZE;
