//! Wire protocol for volucast RGB-D streams.
//!
//! Everything that crosses the UDP socket is defined here: the per-frame
//! message container, the sender and receiver packet layouts, frame
//! fragmentation, and the XOR parity scheme used for single-loss recovery.
//! All multi-byte fields are little-endian.

pub mod error;
pub mod fec;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod types;
