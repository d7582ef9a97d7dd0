//! Transport plumbing shared by the sender and receiver pipelines: the
//! UDP socket wrapper, the session clock and id generation, and the
//! bounded inter-task frame queue.

pub mod clock;
pub mod queue;
pub mod socket;

pub use clock::SessionClock;
pub use queue::FrameQueue;
pub use socket::{Datagram, NetError, UdpTransport};

/// Random 32-bit identifier for sessions and receivers.
pub fn random_id() -> u32 {
    rand::random()
}
