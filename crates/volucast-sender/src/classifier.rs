use std::net::SocketAddr;

use tracing::warn;

use volucast_net::Datagram;
use volucast_protocol::receiver::{
    receiver_packet_receiver_id, receiver_packet_type, ConnectReceiverPacket,
    ReceiverPacketType, ReportReceiverPacket, RequestReceiverPacket,
};
use volucast_protocol::types::ReceiverId;

/// A connect attempt together with where it came from.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub endpoint: SocketAddr,
    pub packet: ConnectReceiverPacket,
}

/// One drain's worth of receiver packets, sorted by kind.
#[derive(Debug, Default)]
pub struct FeedbackCollection {
    pub connects: Vec<ConnectInfo>,
    pub heartbeats: Vec<ReceiverId>,
    pub reports: Vec<ReportReceiverPacket>,
    pub requests: Vec<RequestReceiverPacket>,
    /// Datagrams dropped for bad headers or truncated bodies.
    pub malformed: usize,
}

impl FeedbackCollection {
    pub fn is_empty(&self) -> bool {
        self.connects.is_empty()
            && self.heartbeats.is_empty()
            && self.reports.is_empty()
            && self.requests.is_empty()
            && self.malformed == 0
    }
}

/// Sort one batch of datagrams into a [`FeedbackCollection`].
///
/// Malformed packets are counted and dropped; they never tear anything
/// down.
pub fn classify_receiver_packets(datagrams: &[Datagram]) -> FeedbackCollection {
    let mut feedback = FeedbackCollection::default();

    for datagram in datagrams {
        let packet_type = match receiver_packet_type(&datagram.bytes) {
            Ok(t) => t,
            Err(e) => {
                warn!(addr = %datagram.addr, "dropping receiver packet: {e}");
                feedback.malformed += 1;
                continue;
            }
        };

        let parsed = match packet_type {
            ReceiverPacketType::Connect => {
                ConnectReceiverPacket::from_bytes(&datagram.bytes).map(|packet| {
                    feedback.connects.push(ConnectInfo {
                        endpoint: datagram.addr,
                        packet,
                    })
                })
            }
            ReceiverPacketType::Heartbeat => receiver_packet_receiver_id(&datagram.bytes)
                .map(|id| feedback.heartbeats.push(id)),
            ReceiverPacketType::Report => ReportReceiverPacket::from_bytes(&datagram.bytes)
                .map(|packet| feedback.reports.push(packet)),
            ReceiverPacketType::Request => RequestReceiverPacket::from_bytes(&datagram.bytes)
                .map(|packet| feedback.requests.push(packet)),
        };

        if let Err(e) = parsed {
            warn!(addr = %datagram.addr, "dropping receiver packet: {e}");
            feedback.malformed += 1;
        }
    }

    feedback
}
