use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, warn};

use volucast_protocol::types::{FrameId, ReceiverId, SessionId};

use crate::classifier::FeedbackCollection;
use crate::encode::VideoFrameSet;
use crate::remote::RemoteReceiver;
use crate::storage::VideoPacketStorage;

/// Running totals reported by receivers, logged periodically.
#[derive(Debug, Default, Clone, Copy)]
pub struct SenderSummary {
    pub received_report_count: u64,
    pub decoder_time_ms_sum: f32,
    pub frame_interval_ms_sum: f32,
    pub round_trip_ms_sum: f32,
}

/// Owns the per-receiver state and the retransmission store; everything
/// other tasks know about receivers flows in through
/// [`FeedbackCollection`]s.
pub struct VideoPacketSender {
    session_id: SessionId,
    receivers: HashMap<ReceiverId, RemoteReceiver>,
    storage: VideoPacketStorage,
    send_times: HashMap<FrameId, Instant>,
    summary: SenderSummary,
    keyframe_needed: bool,
}

impl VideoPacketSender {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            receivers: HashMap::new(),
            storage: VideoPacketStorage::new(),
            send_times: HashMap::new(),
            summary: SenderSummary::default(),
            keyframe_needed: false,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn receiver_count(&self) -> usize {
        self.receivers.len()
    }

    pub fn storage_len(&self) -> usize {
        self.storage.len()
    }

    pub fn summary(&self) -> SenderSummary {
        self.summary
    }

    /// True once after any event that warrants a fresh keyframe (a new
    /// receiver, typically).
    pub fn take_keyframe_needed(&mut self) -> bool {
        std::mem::take(&mut self.keyframe_needed)
    }

    /// Endpoints of live receivers that asked for video.
    pub fn video_endpoints(&self) -> Vec<SocketAddr> {
        self.receivers
            .values()
            .filter(|r| r.video_requested)
            .map(|r| r.endpoint)
            .collect()
    }

    /// Endpoints of live receivers that asked for audio.
    pub fn audio_endpoints(&self) -> Vec<SocketAddr> {
        self.receivers
            .values()
            .filter(|r| r.audio_requested)
            .map(|r| r.endpoint)
            .collect()
    }

    /// Endpoints of every live receiver, for heartbeats.
    pub fn all_endpoints(&self) -> Vec<SocketAddr> {
        self.receivers.values().map(|r| r.endpoint).collect()
    }

    /// Apply one batch of classified receiver packets. Returns the
    /// retransmissions to put on the wire: `(endpoint, packet bytes)`.
    pub fn apply_feedback(
        &mut self,
        feedback: FeedbackCollection,
        now: Instant,
    ) -> Vec<(SocketAddr, Bytes)> {
        for connect in feedback.connects {
            let receiver_id = connect.packet.receiver_id;
            // A repeated connect overwrites: a restarted receiver reusing
            // its id starts over from no acks.
            let receiver = RemoteReceiver::new(
                connect.endpoint,
                receiver_id,
                connect.packet.wants_video,
                connect.packet.wants_audio,
                now,
            );
            if self.receivers.insert(receiver_id, receiver).is_none() {
                info!(
                    receiver_id,
                    endpoint = %connect.endpoint,
                    video = connect.packet.wants_video,
                    audio = connect.packet.wants_audio,
                    "receiver connected"
                );
            } else {
                info!(receiver_id, endpoint = %connect.endpoint, "receiver reconnected");
            }
            self.keyframe_needed = true;
        }

        for receiver_id in feedback.heartbeats {
            if let Some(receiver) = self.receivers.get_mut(&receiver_id) {
                receiver.last_packet_time = now;
            }
        }

        for report in feedback.reports {
            let Some(receiver) = self.receivers.get_mut(&report.receiver_id) else {
                continue;
            };
            receiver.last_packet_time = now;

            // Reports arriving out of order carry nothing new.
            if (report.frame_id as i64) <= receiver.last_ack_frame_id {
                continue;
            }
            receiver.last_ack_frame_id = report.frame_id as i64;

            self.summary.received_report_count += 1;
            self.summary.decoder_time_ms_sum += report.decoder_time_ms;
            self.summary.frame_interval_ms_sum += report.frame_time_ms;
            if let Some(&sent) = self.send_times.get(&report.frame_id) {
                self.summary.round_trip_ms_sum +=
                    now.duration_since(sent).as_secs_f32() * 1000.0;
            }
        }

        let mut resends = Vec::new();
        for request in feedback.requests {
            let Some(receiver) = self.receivers.get_mut(&request.receiver_id) else {
                continue;
            };
            receiver.last_packet_time = now;
            let endpoint = receiver.endpoint;

            let Some(entry) = self.storage.get(request.frame_id) else {
                // Evicted already; the receiver will fall back to a keyframe.
                debug!(frame_id = request.frame_id, "requested frame no longer stored");
                continue;
            };
            for index in request.packet_indices {
                if let Some(packet) = entry.video_packets.get(index as usize) {
                    resends.push((endpoint, packet.to_bytes()));
                }
            }
        }
        resends
    }

    /// Retain a transmitted frame for retransmission and RTT tracking.
    pub fn record_sent(&mut self, frame_set: VideoFrameSet, now: Instant) {
        self.send_times.insert(frame_set.frame_id, now);
        self.storage.add(
            frame_set.frame_id,
            frame_set.video_packets,
            frame_set.parity_packets,
            now,
        );
    }

    /// Tear down receivers that have been silent past the timeout.
    pub fn prune_receivers(&mut self, timeout: Duration, now: Instant) {
        self.receivers.retain(|&receiver_id, receiver| {
            let live = now.duration_since(receiver.last_packet_time) <= timeout;
            if !live {
                warn!(receiver_id, endpoint = %receiver.endpoint, "receiver lost");
            }
            live
        });
    }

    /// Evict acknowledged and stale frames from the store.
    pub fn cleanup_storage(&mut self, retention: Duration, now: Instant) {
        let min_ack = self
            .receivers
            .values()
            .filter(|r| r.video_requested)
            .map(|r| r.last_ack_frame_id)
            .min()
            .unwrap_or(i64::MAX);
        self.storage.cleanup(min_ack, retention, now);
        self.send_times
            .retain(|&frame_id, &mut sent| {
                (frame_id as i64) > min_ack && now.duration_since(sent) <= retention
            });
    }
}
