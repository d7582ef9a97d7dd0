use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use volucast_protocol::frame::FrameMessage;
use volucast_protocol::receiver::MAX_REQUEST_INDICES;
use volucast_protocol::sender::{ParitySenderPacket, VideoSenderPacket};
use volucast_protocol::types::FrameId;

use crate::collection::FrameCollection;

/// What one recovery tick produced.
#[derive(Debug, Default)]
pub struct TickOutput {
    /// Frames ready for decoding, in strictly increasing frame id order.
    pub delivered: Vec<FrameMessage>,
    /// Retransmission requests: `(frame_id, missing indices)`, each list
    /// short enough for one request packet.
    pub requests: Vec<(FrameId, Vec<u16>)>,
    /// A frame was given up on; the sender should be asked (by
    /// reconnecting) to promote its next frame to a keyframe.
    pub keyframe_wanted: bool,
}

/// Collects fragments per frame, recovers losses, and releases frames in
/// order. Holds back out-of-order frames until the gap fills, gives up on
/// frames past the abandon window, and jumps forward over dead gaps when
/// a newer keyframe has fully assembled.
pub struct VideoMessageAssembler {
    collections: HashMap<FrameId, FrameCollection>,
    /// Assembled frames waiting for their turn, with assembly time.
    pending: BTreeMap<FrameId, (Instant, FrameMessage)>,
    next_frame_id: Option<FrameId>,
    delivered_any: bool,
    /// Frames given up on, remembered until delivery passes them.
    unrecoverable: BTreeSet<FrameId>,
    abandon_timeout: Duration,
    request_holdoff: Duration,
}

impl VideoMessageAssembler {
    pub fn new(abandon_timeout: Duration, request_holdoff: Duration) -> Self {
        Self {
            collections: HashMap::new(),
            pending: BTreeMap::new(),
            next_frame_id: None,
            delivered_any: false,
            unrecoverable: BTreeSet::new(),
            abandon_timeout,
            request_holdoff,
        }
    }

    /// Forget everything (session reset).
    pub fn reset(&mut self) {
        self.collections.clear();
        self.pending.clear();
        self.next_frame_id = None;
        self.delivered_any = false;
        self.unrecoverable.clear();
    }

    pub fn next_frame_id(&self) -> Option<FrameId> {
        self.next_frame_id
    }

    fn is_stale(&self, frame_id: FrameId) -> bool {
        match self.next_frame_id {
            Some(next) => frame_id < next,
            None => false,
        }
    }

    fn note_seen(&mut self, frame_id: FrameId) {
        // Delivery starts from the smallest frame id observed before the
        // first delivery locks the sequence in.
        if !self.delivered_any {
            self.next_frame_id = Some(match self.next_frame_id {
                Some(next) => next.min(frame_id),
                None => frame_id,
            });
        }
    }

    pub fn add_video(&mut self, packet: VideoSenderPacket, now: Instant) {
        let frame_id = packet.frame_id;
        if self.is_stale(frame_id) || self.unrecoverable.contains(&frame_id) {
            return;
        }
        self.note_seen(frame_id);
        self.collections
            .entry(frame_id)
            .or_insert_with(|| FrameCollection::new(frame_id, now))
            .add_video(packet);
    }

    pub fn add_parity(&mut self, packet: ParitySenderPacket, now: Instant) {
        let frame_id = packet.frame_id;
        if self.is_stale(frame_id) || self.unrecoverable.contains(&frame_id) {
            return;
        }
        self.note_seen(frame_id);
        self.collections
            .entry(frame_id)
            .or_insert_with(|| FrameCollection::new(frame_id, now))
            .add_parity(packet);
    }

    /// Run one recovery/delivery pass.
    pub fn tick(&mut self, now: Instant) -> TickOutput {
        let mut output = TickOutput::default();

        self.recover_and_assemble(now, &mut output);
        self.abandon_stale(now, &mut output);
        self.deliver_in_order(now, &mut output);
        self.schedule_requests(now, &mut output);

        // Bookkeeping for frames delivery has moved past.
        if let Some(next) = self.next_frame_id {
            self.unrecoverable.retain(|&id| id >= next);
            self.collections.retain(|&id, _| id >= next);
            self.pending.retain(|&id, _| id >= next);
        }

        output
    }

    fn recover_and_assemble(&mut self, now: Instant, output: &mut TickOutput) {
        let completed: Vec<FrameId> = self
            .collections
            .values_mut()
            .filter_map(|collection| {
                if !collection.is_complete() {
                    collection.try_recover();
                }
                collection.is_complete().then(|| collection.frame_id())
            })
            .collect();

        for frame_id in completed {
            let Some(collection) = self.collections.remove(&frame_id) else {
                continue;
            };
            let Some(bytes) = collection.assemble() else {
                continue;
            };
            match FrameMessage::from_bytes(frame_id, bytes) {
                Ok(message) => {
                    self.pending.insert(frame_id, (now, message));
                }
                Err(e) => {
                    // A complete set of fragments that does not parse is
                    // a protocol violation; treat the frame as lost.
                    warn!(frame_id, "assembled frame message unparsable: {e}");
                    self.unrecoverable.insert(frame_id);
                    output.keyframe_wanted = true;
                }
            }
        }
    }

    fn abandon_stale(&mut self, now: Instant, output: &mut TickOutput) {
        let abandoned: Vec<FrameId> = self
            .collections
            .values()
            .filter(|c| now.duration_since(c.creation) > self.abandon_timeout)
            .map(|c| c.frame_id())
            .collect();

        for frame_id in abandoned {
            warn!(frame_id, "frame unrecoverable, abandoning");
            self.collections.remove(&frame_id);
            self.unrecoverable.insert(frame_id);
            output.keyframe_wanted = true;
        }
    }

    fn deliver_in_order(&mut self, now: Instant, output: &mut TickOutput) {
        loop {
            let Some(next) = self.next_frame_id else {
                return;
            };

            if let Some((_, message)) = self.pending.remove(&next) {
                output.delivered.push(message);
                self.delivered_any = true;
                self.next_frame_id = Some(next + 1);
                continue;
            }

            // Keyframe catch-up: a fully assembled keyframe further ahead
            // may jump the line, but only once the gap is dead. A blocking
            // frame that was abandoned is dead immediately; one that was
            // never seen at all gets one holdoff for stragglers before it
            // counts as gone for good.
            let mut next_keyframe: Option<(FrameId, Instant)> = None;
            for (id, entry) in self.pending.range(next + 1..) {
                if entry.1.keyframe {
                    next_keyframe = Some((*id, entry.0));
                    break;
                }
            }
            let Some((keyframe_id, assembled_at)) = next_keyframe else {
                return;
            };

            let keyframe_settled =
                now.duration_since(assembled_at) >= self.request_holdoff;
            let gap_dead = (next..keyframe_id).any(|id| {
                self.unrecoverable.contains(&id)
                    || (keyframe_settled
                        && !self.collections.contains_key(&id)
                        && !self.pending.contains_key(&id))
            });
            if !gap_dead {
                return;
            }

            debug!(from = next, to = keyframe_id, "keyframe catch-up, dropping gap");
            for id in next..keyframe_id {
                self.collections.remove(&id);
                self.pending.remove(&id);
                self.unrecoverable.remove(&id);
            }
            self.next_frame_id = Some(keyframe_id);
        }
    }

    fn schedule_requests(&mut self, now: Instant, output: &mut TickOutput) {
        for collection in self.collections.values_mut() {
            if collection.packet_count().is_none() {
                continue;
            }
            if now.duration_since(collection.creation) < self.request_holdoff {
                continue;
            }
            if let Some(last) = collection.last_request {
                if now.duration_since(last) < self.request_holdoff {
                    continue;
                }
            }

            let missing = collection.missing_indices();
            if missing.is_empty() {
                continue;
            }
            collection.last_request = Some(now);
            for chunk in missing.chunks(MAX_REQUEST_INDICES) {
                output.requests.push((collection.frame_id(), chunk.to_vec()));
            }
        }
    }
}
