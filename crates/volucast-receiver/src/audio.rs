use anyhow::Result;
use tracing::debug;

use volucast_audio::Decoder;
use volucast_protocol::sender::AudioSenderPacket;
use volucast_protocol::types::FrameId;

/// Gaps larger than this are not concealed; playback just jumps.
const MAX_CONCEALED_FRAMES: u32 = 5;

/// Turns the fire-and-forget audio packet stream back into a continuous
/// PCM stream, concealing small gaps with the codec's loss concealment.
pub struct AudioReceiver {
    decoder: Decoder,
    next_frame_id: Option<FrameId>,
}

impl AudioReceiver {
    pub fn new() -> Result<Self> {
        Ok(Self {
            decoder: Decoder::new()?,
            next_frame_id: None,
        })
    }

    /// Decode one audio packet. Returns the PCM frames this packet
    /// yields: zero for late duplicates, one when in order, more when
    /// concealment fills a gap first.
    pub fn handle(&mut self, packet: &AudioSenderPacket) -> Result<Vec<Vec<f32>>> {
        let mut frames = Vec::new();

        if let Some(next) = self.next_frame_id {
            if packet.frame_id < next {
                debug!(frame_id = packet.frame_id, "late audio packet dropped");
                return Ok(frames);
            }
            let gap = packet.frame_id - next;
            if gap > 0 && gap <= MAX_CONCEALED_FRAMES {
                for _ in 0..gap {
                    frames.push(self.decoder.decode_lost()?);
                }
            }
        }

        frames.push(self.decoder.decode(&packet.opus_bytes)?);
        self.next_frame_id = Some(packet.frame_id + 1);
        Ok(frames)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.decoder = Decoder::new()?;
        self.next_frame_id = None;
        Ok(())
    }
}
