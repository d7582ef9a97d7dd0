use std::net::SocketAddr;

use anyhow::Result;

use volucast_audio::ring::{read_frame, PcmConsumer};
use volucast_audio::{Encoder, SAMPLES_PER_FRAME};
use volucast_net::UdpTransport;
use volucast_protocol::sender::AudioSenderPacket;
use volucast_protocol::types::{FrameId, SessionId};

/// Drains the microphone ring buffer one Opus frame at a time and sends
/// each encoded frame immediately. Fire-and-forget: no parity, no
/// retransmission.
pub struct AudioPacketSender {
    session_id: SessionId,
    frame_id: FrameId,
    encoder: Encoder,
    pcm: PcmConsumer,
}

impl AudioPacketSender {
    pub fn new(session_id: SessionId, pcm: PcmConsumer) -> Result<Self> {
        Ok(Self {
            session_id,
            frame_id: 0,
            encoder: Encoder::new()?,
            pcm,
        })
    }

    /// Encode and transmit every complete PCM frame currently buffered.
    pub async fn pump(
        &mut self,
        transport: &UdpTransport,
        endpoints: &[SocketAddr],
    ) -> Result<()> {
        let mut frame = [0.0f32; SAMPLES_PER_FRAME];
        while read_frame(&mut self.pcm, &mut frame) {
            if endpoints.is_empty() {
                // Keep draining so the ring never backs up with stale audio.
                continue;
            }

            let opus_bytes = self.encoder.encode(&frame)?;
            let packet = AudioSenderPacket {
                session_id: self.session_id,
                frame_id: self.frame_id,
                opus_bytes: opus_bytes.into(),
            };
            self.frame_id = self.frame_id.wrapping_add(1);

            let bytes = packet.to_bytes();
            for endpoint in endpoints {
                transport.send_to(&bytes, *endpoint).await;
            }
        }
        Ok(())
    }
}
