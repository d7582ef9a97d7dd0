use anyhow::Result;
use audiopus::coder::Encoder as OpusEncoder;
use audiopus::{Application, Channels, SampleRate, Signal};

use crate::{BITRATE, MAX_AUDIO_PACKET_CONTENT_SIZE, SAMPLES_PER_FRAME};

/// Opus encoder configured for the microphone stream.
pub struct Encoder {
    inner: OpusEncoder,
}

impl Encoder {
    pub fn new() -> Result<Self> {
        let mut encoder =
            OpusEncoder::new(SampleRate::Hz48000, Channels::Mono, Application::Voip)?;

        encoder.set_bitrate(audiopus::Bitrate::BitsPerSecond(BITRATE))?;
        encoder.set_inband_fec(true)?;
        encoder.set_packet_loss_perc(15)?;
        encoder.set_signal(Signal::Voice)?;

        Ok(Self { inner: encoder })
    }

    /// Encode one frame of PCM f32 samples into Opus.
    ///
    /// `pcm` must contain exactly [`SAMPLES_PER_FRAME`] samples. The
    /// result always fits in one audio packet.
    pub fn encode(&mut self, pcm: &[f32]) -> Result<Vec<u8>> {
        assert_eq!(
            pcm.len(),
            SAMPLES_PER_FRAME,
            "PCM frame must be exactly {} samples",
            SAMPLES_PER_FRAME
        );

        let mut output = vec![0u8; MAX_AUDIO_PACKET_CONTENT_SIZE];
        let len = self.inner.encode_float(pcm, &mut output)?;
        output.truncate(len);
        Ok(output)
    }
}
