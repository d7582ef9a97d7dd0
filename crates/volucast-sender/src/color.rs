use anyhow::Result;

use crate::capture::ColorImage;

/// Seam for the color video codec.
///
/// Any block-based lossy codec with keyframe support fits here; the
/// pipeline treats the payload as opaque bytes.
pub trait ColorEncoder: Send {
    fn encode(&mut self, image: &ColorImage, keyframe: bool) -> Result<Vec<u8>>;
}

/// Ships frames uncompressed. Every frame is self-contained, so the
/// keyframe flag is irrelevant. Useful on loopback links and in tests.
pub struct RawColorEncoder;

impl ColorEncoder for RawColorEncoder {
    fn encode(&mut self, image: &ColorImage, _keyframe: bool) -> Result<Vec<u8>> {
        Ok(image.data.to_vec())
    }
}
