use anyhow::Result;
use bytes::Bytes;

/// Seam for the color video codec's decode side; the payload format is
/// whatever the sender's encoder produced.
pub trait ColorDecoder: Send {
    fn decode(&mut self, data: &[u8]) -> Result<Bytes>;
}

/// Counterpart of the raw passthrough encoder: the payload already is
/// the image.
pub struct RawColorDecoder;

impl ColorDecoder for RawColorDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }
}
