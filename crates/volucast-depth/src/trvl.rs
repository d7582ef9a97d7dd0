//! Temporal run-length/variable-length depth codec.
//!
//! Two stages: a keyframe/delta predictor over `i16` depth pixels with a
//! per-pixel stability gate, and a run codec over the residual stream.
//! Residuals are zig-zag folded; runs alternate as zero-count,
//! nonzero-count, then the nonzero values, all in nibble VLE.
//!
//! The predictor adds the *encoded* residual to its previous-frame buffer,
//! so the encoder's internal state always equals the decoder's
//! reconstruction. The stability gate quantizes small flicker away on
//! delta frames; that loss is bounded by [`CHANGE_THRESHOLD`] and only
//! applies to pixels that have been still for [`INVALIDATION_THRESHOLD`]
//! consecutive frames.

use crate::error::DepthCodecError;
use crate::vle::{NibbleReader, NibbleWriter};

/// Absolute residual at or below this is considered flicker.
pub const CHANGE_THRESHOLD: i32 = 10;

/// Consecutive still frames before a pixel's flicker is suppressed.
pub const INVALIDATION_THRESHOLD: u8 = 2;

fn zigzag(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn unzigzag(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

pub struct TrvlEncoder {
    prev: Vec<i16>,
    stability: Vec<u8>,
}

impl TrvlEncoder {
    pub fn new(num_pixels: usize) -> Self {
        Self {
            prev: vec![0; num_pixels],
            stability: vec![0; num_pixels],
        }
    }

    /// Encode one depth image.
    ///
    /// On a keyframe the codec state resets first, so the residuals are
    /// the raw pixel values and the output decodes without prior state.
    /// Fails with [`DepthCodecError::CompressionGrewInput`] when the
    /// output would exceed the input's byte count; the caller promotes
    /// the next frame to a keyframe.
    pub fn encode(&mut self, pixels: &[i16], keyframe: bool) -> Result<Vec<u8>, DepthCodecError> {
        if pixels.len() != self.prev.len() {
            return Err(DepthCodecError::SizeMismatch {
                expected: self.prev.len(),
                got: pixels.len(),
            });
        }

        if keyframe {
            self.prev.fill(0);
            self.stability.fill(0);
        }

        let mut residuals = vec![0i32; pixels.len()];
        for (p, &curr) in pixels.iter().enumerate() {
            let delta = curr as i32 - self.prev[p] as i32;
            let still = delta.abs() <= CHANGE_THRESHOLD;

            let encoded = if still && self.stability[p] >= INVALIDATION_THRESHOLD {
                0
            } else {
                delta
            };

            self.stability[p] = if still {
                (self.stability[p] + 1).min(INVALIDATION_THRESHOLD)
            } else {
                0
            };
            self.prev[p] = (self.prev[p] as i32 + encoded) as i16;
            residuals[p] = encoded;
        }

        let mut writer = NibbleWriter::new();
        let input_bytes = pixels.len() * 2;
        let mut i = 0;
        while i < residuals.len() {
            let zero_start = i;
            while i < residuals.len() && residuals[i] == 0 {
                i += 1;
            }
            writer.put((i - zero_start) as u32);

            let nonzero_start = i;
            while i < residuals.len() && residuals[i] != 0 {
                i += 1;
            }
            writer.put((i - nonzero_start) as u32);

            for &r in &residuals[nonzero_start..i] {
                writer.put(zigzag(r));
            }

            if writer.byte_len() > input_bytes {
                return Err(DepthCodecError::CompressionGrewInput {
                    output: writer.byte_len(),
                    input: input_bytes,
                });
            }
        }

        Ok(writer.finish())
    }
}

pub struct TrvlDecoder {
    prev: Vec<i16>,
}

impl TrvlDecoder {
    pub fn new(num_pixels: usize) -> Self {
        Self {
            prev: vec![0; num_pixels],
        }
    }

    /// Decode one depth image, mirroring the encoder's state updates.
    pub fn decode(&mut self, data: &[u8], keyframe: bool) -> Result<Vec<i16>, DepthCodecError> {
        if keyframe {
            self.prev.fill(0);
        }

        let num_pixels = self.prev.len();
        let mut reader = NibbleReader::new(data);
        let mut idx = 0;
        while idx < num_pixels {
            let zeros = reader.get()? as usize;
            if zeros > num_pixels - idx {
                return Err(DepthCodecError::CorruptStream {
                    expected: num_pixels,
                });
            }
            idx += zeros;

            let nonzeros = reader.get()? as usize;
            if nonzeros > num_pixels - idx {
                return Err(DepthCodecError::CorruptStream {
                    expected: num_pixels,
                });
            }
            for _ in 0..nonzeros {
                let delta = unzigzag(reader.get()?);
                self.prev[idx] = (self.prev[idx] as i32 + delta) as i16;
                idx += 1;
            }
        }

        Ok(self.prev.clone())
    }
}
