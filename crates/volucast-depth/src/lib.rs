//! Depth-side signal processing: the temporal run-length/variable-length
//! codec for 16-bit depth imagery and the geometric shadow filter that
//! runs before it.

pub mod error;
pub mod shadow;
pub mod trvl;
mod vle;

pub use error::DepthCodecError;
pub use shadow::{Calibration, Intrinsics, ShadowRemover};
pub use trvl::{TrvlDecoder, TrvlEncoder};
