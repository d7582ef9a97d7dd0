use thiserror::Error;

#[derive(Debug, Error)]
pub enum DepthCodecError {
    /// Lossless coding cannot guarantee shrinkage; the caller should
    /// promote the next frame to a keyframe and retry.
    #[error("compressed depth ({output} bytes) exceeds the input ({input} bytes)")]
    CompressionGrewInput { output: usize, input: usize },

    #[error("depth image has {got} pixels, codec state expects {expected}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("encoded depth stream ended mid-value")]
    TruncatedStream,

    #[error("encoded depth stream decodes to more than {expected} pixels")]
    CorruptStream { expected: usize },
}
