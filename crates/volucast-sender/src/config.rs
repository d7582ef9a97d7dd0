use std::path::PathBuf;

use serde::Deserialize;

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    9750
}

fn default_width() -> usize {
    640
}

fn default_height() -> usize {
    576
}

fn default_fps() -> u32 {
    30
}

fn default_keyframe_interval() -> u32 {
    30
}

fn default_socket_buffer() -> usize {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct SenderConfig {
    /// Bind address (IP).
    #[serde(default = "default_host")]
    pub host: String,

    /// UDP port receivers connect to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Frame width when generating synthetic frames.
    #[serde(default = "default_width")]
    pub width: usize,

    /// Frame height when generating synthetic frames.
    #[serde(default = "default_height")]
    pub height: usize,

    /// Capture rate in frames per second.
    #[serde(default = "default_fps")]
    pub frames_per_second: u32,

    /// A keyframe at least every this many frames.
    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u32,

    /// Recorded clip to stream instead of the synthetic scene.
    #[serde(default)]
    pub playback: Option<PathBuf>,

    /// Replay the clip from the start when it ends.
    #[serde(default)]
    pub loop_playback: bool,

    /// Kernel socket buffer size in bytes.
    #[serde(default = "default_socket_buffer")]
    pub socket_buffer_size: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            width: default_width(),
            height: default_height(),
            frames_per_second: default_fps(),
            keyframe_interval: default_keyframe_interval(),
            playback: None,
            loop_playback: false,
            socket_buffer_size: default_socket_buffer(),
        }
    }
}
