use serde::Deserialize;

fn default_sender() -> String {
    "127.0.0.1:9750".into()
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_width() -> usize {
    640
}

fn default_height() -> usize {
    576
}

fn default_true() -> bool {
    true
}

fn default_socket_buffer() -> usize {
    2 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiverConfig {
    /// Sender address, `host:port`.
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Local bind address (IP); port 0 picks an ephemeral port.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub port: u16,

    /// Depth resolution; must match the sender's stream.
    #[serde(default = "default_width")]
    pub width: usize,

    #[serde(default = "default_height")]
    pub height: usize,

    #[serde(default = "default_true")]
    pub video: bool,

    #[serde(default = "default_true")]
    pub audio: bool,

    /// Kernel socket buffer size in bytes.
    #[serde(default = "default_socket_buffer")]
    pub socket_buffer_size: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            host: default_host(),
            port: 0,
            width: default_width(),
            height: default_height(),
            video: true,
            audio: true,
            socket_buffer_size: default_socket_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: ReceiverConfig = toml::from_str("").unwrap();
        assert_eq!(config.sender, "127.0.0.1:9750");
        assert_eq!(config.port, 0);
        assert!(config.video && config.audio);
    }

    #[test]
    fn partial_toml_overrides() {
        let config: ReceiverConfig =
            toml::from_str("sender = \"10.0.0.2:9000\"\naudio = false").unwrap();
        assert_eq!(config.sender, "10.0.0.2:9000");
        assert!(!config.audio);
        assert!(config.video);
    }
}
