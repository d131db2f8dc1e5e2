use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub subscribe: SubscribeConfig,

    #[serde(default)]
    pub test_sources: Vec<TestSourceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// How a viewer session subscribes to a published stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscribeConfig {
    /// Receive the audio track
    #[serde(default = "default_true")]
    pub sub_audio: bool,

    /// Receive the video track
    #[serde(default = "default_true")]
    pub sub_video: bool,

    /// How long a request waits for its stream to be published
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    /// Frames buffered per stream before slow subscribers lag
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Segments buffered between a session and its HTTP body
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,

    /// Start delivery at the first video keyframe
    #[serde(default = "default_true")]
    pub wait_keyframe: bool,
}

fn default_true() -> bool {
    true
}
fn default_wait_timeout() -> u64 {
    10
}
fn default_channel_capacity() -> usize {
    256
}
fn default_output_buffer() -> usize {
    32
}

impl Default for SubscribeConfig {
    fn default() -> Self {
        Self {
            sub_audio: true,
            sub_video: true,
            wait_timeout_secs: default_wait_timeout(),
            channel_capacity: default_channel_capacity(),
            output_buffer: default_output_buffer(),
            wait_keyframe: true,
        }
    }
}

impl SubscribeConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneCodec {
    Pcmu,
    Pcma,
}

/// A built-in G.711 sine tone published under `name`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSourceConfig {
    pub name: String,

    #[serde(default = "default_tone_codec")]
    pub codec: ToneCodec,

    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_frame_ms")]
    pub frame_ms: u32,
}

fn default_tone_codec() -> ToneCodec {
    ToneCodec::Pcmu
}
fn default_frequency() -> f64 {
    440.0
}
fn default_sample_rate() -> u32 {
    8000
}
fn default_frame_ms() -> u32 {
    20
}
