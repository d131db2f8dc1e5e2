//! Built-in G.711 tone publishers.

use livemux_common::{AudioCodec, AudioTrackInfo, Frame, Result, TrackInfo};
use std::f64::consts::PI;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::StreamRegistry;
use crate::config::{TestSourceConfig, ToneCodec};

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32635;
const ALAW_SEGMENT_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];
const TONE_AMPLITUDE: f64 = 0.5 * i16::MAX as f64;

/// Encode a 16-bit linear sample as G.711 µ-law.
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut value = sample as i32;
    let sign = if value < 0 {
        value = -value;
        0x80
    } else {
        0x00
    };
    value = value.min(ULAW_CLIP) + ULAW_BIAS;

    let exponent = 31 - ((value >> 7) as u32).leading_zeros();
    let mantissa = (value >> (exponent + 3)) & 0x0F;
    !(sign | ((exponent as i32) << 4) | mantissa) as u8
}

/// Encode a 16-bit linear sample as G.711 A-law.
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut value = (sample as i32) >> 3;
    let mask = if value >= 0 {
        0xD5
    } else {
        value = -value - 1;
        0x55
    };

    let Some(segment) = ALAW_SEGMENT_END.iter().position(|&end| value <= end) else {
        return 0x7F ^ mask;
    };
    let mantissa = if segment < 2 {
        (value >> 1) & 0x0F
    } else {
        (value >> segment) & 0x0F
    };
    (((segment as i32) << 4) | mantissa) as u8 ^ mask
}

/// Sine tone generator producing encoded G.711 frames.
pub struct ToneGenerator {
    codec: ToneCodec,
    phase_step: f64,
    samples_per_frame: usize,
    frame_ms: u32,
    sample_index: u64,
    elapsed_ms: u32,
}

impl ToneGenerator {
    pub fn new(config: &TestSourceConfig) -> Self {
        Self {
            codec: config.codec,
            phase_step: 2.0 * PI * config.frequency_hz / config.sample_rate as f64,
            samples_per_frame: (config.sample_rate as u64 * config.frame_ms as u64 / 1000) as usize,
            frame_ms: config.frame_ms,
            sample_index: 0,
            elapsed_ms: 0,
        }
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Produce the next frame, timestamped in milliseconds since the start.
    pub fn next_frame(&mut self) -> Frame {
        let encode = match self.codec {
            ToneCodec::Pcmu => linear_to_ulaw,
            ToneCodec::Pcma => linear_to_alaw,
        };
        let payload: Vec<u8> = (0..self.samples_per_frame)
            .map(|i| {
                let phase = self.phase_step * (self.sample_index + i as u64) as f64;
                encode((TONE_AMPLITUDE * phase.sin()) as i16)
            })
            .collect();
        self.sample_index += self.samples_per_frame as u64;

        let frame = Frame::new(self.elapsed_ms, self.frame_ms, payload, true);
        self.elapsed_ms = self.elapsed_ms.wrapping_add(self.frame_ms);
        frame
    }
}

pub fn track_info(config: &TestSourceConfig) -> AudioTrackInfo {
    let codec = match config.codec {
        ToneCodec::Pcmu => AudioCodec::Pcmu,
        ToneCodec::Pcma => AudioCodec::Pcma,
    };
    AudioTrackInfo::g711(codec, config.sample_rate, 1)
}

/// Publish every configured tone and pace its frames in real time until
/// `shutdown` fires.
pub fn spawn_test_sources(
    registry: &StreamRegistry,
    sources: &[TestSourceConfig],
    shutdown: CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(sources.len());

    for source in sources {
        let publisher = registry.publish(&source.name, vec![TrackInfo::Audio(track_info(source))])?;
        let mut generator = ToneGenerator::new(source);
        let shutdown = shutdown.clone();
        let frame_interval = Duration::from_millis(source.frame_ms as u64);

        tracing::info!(
            stream = %source.name,
            codec = ?source.codec,
            frequency_hz = source.frequency_hz,
            "Starting test tone"
        );

        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        publisher.send_audio(generator.next_frame());
                    }
                }
            }
            tracing::debug!(stream = %publisher.name(), "Test tone stopped");
        }));
    }

    Ok(handles)
}
