//! Media types shared between the source side and the fragmenting engine.
//!
//! A live source announces its tracks once (codec identity plus the codec
//! parameters a decoder needs) and then delivers [`Frame`]s with absolute
//! decode timestamps in milliseconds.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Elementary stream kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Video codec identity as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
    /// AV1.
    Av1,
    /// Any codec the fragmenter has no sample description for.
    Other(String),
}

impl VideoCodec {
    /// Number of leading parameter-set entries the sample description needs.
    pub fn required_parameter_sets(&self) -> usize {
        match self {
            Self::H264 => 2,
            Self::H265 => 3,
            Self::Av1 | Self::Other(_) => 0,
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::H265 => write!(f, "h265"),
            Self::Av1 => write!(f, "av1"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Audio codec identity as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG-4 AAC (profile chosen by the audio object type).
    Aac,
    /// G.711 A-law.
    Pcma,
    /// G.711 µ-law.
    Pcmu,
    /// Any codec the fragmenter has no sample description for.
    Other(String),
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aac => write!(f, "aac"),
            Self::Pcma => write!(f, "pcma"),
            Self::Pcmu => write!(f, "pcmu"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A discovered video track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTrackInfo {
    pub codec: VideoCodec,
    /// Raw parameter-set NAL units without start codes, in positional order
    /// (SPS, PPS for H.264; VPS, SPS, PPS for H.265).
    pub parameter_sets: Vec<Bytes>,
}

impl VideoTrackInfo {
    pub fn new(codec: VideoCodec, parameter_sets: Vec<Bytes>) -> Self {
        Self {
            codec,
            parameter_sets,
        }
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    /// Check that enough parameter sets are present for the codec.
    ///
    /// Sources must call this before announcing a track; the sample
    /// description builder treats a short list as a fatal defect.
    pub fn validate(&self) -> Result<()> {
        let need = self.codec.required_parameter_sets();
        let have = self.parameter_sets.len();
        if have < need {
            return Err(Error::invalid_parameters(&self.codec, need, have));
        }
        Ok(())
    }
}

/// A discovered audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrackInfo {
    pub codec: AudioCodec,
    /// AAC profile selector: 1 = HE-AACv1, 2 = AAC-LC, 3 = HE-AACv2.
    pub audio_object_type: u8,
    pub sample_rate: u32,
    pub channels: u16,
    /// Bits per sample.
    pub sample_size: u16,
}

impl AudioTrackInfo {
    pub fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    /// A G.711 track (8-bit samples).
    pub fn g711(codec: AudioCodec, sample_rate: u32, channels: u16) -> Self {
        Self {
            codec,
            audio_object_type: 0,
            sample_rate,
            channels,
            sample_size: 8,
        }
    }

    /// An AAC track with the given object-type selector.
    pub fn aac(audio_object_type: u8, sample_rate: u32, channels: u16) -> Self {
        Self {
            codec: AudioCodec::Aac,
            audio_object_type,
            sample_rate,
            channels,
            sample_size: 16,
        }
    }
}

/// Either kind of track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackInfo {
    Video(VideoTrackInfo),
    Audio(AudioTrackInfo),
}

impl TrackInfo {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Video(_) => MediaKind::Video,
            Self::Audio(_) => MediaKind::Audio,
        }
    }
}

/// One decoded-timestamp sample delivered by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Absolute decode timestamp in milliseconds on the source clock.
    pub abs_time: u32,
    /// Sample duration in milliseconds.
    pub duration: u32,
    /// Sample payload, still carrying any source framing prefix.
    pub payload: Bytes,
    /// Keyframe flag (ignored for audio, which is always sync).
    pub keyframe: bool,
}

impl Frame {
    pub fn new(abs_time: u32, duration: u32, payload: impl Into<Bytes>, keyframe: bool) -> Self {
        Self {
            abs_time,
            duration,
            payload: payload.into(),
            keyframe,
        }
    }
}
