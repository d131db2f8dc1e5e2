//! Codec configuration helpers: parameter-set parsing and decoder
//! configuration records for the sample descriptions.

pub mod aac;
pub mod bits;
pub mod h264;
pub mod hevc;

pub use aac::{audio_specific_config, AacProfile};
