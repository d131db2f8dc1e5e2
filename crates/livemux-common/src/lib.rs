//! Livemux-Common: shared types, IDs, and errors.
//!
//! This crate provides functionality used across livemux:
//!
//! - **Error Handling**: the unified [`Error`] type and [`Result`] alias
//! - **Typed IDs**: UUID wrappers for viewer sessions
//! - **Media Types**: codec identities, track descriptions, and frames as
//!   delivered by a live source
//!
//! # Examples
//!
//! ```
//! use livemux_common::{Error, MediaKind, Result, VideoCodec, VideoTrackInfo};
//!
//! let track = VideoTrackInfo::new(VideoCodec::H264, vec![]);
//! assert_eq!(track.kind(), MediaKind::Video);
//!
//! // Two parameter sets (SPS, PPS) are required before negotiation.
//! let err: Result<()> = track.validate();
//! assert!(matches!(err, Err(Error::InvalidParameters { .. })));
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
