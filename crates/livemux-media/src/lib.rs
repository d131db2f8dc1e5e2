//! livemux-media: live fragmented MP4 packaging.
//!
//! This crate turns a live stream of timestamped media samples into a
//! fragmented ISO BMFF byte stream: one initialization segment followed by
//! an unbounded run of movie fragments.
//!
//! # Modules
//!
//! - [`codec`] - Parameter-set parsing and decoder configuration records
//! - [`fmp4`] - Box serialization: init segment tree, fragments, inspection
//! - [`negotiate`] - Per-codec track description negotiation
//! - [`accumulator`] - Per-track fragment accumulation and flushing
//! - [`session`] - Session controller, events, and sequence numbering
//! - [`sink`] - Output sink abstraction

pub mod accumulator;
pub mod codec;
pub mod fmp4;
pub mod negotiate;
pub mod session;
pub mod sink;

// Re-export commonly used items at the crate root.
pub use accumulator::{TrackContext, FRAGMENT_WINDOW};
pub use fmp4::{Fragment, InitSegment};
pub use negotiate::{negotiate_audio, negotiate_video, NegotiatedTrack};
pub use session::{
    Dispatch, LifecycleEvent, SequenceCounter, Session, SessionEvent, SessionFactory,
};
pub use sink::SegmentSink;
