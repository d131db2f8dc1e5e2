//! Live source glue.
//!
//! Publishers announce a stream's tracks once and push frames into a
//! bounded broadcast channel; each viewer session holds a [`Subscription`]
//! that turns the channel into [`livemux_media::SessionEvent`]s.

mod registry;
mod subscription;
pub mod testsrc;

pub use registry::{Publisher, StreamRegistry};
pub use subscription::Subscription;

use livemux_common::Frame;

/// One frame as carried on a stream's broadcast channel.
#[derive(Debug, Clone)]
pub enum MediaPacket {
    Video(Frame),
    Audio(Frame),
}

/// Split `name?args` into its parts.
pub fn split_stream_path(stream_path: &str) -> (&str, &str) {
    stream_path.split_once('?').unwrap_or((stream_path, ""))
}
