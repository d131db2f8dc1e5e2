//! Output side of a session.

use bytes::Bytes;
use livemux_common::Result;

/// Append-only destination for serialized segments.
///
/// Writes happen in emission order; an implementation that can no longer
/// deliver returns [`livemux_common::Error::SinkClosed`].
pub trait SegmentSink {
    fn write(&mut self, segment: Bytes) -> Result<()>;
}

/// Collects segments in memory. The HTTP driver drains it after every event.
impl SegmentSink for Vec<Bytes> {
    fn write(&mut self, segment: Bytes) -> Result<()> {
        self.push(segment);
        Ok(())
    }
}
