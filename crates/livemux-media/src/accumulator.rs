//! Per-track fragment accumulation.
//!
//! A [`TrackContext`] normalizes absolute source timestamps against the
//! track's epoch and groups samples into fragments spanning at most
//! [`FRAGMENT_WINDOW`] timescale units.

use livemux_common::{Frame, MediaKind, Result};

use crate::fmp4::Fragment;
use crate::session::SequenceCounter;
use crate::sink::SegmentSink;

/// Maximum span between the first sample of a fragment and a sample that
/// may still join it.
pub const FRAGMENT_WINDOW: u32 = 1000;

#[derive(Debug)]
pub struct TrackContext {
    track_id: u32,
    kind: MediaKind,
    payload_prefix: usize,
    /// Absolute timestamp of the first accepted frame. Set once.
    epoch: Option<u32>,
    open: Option<Fragment>,
    fragment_start_rel: u32,
}

impl TrackContext {
    pub fn new(track_id: u32, kind: MediaKind, payload_prefix: usize) -> Self {
        Self {
            track_id,
            kind,
            payload_prefix,
            epoch: None,
            open: None,
            fragment_start_rel: 0,
        }
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    pub fn open_fragment(&self) -> Option<&Fragment> {
        self.open.as_ref()
    }

    /// Accept one frame.
    ///
    /// Video frames whose payload is no longer than the framing prefix are
    /// dropped before the epoch is considered. Audio frames are always kept,
    /// so an empty audio payload still yields a zero-size sample. Relative time arithmetic wraps, so
    /// non-monotonic input never panics.
    pub fn push(
        &mut self,
        sequence: &mut SequenceCounter,
        sink: &mut dyn SegmentSink,
        frame: &Frame,
        sync: bool,
    ) -> Result<()> {
        let len = frame.payload.len();
        if self.kind == MediaKind::Video && len <= self.payload_prefix {
            tracing::trace!(
                track_id = self.track_id,
                len,
                "Dropping frame without sample data"
            );
            return Ok(());
        }
        let data = frame.payload.slice(self.payload_prefix.min(len)..);

        let epoch = *self.epoch.get_or_insert(frame.abs_time);
        let rel = frame.abs_time.wrapping_sub(epoch);

        if let Some(fragment) = &self.open {
            if rel.wrapping_sub(self.fragment_start_rel) > FRAGMENT_WINDOW {
                let bytes = fragment.encode()?;
                tracing::trace!(
                    track_id = self.track_id,
                    sequence_number = fragment.sequence_number(),
                    samples = fragment.sample_count(),
                    bytes = bytes.len(),
                    "Flushing fragment"
                );
                self.open = None;
                sink.write(bytes)?;
            }
        }

        if self.open.is_none() {
            self.fragment_start_rel = rel;
            self.open = Some(Fragment::new(sequence.next(), self.track_id));
        }
        if let Some(fragment) = &mut self.open {
            fragment.add_full_sample(rel, frame.duration, data, sync);
        }
        Ok(())
    }

    /// Drop the open fragment, returning how many samples it held.
    pub fn discard(&mut self) -> usize {
        self.open.take().map_or(0, |f| f.sample_count())
    }
}
