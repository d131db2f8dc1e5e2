//! Fragmented MP4 (fMP4) serialization.
//!
//! A live session emits one initialization segment (ftyp + moov with track
//! configuration) followed by an unbounded run of movie fragments
//! (moof + mdat).

pub(crate) mod boxes;
mod fragment;
mod init;
pub mod inspect;

pub use fragment::{Fragment, Sample, NON_SYNC_SAMPLE_FLAGS, SYNC_SAMPLE_FLAGS};
pub use init::{Ftyp, InitSegment, Moov, SampleEntry, Trak, Trex, TIMESCALE};
pub use inspect::{find_box, summarize_fragment, top_level_boxes, BoxHeader, FragmentSummary};
