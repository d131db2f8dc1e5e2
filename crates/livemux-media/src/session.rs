//! Session controller: one per viewer connection.
//!
//! A [`Session`] owns the pending initialization segment, one
//! [`TrackContext`] per media kind, and the session-wide fragment
//! [`SequenceCounter`]. Source events are fed in arrival order through
//! [`Session::handle`]; serialized bytes go to the caller's [`SegmentSink`].
//!
//! ```
//! use bytes::Bytes;
//! use livemux_common::{AudioCodec, AudioTrackInfo, Frame};
//! use livemux_media::{Dispatch, SessionEvent, SessionFactory};
//!
//! let mut session = SessionFactory::default().create("live/test");
//! let mut out: Vec<Bytes> = Vec::new();
//!
//! let track = AudioTrackInfo::g711(AudioCodec::Pcmu, 8000, 1);
//! session.handle(SessionEvent::AudioTrack(track), &mut out).unwrap();
//! session.handle(SessionEvent::Attached, &mut out).unwrap();
//! assert_eq!(out.len(), 1); // ftyp + moov
//!
//! let frame = Frame::new(0, 20, vec![0xFF; 160], true);
//! let dispatch = session.handle(SessionEvent::AudioFrame(frame), &mut out).unwrap();
//! assert_eq!(dispatch, Dispatch::Handled);
//! ```

use livemux_common::{AudioTrackInfo, Frame, MediaKind, Result, SessionId, VideoTrackInfo};

use crate::accumulator::TrackContext;
use crate::fmp4::InitSegment;
use crate::negotiate::{self, NegotiatedTrack};
use crate::sink::SegmentSink;

/// Session-wide fragment sequence numbers: 1, 2, 3, ...
#[derive(Debug, Clone)]
pub struct SequenceCounter {
    next: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Return the current value and advance.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u32 {
        let value = self.next;
        self.next = self.next.wrapping_add(1);
        value
    }

    /// The value the next call to [`SequenceCounter::next`] will return.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Source-side lifecycle notifications the session does not act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The publisher went away.
    PublisherClosed,
    /// The subscriber fell behind and this many events were skipped.
    Lagged(u64),
}

/// Everything a source can tell a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The subscription is complete; emit the initialization segment.
    Attached,
    VideoTrack(VideoTrackInfo),
    AudioTrack(AudioTrackInfo),
    VideoFrame(Frame),
    AudioFrame(Frame),
    Lifecycle(LifecycleEvent),
}

/// Outcome of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// Not consumed; returned unchanged to the caller.
    PassThrough(LifecycleEvent),
}

/// Creates sessions and carries the output routing for them.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    extension: &'static str,
    content_type: &'static str,
}

impl Default for SessionFactory {
    fn default() -> Self {
        Self {
            extension: ".mp4",
            content_type: "video/mp4",
        }
    }
}

impl SessionFactory {
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Map a request path and raw query to a stream path: leading `/` and
    /// trailing extension removed, `?query` appended when non-empty.
    pub fn stream_path(&self, path: &str, query: Option<&str>) -> String {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix(self.extension).unwrap_or(trimmed);
        match query {
            Some(q) if !q.is_empty() => format!("{trimmed}?{q}"),
            _ => trimmed.to_string(),
        }
    }

    pub fn create(&self, stream: impl Into<String>) -> Session {
        Session::new(SessionId::new(), stream.into())
    }
}

/// One viewer's fragmenting state.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    stream: String,
    init: InitSegment,
    attached: bool,
    sequence: SequenceCounter,
    video: Option<TrackContext>,
    audio: Option<TrackContext>,
}

impl Session {
    pub fn new(id: SessionId, stream: String) -> Self {
        Self {
            id,
            stream,
            init: InitSegment::new(),
            attached: false,
            sequence: SequenceCounter::new(),
            video: None,
            audio: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn init_segment(&self) -> &InitSegment {
        &self.init
    }

    pub fn track(&self, kind: MediaKind) -> Option<&TrackContext> {
        match kind {
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
        }
    }

    /// Route one event. Errors are fatal to the session.
    pub fn handle(&mut self, event: SessionEvent, sink: &mut dyn SegmentSink) -> Result<Dispatch> {
        match event {
            SessionEvent::Attached => self.attach(sink)?,
            SessionEvent::VideoTrack(info) => {
                if self.accepts_track(MediaKind::Video) {
                    let id = self.init.moov.allocate_track_id();
                    let negotiated = negotiate::negotiate_video(id, &info)?;
                    self.install(MediaKind::Video, negotiated);
                }
            }
            SessionEvent::AudioTrack(info) => {
                if self.accepts_track(MediaKind::Audio) {
                    let id = self.init.moov.allocate_track_id();
                    let negotiated = negotiate::negotiate_audio(id, &info)?;
                    self.install(MediaKind::Audio, negotiated);
                }
            }
            SessionEvent::VideoFrame(frame) => {
                let sync = frame.keyframe;
                self.push(MediaKind::Video, &frame, sync, sink)?;
            }
            SessionEvent::AudioFrame(frame) => {
                self.push(MediaKind::Audio, &frame, true, sink)?;
            }
            SessionEvent::Lifecycle(event) => return Ok(Dispatch::PassThrough(event)),
        }
        Ok(Dispatch::Handled)
    }

    fn attach(&mut self, sink: &mut dyn SegmentSink) -> Result<()> {
        if self.attached {
            tracing::warn!(session_id = %self.id, "Session already attached, ignoring");
            return Ok(());
        }
        let bytes = self.init.encode();
        tracing::debug!(
            session_id = %self.id,
            stream = %self.stream,
            tracks = self.init.moov.traks.len(),
            bytes = bytes.len(),
            "Writing initialization segment"
        );
        sink.write(bytes)?;
        self.attached = true;
        Ok(())
    }

    fn accepts_track(&self, kind: MediaKind) -> bool {
        if self.attached {
            tracing::warn!(session_id = %self.id, %kind, "Track announced after attach, ignoring");
            return false;
        }
        if self.track(kind).is_some() {
            tracing::warn!(session_id = %self.id, %kind, "Second track of the same kind, ignoring");
            return false;
        }
        true
    }

    fn install(&mut self, kind: MediaKind, negotiated: NegotiatedTrack) {
        let NegotiatedTrack {
            trak,
            trex,
            payload_prefix,
            ftyp,
        } = negotiated;
        let context = TrackContext::new(trak.track_id, kind, payload_prefix);

        if ftyp.is_some() {
            self.init.ftyp = ftyp;
        }
        self.init.moov.traks.push(trak);
        self.init.moov.trexs.push(trex);

        match kind {
            MediaKind::Video => self.video = Some(context),
            MediaKind::Audio => self.audio = Some(context),
        }
    }

    fn push(
        &mut self,
        kind: MediaKind,
        frame: &Frame,
        sync: bool,
        sink: &mut dyn SegmentSink,
    ) -> Result<()> {
        if !self.attached {
            tracing::trace!(session_id = %self.id, %kind, "Frame before attach, dropping");
            return Ok(());
        }
        let track = match kind {
            MediaKind::Video => self.video.as_mut(),
            MediaKind::Audio => self.audio.as_mut(),
        };
        match track {
            Some(track) => track.push(&mut self.sequence, sink, frame, sync),
            None => Ok(()),
        }
    }

    /// End the session. Open fragments are discarded, not flushed; returns
    /// the number of samples lost.
    pub fn close(mut self) -> usize {
        let mut discarded = 0;
        for track in [self.video.as_mut(), self.audio.as_mut()].into_iter().flatten() {
            let lost = track.discard();
            if lost > 0 {
                tracing::debug!(
                    session_id = %self.id,
                    track_id = track.track_id(),
                    samples = lost,
                    "Discarding open fragment"
                );
            }
            discarded += lost;
        }
        discarded
    }
}
