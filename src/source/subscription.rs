use livemux_common::{MediaKind, TrackInfo};
use livemux_media::{LifecycleEvent, SessionEvent};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use super::registry::StreamEntry;
use super::MediaPacket;
use crate::config::SubscribeConfig;

/// A viewer's read side of a published stream.
pub struct Subscription {
    stream: String,
    args: String,
    tracks: Vec<TrackInfo>,
    receiver: broadcast::Receiver<MediaPacket>,
    closed: CancellationToken,
    sub_audio: bool,
    sub_video: bool,
    waiting_keyframe: bool,
    finished: bool,
}

impl Subscription {
    pub(super) fn new(
        stream: &str,
        args: &str,
        entry: &Arc<StreamEntry>,
        config: &SubscribeConfig,
    ) -> Self {
        let tracks: Vec<TrackInfo> = entry
            .tracks
            .iter()
            .filter(|track| match track.kind() {
                MediaKind::Audio => config.sub_audio,
                MediaKind::Video => config.sub_video,
            })
            .cloned()
            .collect();
        let has_video = tracks.iter().any(|t| t.kind() == MediaKind::Video);

        tracing::debug!(
            stream = %stream,
            tracks = tracks.len(),
            wait_keyframe = config.wait_keyframe && has_video,
            "Subscribed to stream"
        );

        Self {
            stream: stream.to_string(),
            args: args.to_string(),
            tracks,
            receiver: entry.sender.subscribe(),
            closed: entry.closed.clone(),
            sub_audio: config.sub_audio,
            sub_video: config.sub_video,
            waiting_keyframe: config.wait_keyframe && has_video,
            finished: false,
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Query arguments the viewer passed after `?`, if any.
    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    /// Track announcements followed by `Attached`.
    pub fn initial_events(&self) -> Vec<SessionEvent> {
        let mut events: Vec<SessionEvent> = self
            .tracks
            .iter()
            .map(|track| match track {
                TrackInfo::Video(video) => SessionEvent::VideoTrack(video.clone()),
                TrackInfo::Audio(audio) => SessionEvent::AudioTrack(audio.clone()),
            })
            .collect();
        events.push(SessionEvent::Attached);
        events
    }

    /// Wait for the next deliverable event.
    ///
    /// Once a lifecycle event has been returned the subscription is over and
    /// every further call yields `PublisherClosed`.
    pub async fn next_event(&mut self) -> SessionEvent {
        if self.finished {
            return SessionEvent::Lifecycle(LifecycleEvent::PublisherClosed);
        }

        loop {
            let received = tokio::select! {
                biased;
                received = self.receiver.recv() => received,
                _ = self.closed.cancelled() => Err(RecvError::Closed),
            };

            match received {
                Ok(packet) => {
                    if let Some(event) = self.admit(packet) {
                        return event;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(stream = %self.stream, skipped, "Subscriber lagged behind publisher");
                    self.finished = true;
                    return SessionEvent::Lifecycle(LifecycleEvent::Lagged(skipped));
                }
                Err(RecvError::Closed) => {
                    tracing::debug!(stream = %self.stream, "Publisher closed");
                    self.finished = true;
                    return SessionEvent::Lifecycle(LifecycleEvent::PublisherClosed);
                }
            }
        }
    }

    fn admit(&mut self, packet: MediaPacket) -> Option<SessionEvent> {
        match packet {
            MediaPacket::Video(frame) => {
                if !self.sub_video {
                    return None;
                }
                if self.waiting_keyframe {
                    if !frame.keyframe {
                        return None;
                    }
                    self.waiting_keyframe = false;
                }
                Some(SessionEvent::VideoFrame(frame))
            }
            MediaPacket::Audio(frame) => {
                if !self.sub_audio || self.waiting_keyframe {
                    return None;
                }
                Some(SessionEvent::AudioFrame(frame))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SubscribeConfig;
    use crate::source::StreamRegistry;
    use bytes::Bytes;
    use livemux_common::{AudioCodec, AudioTrackInfo, Frame, TrackInfo, VideoCodec, VideoTrackInfo};
    use livemux_media::{LifecycleEvent, SessionEvent};

    fn av_tracks() -> Vec<TrackInfo> {
        vec![
            TrackInfo::Video(VideoTrackInfo::new(VideoCodec::Av1, vec![])),
            TrackInfo::Audio(AudioTrackInfo::g711(AudioCodec::Pcma, 8000, 1)),
        ]
    }

    fn frame(abs_time: u32, keyframe: bool) -> Frame {
        Frame::new(abs_time, 20, Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7]), keyframe)
    }

    #[tokio::test]
    async fn initial_events_end_with_attached() {
        let registry = StreamRegistry::new(16);
        let _publisher = registry.publish("cam", av_tracks()).unwrap();
        let sub = registry.subscribe("cam", &SubscribeConfig::default()).await.unwrap();

        let events = sub.initial_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], SessionEvent::VideoTrack(_)));
        assert!(matches!(events[1], SessionEvent::AudioTrack(_)));
        assert_eq!(events[2], SessionEvent::Attached);
    }

    #[tokio::test]
    async fn filters_disabled_track_kinds() {
        let registry = StreamRegistry::new(16);
        let publisher = registry.publish("cam", av_tracks()).unwrap();
        let config = SubscribeConfig {
            sub_video: false,
            ..SubscribeConfig::default()
        };
        let mut sub = registry.subscribe("cam", &config).await.unwrap();
        assert_eq!(sub.tracks().len(), 1);

        publisher.send_video(frame(0, true));
        publisher.send_audio(frame(0, false));
        assert!(matches!(sub.next_event().await, SessionEvent::AudioFrame(_)));
    }

    #[tokio::test]
    async fn delivery_starts_at_first_keyframe() {
        let registry = StreamRegistry::new(16);
        let publisher = registry.publish("cam", av_tracks()).unwrap();
        let mut sub = registry.subscribe("cam", &SubscribeConfig::default()).await.unwrap();

        publisher.send_audio(frame(0, false));
        publisher.send_video(frame(0, false));
        publisher.send_video(frame(40, true));
        publisher.send_audio(frame(40, false));

        match sub.next_event().await {
            SessionEvent::VideoFrame(f) => assert_eq!(f.abs_time, 40),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(sub.next_event().await, SessionEvent::AudioFrame(_)));
    }

    #[tokio::test]
    async fn unpublish_ends_subscription() {
        let registry = StreamRegistry::new(16);
        let publisher = registry.publish("cam", av_tracks()).unwrap();
        let mut sub = registry.subscribe("cam", &SubscribeConfig::default()).await.unwrap();

        drop(publisher);
        assert_eq!(
            sub.next_event().await,
            SessionEvent::Lifecycle(LifecycleEvent::PublisherClosed)
        );
    }

    #[tokio::test]
    async fn overrun_reports_lag_once() {
        let registry = StreamRegistry::new(2);
        let publisher = registry.publish("tone", vec![av_tracks().remove(1)]).unwrap();
        let mut sub = registry.subscribe("tone", &SubscribeConfig::default()).await.unwrap();

        for i in 0..5 {
            publisher.send_audio(frame(i * 20, false));
        }
        assert_eq!(
            sub.next_event().await,
            SessionEvent::Lifecycle(LifecycleEvent::Lagged(3))
        );
        assert_eq!(
            sub.next_event().await,
            SessionEvent::Lifecycle(LifecycleEvent::PublisherClosed)
        );
    }
}
