//! Registry of published live streams.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use livemux_common::{Error, Frame, Result, TrackInfo};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use super::{split_stream_path, MediaPacket, Subscription};
use crate::config::SubscribeConfig;

pub(super) struct StreamEntry {
    pub(super) tracks: Vec<TrackInfo>,
    pub(super) sender: broadcast::Sender<MediaPacket>,
    pub(super) closed: CancellationToken,
    pub(super) published_at: DateTime<Utc>,
}

/// Thread-safe map of stream name to live stream.
#[derive(Clone)]
pub struct StreamRegistry {
    streams: Arc<DashMap<String, Arc<StreamEntry>>>,
    published: Arc<Notify>,
    capacity: usize,
}

impl StreamRegistry {
    /// Create a registry whose streams buffer up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            streams: Arc::new(DashMap::new()),
            published: Arc::new(Notify::new()),
            capacity: capacity.max(1),
        }
    }

    /// Publish a stream under `name` with its discovered tracks.
    ///
    /// The stream stays published until the returned [`Publisher`] is
    /// dropped.
    pub fn publish(&self, name: &str, tracks: Vec<TrackInfo>) -> Result<Publisher> {
        if name.is_empty() {
            return Err(Error::Validation("stream name cannot be empty".into()));
        }
        for track in &tracks {
            if let TrackInfo::Video(video) = track {
                video.validate()?;
            }
        }

        let (sender, _) = broadcast::channel(self.capacity);
        let entry = Arc::new(StreamEntry {
            tracks,
            sender: sender.clone(),
            closed: CancellationToken::new(),
            published_at: Utc::now(),
        });

        match self.streams.entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::Conflict(format!("stream '{name}' is already published")))
            }
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
            }
        }
        self.published.notify_waiters();

        tracing::info!(
            stream = %name,
            tracks = entry.tracks.len(),
            "Stream published"
        );

        Ok(Publisher {
            name: name.to_string(),
            sender,
            entry,
            registry: self.clone(),
        })
    }

    /// Subscribe to `stream_path` (`name[?args]`), waiting up to the
    /// configured timeout for the stream to be published.
    pub async fn subscribe(&self, stream_path: &str, config: &SubscribeConfig) -> Result<Subscription> {
        let (name, args) = split_stream_path(stream_path);
        if name.is_empty() {
            return Err(Error::Validation("stream path cannot be empty".into()));
        }

        let deadline = tokio::time::Instant::now() + config.wait_timeout();
        let entry = loop {
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(entry) = self.streams.get(name) {
                break entry.value().clone();
            }

            tracing::debug!(stream = %name, "Waiting for stream to be published");
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(Error::not_found("stream", name));
            }
        };

        Ok(Subscription::new(name, args, &entry, config))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    /// Names of all published streams with their publish time.
    pub fn list(&self) -> Vec<(String, DateTime<Utc>)> {
        self.streams
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().published_at))
            .collect()
    }

    fn unpublish(&self, name: &str, entry: &Arc<StreamEntry>) {
        entry.closed.cancel();
        if self
            .streams
            .remove_if(name, |_, current| Arc::ptr_eq(current, entry))
            .is_some()
        {
            tracing::info!(stream = %name, "Stream unpublished");
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new(SubscribeConfig::default().channel_capacity)
    }
}

/// Write handle for a published stream. Dropping it unpublishes the stream
/// and ends every subscription to it.
pub struct Publisher {
    name: String,
    sender: broadcast::Sender<MediaPacket>,
    entry: Arc<StreamEntry>,
    registry: StreamRegistry,
}

impl Publisher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks(&self) -> &[TrackInfo] {
        &self.entry.tracks
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Push a video frame. Returns the number of subscribers reached.
    pub fn send_video(&self, frame: Frame) -> usize {
        self.sender.send(MediaPacket::Video(frame)).unwrap_or(0)
    }

    /// Push an audio frame. Returns the number of subscribers reached.
    pub fn send_audio(&self, frame: Frame) -> usize {
        self.sender.send(MediaPacket::Audio(frame)).unwrap_or(0)
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.registry.unpublish(&self.name, &self.entry);
    }
}
