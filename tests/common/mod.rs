//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds a full [`AppContext`] from a
//! config. The [`with_server`](TestHarness::with_server) constructors start
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use livemux::config::Config;
use livemux::server::{create_router, AppContext};
use livemux_common::{AudioCodec, AudioTrackInfo, Frame, TrackInfo};

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
}

impl TestHarness {
    /// Create a new harness with default configuration and a short
    /// subscribe wait.
    pub fn new() -> Self {
        let mut config = Config::default();
        config.subscribe.wait_timeout_secs = 1;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            ctx: AppContext::new(config),
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        Self::with_config(config).serve().await
    }

    async fn serve(self) -> (Self, SocketAddr) {
        let app = create_router(self.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });

        (self, addr)
    }
}

/// Single mono PCMU track at 8 kHz.
pub fn pcmu_tracks() -> Vec<TrackInfo> {
    vec![TrackInfo::Audio(AudioTrackInfo::g711(AudioCodec::Pcmu, 8000, 1))]
}

/// A 20 ms PCMU frame at `abs_time`.
pub fn pcmu_frame(abs_time: u32) -> Frame {
    Frame::new(abs_time, 20, vec![0xFF; 160], true)
}
