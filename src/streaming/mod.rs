//! Live streaming module.
//!
//! # Routes
//!
//! - `GET /{stream}[.mp4][?query]` - chunked fragmented MP4 of a live stream
//! - `GET /api/sessions` - active viewer sessions

mod live;
mod sessions;

pub use live::live_stream;
pub use sessions::{LiveSession, SessionManager};

use axum::{extract::State, routing::get, Json, Router};

use crate::server::AppContext;

/// Create the live stream router. Matches any path not claimed by a more
/// specific route.
pub fn live_router() -> Router<AppContext> {
    Router::new().route("/*stream_path", get(live_stream))
}

/// Create the session listing router.
pub fn sessions_router() -> Router<AppContext> {
    Router::new().route("/sessions", get(list_sessions))
}

async fn list_sessions(State(ctx): State<AppContext>) -> Json<Vec<LiveSession>> {
    Json(ctx.sessions.list())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_router_creation() {
        let _router: Router<AppContext> = live_router();
    }

    #[test]
    fn test_sessions_router_creation() {
        let _router: Router<AppContext> = sessions_router();
    }
}
