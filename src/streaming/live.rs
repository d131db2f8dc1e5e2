//! Chunked fMP4 delivery for one HTTP viewer.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, StatusCode, Uri},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use livemux_common::{Error, Result};
use livemux_media::{Dispatch, LifecycleEvent, Session};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::SessionManager;
use crate::server::{error::AppError, AppContext};
use crate::source::Subscription;

/// Handle `GET /<stream>[.mp4][?query]`.
///
/// Subscribes to the stream, writes the initialization segment, then keeps
/// the response open and streams one chunk per finished fragment until the
/// publisher goes away, the viewer disconnects, or the server shuts down.
pub async fn live_stream(
    State(ctx): State<AppContext>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
) -> std::result::Result<Response, AppError> {
    let stream_path = ctx.factory.stream_path(uri.path(), uri.query());
    let client = connect_info.map(|ConnectInfo(addr)| addr.to_string());

    tracing::debug!(stream = %stream_path, client = ?client, "Live stream requested");

    let subscription = ctx
        .registry
        .subscribe(&stream_path, &ctx.config.subscribe)
        .await
        .map_err(AppError::subscribe_failed)?;

    let mut session = ctx.factory.create(stream_path.as_str());
    let mut pending: Vec<Bytes> = Vec::new();
    for event in subscription.initial_events() {
        session.handle(event, &mut pending)?;
    }

    ctx.sessions.register(session.id(), &stream_path, client);

    let (tx, rx) = mpsc::channel::<Bytes>(ctx.config.subscribe.output_buffer);
    tokio::spawn(run_session(
        session,
        subscription,
        pending,
        tx,
        ctx.sessions.clone(),
        ctx.shutdown.clone(),
    ));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::TRANSFER_ENCODING, "chunked")
        .header(header::CONTENT_TYPE, ctx.factory.content_type())
        .body(body)
        .map_err(|e| AppError::new(Error::Internal(e.to_string())))
}

async fn run_session(
    mut session: Session,
    mut subscription: Subscription,
    mut pending: Vec<Bytes>,
    tx: mpsc::Sender<Bytes>,
    sessions: SessionManager,
    shutdown: CancellationToken,
) {
    let id = session.id();

    let outcome: Result<&'static str> = async {
        loop {
            for chunk in pending.drain(..) {
                let is_fragment = chunk.get(4..8) == Some(&b"moof"[..]);
                let len = chunk.len();
                if tx.send(chunk).await.is_err() {
                    return Err(Error::SinkClosed);
                }
                sessions.record(id, is_fragment, len);
            }

            let event = tokio::select! {
                _ = shutdown.cancelled() => return Ok("server shutting down"),
                _ = tx.closed() => return Err(Error::SinkClosed),
                event = subscription.next_event() => event,
            };

            match session.handle(event, &mut pending)? {
                Dispatch::Handled => {}
                Dispatch::PassThrough(LifecycleEvent::PublisherClosed) => {
                    return Ok("publisher closed")
                }
                Dispatch::PassThrough(LifecycleEvent::Lagged(_)) => return Ok("viewer lagged"),
            }
        }
    }
    .await;

    match outcome {
        Ok(reason) => tracing::info!(session_id = %id, reason, "Live session finished"),
        Err(Error::SinkClosed) => tracing::info!(session_id = %id, "Viewer disconnected"),
        Err(e) => tracing::error!(session_id = %id, error = %e, "Live session failed"),
    }

    let discarded = session.close();
    if discarded > 0 {
        tracing::debug!(session_id = %id, samples = discarded, "Open fragments discarded");
    }
    sessions.end(id);
}
