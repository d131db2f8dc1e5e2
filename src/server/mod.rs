use crate::config::Config;
use crate::source::{testsrc, StreamRegistry};
use crate::streaming::{self, SessionManager};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use livemux_media::SessionFactory;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Published live streams
    pub registry: StreamRegistry,
    /// Creates one fragmenting session per viewer
    pub factory: SessionFactory,
    /// Active viewer sessions
    pub sessions: SessionManager,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let registry = StreamRegistry::new(config.subscribe.channel_capacity);
        Self {
            config: Arc::new(config),
            registry,
            factory: SessionFactory::default(),
            sessions: SessionManager::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", streaming::sessions_router())
        .merge(streaming::live_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    let streams: Vec<String> = ctx.registry.list().into_iter().map(|(name, _)| name).collect();
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "streams": streams,
        "sessions": ctx.sessions.len(),
    }))
}

/// Start the HTTP server and run until a shutdown signal arrives
pub async fn start_server(config: Config) -> Result<()> {
    start_server_with_options(config, CancellationToken::new()).await
}

/// Start the HTTP server, stopping when `shutdown` is cancelled or a
/// signal is received
pub async fn start_server_with_options(config: Config, shutdown: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let mut ctx = AppContext::new(config);
    ctx.shutdown = shutdown.clone();

    let sources = testsrc::spawn_test_sources(&ctx.registry, &ctx.config.test_sources, shutdown.clone())
        .context("Failed to start test sources")?;
    if !sources.is_empty() {
        tracing::info!(count = sources.len(), "Test sources running");
    }

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => signal_token.cancel(),
            _ = signal_token.cancelled() => {}
        }
    });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    for handle in sources {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use livemux_common::{AudioCodec, AudioTrackInfo, TrackInfo};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_lists_published_streams() {
        let ctx = AppContext::new(Config::default());
        let _publisher = ctx
            .registry
            .publish(
                "live/a",
                vec![TrackInfo::Audio(AudioTrackInfo::g711(AudioCodec::Pcmu, 8000, 1))],
            )
            .unwrap();
        let app = create_router(ctx);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["streams"][0], "live/a");
        assert_eq!(json["sessions"], 0);
    }

    #[tokio::test]
    async fn unknown_stream_is_bad_request() {
        let mut config = Config::default();
        config.subscribe.wait_timeout_secs = 0;
        let app = create_router(AppContext::new(config));

        let response = app
            .oneshot(Request::builder().uri("/nobody/here.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"stream not found: nobody/here");
    }

    #[tokio::test]
    async fn sessions_endpoint_starts_empty() {
        let app = create_router(AppContext::new(Config::default()));
        let response = app
            .oneshot(Request::builder().uri("/api/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"[]");
    }
}
