//! Server-sent events endpoint for live logs

use crate::error::{ErrorExt, Result};
use crate::logs::{LogSource, APPLICATION_SERVICE};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

type EventStream = BoxStream<'static, std::result::Result<Event, Infallible>>;

/// Path of the log streaming endpoint
pub const LOG_STREAM_PATH: &str = "/api/logs/stream";

/// Shared state for the log endpoints
#[derive(Clone)]
pub struct LogsState {
    source: Arc<dyn LogSource>,
    default_tail: usize,
    shutdown: CancellationToken,
}

impl LogsState {
    /// `shutdown` is the parent of every request's cancellation token
    pub fn new(source: Arc<dyn LogSource>, default_tail: usize, shutdown: CancellationToken) -> Self {
        Self {
            source,
            default_tail,
            shutdown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    service: Option<String>,
    tail: Option<usize>,
}

/// Build the router exposing [`LOG_STREAM_PATH`]
pub fn router(state: LogsState) -> Router {
    Router::new()
        .route(LOG_STREAM_PATH, get(stream_logs))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving logs on http://{}{}", addr, LOG_STREAM_PATH);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .to_server_error("Server failed")
}

async fn stream_logs(
    State(state): State<LogsState>,
    Query(query): Query<StreamQuery>,
) -> Sse<KeepAliveStream<EventStream>> {
    let service = query
        .service
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| APPLICATION_SERVICE.to_string());
    let tail = query.tail.unwrap_or(state.default_tail);

    // Dropping the response body drops the LogStream, which cancels this session.
    let cancel = state.shutdown.child_token();
    let events = match state.source.stream_logs(&cancel, &service, tail).await {
        Ok(lines) => {
            debug!(service = %service, tail, "Log stream opened");
            lines.map(|line| Ok(line_event(&line))).boxed()
        }
        Err(e) => {
            warn!(service = %service, "Failed to open log stream: {}", e);
            stream::once(async move { Ok(Event::default().event("error").data(e.user_message())) })
                .boxed()
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn line_event(line: &str) -> Event {
    if line.contains('\r') {
        Event::default().data(line.replace('\r', ""))
    } else {
        Event::default().data(line)
    }
}
