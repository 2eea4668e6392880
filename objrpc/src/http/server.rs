use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::{Bytes, BytesMut};
use tokio_util::sync::DropGuard;

use super::{DEFAULT_METHODS_PATH, DEFAULT_RPC_PATH};
use crate::{
    Router,
    error::{Error, ErrorKind, Result},
    lifecycle::{Lifecycle, RunState},
    msg::{self, Message, MsgFlags},
};

/// Serves a registered object over HTTP.
///
/// Same lifecycle contract as [`StreamServer`](crate::StreamServer),
/// but connection acceptance and routing are delegated to the HTTP
/// server primitive, which supports native graceful shutdown: `stop`
/// drains in-flight requests and blocks until the serve task has
/// confirmed exit. Each instance owns its own route table; nothing is
/// ever attached to a process-wide router.
pub struct HttpServer {
    addr: String,
    router: Arc<Router>,
    lifecycle: Arc<Lifecycle>,
    _drop_guard: DropGuard,
}

impl HttpServer {
    #[must_use]
    pub fn new(router: Router, addr: impl Into<String>) -> Self {
        let lifecycle = Arc::new(Lifecycle::new());
        Self {
            addr: addr.into(),
            router: Arc::new(router),
            _drop_guard: lifecycle.drop_guard(),
            lifecycle,
        }
    }

    /// Binds the listening socket and launches the serve loop. Returns
    /// the bound address.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if this instance was started before; `BindFailed`
    /// if the socket cannot be bound.
    pub async fn start(&self) -> Result<SocketAddr> {
        let addr = self.addr.clone();
        let (listener, local_addr) = self
            .lifecycle
            .start(|| async move {
                let listener = tokio::net::TcpListener::bind(addr.as_str())
                    .await
                    .map_err(|e| {
                        Error::new(ErrorKind::BindFailed, format!("bind {addr} failed: {e}"))
                    })?;
                let local_addr = listener
                    .local_addr()
                    .map_err(|e| Error::new(ErrorKind::BindFailed, e.to_string()))?;
                Ok((listener, local_addr))
            })
            .await?;

        let app = axum::Router::new()
            .route(DEFAULT_RPC_PATH, post(handle_rpc))
            .route(DEFAULT_METHODS_PATH, get(handle_methods))
            .with_state(self.router.clone());

        let lifecycle = self.lifecycle.clone();
        let shutdown = self.lifecycle.shutdown_token();
        tokio::spawn(async move {
            let serve =
                axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
            if let Err(e) = serve.await {
                let kind = if shutdown.is_cancelled() {
                    ErrorKind::ShutdownFailed
                } else {
                    ErrorKind::ServeFailed
                };
                let err = Error::new(kind, e.to_string());
                tracing::error!("http serve failed: {err}");
                lifecycle.record_fault(err).await;
            }
            lifecycle.mark_exited().await;
        });

        tracing::info!("listening on http://{local_addr}{DEFAULT_RPC_PATH}");
        Ok(local_addr)
    }

    /// Requests graceful shutdown and blocks, with no deadline, until
    /// in-flight requests have drained and the serve task has exited.
    ///
    /// # Errors
    ///
    /// `NotRunning` if the instance is not currently running;
    /// `ShutdownFailed` if the serve loop did not close cleanly (the
    /// lifecycle still reaches Stopped).
    pub async fn stop(&self) -> Result<()> {
        tracing::info!("stopping server at {}", self.addr);
        self.lifecycle.request_stop().await?;
        self.lifecycle.wait().await;
        match self.lifecycle.take_fault().await {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Blocks until the serve task has exited. Idempotent; returns
    /// immediately if the server was never started.
    pub async fn wait(&self) {
        self.lifecycle.wait().await;
    }

    pub async fn state(&self) -> RunState {
        self.lifecycle.state().await
    }
}

async fn handle_rpc(State(router): State<Arc<Router>>, body: Bytes) -> Response {
    let msg = match Message::parse(body) {
        Ok(msg) if msg.meta.is_req() => msg,
        Ok(_) => return (StatusCode::BAD_REQUEST, "expected a request message").into_response(),
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let mut meta = msg.meta.clone();
    let payload = router.dispatch(msg).await;
    meta.flags.remove(MsgFlags::IsReq);
    meta.flags.insert(MsgFlags::IsRsp);

    let mut buf = BytesMut::new();
    match msg::encode_body(&meta, &payload, &mut buf) {
        Ok(()) => buf.freeze().into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn handle_methods(State(router): State<Arc<Router>>) -> Json<Vec<String>> {
    Json(router.method_names().cloned().collect())
}
