use std::{net::SocketAddr, sync::Arc};

use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::DropGuard;

use super::frame;
use crate::{
    Router,
    error::{Error, ErrorKind, Result},
    lifecycle::{Lifecycle, RunState},
    msg::{Message, MsgFlags},
};

/// Serves a registered object over raw TCP.
///
/// The accept loop runs on one dedicated task and races every accept
/// against the shutdown signal, so `stop` takes effect without polling.
/// Each accepted connection is served end-to-end on its own task;
/// connections already accepted when `stop` is called run to completion
/// and are not interrupted.
pub struct StreamServer {
    addr: String,
    router: Arc<Router>,
    lifecycle: Arc<Lifecycle>,
    _drop_guard: DropGuard,
}

impl StreamServer {
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

    /// Binds the listening socket and launches the accept loop. Returns
    /// the bound address, which differs from the requested one when port
    /// 0 was asked for.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if this instance was started before; `BindFailed`
    /// if the socket cannot be bound, in which case the instance remains
    /// startable.
    pub async fn start(&self) -> Result<SocketAddr> {
        let addr = self.addr.clone();
        let (listener, local_addr) = self
            .lifecycle
            .start(|| async move {
                let listener = TcpListener::bind(addr.as_str()).await.map_err(|e| {
                    Error::new(ErrorKind::BindFailed, format!("bind {addr} failed: {e}"))
                })?;
                let local_addr = listener
                    .local_addr()
                    .map_err(|e| Error::new(ErrorKind::BindFailed, e.to_string()))?;
                Ok((listener, local_addr))
            })
            .await?;

        let router = self.router.clone();
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            Self::accept_loop(listener, &router, &lifecycle).await;
            lifecycle.mark_exited().await;
        });

        tracing::info!("listening on {local_addr}");
        Ok(local_addr)
    }

    /// Requests shutdown. Returns without waiting for the accept loop to
    /// exit; use [`wait`](Self::wait) for that.
    ///
    /// # Errors
    ///
    /// `NotRunning` if the instance is not currently running.
    pub async fn stop(&self) -> Result<()> {
        tracing::info!("stopping server at {}", self.addr);
        self.lifecycle.request_stop().await
    }

    /// Blocks until the accept loop has exited. Idempotent; returns
    /// immediately if the server was never started.
    pub async fn wait(&self) {
        self.lifecycle.wait().await;
    }

    pub async fn state(&self) -> RunState {
        self.lifecycle.state().await
    }

    async fn accept_loop(listener: TcpListener, router: &Arc<Router>, lifecycle: &Lifecycle) {
        loop {
            tokio::select! {
                () = lifecycle.shutdown_requested() => {
                    // the listener drops with this task, releasing the socket
                    tracing::info!("stop accept loop");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!("accepted connection from {peer}");
                        let router = router.clone();
                        tokio::spawn(async move {
                            match Self::serve_connection(stream, &router).await {
                                Ok(()) => tracing::debug!("connection from {peer} closed"),
                                Err(e) => tracing::warn!("connection from {peer} failed: {e}"),
                            }
                        });
                    }
                    Err(e) => {
                        // transient accept errors never take the service down
                        tracing::warn!("accept failed: {e}");
                    }
                }
            }
        }
    }

    /// Serves one connection until it closes: requests on a connection
    /// are answered strictly in arrival order.
    async fn serve_connection(mut stream: TcpStream, router: &Router) -> Result<()> {
        let mut buffer = BytesMut::with_capacity(1 << 16);
        loop {
            if let Some(body) = frame::parse(&mut buffer)? {
                let msg = Message::parse(body)?;
                if !msg.meta.is_req() {
                    return Err(Error::new(
                        ErrorKind::ParseMsgFailed,
                        format!("expected a request, got flags {:?}", msg.meta.flags),
                    ));
                }

                let mut meta = msg.meta.clone();
                let payload = router.dispatch(msg).await;
                meta.flags.remove(MsgFlags::IsReq);
                meta.flags.insert(MsgFlags::IsRsp);

                let rsp = frame::encode(&meta, &payload)?;
                stream
                    .write_all(&rsp)
                    .await
                    .map_err(|e| Error::new(ErrorKind::SendMsgFailed, e.to_string()))?;
            } else {
                let n = stream
                    .read_buf(&mut buffer)
                    .await
                    .map_err(|e| Error::new(ErrorKind::RecvMsgFailed, e.to_string()))?;
                if n == 0 {
                    if buffer.is_empty() {
                        return Ok(());
                    }
                    return Err(Error::new(
                        ErrorKind::RecvMsgFailed,
                        "connection closed mid-frame".to_string(),
                    ));
                }
            }
        }
    }
}
