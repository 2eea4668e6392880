use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::frame;
use crate::{
    ClientConfig,
    error::{Error, ErrorKind, Result},
    msg::{self, Message, MsgMeta},
    waiter::Waiter,
};

/// Client handle for calling a [`StreamServer`](super::StreamServer).
///
/// The handle is Disconnected until [`connect`](Self::connect) succeeds
/// and Disconnected again after [`disconnect`](Self::disconnect);
/// `call` is only valid in between. Concurrent calls on one connected
/// handle multiplex over the single connection and are matched to their
/// replies by message id.
pub struct StreamClient {
    server_addr: String,
    config: ClientConfig,
    conn: tokio::sync::Mutex<Option<Conn>>,
}

struct Conn {
    sender: mpsc::Sender<Bytes>,
    waiter: Arc<Waiter>,
    stop: CancellationToken,
    _guard: DropGuard,
}

impl StreamClient {
    #[must_use]
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self::with_config(server_addr, ClientConfig::default())
    }

    #[must_use]
    pub fn with_config(server_addr: impl Into<String>, config: ClientConfig) -> Self {
        Self {
            server_addr: server_addr.into(),
            config,
            conn: tokio::sync::Mutex::new(None),
        }
    }

    /// Opens the connection and spawns its send and receive loops.
    ///
    /// # Errors
    ///
    /// `AlreadyConnected` if the handle is already connected (reconnect
    /// is an error, never a silent no-op); `ConnectFailed` if the remote
    /// cannot be reached.
    pub async fn connect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        if conn.is_some() {
            return Err(Error::new(
                ErrorKind::AlreadyConnected,
                format!("already connected to {}", self.server_addr),
            ));
        }

        let stream = TcpStream::connect(self.server_addr.as_str())
            .await
            .map_err(|e| {
                Error::new(
                    ErrorKind::ConnectFailed,
                    format!("connect to {} failed: {e}", self.server_addr),
                )
            })?;
        let (read_half, write_half) = stream.into_split();

        let (sender, receiver) = mpsc::channel(1024);
        let waiter = Arc::new(Waiter::default());
        let stop = CancellationToken::new();

        tokio::spawn({
            let stop = stop.clone();
            async move {
                tokio::select! {
                    () = stop.cancelled() => {}
                    r = send_loop(write_half, receiver) => {
                        if let Err(e) = r {
                            tracing::warn!("send loop failed: {e}");
                        }
                    }
                }
            }
        });

        tokio::spawn({
            let stop = stop.clone();
            let waiter = waiter.clone();
            let addr = self.server_addr.clone();
            async move {
                tokio::select! {
                    () = stop.cancelled() => {}
                    r = recv_loop(read_half, &waiter) => {
                        if let Err(e) = r {
                            tracing::warn!("connection to {addr} lost: {e}");
                        }
                        // tear down the send loop as well; pending and
                        // future calls fail instead of hanging
                        stop.cancel();
                    }
                }
            }
        });

        *conn = Some(Conn {
            sender,
            waiter,
            _guard: stop.clone().drop_guard(),
            stop,
        });
        tracing::info!("connected to {}", self.server_addr);
        Ok(())
    }

    /// Calls `method` on the remote object and blocks until its reply
    /// arrives or the connection drops. There is no per-call timeout.
    /// A dispatch failure on the server side is returned unchanged.
    ///
    /// # Errors
    ///
    /// `NotConnected` if the handle is not connected (no network
    /// operation is attempted).
    pub async fn call<Req, Rsp>(&self, method: &str, request: &Req) -> Result<Rsp>
    where
        Req: Serialize,
        Rsp: DeserializeOwned,
    {
        let (sender, waiter, stop) = {
            let conn = self.conn.lock().await;
            match conn.as_ref() {
                Some(c) => (c.sender.clone(), c.waiter.clone(), c.stop.clone()),
                None => {
                    return Err(Error::new(
                        ErrorKind::NotConnected,
                        format!("not connected to {} (method {method})", self.server_addr),
                    ));
                }
            }
        };

        let flags = self.config.request_flags();
        let (msgid, receiver) = waiter.alloc();
        let meta = MsgMeta {
            method: method.to_string(),
            flags,
            msgid,
        };

        let mut payload = BytesMut::new();
        msg::encode_payload(flags, request, &mut payload)?;
        let framed = frame::encode(&meta, &payload)?;

        sender
            .send(framed)
            .await
            .map_err(|e| Error::new(ErrorKind::SendMsgFailed, e.to_string()))?;
        tracing::debug!("calling {method} on {}", self.server_addr);

        let reply = tokio::select! {
            () = stop.cancelled() => {
                return Err(Error::new(
                    ErrorKind::RecvMsgFailed,
                    "connection closed before reply".to_string(),
                ));
            }
            r = receiver.recv() => r?,
        };
        reply.deserialize::<Result<Rsp>>()?
    }

    /// Closes the connection and stops its loops.
    ///
    /// # Errors
    ///
    /// `NotConnected` if the handle is already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        match conn.take() {
            Some(c) => {
                c.stop.cancel();
                tracing::info!("disconnected from {}", self.server_addr);
                Ok(())
            }
            None => Err(Error::new(
                ErrorKind::NotConnected,
                format!("already disconnected from {}", self.server_addr),
            )),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }
}

async fn send_loop(mut write_half: OwnedWriteHalf, mut receiver: mpsc::Receiver<Bytes>) -> Result<()> {
    while let Some(frame) = receiver.recv().await {
        write_half
            .write_all(&frame)
            .await
            .map_err(|e| Error::new(ErrorKind::SendMsgFailed, e.to_string()))?;
    }
    Ok(())
}

async fn recv_loop(mut read_half: OwnedReadHalf, waiter: &Waiter) -> Result<()> {
    let mut buffer = BytesMut::with_capacity(1 << 16);
    loop {
        if let Some(body) = frame::parse(&mut buffer)? {
            let msg = Message::parse(body)?;
            if msg.meta.is_rsp() {
                waiter.post(msg.meta.msgid, msg);
            } else {
                tracing::warn!("ignoring unexpected frame for method {}", msg.meta.method);
            }
        } else {
            let n = read_half
                .read_buf(&mut buffer)
                .await
                .map_err(|e| Error::new(ErrorKind::RecvMsgFailed, e.to_string()))?;
            if n == 0 {
                return Err(Error::new(
                    ErrorKind::RecvMsgFailed,
                    "server closed the connection".to_string(),
                ));
            }
        }
    }
}
