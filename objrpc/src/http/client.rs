use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use hyper_util::rt::TokioIo;
use serde::{Serialize, de::DeserializeOwned};
use tokio::net::TcpStream;

use super::DEFAULT_RPC_PATH;
use crate::{
    ClientConfig,
    error::{Error, ErrorKind, Result},
    msg::{self, Message, MsgMeta},
};

/// Client handle for calling an [`HttpServer`](super::HttpServer).
///
/// Same connection state machine as the stream client. Calls on one
/// handle serialize over the single HTTP/1.1 connection.
pub struct HttpClient {
    server_addr: String,
    config: ClientConfig,
    conn: tokio::sync::Mutex<Option<Arc<Conn>>>,
}

struct Conn {
    sender: tokio::sync::Mutex<SendRequest<Full<Bytes>>>,
}

impl HttpClient {
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

    /// Opens the connection and performs the HTTP/1 handshake; the
    /// connection driver runs on its own task until disconnect.
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
        let (sender, connection) =
            hyper::client::conn::http1::handshake::<TokioIo<TcpStream>, Full<Bytes>>(TokioIo::new(
                stream,
            ))
            .await
            .map_err(|e| Error::new(ErrorKind::ConnectFailed, e.to_string()))?;
        tokio::spawn(connection);

        *conn = Some(Arc::new(Conn {
            sender: tokio::sync::Mutex::new(sender),
        }));
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
        let conn = {
            let guard = self.conn.lock().await;
            match guard.as_ref() {
                Some(c) => c.clone(),
                None => {
                    return Err(Error::new(
                        ErrorKind::NotConnected,
                        format!("not connected to {} (method {method})", self.server_addr),
                    ));
                }
            }
        };

        let flags = self.config.request_flags();
        let meta = MsgMeta {
            method: method.to_string(),
            flags,
            msgid: 0,
        };
        let mut payload = BytesMut::new();
        msg::encode_payload(flags, request, &mut payload)?;
        let mut body = BytesMut::new();
        msg::encode_body(&meta, &payload, &mut body)?;

        let req = hyper::Request::builder()
            .uri(format!("http://{}{DEFAULT_RPC_PATH}", self.server_addr))
            .method(hyper::Method::POST)
            .body(Full::new(body.freeze()))
            .map_err(|e| Error::new(ErrorKind::HttpBuildReqFailed, e.to_string()))?;
        tracing::debug!("calling {method} on {}", self.server_addr);

        // the sender stays locked until the response body is drained;
        // HTTP/1.1 allows one request/reply exchange at a time
        let mut sender = conn.sender.lock().await;
        let rsp = sender
            .send_request(req)
            .await
            .map_err(|e| Error::new(ErrorKind::HttpSendReqFailed, e.to_string()))?;
        let status = rsp.status();
        let body_bytes = rsp
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::new(ErrorKind::HttpWaitRspFailed, e.to_string()))?
            .to_bytes();
        drop(sender);

        if !status.is_success() {
            return Err(Error::new(
                ErrorKind::HttpWaitRspFailed,
                format!("unexpected status {status}"),
            ));
        }

        let reply = Message::parse(body_bytes)?;
        reply.deserialize::<Result<Rsp>>()?
    }

    /// Closes the connection; the driver task winds down with it.
    ///
    /// # Errors
    ///
    /// `NotConnected` if the handle is already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        match conn.take() {
            Some(_) => {
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
