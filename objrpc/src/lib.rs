#![forbid(unsafe_code)]

//! Expose an arbitrary in-process object for remote invocation, over a
//! persistent raw stream transport or an HTTP-tunneled transport, with
//! a matching client handle for each.
//!
//! ```rust,no_run
//! # use objrpc::{Router, StreamClient, StreamServer};
//! # #[tokio::main]
//! # async fn main() -> objrpc::Result<()> {
//! let mut router = Router::default();
//! router.add_method("Demo.Echo", |req: String| async move { Ok(req) });
//!
//! let server = StreamServer::new(router, "127.0.0.1:0");
//! let addr = server.start().await?;
//!
//! let client = StreamClient::new(addr.to_string());
//! client.connect().await?;
//! let rsp: String = client.call("Demo.Echo", &"hello".to_string()).await?;
//! assert_eq!(rsp, "hello");
//! client.disconnect().await?;
//!
//! server.stop().await?;
//! server.wait().await;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::{Error, ErrorKind, Result};

mod payload;
pub use payload::Payload;

mod msg;
pub use msg::{Message, MsgFlags, MsgMeta};

mod router;
pub use router::{Method, Router};

mod waiter;
mod receiver;

mod lifecycle;
pub use lifecycle::RunState;

mod client;
pub use client::ClientConfig;

mod stream;
pub use stream::{StreamClient, StreamServer};

mod http;
pub use http::{DEFAULT_METHODS_PATH, DEFAULT_RPC_PATH, HttpClient, HttpServer};

mod pair;
pub use pair::{HttpServerClient, StreamServerClient};
