//! HTTP-tunneled transport.
//!
//! Requests travel as POST bodies on one fixed, library-default path;
//! a second fixed path lists the registered methods. Neither path is
//! configurable per instance.

/// Path every RPC request is POSTed to.
pub const DEFAULT_RPC_PATH: &str = "/rpc";

/// Introspection path returning the registered method names as JSON.
pub const DEFAULT_METHODS_PATH: &str = "/rpc/methods";

mod server;
pub use server::HttpServer;

mod client;
pub use client::HttpClient;
