//! Raw stream (TCP) transport.

const MAGIC_NUM: u32 = u32::from_be_bytes(*b"ORPC");
const MAX_MSG_SIZE: usize = 64 << 20;

mod frame;

mod server;
pub use server::StreamServer;

mod client;
pub use client::StreamClient;
