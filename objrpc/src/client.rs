use crate::msg::MsgFlags;

/// Per-client settings shared by both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Encode requests with MessagePack instead of JSON.
    pub use_msgpack: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { use_msgpack: false }
    }
}

impl ClientConfig {
    pub(crate) fn request_flags(self) -> MsgFlags {
        let mut flags = MsgFlags::IsReq;
        if self.use_msgpack {
            flags |= MsgFlags::UseMessagePack;
        }
        flags
    }
}
