use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{
    Payload,
    error::{Error, ErrorKind, Result},
};

/// Flags controlling message direction and serialization format.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MsgFlags(u8);

bitflags! {
    impl MsgFlags: u8 {
        /// Message is a request.
        const IsReq = 1;
        /// Message is a response.
        const IsRsp = 2;
        /// Use MessagePack instead of JSON for meta and payload.
        const UseMessagePack = 4;
    }
}

/// Message metadata, serialized ahead of the payload.
///
/// `method` is an opaque `"Object.Method"` identifier resolved by the
/// router; `msgid` correlates a response with the request it answers.
#[derive(Deserialize, Serialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct MsgMeta {
    pub method: String,
    pub flags: MsgFlags,
    pub msgid: u64,
}

impl MsgMeta {
    #[must_use]
    pub fn is_req(&self) -> bool {
        self.flags.contains(MsgFlags::IsReq)
    }

    #[must_use]
    pub fn is_rsp(&self) -> bool {
        self.flags.contains(MsgFlags::IsRsp)
    }
}

/// One decoded message: metadata plus the still-serialized payload.
///
/// The body layout is shared by both transports:
///
/// ```text
/// | 4 bytes  | N bytes  | M bytes |
/// | meta_len | metadata | payload |
/// ```
///
/// The stream transport prefixes this body with its own frame header;
/// the HTTP transport carries it verbatim as the request/response body.
#[derive(Debug, Default)]
pub struct Message {
    pub meta: MsgMeta,
    pub payload: Payload,
}

impl Message {
    pub fn new(meta: MsgMeta, payload: Payload) -> Self {
        Self { meta, payload }
    }

    /// Parses a message body. The metadata may be JSON or MessagePack,
    /// auto-detected by the leading byte.
    ///
    /// # Errors
    ///
    /// Fails if the body is truncated, the meta length is out of range,
    /// or the metadata does not deserialize.
    pub fn parse(payload: impl Into<Payload>) -> Result<Self> {
        const S: usize = size_of::<u32>();
        let mut payload: Payload = payload.into();

        let len = payload.len();
        if len < S {
            return Err(Error::new(
                ErrorKind::ParseMsgFailed,
                format!("message too short: {len}"),
            ));
        }
        let mut be = [0u8; S];
        be.copy_from_slice(&payload[..S]);
        let meta_len = u32::from_be_bytes(be) as usize;

        if meta_len == 0 {
            return Err(Error::new(
                ErrorKind::ParseMsgFailed,
                format!("invalid meta length: {meta_len}"),
            ));
        }

        let offset = S + meta_len;
        if offset > len {
            return Err(Error::new(
                ErrorKind::ParseMsgFailed,
                format!("invalid meta length: {meta_len}, message length: {len}"),
            ));
        }

        let meta: MsgMeta = if payload[S] == b'{' {
            serde_json::from_slice(&payload[S..offset])?
        } else {
            rmp_serde::from_slice(&payload[S..offset])?
        };

        payload.advance(offset);
        Ok(Message { meta, payload })
    }

    /// Deserializes the payload into a typed value, honoring the
    /// `UseMessagePack` flag. An empty payload decodes as a JSON null.
    ///
    /// # Errors
    ///
    /// Fails if deserialization fails.
    pub fn deserialize<P: for<'c> Deserialize<'c>>(self) -> Result<P> {
        decode_payload(&self.payload, self.meta.flags)
    }
}

/// Serializes `[meta_len][meta]` followed by the raw payload bytes into `buf`.
pub(crate) fn encode_body(meta: &MsgMeta, payload: &[u8], buf: &mut BytesMut) -> Result<()> {
    const S: usize = size_of::<u32>();

    let meta_offset = buf.len();
    buf.put_u32(0); // patched with the meta length below
    if meta.flags.contains(MsgFlags::UseMessagePack) {
        let mut writer = (&mut *buf).writer();
        rmp_serde::encode::write_named(&mut writer, meta)?;
    } else {
        serde_json::to_writer((&mut *buf).writer(), meta)?;
    }
    let meta_len = u32::try_from(buf.len() - meta_offset - S)?;
    buf[meta_offset..meta_offset + S].copy_from_slice(&meta_len.to_be_bytes());

    buf.extend_from_slice(payload);
    Ok(())
}

/// Serializes a value in the codec selected by `flags`.
pub(crate) fn encode_payload<P: Serialize>(
    flags: MsgFlags,
    payload: &P,
    buf: &mut BytesMut,
) -> Result<()> {
    if flags.contains(MsgFlags::UseMessagePack) {
        let mut writer = (&mut *buf).writer();
        rmp_serde::encode::write_named(&mut writer, payload)?;
    } else {
        serde_json::to_writer((&mut *buf).writer(), payload)?;
    }
    Ok(())
}

/// Deserializes a value in the codec selected by `flags`. An empty slice
/// decodes as a JSON null, which allows body-less probe requests.
pub(crate) fn decode_payload<P: for<'c> Deserialize<'c>>(bytes: &[u8], flags: MsgFlags) -> Result<P> {
    if bytes.is_empty() {
        Ok(serde_json::from_value(serde_json::Value::Null)?)
    } else if flags.contains(MsgFlags::UseMessagePack) {
        Ok(rmp_serde::from_slice(bytes)?)
    } else {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Serializes a dispatch outcome as a response payload. Serialization of
/// an `Err` payload cannot realistically fail; if serializing an `Ok`
/// payload fails, the error takes its place so the caller still hears back.
pub(crate) fn encode_result<T: Serialize>(flags: MsgFlags, result: &Result<T>) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    if encode_payload(flags, result, &mut buf).is_ok() {
        return buf.freeze();
    }

    buf.clear();
    let fallback: Result<()> = Err(Error::new(
        ErrorKind::SerializeFailed,
        "response serialization failed".into(),
    ));
    if encode_payload(flags, &fallback, &mut buf).is_err() {
        buf.clear();
    }
    buf.freeze()
}
