use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, ErrorKind, Result},
    msg::{self, MsgMeta},
};

/// Encodes one frame: `[magic u32][body_len u32]` followed by the
/// message body.
pub(crate) fn encode(meta: &MsgMeta, payload: &[u8]) -> Result<Bytes> {
    const H: usize = size_of::<u64>();

    let mut buf = BytesMut::with_capacity(512);
    buf.put_u32(super::MAGIC_NUM);
    buf.put_u32(0); // patched with the body length below
    msg::encode_body(meta, payload, &mut buf)?;

    let body_len = u32::try_from(buf.len() - H)?;
    buf[H / 2..H].copy_from_slice(&body_len.to_be_bytes());

    if buf.len() >= super::MAX_MSG_SIZE {
        return Err(Error::new(
            ErrorKind::ParseMsgFailed,
            format!("message is too long: {}", buf.len()),
        ));
    }
    Ok(buf.freeze())
}

/// Splits one complete frame body off `buffer`, or returns `None` when
/// more bytes are needed.
pub(crate) fn parse(buffer: &mut BytesMut) -> Result<Option<Bytes>> {
    const H: usize = size_of::<u64>();
    if buffer.len() < H {
        return Ok(None);
    }
    let mut be = [0u8; H];
    be.copy_from_slice(&buffer[..H]);
    let header = u64::from_be_bytes(be);

    if (header >> 32) as u32 != super::MAGIC_NUM {
        return Err(Error::new(
            ErrorKind::ParseMsgFailed,
            format!("invalid frame header: {header:016X}"),
        ));
    }

    let len = usize::try_from(header & u64::from(u32::MAX))?;
    if H + len >= super::MAX_MSG_SIZE {
        return Err(Error::new(
            ErrorKind::ParseMsgFailed,
            format!("message is too long: {len}"),
        ));
    }

    if buffer.len() < H + len {
        Ok(None)
    } else {
        buffer.advance(H);
        Ok(Some(buffer.split_to(len).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{Message, MsgFlags};

    #[test]
    fn test_frame_round_trip() {
        let meta = MsgMeta {
            method: "Demo.Echo".to_string(),
            flags: MsgFlags::IsReq,
            msgid: 3,
        };
        let frame = encode(&meta, b"\"hi\"").unwrap();

        let mut buffer = BytesMut::from(&frame[..]);
        let body = parse(&mut buffer).unwrap().unwrap();
        assert!(buffer.is_empty());

        let msg = Message::parse(body).unwrap();
        assert_eq!(msg.meta, meta);
        assert_eq!(&msg.payload[..], b"\"hi\"");
    }

    #[test]
    fn test_parse_needs_more_bytes() {
        let meta = MsgMeta::default();
        let frame = encode(&meta, b"").unwrap();

        // feed the frame one byte short of complete
        let mut buffer = BytesMut::from(&frame[..frame.len() - 1]);
        assert!(parse(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&frame[frame.len() - 1..]);
        assert!(parse(&mut buffer).unwrap().is_some());
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut buffer = BytesMut::from(&b"XXXX\x00\x00\x00\x00"[..]);
        let err = parse(&mut buffer).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseMsgFailed);
    }

    #[test]
    fn test_parse_rejects_oversized_frame() {
        let mut buffer = BytesMut::new();
        buffer.put_u32(super::super::MAGIC_NUM);
        buffer.put_u32(u32::MAX);
        let err = parse(&mut buffer).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseMsgFailed);
    }
}
