use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Fixed header size of every binary-protocol frame.
pub const HEADER_SIZE: usize = 24;

/// Magic byte of a request frame.
pub const MAGIC_REQUEST: u8 = 0x80;

/// Magic byte of a response frame.
pub const MAGIC_RESPONSE: u8 = 0x81;

/// Default maximum body size: 20 MiB.
pub const DEFAULT_MAX_BODY: usize = 20 * 1024 * 1024;

/// Default size of a single read while the frame length is still unknown.
pub const DEFAULT_READ_CHUNK: usize = 16 * 1024;

/// The 24-byte frame header.
///
/// ```text
///  0        1        2        3        4        5        6        7
/// ┌────────┬────────┬─────────────────┬────────┬────────┬─────────────────┐
/// │ magic  │ opcode │ key length (BE) │ extras │ dtype  │ status / vbucket│
/// ├────────┴────────┴─────────────────┼────────┴────────┴─────────────────┤
/// │ total body length (4B BE)         │ opaque (4B)                       │
/// ├───────────────────────────────────┴───────────────────────────────────┤
/// │ CAS (8B BE)                                                           │
/// └───────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub magic: u8,
    pub opcode: u8,
    pub key_length: u16,
    pub extras_length: u8,
    pub data_type: u8,
    /// Response status; carries the vbucket id on requests.
    pub status: u16,
    /// Length of everything after the header (extras + key + data).
    pub body_length: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl Header {
    /// A request header for `opcode` with all other fields zeroed.
    pub fn request(opcode: u8) -> Self {
        Self {
            magic: MAGIC_REQUEST,
            opcode,
            ..Self::default()
        }
    }

    /// A response header for `opcode` with all other fields zeroed.
    pub fn response(opcode: u8) -> Self {
        Self {
            magic: MAGIC_RESPONSE,
            opcode,
            ..Self::default()
        }
    }

    /// Parse the fixed header. Does not validate; see [`Header::validate`].
    pub fn parse(src: &[u8; HEADER_SIZE]) -> Self {
        let mut buf = &src[..];
        Self {
            magic: buf.get_u8(),
            opcode: buf.get_u8(),
            key_length: buf.get_u16(),
            extras_length: buf.get_u8(),
            data_type: buf.get_u8(),
            status: buf.get_u16(),
            body_length: buf.get_u32(),
            opaque: buf.get_u32(),
            cas: buf.get_u64(),
        }
    }

    /// Reject headers that cannot describe a well-formed frame.
    pub fn validate(&self, max_body: usize) -> Result<()> {
        if self.magic != MAGIC_REQUEST && self.magic != MAGIC_RESPONSE {
            return Err(FrameError::InvalidMagic(self.magic));
        }

        let body = self.body_length as usize;
        if body > max_body {
            return Err(FrameError::BodyTooLarge {
                size: body,
                max: max_body,
            });
        }

        let key = self.key_length as usize;
        let extras = self.extras_length as usize;
        if key + extras > body {
            return Err(FrameError::InvalidLengths { key, extras, body });
        }
        Ok(())
    }

    /// Write the header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u8(self.magic);
        dst.put_u8(self.opcode);
        dst.put_u16(self.key_length);
        dst.put_u8(self.extras_length);
        dst.put_u8(self.data_type);
        dst.put_u16(self.status);
        dst.put_u32(self.body_length);
        dst.put_u32(self.opaque);
        dst.put_u64(self.cas);
    }

    /// Bytes of the complete frame this header announces.
    pub fn total_length(&self) -> usize {
        HEADER_SIZE + self.body_length as usize
    }

    pub fn is_response(&self) -> bool {
        self.magic == MAGIC_RESPONSE
    }
}

/// A complete frame: header plus a view of the body.
///
/// The body is split into `extras`, then `key`, then `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: Header,
    bytes: Bytes,
}

impl Frame {
    /// Build a frame from the full wire bytes (header included).
    ///
    /// `header` must already be validated and describe exactly `bytes`.
    pub(crate) fn from_parts(header: Header, bytes: Bytes) -> Self {
        debug_assert_eq!(bytes.len(), header.total_length());
        Self { header, bytes }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Everything after the header.
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    pub fn extras(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..self.key_start()]
    }

    pub fn key(&self) -> &[u8] {
        &self.bytes[self.key_start()..self.data_start()]
    }

    /// The value payload: body minus extras and key.
    pub fn data(&self) -> &[u8] {
        &self.bytes[self.data_start()..]
    }

    /// Zero-copy handle to the value payload.
    pub fn data_bytes(&self) -> Bytes {
        self.bytes.slice(self.data_start()..)
    }

    /// The frame as received on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_success(&self) -> bool {
        self.header.status == crate::opcode::STATUS_SUCCESS
    }

    fn key_start(&self) -> usize {
        HEADER_SIZE + self.header.extras_length as usize
    }

    fn data_start(&self) -> usize {
        self.key_start() + self.header.key_length as usize
    }
}

/// Encode a frame: `header` with its length fields derived from the slices.
pub fn encode_frame(
    header: &Header,
    extras: &[u8],
    key: &[u8],
    value: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let extras_length = u8::try_from(extras.len()).map_err(|_| FrameError::FieldTooLong {
        field: "extras",
        len: extras.len(),
        max: u8::MAX as usize,
    })?;
    let key_length = u16::try_from(key.len()).map_err(|_| FrameError::FieldTooLong {
        field: "key",
        len: key.len(),
        max: u16::MAX as usize,
    })?;
    let body = extras.len() + key.len() + value.len();
    let body_length = u32::try_from(body).map_err(|_| FrameError::BodyTooLarge {
        size: body,
        max: u32::MAX as usize,
    })?;

    let header = Header {
        key_length,
        extras_length,
        body_length,
        ..*header
    };

    dst.reserve(HEADER_SIZE + body);
    header.encode(dst);
    dst.put_slice(extras);
    dst.put_slice(key);
    dst.put_slice(value);
    Ok(())
}

/// Decode one complete frame from the front of `src`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_body: usize) -> Result<Option<Frame>> {
    let Some(raw) = src.get(..HEADER_SIZE) else {
        return Ok(None);
    };
    let mut fixed = [0u8; HEADER_SIZE];
    fixed.copy_from_slice(raw);
    let header = Header::parse(&fixed);
    header.validate(max_body)?;

    if src.len() < header.total_length() {
        return Ok(None);
    }

    let bytes = src.split_to(header.total_length()).freeze();
    Ok(Some(Frame::from_parts(header, bytes)))
}

/// A request ready to be encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub opcode: u8,
    pub vbucket: u16,
    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Request {
    pub fn new(opcode: u8) -> Self {
        Self {
            opcode,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_opaque(mut self, opaque: u32) -> Self {
        self.opaque = opaque;
        self
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    pub fn with_vbucket(mut self, vbucket: u16) -> Self {
        self.vbucket = vbucket;
        self
    }

    /// The total wire size of this request (header + body).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.extras.len() + self.key.len() + self.value.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let header = Header {
            status: self.vbucket,
            opaque: self.opaque,
            cas: self.cas,
            ..Header::request(self.opcode)
        };
        encode_frame(&header, &self.extras, &self.key, &self.value, dst)
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }
}

/// Configuration for frame assembly.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum body size in bytes. Default: 20 MiB.
    pub max_body_size: usize,
    /// Read size while the header is still incomplete. Default: 16 KiB.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{GET, NOOP, STATUS_KEY_NOT_FOUND};

    fn header_bytes(header: &Header) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        let mut fixed = [0u8; HEADER_SIZE];
        fixed.copy_from_slice(&buf);
        fixed
    }

    #[test]
    fn parse_reads_big_endian_fields_at_fixed_offsets() {
        let raw: [u8; HEADER_SIZE] = [
            0x81, 0x00, 0x00, 0x03, // magic, opcode, key length
            0x04, 0x00, 0x00, 0x01, // extras, data type, status
            0x00, 0x00, 0x00, 0x0c, // body length
            0xde, 0xad, 0xbe, 0xef, // opaque
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, // cas
        ];
        let header = Header::parse(&raw);

        assert_eq!(header.magic, MAGIC_RESPONSE);
        assert_eq!(header.opcode, GET);
        assert_eq!(header.key_length, 3);
        assert_eq!(header.extras_length, 4);
        assert_eq!(header.status, STATUS_KEY_NOT_FOUND);
        assert_eq!(header.body_length, 12);
        assert_eq!(header.opaque, 0xdead_beef);
        assert_eq!(header.cas, 0x0102);
        assert_eq!(header.total_length(), 36);
    }

    #[test]
    fn encode_matches_parse() {
        let header = Header {
            magic: MAGIC_RESPONSE,
            opcode: GET,
            key_length: 7,
            extras_length: 4,
            data_type: 0,
            status: 0x0086,
            body_length: 99,
            opaque: 17,
            cas: u64::MAX - 1,
        };
        assert_eq!(Header::parse(&header_bytes(&header)), header);
    }

    #[test]
    fn validate_rejects_unknown_magic() {
        let header = Header {
            magic: 0x42,
            ..Header::default()
        };
        assert!(matches!(
            header.validate(DEFAULT_MAX_BODY),
            Err(FrameError::InvalidMagic(0x42))
        ));
    }

    #[test]
    fn validate_rejects_oversized_body() {
        let header = Header {
            body_length: 1024,
            ..Header::response(GET)
        };
        assert!(matches!(
            header.validate(16),
            Err(FrameError::BodyTooLarge { size: 1024, max: 16 })
        ));
    }

    #[test]
    fn validate_rejects_key_and_extras_past_body() {
        let header = Header {
            key_length: 4,
            extras_length: 4,
            body_length: 6,
            ..Header::response(GET)
        };
        assert!(matches!(
            header.validate(DEFAULT_MAX_BODY),
            Err(FrameError::InvalidLengths { .. })
        ));
    }

    #[test]
    fn body_sections_follow_extras_then_key() {
        let mut wire = BytesMut::new();
        encode_frame(
            &Header::response(GET),
            &[0, 0, 0, 9],
            b"key",
            b"value",
            &mut wire,
        )
        .unwrap();

        let frame = decode_frame(&mut wire, DEFAULT_MAX_BODY).unwrap().unwrap();
        assert_eq!(frame.header().body_length, 12);
        assert_eq!(frame.extras(), &[0, 0, 0, 9]);
        assert_eq!(frame.key(), b"key");
        assert_eq!(frame.data(), b"value");
        assert_eq!(frame.data_bytes().as_ref(), b"value");
        assert_eq!(frame.body().len(), 12);
        assert!(wire.is_empty());
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut wire = BytesMut::new();
        encode_frame(&Header::response(GET), &[], &[], b"hello", &mut wire).unwrap();
        let full = wire.clone();

        wire.truncate(HEADER_SIZE - 1);
        assert!(decode_frame(&mut wire, DEFAULT_MAX_BODY).unwrap().is_none());

        let mut wire = full;
        wire.truncate(HEADER_SIZE + 2);
        assert!(decode_frame(&mut wire, DEFAULT_MAX_BODY).unwrap().is_none());
    }

    #[test]
    fn decode_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(&Header::response(NOOP), &[], &[], &[], &mut wire).unwrap();
        encode_frame(&Header::response(GET), &[1, 2, 3, 4], &[], b"v", &mut wire).unwrap();

        let first = decode_frame(&mut wire, DEFAULT_MAX_BODY).unwrap().unwrap();
        let second = decode_frame(&mut wire, DEFAULT_MAX_BODY).unwrap().unwrap();
        assert_eq!(first.header().opcode, NOOP);
        assert_eq!(first.wire_size(), HEADER_SIZE);
        assert_eq!(second.data(), b"v");
        assert!(wire.is_empty());
    }

    #[test]
    fn request_encoding_places_vbucket_and_lengths() {
        let request = Request::new(GET)
            .with_key("user:1")
            .with_opaque(7)
            .with_vbucket(513);
        let bytes = request.to_bytes().unwrap();

        assert_eq!(bytes.len(), request.wire_size());
        assert_eq!(bytes[0], MAGIC_REQUEST);
        assert_eq!(bytes[1], GET);
        assert_eq!(&bytes[2..4], &[0x00, 0x06]);
        assert_eq!(&bytes[6..8], &[0x02, 0x01]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x00, 0x06]);
        assert_eq!(&bytes[12..16], &[0x00, 0x00, 0x00, 0x07]);
        assert_eq!(&bytes[HEADER_SIZE..], b"user:1");
    }

    #[test]
    fn oversized_extras_rejected() {
        let mut dst = BytesMut::new();
        let extras = vec![0u8; 300];
        let err = encode_frame(&Header::request(GET), &extras, &[], &[], &mut dst).unwrap_err();
        assert!(matches!(
            err,
            FrameError::FieldTooLong {
                field: "extras",
                ..
            }
        ));
    }
}
