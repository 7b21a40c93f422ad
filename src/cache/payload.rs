// Cached response payload.
// Immutable body bytes together with the encoding needed to decode them.

use std::borrow::Cow;

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};

/// Body of a successful fetch. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    bytes: Bytes,
    charset: &'static Encoding,
}

impl CachedPayload {
    pub fn new(bytes: impl Into<Bytes>, charset: &'static Encoding) -> Self {
        Self {
            bytes: bytes.into(),
            charset,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn charset(&self) -> &'static Encoding {
        self.charset
    }

    /// Decoded text of the payload. Malformed sequences become U+FFFD.
    pub fn text(&self) -> Cow<'_, str> {
        self.charset.decode_without_bom_handling(&self.bytes).0
    }

    /// The payload re-encoded as UTF-8, the form stored on disk.
    pub fn to_utf8(&self) -> Vec<u8> {
        if self.charset == UTF_8 {
            self.bytes.to_vec()
        } else {
            self.text().into_owned().into_bytes()
        }
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::{SHIFT_JIS, WINDOWS_1252};

    use super::*;

    #[test]
    fn test_text_decodes_with_charset() {
        let payload = CachedPayload::new(vec![b'"', 0xE9, b'"'], WINDOWS_1252);
        assert_eq!(payload.text(), "\"é\"");
        assert_eq!(payload.to_utf8(), "\"é\"".as_bytes());
    }

    #[test]
    fn test_windows_1252_quotes() {
        let payload = CachedPayload::new(vec![0x93, b'h', b'i', 0x94], WINDOWS_1252);
        assert_eq!(payload.text(), "\u{201C}hi\u{201D}");
    }

    #[test]
    fn test_multibyte_charset() {
        // "日本" in Shift_JIS.
        let payload = CachedPayload::new(vec![0x93, 0xFA, 0x96, 0x7B], SHIFT_JIS);
        assert_eq!(payload.text(), "日本");
        assert_eq!(payload.to_utf8(), "日本".as_bytes());
    }

    #[test]
    fn test_utf8_payload_is_stored_verbatim() {
        let payload = CachedPayload::new(&b"{\"a\":1}"[..], UTF_8);
        assert_eq!(payload.to_utf8(), b"{\"a\":1}");
        assert_eq!(payload.charset(), UTF_8);
        assert_eq!(payload.bytes().len(), 7);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let payload = CachedPayload::new(vec![b'a', 0xC3], UTF_8);
        assert_eq!(payload.text(), "a\u{FFFD}");
    }
}
