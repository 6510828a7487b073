//! Header / header2 / xheader sections: compressed case-metadata string
//! payload (§4.11).

use crate::codec::{decompress_with_retry, Codec};
use crate::error::Result;

/// Which encoding the decompressed header-string blob carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderEncoding {
    /// `header`: legacy ASCII key/value text.
    Ascii,
    /// `header2`: UTF-16LE key/value text.
    Utf16Le,
    /// `xheader`: UTF-8 XML.
    Utf8Xml,
}

/// Decompresses a header/header2/xheader section's payload into its raw
/// string bytes. Interpreting the key/value dictionary is an external
/// collaborator's job (§1's "header-string templating" out-of-scope item);
/// this crate only transports the bytes.
pub fn read_header_section(payload: &[u8], codec: &dyn Codec) -> Result<Vec<u8>> {
    decompress_with_retry(codec, payload)
}

/// Compresses `raw` (already encoded per [`HeaderEncoding`]) into a
/// header/header2/xheader section payload at `level`.
pub fn write_header_section(raw: &[u8], codec: &dyn Codec, level: u8) -> Result<Vec<u8>> {
    codec.compress(raw, level)
}

/// Decodes a decompressed `header2` blob (UTF-16LE) into a `String`.
pub fn decode_utf16le(raw: &[u8]) -> Result<String> {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|e| crate::error::Error::FormatInvariant(format!("header2 blob is not valid UTF-16: {e}")))
}

/// Encodes a `String` into the `header2` UTF-16LE wire form.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ZlibCodec;

    #[test]
    fn ascii_header_round_trips_through_codec() {
        let codec = ZlibCodec;
        let raw = b"1\r\ncase_number\tevidence_number\r\n1\tE01\r\n".to_vec();
        let payload = write_header_section(&raw, &codec, 6).unwrap();
        let decompressed = read_header_section(&payload, &codec).unwrap();
        assert_eq!(decompressed, raw);
    }

    #[test]
    fn utf16_round_trips() {
        let text = "case_number\tevidence_number";
        let encoded = encode_utf16le(text);
        let decoded = decode_utf16le(&encoded).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn xheader_blob_round_trips_through_codec() {
        let codec = ZlibCodec;
        let raw = b"<?xml version=\"1.0\"?><xheader><case_number>1</case_number></xheader>".to_vec();
        let payload = write_header_section(&raw, &codec, 9).unwrap();
        let decompressed = read_header_section(&payload, &codec).unwrap();
        assert_eq!(decompressed, raw);
    }
}
