use std::char::{REPLACEMENT_CHARACTER, decode_utf16};

use encoding::{DecoderTrap, Encoding, EncodingRef};

use crate::err::{DeserializationError, DeserializationResult};

/// Decode a single-byte string using `ansi_codec`.
///
/// Form controls pad single-byte text with NULs to fake UTF-16 width, and there may be
/// multiple of them, so all NULs are pruned before decoding.
pub(crate) fn decode_ansi_stripped(
    bytes: &[u8],
    ansi_codec: EncodingRef,
    what: &'static str,
) -> DeserializationResult<String> {
    let stripped = strip_nuls(bytes);
    decode_ansi(&stripped, ansi_codec, what)
}

/// Decode a single-byte string using `ansi_codec`, keeping any embedded NULs.
pub(crate) fn decode_ansi(
    bytes: &[u8],
    ansi_codec: EncodingRef,
    what: &'static str,
) -> DeserializationResult<String> {
    match ansi_codec.decode(bytes, DecoderTrap::Strict) {
        Ok(s) => Ok(s),
        Err(message) => Err(DeserializationError::FailedToDecodeAnsiString {
            what,
            encoding: ansi_codec.name(),
            message: message.into_owned(),
        }),
    }
}

pub(crate) fn strip_nuls(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().copied().filter(|&b| b != 0).collect()
}

/// Decode a UTF-16LE byte slice until the first NUL code unit, replacing invalid sequences.
///
/// A trailing odd byte is ignored.
pub(crate) fn decode_utf16le_lossy_z(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .take_while(|&unit| unit != 0);

    decode_utf16(units)
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect()
}
