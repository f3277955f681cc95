mod byte_cursor;
pub(crate) mod bytes;
mod strings;

pub(crate) use self::byte_cursor::ByteCursor;
pub(crate) use self::strings::{
    decode_ansi, decode_ansi_stripped, decode_utf16le_lossy_z, strip_nuls,
};
