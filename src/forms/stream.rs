use encoding::EncodingRef;
use log::trace;

use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::{ByteCursor, decode_ansi, decode_utf16le_lossy_z};

/// Read access to one forms stream (`f` or `o`).
///
/// Custom control decoders only ever see this trait, so they can be driven from any source that
/// can hand out little-endian fields in order.
pub trait FormStreamReader {
    fn pos(&self) -> usize;
    fn remaining(&self) -> usize;
    fn read_bytes(&mut self, len: usize, what: &'static str) -> DeserializationResult<&[u8]>;
    fn read_u8(&mut self, what: &'static str) -> DeserializationResult<u8>;
    fn read_u16(&mut self, what: &'static str) -> DeserializationResult<u16>;
    fn read_u16_be(&mut self, what: &'static str) -> DeserializationResult<u16>;
    fn read_i16(&mut self, what: &'static str) -> DeserializationResult<i16>;
    fn read_u32(&mut self, what: &'static str) -> DeserializationResult<u32>;
    fn read_i32(&mut self, what: &'static str) -> DeserializationResult<i32>;
    /// Move to the absolute position `pos`; backward targets are rejected.
    fn seek_forward(&mut self, pos: usize, what: &'static str) -> DeserializationResult<()>;
}

impl FormStreamReader for ByteCursor<'_> {
    fn pos(&self) -> usize {
        ByteCursor::pos(self)
    }

    fn remaining(&self) -> usize {
        ByteCursor::remaining(self)
    }

    fn read_bytes(&mut self, len: usize, what: &'static str) -> DeserializationResult<&[u8]> {
        self.take_bytes(len, what)
    }

    fn read_u8(&mut self, what: &'static str) -> DeserializationResult<u8> {
        self.u8_named(what)
    }

    fn read_u16(&mut self, what: &'static str) -> DeserializationResult<u16> {
        self.u16_named(what)
    }

    fn read_u16_be(&mut self, what: &'static str) -> DeserializationResult<u16> {
        self.u16_be_named(what)
    }

    fn read_i16(&mut self, what: &'static str) -> DeserializationResult<i16> {
        self.i16_named(what)
    }

    fn read_u32(&mut self, what: &'static str) -> DeserializationResult<u32> {
        self.u32_named(what)
    }

    fn read_i32(&mut self, what: &'static str) -> DeserializationResult<i32> {
        self.i32_named(what)
    }

    fn seek_forward(&mut self, pos: usize, what: &'static str) -> DeserializationResult<()> {
        ByteCursor::seek_forward(self, pos, what)
    }
}

/// Runs `f` on a structure declared to span `size` bytes, then moves exactly to its end.
///
/// Whatever `f` leaves unread is skipped; reading past the declared end is a
/// `StructuralMismatch`, since every later structure would be misaligned.
pub fn will_jump_to<R, T, F>(
    stream: &mut R,
    size: usize,
    what: &'static str,
    f: F,
) -> DeserializationResult<T>
where
    R: FormStreamReader + ?Sized,
    F: FnOnce(&mut R) -> DeserializationResult<T>,
{
    let start = stream.pos();
    let end = start.saturating_add(size);
    let value = f(stream)?;

    if stream.pos() > end {
        return Err(DeserializationError::mismatch(
            what,
            start,
            "contents within the declared size",
            (stream.pos() - start) as u64,
        ));
    }
    if stream.pos() < end {
        trace!("{}: skipping {} unread bytes", what, end - stream.pos());
    }
    stream.seek_forward(end, what)?;
    Ok(value)
}

/// A data block whose fields are aligned to their own size, relative to the block start.
///
/// `finish` pads the block to a multiple of 4.
#[derive(Debug, Clone, Copy)]
pub struct AlignedBlock {
    start: usize,
}

impl AlignedBlock {
    pub fn begin<R: FormStreamReader + ?Sized>(stream: &R) -> AlignedBlock {
        AlignedBlock { start: stream.pos() }
    }

    pub fn consumed<R: FormStreamReader + ?Sized>(&self, stream: &R) -> usize {
        stream.pos().saturating_sub(self.start)
    }

    /// Skips padding so that the next `size` byte field is aligned.
    pub fn align<R: FormStreamReader + ?Sized>(
        &self,
        stream: &mut R,
        size: usize,
        what: &'static str,
    ) -> DeserializationResult<()> {
        let rem = self.consumed(stream) % size;
        if rem != 0 {
            let target = stream.pos() + (size - rem);
            stream.seek_forward(target, what)?;
        }
        Ok(())
    }

    pub fn u8<R: FormStreamReader + ?Sized>(
        &self,
        stream: &mut R,
        what: &'static str,
    ) -> DeserializationResult<u8> {
        stream.read_u8(what)
    }

    pub fn u16<R: FormStreamReader + ?Sized>(
        &self,
        stream: &mut R,
        what: &'static str,
    ) -> DeserializationResult<u16> {
        self.align(stream, 2, what)?;
        stream.read_u16(what)
    }

    pub fn i16<R: FormStreamReader + ?Sized>(
        &self,
        stream: &mut R,
        what: &'static str,
    ) -> DeserializationResult<i16> {
        self.align(stream, 2, what)?;
        stream.read_i16(what)
    }

    pub fn u32<R: FormStreamReader + ?Sized>(
        &self,
        stream: &mut R,
        what: &'static str,
    ) -> DeserializationResult<u32> {
        self.align(stream, 4, what)?;
        stream.read_u32(what)
    }

    pub fn i32<R: FormStreamReader + ?Sized>(
        &self,
        stream: &mut R,
        what: &'static str,
    ) -> DeserializationResult<i32> {
        self.align(stream, 4, what)?;
        stream.read_i32(what)
    }

    pub fn finish<R: FormStreamReader + ?Sized>(
        self,
        stream: &mut R,
        what: &'static str,
    ) -> DeserializationResult<()> {
        self.align(stream, 4, what)
    }
}

/// A string length whose top bit marks single-byte ("compressed") storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountOfBytesWithCompressionFlag {
    pub len: usize,
    pub compressed: bool,
}

impl From<u32> for CountOfBytesWithCompressionFlag {
    fn from(raw: u32) -> Self {
        CountOfBytesWithCompressionFlag {
            len: (raw & 0x7FFF_FFFF) as usize,
            compressed: raw & 0x8000_0000 != 0,
        }
    }
}

/// Reads a string described by `count`, then pads to 4 bytes from the start of the string.
pub(crate) fn read_padded_string<R: FormStreamReader + ?Sized>(
    stream: &mut R,
    count: CountOfBytesWithCompressionFlag,
    ansi_codec: EncodingRef,
    what: &'static str,
) -> DeserializationResult<String> {
    let block = AlignedBlock::begin(stream);
    let bytes = stream.read_bytes(count.len, what)?;
    let value = if count.compressed {
        decode_ansi(bytes, ansi_codec, what)?
    } else {
        decode_utf16le_lossy_z(bytes)
    };
    block.finish(stream, what)?;
    Ok(value)
}
