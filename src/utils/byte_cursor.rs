use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;

/// A lightweight cursor over an immutable byte slice.
///
/// The data is already in memory (the compound-document reader hands us whole streams), so this
/// is the slice/offset equivalent of `Cursor<&[u8]>` with explicit bounds and offset control.
///
/// All reads are little-endian unless the name says otherwise, and advance the cursor on success.
/// A failed read leaves the position untouched. The position never moves backwards.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub(crate) fn with_pos(buf: &'a [u8], pos: usize) -> DeserializationResult<Self> {
        // Allow pos == len (EOF), reject pos > len.
        let _ = bytes::slice_r(buf, pos, 0, "cursor.position")?;
        Ok(Self { buf, pos })
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    #[inline]
    pub(crate) fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// A copy of this cursor whose buffer ends at `end` (clamped to the buffer length).
    ///
    /// Reads through the returned cursor can never cross `end`, which is how element and record
    /// boundaries are enforced.
    #[inline]
    pub(crate) fn bounded(&self, end: usize) -> Self {
        let end = end.min(self.buf.len()).max(self.pos);
        Self {
            buf: &self.buf[..end],
            pos: self.pos,
        }
    }

    /// Move to the absolute position `pos`, which must not be behind the current one.
    #[inline]
    pub(crate) fn seek_forward(&mut self, pos: usize, what: &'static str) -> DeserializationResult<()> {
        if pos < self.pos {
            return Err(DeserializationError::InvalidSeek {
                what,
                from: self.pos as u64,
                to: pos as u64,
            });
        }
        let _ = bytes::slice_r(self.buf, pos, 0, what)?;
        self.pos = pos;
        Ok(())
    }

    #[inline]
    pub(crate) fn advance(&mut self, n: usize, what: &'static str) -> DeserializationResult<()> {
        let new_pos = self
            .pos
            .checked_add(n)
            .ok_or_else(|| DeserializationError::out_of_bounds(what, self.pos, n, self.buf.len()))?;
        if new_pos > self.buf.len() {
            return Err(DeserializationError::out_of_bounds(
                what,
                self.pos,
                n,
                self.buf.len(),
            ));
        }
        self.pos = new_pos;
        Ok(())
    }

    #[inline]
    pub(crate) fn take_bytes(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> DeserializationResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> DeserializationResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u8_named(&mut self, what: &'static str) -> DeserializationResult<u8> {
        let b = bytes::read_u8(self.buf, self.pos)
            .ok_or_else(|| DeserializationError::out_of_bounds(what, self.pos, 1, self.buf.len()))?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub(crate) fn u16_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        let v = bytes::read_u16_le_r(self.buf, self.pos, what)?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u16_be_named(&mut self, what: &'static str) -> DeserializationResult<u16> {
        let v = bytes::read_u16_be_r(self.buf, self.pos, what)?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i16_named(&mut self, what: &'static str) -> DeserializationResult<i16> {
        Ok(self.u16_named(what)? as i16)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        let v = bytes::read_u32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i32_named(&mut self, what: &'static str) -> DeserializationResult<i32> {
        Ok(self.u32_named(what)? as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_and_stop_at_end() {
        let data = [0xFE, 0xFF, 0x02, 0x00, 0x00, 0x00, 0x01];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.i16_named("i16").unwrap(), -2);
        assert_eq!(cursor.u32_named("u32").unwrap(), 2);
        assert_eq!(cursor.remaining(), 1);
        assert!(cursor.u16_named("u16").is_err());
        // A failed read does not move the cursor.
        assert_eq!(cursor.pos(), 6);
        assert_eq!(cursor.u8_named("u8").unwrap(), 1);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_big_endian_read() {
        let data = [0x00, 0x0D];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.u16_be_named("face length").unwrap(), 13);
    }

    #[test]
    fn test_seek_forward_rejects_backward_targets() {
        let data = [0u8; 16];
        let mut cursor = ByteCursor::with_pos(&data, 8).unwrap();

        let err = cursor.seek_forward(4, "element end").unwrap_err();
        assert!(matches!(err, DeserializationError::InvalidSeek { from: 8, to: 4, .. }));

        cursor.seek_forward(16, "element end").unwrap();
        assert!(cursor.is_at_end());
        assert!(cursor.seek_forward(17, "element end").is_err());
    }

    #[test]
    fn test_bounded_cursor_cannot_cross_boundary() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut cursor = ByteCursor::with_pos(&data, 2).unwrap();
        let mut inner = cursor.bounded(5);

        assert_eq!(inner.remaining(), 3);
        assert!(inner.u32_named("u32").is_err());
        assert_eq!(inner.take_bytes(3, "bytes").unwrap(), &[3, 4, 5]);

        // Bounding past the buffer end clamps to the buffer.
        assert_eq!(cursor.bounded(100).len(), 8);
        cursor.advance(6, "skip").unwrap();
        assert!(cursor.advance(1, "skip").is_err());
    }
}
