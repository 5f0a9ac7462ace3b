// src/cursor.rs
//! Bounds-checked big-endian / BCD field reads over a raw section buffer.
//!
//! Every length driving a read here comes off the air, so nothing in this
//! module indexes a slice without checking the bound first.

/// A read would have run past the end of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    /// Bytes the read needed.
    pub wanted: usize,
    /// Bytes actually left.
    pub left: usize,
}

pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn need(&self, wanted: usize) -> Result<(), ShortRead> {
        let left = self.remaining();
        if wanted > left {
            Err(ShortRead { wanted, left })
        } else {
            Ok(())
        }
    }

    pub fn u8(&mut self) -> Result<u8, ShortRead> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn u16(&mut self) -> Result<u16, ShortRead> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    /// Takes the next `n` bytes as a sub-slice.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ShortRead> {
        self.need(n)?;
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), ShortRead> {
        self.need(n)?;
        self.pos += n;
        Ok(())
    }

    /// Reads a whole-byte BCD field of `nibbles` decimal digits
    /// (most significant nibble first). `nibbles` must be even.
    pub fn bcd(&mut self, nibbles: usize) -> Result<u32, ShortRead> {
        debug_assert!(nibbles % 2 == 0 && nibbles <= 8);
        let bytes = self.take(nibbles / 2)?;
        Ok(bcd_digits(bytes, nibbles))
    }
}

/// Decodes the first `nibbles` BCD digits of `bytes` into an integer.
///
/// Exists separately from [`Cursor::bcd`] for fields whose digit string
/// stops mid-byte (the 7-digit symbol rate shares its last byte with the
/// FEC nibble). `bytes` must hold at least `nibbles` nibbles.
pub fn bcd_digits(bytes: &[u8], nibbles: usize) -> u32 {
    debug_assert!(bytes.len() * 2 >= nibbles);
    let mut value = 0u32;
    for i in 0..nibbles {
        let byte = bytes[i / 2];
        let digit = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        value = value * 10 + u32::from(digit);
    }
    value
}
