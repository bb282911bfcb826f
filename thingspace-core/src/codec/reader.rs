//! Decoding side of the codec.

use indexmap::IndexMap;
use std::hash::Hash;

use super::error::CodecError;
use super::varint::MAX_VARINT_BYTES;

/// Reads primitives back out of bytes produced by a
/// [`ByteWriter`](super::ByteWriter).
///
/// Wraps a byte slice and tracks the current position. Every read is bounds
/// checked.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// The byte currently being consumed bit by bit.
    bits: u8,
    /// Next bit to read from `bits`; 8 means no byte is loaded.
    bit_pos: u8,
}

impl<'a> ByteReader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bits: 0,
            bit_pos: 8,
        }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    fn next_byte(&mut self, context: &'static str) -> Result<u8, CodecError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEof { context })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Reads an unsigned varint.
    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        self.finish_byte();
        let mut result: u64 = 0;
        let mut shift = 0u32;

        for _ in 0..MAX_VARINT_BYTES {
            let byte = self.next_byte("varint")?;
            let value = (byte & 0x7F) as u64;

            if shift == 63 && value > 1 {
                return Err(CodecError::VarintOverflow);
            }
            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }

        Err(CodecError::VarintTooLong)
    }

    pub fn read_int(&mut self) -> Result<i32, CodecError> {
        let value = self.read_long()?;
        i32::try_from(value).map_err(|_| CodecError::IntOutOfRange { value })
    }

    pub fn read_long(&mut self) -> Result<i64, CodecError> {
        Ok(self.read_varint()? as i64)
    }

    pub fn read_double(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_bits(self.read_long()? as u64))
    }

    pub fn read_boolean(&mut self) -> Result<bool, CodecError> {
        self.finish_byte();
        match self.next_byte("boolean")? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(CodecError::InvalidBoolean { byte }),
        }
    }

    /// Reads a length-prefixed byte array, borrowing from the input.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_length("bytes")?;
        if len > self.remaining_len() {
            return Err(CodecError::UnexpectedEof { context: "bytes" });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { context: "string" })
    }

    /// Reads the next packed flag, loading a new byte when needed.
    pub fn read_bit(&mut self) -> Result<bool, CodecError> {
        if self.bit_pos >= 8 {
            self.bits = self.next_byte("bit")?;
            self.bit_pos = 0;
        }
        let bit = (self.bits >> self.bit_pos) & 1 == 1;
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Discards the unread bits of the current bit byte.
    pub fn finish_byte(&mut self) {
        self.bit_pos = 8;
        self.bits = 0;
    }

    fn read_length(&mut self, context: &'static str) -> Result<usize, CodecError> {
        let len = self.read_long()?;
        usize::try_from(len).map_err(|_| CodecError::NegativeLength { context, len })
    }

    /// Reads a list written by [`ByteWriter::write_list`](super::ByteWriter::write_list).
    pub fn read_list<E, F>(&mut self, mut read: F) -> Result<Vec<E>, CodecError>
    where
        F: FnMut(&mut Self) -> Result<E, CodecError>,
    {
        let count = self.read_length("list")?;
        // Elements take at least a bit each.
        if count > self.remaining_len().saturating_mul(8) {
            return Err(CodecError::UnexpectedEof { context: "list" });
        }
        let mut items = Vec::with_capacity(count.min(self.remaining_len()));
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    /// Reads a list written by
    /// [`ByteWriter::write_optional_list`](super::ByteWriter::write_optional_list).
    pub fn read_optional_list<E, F>(&mut self, mut read: F) -> Result<Vec<Option<E>>, CodecError>
    where
        F: FnMut(&mut Self) -> Result<E, CodecError>,
    {
        let count = self.read_length("list")?;
        if count > self.remaining_len() {
            return Err(CodecError::UnexpectedEof { context: "list" });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let item = if self.read_boolean()? {
                Some(read(self)?)
            } else {
                None
            };
            items.push(item);
        }
        Ok(items)
    }

    /// Reads a map written by [`ByteWriter::write_map`](super::ByteWriter::write_map).
    pub fn read_map<K, V, FK, FV>(
        &mut self,
        mut read_key: FK,
        mut read_value: FV,
    ) -> Result<IndexMap<K, Option<V>>, CodecError>
    where
        K: Hash + Eq,
        FK: FnMut(&mut Self) -> Result<K, CodecError>,
        FV: FnMut(&mut Self) -> Result<V, CodecError>,
    {
        let count = self.read_length("map")?;
        if count > self.remaining_len() {
            return Err(CodecError::UnexpectedEof { context: "map" });
        }
        let mut map = IndexMap::with_capacity(count);
        for _ in 0..count {
            let key = read_key(self)?;
            let value = if self.read_boolean()? {
                Some(read_value(self)?)
            } else {
                None
            };
            map.insert(key, value);
        }
        Ok(map)
    }
}
