//! Encoding side of the codec.

use super::varint;

/// Accumulates encoded primitives into a byte buffer.
///
/// # Example
///
/// ```rust
/// use thingspace_core::codec::{ByteReader, ByteWriter};
///
/// let mut writer = ByteWriter::new();
/// writer.write_int(300);
/// writer.write_string("héllo");
///
/// let bytes = writer.into_bytes();
/// let mut reader = ByteReader::new(&bytes);
/// assert_eq!(reader.read_int().unwrap(), 300);
/// assert_eq!(reader.read_string().unwrap(), "héllo");
/// ```
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    /// Bits packed so far for the byte under construction.
    bits: u8,
    /// How many bits of `bits` are used (0..8).
    bit_count: u8,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of bytes written so far, not counting a partial bit byte.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.bit_count == 0
    }

    /// Finish any pending bit byte and return the encoded bytes.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.finish_byte();
        self.buf
    }

    /// Raw varint. Callers normally want [`write_long`](Self::write_long).
    pub fn write_varint(&mut self, value: u64) {
        self.finish_byte();
        varint::encode(value, &mut self.buf);
    }

    /// Writes a 32-bit int. Negative values are sign-extended.
    pub fn write_int(&mut self, value: i32) {
        self.write_varint(value as i64 as u64);
    }

    /// Writes a 64-bit long.
    pub fn write_long(&mut self, value: i64) {
        self.write_varint(value as u64);
    }

    /// Writes a double through its bit pattern.
    pub fn write_double(&mut self, value: f64) {
        self.write_long(value.to_bits() as i64);
    }

    pub fn write_boolean(&mut self, value: bool) {
        self.finish_byte();
        self.buf.push(value as u8);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.write_varint(value.len() as u64);
        self.buf.extend_from_slice(value);
    }

    /// Packs one flag into the current bit byte.
    ///
    /// After 8 flags the byte is emitted automatically.
    pub fn write_bit(&mut self, value: bool) {
        if value {
            self.bits |= 1 << self.bit_count;
        }
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.flush_bits();
        }
    }

    /// Emits a partially filled bit byte, zero-padded. No-op when no bits
    /// are pending.
    pub fn finish_byte(&mut self) {
        if self.bit_count > 0 {
            self.flush_bits();
        }
    }

    fn flush_bits(&mut self) {
        self.buf.push(self.bits);
        self.bits = 0;
        self.bit_count = 0;
    }

    /// Writes a count followed by each element.
    pub fn write_list<E, F>(&mut self, items: &[E], mut write: F)
    where
        F: FnMut(&mut Self, &E),
    {
        self.write_varint(items.len() as u64);
        for item in items {
            write(self, item);
        }
    }

    /// Writes a count followed by a presence flag and, when present, the
    /// element for each slot.
    pub fn write_optional_list<E, F>(&mut self, items: &[Option<E>], mut write: F)
    where
        F: FnMut(&mut Self, &E),
    {
        self.write_varint(items.len() as u64);
        for item in items {
            self.write_boolean(item.is_some());
            if let Some(item) = item {
                write(self, item);
            }
        }
    }

    /// Writes a count followed by `key, presence flag, value?` per entry.
    pub fn write_map<'a, K, V, I, FK, FV>(&mut self, entries: I, mut write_key: FK, mut write_value: FV)
    where
        K: 'a,
        V: 'a,
        I: IntoIterator<Item = (&'a K, &'a Option<V>)>,
        I::IntoIter: ExactSizeIterator,
        FK: FnMut(&mut Self, &K),
        FV: FnMut(&mut Self, &V),
    {
        let entries = entries.into_iter();
        self.write_varint(entries.len() as u64);
        for (key, value) in entries {
            write_key(self, key);
            self.write_boolean(value.is_some());
            if let Some(value) = value {
                write_value(self, value);
            }
        }
    }
}
