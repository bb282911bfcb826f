//! Binary Codec
//!
//! Compact encoding of primitives used to persist and transmit Things and
//! Actions. The format is framing-agnostic: callers decide how to
//! length-prefix or containerize the bytes.
//!
//! # Format
//!
//! - Integers are varints: 7 payload bits per byte, the high bit marks
//!   continuation. Negative values are sign-extended to 64 bits and take
//!   the full 10 bytes; there is no zig-zag step.
//! - Strings are a varint byte length followed by UTF-8.
//! - Booleans are a single `0`/`1` byte.
//! - Doubles travel as their IEEE-754 bit pattern through the long path.
//! - Bit packing stores up to 8 flags per byte, least significant bit
//!   first, padding unused trailing bits with 0.
//! - Lists and maps carry a count, then each element (optionally preceded
//!   by a presence flag).
//!
//! Decoding must read fields in the same order and with the same types as
//! they were written. Running out of bytes or meeting a malformed varint is
//! a [`CodecError`]; it signals corruption or misuse and is never turned
//! into a sync status.
//!
//! Writers and readers are single-pass and not meant to be shared between
//! threads.

mod error;
mod reader;
mod varint;
mod writer;

pub use error::CodecError;
pub use reader::ByteReader;
pub use varint::{encoded_len, MAX_VARINT_BYTES};
pub use writer::ByteWriter;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_fields_round_trip() {
        let mut writer = ByteWriter::new();
        writer.write_int(300);
        writer.write_string("héllo");
        writer.write_boolean(true);

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_int().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "héllo");
        assert!(reader.read_boolean().unwrap());
        assert!(reader.is_empty());
    }

    #[test]
    fn edge_values_round_trip() {
        let mut writer = ByteWriter::new();
        writer.write_int(0);
        writer.write_int(-1);
        writer.write_int(i32::MIN);
        writer.write_long(i64::MAX);
        writer.write_long(-42);
        writer.write_string("");
        writer.write_string("日本語 ✓ 🚀");
        writer.write_double(-0.5);
        writer.write_double(f64::MAX);
        writer.write_boolean(false);

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_int().unwrap(), 0);
        assert_eq!(reader.read_int().unwrap(), -1);
        assert_eq!(reader.read_int().unwrap(), i32::MIN);
        assert_eq!(reader.read_long().unwrap(), i64::MAX);
        assert_eq!(reader.read_long().unwrap(), -42);
        assert_eq!(reader.read_string().unwrap(), "");
        assert_eq!(reader.read_string().unwrap(), "日本語 ✓ 🚀");
        assert_eq!(reader.read_double().unwrap(), -0.5);
        assert_eq!(reader.read_double().unwrap(), f64::MAX);
        assert!(!reader.read_boolean().unwrap());
        assert!(reader.is_empty());
    }

    #[test]
    fn bits_interleave_with_bytes() {
        let mut writer = ByteWriter::new();
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);
        writer.write_int(7);
        writer.write_bit(true);
        writer.finish_byte();

        let bytes = writer.into_bytes();
        assert_eq!(bytes, vec![0b0000_0101, 7, 0b0000_0001]);

        let mut reader = ByteReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_int().unwrap(), 7);
        assert!(reader.read_bit().unwrap());
        reader.finish_byte();
        assert!(reader.is_empty());
    }

    #[test]
    fn bit_lists_round_trip() {
        let flags = [true, false, true, true, false];
        let mut writer = ByteWriter::new();
        writer.write_list(&flags, |writer, flag| writer.write_bit(*flag));

        let bytes = writer.into_bytes();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_list(|reader| reader.read_bit()).unwrap(), flags.to_vec());
    }

    #[test]
    fn oversized_counts_fail_fast() {
        let mut writer = ByteWriter::new();
        writer.write_long(i64::MAX);
        writer.write_bit(true);
        let bytes = writer.into_bytes();

        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            reader.read_list(|reader| reader.read_bit()),
            Err(CodecError::UnexpectedEof { context: "list" })
        );

        let mut reader = ByteReader::new(&bytes);
        assert!(reader.read_optional_list(|reader| reader.read_bit()).is_err());
        let mut reader = ByteReader::new(&bytes);
        assert!(reader.read_map(|reader| reader.read_bit(), |reader| reader.read_bit()).is_err());
    }
}
