//! Binary canonical serialization.
//!
//! A deterministic, schema-driven codec for the BCS wire format used by
//! ledger systems: two independent encoders of the same value produce
//! byte-identical output, and any change in output is a compatibility break.
//! The format is not self-describing: decoding requires knowing the value's
//! shape ahead of time.
//!
//! # Wire format
//!
//! | Kind | Encoding |
//! |---|---|
//! | Boolean | one byte, `0x00` or `0x01`; anything else is rejected |
//! | Integer | little-endian at the declared width (8/16/32/64 bit) |
//! | Compact integer | ULEB128, under the `compact` option |
//! | String | ULEB128 byte length + UTF-8 bytes |
//! | Fixed array | elements back to back, no prefix |
//! | Sequence | ULEB128 length + elements |
//! | Map | ULEB128 length + entries sorted by *encoded* key bytes |
//! | Optional | `0x00`, or `0x01` + value |
//! | Enum | ULEB128 variant index + payload |
//!
//! # Example
//!
//! ```
//! use bcs_core::bcs_struct;
//!
//! #[derive(Debug, PartialEq)]
//! struct Account {
//!     balance: u64,
//!     nonce: u64,
//!     delegate: Option<String>,
//! }
//!
//! bcs_struct! {
//!     Account {
//!         balance: "",
//!         nonce: "compact",
//!         delegate: "optional",
//!     }
//! }
//!
//! let account = Account { balance: 16, nonce: 300, delegate: None };
//! let bytes = bcs_core::to_bytes(&account).unwrap();
//! assert_eq!(bytes, [16, 0, 0, 0, 0, 0, 0, 0, 0xAC, 0x02, 0x00]);
//! assert_eq!(bcs_core::from_bytes::<Account>(&bytes).unwrap(), account);
//! ```
//!
//! # Modules
//!
//! - [`encode`] / [`decode`]: the engines and the [`Encode`]/[`Decode`]
//!   traits
//! - [`options`]: per-field and per-type options, and their tag grammar
//! - [`registry`]: custom codecs, enum variant lists, init hooks
//! - [`enums`]: trait-object enum support
//! - [`testing`]: assertion helpers for downstream tests
//!
//! Struct, struct-enum, and trait-object codecs are generated by
//! [`bcs_struct!`], [`bcs_struct_enum!`], and [`bcs_enum!`].
//!
//! # Concurrency
//!
//! Engines are single-threaded; the registries and the type-info cache are
//! shared. Register everything during startup, call
//! [`registry::freeze`], then encode and decode from as many threads as
//! needed; each engine snapshots cache entries locally and flushes them
//! back when an operation completes.

#![forbid(unsafe_code)]

pub mod cache;
pub mod decode;
pub mod encode;
pub mod enums;
pub mod error;
mod macros;
pub mod options;
pub mod registry;
pub mod testing;


pub use cache::{FieldPlan, FieldSpec, StructPlan};
pub use decode::{Decode, Decoder, MAX_READ_BUFFER};
pub use encode::{Encode, Encoder, EncoderConfig};
pub use enums::{EnumVariant, Sentinel, VariantDef};
pub use error::{Error, ErrorKind, Result};
pub use options::{ElemOptions, FieldOptions, IntWidth, LenLimit, TypeOptions};

use std::io::{Read, Write};

/// Encodes a value to its canonical byte string.
///
/// # Errors
///
/// Any of the codec error kinds; see [`ErrorKind`].
pub fn to_bytes<T: Encode>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_writer(value, &mut buf)?;
    Ok(buf)
}

/// Encodes a value into a byte sink.
///
/// Output already written before a failure is not rewound; callers that
/// need atomicity should encode to memory first via [`to_bytes`].
///
/// # Errors
///
/// Any of the codec error kinds, including sink failures.
pub fn to_writer<T: Encode>(value: &T, sink: &mut impl Write) -> Result<()> {
    Encoder::new(sink).encode(value)
}

/// Decodes a value from a byte string, requiring every byte to be consumed.
///
/// # Errors
///
/// Any of the codec error kinds; trailing bytes are malformed input.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T> {
    let mut cursor = bytes;
    let mut decoder = Decoder::new(&mut cursor);
    let value = decoder.decode()?;
    if !cursor.is_empty() {
        return Err(Error::malformed(format!(
            "{} trailing byte(s) after value",
            cursor.len()
        )));
    }
    Ok(value)
}

/// Decodes a value from the front of a byte string into `dest` and returns
/// the number of bytes consumed. Trailing bytes are left for the caller.
///
/// # Errors
///
/// Any of the codec error kinds.
pub fn from_bytes_into<T: Decode>(bytes: &[u8], dest: &mut T) -> Result<usize> {
    let mut cursor = bytes;
    let mut decoder = Decoder::new(&mut cursor);
    *dest = decoder.decode()?;
    Ok(bytes.len() - cursor.len())
}

/// Decodes a value from a byte source. Bytes past the value are left
/// unread.
///
/// # Errors
///
/// Any of the codec error kinds, including source failures.
pub fn from_reader<T: Decode>(source: &mut impl Read) -> Result<T> {
    Decoder::new(source).decode()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trailing_bytes_are_rejected() {
        let err = from_bytes::<u16>(&[0x01, 0x00, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("trailing"), "{err}");
    }

    #[test]
    fn from_bytes_into_reports_consumed() {
        let mut dest = 0u16;
        let consumed = from_bytes_into(&[0x01, 0x00, 0xFF], &mut dest).unwrap();
        assert_eq!(dest, 1);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn from_reader_leaves_the_rest_of_the_stream() {
        let bytes = [0x2A, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        let mut cursor: &[u8] = &bytes;
        let value: u32 = from_reader(&mut cursor).unwrap();
        assert_eq!(value, 42);
        assert_eq!(cursor, [0xAA, 0xBB]);
    }

    #[test]
    fn explicit_optional_framing() {
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        e.encode_optional(&Some(42u8)).unwrap();
        e.encode_optional::<u8>(&None).unwrap();
        assert_eq!(buf, [0x01, 0x2A, 0x00]);

        let mut cursor: &[u8] = &buf;
        let mut d = Decoder::new(&mut cursor);
        assert_eq!(d.decode_optional::<u8>().unwrap(), Some(42));
        assert_eq!(d.decode_optional::<u8>().unwrap(), None);
    }

    #[test]
    fn bare_none_is_a_null_violation() {
        let err = to_bytes(&Option::<u32>::None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NullViolation);
        // Present values encode transparently, mirroring pointer stripping.
        assert_eq!(to_bytes(&Some(7u8)).unwrap(), [0x07]);
    }
}
