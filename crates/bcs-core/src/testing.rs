//! Codec assertion helpers for tests.
//!
//! These panic on failure, so they belong in `#[cfg(test)]` code and test
//! binaries; the library itself never calls them. [`roundtrip_hash`] exists
//! to pin an encoding: commit the hash alongside the type, and any change to
//! the wire output (an accidental format break) fails the test until it is
//! acknowledged by updating the pin.

use std::fmt::Debug;

use crate::{from_bytes, to_bytes, Decode, Encode, Error};

/// Asserts that `value` encodes, decodes back to an equal value, and
/// returns the encoding.
///
/// # Panics
///
/// If encoding or decoding fails, or the decoded value differs.
pub fn roundtrip<T: Encode + Decode + PartialEq + Debug>(value: &T) -> Vec<u8> {
    let encoded = match to_bytes(value) {
        Ok(b) => b,
        Err(e) => panic!("encoding {value:?} failed: {e}"),
    };
    let decoded: T = match from_bytes(&encoded) {
        Ok(v) => v,
        Err(e) => panic!("decoding {encoded:02x?} failed: {e}"),
    };
    assert_eq!(&decoded, value, "round-trip mismatch for {encoded:02x?}");
    encoded
}

/// Asserts a round-trip and that the encoding matches `expected` byte for
/// byte.
///
/// # Panics
///
/// On round-trip failure or an encoding mismatch.
pub fn roundtrip_bytes<T: Encode + Decode + PartialEq + Debug>(value: &T, expected: &[u8]) {
    let encoded = roundtrip(value);
    assert_eq!(encoded, expected, "encoding of {value:?} changed");
}

/// Asserts a round-trip and that the FNV-1a hash of the encoding matches
/// the pinned value. Run once with `0` to learn the hash, then commit it.
///
/// # Panics
///
/// On round-trip failure or a hash mismatch.
pub fn roundtrip_hash<T: Encode + Decode + PartialEq + Debug>(value: &T, expected: u64) {
    let encoded = roundtrip(value);
    let actual = fnv1a(&encoded);
    assert_eq!(
        actual, expected,
        "encoded bytes changed (hash {actual:#018x}) - review for a wire format break"
    );
}

/// Asserts that encoding fails and returns the error.
///
/// # Panics
///
/// If encoding succeeds.
pub fn encode_err<T: Encode + Debug>(value: &T) -> Error {
    match to_bytes(value) {
        Ok(b) => panic!("encoding {value:?} unexpectedly succeeded: {b:02x?}"),
        Err(e) => e,
    }
}

/// Asserts that decoding fails and returns the error.
///
/// # Panics
///
/// If decoding succeeds.
pub fn decode_err<T: Decode + Debug>(bytes: &[u8]) -> Error {
    match from_bytes::<T>(bytes) {
        Ok(v) => panic!("decoding {bytes:02x?} unexpectedly succeeded: {v:?}"),
        Err(e) => e,
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
