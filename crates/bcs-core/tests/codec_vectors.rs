//! Literal byte-vector acceptance tests for the wire format.

use std::collections::BTreeMap;

use bcs_core::testing::{decode_err, encode_err, roundtrip_bytes, roundtrip_hash};
use bcs_core::{from_bytes, to_bytes, Encoder, ErrorKind};

#[test]
fn sequences() {
    roundtrip_bytes(
        &vec![42i64, 43],
        &[0x02, 0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    );
    roundtrip_bytes(&vec![42i8, 43], &[0x02, 0x2A, 0x2B]);
    roundtrip_bytes(&vec![42u8, 43], &[0x02, 0x2A, 0x2B]);
    roundtrip_bytes(&Vec::<i8>::new(), &[0x00]);
    roundtrip_bytes(&Vec::<i64>::new(), &[0x00]);

    roundtrip_bytes(
        &vec![Box::new(1i16), Box::new(2), Box::new(3)],
        &[0x03, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00],
    );
    roundtrip_bytes(&vec![Box::new(42u8), Box::new(43)], &[0x02, 0x2A, 0x2B]);
}

#[test]
fn fixed_arrays() {
    roundtrip_bytes(
        &[42i64, 43, 44],
        &[
            0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2B, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ],
    );
    roundtrip_bytes(&[42u8, 43, 44], &[0x2A, 0x2B, 0x2C]);
}

#[test]
fn strings_and_nesting() {
    roundtrip_bytes(&String::new(), &[0x00]);
    roundtrip_bytes(
        &vec!["aaa".to_owned(), "bbb".to_owned()],
        &[0x02, 0x03, 0x61, 0x61, 0x61, 0x03, 0x62, 0x62, 0x62],
    );
    roundtrip_bytes(
        &vec![vec![1i16, 2], vec![3, 4, 5]],
        &[0x02, 0x02, 0x01, 0x00, 0x02, 0x00, 0x03, 0x03, 0x00, 0x04, 0x00, 0x05, 0x00],
    );
}

#[test]
fn signed_key_maps_sort_by_encoded_bytes() {
    let expected = [0x03, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0xFD, 0xFF, 0x01];
    let a: BTreeMap<i16, bool> = [(-3, true), (0, false), (3, true)].into();
    let b: BTreeMap<i16, bool> = [(3, true), (0, false), (-3, true)].into();
    roundtrip_bytes(&a, &expected);
    roundtrip_bytes(&b, &expected);
    roundtrip_bytes(&BTreeMap::<i16, bool>::new(), &[0x00]);
}

#[test]
fn unsigned_key_maps() {
    let expected = [0x03, 0x01, 0x00, 0x00, 0x02, 0x00, 0x01, 0x03, 0x00, 0x01];
    let a: BTreeMap<u16, bool> = [(3, true), (1, false), (2, true)].into();
    let b: BTreeMap<u16, bool> = [(2, true), (1, false), (3, true)].into();
    roundtrip_bytes(&a, &expected);
    roundtrip_bytes(&b, &expected);
}

#[test]
fn string_key_maps() {
    let expected = [
        0x03, 0x02, 0x61, 0x61, 0x00, 0x02, 0x62, 0x62, 0x01, 0x02, 0x63, 0x63, 0x01,
    ];
    let map: BTreeMap<String, bool> =
        [("cc".to_owned(), true), ("aa".to_owned(), false), ("bb".to_owned(), true)].into();
    roundtrip_bytes(&map, &expected);
}

#[test]
fn nested_maps() {
    let inner1: BTreeMap<i16, bool> = [(2, true), (3, false)].into();
    let inner2: BTreeMap<i16, bool> = [(1, true)].into();
    let map: BTreeMap<i16, BTreeMap<i16, bool>> = [(1, inner1), (2, inner2)].into();
    roundtrip_bytes(
        &map,
        &[
            0x02, 0x01, 0x00, 0x02, 0x02, 0x00, 0x01, 0x03, 0x00, 0x00, 0x02, 0x00, 0x01, 0x01,
            0x00, 0x01,
        ],
    );
}

#[test]
fn hostile_length_prefix_on_element_sequence() {
    let mut bytes = Vec::new();
    let mut e = Encoder::new(&mut bytes);
    e.write_len(100_000_000_000).unwrap();
    e.encode_value(&"hello".to_owned()).unwrap();
    e.encode_value(&"world".to_owned()).unwrap();

    let err = decode_err::<Vec<String>>(&bytes);
    assert!(err.is_eof(), "{err}");
}

#[test]
fn hostile_length_prefix_on_byte_sequence() {
    let mut bytes = Vec::new();
    let mut e = Encoder::new(&mut bytes);
    e.write_len(1000 * 1024 * 1024 * 1024).unwrap();
    e.write_bytes(&[1, 2, 3]).unwrap();

    let err = decode_err::<Vec<u8>>(&bytes);
    assert!(err.is_eof(), "{err}");
}

#[derive(Debug, PartialEq, Default)]
struct Packet {
    version: u32,
    window: u16,
    body: Vec<u8>,
    checksum: Option<u64>,
    blob: Vec<u16>,
    scratch: u8,
}

bcs_core::bcs_struct! {
    Packet {
        version: "bytes=1",
        window: "compact",
        body: "len=2",
        checksum: "optional",
        blob: "bytearr",
        scratch: skip,
    }
}

#[test]
fn struct_field_options() {
    let packet = Packet {
        version: 7,
        window: 300,
        body: vec![1, 2],
        checksum: None,
        blob: vec![0x0102],
        scratch: 0,
    };
    // version as one byte; window as ULEB128; body length-prefixed raw
    // bytes; absent checksum flag; blob framed as an opaque byte string;
    // scratch absent.
    roundtrip_bytes(&packet, &[0x07, 0xAC, 0x02, 0x02, 0x01, 0x02, 0x00, 0x03, 0x01, 0x02, 0x01]);

    let present = Packet { checksum: Some(5), ..Default::default() };
    let bytes = to_bytes(&present).unwrap();
    assert_eq!(bytes, [0x00, 0x00, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00]);
}

#[test]
fn skipped_fields_stay_off_the_wire() {
    let noisy = Packet { scratch: 99, ..Default::default() };
    let quiet = Packet::default();
    assert_eq!(to_bytes(&noisy).unwrap(), to_bytes(&quiet).unwrap());

    let decoded: Packet = from_bytes(&to_bytes(&noisy).unwrap()).unwrap();
    assert_eq!(decoded.scratch, 0);
}

#[test]
fn width_option_requires_lossless_values() {
    let err = encode_err(&Packet { version: 300, ..Default::default() });
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
    assert!(err.to_string().contains("version"), "{err}");
}

#[test]
fn length_ceiling_is_enforced_on_encode() {
    let err = encode_err(&Packet { body: vec![0; 0x1_0000], ..Default::default() });
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn length_ceiling_is_enforced_on_decode() {
    let mut bytes = Vec::new();
    let mut e = Encoder::new(&mut bytes);
    e.write_u8(0).unwrap(); // version
    e.write_uleb128(0).unwrap(); // window
    e.write_len(0x1_0000).unwrap(); // body length beyond the len=2 ceiling
    e.write_bytes(&[0; 16]).unwrap();

    let err = decode_err::<Packet>(&bytes);
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn optional_framing_bytes() {
    #[derive(Debug, PartialEq, Default)]
    struct Note {
        text: Option<String>,
    }
    bcs_core::bcs_struct! { Note { text: "optional" } }

    roundtrip_bytes(&Note { text: None }, &[0x00]);
    roundtrip_bytes(&Note { text: Some("hi".to_owned()) }, &[0x01, 0x02, 0x68, 0x69]);

    // Flag bytes other than 0 and 1 are rejected.
    let err = decode_err::<Note>(&[0x07]);
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn missing_optional_tag_makes_none_an_error() {
    #[derive(Debug, PartialEq, Default)]
    struct Strict {
        text: Option<String>,
    }
    bcs_core::bcs_struct! { Strict { text: "" } }

    let err = encode_err(&Strict { text: None });
    assert_eq!(err.kind(), ErrorKind::NullViolation);
    // Present values encode transparently, with no flag byte.
    roundtrip_bytes(&Strict { text: Some("hi".to_owned()) }, &[0x02, 0x68, 0x69]);
}

#[test]
fn element_options_apply_per_element() {
    #[derive(Debug, PartialEq, Default)]
    struct Batch {
        seqs: Vec<u64>,
    }
    bcs_core::bcs_struct! { Batch { seqs: "elem[compact]" } }

    roundtrip_bytes(&Batch { seqs: vec![1, 128] }, &[0x02, 0x01, 0x80, 0x01]);
}

#[test]
fn map_options_apply_to_keys_and_values() {
    #[derive(Debug, PartialEq, Default)]
    struct Index {
        slots: BTreeMap<u64, u64>,
    }
    bcs_core::bcs_struct! { Index { slots: "key[bytes=1],value[compact]" } }

    let index = Index { slots: [(2u64, 300u64), (1, 1)].into() };
    roundtrip_bytes(&index, &[0x02, 0x01, 0x01, 0x02, 0xAC, 0x02]);
}

#[test]
fn pinned_encoding_hash() {
    let packet = Packet {
        version: 1,
        window: 77,
        body: vec![9, 9, 9],
        checksum: Some(0xDEAD),
        blob: vec![1, 2, 3],
        scratch: 0,
    };
    roundtrip_hash(&packet, 0x036c_ea0e_7ab9_8ca1);
}

#[test]
fn bad_tags_fail_at_first_use() {
    #[derive(Debug, PartialEq, Default)]
    struct Broken {
        x: u8,
    }
    bcs_core::bcs_struct! { Broken { x: "frobnicate" } }

    let err = encode_err(&Broken { x: 1 });
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let err = decode_err::<Broken>(&[0x00]);
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
