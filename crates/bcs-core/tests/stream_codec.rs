//! Streaming entry points and engine reuse.

use std::collections::BTreeMap;

use bcs_core::{from_reader, to_writer, Decoder, Encoder, ErrorKind};

#[derive(Debug, Clone, PartialEq, Default)]
struct Header {
    version: u16,
    flags: Vec<bool>,
}

bcs_core::bcs_struct! {
    Header {
        version: "",
        flags: "",
    }
}

#[test]
fn writer_and_reader_round_trip() {
    let header = Header { version: 3, flags: vec![true, false] };
    let mut buf = Vec::new();
    to_writer(&header, &mut buf).unwrap();
    assert_eq!(buf, [0x03, 0x00, 0x02, 0x01, 0x00]);

    let mut cursor: &[u8] = &buf;
    let decoded: Header = from_reader(&mut cursor).unwrap();
    assert_eq!(decoded, header);
    assert!(cursor.is_empty());
}

#[test]
fn one_engine_encodes_many_values_with_one_error_check() {
    let mut buf = Vec::new();
    let mut e = Encoder::new(&mut buf);
    e.encode(&1u8).unwrap();
    e.encode(&2u8).unwrap();
    e.encode(&3u8).unwrap();
    assert!(e.err().is_none());
    assert_eq!(buf, [1, 2, 3]);

    let mut cursor: &[u8] = &buf;
    let mut d = Decoder::new(&mut cursor);
    assert_eq!(d.decode::<u8>().unwrap(), 1);
    assert_eq!(d.decode::<u8>().unwrap(), 2);
    assert_eq!(d.decode::<u8>().unwrap(), 3);
}

#[test]
fn a_failed_decoder_replays_its_error() {
    let mut cursor: &[u8] = &[0x01];
    let mut d = Decoder::new(&mut cursor);
    let first = d.decode::<u32>().unwrap_err();
    assert!(first.is_eof());

    // The next operation does not touch the exhausted source; it replays
    // the stored error.
    let second = d.decode::<u8>().unwrap_err();
    assert_eq!(second.kind(), ErrorKind::Io);
    assert!(second.is_eof());
}

#[test]
fn concurrent_engines_share_the_type_plans() {
    let map: BTreeMap<String, u32> = [("a".to_owned(), 1), ("b".to_owned(), 2)].into();
    let expected = bcs_core::to_bytes(&Header { version: 9, flags: vec![] }).unwrap();
    let map_expected = bcs_core::to_bytes(&map).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let map = map.clone();
            let expected = expected.clone();
            let map_expected = map_expected.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let header = Header { version: 9, flags: vec![] };
                    assert_eq!(bcs_core::to_bytes(&header).unwrap(), expected);
                    assert_eq!(bcs_core::to_bytes(&map).unwrap(), map_expected);
                    let decoded: Header = bcs_core::from_bytes(&expected).unwrap();
                    assert_eq!(decoded, header);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
