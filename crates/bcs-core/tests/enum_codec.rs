//! Trait-object enums, struct-enums, custom codecs, and init hooks.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Once;

use bcs_core::testing::{decode_err, encode_err, roundtrip_bytes};
use bcs_core::{
    from_bytes, registry, to_bytes, Encoder, EncoderConfig, EnumVariant, ErrorKind, Sentinel,
};

trait Shape: EnumVariant + Debug {}

#[derive(Debug, Clone, PartialEq, Default)]
struct Circle {
    radius: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Square {
    side: u32,
}

bcs_core::bcs_struct! { Circle { radius: "" } }
bcs_core::bcs_struct! { Square { side: "" } }

impl Shape for Circle {}
impl Shape for Square {}

bcs_core::bcs_enum! { Shape { Circle, Square, _ } }

// Has generated impls but is deliberately never registered.
trait Sketch: EnumVariant + Debug {}

#[derive(Debug, Clone, PartialEq, Default)]
struct Blob {
    id: u8,
}

bcs_core::bcs_struct! { Blob { id: "" } }

impl Sketch for Blob {}

bcs_core::bcs_enum! { Sketch { Blob } }

#[derive(Debug, Clone, PartialEq, Default)]
struct Timestamp {
    micros: u64,
}

// Default codec, overridden by the registered custom codec below.
bcs_core::bcs_struct! { Timestamp { micros: "" } }

#[derive(Debug, Clone, PartialEq, Default)]
struct Session {
    token: String,
    cached_len: u64,
}

bcs_core::bcs_struct! {
    Session {
        token: "",
        cached_len: skip,
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Grumpy {
    id: u8,
}

bcs_core::bcs_struct! { Grumpy { id: "" } }

fn setup() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        <dyn Shape>::register_bcs_enum().unwrap();
        registry::add_custom_encoder::<Timestamp>(|e, t| e.write_uleb128(t.micros)).unwrap();
        registry::add_custom_decoder::<Timestamp>(|d| {
            Ok(Timestamp { micros: d.read_uleb128()? })
        })
        .unwrap();
        registry::add_init_hook::<Session>(|s| {
            s.cached_len = s.token.len() as u64;
            Ok(())
        })
        .unwrap();
        registry::add_init_hook::<Grumpy>(|_| Err(bcs_core::Error::malformed("poisoned value")))
            .unwrap();
    });
}

#[test]
fn trait_objects_carry_their_variant_index() {
    setup();
    let circle: Box<dyn Shape> = Box::new(Circle { radius: 7 });
    let bytes = to_bytes(&circle).unwrap();
    assert_eq!(bytes, [0x00, 0x07, 0x00, 0x00, 0x00]);

    let decoded: Box<dyn Shape> = from_bytes(&bytes).unwrap();
    let any: &dyn Any = &*decoded;
    assert_eq!(any.downcast_ref::<Circle>(), Some(&Circle { radius: 7 }));

    let square: Box<dyn Shape> = Box::new(Square { side: 3 });
    let bytes = to_bytes(&square).unwrap();
    assert_eq!(bytes, [0x01, 0x03, 0x00, 0x00, 0x00]);
    let decoded: Box<dyn Shape> = from_bytes(&bytes).unwrap();
    let any: &dyn Any = &*decoded;
    assert_eq!(any.downcast_ref::<Square>(), Some(&Square { side: 3 }));
}

#[test]
fn null_trait_objects_use_the_sentinel_index() {
    setup();
    let none: Option<Box<dyn Shape>> = None;
    let bytes = to_bytes(&none).unwrap();
    assert_eq!(bytes, [0x02]);
    let decoded: Option<Box<dyn Shape>> = from_bytes(&bytes).unwrap();
    assert!(decoded.is_none());

    let some: Option<Box<dyn Shape>> = Some(Box::new(Circle { radius: 1 }));
    assert_eq!(to_bytes(&some).unwrap(), [0x00, 0x01, 0x00, 0x00, 0x00]);
}

#[test]
fn sentinel_into_required_position_is_a_null_violation() {
    setup();
    let err = decode_err::<Box<dyn Shape>>(&[0x02]);
    assert_eq!(err.kind(), ErrorKind::NullViolation);
}

#[test]
fn unknown_variant_index_is_malformed() {
    setup();
    let err = decode_err::<Box<dyn Shape>>(&[0x05]);
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn optional_field_framing_takes_precedence_over_the_sentinel() {
    setup();

    #[derive(Debug, Default)]
    struct Holder {
        shape: Option<Box<dyn Shape>>,
    }
    bcs_core::bcs_struct! { Holder { shape: "optional" } }

    let bytes = to_bytes(&Holder { shape: None }).unwrap();
    assert_eq!(bytes, [0x00]);
    let decoded: Holder = from_bytes(&bytes).unwrap();
    assert!(decoded.shape.is_none());

    let bytes = to_bytes(&Holder { shape: Some(Box::new(Square { side: 2 })) }).unwrap();
    assert_eq!(bytes, [0x01, 0x01, 0x02, 0x00, 0x00, 0x00]);
}

#[test]
fn unregistered_traits_encode_transparently() {
    setup();
    let blob: Box<dyn Sketch> = Box::new(Blob { id: 9 });
    // No variant index: just the concrete value.
    assert_eq!(to_bytes(&blob).unwrap(), [0x09]);

    // Decoding has no registry to consult.
    let err = decode_err::<Box<dyn Sketch>>(&[0x09]);
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);

    // Under enum-by-default, the transparent fallback is refused too.
    let mut buf = Vec::new();
    let mut e =
        Encoder::with_config(&mut buf, EncoderConfig { interface_is_enum_by_default: true });
    let err = e.encode(&blob).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
}

#[test]
fn not_enum_fields_bypass_dispatch() {
    setup();

    #[derive(Debug)]
    struct Outline {
        shape: Box<dyn Shape>,
    }
    bcs_core::bcs_struct! { Outline { shape: "not_enum" } }

    let outline = Outline { shape: Box::new(Circle { radius: 4 }) };
    // Payload only, no index byte.
    assert_eq!(to_bytes(&outline).unwrap(), [0x04, 0x00, 0x00, 0x00]);

    let err = decode_err::<Outline>(&[0x04, 0x00, 0x00, 0x00]);
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);
}

#[test]
fn duplicate_enum_registration_is_refused() {
    setup();
    let err = <dyn Shape>::register_bcs_enum().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[derive(Debug, PartialEq, Default)]
struct Event {
    created: Option<Circle>,
    removed: Option<Square>,
    ping: Option<Sentinel>,
}

bcs_core::bcs_struct_enum! { Event { created, removed, ping } }

#[test]
fn struct_enums_encode_the_active_slot() {
    setup();
    roundtrip_bytes(
        &Event { created: Some(Circle { radius: 5 }), ..Default::default() },
        &[0x00, 0x05, 0x00, 0x00, 0x00],
    );
    roundtrip_bytes(
        &Event { removed: Some(Square { side: 6 }), ..Default::default() },
        &[0x01, 0x06, 0x00, 0x00, 0x00],
    );
    roundtrip_bytes(&Event { ping: Some(Sentinel), ..Default::default() }, &[0x02]);
}

#[test]
fn struct_enums_require_exactly_one_active_slot() {
    setup();
    let err = encode_err(&Event::default());
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);

    let err = encode_err(&Event {
        created: Some(Circle { radius: 1 }),
        removed: Some(Square { side: 2 }),
        ..Default::default()
    });
    assert_eq!(err.kind(), ErrorKind::UnsupportedType);

    let err = decode_err::<Event>(&[0x07]);
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test]
fn custom_codecs_override_the_generated_walker() {
    setup();
    let ts = Timestamp { micros: 300 };
    // The generated codec would write eight little-endian bytes; the
    // registered one writes a varint.
    assert_eq!(to_bytes(&ts).unwrap(), [0xAC, 0x02]);
    assert_eq!(from_bytes::<Timestamp>(&[0xAC, 0x02]).unwrap(), ts);

    // Collections route every element through the override.
    let batch = vec![Timestamp { micros: 1 }, Timestamp { micros: 128 }];
    assert_eq!(to_bytes(&batch).unwrap(), [0x02, 0x01, 0x80, 0x01]);
    assert_eq!(from_bytes::<Vec<Timestamp>>(&[0x02, 0x01, 0x80, 0x01]).unwrap(), batch);
}

#[test]
fn init_hooks_run_after_decode() {
    setup();
    let session = Session { token: "abcd".to_owned(), cached_len: 0 };
    let bytes = to_bytes(&session).unwrap();
    let decoded: Session = from_bytes(&bytes).unwrap();
    assert_eq!(decoded.cached_len, 4);
}

#[test]
fn init_hook_errors_fail_the_decode() {
    setup();
    let bytes = to_bytes(&Grumpy { id: 1 }).unwrap();
    let err = decode_err::<Grumpy>(&bytes);
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[derive(Debug, PartialEq)]
struct Nonce(u64);

impl bcs_core::Encode for Nonce {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &bcs_core::TypeOptions) -> bcs_core::Result<()> {
        e.encode_value_with(&self.0, opts)
    }

    fn type_options() -> Option<bcs_core::TypeOptions> {
        Some(bcs_core::TypeOptions { compact: true, ..Default::default() })
    }
}

impl bcs_core::Decode for Nonce {
    fn decode_with(
        d: &mut bcs_core::Decoder<'_>,
        opts: &bcs_core::TypeOptions,
    ) -> bcs_core::Result<Self> {
        d.decode_value_with(opts).map(Nonce)
    }

    fn type_options() -> Option<bcs_core::TypeOptions> {
        Some(bcs_core::TypeOptions { compact: true, ..Default::default() })
    }
}

#[test]
fn type_level_options_apply_and_tags_override_them() {
    setup();
    // The type asks for compact encoding.
    assert_eq!(to_bytes(&Nonce(300)).unwrap(), [0xAC, 0x02]);
    assert_eq!(from_bytes::<Nonce>(&[0xAC, 0x02]).unwrap(), Nonce(300));

    // A field tag displaces the type-level default.
    #[derive(Debug, PartialEq)]
    struct Wrapper {
        nonce: Nonce,
    }
    bcs_core::bcs_struct! { Wrapper { nonce: "bytes=2" } }

    roundtrip_bytes(&Wrapper { nonce: Nonce(300) }, &[0x2C, 0x01]);
}
