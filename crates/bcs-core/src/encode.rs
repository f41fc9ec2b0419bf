//! Encoding: wire primitives and the recursive value walker.
//!
//! # Format
//!
//! - Booleans are one byte, `0x00` or `0x01`.
//! - Integers are little-endian at their declared width, or ULEB128 under
//!   the `compact` option.
//! - Strings and variable-length sequences carry a ULEB128 length prefix;
//!   fixed-length arrays do not.
//! - Map entries are sorted by the lexicographic order of their *encoded*
//!   key bytes, which is what makes the output canonical regardless of the
//!   container's iteration order.
//! - Optional values carry a one-byte presence flag; enums a ULEB128
//!   variant index.
//!
//! An [`Encoder`] writes to a borrowed byte sink and is sticky on failure:
//! after the first error every further operation is a no-op that returns the
//! stored error, so a batch of `encode` calls needs only one check at the
//! end. Top-level helpers such as [`to_bytes`](crate::to_bytes) build a
//! fresh engine per call.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::mem;
use std::sync::Arc;

use crate::cache::{FieldSpec, LocalTypeInfoCache, StructPlan};
use crate::enums::EnumVariant;
use crate::error::{Error, Result};
use crate::options::{ElemOptions, FieldOptions, IntWidth, TypeOptions};
use crate::registry;

/// Encoder construction options.
#[derive(Debug, Clone, Default)]
pub struct EncoderConfig {
    /// Treat every trait object as an enum: encoding an unregistered trait
    /// object becomes an unsupported-type error instead of falling back to
    /// transparent encoding of the concrete value.
    pub interface_is_enum_by_default: bool,
}

/// A value that can be written in the canonical binary form.
///
/// Implementations exist for the primitive wire kinds and the standard
/// containers; struct and enum impls are generated by
/// [`bcs_struct!`](crate::bcs_struct), [`bcs_struct_enum!`](crate::bcs_struct_enum),
/// and [`bcs_enum!`](crate::bcs_enum).
pub trait Encode: 'static {
    /// Writes `self` under the given value options.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds; see [`crate::ErrorKind`].
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()>;

    /// Type-level default options, merged under (and overridden by) any
    /// field tag.
    fn type_options() -> Option<TypeOptions>
    where
        Self: Sized,
    {
        None
    }

    /// Whether this value is absent. Drives the presence byte of `optional`
    /// fields; only nullable shapes (`Option`, trait objects with a
    /// sentinel) ever return `true`.
    fn is_null(&self) -> bool {
        false
    }

    /// Encodes the absent form of this type, for `None` in a non-optional
    /// position. The default has none and reports a null violation;
    /// registered trait objects override this with their sentinel variant.
    fn encode_null(e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()>
    where
        Self: Sized,
    {
        let _ = (e, opts);
        Err(Error::null("value is absent and the position is not optional"))
    }

    /// Fast-path hook: the raw little-endian bytes of a `&[Self]`, for
    /// element types whose encoding is the identity (`u8`).
    #[doc(hidden)]
    fn plain_bytes(items: &[Self]) -> Option<&[u8]>
    where
        Self: Sized,
    {
        let _ = items;
        None
    }
}

enum Sink<'w> {
    Stream(&'w mut dyn Write),
    Buffer(Vec<u8>),
}

/// The encoding engine.
///
/// Not safe for concurrent use; create one per operation or thread. All
/// `write_*` primitives and `encode*` operations share the sticky failure
/// state described in the module docs.
pub struct Encoder<'w> {
    out: Sink<'w>,
    cfg: EncoderConfig,
    cache: LocalTypeInfoCache,
    err: Option<Error>,
}

impl<'w> Encoder<'w> {
    /// Creates an encoder writing to `sink`.
    pub fn new(sink: &'w mut dyn Write) -> Self {
        Self::with_config(sink, EncoderConfig::default())
    }

    /// Creates an encoder with explicit configuration.
    pub fn with_config(sink: &'w mut dyn Write, cfg: EncoderConfig) -> Self {
        Self { out: Sink::Stream(sink), cfg, cache: LocalTypeInfoCache::default(), err: None }
    }

    /// The stored error, if this encoder has failed.
    #[must_use]
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Encodes a complete value.
    ///
    /// On failure the error is stored and every further operation on this
    /// encoder returns it unchanged.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds, annotated with the value's type name.
    pub fn encode<T: Encode>(&mut self, value: &T) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let res = self.encode_value(value);
        self.cache.save();
        res.map_err(|e| {
            let e = e.context(format!("encoding {}", std::any::type_name::<T>()));
            self.err.get_or_insert_with(|| e.clone());
            e
        })
    }

    /// Encodes a presence byte followed by the value when present.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn encode_optional<T: Encode>(&mut self, value: &Option<T>) -> Result<()> {
        match value {
            None => self.write_optional_flag(false),
            Some(inner) => {
                self.write_optional_flag(true)?;
                self.encode_value(inner)
            }
        }
    }

    /// Encodes a value with default options, dispatching through any
    /// registered custom encoder.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn encode_value<T: Encode>(&mut self, value: &T) -> Result<()> {
        self.encode_value_with(value, &TypeOptions::default())
    }

    /// Encodes a value under explicit options. Custom encoders take
    /// precedence; type-level defaults are merged beneath the given options.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn encode_value_with<T: Encode>(&mut self, value: &T, opts: &TypeOptions) -> Result<()> {
        let info = self.cache.type_info(TypeId::of::<T>());
        if info.has_custom_encoder {
            if let Some(f) = registry::custom_encoder(TypeId::of::<T>()) {
                return f(self, value as &dyn Any);
            }
        }
        match T::type_options() {
            Some(base) => value.encode_with(self, &base.overridden_by(opts)),
            None => value.encode_with(self, opts),
        }
    }

    /// Encodes one struct field, honoring the field-position options:
    /// `skip`, the `optional` presence byte, and `bytearr` framing.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn encode_field<T: Encode>(&mut self, value: &T, fo: &FieldOptions) -> Result<()> {
        if fo.skip {
            return Ok(());
        }
        if fo.optional {
            let present = !value.is_null();
            self.write_optional_flag(present)?;
            if !present {
                return Ok(());
            }
        }
        if fo.as_byte_array {
            self.encode_as_byte_array(|e| e.encode_value_with(value, &fo.opts))
        } else {
            self.encode_value_with(value, &fo.opts)
        }
    }

    /// Runs `f` against a temporary buffer and emits its output as a
    /// length-prefixed opaque byte string.
    ///
    /// # Errors
    ///
    /// Any error reported by `f`, or a sink failure.
    pub fn encode_as_byte_array(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let bytes = self.capture(f)?;
        self.write_len(bytes.len())?;
        self.write_bytes(&bytes)
    }

    /// Dispatches a trait-object value: registered enums get index +
    /// payload, unregistered traits fall back to transparent encoding of
    /// the concrete value (unless configured enum-by-default).
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn encode_trait_object(
        &mut self,
        enum_type: TypeId,
        trait_name: &'static str,
        value: Option<&dyn EnumVariant>,
        opts: &TypeOptions,
    ) -> Result<()> {
        if opts.not_enum {
            return match value {
                Some(v) => v.encode_erased(self),
                None => Err(Error::null(format!("null {trait_name} value outside enum dispatch"))),
            };
        }

        let Some(def) = registry::enum_def(enum_type) else {
            if self.cfg.interface_is_enum_by_default {
                return Err(Error::unsupported(format!(
                    "trait {trait_name} is not registered as an enum"
                )));
            }
            return match value {
                Some(v) => v.encode_erased(self),
                None => Err(Error::null(format!(
                    "cannot encode null {trait_name} value: no enum registration"
                ))),
            };
        };

        match value {
            None => {
                let idx = def.sentinel.ok_or_else(|| {
                    Error::null(format!("enum {} has no null variant registered", def.name))
                })?;
                self.write_enum_index(idx as u64)
            }
            Some(v) => {
                let any: &dyn Any = v;
                let idx = def.index_of(any.type_id()).ok_or_else(|| {
                    Error::unsupported(format!(
                        "concrete type is not a registered variant of enum {}",
                        def.name
                    ))
                })?;
                self.write_enum_index(idx as u64)?;
                match def.variants[idx].encode_fn() {
                    Some(f) => f(self, any).map_err(|e| e.context(def.variants[idx].name())),
                    None => Ok(()),
                }
            }
        }
    }

    /// Returns the memoized field plan for a generated struct codec.
    ///
    /// # Errors
    ///
    /// Configuration error if a field tag fails to parse.
    pub fn struct_plan(
        &mut self,
        id: TypeId,
        type_name: &'static str,
        fields: &'static [FieldSpec],
    ) -> Result<Arc<StructPlan>> {
        self.cache.struct_plan(id, type_name, fields)
    }

    /// Writes raw bytes to the sink.
    ///
    /// # Errors
    ///
    /// The stored error if the encoder has already failed, or the sink's
    /// error (which becomes the stored error).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        match &mut self.out {
            Sink::Buffer(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Sink::Stream(w) => match w.write_all(bytes) {
                Ok(()) => Ok(()),
                Err(e) => {
                    let err = Error::from(e);
                    self.err = Some(err.clone());
                    Err(err)
                }
            },
        }
    }

    /// Writes a boolean as `0x00`/`0x01`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(u8::from(v))
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    /// Writes a signed byte.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_bytes(&[v as u8])
    }

    /// Writes a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes a little-endian `i16`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes a little-endian `i32`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes a little-endian `i64`.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Writes a ULEB128 varint using the minimum number of bytes.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_uleb128(&mut self, mut v: u64) -> Result<()> {
        let mut buf = [0u8; 10];
        let mut n = 0;
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                buf[n] = byte;
                n += 1;
                break;
            }
            buf[n] = byte | 0x80;
            n += 1;
        }
        self.write_bytes(&buf[..n])
    }

    /// Writes a sequence or map length prefix.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        self.write_uleb128(len as u64)
    }

    /// Writes an enum variant index.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_enum_index(&mut self, idx: u64) -> Result<()> {
        self.write_uleb128(idx)
    }

    /// Writes an optional-value presence flag.
    ///
    /// # Errors
    ///
    /// Sink failure.
    pub fn write_optional_flag(&mut self, present: bool) -> Result<()> {
        self.write_u8(u8::from(present))
    }

    fn write_unsigned_as(&mut self, v: u64, width: IntWidth) -> Result<()> {
        let fit = |_| Error::out_of_range(format!("value {v} does not fit in {} byte(s)", width.bytes()));
        match width {
            IntWidth::B1 => self.write_u8(u8::try_from(v).map_err(fit)?),
            IntWidth::B2 => self.write_u16(u16::try_from(v).map_err(fit)?),
            IntWidth::B4 => self.write_u32(u32::try_from(v).map_err(fit)?),
            IntWidth::B8 => self.write_u64(v),
        }
    }

    fn write_signed_as(&mut self, v: i64, width: IntWidth) -> Result<()> {
        let fit = |_| Error::out_of_range(format!("value {v} does not fit in {} byte(s)", width.bytes()));
        match width {
            IntWidth::B1 => self.write_i8(i8::try_from(v).map_err(fit)?),
            IntWidth::B2 => self.write_i16(i16::try_from(v).map_err(fit)?),
            IntWidth::B4 => self.write_i32(i32::try_from(v).map_err(fit)?),
            IntWidth::B8 => self.write_i64(v),
        }
    }

    /// Runs `f` with the sink temporarily swapped for an owned buffer and
    /// returns what it wrote. Used for map-key capture and `bytearr`
    /// framing; nests freely.
    fn capture(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<Vec<u8>> {
        let orig = mem::replace(&mut self.out, Sink::Buffer(Vec::new()));
        let res = f(self);
        match (mem::replace(&mut self.out, orig), res) {
            (Sink::Buffer(bytes), Ok(())) => Ok(bytes),
            (_, Err(e)) => Err(e),
            (Sink::Stream(_), Ok(())) => unreachable!("capture sink is always a buffer"),
        }
    }
}

impl std::fmt::Debug for Encoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder").field("err", &self.err).finish_non_exhaustive()
    }
}

impl Encode for bool {
    fn encode_with(&self, e: &mut Encoder<'_>, _opts: &TypeOptions) -> Result<()> {
        e.write_bool(*self)
    }
}

impl Encode for u8 {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        if opts.compact {
            return e.write_uleb128(u64::from(*self));
        }
        match opts.underlying_int {
            None => e.write_u8(*self),
            Some(w) => e.write_unsigned_as(u64::from(*self), w),
        }
    }

    fn plain_bytes(items: &[Self]) -> Option<&[u8]> {
        Some(items)
    }
}

macro_rules! impl_encode_unsigned {
    ($($ty:ty => $write:ident),* $(,)?) => {$(
        impl Encode for $ty {
            fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
                if opts.compact {
                    return e.write_uleb128(u64::from(*self));
                }
                match opts.underlying_int {
                    None => e.$write(*self),
                    Some(w) => e.write_unsigned_as(u64::from(*self), w),
                }
            }
        }
    )*};
}

impl_encode_unsigned! {
    u16 => write_u16,
    u32 => write_u32,
    u64 => write_u64,
}

macro_rules! impl_encode_signed {
    ($($ty:ty => $write:ident),* $(,)?) => {$(
        impl Encode for $ty {
            fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
                if opts.compact {
                    // Two's-complement cast: negative values take the full
                    // ten-byte varint, same as the wire format's other
                    // implementations.
                    return e.write_uleb128(i64::from(*self) as u64);
                }
                match opts.underlying_int {
                    None => e.$write(*self),
                    Some(w) => e.write_signed_as(i64::from(*self), w),
                }
            }
        }
    )*};
}

impl_encode_signed! {
    i8 => write_i8,
    i16 => write_i16,
    i32 => write_i32,
    i64 => write_i64,
}

impl Encode for String {
    fn encode_with(&self, e: &mut Encoder<'_>, _opts: &TypeOptions) -> Result<()> {
        e.write_len(self.len())?;
        e.write_bytes(self.as_bytes())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        opts.len_limit.check(self.len(), "sequence")?;
        e.write_len(self.len())?;
        encode_elements(e, self, opts.elem.as_deref())
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        encode_elements(e, self, opts.elem.as_deref())
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        encode_map_entries(e, self.len(), self.iter(), opts)
    }
}

impl<K: Encode, V: Encode> Encode for HashMap<K, V> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        encode_map_entries(e, self.len(), self.iter(), opts)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        match self {
            Some(v) => e.encode_value_with(v, opts),
            None => T::encode_null(e, opts),
        }
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }
}

impl<T: Encode> Encode for Box<T> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        e.encode_value_with(&**self, opts)
    }
}

impl<T: Encode> Encode for std::rc::Rc<T> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        e.encode_value_with(&**self, opts)
    }
}

impl<T: Encode> Encode for Arc<T> {
    fn encode_with(&self, e: &mut Encoder<'_>, opts: &TypeOptions) -> Result<()> {
        e.encode_value_with(&**self, opts)
    }
}

fn encode_elements<T: Encode>(
    e: &mut Encoder<'_>,
    items: &[T],
    elem: Option<&ElemOptions>,
) -> Result<()> {
    let default_elem = ElemOptions::default();
    let elem = elem.unwrap_or(&default_elem);

    if !elem.as_byte_array {
        let info = e.cache.type_info(TypeId::of::<T>());
        if !info.has_custom_encoder && T::type_options().is_none() {
            if let Some(bytes) = T::plain_bytes(items) {
                return e.write_bytes(bytes);
            }
        }
    }

    for (i, item) in items.iter().enumerate() {
        let res = if elem.as_byte_array {
            e.encode_as_byte_array(|e| e.encode_value_with(item, &elem.opts))
        } else {
            e.encode_value_with(item, &elem.opts)
        };
        res.map_err(|err| err.context(format!("[{i}]")))?;
    }
    Ok(())
}

fn encode_map_entries<'a, K: Encode + 'a, V: Encode + 'a>(
    e: &mut Encoder<'_>,
    len: usize,
    entries: impl Iterator<Item = (&'a K, &'a V)>,
    opts: &TypeOptions,
) -> Result<()> {
    opts.len_limit.check(len, "map")?;
    e.write_len(len)?;

    let key_opts = opts.key.as_deref().cloned().unwrap_or_default();
    let value_opts = opts.value.as_deref().cloned().unwrap_or_default();

    // Keys are pre-encoded so entries can be ordered by their wire form;
    // the in-memory container's iteration order is irrelevant.
    let mut encoded: Vec<(Vec<u8>, &V)> = Vec::with_capacity(len);
    for (k, v) in entries {
        let key_bytes = e
            .capture(|e| e.encode_value_with(k, &key_opts))
            .map_err(|err| err.context("key"))?;
        encoded.push((key_bytes, v));
    }
    encoded.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    for (key_bytes, v) in encoded {
        e.write_bytes(&key_bytes)?;
        e.encode_value_with(v, &value_opts).map_err(|err| err.context("value"))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encoded(f: impl FnOnce(&mut Encoder<'_>)) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        f(&mut e);
        assert!(e.err().is_none(), "{:?}", e.err());
        buf
    }

    #[test]
    fn uleb128_thresholds() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (16383, &[0xFF, 0x7F]),
            (16384, &[0x80, 0x80, 0x01]),
            (2_097_151, &[0xFF, 0xFF, 0x7F]),
            (2_097_152, &[0x80, 0x80, 0x80, 0x01]),
            (268_435_455, &[0xFF, 0xFF, 0xFF, 0x7F]),
            (268_435_456, &[0x80, 0x80, 0x80, 0x80, 0x01]),
            (u64::from(u32::MAX), &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
            (u64::MAX, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        ];
        for (value, expected) in cases {
            let bytes = encoded(|e| e.write_uleb128(*value).unwrap());
            assert_eq!(&bytes, expected, "value {value}");
        }
    }

    #[test]
    fn map_entries_sort_by_encoded_key_bytes() {
        let map: BTreeMap<i16, bool> = [(-3, true), (0, false), (3, true)].into();
        let bytes = encoded(|e| e.encode(&map).unwrap());
        // Little-endian keys order 0x0000 < 0x0003 < 0xFFFD, not numerically.
        assert_eq!(bytes, [0x03, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0xFD, 0xFF, 0x01]);
    }

    #[test]
    fn byte_sequences_take_the_raw_path() {
        let bytes = encoded(|e| e.encode(&vec![42u8, 43]).unwrap());
        assert_eq!(bytes, [0x02, 0x2A, 0x2B]);

        let bytes = encoded(|e| e.encode(&[42u8, 43, 44]).unwrap());
        assert_eq!(bytes, [0x2A, 0x2B, 0x2C]);
    }

    #[test]
    fn underlying_width_requires_lossless_fit() {
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        let opts = TypeOptions::parse("bytes=1").unwrap();
        assert!(e.encode_value_with(&200u32, &opts).is_ok());
        let err = e.encode_value_with(&300u32, &opts).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::OutOfRange);
    }

    #[test]
    fn failed_sink_makes_the_encoder_sticky() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("sink closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut sink = Broken;
        let mut e = Encoder::new(&mut sink);
        assert!(e.encode(&7u32).is_err());
        // Subsequent operations replay the stored error without touching
        // the sink.
        let err = e.encode(&true).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
        assert!(e.err().is_some());
    }

    #[test]
    fn nested_byte_array_framing() {
        let bytes = encoded(|e| {
            e.encode_as_byte_array(|e| e.encode_value(&vec![1u8, 2, 3])).unwrap();
        });
        // Outer length (4) wraps the inner encoding `03 01 02 03`.
        assert_eq!(bytes, [0x04, 0x03, 0x01, 0x02, 0x03]);
    }
}
