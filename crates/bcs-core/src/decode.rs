//! Decoding: bounded reads and the mirror of the encoding walker.
//!
//! The decoder consumes a borrowed byte source. Reads are bounded: no
//! allocation is ever sized directly by an untrusted length prefix.
//! [`Decoder::read_n`] grows its buffer in chunks of at most
//! [`MAX_READ_BUFFER`] bytes, so a hostile prefix claiming 10^11 elements
//! fails with end-of-input as soon as the source dries up, long before any
//! proportional allocation happens.
//!
//! Failure is sticky per engine, exactly as on the encoding side.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::io::{Cursor, Read};
use std::mem;
use std::sync::Arc;

use crate::cache::{FieldSpec, LocalTypeInfoCache, StructPlan};
use crate::error::{Error, Result};
use crate::options::{ElemOptions, FieldOptions, IntWidth, TypeOptions};
use crate::registry;

/// Ceiling on any single read-buffer allocation.
///
/// Larger reads are satisfied incrementally so the source is proven to hold
/// the bytes before more memory is committed.
pub const MAX_READ_BUFFER: usize = 64 * 1024;

/// A value that can be reconstructed from its canonical binary form.
pub trait Decode: Sized + 'static {
    /// Reads a value under the given value options.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds; see [`crate::ErrorKind`].
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self>;

    /// Type-level default options, merged under (and overridden by) any
    /// field tag.
    fn type_options() -> Option<TypeOptions> {
        None
    }

    /// The value an `optional` field takes when absent from the wire.
    /// Defaults to a null-violation error; nullable shapes override it.
    fn absent() -> Result<Self> {
        Err(Error::null("absent value in a non-nullable position"))
    }

    /// Reads a value that may be the registered null form. The default
    /// never is; registered trait objects override this to map their
    /// sentinel variant to `None`.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    fn decode_nullable(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Option<Self>> {
        d.decode_value_with(opts).map(Some)
    }

    /// Fast-path marker for element types whose encoding is the identity.
    #[doc(hidden)]
    const PLAIN_BYTES: bool = false;

    /// Fast-path hook paired with [`Decode::PLAIN_BYTES`].
    #[doc(hidden)]
    fn from_plain_bytes(bytes: Vec<u8>) -> Option<Vec<Self>> {
        let _ = bytes;
        None
    }
}

enum Source<'r> {
    Stream(&'r mut dyn Read),
    Buffer(Cursor<Vec<u8>>),
}

/// The decoding engine.
///
/// Not safe for concurrent use; create one per operation or thread.
pub struct Decoder<'r> {
    source: Source<'r>,
    cache: LocalTypeInfoCache,
    err: Option<Error>,
}

impl<'r> Decoder<'r> {
    /// Creates a decoder reading from `source`.
    pub fn new(source: &'r mut dyn Read) -> Self {
        Self { source: Source::Stream(source), cache: LocalTypeInfoCache::default(), err: None }
    }

    /// The stored error, if this decoder has failed.
    #[must_use]
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Decodes a complete value.
    ///
    /// On failure the error is stored and every further operation on this
    /// decoder returns it unchanged.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds, annotated with the value's type name.
    pub fn decode<T: Decode>(&mut self) -> Result<T> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let res = self.decode_value();
        self.cache.save();
        res.map_err(|e| {
            let e = e.context(format!("decoding {}", std::any::type_name::<T>()));
            self.err.get_or_insert_with(|| e.clone());
            e
        })
    }

    /// Reads a presence byte and, when present, the value.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn decode_optional<T: Decode>(&mut self) -> Result<Option<T>> {
        if self.read_optional_flag()? {
            self.decode_value().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Decodes a value with default options, dispatching through any
    /// registered custom decoder and running init hooks.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn decode_value<T: Decode>(&mut self) -> Result<T> {
        self.decode_value_with(&TypeOptions::default())
    }

    /// Decodes a value under explicit options. Custom decoders take
    /// precedence; type-level defaults are merged beneath the given
    /// options; init hooks run after construction.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn decode_value_with<T: Decode>(&mut self, opts: &TypeOptions) -> Result<T> {
        let info = self.cache.type_info(TypeId::of::<T>());
        let custom = if info.has_custom_decoder {
            registry::custom_decoder(TypeId::of::<T>())
        } else {
            None
        };
        let mut value: T = match custom {
            Some(f) => match f(self)?.downcast::<T>() {
                Ok(v) => *v,
                Err(_) => return Err(Error::config("custom decoder produced a different type")),
            },
            None => match T::type_options() {
                Some(base) => T::decode_with(self, &base.overridden_by(opts))?,
                None => T::decode_with(self, opts)?,
            },
        };
        if info.has_init_hook {
            if let Some(hook) = registry::init_hook(TypeId::of::<T>()) {
                hook(&mut value as &mut dyn Any)?;
            }
        }
        Ok(value)
    }

    /// Decodes one struct field, honoring the `optional` presence byte and
    /// `bytearr` framing. An absent optional field yields the type's null
    /// form.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn decode_field<T: Decode>(&mut self, fo: &FieldOptions) -> Result<T> {
        if fo.optional && !self.read_optional_flag()? {
            return T::absent();
        }
        if fo.as_byte_array {
            self.decode_byte_array_framed(|d| d.decode_value_with(&fo.opts))
        } else {
            self.decode_value_with(&fo.opts)
        }
    }

    /// Reads a length-prefixed opaque byte string and decodes the framed
    /// value from it. The frame must be consumed exactly.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds; leftover frame bytes are malformed
    /// input.
    pub fn decode_byte_array_framed<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let len = self.read_len()?;
        let blob = self.read_n(len)?;
        self.with_buffer(blob, f)
    }

    /// Reads a trait-object value: `None` for the sentinel variant,
    /// otherwise a box produced by the registered variant's decoder,
    /// wrapped as `Box<dyn Any>` holding the trait-object box.
    ///
    /// # Errors
    ///
    /// Any of the codec error kinds.
    pub fn decode_trait_object(
        &mut self,
        enum_type: TypeId,
        trait_name: &'static str,
        opts: &TypeOptions,
    ) -> Result<Option<Box<dyn Any>>> {
        if opts.not_enum {
            return Err(Error::unsupported(format!(
                "cannot decode {trait_name} without enum dispatch"
            )));
        }
        let Some(def) = registry::enum_def(enum_type) else {
            return Err(Error::unsupported(format!(
                "trait {trait_name} is not registered as an enum"
            )));
        };
        let raw = self.read_enum_index()?;
        let idx = usize::try_from(raw)
            .ok()
            .filter(|i| *i < def.variants.len())
            .ok_or_else(|| {
                Error::malformed(format!(
                    "variant index {raw} out of range for enum {}",
                    def.name
                ))
            })?;
        let variant = &def.variants[idx];
        match variant.decode_fn() {
            None => Ok(None),
            Some(f) => f(self).map(Some).map_err(|e| e.context(variant.name())),
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

    /// Fills `buf` exactly from the source.
    ///
    /// # Errors
    ///
    /// The stored error if the decoder has already failed, or the source's
    /// error (end-of-input included), which becomes the stored error.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let res = match &mut self.source {
            Source::Stream(r) => r.read_exact(buf),
            Source::Buffer(c) => c.read_exact(buf),
        };
        res.map_err(|e| {
            let err = Error::from(e);
            self.err = Some(err.clone());
            err
        })
    }

    /// Reads exactly `n` bytes, committing at most [`MAX_READ_BUFFER`]
    /// bytes of new buffer per step.
    ///
    /// # Errors
    ///
    /// End-of-input if the source holds fewer than `n` bytes.
    pub fn read_n(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n.min(MAX_READ_BUFFER));
        let mut remaining = n;
        while remaining > 0 {
            let chunk = remaining.min(MAX_READ_BUFFER);
            let start = buf.len();
            buf.resize(start + chunk, 0);
            self.read_bytes(&mut buf[start..])?;
            remaining -= chunk;
        }
        Ok(buf)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_bytes(&mut b)?;
        Ok(b[0])
    }

    /// Reads a signed byte.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Reads a boolean, accepting only `0x00` and `0x01`.
    ///
    /// # Errors
    ///
    /// Malformed input for any other byte.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::malformed(format!("invalid boolean byte {b:#04x}"))),
        }
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_bytes(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    /// Reads a little-endian `i16`.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_u16().map(|v| v as i16)
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_bytes(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    /// Reads a little-endian `i32`.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_u32().map(|v| v as i32)
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_bytes(&mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    /// Reads a little-endian `i64`.
    ///
    /// # Errors
    ///
    /// Source failure.
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_u64().map(|v| v as i64)
    }

    /// Reads a ULEB128 varint. Non-minimal encodings are accepted; more
    /// than ten bytes, or a tenth byte carrying bits beyond the 64th, are
    /// malformed.
    ///
    /// # Errors
    ///
    /// Malformed input on overflow; source failure otherwise.
    pub fn read_uleb128(&mut self) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let b = self.read_u8()?;
            if shift == 63 && (b & 0x7f) > 1 {
                return Err(Error::malformed("varint overflows 64 bits"));
            }
            result |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(Error::malformed("varint longer than 10 bytes"));
            }
        }
    }

    /// Reads a sequence or map length prefix.
    ///
    /// # Errors
    ///
    /// Malformed input if the length exceeds the address space.
    pub fn read_len(&mut self) -> Result<usize> {
        let raw = self.read_uleb128()?;
        usize::try_from(raw)
            .map_err(|_| Error::malformed(format!("length prefix {raw} exceeds address space")))
    }

    /// Reads an enum variant index.
    ///
    /// # Errors
    ///
    /// Source failure or varint overflow.
    pub fn read_enum_index(&mut self) -> Result<u64> {
        self.read_uleb128()
    }

    /// Reads an optional-value presence flag, accepting only `0x00` and
    /// `0x01`.
    ///
    /// # Errors
    ///
    /// Malformed input for any other byte.
    pub fn read_optional_flag(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::malformed(format!("invalid optional flag byte {b:#04x}"))),
        }
    }

    fn read_unsigned_width(&mut self, width: IntWidth) -> Result<u64> {
        match width {
            IntWidth::B1 => self.read_u8().map(u64::from),
            IntWidth::B2 => self.read_u16().map(u64::from),
            IntWidth::B4 => self.read_u32().map(u64::from),
            IntWidth::B8 => self.read_u64(),
        }
    }

    fn read_signed_width(&mut self, width: IntWidth) -> Result<i64> {
        match width {
            IntWidth::B1 => self.read_i8().map(i64::from),
            IntWidth::B2 => self.read_i16().map(i64::from),
            IntWidth::B4 => self.read_i32().map(i64::from),
            IntWidth::B8 => self.read_i64(),
        }
    }

    /// Runs `f` with the source temporarily swapped for an owned buffer.
    /// The buffer must be consumed exactly.
    fn with_buffer<T>(&mut self, bytes: Vec<u8>, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let orig = mem::replace(&mut self.source, Source::Buffer(Cursor::new(bytes)));
        let res = f(self);
        match (mem::replace(&mut self.source, orig), res) {
            (Source::Buffer(c), Ok(v)) => {
                let len = c.get_ref().len() as u64;
                if c.position() < len {
                    return Err(Error::malformed(format!(
                        "{} unread byte(s) left in length-prefixed frame",
                        len - c.position()
                    )));
                }
                Ok(v)
            }
            (_, Err(e)) => Err(e),
            (Source::Stream(_), Ok(_)) => unreachable!("framed source is always a buffer"),
        }
    }
}

impl std::fmt::Debug for Decoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder").field("err", &self.err).finish_non_exhaustive()
    }
}

impl Decode for bool {
    fn decode_with(d: &mut Decoder<'_>, _opts: &TypeOptions) -> Result<Self> {
        d.read_bool()
    }
}

impl Decode for u8 {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        if opts.compact {
            let raw = d.read_uleb128()?;
            return u8::try_from(raw)
                .map_err(|_| Error::out_of_range(format!("compact value {raw} does not fit in u8")));
        }
        match opts.underlying_int {
            None => d.read_u8(),
            Some(w) => {
                let raw = d.read_unsigned_width(w)?;
                u8::try_from(raw).map_err(|_| {
                    Error::out_of_range(format!("decoded value {raw} does not fit in u8"))
                })
            }
        }
    }

    const PLAIN_BYTES: bool = true;

    fn from_plain_bytes(bytes: Vec<u8>) -> Option<Vec<Self>> {
        Some(bytes)
    }
}

macro_rules! impl_decode_unsigned {
    ($($ty:ty => $read:ident),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
                if opts.compact {
                    let raw = d.read_uleb128()?;
                    return <$ty>::try_from(raw).map_err(|_| Error::out_of_range(
                        format!("compact value {raw} does not fit in {}", stringify!($ty)),
                    ));
                }
                match opts.underlying_int {
                    None => d.$read(),
                    Some(w) => {
                        let raw = d.read_unsigned_width(w)?;
                        <$ty>::try_from(raw).map_err(|_| Error::out_of_range(
                            format!("decoded value {raw} does not fit in {}", stringify!($ty)),
                        ))
                    }
                }
            }
        }
    )*};
}

impl_decode_unsigned! {
    u16 => read_u16,
    u32 => read_u32,
    u64 => read_u64,
}

macro_rules! impl_decode_signed {
    ($($ty:ty => $read:ident),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
                if opts.compact {
                    let raw = d.read_uleb128()? as i64;
                    return <$ty>::try_from(raw).map_err(|_| Error::out_of_range(
                        format!("compact value {raw} does not fit in {}", stringify!($ty)),
                    ));
                }
                match opts.underlying_int {
                    None => d.$read(),
                    Some(w) => {
                        let raw = d.read_signed_width(w)?;
                        <$ty>::try_from(raw).map_err(|_| Error::out_of_range(
                            format!("decoded value {raw} does not fit in {}", stringify!($ty)),
                        ))
                    }
                }
            }
        }
    )*};
}

impl_decode_signed! {
    i8 => read_i8,
    i16 => read_i16,
    i32 => read_i32,
    i64 => read_i64,
}

impl Decode for String {
    fn decode_with(d: &mut Decoder<'_>, _opts: &TypeOptions) -> Result<Self> {
        let len = d.read_len()?;
        let bytes = d.read_n(len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::malformed(format!("invalid UTF-8 in string: {e}")))
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        let len = d.read_len()?;
        opts.len_limit.check(len, "sequence")?;
        decode_elements(d, len, opts.elem.as_deref())
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        let v: Vec<T> = decode_elements(d, N, opts.elem.as_deref())?;
        Self::try_from(v).map_err(|_| Error::malformed("fixed-size array length mismatch"))
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        let len = d.read_len()?;
        opts.len_limit.check(len, "map")?;
        let key_opts = opts.key.as_deref().cloned().unwrap_or_default();
        let value_opts = opts.value.as_deref().cloned().unwrap_or_default();
        let mut map = Self::new();
        for _ in 0..len {
            let k = d.decode_value_with(&key_opts).map_err(|e| e.context("key"))?;
            let v = d.decode_value_with(&value_opts).map_err(|e| e.context("value"))?;
            if map.insert(k, v).is_some() {
                return Err(Error::malformed("duplicate map key"));
            }
        }
        Ok(map)
    }
}

impl<K: Decode + Eq + Hash, V: Decode> Decode for HashMap<K, V> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        let len = d.read_len()?;
        opts.len_limit.check(len, "map")?;
        let key_opts = opts.key.as_deref().cloned().unwrap_or_default();
        let value_opts = opts.value.as_deref().cloned().unwrap_or_default();
        let mut map = Self::with_capacity(element_prealloc::<(K, V)>(len));
        for _ in 0..len {
            let k = d.decode_value_with(&key_opts).map_err(|e| e.context("key"))?;
            let v = d.decode_value_with(&value_opts).map_err(|e| e.context("value"))?;
            if map.insert(k, v).is_some() {
                return Err(Error::malformed("duplicate map key"));
            }
        }
        Ok(map)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        T::decode_nullable(d, opts)
    }

    fn absent() -> Result<Self> {
        Ok(None)
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        d.decode_value_with(opts).map(Box::new)
    }
}

impl<T: Decode> Decode for std::rc::Rc<T> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        d.decode_value_with(opts).map(Self::new)
    }
}

impl<T: Decode> Decode for Arc<T> {
    fn decode_with(d: &mut Decoder<'_>, opts: &TypeOptions) -> Result<Self> {
        d.decode_value_with(opts).map(Self::new)
    }
}

fn decode_elements<T: Decode>(
    d: &mut Decoder<'_>,
    len: usize,
    elem: Option<&ElemOptions>,
) -> Result<Vec<T>> {
    let default_elem = ElemOptions::default();
    let elem = elem.unwrap_or(&default_elem);

    if T::PLAIN_BYTES && !elem.as_byte_array {
        let info = d.cache.type_info(TypeId::of::<T>());
        if !info.has_custom_decoder && !info.has_init_hook && T::type_options().is_none() {
            let bytes = d.read_n(len)?;
            return T::from_plain_bytes(bytes)
                .ok_or_else(|| Error::unsupported("plain-byte element conversion failed"));
        }
    }

    let mut out = Vec::with_capacity(element_prealloc::<T>(len));
    for i in 0..len {
        let item = if elem.as_byte_array {
            d.decode_byte_array_framed(|d| d.decode_value_with(&elem.opts))
        } else {
            d.decode_value_with(&elem.opts)
        };
        out.push(item.map_err(|e| e.context(format!("[{i}]")))?);
    }
    Ok(out)
}

/// Initial capacity for element containers: proportional to the claimed
/// length but capped by the read-buffer ceiling, so a lying prefix cannot
/// commit memory ahead of the data.
fn element_prealloc<T>(len: usize) -> usize {
    len.min(MAX_READ_BUFFER / mem::size_of::<T>().max(1))
}
