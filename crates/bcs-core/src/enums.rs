//! Trait-object enums: the pieces that let a `Box<dyn Trait>` travel the
//! wire as a ULEB128 variant index followed by the variant's payload.
//!
//! A trait becomes an enum by declaring [`EnumVariant`] as a supertrait and
//! registering an ordered variant list with [`bcs_enum!`](crate::bcs_enum).
//! The position of a variant in that list is its index on the wire, so the
//! list is part of the wire contract: reordering it is a format break.
//!
//! A [`Sentinel`] slot (written `_` in the macro) reserves an index for the
//! null value, letting `Option<Box<dyn Trait>>` encode `None` without the
//! presence-byte framing.

use std::any::{Any, TypeId};

use crate::encode::Encoder;
use crate::error::Result;
use crate::{Decode, Encode};

/// Object-safe encoding surface required of traits registered as enums.
///
/// Blanket-implemented for every [`Encode`] type, so declaring it as a
/// supertrait (`trait Shape: EnumVariant`) costs implementors nothing. The
/// `Any` supertrait supplies the concrete type identity used for variant
/// lookup, and `encode_erased` is the transparent fallback used when a trait
/// is not registered as an enum.
pub trait EnumVariant: Any {
    /// Encodes the concrete value behind the trait object.
    fn encode_erased(&self, e: &mut Encoder<'_>) -> Result<()>;
}

impl<T: Encode> EnumVariant for T {
    fn encode_erased(&self, e: &mut Encoder<'_>) -> Result<()> {
        e.encode_value(self)
    }
}

/// The registered null variant.
///
/// Occupies an enum index with an empty payload. Also usable as a
/// struct-enum slot (`Option<Sentinel>`) for variants that carry no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sentinel;

impl Encode for Sentinel {
    fn encode_with(&self, _e: &mut Encoder<'_>, _opts: &crate::TypeOptions) -> Result<()> {
        Ok(())
    }
}

impl Decode for Sentinel {
    fn decode_with(_d: &mut crate::Decoder<'_>, _opts: &crate::TypeOptions) -> Result<Self> {
        Ok(Self)
    }
}

type VariantEncodeFn = fn(&mut Encoder<'_>, &dyn Any) -> Result<()>;
type VariantDecodeFn = fn(&mut crate::Decoder<'_>) -> Result<Box<dyn Any>>;

/// One entry of a registered enum's variant list.
///
/// Built by [`bcs_enum!`](crate::bcs_enum); the thunks close over the
/// concrete variant type and the trait object it boxes back into.
pub struct VariantDef {
    name: &'static str,
    type_id: Option<TypeId>,
    encode: Option<VariantEncodeFn>,
    decode: Option<VariantDecodeFn>,
}

impl VariantDef {
    /// A payload-carrying variant.
    #[must_use]
    pub fn new(
        name: &'static str,
        type_id: TypeId,
        encode: VariantEncodeFn,
        decode: VariantDecodeFn,
    ) -> Self {
        Self { name, type_id: Some(type_id), encode: Some(encode), decode: Some(decode) }
    }

    /// The null variant.
    #[must_use]
    pub fn sentinel() -> Self {
        Self { name: "<null>", type_id: None, encode: None, decode: None }
    }

    /// The variant's type name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub(crate) fn is_sentinel(&self) -> bool {
        self.type_id.is_none()
    }

    pub(crate) fn encode_fn(&self) -> Option<VariantEncodeFn> {
        self.encode
    }

    pub(crate) fn decode_fn(&self) -> Option<VariantDecodeFn> {
        self.decode
    }
}

impl std::fmt::Debug for VariantDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantDef").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A registered enum: the trait's name and its ordered variant list.
#[derive(Debug)]
pub(crate) struct EnumDef {
    pub(crate) name: &'static str,
    pub(crate) variants: Vec<VariantDef>,
    pub(crate) sentinel: Option<usize>,
}

impl EnumDef {
    /// Index of the variant with the given concrete type, if registered.
    pub(crate) fn index_of(&self, concrete: TypeId) -> Option<usize> {
        self.variants.iter().position(|v| v.type_id() == Some(concrete))
    }
}
