//! Item macros generating `Encode`/`Decode` impls.
//!
//! These are the static counterpart of a reflective field walker: each
//! supported shape gets its codec emitted once, at compile time, while field
//! tags stay data (parsed on first use and memoized in the type-info cache).
//!
//! - [`bcs_struct!`](crate::bcs_struct): plain structs, fields in declared
//!   order with optional tag strings;
//! - [`bcs_struct_enum!`](crate::bcs_struct_enum): structs whose single
//!   non-null `Option` field selects the wire variant;
//! - [`bcs_enum!`](crate::bcs_enum): trait objects dispatched through the
//!   enum registry.

/// Generates `Encode` and `Decode` for a struct.
///
/// Fields are listed in declaration order, and that order *is* the wire layout.
/// Each field takes either a tag string (see [`FieldOptions`](crate::FieldOptions)
/// for the grammar; `""` for defaults) or the `skip` marker, which keeps the
/// field off the wire and fills it with `Default::default()` on decode.
///
/// ```
/// use bcs_core::bcs_struct;
///
/// #[derive(Debug, PartialEq, Default)]
/// struct Transfer {
///     amount: u64,
///     tags: Vec<String>,
///     memo: Option<String>,
/// }
///
/// bcs_struct! {
///     Transfer {
///         amount: "bytes=4",
///         tags: "",
///         memo: "optional",
///     }
/// }
///
/// let bytes = bcs_core::to_bytes(&Transfer {
///     amount: 7,
///     tags: vec![],
///     memo: None,
/// }).unwrap();
/// assert_eq!(bytes, [7, 0, 0, 0, 0x00, 0x00]);
/// ```
#[macro_export]
macro_rules! bcs_struct {
    ($ty:ident { $($field:ident : $spec:tt),* $(,)? }) => {
        impl $crate::Encode for $ty {
            fn encode_with(
                &self,
                e: &mut $crate::Encoder<'_>,
                _opts: &$crate::TypeOptions,
            ) -> $crate::Result<()> {
                const __FIELDS: &[$crate::FieldSpec] = &[$(
                    $crate::FieldSpec {
                        name: stringify!($field),
                        tag: $crate::__bcs_tag!($spec),
                        skip_marker: $crate::__bcs_skip_marker!($spec),
                    }
                ),*];
                let __plan = e.struct_plan(
                    ::core::any::TypeId::of::<$ty>(),
                    stringify!($ty),
                    __FIELDS,
                )?;
                let mut __i = 0usize;
                $(
                    $crate::__bcs_encode_field!(self, e, __plan, __i, $field, $spec);
                    __i += 1;
                )*
                let _ = __i;
                ::core::result::Result::Ok(())
            }
        }

        impl $crate::Decode for $ty {
            fn decode_with(
                d: &mut $crate::Decoder<'_>,
                _opts: &$crate::TypeOptions,
            ) -> $crate::Result<Self> {
                const __FIELDS: &[$crate::FieldSpec] = &[$(
                    $crate::FieldSpec {
                        name: stringify!($field),
                        tag: $crate::__bcs_tag!($spec),
                        skip_marker: $crate::__bcs_skip_marker!($spec),
                    }
                ),*];
                let __plan = d.struct_plan(
                    ::core::any::TypeId::of::<$ty>(),
                    stringify!($ty),
                    __FIELDS,
                )?;
                let mut __i = 0usize;
                let __value = $ty {
                    $($field: {
                        let __fo = __plan.field(__i);
                        __i += 1;
                        let _ = __fo;
                        $crate::__bcs_decode_field!(d, __fo, $field, $spec)
                    }),*
                };
                let _ = __i;
                ::core::result::Result::Ok(__value)
            }
        }
    };
}

/// Generates `Encode` and `Decode` for a struct-enum: a struct of `Option`
/// fields of which exactly one is `Some` at encode time. The active field's
/// ordinal is the wire variant index; a no-payload variant uses
/// [`Sentinel`](crate::Sentinel).
///
/// ```
/// use bcs_core::{bcs_struct_enum, Sentinel};
///
/// #[derive(Debug, PartialEq, Default)]
/// struct Event {
///     created: Option<u32>,
///     deleted: Option<u64>,
///     ping: Option<Sentinel>,
/// }
///
/// bcs_struct_enum! {
///     Event { created, deleted, ping }
/// }
///
/// let bytes = bcs_core::to_bytes(&Event {
///     deleted: Some(9),
///     ..Default::default()
/// }).unwrap();
/// assert_eq!(bytes, [0x01, 9, 0, 0, 0, 0, 0, 0, 0]);
/// ```
#[macro_export]
macro_rules! bcs_struct_enum {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::Encode for $ty {
            fn encode_with(
                &self,
                e: &mut $crate::Encoder<'_>,
                _opts: &$crate::TypeOptions,
            ) -> $crate::Result<()> {
                let mut __i: u64 = 0;
                let mut __active: ::core::option::Option<u64> = ::core::option::Option::None;
                $(
                    if !$crate::Encode::is_null(&self.$field) {
                        if __active.is_some() {
                            return ::core::result::Result::Err($crate::Error::unsupported(
                                concat!("more than one variant set in ", stringify!($ty)),
                            ));
                        }
                        __active = ::core::option::Option::Some(__i);
                    }
                    __i += 1;
                )*
                let _ = __i;
                let ::core::option::Option::Some(__idx) = __active else {
                    return ::core::result::Result::Err($crate::Error::unsupported(
                        concat!("no variant set in ", stringify!($ty)),
                    ));
                };
                e.write_enum_index(__idx)?;
                let mut __i: u64 = 0;
                $(
                    if __i == __idx {
                        if let ::core::option::Option::Some(__v) = &self.$field {
                            e.encode_value(__v)
                                .map_err(|__e| __e.context(stringify!($field)))?;
                        }
                    }
                    __i += 1;
                )*
                let _ = __i;
                ::core::result::Result::Ok(())
            }
        }

        impl $crate::Decode for $ty {
            fn decode_with(
                d: &mut $crate::Decoder<'_>,
                _opts: &$crate::TypeOptions,
            ) -> $crate::Result<Self> {
                let __idx = d.read_enum_index()?;
                let mut __i: u64 = 0;
                let __value = $ty {
                    $($field: {
                        let __this = __i;
                        __i += 1;
                        if __idx == __this {
                            ::core::option::Option::Some(
                                d.decode_value()
                                    .map_err(|__e| __e.context(stringify!($field)))?,
                            )
                        } else {
                            ::core::option::Option::None
                        }
                    }),*
                };
                if __idx >= __i {
                    return ::core::result::Result::Err($crate::Error::malformed(format!(
                        "variant index {} out of range for {}",
                        __idx,
                        stringify!($ty),
                    )));
                }
                ::core::result::Result::Ok(__value)
            }
        }
    };
}

/// Generates the wire-enum codec for a trait object and a
/// `<dyn Trait>::register_bcs_enum()` function that installs its ordered
/// variant list in the process-wide registry.
///
/// The trait must have [`EnumVariant`](crate::EnumVariant) as a supertrait
/// (satisfied automatically by every `Encode` type), and every variant must
/// implement the trait; both are checked at compile time. Variant order is
/// the wire contract; a `_` entry reserves an index for the null value so
/// `Option<Box<dyn Trait>>` can encode `None` without optional framing.
///
/// ```
/// use bcs_core::{bcs_enum, bcs_struct, EnumVariant};
///
/// trait Shape: EnumVariant + std::fmt::Debug {}
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Circle { radius: u32 }
/// #[derive(Debug, Default, PartialEq)]
/// struct Square { side: u32 }
///
/// impl Shape for Circle {}
/// impl Shape for Square {}
///
/// bcs_struct! { Circle { radius: "" } }
/// bcs_struct! { Square { side: "" } }
///
/// bcs_enum! { Shape { Circle, Square, _ } }
///
/// <dyn Shape>::register_bcs_enum().unwrap();
/// let shape: Box<dyn Shape> = Box::new(Square { side: 3 });
/// assert_eq!(bcs_core::to_bytes(&shape).unwrap(), [0x01, 3, 0, 0, 0]);
/// ```
#[macro_export]
macro_rules! bcs_enum {
    ($trait_:ident { $($variant:tt),* $(,)? }) => {
        impl $crate::Encode for ::std::boxed::Box<dyn $trait_> {
            fn encode_with(
                &self,
                e: &mut $crate::Encoder<'_>,
                opts: &$crate::TypeOptions,
            ) -> $crate::Result<()> {
                let __erased: &dyn $crate::EnumVariant = &**self;
                e.encode_trait_object(
                    ::core::any::TypeId::of::<dyn $trait_>(),
                    stringify!($trait_),
                    ::core::option::Option::Some(__erased),
                    opts,
                )
            }

            fn encode_null(
                e: &mut $crate::Encoder<'_>,
                opts: &$crate::TypeOptions,
            ) -> $crate::Result<()> {
                e.encode_trait_object(
                    ::core::any::TypeId::of::<dyn $trait_>(),
                    stringify!($trait_),
                    ::core::option::Option::None,
                    opts,
                )
            }
        }

        impl $crate::Decode for ::std::boxed::Box<dyn $trait_> {
            fn decode_with(
                d: &mut $crate::Decoder<'_>,
                opts: &$crate::TypeOptions,
            ) -> $crate::Result<Self> {
                match d.decode_trait_object(
                    ::core::any::TypeId::of::<dyn $trait_>(),
                    stringify!($trait_),
                    opts,
                )? {
                    ::core::option::Option::Some(__any) => match __any.downcast::<Self>() {
                        ::core::result::Result::Ok(__b) => ::core::result::Result::Ok(*__b),
                        ::core::result::Result::Err(_) => {
                            ::core::result::Result::Err($crate::Error::config(
                                "enum registry entry does not match this trait",
                            ))
                        }
                    },
                    ::core::option::Option::None => {
                        ::core::result::Result::Err($crate::Error::null(concat!(
                            "null variant decoded into a required ",
                            stringify!($trait_),
                            " value",
                        )))
                    }
                }
            }

            fn decode_nullable(
                d: &mut $crate::Decoder<'_>,
                opts: &$crate::TypeOptions,
            ) -> $crate::Result<::core::option::Option<Self>> {
                match d.decode_trait_object(
                    ::core::any::TypeId::of::<dyn $trait_>(),
                    stringify!($trait_),
                    opts,
                )? {
                    ::core::option::Option::Some(__any) => match __any.downcast::<Self>() {
                        ::core::result::Result::Ok(__b) => {
                            ::core::result::Result::Ok(::core::option::Option::Some(*__b))
                        }
                        ::core::result::Result::Err(_) => {
                            ::core::result::Result::Err($crate::Error::config(
                                "enum registry entry does not match this trait",
                            ))
                        }
                    },
                    ::core::option::Option::None => {
                        ::core::result::Result::Ok(::core::option::Option::None)
                    }
                }
            }
        }

        impl dyn $trait_ {
            /// Installs this trait's ordered variant list in the enum
            /// registry. Order is the wire contract.
            pub fn register_bcs_enum() -> $crate::Result<()> {
                $crate::registry::register_enum(
                    ::core::any::TypeId::of::<dyn $trait_>(),
                    stringify!($trait_),
                    ::std::vec![$($crate::__bcs_variant!($trait_, $variant)),*],
                )
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bcs_tag {
    (skip) => {
        "skip"
    };
    ($tag:literal) => {
        $tag
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bcs_skip_marker {
    (skip) => {
        true
    };
    ($tag:literal) => {
        false
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bcs_encode_field {
    ($self_:ident, $e:ident, $plan:ident, $i:ident, $field:ident, skip) => {
        // Skipped fields stay off the wire and need no codec impl.
    };
    ($self_:ident, $e:ident, $plan:ident, $i:ident, $field:ident, $tag:literal) => {
        $e.encode_field(&$self_.$field, $plan.field($i))
            .map_err(|__e| __e.context(stringify!($field)))?;
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bcs_decode_field {
    ($d:ident, $fo:ident, $field:ident, skip) => {
        ::core::default::Default::default()
    };
    ($d:ident, $fo:ident, $field:ident, $tag:literal) => {
        $d.decode_field($fo).map_err(|__e| __e.context(stringify!($field)))?
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __bcs_variant {
    ($trait_:ident, _) => {
        $crate::VariantDef::sentinel()
    };
    ($trait_:ident, $variant:ident) => {
        $crate::VariantDef::new(
            ::core::any::type_name::<$variant>(),
            ::core::any::TypeId::of::<$variant>(),
            |__e, __any| match __any.downcast_ref::<$variant>() {
                ::core::option::Option::Some(__v) => __e.encode_value(__v),
                ::core::option::Option::None => ::core::result::Result::Err(
                    $crate::Error::config("variant value does not match its registered type"),
                ),
            },
            |__d| {
                let __v: $variant = __d.decode_value()?;
                let __boxed: ::std::boxed::Box<dyn $trait_> = ::std::boxed::Box::new(__v);
                ::core::result::Result::Ok(
                    ::std::boxed::Box::new(__boxed) as ::std::boxed::Box<dyn ::core::any::Any>
                )
            },
        )
    };
}
