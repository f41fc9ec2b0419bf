//! Process-wide codec registries.
//!
//! Three tables, all keyed by [`TypeId`]:
//!
//! - custom encoders and decoders, which replace the default walker for a
//!   type;
//! - enum variant lists for traits registered with
//!   [`bcs_enum!`](crate::bcs_enum);
//! - post-decode init hooks, run on a value after it is decoded and before
//!   it is returned.
//!
//! The tables are meant to be populated during single-threaded program
//! initialization and then read concurrently by any number of engines. Call
//! [`freeze`] once registration is complete: afterwards every mutation
//! reports a configuration error, which turns registration-ordering bugs
//! into loud failures instead of wire-format drift.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, info};

use crate::cache;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::enums::{EnumDef, VariantDef};
use crate::error::{Error, Result};

pub(crate) type EncodeOverride = Arc<dyn Fn(&mut Encoder<'_>, &dyn Any) -> Result<()> + Send + Sync>;
pub(crate) type DecodeOverride = Arc<dyn Fn(&mut Decoder<'_>) -> Result<Box<dyn Any>> + Send + Sync>;
pub(crate) type InitHook = Arc<dyn Fn(&mut dyn Any) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct Tables {
    frozen: bool,
    encoders: HashMap<TypeId, EncodeOverride>,
    decoders: HashMap<TypeId, DecodeOverride>,
    init_hooks: HashMap<TypeId, InitHook>,
    enums: HashMap<TypeId, Arc<EnumDef>>,
}

fn tables() -> &'static RwLock<Tables> {
    static TABLES: OnceLock<RwLock<Tables>> = OnceLock::new();
    TABLES.get_or_init(RwLock::default)
}

fn with_unfrozen<R>(op: &str, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
    let mut tables = tables().write().unwrap_or_else(PoisonError::into_inner);
    if tables.frozen {
        return Err(Error::config(format!("{op}: registries are frozen")));
    }
    f(&mut tables)
}

/// Freezes all registries. Further mutation is a configuration error.
///
/// Call once, after program initialization has registered every custom
/// codec, enum, and init hook.
pub fn freeze() {
    let mut tables = tables().write().unwrap_or_else(PoisonError::into_inner);
    tables.frozen = true;
    info!(
        encoders = tables.encoders.len(),
        decoders = tables.decoders.len(),
        enums = tables.enums.len(),
        init_hooks = tables.init_hooks.len(),
        "codec registries frozen"
    );
}

/// Whether [`freeze`] has been called.
#[must_use]
pub fn is_frozen() -> bool {
    tables().read().unwrap_or_else(PoisonError::into_inner).frozen
}

/// Registers a custom encoder for `T`, replacing the default walker.
///
/// Re-registering replaces the previous encoder.
///
/// # Errors
///
/// Configuration error if the registries are frozen.
pub fn add_custom_encoder<T: Any>(
    f: impl Fn(&mut Encoder<'_>, &T) -> Result<()> + Send + Sync + 'static,
) -> Result<()> {
    let id = TypeId::of::<T>();
    with_unfrozen("add_custom_encoder", |t| {
        t.encoders.insert(
            id,
            Arc::new(move |e: &mut Encoder<'_>, any: &dyn Any| match any.downcast_ref::<T>() {
                Some(v) => f(e, v),
                None => Err(Error::config("custom encoder invoked with a different type")),
            }),
        );
        Ok(())
    })?;
    cache::invalidate(id);
    debug!(type_name = std::any::type_name::<T>(), "registered custom encoder");
    Ok(())
}

/// Removes the custom encoder for `T`, if any.
///
/// # Errors
///
/// Configuration error if the registries are frozen.
pub fn remove_custom_encoder<T: Any>() -> Result<()> {
    let id = TypeId::of::<T>();
    with_unfrozen("remove_custom_encoder", |t| {
        t.encoders.remove(&id);
        Ok(())
    })?;
    cache::invalidate(id);
    Ok(())
}

/// Registers a custom decoder for `T`, replacing the default walker.
///
/// Re-registering replaces the previous decoder.
///
/// # Errors
///
/// Configuration error if the registries are frozen.
pub fn add_custom_decoder<T: Any>(
    f: impl Fn(&mut Decoder<'_>) -> Result<T> + Send + Sync + 'static,
) -> Result<()> {
    let id = TypeId::of::<T>();
    with_unfrozen("add_custom_decoder", |t| {
        t.decoders.insert(
            id,
            Arc::new(move |d: &mut Decoder<'_>| f(d).map(|v| Box::new(v) as Box<dyn Any>)),
        );
        Ok(())
    })?;
    cache::invalidate(id);
    debug!(type_name = std::any::type_name::<T>(), "registered custom decoder");
    Ok(())
}

/// Removes the custom decoder for `T`, if any.
///
/// # Errors
///
/// Configuration error if the registries are frozen.
pub fn remove_custom_decoder<T: Any>() -> Result<()> {
    let id = TypeId::of::<T>();
    with_unfrozen("remove_custom_decoder", |t| {
        t.decoders.remove(&id);
        Ok(())
    })?;
    cache::invalidate(id);
    Ok(())
}

/// Registers a hook invoked on every decoded `T` before it is returned,
/// after the whole value is constructed.
///
/// # Errors
///
/// Configuration error if the registries are frozen.
pub fn add_init_hook<T: Any>(
    f: impl Fn(&mut T) -> Result<()> + Send + Sync + 'static,
) -> Result<()> {
    let id = TypeId::of::<T>();
    with_unfrozen("add_init_hook", |t| {
        t.init_hooks.insert(
            id,
            Arc::new(move |any: &mut dyn Any| match any.downcast_mut::<T>() {
                Some(v) => f(v),
                None => Err(Error::config("init hook invoked with a different type")),
            }),
        );
        Ok(())
    })?;
    cache::invalidate(id);
    debug!(type_name = std::any::type_name::<T>(), "registered init hook");
    Ok(())
}

/// Registers an enum's ordered variant list. Prefer the
/// [`bcs_enum!`](crate::bcs_enum) macro, which builds the variant thunks and
/// checks trait conformance at compile time.
///
/// # Errors
///
/// Configuration error if the registries are frozen, the enum is already
/// registered, the list is empty, a variant type appears twice, or more
/// than one sentinel is listed.
pub fn register_enum(enum_type: TypeId, name: &'static str, variants: Vec<VariantDef>) -> Result<()> {
    if variants.is_empty() {
        return Err(Error::config(format!("enum {name} registered with no variants")));
    }

    let mut sentinel = None;
    for (i, v) in variants.iter().enumerate() {
        if v.is_sentinel() {
            if sentinel.is_some() {
                return Err(Error::config(format!("enum {name} lists more than one null variant")));
            }
            sentinel = Some(i);
            continue;
        }
        let dup = variants[..i].iter().any(|prev| prev.type_id() == v.type_id());
        if dup {
            return Err(Error::config(format!(
                "variant {} registered twice for enum {name}",
                v.name()
            )));
        }
    }

    with_unfrozen("register_enum", |t| {
        if t.enums.contains_key(&enum_type) {
            return Err(Error::config(format!("enum {name} is already registered")));
        }
        let count = variants.len();
        t.enums.insert(enum_type, Arc::new(EnumDef { name, variants, sentinel }));
        debug!(enum_name = name, variants = count, "registered enum");
        Ok(())
    })
}

pub(crate) fn custom_encoder(id: TypeId) -> Option<EncodeOverride> {
    tables().read().unwrap_or_else(PoisonError::into_inner).encoders.get(&id).cloned()
}

pub(crate) fn custom_decoder(id: TypeId) -> Option<DecodeOverride> {
    tables().read().unwrap_or_else(PoisonError::into_inner).decoders.get(&id).cloned()
}

pub(crate) fn init_hook(id: TypeId) -> Option<InitHook> {
    tables().read().unwrap_or_else(PoisonError::into_inner).init_hooks.get(&id).cloned()
}

pub(crate) fn enum_def(id: TypeId) -> Option<Arc<EnumDef>> {
    tables().read().unwrap_or_else(PoisonError::into_inner).enums.get(&id).cloned()
}

pub(crate) fn has_customization(id: TypeId) -> (bool, bool, bool) {
    let t = tables().read().unwrap_or_else(PoisonError::into_inner);
    (t.encoders.contains_key(&id), t.decoders.contains_key(&id), t.init_hooks.contains_key(&id))
}
