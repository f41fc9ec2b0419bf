//! Memoized per-type codec plans.
//!
//! The first time a type passes through an engine, its customization flags
//! are probed from the registries and, for generated struct codecs, its
//! field tags are parsed into a [`StructPlan`]. The result is memoized by
//! [`TypeId`] so that encoding a million elements of a collection pays for
//! the probe once.
//!
//! Each engine works against a private snapshot and flushes new entries back
//! to the shared map when a top-level operation completes, keeping the hot
//! path free of lock traffic.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::{Error, Result};
use crate::options::FieldOptions;
use crate::registry;

/// A struct field as declared to the codec macros: name, tag string, and
/// whether the field carries the `skip` marker (which is what lets the
/// generated decoder substitute a default value).
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name, for diagnostics.
    pub name: &'static str,
    /// The field's tag string, parsed on first use.
    pub tag: &'static str,
    /// Set by the macro's `skip` arm.
    pub skip_marker: bool,
}

/// A parsed field: its options plus bookkeeping.
#[derive(Debug)]
pub struct FieldPlan {
    /// Field name, for diagnostics.
    pub name: &'static str,
    /// Whether the field carried a non-empty tag.
    pub has_tag: bool,
    /// The parsed options.
    pub options: FieldOptions,
}

/// The memoized field-walk plan for one struct type.
#[derive(Debug)]
pub struct StructPlan {
    fields: Vec<FieldPlan>,
}

impl StructPlan {
    /// The parsed options of field `i`, in declaration order.
    #[must_use]
    pub fn field(&self, i: usize) -> &FieldOptions {
        &self.fields[i].options
    }

    /// All parsed fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }
}

/// Everything the walker wants to know about a type before dispatching.
#[derive(Debug)]
pub(crate) struct TypeInfo {
    pub(crate) has_custom_encoder: bool,
    pub(crate) has_custom_decoder: bool,
    pub(crate) has_init_hook: bool,
    plan: OnceLock<Arc<StructPlan>>,
}

impl TypeInfo {
    fn probe(id: TypeId) -> Self {
        let (has_custom_encoder, has_custom_decoder, has_init_hook) =
            registry::has_customization(id);
        Self { has_custom_encoder, has_custom_decoder, has_init_hook, plan: OnceLock::new() }
    }
}

fn shared() -> &'static RwLock<HashMap<TypeId, Arc<TypeInfo>>> {
    static SHARED: OnceLock<RwLock<HashMap<TypeId, Arc<TypeInfo>>>> = OnceLock::new();
    SHARED.get_or_init(RwLock::default)
}

/// Drops the shared entry for a type. Called on registration changes so a
/// later engine re-probes instead of trusting stale flags.
pub(crate) fn invalidate(id: TypeId) {
    shared().write().unwrap_or_else(PoisonError::into_inner).remove(&id);
}

/// An engine's private view of the shared cache.
#[derive(Debug, Default)]
pub(crate) struct LocalTypeInfoCache {
    local: HashMap<TypeId, Arc<TypeInfo>>,
    added: Vec<TypeId>,
}

impl LocalTypeInfoCache {
    pub(crate) fn type_info(&mut self, id: TypeId) -> Arc<TypeInfo> {
        if let Some(info) = self.local.get(&id) {
            return Arc::clone(info);
        }
        if let Some(info) = shared().read().unwrap_or_else(PoisonError::into_inner).get(&id) {
            let info = Arc::clone(info);
            self.local.insert(id, Arc::clone(&info));
            return info;
        }
        let info = Arc::new(TypeInfo::probe(id));
        self.local.insert(id, Arc::clone(&info));
        self.added.push(id);
        info
    }

    /// Returns the memoized plan for a struct type, parsing the field tags
    /// on first use.
    pub(crate) fn struct_plan(
        &mut self,
        id: TypeId,
        type_name: &str,
        specs: &'static [FieldSpec],
    ) -> Result<Arc<StructPlan>> {
        let info = self.type_info(id);
        if let Some(plan) = info.plan.get() {
            return Ok(Arc::clone(plan));
        }

        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let options = FieldOptions::parse(spec.tag)
                .map_err(|e| e.context(format!("{type_name}.{}", spec.name)))?;
            if options.skip && !spec.skip_marker {
                return Err(Error::config(format!(
                    "{type_name}.{}: `skip` tag requires the field to be declared with the \
                     `skip` marker so decoding can substitute a default",
                    spec.name
                )));
            }
            fields.push(FieldPlan { name: spec.name, has_tag: !spec.tag.is_empty(), options });
        }

        let plan = Arc::new(StructPlan { fields });
        // Another engine may have raced the parse; both computed the same
        // plan, so whichever landed first wins.
        Ok(Arc::clone(info.plan.get_or_init(|| plan)))
    }

    /// Flushes entries probed during this operation back to the shared map.
    pub(crate) fn save(&mut self) {
        if self.added.is_empty() {
            return;
        }
        let mut shared = shared().write().unwrap_or_else(PoisonError::into_inner);
        for id in self.added.drain(..) {
            if let Some(info) = self.local.get(&id) {
                shared.entry(id).or_insert_with(|| Arc::clone(info));
            }
        }
    }
}
