//! The deep-copy engine.
//!
//! A copy walks the original graph depth first. Each mutable object gets one
//! shallow duplicate, which is recorded in the visited set *before* its
//! contents are copied: a cycle that leads back to the object then resolves to
//! the duplicate instead of recursing forever, and every other path to the same
//! original resolves to the same duplicate.

use std::sync::Arc;

use smallvec::{SmallVec, smallvec};

use crate::{
    classify::Classification,
    error::{CopyError, CopyResult},
    fields::FieldSetCache,
    identity::IdentityMap,
    introspect::Introspect,
    tracer::{CopyTracer, NoopTracer},
    types::{FieldDescriptor, TypeId},
    value::Value,
};

/// Deep-copies `value`.
///
/// The result shares no mutable object with the original, while references
/// that point at the same original object (including cycles) point at the same
/// copy. Atomic values (primitives, strings, whitelisted immutable types, type
/// metadata, host handles) are returned unchanged; callables become
/// [`Value::None`]; documents are cloned by the document subsystem.
///
/// # Errors
/// Returns the first error raised by the introspector, unchanged. No partial
/// copy is returned.
pub fn deep_copy<I: Introspect + ?Sized>(introspector: &mut I, value: &Value) -> CopyResult<Value> {
    deep_copy_traced(introspector, value, &mut NoopTracer)
}

/// Deep-copies `value`, reporting engine events to `tracer`.
pub fn deep_copy_traced<I: Introspect + ?Sized, Tr: CopyTracer>(
    introspector: &mut I,
    value: &Value,
    tracer: &mut Tr,
) -> CopyResult<Value> {
    CopyContext::new(introspector, tracer).copy(value, true)
}

/// State of a single top-level copy.
///
/// The visited set is private to this copy. The field-set cache is the
/// introspector's shared one when it offers one.
pub(crate) struct CopyContext<'a, I: Introspect + ?Sized, Tr: CopyTracer> {
    introspector: &'a mut I,
    tracer: Tr,
    visited: IdentityMap,
    field_sets: Arc<FieldSetCache>,
    /// Number of composites/arrays currently being filled in.
    depth: usize,
}

impl<'a, I: Introspect + ?Sized, Tr: CopyTracer> CopyContext<'a, I, Tr> {
    pub(crate) fn new(introspector: &'a mut I, tracer: Tr) -> Self {
        let field_sets = introspector
            .shared_field_cache()
            .unwrap_or_else(|| Arc::new(FieldSetCache::new()));
        Self {
            introspector,
            tracer,
            visited: IdentityMap::new(),
            field_sets,
            depth: 0,
        }
    }

    /// Copies one value. `track` says whether the position holding it can be
    /// shared, in which case the visited set is consulted and updated.
    pub(crate) fn copy(&mut self, original: &Value, track: bool) -> CopyResult<Value> {
        let classification = self.introspector.classify(original)?;
        match classification {
            Classification::Atomic => return Ok(original.clone()),
            Classification::OpaqueSpecial => {
                self.tracer.on_callable_dropped(self.depth);
                return Ok(Value::None);
            }
            Classification::Document => {
                self.tracer.on_document_cloned(self.depth);
                return self.introspector.clone_document(original);
            }
            Classification::Array | Classification::Composite { .. } => {}
        }

        if track
            && let Some(original_id) = original.heap_id()
            && let Some(copy_id) = self.visited.lookup(original_id)
        {
            self.tracer.on_memo_hit(original_id, copy_id);
            return Ok(Value::Ref(copy_id));
        }

        self.introspector.check_recursion_depth(self.depth)?;
        let mut duplicate = self.introspector.shallow_clone(original)?;
        if track
            && let Some(original_id) = original.heap_id()
            && let Some(copy_id) = duplicate.heap_id()
        {
            self.visited.record(original_id, copy_id);
        }

        let kind = match (&classification, original) {
            (Classification::Array, _) => "array",
            (_, Value::Struct(_)) => "struct",
            _ => "instance",
        };
        self.tracer.on_duplicate(original.heap_id(), kind, self.depth);

        self.depth += 1;
        let filled = match classification {
            Classification::Composite { ty } => self.copy_fields(ty, original, &mut duplicate),
            _ => self.copy_elements(original, &duplicate),
        };
        self.depth -= 1;
        filled?;
        Ok(duplicate)
    }

    fn copy_fields(&mut self, ty: TypeId, original: &Value, duplicate: &mut Value) -> CopyResult<()> {
        let fields = self.field_set(ty)?;
        for field in fields.iter() {
            let value = self.introspector.get_field(original, field)?;
            let copied = self.copy(&value, !field.ty.is_value_type())?;
            self.introspector.set_field(duplicate, field, copied)?;
        }
        Ok(())
    }

    /// Deep-copyable fields of `ty`, computed on first use.
    fn field_set(&mut self, ty: TypeId) -> CopyResult<Arc<[FieldDescriptor]>> {
        let introspector = &*self.introspector;
        let tracer = &mut self.tracer;
        self.field_sets.get_or_try_insert(ty, || {
            let fields: Vec<_> = introspector
                .fields_of(ty)?
                .into_iter()
                .filter(|field| !introspector.is_atomic(&field.ty))
                .collect();
            tracer.on_field_set_computed(ty, fields.len());
            Ok(fields)
        })
    }

    fn copy_elements(&mut self, original: &Value, duplicate: &Value) -> CopyResult<()> {
        let (element, shape) = self.introspector.array_layout(original)?;
        // the shallow duplicate already holds every atomic element
        if self.introspector.is_atomic(&element) {
            return Ok(());
        }
        let track = !element.is_value_type();

        if shape.is_empty() {
            return Err(CopyError::InvalidShape(Vec::new()));
        }
        if let [len] = shape.as_slice() {
            for i in 0..*len {
                self.copy_element(original, duplicate, &[i], track)?;
            }
            return Ok(());
        }
        let mut index: SmallVec<[usize; 4]> = smallvec![0; shape.len()];
        self.copy_dimension(original, duplicate, &shape, &mut index, 0, track)
    }

    /// Walks dimension `dim` and everything inside it, innermost dimension tightest.
    fn copy_dimension(
        &mut self,
        original: &Value,
        duplicate: &Value,
        shape: &[usize],
        index: &mut [usize],
        dim: usize,
        track: bool,
    ) -> CopyResult<()> {
        let innermost = dim + 1 == shape.len();
        for i in 0..shape[dim] {
            index[dim] = i;
            if innermost {
                self.copy_element(original, duplicate, index, track)?;
            } else {
                self.copy_dimension(original, duplicate, shape, index, dim + 1, track)?;
            }
        }
        Ok(())
    }

    fn copy_element(&mut self, original: &Value, duplicate: &Value, index: &[usize], track: bool) -> CopyResult<()> {
        let item = self.introspector.get_element(original, index)?;
        let copied = self.copy(&item, track)?;
        self.introspector.set_element(duplicate, index, copied)
    }
}
