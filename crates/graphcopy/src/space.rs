//! Object space: a heap plus the type registry describing its objects.
//!
//! This is the stock [`Introspect`] implementation. Graphs are built through
//! the constructors here, copied with [`ObjectSpace::deep_copy`], and the copy
//! lives in the same space as the original.

use std::{any::Any, sync::Arc};

use smallvec::SmallVec;

use crate::{
    classify::{Classification, classify_value, declared_is_atomic},
    copy::{deep_copy, deep_copy_traced},
    error::{CopyError, CopyResult},
    fields::FieldSetCache,
    heap::{ArrayObject, Callable, Heap, HeapData, HeapId, HeapStats, HostObject, Instance},
    introspect::{Introspect, Shape},
    resource::{NoLimitTracker, ResourceTracker},
    tracer::CopyTracer,
    types::{FieldDescriptor, FieldType, TypeDef, TypeId, TypeKind, TypeRegistry, XmlElement},
    value::{StructValue, Value},
};

/// A heap of objects described by a shared [`TypeRegistry`].
///
/// Every field and element write is checked against the slot's declared type.
/// The copy engine skips slots whose declared type is atomic and never tracks
/// struct slots, so a value of the wrong kind stored there would escape the copy.
#[derive(Debug)]
pub struct ObjectSpace<T: ResourceTracker = NoLimitTracker> {
    heap: Heap<T>,
    types: Arc<TypeRegistry>,
}

impl ObjectSpace<NoLimitTracker> {
    /// Creates an empty space with no allocation limits.
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self::with_tracker(types, NoLimitTracker)
    }
}

impl<T: ResourceTracker> ObjectSpace<T> {
    /// Creates an empty space whose heap is policed by `tracker`.
    pub fn with_tracker(types: Arc<TypeRegistry>, tracker: T) -> Self {
        Self {
            heap: Heap::new(tracker),
            types,
        }
    }

    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    #[must_use]
    pub fn heap(&self) -> &Heap<T> {
        &self.heap
    }

    /// Captures a snapshot of heap usage.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.heap.stats()
    }

    fn allocate(&mut self, data: HeapData) -> CopyResult<Value> {
        Ok(Value::Ref(self.heap.allocate(data)?))
    }

    /// Allocates a string.
    pub fn alloc_str(&mut self, s: impl Into<Box<str>>) -> CopyResult<Value> {
        self.allocate(HeapData::Str(s.into()))
    }

    /// Allocates an instance of a class with every field at its default.
    pub fn new_object(&mut self, ty: TypeId) -> CopyResult<Value> {
        self.expect_kind(ty, "a class", |def| def.kind == TypeKind::Class)?;
        let slots = self
            .types
            .layout(ty)?
            .iter()
            .map(|field| self.types.default_value(&field.ty))
            .collect::<CopyResult<Vec<_>>>()?;
        self.allocate(HeapData::Instance(Instance { ty, slots }))
    }

    /// Builds an inline struct value with every field at its default.
    pub fn new_struct(&self, ty: TypeId) -> CopyResult<Value> {
        self.expect_kind(ty, "a struct", |def| def.kind == TypeKind::Struct)?;
        Ok(Value::Struct(self.types.default_struct(ty)?))
    }

    /// Returns a value of an enum type, checking the discriminant against its variants.
    pub fn enum_value(&self, ty: TypeId, variant: &str) -> CopyResult<Value> {
        let def = self.types.get(ty)?;
        let TypeKind::Enum { variants } = &def.kind else {
            return Err(CopyError::WrongKind {
                type_name: def.name.clone(),
                expected: "an enum",
            });
        };
        let position = variants.iter().position(|v| v == variant).ok_or_else(|| CopyError::NoSuchField {
            type_name: def.name.clone(),
            field: variant.to_owned(),
        })?;
        Ok(Value::Enum {
            ty,
            discriminant: i64::try_from(position).unwrap_or(i64::MAX),
        })
    }

    fn expect_kind(&self, ty: TypeId, expected: &'static str, check: impl FnOnce(&TypeDef) -> bool) -> CopyResult<()> {
        let def = self.types.get(ty)?;
        if check(def) {
            Ok(())
        } else {
            Err(CopyError::WrongKind {
                type_name: def.name.clone(),
                expected,
            })
        }
    }

    /// Allocates a rectangular array of the given shape, filled with the element
    /// type's default value.
    pub fn new_array(&mut self, element: FieldType, shape: &[usize]) -> CopyResult<Value> {
        let len = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .filter(|_| !shape.is_empty())
            .ok_or_else(|| CopyError::InvalidShape(shape.to_vec()))?;
        let default = self.types.default_value(&element)?;
        self.allocate(HeapData::Array(ArrayObject {
            element,
            shape: SmallVec::from_slice(shape),
            items: vec![default; len],
        }))
    }

    /// Allocates a one-dimensional array holding `items`.
    pub fn array_from(&mut self, element: FieldType, items: Vec<Value>) -> CopyResult<Value> {
        for item in &items {
            self.check_conforms(&element, item)?;
        }
        self.allocate(HeapData::Array(ArrayObject {
            element,
            shape: smallvec::smallvec![items.len()],
            items,
        }))
    }

    /// Allocates a callable.
    pub fn new_callable(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> CopyResult<Value> {
        self.allocate(HeapData::Callable(Callable {
            name: name.into(),
            func: Arc::new(func),
        }))
    }

    /// Allocates a document node.
    pub fn new_document(&mut self, root: XmlElement) -> CopyResult<Value> {
        self.allocate(HeapData::Document(root))
    }

    /// Wraps a host resource in an opaque handle.
    pub fn new_host<H: Any + Send + Sync>(&mut self, label: impl Into<String>, handle: H) -> CopyResult<Value> {
        self.allocate(HeapData::Host(HostObject {
            label: label.into(),
            handle: Arc::new(handle),
        }))
    }

    /// Returns the heap object behind a reference.
    pub fn object(&self, value: &Value) -> CopyResult<&HeapData> {
        let id = value.heap_id().ok_or(CopyError::NotAnObject {
            found: value.kind_name(),
        })?;
        self.heap.get(id).ok_or(CopyError::DanglingRef(id))
    }

    fn object_mut(&mut self, id: HeapId) -> CopyResult<&mut HeapData> {
        self.heap.get_mut(id).ok_or(CopyError::DanglingRef(id))
    }

    /// Returns the text of a string reference.
    #[must_use]
    pub fn str_value(&self, value: &Value) -> Option<&str> {
        match self.object(value) {
            Ok(HeapData::Str(s)) => Some(&**s),
            _ => None,
        }
    }

    /// Returns the array behind a reference.
    pub fn array(&self, value: &Value) -> CopyResult<&ArrayObject> {
        match self.object(value)? {
            HeapData::Array(array) => Ok(array),
            other => Err(CopyError::NotAnArray {
                found: other.variant_name(),
            }),
        }
    }

    fn array_mut(&mut self, value: &Value) -> CopyResult<&mut ArrayObject> {
        let id = value.heap_id().ok_or(CopyError::NotAnArray {
            found: value.kind_name(),
        })?;
        match self.object_mut(id)? {
            HeapData::Array(array) => Ok(array),
            other => Err(CopyError::NotAnArray {
                found: other.variant_name(),
            }),
        }
    }

    /// Returns the document behind a reference.
    pub fn document(&self, value: &Value) -> CopyResult<&XmlElement> {
        match self.object(value)? {
            HeapData::Document(root) => Ok(root),
            other => Err(CopyError::NotAnObject {
                found: other.variant_name(),
            }),
        }
    }

    /// Returns the document behind a reference for modification.
    pub fn document_mut(&mut self, value: &Value) -> CopyResult<&mut XmlElement> {
        let id = value.heap_id().ok_or(CopyError::NotAnObject {
            found: value.kind_name(),
        })?;
        match self.object_mut(id)? {
            HeapData::Document(root) => Ok(root),
            other => Err(CopyError::NotAnObject {
                found: other.variant_name(),
            }),
        }
    }

    /// Reads a field by name; a name declared at several levels of the
    /// inheritance chain resolves to the most derived declaration.
    pub fn get(&self, object: &Value, field: &str) -> CopyResult<Value> {
        let descriptor = self.types.find_field(self.object_type(object)?, field)?;
        self.get_field(object, descriptor)
    }

    /// Writes a field by name.
    pub fn set(&mut self, object: &mut Value, field: &str, value: Value) -> CopyResult<()> {
        let types = Arc::clone(&self.types);
        let descriptor = types.find_field(self.object_type(object)?, field)?;
        self.set_field(object, descriptor, value)
    }

    /// Reads the field `field` declared by `owner`, which must be the object's
    /// type or one of its ancestors.
    pub fn get_declared(&self, object: &Value, owner: TypeId, field: &str) -> CopyResult<Value> {
        let descriptor = self.types.find_declared_field(self.object_type(object)?, owner, field)?;
        self.get_field(object, descriptor)
    }

    /// Writes the field `field` declared by `owner`.
    pub fn set_declared(&mut self, object: &mut Value, owner: TypeId, field: &str, value: Value) -> CopyResult<()> {
        let types = Arc::clone(&self.types);
        let descriptor = types.find_declared_field(self.object_type(object)?, owner, field)?;
        self.set_field(object, descriptor, value)
    }

    /// Type of an instance or struct value.
    pub fn object_type(&self, object: &Value) -> CopyResult<TypeId> {
        match object {
            Value::Struct(s) => Ok(s.ty()),
            Value::Ref(_) => match self.object(object)? {
                HeapData::Instance(instance) => Ok(instance.ty),
                other => Err(CopyError::NotAnObject {
                    found: other.variant_name(),
                }),
            },
            other => Err(CopyError::NotAnObject {
                found: other.kind_name(),
            }),
        }
    }

    /// Checks that `field` belongs to the layout of `ty` and returns its slot.
    fn slot(&self, ty: TypeId, field: &FieldDescriptor) -> CopyResult<usize> {
        match self.types.layout(ty)?.get(field.slot) {
            Some(found) if found.owner == field.owner && found.name == field.name => Ok(field.slot),
            _ => Err(self.missing(ty, field)),
        }
    }

    fn missing(&self, ty: TypeId, field: &FieldDescriptor) -> CopyError {
        CopyError::NoSuchField {
            type_name: self.types.name(ty).to_owned(),
            field: field.name.to_string(),
        }
    }

    /// Fails with [`CopyError::TypeMismatch`] unless `value` may be stored in a slot
    /// declared as `ty`.
    fn check_conforms(&self, ty: &FieldType, value: &Value) -> CopyResult<()> {
        if self.conforms(ty, value)? {
            return Ok(());
        }
        let found = match value {
            Value::Ref(id) => self.heap.get(*id).map_or("dangling reference", HeapData::variant_name),
            other => other.kind_name(),
        };
        Err(CopyError::TypeMismatch {
            expected: ty.clone(),
            found,
        })
    }

    /// Value types hold exactly their own kind; reference types also hold null.
    /// `Object` holds anything.
    fn conforms(&self, ty: &FieldType, value: &Value) -> CopyResult<bool> {
        Ok(match (ty, value) {
            (FieldType::Object, _) => true,
            (FieldType::Struct(id), Value::Struct(s)) => s.ty() == *id && self.struct_conforms(s)?,
            (FieldType::Enum(id), Value::Enum { ty: actual, .. }) => actual == id,
            (_, Value::None) => !ty.is_value_type(),
            (FieldType::Bool, Value::Bool(_))
            | (FieldType::Int, Value::Int(_))
            | (FieldType::Float, Value::Float(_))
            | (FieldType::Char, Value::Char(_))
            | (FieldType::Decimal, Value::Decimal(_))
            | (FieldType::BigInt, Value::BigInt(_))
            | (FieldType::Complex, Value::Complex(_))
            | (FieldType::Uuid, Value::Uuid(_))
            | (FieldType::DateTime, Value::DateTime(_))
            | (FieldType::Date, Value::Date(_))
            | (FieldType::Time, Value::Time(_))
            | (FieldType::Duration, Value::Duration(_))
            | (FieldType::DateTimeOffset, Value::DateTimeOffset(_))
            | (FieldType::Type, Value::Type(_)) => true,
            (_, Value::Ref(_)) => match (ty, self.object(value)?) {
                (FieldType::Str, HeapData::Str(_))
                | (FieldType::Callable, HeapData::Callable(_))
                | (FieldType::Document, HeapData::Document(_))
                | (FieldType::Host, HeapData::Host(_)) => true,
                (FieldType::Class(id), HeapData::Instance(instance)) => self.derives_from(instance.ty, *id)?,
                (FieldType::Array { element, rank }, HeapData::Array(array)) => {
                    array.rank() == *rank && self.element_conforms(element, &array.element)?
                }
                _ => false,
            },
            _ => false,
        })
    }

    fn struct_conforms(&self, value: &StructValue) -> CopyResult<bool> {
        let layout = self.types.layout(value.ty())?;
        if layout.len() != value.fields().len() {
            return Ok(false);
        }
        for (field, slot) in layout.iter().zip(value.fields()) {
            if !self.conforms(&field.ty, slot)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether an array with element type `actual` may stand in a slot declared
    /// with element type `declared`.
    fn element_conforms(&self, declared: &FieldType, actual: &FieldType) -> CopyResult<bool> {
        Ok(match (declared, actual) {
            (FieldType::Object, _) => true,
            (FieldType::Class(base), FieldType::Class(derived)) => self.derives_from(*derived, *base)?,
            _ => declared == actual,
        })
    }

    fn derives_from(&self, ty: TypeId, base: TypeId) -> CopyResult<bool> {
        Ok(self.types.ancestry(ty)?.contains(&base))
    }

    /// Deep-copies `value` within this space.
    pub fn deep_copy(&mut self, value: &Value) -> CopyResult<Value> {
        deep_copy(self, value)
    }

    /// Deep-copies `value` within this space, reporting engine events to `tracer`.
    pub fn deep_copy_traced(&mut self, value: &Value, tracer: &mut impl CopyTracer) -> CopyResult<Value> {
        deep_copy_traced(self, value, tracer)
    }
}

impl<T: ResourceTracker> Introspect for ObjectSpace<T> {
    fn is_atomic(&self, ty: &FieldType) -> bool {
        declared_is_atomic(&self.types, ty)
    }

    fn classify(&self, value: &Value) -> CopyResult<Classification> {
        let object = value.heap_id().and_then(|id| self.heap.get(id));
        classify_value(&self.types, value, object)
    }

    fn fields_of(&self, ty: TypeId) -> CopyResult<Vec<FieldDescriptor>> {
        let layout = self.types.layout(ty)?;
        Ok(self
            .types
            .ancestry(ty)?
            .into_iter()
            .flat_map(|owner| layout.iter().filter(move |field| field.owner == owner).cloned())
            .collect())
    }

    fn get_field(&self, object: &Value, field: &FieldDescriptor) -> CopyResult<Value> {
        let ty = self.object_type(object)?;
        let slot = self.slot(ty, field)?;
        match object {
            Value::Struct(s) => s.fields().get(slot).cloned().ok_or_else(|| self.missing(ty, field)),
            _ => match self.object(object)? {
                HeapData::Instance(instance) => Ok(instance.slots[slot].clone()),
                other => Err(CopyError::NotAnObject {
                    found: other.variant_name(),
                }),
            },
        }
    }

    fn set_field(&mut self, object: &mut Value, field: &FieldDescriptor, value: Value) -> CopyResult<()> {
        let ty = self.object_type(object)?;
        let slot = self.slot(ty, field)?;
        self.check_conforms(&field.ty, &value)?;
        match object {
            Value::Struct(s) => match s.fields_mut().get_mut(slot) {
                Some(target) => *target = value,
                None => return Err(self.missing(ty, field)),
            },
            Value::Ref(id) => match self.object_mut(*id)? {
                HeapData::Instance(instance) => instance.slots[slot] = value,
                other => {
                    return Err(CopyError::NotAnObject {
                        found: other.variant_name(),
                    });
                }
            },
            other => {
                return Err(CopyError::NotAnObject {
                    found: other.kind_name(),
                });
            }
        }
        Ok(())
    }

    fn shallow_clone(&mut self, value: &Value) -> CopyResult<Value> {
        match value {
            Value::Struct(_) => Ok(value.clone()),
            Value::Ref(_) => match self.object(value)? {
                data @ (HeapData::Instance(_) | HeapData::Array(_)) => {
                    let data = data.clone();
                    self.allocate(data)
                }
                other => Err(CopyError::NotCopyable {
                    type_name: other.variant_name().to_owned(),
                }),
            },
            other => Err(CopyError::NotCopyable {
                type_name: other.kind_name().to_owned(),
            }),
        }
    }

    fn array_layout(&self, array: &Value) -> CopyResult<(FieldType, Shape)> {
        let array = self.array(array)?;
        Ok((array.element.clone(), array.shape.clone()))
    }

    fn get_element(&self, array: &Value, index: &[usize]) -> CopyResult<Value> {
        let array = self.array(array)?;
        let offset = array.offset(index).ok_or_else(|| CopyError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: array.shape.to_vec(),
        })?;
        Ok(array.items[offset].clone())
    }

    fn set_element(&mut self, array: &Value, index: &[usize], value: Value) -> CopyResult<()> {
        self.check_conforms(&self.array(array)?.element, &value)?;
        let array = self.array_mut(array)?;
        let offset = array.offset(index).ok_or_else(|| CopyError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: array.shape.to_vec(),
        })?;
        array.items[offset] = value;
        Ok(())
    }

    fn clone_document(&mut self, document: &Value) -> CopyResult<Value> {
        let root = self.document(document)?.clone();
        self.new_document(root)
    }

    fn check_recursion_depth(&self, depth: usize) -> CopyResult<()> {
        Ok(self.heap.tracker().check_recursion_depth(depth)?)
    }

    fn shared_field_cache(&self) -> Option<Arc<FieldSetCache>> {
        Some(Arc::clone(self.types.field_cache()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn registry() -> (Arc<TypeRegistry>, TypeId, TypeId) {
        let mut types = TypeRegistry::new();
        let base = types
            .register(TypeDef::class("Base").private_field("tag", FieldType::Object))
            .unwrap();
        let derived = types
            .register(
                TypeDef::class("Derived")
                    .extends(base)
                    .field("tag", FieldType::Int)
                    .field("count", FieldType::Int),
            )
            .unwrap();
        (Arc::new(types), base, derived)
    }

    #[test]
    fn hidden_base_fields_are_reachable_by_owner() {
        let (types, base, derived) = registry();
        let mut space = ObjectSpace::new(types);
        let mut object = space.new_object(derived).unwrap();
        let text = space.alloc_str("base tag").unwrap();

        space.set(&mut object, "tag", Value::Int(7)).unwrap();
        space.set_declared(&mut object, base, "tag", text.clone()).unwrap();

        assert_eq!(space.get(&object, "tag").unwrap(), Value::Int(7));
        assert_eq!(space.get_declared(&object, base, "tag").unwrap(), text);
        assert_eq!(space.get(&object, "count").unwrap(), Value::Int(0));
    }

    #[test]
    fn fields_of_walks_derived_to_base() {
        let (types, base, derived) = registry();
        let space = ObjectSpace::new(types);
        let owners: Vec<_> = space
            .fields_of(derived)
            .unwrap()
            .iter()
            .map(|field| (field.owner, field.name.to_string()))
            .collect();
        assert_eq!(
            owners,
            vec![
                (derived, "tag".to_owned()),
                (derived, "count".to_owned()),
                (base, "tag".to_owned())
            ]
        );
    }

    #[test]
    fn descriptors_from_other_types_are_rejected() {
        let (types, base, derived) = registry();
        let mut space = ObjectSpace::new(types);
        let object = space.new_object(base).unwrap();
        let foreign = space.types().find_field(derived, "count").unwrap().clone();
        assert!(matches!(
            space.get_field(&object, &foreign),
            Err(CopyError::NoSuchField { .. })
        ));
    }

    #[test]
    fn arrays_check_rank_and_bounds() {
        let (types, ..) = registry();
        let mut space = ObjectSpace::new(types);
        let grid = space.new_array(FieldType::Int, &[2, 3]).unwrap();

        space.set_element(&grid, &[1, 2], Value::Int(5)).unwrap();
        assert_eq!(space.get_element(&grid, &[1, 2]).unwrap(), Value::Int(5));
        assert_eq!(space.array(&grid).unwrap().items()[5], Value::Int(5));
        assert_eq!(
            space.get_element(&grid, &[2, 0]),
            Err(CopyError::IndexOutOfBounds {
                index: vec![2, 0],
                shape: vec![2, 3]
            })
        );
        assert!(space.get_element(&grid, &[0]).is_err());
        assert_eq!(
            space.new_array(FieldType::Int, &[]),
            Err(CopyError::InvalidShape(Vec::new()))
        );
    }

    #[test]
    fn constructors_check_type_kind() {
        let mut types = TypeRegistry::new();
        let point = types.register(TypeDef::structure("Point").field("x", FieldType::Int)).unwrap();
        let color = types.register(TypeDef::enumeration("Color", ["Red", "Blue"])).unwrap();
        let mut space = ObjectSpace::new(Arc::new(types));

        assert!(matches!(space.new_object(point), Err(CopyError::WrongKind { .. })));
        assert!(matches!(space.new_struct(color), Err(CopyError::WrongKind { .. })));
        assert_eq!(
            space.enum_value(color, "Blue").unwrap(),
            Value::Enum {
                ty: color,
                discriminant: 1
            }
        );
        assert!(space.enum_value(color, "Green").is_err());
    }

    #[test]
    fn shallow_clone_refuses_non_copyable_objects() {
        let (types, ..) = registry();
        let mut space = ObjectSpace::new(types);
        let text = space.alloc_str("x").unwrap();
        assert_eq!(
            space.shallow_clone(&text),
            Err(CopyError::NotCopyable {
                type_name: "Str".to_owned()
            })
        );
        assert!(space.shallow_clone(&Value::Int(1)).is_err());
    }
}
