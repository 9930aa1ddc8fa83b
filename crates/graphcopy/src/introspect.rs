//! The seam between the copy engine and the object model it copies.
//!
//! The engine never touches objects directly. Everything it needs (what a
//! value is, which fields a type has, how to read and write them, how to make
//! a shallow duplicate) goes through [`Introspect`]. [`ObjectSpace`](crate::ObjectSpace)
//! is the stock implementation; wrappers can implement the trait to observe or
//! restrict a copy.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    classify::Classification,
    error::CopyResult,
    fields::FieldSetCache,
    types::{FieldDescriptor, FieldType, TypeId},
    value::Value,
};

/// Shape of an array: one length per dimension.
pub type Shape = SmallVec<[usize; 2]>;

/// Type introspection and object access used by the copy engine.
///
/// Every failure is returned as a [`CopyError`](crate::CopyError); the engine
/// propagates it unchanged and abandons the copy.
pub trait Introspect {
    /// Returns true when no value of the declared type ever needs copying.
    fn is_atomic(&self, ty: &FieldType) -> bool;

    /// Classifies a runtime value.
    fn classify(&self, value: &Value) -> CopyResult<Classification>;

    /// Returns every instance field of a type, including inherited fields of
    /// every visibility, walking from the type itself up to the root of its
    /// inheritance chain.
    fn fields_of(&self, ty: TypeId) -> CopyResult<Vec<FieldDescriptor>>;

    /// Reads a field of an instance or struct value.
    fn get_field(&self, object: &Value, field: &FieldDescriptor) -> CopyResult<Value>;

    /// Writes a field. Struct values are updated in place; for references the
    /// heap object behind `object` is updated.
    fn set_field(&mut self, object: &mut Value, field: &FieldDescriptor, value: Value) -> CopyResult<()>;

    /// Produces a memberwise duplicate: a new heap object for references, a
    /// by-value copy for structs. Contents still refer to the original's targets.
    fn shallow_clone(&mut self, value: &Value) -> CopyResult<Value>;

    /// Returns the declared element type and the shape of an array.
    fn array_layout(&self, array: &Value) -> CopyResult<(FieldType, Shape)>;

    /// Reads an element by multi-dimensional index.
    fn get_element(&self, array: &Value, index: &[usize]) -> CopyResult<Value>;

    /// Writes an element by multi-dimensional index.
    fn set_element(&mut self, array: &Value, index: &[usize], value: Value) -> CopyResult<()>;

    /// Clones a document node with the document subsystem's own primitive.
    fn clone_document(&mut self, document: &Value) -> CopyResult<Value>;

    /// Called before each shallow duplicate with the current nesting depth.
    fn check_recursion_depth(&self, _depth: usize) -> CopyResult<()> {
        Ok(())
    }

    /// A field-set cache that outlives a single copy, if the implementation keeps one.
    ///
    /// When `None`, each copy computes field sets into a private cache.
    fn shared_field_cache(&self) -> Option<Arc<FieldSetCache>> {
        None
    }
}
