//! Structural comparison of object graphs within one object space.
//!
//! Used to check that a copy has the same shape and content as its original
//! while sharing none of its mutable objects.

use std::sync::Arc;

use ahash::AHashSet;

use crate::{
    error::{CopyError, CopyResult},
    heap::{HeapData, HeapId},
    resource::ResourceTracker,
    space::ObjectSpace,
    value::Value,
};

impl<T: ResourceTracker> ObjectSpace<T> {
    /// Returns true when `a` and `b` are structurally equal.
    ///
    /// Instances and arrays are compared slot by slot, strings and documents by
    /// content, callables and host handles by identity. Cycles are handled by
    /// assuming a pair of objects already under comparison is equal.
    pub fn structurally_eq(&self, a: &Value, b: &Value) -> CopyResult<bool> {
        let mut assumed = AHashSet::new();
        self.values_eq(a, b, &mut assumed)
    }

    fn values_eq(&self, a: &Value, b: &Value, assumed: &mut AHashSet<(HeapId, HeapId)>) -> CopyResult<bool> {
        match (a, b) {
            (Value::Ref(x), Value::Ref(y)) => {
                if x == y || !assumed.insert((*x, *y)) {
                    return Ok(true);
                }
                self.objects_eq(self.lookup(*x)?, self.lookup(*y)?, assumed)
            }
            (Value::Struct(x), Value::Struct(y)) => {
                Ok(x.ty() == y.ty() && self.all_eq(x.fields(), y.fields(), assumed)?)
            }
            _ => Ok(a == b),
        }
    }

    fn objects_eq(&self, a: &HeapData, b: &HeapData, assumed: &mut AHashSet<(HeapId, HeapId)>) -> CopyResult<bool> {
        Ok(match (a, b) {
            (HeapData::Str(x), HeapData::Str(y)) => x == y,
            (HeapData::Instance(x), HeapData::Instance(y)) => {
                x.ty() == y.ty() && self.all_eq(x.slots(), y.slots(), assumed)?
            }
            (HeapData::Array(x), HeapData::Array(y)) => {
                x.element() == y.element() && x.shape() == y.shape() && self.all_eq(x.items(), y.items(), assumed)?
            }
            (HeapData::Callable(x), HeapData::Callable(y)) => Arc::ptr_eq(&x.func, &y.func),
            (HeapData::Document(x), HeapData::Document(y)) => x == y,
            (HeapData::Host(x), HeapData::Host(y)) => Arc::ptr_eq(&x.handle, &y.handle),
            _ => false,
        })
    }

    fn all_eq(&self, a: &[Value], b: &[Value], assumed: &mut AHashSet<(HeapId, HeapId)>) -> CopyResult<bool> {
        if a.len() != b.len() {
            return Ok(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !self.values_eq(x, y, assumed)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn lookup(&self, id: HeapId) -> CopyResult<&HeapData> {
        self.heap().get(id).ok_or(CopyError::DanglingRef(id))
    }

    /// Returns every heap object reachable from `root`, `root` included.
    pub fn reachable(&self, root: &Value) -> CopyResult<AHashSet<HeapId>> {
        let mut seen = AHashSet::new();
        let mut pending: Vec<Value> = vec![root.clone()];
        while let Some(value) = pending.pop() {
            match value {
                Value::Struct(s) => pending.extend(s.fields().iter().cloned()),
                Value::Ref(id) => {
                    if !seen.insert(id) {
                        continue;
                    }
                    match self.lookup(id)? {
                        HeapData::Instance(instance) => pending.extend(instance.slots().iter().cloned()),
                        HeapData::Array(array) => pending.extend(array.items().iter().cloned()),
                        HeapData::Str(_) | HeapData::Callable(_) | HeapData::Document(_) | HeapData::Host(_) => {}
                    }
                }
                _ => {}
            }
        }
        Ok(seen)
    }
}
