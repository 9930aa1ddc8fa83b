//! Arena that owns every object with identity.
//!
//! Objects are never freed individually: a heap lives as long as the object
//! space that owns it, so a [`HeapId`] stays valid for the heap's whole lifetime
//! and doubles as the object's identity for the copy engine's visited set.

use std::{any::Any, collections::BTreeMap, fmt, mem, sync::Arc};

use smallvec::SmallVec;

use crate::{
    resource::{ResourceError, ResourceTracker},
    types::{FieldType, TypeId, XmlElement},
    value::Value,
};

/// Unique identifier for objects stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// An instance of a registered class.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub(crate) ty: TypeId,
    /// One value per slot of the class layout, base fields first.
    pub(crate) slots: Vec<Value>,
}

impl Instance {
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[must_use]
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }
}

/// A rectangular array of any rank, stored in row-major order.
///
/// Jagged arrays are rank-1 arrays whose elements are themselves arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayObject {
    pub(crate) element: FieldType,
    pub(crate) shape: SmallVec<[usize; 2]>,
    pub(crate) items: Vec<Value>,
}

impl ArrayObject {
    /// Declared element type.
    #[must_use]
    pub fn element(&self) -> &FieldType {
        &self.element
    }

    /// Length of each dimension.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// All elements in row-major order.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Converts a multi-dimensional index to a flat offset, or `None` when the index
    /// has the wrong rank or is out of bounds.
    #[must_use]
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        for (&i, &len) in index.iter().zip(&self.shape) {
            if i >= len {
                return None;
            }
            offset = offset * len + i;
        }
        Some(offset)
    }
}

/// Signature of a callable stored on the heap.
pub type CallableFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A function value. Closures are not duplicable, so deep copies replace them with null.
#[derive(Clone)]
pub struct Callable {
    pub(crate) name: String,
    pub(crate) func: Arc<CallableFn>,
}

impl Callable {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the callable.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Opaque handle to a resource owned by the host (a socket, a file, a pointer).
///
/// Handles are atomic for copying purposes: a deep copy shares the same handle.
#[derive(Clone)]
pub struct HostObject {
    pub(crate) label: String,
    pub(crate) handle: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Downcasts the handle to a concrete type.
    #[must_use]
    pub fn downcast_ref<H: Any>(&self) -> Option<&H> {
        self.handle.downcast_ref()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject").field("label", &self.label).finish_non_exhaustive()
    }
}

/// HeapData captures every runtime object that needs identity.
///
/// `Clone` is a shallow, memberwise duplicate: slots and elements are copied
/// as values, so references inside them still point at the original targets.
#[derive(Debug, Clone, strum::IntoStaticStr)]
pub enum HeapData {
    /// Immutable text.
    Str(Box<str>),
    Instance(Instance),
    Array(ArrayObject),
    Callable(Callable),
    Document(XmlElement),
    Host(HostObject),
}

impl HeapData {
    /// Name of the variant, as reported in [`HeapStats::objects_by_type`].
    #[must_use]
    pub fn variant_name(&self) -> &'static str {
        self.into()
    }

    /// Approximate size in bytes, charged to the resource tracker on allocation.
    #[must_use]
    pub fn estimate_size(&self) -> usize {
        let payload = match self {
            Self::Str(s) => s.len(),
            Self::Instance(instance) => instance.slots.len() * mem::size_of::<Value>(),
            Self::Array(array) => array.items.len() * mem::size_of::<Value>(),
            Self::Callable(callable) => callable.name.len(),
            Self::Document(element) => element.element_count() * mem::size_of::<XmlElement>(),
            Self::Host(host) => host.label.len(),
        };
        mem::size_of::<Self>() + payload
    }
}

/// Snapshot of heap state at a point in time.
///
/// The `objects_by_type` map uses `BTreeMap` for deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Breakdown of live objects by `HeapData` variant name.
    pub objects_by_type: BTreeMap<&'static str, usize>,
    /// Resource tracker allocation count, if the tracker records one.
    pub tracker_allocations: Option<usize>,
    /// Resource tracker memory usage in bytes, if the tracker records it.
    pub tracker_memory_bytes: Option<usize>,
}

/// Arena of heap objects, generic over the tracker that polices its growth.
#[derive(Debug)]
pub struct Heap<T: ResourceTracker> {
    entries: Vec<HeapData>,
    tracker: T,
}

impl<T: ResourceTracker> Heap<T> {
    /// Creates an empty heap.
    pub fn new(tracker: T) -> Self {
        Self {
            entries: Vec::new(),
            tracker,
        }
    }

    /// Allocates a new heap entry.
    ///
    /// Returns `Err(ResourceError)` if the allocation would exceed configured limits.
    pub fn allocate(&mut self, data: HeapData) -> Result<HeapId, ResourceError> {
        self.tracker.on_allocate(|| data.estimate_size())?;
        let id = HeapId(self.entries.len());
        self.entries.push(data);
        Ok(id)
    }

    /// Returns the object behind an id, or `None` for ids from another heap.
    #[must_use]
    pub fn get(&self, id: HeapId) -> Option<&HeapData> {
        self.entries.get(id.index())
    }

    pub fn get_mut(&mut self, id: HeapId) -> Option<&mut HeapData> {
        self.entries.get_mut(id.index())
    }

    /// Number of objects on the heap.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Captures a snapshot of heap usage.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_type = BTreeMap::new();
        for data in &self.entries {
            *objects_by_type.entry(data.variant_name()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.entries.len(),
            objects_by_type,
            tracker_allocations: self.tracker.allocation_count(),
            tracker_memory_bytes: self.tracker.current_memory_bytes(),
        }
    }
}
