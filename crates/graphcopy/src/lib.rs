#![doc = include_str!("../../../README.md")]

mod classify;
mod compare;
mod copy;
mod error;
mod fields;
mod heap;
mod identity;
mod introspect;
mod resource;
mod space;
pub mod tracer;
pub mod types;
mod value;

pub use crate::{
    classify::Classification,
    copy::{deep_copy, deep_copy_traced},
    error::{CopyError, CopyResult, SchemaError},
    fields::FieldSetCache,
    heap::{ArrayObject, Callable, CallableFn, Heap, HeapData, HeapId, HeapStats, HostObject, Instance},
    identity::IdentityMap,
    introspect::{Introspect, Shape},
    resource::{
        DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker,
    },
    space::ObjectSpace,
    tracer::{CopyTracer, NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent},
    types::{
        Decimal, DocumentError, FieldDef, FieldDescriptor, FieldType, TypeDef, TypeId, TypeKind, TypeRegistry,
        Visibility, XmlElement, XmlNode,
    },
    value::{StructValue, Value},
};
