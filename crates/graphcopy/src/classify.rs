//! Decides how the copy engine treats a value or a declared type.

use crate::{
    error::{CopyError, CopyResult},
    heap::HeapData,
    types::{FieldType, TypeId, TypeRegistry},
    value::Value,
};

/// How the copy engine treats a runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    /// Returned unchanged: null, primitives, whitelisted immutable types, strings,
    /// type metadata, host handles, and types registered as immutable.
    Atomic,
    /// Cannot be duplicated; the copy holds null in its place.
    OpaqueSpecial,
    /// Cloned by the document subsystem and never tracked.
    Document,
    /// Heap array of any rank.
    Array,
    /// Field-bearing object, walked field by field.
    Composite { ty: TypeId },
}

/// Classifies a runtime value.
pub(crate) fn classify_value(types: &TypeRegistry, value: &Value, object: Option<&HeapData>) -> CopyResult<Classification> {
    Ok(match value {
        Value::Struct(s) => {
            if types.get(s.ty())?.immutable {
                Classification::Atomic
            } else {
                Classification::Composite { ty: s.ty() }
            }
        }
        Value::Ref(id) => match object {
            Some(HeapData::Instance(instance)) => {
                if types.get(instance.ty())?.immutable {
                    Classification::Atomic
                } else {
                    Classification::Composite { ty: instance.ty() }
                }
            }
            Some(HeapData::Array(_)) => Classification::Array,
            Some(HeapData::Callable(_)) => Classification::OpaqueSpecial,
            Some(HeapData::Document(_)) => Classification::Document,
            Some(HeapData::Str(_) | HeapData::Host(_)) => Classification::Atomic,
            None => return Err(CopyError::DanglingRef(*id)),
        },
        _ => Classification::Atomic,
    })
}

/// Returns true when every value of the declared type is atomic, so a field of
/// that type never needs to be visited.
///
/// Callables and documents are not atomic: the field has to be visited so the
/// callable can be dropped and the document cloned. Polymorphic declarations
/// (`Object`, classes, arrays) are never atomic: a field declared as an immutable
/// class may still hold a mutable subclass, so only the runtime value decides.
pub(crate) fn declared_is_atomic(types: &TypeRegistry, ty: &FieldType) -> bool {
    match ty {
        FieldType::Bool
        | FieldType::Int
        | FieldType::Float
        | FieldType::Char
        | FieldType::Decimal
        | FieldType::BigInt
        | FieldType::Complex
        | FieldType::Uuid
        | FieldType::DateTime
        | FieldType::Date
        | FieldType::Time
        | FieldType::Duration
        | FieldType::DateTimeOffset
        | FieldType::Str
        | FieldType::Type
        | FieldType::Enum(_)
        | FieldType::Host => true,
        FieldType::Struct(id) => types.get(*id).is_ok_and(|def| def.immutable),
        FieldType::Class(_)
        | FieldType::Object
        | FieldType::Array { .. }
        | FieldType::Callable
        | FieldType::Document => false,
    }
}
