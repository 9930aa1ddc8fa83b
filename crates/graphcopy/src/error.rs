//! Error types surfaced by the object space and the copy engine.
//!
//! Copy failures are never recovered from: the engine propagates the first
//! introspection or resource error unchanged and returns no partial result.

use std::fmt;

use crate::{
    heap::HeapId,
    resource::ResourceError,
    types::{FieldType, TypeId},
};

/// Result alias used throughout the crate.
pub type CopyResult<T> = Result<T, CopyError>;

/// Failure raised by the type introspector or the copy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyError {
    /// The type id does not belong to the registry in use.
    UnknownType(TypeId),
    /// The type was declared but never given a definition.
    UndefinedType { name: String },
    /// The heap id does not belong to the heap in use.
    DanglingRef(HeapId),
    /// A field name or descriptor does not match the object's layout.
    NoSuchField { type_name: String, field: String },
    /// The value is not a field-bearing object (instance or struct).
    NotAnObject { found: &'static str },
    /// The value is not a heap array.
    NotAnArray { found: &'static str },
    /// An array index has the wrong rank or is outside the array's shape.
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },
    /// The type exists but is of the wrong kind for the operation.
    WrongKind { type_name: String, expected: &'static str },
    /// A value was written to a field or array element whose declared type it does not fit.
    TypeMismatch { expected: FieldType, found: &'static str },
    /// Array shapes need at least one dimension and a representable element count.
    InvalidShape(Vec<usize>),
    /// The introspector cannot produce a shallow duplicate of this value.
    NotCopyable { type_name: String },
    /// A resource limit was exceeded.
    Resource(ResourceError),
}

impl fmt::Display for CopyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(id) => write!(f, "unknown type id {}", id.index()),
            Self::UndefinedType { name } => write!(f, "type '{name}' was declared but never defined"),
            Self::DanglingRef(id) => write!(f, "heap id {} is not live in this object space", id.index()),
            Self::NoSuchField { type_name, field } => write!(f, "type '{type_name}' has no field '{field}'"),
            Self::NotAnObject { found } => write!(f, "expected an instance or struct, found {found}"),
            Self::NotAnArray { found } => write!(f, "expected an array, found {found}"),
            Self::IndexOutOfBounds { index, shape } => {
                write!(f, "index {index:?} is out of bounds for array of shape {shape:?}")
            }
            Self::WrongKind { type_name, expected } => write!(f, "type '{type_name}' is not {expected}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "a slot declared as {expected:?} cannot hold {found}")
            }
            Self::InvalidShape(shape) => write!(f, "invalid array shape {shape:?}"),
            Self::NotCopyable { type_name } => write!(f, "cannot shallow-copy a value of type '{type_name}'"),
            Self::Resource(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CopyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Resource(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for CopyError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

/// Error raised while registering type descriptors or loading a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A type with this name is already registered.
    DuplicateType(String),
    /// Two fields declared by the same type share a name.
    DuplicateField { type_name: String, field: String },
    /// The type id does not belong to this registry.
    UnknownType(TypeId),
    /// The type already has a definition.
    AlreadyDefined(String),
    /// Only classes may declare a base type.
    BaseNotAllowed(String),
    /// The base type is not a class.
    InvalidBase { type_name: String, base: String },
    /// `define` was given a definition whose name differs from the declared one.
    NameMismatch { declared: String, defined: String },
    /// Enumerations cannot declare fields.
    FieldsNotAllowed(String),
    /// A field's declared type references a type of the wrong kind.
    KindMismatch { type_name: String, field: String, expected: &'static str },
    /// Arrays must have rank 1 or more.
    ZeroRank { type_name: String, field: String },
    /// The registry already holds as many types as a [`TypeId`] can address.
    TooManyTypes,
    /// The JSON schema could not be parsed or produced.
    Json(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateType(name) => write!(f, "type '{name}' is already registered"),
            Self::DuplicateField { type_name, field } => {
                write!(f, "type '{type_name}' declares field '{field}' more than once")
            }
            Self::UnknownType(id) => write!(f, "unknown type id {}", id.index()),
            Self::AlreadyDefined(name) => write!(f, "type '{name}' is already defined"),
            Self::BaseNotAllowed(name) => write!(f, "type '{name}' is not a class and cannot have a base"),
            Self::InvalidBase { type_name, base } => {
                write!(f, "base '{base}' of type '{type_name}' is not a class")
            }
            Self::NameMismatch { declared, defined } => {
                write!(f, "type declared as '{declared}' cannot be defined as '{defined}'")
            }
            Self::FieldsNotAllowed(name) => write!(f, "enum '{name}' cannot declare fields"),
            Self::KindMismatch {
                type_name,
                field,
                expected,
            } => write!(f, "field '{type_name}.{field}' must reference {expected}"),
            Self::ZeroRank { type_name, field } => write!(f, "array field '{type_name}.{field}' has rank 0"),
            Self::TooManyTypes => write!(f, "type registry is full"),
            Self::Json(msg) => write!(f, "invalid type schema: {msg}"),
        }
    }
}

impl std::error::Error for SchemaError {}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
