//! Type descriptors and the built-in immutable and document types.

mod decimal;
mod document;
mod registry;

pub use decimal::Decimal;
pub use document::{DocumentError, XmlElement, XmlNode};
pub use registry::{FieldDef, FieldDescriptor, FieldType, TypeDef, TypeId, TypeKind, TypeRegistry, Visibility};
