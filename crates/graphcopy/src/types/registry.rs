//! Explicitly registered type descriptors.
//!
//! Rust has no runtime reflection, so every composite type that can appear in an
//! object graph is described up front: its kind (class, struct or enum), its
//! base class, and its declared fields. The registry turns those descriptors
//! into flattened instance layouts (one slot per field of the whole inheritance
//! chain, base first) which the object space and the introspector work from.
//!
//! Types can reference each other (and themselves) before they are defined:
//! [`TypeRegistry::declare`] reserves an id, [`TypeRegistry::define`] fills it in.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    error::{CopyError, CopyResult, SchemaError},
    fields::FieldSetCache,
    types::Decimal,
    value::{StructValue, Value},
};

/// Index of a type inside a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which family a registered type belongs to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    /// Reference type: instances live on the heap and carry identity.
    Class,
    /// Value type: instances are stored inline and copied on assignment.
    Struct,
    /// Enumeration: values are immutable discriminants.
    Enum { variants: Vec<String> },
}

/// Declared visibility of a field. Purely descriptive: copies visit every field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Declared (static) type of a field or array element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Char,
    Decimal,
    BigInt,
    Complex,
    Uuid,
    DateTime,
    Date,
    Time,
    Duration,
    DateTimeOffset,
    /// Immutable text.
    Str,
    /// Reflection metadata (a [`TypeId`] value).
    Type,
    Enum(TypeId),
    Struct(TypeId),
    Class(TypeId),
    /// Any reference-typed value.
    Object,
    Array {
        element: Box<FieldType>,
        rank: usize,
    },
    Callable,
    Document,
    /// Opaque host resource handle.
    Host,
}

impl FieldType {
    /// Shorthand for an array type of the given element type and rank.
    #[must_use]
    pub fn array(element: Self, rank: usize) -> Self {
        Self::Array {
            element: Box::new(element),
            rank,
        }
    }

    /// Returns true when slots of this declared type hold values rather than references.
    ///
    /// A value-type slot can never be the target of another reference, so the copy
    /// engine skips identity tracking for it.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int
                | Self::Float
                | Self::Char
                | Self::Decimal
                | Self::BigInt
                | Self::Complex
                | Self::Uuid
                | Self::DateTime
                | Self::Date
                | Self::Time
                | Self::Duration
                | Self::DateTimeOffset
                | Self::Enum(_)
                | Self::Struct(_)
        )
    }
}

/// One declared field of a type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Descriptor of a single registered type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<TypeId>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Marks the type as deeply immutable, which puts it on the atomic whitelist.
    #[serde(default)]
    pub immutable: bool,
}

impl TypeDef {
    /// Starts a class (reference type) definition.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Starts a struct (value type) definition.
    #[must_use]
    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Struct)
    }

    /// Defines an enumeration with the given variant names.
    #[must_use]
    pub fn enumeration<S: Into<String>>(name: impl Into<String>, variants: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            name,
            TypeKind::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        )
    }

    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            fields: Vec::new(),
            immutable: false,
        }
    }

    /// Sets the base class.
    #[must_use]
    pub fn extends(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    /// Adds a public field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field_with(name, ty, Visibility::Public)
    }

    /// Adds a protected field.
    #[must_use]
    pub fn protected_field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field_with(name, ty, Visibility::Protected)
    }

    /// Adds a private field.
    #[must_use]
    pub fn private_field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.field_with(name, ty, Visibility::Private)
    }

    /// Adds a field with an explicit visibility.
    #[must_use]
    pub fn field_with(mut self, name: impl Into<String>, ty: FieldType, visibility: Visibility) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
            visibility,
        });
        self
    }

    /// Marks the type as deeply immutable.
    #[must_use]
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }
}

/// A field as it appears in a flattened instance layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// The type in the inheritance chain that declares this field.
    pub owner: TypeId,
    pub name: Arc<str>,
    /// Position of the field's value in the instance's slot vector.
    pub slot: usize,
    pub ty: FieldType,
    pub visibility: Visibility,
}

#[derive(Debug)]
struct TypeEntry {
    name: String,
    def: Option<TypeDef>,
    /// All fields of the inheritance chain, base first. Set together with `def`.
    layout: Arc<[FieldDescriptor]>,
}

/// Registry of type descriptors.
///
/// The registry is `Send + Sync`: object spaces on different threads can share one
/// through an `Arc`, together with its field-set cache.
#[derive(Debug)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
    names: IndexMap<String, TypeId>,
    field_cache: Arc<FieldSetCache>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            names: IndexMap::new(),
            field_cache: Arc::new(FieldSetCache::new()),
        }
    }

    /// Reserves an id for a type so fields can reference it before it is defined.
    pub fn declare(&mut self, name: impl Into<String>) -> Result<TypeId, SchemaError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }
        let id = Self::next_id(self.entries.len())?;
        self.names.insert(name.clone(), id);
        self.entries.push(TypeEntry {
            name,
            def: None,
            layout: Arc::from(Vec::new()),
        });
        Ok(id)
    }

    fn next_id(len: usize) -> Result<TypeId, SchemaError> {
        u32::try_from(len).map(TypeId).map_err(|_| SchemaError::TooManyTypes)
    }

    /// Provides the definition for a previously declared type.
    ///
    /// A base class must already be defined, as must any struct or enum used as a
    /// field type (value-type layouts are needed up front). Classes may be referenced
    /// while still undefined.
    pub fn define(&mut self, id: TypeId, def: TypeDef) -> Result<(), SchemaError> {
        let entry = self.entries.get(id.index()).ok_or(SchemaError::UnknownType(id))?;
        if entry.def.is_some() {
            return Err(SchemaError::AlreadyDefined(entry.name.clone()));
        }
        if entry.name != def.name {
            return Err(SchemaError::NameMismatch {
                declared: entry.name.clone(),
                defined: def.name,
            });
        }
        self.validate(id, &def)?;

        let mut layout: Vec<FieldDescriptor> = match def.base {
            Some(base) => self.entries[base.index()].layout.to_vec(),
            None => Vec::new(),
        };
        for field in &def.fields {
            layout.push(FieldDescriptor {
                owner: id,
                name: Arc::from(field.name.as_str()),
                slot: layout.len(),
                ty: field.ty.clone(),
                visibility: field.visibility,
            });
        }

        let entry = &mut self.entries[id.index()];
        entry.layout = Arc::from(layout);
        entry.def = Some(def);
        Ok(())
    }

    /// Declares and defines a type in one step.
    pub fn register(&mut self, def: TypeDef) -> Result<TypeId, SchemaError> {
        let id = self.declare(def.name.clone())?;
        self.define(id, def)?;
        Ok(id)
    }

    fn validate(&self, id: TypeId, def: &TypeDef) -> Result<(), SchemaError> {
        if let Some(base) = def.base {
            if def.kind != TypeKind::Class {
                return Err(SchemaError::BaseNotAllowed(def.name.clone()));
            }
            let base_entry = self.entries.get(base.index()).ok_or(SchemaError::UnknownType(base))?;
            if !matches!(base_entry.def, Some(TypeDef { kind: TypeKind::Class, .. })) {
                return Err(SchemaError::InvalidBase {
                    type_name: def.name.clone(),
                    base: base_entry.name.clone(),
                });
            }
        }
        if matches!(def.kind, TypeKind::Enum { .. }) && !def.fields.is_empty() {
            return Err(SchemaError::FieldsNotAllowed(def.name.clone()));
        }
        for (i, field) in def.fields.iter().enumerate() {
            if def.fields[..i].iter().any(|earlier| earlier.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    type_name: def.name.clone(),
                    field: field.name.clone(),
                });
            }
            self.validate_field_type(id, def, &field.name, &field.ty)?;
        }
        Ok(())
    }

    fn validate_field_type(&self, id: TypeId, def: &TypeDef, field: &str, ty: &FieldType) -> Result<(), SchemaError> {
        let mismatch = |expected: &'static str| SchemaError::KindMismatch {
            type_name: def.name.clone(),
            field: field.to_owned(),
            expected,
        };
        match ty {
            FieldType::Enum(target) => match self.definition(*target)? {
                Some(TypeDef {
                    kind: TypeKind::Enum { .. },
                    ..
                }) => Ok(()),
                _ => Err(mismatch("a defined enum")),
            },
            FieldType::Struct(target) => {
                if *target == id {
                    return Err(mismatch("a struct other than itself"));
                }
                match self.definition(*target)? {
                    Some(TypeDef {
                        kind: TypeKind::Struct, ..
                    }) => Ok(()),
                    _ => Err(mismatch("a defined struct")),
                }
            }
            FieldType::Class(target) => {
                if *target == id {
                    return if def.kind == TypeKind::Class {
                        Ok(())
                    } else {
                        Err(mismatch("a class"))
                    };
                }
                match self.definition(*target)? {
                    None
                    | Some(TypeDef {
                        kind: TypeKind::Class, ..
                    }) => Ok(()),
                    Some(_) => Err(mismatch("a class")),
                }
            }
            FieldType::Array { element, rank } => {
                if *rank == 0 {
                    return Err(SchemaError::ZeroRank {
                        type_name: def.name.clone(),
                        field: field.to_owned(),
                    });
                }
                self.validate_field_type(id, def, field, element)
            }
            _ => Ok(()),
        }
    }

    fn definition(&self, id: TypeId) -> Result<Option<&TypeDef>, SchemaError> {
        self.entries
            .get(id.index())
            .map(|entry| entry.def.as_ref())
            .ok_or(SchemaError::UnknownType(id))
    }

    /// Looks up a type id by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).copied()
    }

    /// Returns the number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no types are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the definition of a type.
    pub fn get(&self, id: TypeId) -> CopyResult<&TypeDef> {
        let entry = self.entries.get(id.index()).ok_or(CopyError::UnknownType(id))?;
        entry.def.as_ref().ok_or_else(|| CopyError::UndefinedType {
            name: entry.name.clone(),
        })
    }

    /// Returns the name of a type, or `"?"` for ids from another registry.
    #[must_use]
    pub fn name(&self, id: TypeId) -> &str {
        self.entries.get(id.index()).map_or("?", |entry| entry.name.as_str())
    }

    /// Returns the flattened instance layout of a type: all fields of the whole
    /// inheritance chain, base first, indexed by slot.
    pub fn layout(&self, id: TypeId) -> CopyResult<&Arc<[FieldDescriptor]>> {
        self.get(id)?;
        Ok(&self.entries[id.index()].layout)
    }

    /// Returns the inheritance chain of a type, most derived first.
    pub fn ancestry(&self, id: TypeId) -> CopyResult<Vec<TypeId>> {
        let mut chain = vec![id];
        let mut current = self.get(id)?;
        while let Some(base) = current.base {
            chain.push(base);
            current = self.get(base)?;
        }
        Ok(chain)
    }

    /// Finds a field by name, searching from the most derived type towards the root.
    pub fn find_field(&self, id: TypeId, name: &str) -> CopyResult<&FieldDescriptor> {
        self.layout(id)?
            .iter()
            .rev()
            .find(|field| &*field.name == name)
            .ok_or_else(|| CopyError::NoSuchField {
                type_name: self.name(id).to_owned(),
                field: name.to_owned(),
            })
    }

    /// Finds a field declared by a specific type of the chain. Needed to reach a base
    /// class field that is hidden by a derived field of the same name.
    pub fn find_declared_field(&self, id: TypeId, owner: TypeId, name: &str) -> CopyResult<&FieldDescriptor> {
        self.layout(id)?
            .iter()
            .find(|field| field.owner == owner && &*field.name == name)
            .ok_or_else(|| CopyError::NoSuchField {
                type_name: self.name(owner).to_owned(),
                field: name.to_owned(),
            })
    }

    /// Returns the default value stored in a fresh slot of the given declared type.
    pub fn default_value(&self, ty: &FieldType) -> CopyResult<Value> {
        let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        Ok(match ty {
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Char => Value::Char('\0'),
            FieldType::Decimal => Value::Decimal(Decimal::zero()),
            FieldType::BigInt => Value::BigInt(num_bigint::BigInt::ZERO),
            FieldType::Complex => Value::Complex(num_complex::Complex64::new(0.0, 0.0)),
            FieldType::Uuid => Value::Uuid(uuid::Uuid::nil()),
            FieldType::DateTime => Value::DateTime(epoch.naive_utc()),
            FieldType::Date => Value::Date(epoch.date_naive()),
            FieldType::Time => Value::Time(epoch.time()),
            FieldType::Duration => Value::Duration(chrono::TimeDelta::zero()),
            FieldType::DateTimeOffset => Value::DateTimeOffset(epoch.fixed_offset()),
            FieldType::Enum(id) => Value::Enum {
                ty: *id,
                discriminant: 0,
            },
            FieldType::Struct(id) => Value::Struct(self.default_struct(*id)?),
            FieldType::Str
            | FieldType::Type
            | FieldType::Class(_)
            | FieldType::Object
            | FieldType::Array { .. }
            | FieldType::Callable
            | FieldType::Document
            | FieldType::Host => Value::None,
        })
    }

    /// Builds a struct value with every field at its default.
    pub fn default_struct(&self, id: TypeId) -> CopyResult<StructValue> {
        let layout = self.layout(id)?;
        let fields = layout
            .iter()
            .map(|field| self.default_value(&field.ty))
            .collect::<CopyResult<Vec<_>>>()?;
        Ok(StructValue::new(id, fields))
    }

    /// Returns the cache of deep-copyable field sets shared by every copy that uses
    /// this registry.
    #[must_use]
    pub fn field_cache(&self) -> &Arc<FieldSetCache> {
        &self.field_cache
    }

    /// Loads a registry from a JSON array of type definitions.
    ///
    /// Type ids are the positions in the array, so a definition can reference any
    /// type by index. Bases, structs and enums must appear before their users.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let defs: Vec<TypeDef> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        let ids = defs
            .iter()
            .map(|def| registry.declare(def.name.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        for (id, def) in ids.into_iter().zip(defs) {
            registry.define(id, def)?;
        }
        Ok(registry)
    }

    /// Dumps every definition as a JSON array readable by [`Self::from_json`].
    pub fn to_json(&self) -> Result<String, SchemaError> {
        let defs = self
            .entries
            .iter()
            .map(|entry| {
                entry
                    .def
                    .as_ref()
                    .ok_or_else(|| SchemaError::Json(format!("type '{}' is declared but undefined", entry.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(serde_json::to_string_pretty(&defs)?)
    }
}
