//! Runtime values stored in object slots, array elements and on the caller's side.
//!
//! Immutable data lives inline. Anything with identity (instances, arrays,
//! strings, callables, documents, host handles) lives on the heap and is
//! reached through [`Value::Ref`]. Struct values are stored inline and have no
//! identity of their own.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use num_bigint::BigInt;
use num_complex::Complex64;
use uuid::Uuid;

use crate::{
    heap::HeapId,
    types::{Decimal, TypeId},
};

/// A value as seen by the copy engine.
///
/// `Clone` is shallow: cloning a `Ref` yields another reference to the same heap
/// object, and cloning a `Struct` duplicates its slots (references inside it
/// remain shared).
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Value {
    /// The null reference.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Enum { ty: TypeId, discriminant: i64 },
    Decimal(Decimal),
    BigInt(BigInt),
    Complex(Complex64),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Duration(TimeDelta),
    DateTimeOffset(DateTime<FixedOffset>),
    /// Reflection metadata describing a registered type.
    Type(TypeId),
    /// An inline value-type instance.
    Struct(StructValue),
    /// Reference to a heap object.
    Ref(HeapId),
}

impl Value {
    /// Returns the heap id if this value is a reference.
    #[inline]
    #[must_use]
    pub fn heap_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true for the null reference.
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Name of the variant, used in error messages and traces.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.into()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<Complex64> for Value {
    fn from(value: Complex64) -> Self {
        Self::Complex(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<TimeDelta> for Value {
    fn from(value: TimeDelta) -> Self {
        Self::Duration(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTimeOffset(value)
    }
}

impl From<StructValue> for Value {
    fn from(value: StructValue) -> Self {
        Self::Struct(value)
    }
}

impl From<HeapId> for Value {
    fn from(value: HeapId) -> Self {
        Self::Ref(value)
    }
}

/// An inline struct instance: its type plus one value per layout slot.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    ty: TypeId,
    fields: Vec<Value>,
}

impl StructValue {
    /// Creates a struct value. `fields` must follow the type's layout order and
    /// fit its declared field types.
    #[must_use]
    pub(crate) fn new(ty: TypeId, fields: Vec<Value>) -> Self {
        Self { ty, fields }
    }

    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [Value] {
        &mut self.fields
    }
}
