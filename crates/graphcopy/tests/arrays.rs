//! Arrays of any rank, jagged arrays and arrays of structs.

use std::sync::Arc;

use graphcopy::{FieldType, Introspect, ObjectSpace, TypeDef, TypeId, TypeRegistry, Value};
use pretty_assertions::assert_eq;

fn space() -> (ObjectSpace, TypeId, TypeId) {
    let mut registry = TypeRegistry::new();
    let wrapper = registry
        .register(TypeDef::class("Wrapper").field("value", FieldType::Int))
        .unwrap();
    let cell = registry
        .register(
            TypeDef::structure("Cell")
                .field("weight", FieldType::Float)
                .field("payload", FieldType::Object),
        )
        .unwrap();
    (ObjectSpace::new(Arc::new(registry)), wrapper, cell)
}

fn wrapper(space: &mut ObjectSpace, ty: TypeId, value: i64) -> Value {
    let mut object = space.new_object(ty).unwrap();
    space.set(&mut object, "value", Value::Int(value)).unwrap();
    object
}

/// A 2x2 array of wrappers copies into a new array of new, equal wrappers.
#[test]
fn two_dimensional_array_of_wrappers() {
    let (mut space, ty, _) = space();
    let grid = space.new_array(FieldType::Class(ty), &[2, 2]).unwrap();
    for (i, j, value) in [(0, 0, 1), (0, 1, 2), (1, 0, 3), (1, 1, 4)] {
        let element = wrapper(&mut space, ty, value);
        space.set_element(&grid, &[i, j], element).unwrap();
    }

    let copy = space.deep_copy(&grid).unwrap();
    assert_ne!(copy, grid);
    assert_eq!(space.array(&copy).unwrap().shape(), &[2, 2]);
    for i in 0..2 {
        for j in 0..2 {
            let original = space.get_element(&grid, &[i, j]).unwrap();
            let copied = space.get_element(&copy, &[i, j]).unwrap();
            assert_ne!(copied, original);
            assert_eq!(space.get(&copied, "value").unwrap(), space.get(&original, "value").unwrap());
        }
    }
}

/// A rank-3 array keeps its element positions and sharing between positions.
#[test]
fn rank_three_array_preserves_positions_and_sharing() {
    let (mut space, ty, _) = space();
    let cube = space.new_array(FieldType::Object, &[2, 3, 4]).unwrap();
    let shared = wrapper(&mut space, ty, -1);
    for i in 0..2 {
        for j in 0..3 {
            for k in 0..4 {
                let value = i64::try_from(i * 100 + j * 10 + k).unwrap();
                let element = wrapper(&mut space, ty, value);
                space.set_element(&cube, &[i, j, k], element).unwrap();
            }
        }
    }
    space.set_element(&cube, &[0, 0, 0], shared.clone()).unwrap();
    space.set_element(&cube, &[1, 2, 3], shared.clone()).unwrap();

    let copy = space.deep_copy(&cube).unwrap();
    assert!(space.structurally_eq(&cube, &copy).unwrap());
    let value = space.get_element(&copy, &[1, 0, 2]).unwrap();
    assert_eq!(space.get(&value, "value").unwrap(), Value::Int(102));

    let first = space.get_element(&copy, &[0, 0, 0]).unwrap();
    let last = space.get_element(&copy, &[1, 2, 3]).unwrap();
    assert_eq!(first, last);
    assert_ne!(first, shared);
    assert!(space.reachable(&cube).unwrap().is_disjoint(&space.reachable(&copy).unwrap()));
}

/// A jagged array (array of arrays) copies each row, preserving a shared row.
#[test]
fn jagged_array_with_shared_row() {
    let (mut space, ..) = space();
    let row = |space: &mut ObjectSpace, items: &[i64]| {
        space
            .array_from(FieldType::Int, items.iter().copied().map(Value::Int).collect())
            .unwrap()
    };
    let short = row(&mut space, &[1]);
    let long = row(&mut space, &[2, 3, 4]);
    let jagged = space
        .array_from(
            FieldType::array(FieldType::Int, 1),
            vec![short.clone(), long.clone(), short.clone()],
        )
        .unwrap();

    let copy = space.deep_copy(&jagged).unwrap();
    let rows: Vec<Value> = (0..3).map(|i| space.get_element(&copy, &[i]).unwrap()).collect();
    assert_ne!(rows[0], short);
    assert_ne!(rows[1], long);
    assert_eq!(rows[0], rows[2], "one original row, one copied row");
    assert_eq!(space.array(&rows[1]).unwrap().items(), &[Value::Int(2), Value::Int(3), Value::Int(4)]);
}

/// Struct elements are copied by value; references inside them are deep-copied.
#[test]
fn array_of_structs() {
    let (mut space, ty, cell) = space();
    let payload = wrapper(&mut space, ty, 9);
    let mut element = space.new_struct(cell).unwrap();
    space.set(&mut element, "weight", Value::Float(0.5)).unwrap();
    space.set(&mut element, "payload", payload.clone()).unwrap();

    let cells = space.new_array(FieldType::Struct(cell), &[2]).unwrap();
    space.set_element(&cells, &[0], element.clone()).unwrap();
    space.set_element(&cells, &[1], element).unwrap();

    let copy = space.deep_copy(&cells).unwrap();
    let first = space.get_element(&copy, &[0]).unwrap();
    let second = space.get_element(&copy, &[1]).unwrap();
    assert_eq!(space.get(&first, "weight").unwrap(), Value::Float(0.5));

    let first_payload = space.get(&first, "payload").unwrap();
    assert_ne!(first_payload, payload);
    assert_eq!(
        space.get(&second, "payload").unwrap(),
        first_payload,
        "both struct copies reach the same payload copy"
    );
}

/// Arrays whose element type is atomic keep their elements as is.
#[test]
fn atomic_element_arrays_share_elements() {
    let (mut space, ..) = space();
    let a = space.alloc_str("a").unwrap();
    let b = space.alloc_str("b").unwrap();
    let strings = space.array_from(FieldType::Str, vec![a.clone(), b.clone()]).unwrap();

    let copy = space.deep_copy(&strings).unwrap();
    assert_ne!(copy, strings);
    assert_eq!(space.array(&copy).unwrap().items(), &[a, b]);
}

/// Empty arrays and arrays with an empty dimension copy to equally shaped arrays.
#[test]
fn empty_arrays() {
    let (mut space, ty, _) = space();
    let empty = space.array_from(FieldType::Object, Vec::new()).unwrap();
    let flat = space.new_array(FieldType::Class(ty), &[3, 0]).unwrap();

    let empty_copy = space.deep_copy(&empty).unwrap();
    let flat_copy = space.deep_copy(&flat).unwrap();
    assert_ne!(empty_copy, empty);
    assert!(space.array(&empty_copy).unwrap().items().is_empty());
    assert_eq!(space.array(&flat_copy).unwrap().shape(), &[3, 0]);
}

/// Arrays of polymorphic slots classify each element by its runtime value.
#[test]
fn object_array_mixes_atomic_and_composite_elements() {
    let (mut space, ty, _) = space();
    let text = space.alloc_str("shared text").unwrap();
    let object = wrapper(&mut space, ty, 1);
    let mixed = space
        .array_from(FieldType::Object, vec![Value::Int(5), text.clone(), object.clone(), Value::None])
        .unwrap();

    let copy = space.deep_copy(&mixed).unwrap();
    let items = space.array(&copy).unwrap().items().to_vec();
    assert_eq!(items[0], Value::Int(5));
    assert_eq!(items[1], text);
    assert_ne!(items[2], object);
    assert_eq!(items[3], Value::None);
}
