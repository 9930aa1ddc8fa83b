use std::sync::Arc;

#[cfg(codspeed)]
use codspeed_criterion_compat::{Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use graphcopy::{FieldType, Introspect, ObjectSpace, TypeDef, TypeId, TypeRegistry, Value};

fn registry() -> (Arc<TypeRegistry>, TypeId) {
    let mut types = TypeRegistry::new();
    let node = types.declare("Node").unwrap();
    types
        .define(
            node,
            TypeDef::class("Node")
                .field("value", FieldType::Int)
                .field("next", FieldType::Class(node))
                .field("children", FieldType::array(FieldType::Class(node), 1)),
        )
        .unwrap();
    (Arc::new(types), node)
}

/// A ring of `len` nodes, each also holding an array of two neighbours.
fn ring(space: &mut ObjectSpace, node: TypeId, len: usize) -> Value {
    let mut nodes: Vec<Value> = (0..len).map(|_| space.new_object(node).unwrap()).collect();
    for i in 0..len {
        let next = nodes[(i + 1) % len].clone();
        let children = space.new_array(FieldType::Class(node), &[2]).unwrap();
        space.set_element(&children, &[0], next.clone()).unwrap();
        space.set_element(&children, &[1], nodes[(i + len - 1) % len].clone()).unwrap();
        space.set(&mut nodes[i], "next", next).unwrap();
        space.set(&mut nodes[i], "children", children).unwrap();
        space.set(&mut nodes[i], "value", Value::Int(i64::try_from(i).unwrap())).unwrap();
    }
    nodes.swap_remove(0)
}

fn copy_ring(c: &mut Criterion) {
    let (types, node) = registry();
    let mut space = ObjectSpace::new(types);
    let head = ring(&mut space, node, 1_000);

    c.bench_function("copy_ring_1000", |b| {
        b.iter(|| {
            // every copy grows the arena, so start from a fresh space each round
            let mut scratch = ObjectSpace::new(Arc::clone(space.types()));
            let head = ring(&mut scratch, node, 1_000);
            black_box(scratch.deep_copy(&head).unwrap());
        });
    });

    c.bench_function("copy_int_grid_100x100", |b| {
        let grid = space.new_array(FieldType::Int, &[100, 100]).unwrap();
        b.iter(|| black_box(space.deep_copy(&grid).unwrap()));
    });

    c.bench_function("copy_object_grid_100x100", |b| {
        let grid = space.new_array(FieldType::Object, &[100, 100]).unwrap();
        for i in 0..100 {
            space.set_element(&grid, &[i, i], head.clone()).unwrap();
        }
        b.iter(|| black_box(space.deep_copy(&grid).unwrap()));
    });
}

criterion_group!(benches, copy_ring);
criterion_main!(benches);
