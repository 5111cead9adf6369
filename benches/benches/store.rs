// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cell::Cell;
use std::rc::Rc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use trellis_data::{AggregateStore, Collection, PropertyStore, Slot};

/// An aggregate over a `lights` collection of `n` stores, with `listeners`
/// per-path subscribers on every `lights[i].diffuse`.
fn lights(n: usize, listeners: usize) -> (AggregateStore, Collection, Vec<Slot>, Rc<Cell<u64>>) {
    let data = AggregateStore::new();
    let collection = Collection::new("lights");
    data.add_collection(collection.clone());
    for i in 0..n {
        let light = PropertyStore::new();
        light.set("diffuse", i as f32).unwrap();
        collection.push_back(light);
    }

    let hits = Rc::new(Cell::new(0_u64));
    let mut slots = Vec::new();
    for i in 0..n {
        let path = format!("lights[{i}].diffuse");
        for _ in 0..listeners {
            let hits = hits.clone();
            slots.push(
                data.property_changed_at(&path)
                    .connect(move |_| hits.set(hits.get() + 1)),
            );
        }
    }
    (data, collection, slots, hits)
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");

    group.bench_function("set_existing", |b| {
        let store = PropertyStore::new();
        store.set("x", 0_u32).unwrap();
        let mut i = 0_u32;
        b.iter(|| {
            i = i.wrapping_add(1);
            store.set("x", black_box(i)).unwrap();
        });
    });

    for listeners in [1_usize, 8] {
        group.bench_function(format!("aggregate_fanout/{listeners}"), |b| {
            let (_data, collection, _slots, hits) = lights(64, listeners);
            let light = collection.get(32).unwrap();
            let mut value = 0.0_f32;
            b.iter(|| {
                value += 1.0;
                light.set("diffuse", black_box(value)).unwrap();
            });
            black_box(hits.get());
        });
    }

    group.bench_function("indexed_get", |b| {
        let (data, _collection, _slots, _hits) = lights(64, 0);
        b.iter(|| black_box(data.get::<f32>(black_box("lights[40].diffuse")).unwrap()));
    });

    group.bench_function("remove_front_shift/64", |b| {
        b.iter_batched(
            || lights(64, 1),
            |(_data, collection, _slots, hits)| {
                collection.erase(0).unwrap();
                black_box(hits.get());
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_store);
criterion_main!(benches);
