// Copyright 2025 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::{Mat4, Vec3, Vec4};
use trellis_data::{AggregateStore, EffectVariables, PropertyStore};
use trellis_draw::{
    Binding, BindingMap, BufferId, DrawUnitPool, Effect, IndexBuffer, MacroBinding,
    MacroBindingMap, MacroKind, Pass, PoolConfig, RecordingContext, RenderState, Surface,
    Technique, UniformKind,
};

fn effect() -> Rc<Effect> {
    let states = BindingMap::new();
    states
        .defaults()
        .set(RenderState::ZSorted.name(), true)
        .unwrap();
    let pass = Pass::builder("lit")
        .uniform("diffuseColor", UniformKind::Float4)
        .uniform("modelToWorldMatrix", UniformKind::Mat4)
        .uniform_bindings(
            BindingMap::new()
                .with_binding("diffuseColor", Binding::target("diffuseColor"))
                .with_binding("modelToWorldMatrix", Binding::target("modelToWorldMatrix")),
        )
        .state_bindings(states)
        .macro_bindings(MacroBindingMap::new().with_binding(
            "SHADOWS",
            MacroBinding::new(Binding::target("castShadows"), MacroKind::Bool),
        ))
        .build()
        .unwrap();
    Rc::new(Effect::new("lit").with_technique(Technique::new("default", [Rc::new(pass)])))
}

/// A pool with `n` admitted surfaces; returns their material stores.
fn scene(n: usize) -> (DrawUnitPool, RecordingContext, Vec<PropertyStore>) {
    let mut pool = DrawUnitPool::new(AggregateStore::new(), AggregateStore::new(), PoolConfig::default());
    let mut context = RecordingContext::new();
    let effect = effect();
    let mut materials = Vec::with_capacity(n);
    for i in 0..n {
        let geometry = PropertyStore::new();
        geometry
            .set(
                "indices",
                IndexBuffer {
                    buffer: BufferId(0),
                    first: 0,
                    count: 36,
                },
            )
            .unwrap();
        let material = PropertyStore::new();
        material.set("diffuseColor", Vec4::ONE).unwrap();
        material
            .set("modelToWorldMatrix", Mat4::from_translation(Vec3::Z * i as f32))
            .unwrap();
        material.set("castShadows", i % 2 == 0).unwrap();
        let target = AggregateStore::new();
        target.add_provider_to(geometry.clone(), "geometry");
        target.add_provider(material.clone());
        let variables =
            EffectVariables::new().with("geometryUuid", geometry.uuid().hyphenated().to_string());
        pool.add_surface(Surface::new(target, effect.clone()).with_variables(variables));
        materials.push(material);
    }
    pool.update(&mut context);
    (pool, context, materials)
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");

    group.bench_function("admit/256", |b| {
        b.iter(|| black_box(scene(256).0.len()));
    });

    group.bench_function("idle_update/256", |b| {
        let (mut pool, mut context, _materials) = scene(256);
        b.iter(|| black_box(pool.update(&mut context)));
    });

    group.bench_function("macro_flip/256", |b| {
        let (mut pool, mut context, materials) = scene(256);
        let mut on = false;
        b.iter(|| {
            on = !on;
            materials[17].set("castShadows", on).unwrap();
            black_box(pool.update(&mut context))
        });
    });

    group.bench_function("resort/256", |b| {
        let (mut pool, mut context, materials) = scene(256);
        let mut z = 0.0_f32;
        b.iter(|| {
            z += 1.0;
            materials[3]
                .set("modelToWorldMatrix", Mat4::from_translation(Vec3::Z * z))
                .unwrap();
            black_box(pool.update(&mut context))
        });
    });

    group.bench_function("render/256", |b| {
        let (pool, mut context, _materials) = scene(256);
        b.iter(|| {
            context.clear_events();
            pool.render(&mut context, None);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pool);
criterion_main!(benches);
