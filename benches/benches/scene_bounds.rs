// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_scene::{NodeOptions, PaddingEffect, Scene, ShapeView, Transform2d};

fn build_scene(n: usize, groups: bool, effects: bool) -> Scene {
    let mut scene = Scene::new();
    let root = scene.root();
    for y in 0..n {
        let row = scene.insert(
            root,
            NodeOptions {
                transform: Transform2d {
                    rotation: 0.1,
                    ..Transform2d::from_position(0.0, y as f64 * 12.0)
                },
                is_render_group: groups,
                ..Default::default()
            },
        );
        for x in 0..n {
            let sprite = scene.insert(
                row,
                NodeOptions {
                    transform: Transform2d::from_position(x as f64 * 12.0, 0.0),
                    view: Some(Box::new(ShapeView::rect(10.0, 10.0))),
                    ..Default::default()
                },
            );
            if effects && x % 8 == 0 {
                scene.add_effect(sprite, Box::new(PaddingEffect::new(2.0)));
            }
        }
    }
    scene.update_transforms(false);
    scene
}

fn bench_exact(c: &mut Criterion) {
    let mut group = c.benchmark_group("exact_bounds");
    for &n in &[32usize, 64, 128] {
        let scene = build_scene(n, false, false);
        let root = scene.root();
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("resolve_n{}", n), |b| {
            b.iter(|| black_box(scene.global_bounds(root, false)))
        });
        group.bench_function(format!("cached_n{}", n), |b| {
            b.iter(|| black_box(scene.global_bounds(root, true)))
        });
    }
    group.finish();
}

fn bench_fast(c: &mut Criterion) {
    let mut group = c.benchmark_group("fast_bounds");
    for &effects in &[false, true] {
        let label = if effects { "effects" } else { "plain" };
        let mut scene = build_scene(128, true, effects);
        let root = scene.root();
        group.bench_function(format!("warm_cache_{}", label), |b| {
            b.iter(|| black_box(scene.fast_global_bounds(root, false)))
        });

        // One row changes per frame; only its group and the root recompute.
        let rows: Vec<_> = scene.children_of(root).to_vec();
        let leaf = scene.children_of(rows[0])[0];
        let mut frame = 0_u32;
        group.bench_function(format!("one_dirty_row_{}", label), |b| {
            b.iter(|| {
                frame = frame.wrapping_add(1);
                scene.set_y(leaf, f64::from(frame % 4));
                scene.update_transforms(false);
                black_box(scene.fast_global_bounds(root, false))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_exact, bench_fast);
criterion_main!(benches);
