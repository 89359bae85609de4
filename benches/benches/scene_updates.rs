// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_scene::{NodeId, NodeOptions, Scene, ShapeView, Transform2d};

/// `rows` containers, each holding `cols` sprites. Returns the scene, the
/// containers, and every sprite.
fn build_grid(rows: usize, cols: usize, groups: bool) -> (Scene, Vec<NodeId>, Vec<NodeId>) {
    let mut scene = Scene::new();
    let root = scene.root();
    let mut containers = Vec::with_capacity(rows);
    let mut sprites = Vec::with_capacity(rows * cols);
    for y in 0..rows {
        let row = scene.insert(
            root,
            NodeOptions {
                transform: Transform2d::from_position(0.0, y as f64 * 12.0),
                is_render_group: groups,
                ..Default::default()
            },
        );
        containers.push(row);
        for x in 0..cols {
            sprites.push(scene.insert(
                row,
                NodeOptions {
                    transform: Transform2d::from_position(x as f64 * 12.0, 0.0),
                    view: Some(Box::new(ShapeView::rect(10.0, 10.0))),
                    ..Default::default()
                },
            ));
        }
    }
    scene.update_transforms(false);
    (scene, containers, sprites)
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    for &n in &[32usize, 64, 128] {
        // Ids are deterministic, so the template's ids address every rebuilt scene.
        let (_, _, sprites) = build_grid(n, n, false);
        // Touch a tenth of the sprites, several times each.
        let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
        let touched: Vec<NodeId> = (0..sprites.len() / 10)
            .map(|_| sprites[rng.next_index(sprites.len())])
            .collect();
        group.throughput(Throughput::Elements(touched.len() as u64));
        group.bench_function(format!("sparse_moves_n{}", n), |b| {
            b.iter_batched(
                || build_grid(n, n, false).0,
                |mut scene| {
                    for (i, id) in touched.iter().enumerate() {
                        for k in 0..3 {
                            scene.set_y(*id, (i + k) as f64);
                        }
                    }
                    scene.update_transforms(false);
                    black_box(&scene);
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_group_root_moves(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_root_moves");
    for &groups in &[false, true] {
        let label = if groups { "render_groups" } else { "plain" };
        group.bench_function(format!("move_rows_{}", label), |b| {
            b.iter_batched(
                || build_grid(64, 64, groups),
                |(mut scene, containers, _)| {
                    for (i, row) in containers.iter().enumerate() {
                        scene.set_x(*row, i as f64);
                    }
                    scene.update_transforms(false);
                    black_box(&scene);
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_flush, bench_group_root_moves);
criterion_main!(benches);
