// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene basics.
//!
//! Build a small scene, flush transforms, compare exact and fast bounds, and hit-test.
//!
//! Run:
//! - `cargo run -p understory_demos --example scene_basics`

use kurbo::Point;
use understory_scene::{
    Bounds, NodeOptions, PaddingEffect, QueryFilter, Scene, ShapeView, Transform2d,
};

fn main() {
    let mut scene = Scene::new();
    let root = scene.root();

    // root -> container (x = 100) -> leaf 100x100
    let container = scene.insert(
        root,
        NodeOptions {
            transform: Transform2d::from_position(100.0, 0.0),
            ..Default::default()
        },
    );
    let leaf = scene.insert(
        container,
        NodeOptions {
            view: Some(Box::new(ShapeView::rect(100.0, 100.0))),
            ..Default::default()
        },
    );

    scene.update_transforms(false);
    let exact = scene.global_bounds(root, false);
    let fast = scene.fast_global_bounds(root, false);
    println!("exact: {:?}", exact.rect());
    println!("fast:  {:?}", fast.rect());
    assert_eq!(exact, Bounds::new(100.0, 0.0, 200.0, 100.0));
    assert_eq!(fast, exact);

    // Cancel the container offset.
    scene.set_x(leaf, -100.0);
    scene.update_transforms(false);
    println!("after move: {:?}", scene.global_bounds(root, false).rect());

    // Effects grow the bounds.
    scene.add_effect(leaf, Box::new(PaddingEffect::new(10.0)));
    scene.update_transforms(false);
    let padded = scene.fast_global_bounds(root, false);
    println!("padded: {:?}", padded.rect());
    assert_eq!(padded, Bounds::new(-10.0, -10.0, 110.0, 110.0));

    // Hit testing uses the view, not the padded bounds.
    let filter = QueryFilter {
        visible_only: true,
        pickable_only: true,
    };
    let hit = scene.hit_test_point(Point::new(50.0, 50.0), filter).unwrap();
    println!("hit: {:?} via {:?}", hit.node, hit.path);
    assert_eq!(hit.node, leaf);
    assert!(scene.hit_test_point(Point::new(105.0, 50.0), filter).is_none());

    // Hiding the container empties the scene's bounds.
    scene.set_visible(container, false);
    assert_eq!(scene.global_bounds(root, false), Bounds::ZERO);
    println!("hidden: {:?}", scene.global_bounds(root, false).rect());
}
