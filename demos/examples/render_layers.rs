// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render groups and render layers.
//!
//! Move a render group root without touching its members, then factor a render
//! layer out of fast bounds queries.
//!
//! Run:
//! - `cargo run -p understory_demos --example render_layers`

use understory_scene::{NodeOptions, Scene, ShapeView, Transform2d};

fn sprite(x: f64, y: f64, size: f64) -> NodeOptions {
    NodeOptions {
        transform: Transform2d::from_position(x, y),
        view: Some(Box::new(ShapeView::rect(size, size))),
        ..Default::default()
    }
}

fn main() {
    let mut scene = Scene::new();
    let root = scene.root();

    // A render group with a few members.
    let panel = scene.insert(
        root,
        NodeOptions {
            transform: Transform2d::from_position(50.0, 50.0),
            is_render_group: true,
            ..Default::default()
        },
    );
    for i in 0..4 {
        let _ = scene.insert(panel, sprite(f64::from(i) * 20.0, 0.0, 16.0));
    }
    scene.update_transforms(false);
    println!("panel: {:?}", scene.fast_global_bounds(panel, false).rect());

    // Moving the root only recomputes the group's world transform.
    scene.set_position(panel, 300.0, 10.0);
    let pending = scene
        .render_group(root)
        .map_or(0, |g| g.pending_transform_updates());
    println!("queued in the root group: {pending}");
    scene.update_transforms(false);
    println!("moved panel: {:?}", scene.fast_global_bounds(panel, false).rect());

    // An overlay layer renders on top regardless of parentage.
    let overlay = scene.create_render_layer();
    let badge = scene.insert(panel, sprite(-40.0, -40.0, 8.0));
    scene.add_to_render_layer(overlay, badge);
    scene.update_transforms(false);

    let everything = scene.fast_global_bounds(root, false);
    let base_only = scene.fast_global_bounds_in_layer(root, true, None);
    let overlay_only = scene.render_layer_bounds(overlay);
    println!("everything:   {:?}", everything.rect());
    println!("base layer:   {:?}", base_only.rect());
    println!("overlay:      {:?}", overlay_only.rect());
    assert!(everything.width() > base_only.width());
    assert_eq!(overlay_only.width(), 8.0);
}
