// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_scene --heading-base-level=0

//! Understory Scene: a Kurbo-native retained 2D scene graph.
//!
//! Understory Scene keeps a hierarchy of nodes with local transforms and answers
//! "where is this subtree on screen" cheaply, frame after frame.
//!
//! - Nodes carry a decomposed local transform, flags, an optional [`View`] payload,
//!   any number of [`Effect`]s, an optional mask, and an optional bounds override.
//! - [Render groups](RenderGroup) partition the tree. Members store their transform
//!   relative to the group root, so moving a group root is O(1) for its members.
//!   Changes are queued per group and flushed parents-first.
//! - Bounds queries come in two flavours: [`Scene::global_bounds`] walks every node
//!   exactly, [`Scene::fast_global_bounds`] reuses per-group cached aggregates.
//! - [Render layers](RenderLayer) reorder rendering independently of parentage and
//!   can be factored out of fast bounds queries.
//!
//! ## Frame lifecycle
//!
//! 1. Mutate: setters such as [`Scene::set_position`] or [`Scene::set_view`] update
//!    local state and record the node in its group's queue. Repeated changes to the
//!    same node within a frame queue it once.
//! 2. Flush: [`Scene::update_transforms`] recomputes queued transforms, applies
//!    pending child sorts, and invalidates cached bounds.
//! 3. Query: read [`Scene::world_transform`], bounds, or run
//!    [`Scene::hit_test_point`].
//!
//! Exact queries can also be asked to resolve transforms on the fly
//! (`skip_update == false`), which makes them correct before a flush.
//!
//! ## Not a renderer
//!
//! Views only report bounds and containment; drawing them is up to the consumer.
//!
//! ## API overview
//!
//! - [`Scene`]: owns every node; all operations go through it.
//! - [`NodeId`]: generational handle of a node; stale handles never alias.
//! - [`NodeOptions`]: construction-time configuration of a node.
//! - [`Transform2d`]: position, scale, rotation, skew, and pivot.
//! - [`NodeFlags`]: visibility, renderability, measurability, and picking.
//! - [`Bounds`]: growable axis-aligned box used by every bounds query.
//! - [`RenderGroup`] / [`RenderLayer`] / [`RenderLayerId`].
//! - [`ShapeView`] and [`PaddingEffect`]: ready-made payloads.
//!
//! ### Minimal usage
//!
//! ```
//! use understory_scene::{Bounds, NodeOptions, Scene, ShapeView, Transform2d};
//!
//! let mut scene = Scene::new();
//! let root = scene.root();
//!
//! let container = scene.insert(
//!     root,
//!     NodeOptions { transform: Transform2d::from_position(100.0, 0.0), ..Default::default() },
//! );
//! let leaf = scene.insert(
//!     container,
//!     NodeOptions { view: Some(Box::new(ShapeView::rect(100.0, 100.0))), ..Default::default() },
//! );
//!
//! scene.update_transforms(false);
//! assert_eq!(scene.global_bounds(root, false), Bounds::new(100.0, 0.0, 200.0, 100.0));
//! assert_eq!(scene.fast_global_bounds(root, false), Bounds::new(100.0, 0.0, 200.0, 100.0));
//!
//! // Hiding the container removes the whole subtree from the bounds.
//! scene.set_visible(container, false);
//! assert_eq!(scene.global_bounds(root, false), Bounds::ZERO);
//! # let _ = leaf;
//! ```
//!
//! ### Render groups and effects
//!
//! ```
//! use understory_scene::{Bounds, NodeOptions, PaddingEffect, Scene, ShapeView, Transform2d};
//!
//! let mut scene = Scene::new();
//! let group = scene.insert(
//!     scene.root(),
//!     NodeOptions {
//!         transform: Transform2d::from_position(50.0, 0.0),
//!         is_render_group: true,
//!         ..Default::default()
//!     },
//! );
//! let leaf = scene.insert(
//!     group,
//!     NodeOptions { view: Some(Box::new(ShapeView::rect(10.0, 10.0))), ..Default::default() },
//! );
//! scene.add_effect(leaf, Box::new(PaddingEffect::new(5.0)));
//! scene.update_transforms(false);
//! assert_eq!(scene.fast_global_bounds(group, false), Bounds::new(45.0, -5.0, 65.0, 15.0));
//!
//! // Moving the group root does not touch its members' relative transforms.
//! scene.set_x(group, 150.0);
//! scene.update_transforms(false);
//! assert_eq!(scene.fast_global_bounds(group, false), Bounds::new(145.0, -5.0, 165.0, 15.0));
//! ```
//!
//! ## Logging
//!
//! The crate reports through the [`log`] facade: flush statistics at `trace`,
//! render group and layer changes at `debug`, and ignored re-entrant flushes and
//! render layer reassignments at `warn`. Install any logger to see them.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod bounds;
mod query;
mod render_group;
mod render_layer;
mod scene;
mod types;
mod view;

pub use bounds::Bounds;
pub use query::{Hit, QueryFilter};
pub use render_group::RenderGroup;
pub use render_layer::RenderLayer;
pub use scene::Scene;
pub use types::{NodeFlags, NodeId, NodeOptions, RenderLayerId, Transform2d};
pub use view::{Effect, PaddingEffect, ShapeView, View};
