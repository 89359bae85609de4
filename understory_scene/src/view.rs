// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capability traits for renderable payloads and bounds-altering effects.
//!
//! A node composes at most one [`View`] and any number of [`Effect`]s. The scene
//! only relies on the capabilities below; drawing the payload is left to the
//! renderer that consumes the scene.

use kurbo::{Point, Rect, Shape};

use crate::bounds::Bounds;

/// A renderable payload attached to a node.
///
/// Implementations report their bounds in the node's local space. After a
/// change that affects those bounds, call
/// [`Scene::on_view_update`](crate::Scene::on_view_update) for the owning node.
pub trait View: core::fmt::Debug {
    /// Local-space bounds of the payload.
    fn bounds(&self) -> Bounds;

    /// Merge the payload's local-space bounds into `bounds`.
    fn add_bounds(&self, bounds: &mut Bounds) {
        bounds.add_bounds(&self.bounds());
    }

    /// Merge the payload's bounds for local-space queries such as
    /// [`Scene::local_bounds`](crate::Scene::local_bounds).
    fn add_local_bounds(&self, bounds: &mut Bounds) {
        self.add_bounds(bounds);
    }

    /// Whether a local-space point lies on the payload.
    fn contains_point(&self, point: Point) -> bool {
        self.bounds().contains_point(point)
    }

    /// Release resources held by the payload. Called once when its node is destroyed.
    fn destroy(&mut self) {}
}

/// A capability attached to a node that alters its contribution to bounds and
/// hit testing (for example padding for a blur-like filter).
pub trait Effect: core::fmt::Debug {
    /// Grow or shrink the accumulated world-space bounds of the node's subtree.
    fn add_bounds(&self, bounds: &mut Bounds);

    /// Like [`Effect::add_bounds`], for bounds expressed in a local coordinate space.
    fn add_local_bounds(&self, bounds: &mut Bounds) {
        self.add_bounds(bounds);
    }

    /// Whether a point in the node's local space may hit the subtree.
    fn contains_point(&self, _point: Point) -> bool {
        true
    }

    /// Release resources held by the effect. Called when it is removed or its node is destroyed.
    fn destroy(&mut self) {}
}

/// A [`View`] backed by any [`kurbo::Shape`].
///
/// Bounds come from [`Shape::bounding_box`] and containment from [`Shape::contains`],
/// so a `ShapeView<Rect>` behaves like a sprite and a `ShapeView<Circle>` hit-tests
/// precisely.
#[derive(Clone, Debug)]
pub struct ShapeView<S> {
    /// The local-space shape.
    pub shape: S,
}

impl<S: Shape + core::fmt::Debug> ShapeView<S> {
    /// Wrap a shape.
    pub fn new(shape: S) -> Self {
        Self { shape }
    }
}

impl ShapeView<Rect> {
    /// A `width` by `height` rectangle anchored at the local origin.
    pub fn rect(width: f64, height: f64) -> Self {
        Self::new(Rect::new(0.0, 0.0, width, height))
    }
}

impl<S: Shape + core::fmt::Debug> View for ShapeView<S> {
    fn bounds(&self) -> Bounds {
        Bounds::from_rect(self.shape.bounding_box())
    }

    fn contains_point(&self, point: Point) -> bool {
        self.shape.contains(point)
    }
}

/// Pads the bounds of its node outward, like the sampling margin of a blur.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaddingEffect {
    /// Padding added on every side.
    pub padding: f64,
}

impl PaddingEffect {
    /// Pad by `padding` on every side.
    pub const fn new(padding: f64) -> Self {
        Self { padding }
    }
}

impl Effect for PaddingEffect {
    fn add_bounds(&self, bounds: &mut Bounds) {
        bounds.pad(self.padding, self.padding);
    }
}
