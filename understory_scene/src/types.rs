// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: handles, flags, local transforms, and node options.

use alloc::boxed::Box;
use kurbo::{Affine, Rect, Vec2};

use crate::view::View;

/// Identifier for a node in the [`Scene`](crate::Scene).
///
/// This is a small, copyable handle that stays stable across updates but becomes
/// invalid when the underlying slot is reused.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On insert, a fresh slot is allocated with generation `1`.
/// - On destroy, the slot is freed; any existing `NodeId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// Use [`Scene::is_alive`](crate::Scene::is_alive) to check whether a `NodeId` still refers to a live node.
/// Stale `NodeId`s never alias a different live node because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a [`RenderLayer`](crate::RenderLayer).
///
/// Generational like [`NodeId`]; a destroyed layer's id never aliases a new layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RenderLayerId(pub(crate) u32, pub(crate) u32);

impl RenderLayerId {
    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Node flags controlling visibility, measurement, and picking.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Node and its subtree are visible.
        const VISIBLE    = 0b0000_0001;
        /// Node and its subtree are renderable; cleared for nodes that stay
        /// in the tree but are not drawn (for example while culled).
        const RENDERABLE = 0b0000_0010;
        /// Node contributes to its ancestors' bounds. Cleared automatically
        /// while the node is used as a mask.
        const MEASURABLE = 0b0000_0100;
        /// Node participates in hit testing.
        const PICKABLE   = 0b0000_1000;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::RENDERABLE | Self::MEASURABLE | Self::PICKABLE
    }
}

impl NodeFlags {
    /// Flags a node must carry to contribute to bounds queries.
    pub(crate) const DISPLAYED: Self = Self::VISIBLE
        .union(Self::RENDERABLE)
        .union(Self::MEASURABLE);
}

/// Decomposed local transform of a node.
///
/// The composed matrix applies, in order: translation by `-pivot`, scale,
/// skew and rotation, then translation by `position`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    /// Position of the pivot point in parent space.
    pub position: Vec2,
    /// Scale factors along local x and y.
    pub scale: Vec2,
    /// Rotation in radians.
    pub rotation: f64,
    /// Skew in radians along x and y.
    pub skew: Vec2,
    /// Local point that `position` refers to and that rotation/scale pivot around.
    pub pivot: Vec2,
}

impl Transform2d {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        scale: Vec2::new(1.0, 1.0),
        rotation: 0.0,
        skew: Vec2::ZERO,
        pivot: Vec2::ZERO,
    };

    /// A pure translation.
    pub const fn from_position(x: f64, y: f64) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Self::IDENTITY
        }
    }

    /// Compose the decomposed parts into an affine matrix.
    pub fn to_affine(&self) -> Affine {
        // `from_angle` yields (cos, sin) in both std and libm builds.
        let x_axis = Vec2::from_angle(self.rotation + self.skew.y);
        let y_axis = Vec2::from_angle(self.rotation - self.skew.x);
        let (cx, sx) = (x_axis.x, x_axis.y);
        let (cy, sy) = (-y_axis.y, y_axis.x);

        let a = cx * self.scale.x;
        let b = sx * self.scale.x;
        let c = cy * self.scale.y;
        let d = sy * self.scale.y;

        let e = self.position.x - (self.pivot.x * a + self.pivot.y * c);
        let f = self.position.y - (self.pivot.x * b + self.pivot.y * d);
        Affine::new([a, b, c, d, e, f])
    }
}

impl Default for Transform2d {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Construction-time configuration for a node.
#[derive(Debug)]
pub struct NodeOptions {
    /// Initial local transform.
    pub transform: Transform2d,
    /// Visibility, measurement, and picking flags.
    pub flags: NodeFlags,
    /// Z-order within the parent when the parent sorts its children.
    pub z_index: i32,
    /// Make the node the root of its own render group.
    pub is_render_group: bool,
    /// Explicit local bounds that replace the computed bounds of the subtree.
    pub bounds_area: Option<Rect>,
    /// Renderable payload.
    pub view: Option<Box<dyn View>>,
    /// Keep children ordered by z-index.
    pub sortable_children: bool,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            transform: Transform2d::IDENTITY,
            flags: NodeFlags::default(),
            z_index: 0,
            is_render_group: false,
            bounds_area: None,
            view: None,
            sortable_children: false,
        }
    }
}
