// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounds queries and hit testing.
//!
//! Exact queries walk every contributing node and can resolve transforms on the
//! fly. Fast queries read flushed transforms and reuse each render group's cached
//! aggregate, which is stored in the group root's local space.

use alloc::vec::Vec;
use kurbo::{Affine, Point};

use crate::bounds::Bounds;
use crate::render_group::{BoundsKey, CachedBounds};
use crate::scene::{Node, Scene};
use crate::types::{NodeFlags, NodeId, RenderLayerId};

/// Results of a hit test.
#[derive(Clone, Debug)]
pub struct Hit {
    /// The matched node.
    pub node: NodeId,
    /// Path from root to node (inclusive).
    pub path: Vec<NodeId>,
}

/// Filters applied during hit testing.
///
/// Used by [`Scene::hit_test_point`].
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryFilter {
    /// If true, skip subtrees not marked both [`NodeFlags::VISIBLE`] and
    /// [`NodeFlags::RENDERABLE`], so culled content cannot be hit.
    pub visible_only: bool,
    /// If true, only nodes marked [`NodeFlags::PICKABLE`] can be hit.
    pub pickable_only: bool,
}

/// How an exact walk reads transforms and where it accumulates.
#[derive(Clone, Copy, Debug)]
struct ExactPass {
    /// Read flushed transforms instead of composing local ones.
    cached: bool,
    /// Hand effects bounds in the output space rather than world space.
    local_effects: bool,
    /// Maps world space into the output space; `None` if it is singular.
    from_world: Option<Affine>,
}

/// Whether an aggregate may be cached.
#[derive(Clone, Copy, Debug, Default)]
struct CacheTraits {
    /// Depends on state outside the group (masks).
    volatile: bool,
    /// Only valid for the group's current world transform (effects).
    world_dependent: bool,
}

impl core::ops::BitOrAssign for CacheTraits {
    fn bitor_assign(&mut self, rhs: Self) {
        self.volatile |= rhs.volatile;
        self.world_dependent |= rhs.world_dependent;
    }
}

fn invert(transform: Affine) -> Option<Affine> {
    let det = transform.determinant();
    (det != 0.0 && det.is_finite()).then(|| transform.inverse())
}

fn fast_included(node: &Node, key: BoundsKey) -> bool {
    if !node.flags.contains(NodeFlags::DISPLAYED) {
        return false;
    }
    !(key.factor_render_layers && node.render_layer.is_some() && node.render_layer != key.layer)
}

impl Scene {
    /// World-space bounds of the subtree at `id`, visiting every descendant.
    ///
    /// Hidden, non-renderable, and non-measurable subtrees are skipped.
    /// [`NodeOptions::bounds_area`](crate::NodeOptions::bounds_area) replaces the
    /// subtree's content, masks clip it, and effects grow it. With
    /// `skip_update == false` transforms are composed from local transforms
    /// during the walk, so pending mutations are honoured without a flush; with
    /// `true` the flushed transforms are read as-is.
    ///
    /// A subtree without content yields [`Bounds::ZERO`].
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn global_bounds(&self, id: NodeId, skip_update: bool) -> Bounds {
        let mut out = Bounds::EMPTY;
        self.global_bounds_into(id, skip_update, &mut out);
        *out.or_zero()
    }

    /// Like [`Scene::global_bounds`], merging into a caller-owned accumulator.
    ///
    /// `out` only grows; it is left untouched when the subtree has no content.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn global_bounds_into(&self, id: NodeId, skip_update: bool, out: &mut Bounds) {
        let pass = ExactPass {
            cached: skip_update,
            local_effects: false,
            from_world: Some(Affine::IDENTITY),
        };
        let world = if skip_update {
            self.cached_world(id)
        } else {
            self.resolve_world_transform(id)
        };
        self.exact_visit(id, world, pass, false, out);
    }

    /// Bounds of the subtree at `id` in its own local space.
    ///
    /// The node itself is always measured; its descendants follow the same rules
    /// as [`Scene::global_bounds`]. Views and effects are measured with their
    /// `add_local_bounds`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn local_bounds(&self, id: NodeId) -> Bounds {
        let pass = ExactPass {
            cached: false,
            local_effects: true,
            from_world: invert(self.resolve_world_transform(id)),
        };
        let mut out = Bounds::EMPTY;
        self.exact_visit(id, Affine::IDENTITY, pass, true, &mut out);
        *out.or_zero()
    }

    /// `transform` maps `id` into the output space of `pass`.
    fn exact_visit(
        &self,
        id: NodeId,
        transform: Affine,
        pass: ExactPass,
        force_measure: bool,
        out: &mut Bounds,
    ) {
        let node = self.node(id);
        if !force_measure && !node.flags.contains(NodeFlags::DISPLAYED) {
            return;
        }
        let mut b = Bounds::EMPTY;
        if let Some(area) = node.bounds_area {
            b.add_rect_transformed(area, transform);
        } else {
            if let Some(view) = &node.view {
                let mut local = Bounds::EMPTY;
                if pass.local_effects {
                    view.add_local_bounds(&mut local);
                } else {
                    view.add_bounds(&mut local);
                }
                b.add_bounds_transformed(&local, transform);
            }
            for &child in &node.children {
                let child_transform = if pass.cached {
                    self.cached_world(child)
                } else {
                    transform * self.node(child).local_transform
                };
                self.exact_visit(child, child_transform, pass, false, &mut b);
            }
        }
        if let Some(mask) = node.mask {
            if let Some(from_world) = pass.from_world {
                let mask_world = if pass.cached {
                    self.cached_world(mask)
                } else {
                    self.resolve_world_transform(mask)
                };
                let mut mb = Bounds::EMPTY;
                self.exact_visit(mask, from_world * mask_world, pass, true, &mut mb);
                b.add_bounds_mask(&mb);
            }
        }
        for effect in &node.effects {
            if pass.local_effects {
                effect.add_local_bounds(&mut b);
            } else {
                effect.add_bounds(&mut b);
            }
        }
        out.add_bounds(&b);
    }

    /// World-space bounds of the subtree at `id`, reusing cached group aggregates.
    ///
    /// Transforms must be flushed (see [`Scene::update_transforms`]). The result
    /// contains [`Scene::global_bounds`] and equals it when no rotation or skew
    /// crosses a render-group boundary. With `factor_render_layers`, nodes claimed
    /// by a render layer other than the layer of `id` are left out.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn fast_global_bounds(&mut self, id: NodeId, factor_render_layers: bool) -> Bounds {
        let layer = self.node(id).render_layer;
        self.fast_global_bounds_in_layer(id, factor_render_layers, layer)
    }

    /// Like [`Scene::fast_global_bounds`] with an explicit active layer.
    ///
    /// With `factor_render_layers`, a node claimed by a layer other than `layer`
    /// is excluded together with its subtree; `layer == None` excludes every
    /// claimed node.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn fast_global_bounds_in_layer(
        &mut self,
        id: NodeId,
        factor_render_layers: bool,
        layer: Option<RenderLayerId>,
    ) -> Bounds {
        let mut out = Bounds::EMPTY;
        let key = BoundsKey {
            factor_render_layers,
            layer: if factor_render_layers { layer } else { None },
        };
        self.fast_bounds_keyed(id, key, &mut out);
        *out.or_zero()
    }

    /// Like [`Scene::fast_global_bounds`], merging into a caller-owned accumulator.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn fast_global_bounds_into(
        &mut self,
        id: NodeId,
        factor_render_layers: bool,
        out: &mut Bounds,
    ) {
        let key = BoundsKey {
            factor_render_layers,
            layer: if factor_render_layers {
                self.node(id).render_layer
            } else {
                None
            },
        };
        self.fast_bounds_keyed(id, key, out);
    }

    #[track_caller]
    fn fast_bounds_keyed(&mut self, id: NodeId, key: BoundsKey, out: &mut Bounds) {
        let node = self.node(id);
        if !fast_included(node, key) {
            return;
        }
        if node.render_group.is_some() {
            let (aggregate, _) = self.group_aggregate(id, key);
            let world = self.group(id).world_transform;
            out.add_bounds_transformed(&aggregate, world);
        } else if let Some(group) = node.parent_render_group {
            let mut b = Bounds::EMPTY;
            self.fast_contents(id, group, key, &mut b);
            let world = self.group(group).world_transform;
            out.add_bounds_transformed(&b, world);
        } else {
            // Detached subtrees have no caches to reuse.
            self.global_bounds_into(id, false, out);
        }
    }

    /// Aggregate bounds of the group at `root` in its root's local space.
    fn group_aggregate(&mut self, root: NodeId, key: BoundsKey) -> (Bounds, CacheTraits) {
        let group = self.group(root);
        if let Some(cache) = group.bounds_cache {
            let world_ok = cache.world.is_none_or(|w| w == group.world_transform);
            if cache.key == key && world_ok {
                let traits = CacheTraits {
                    volatile: false,
                    world_dependent: cache.world.is_some(),
                };
                return (cache.bounds, traits);
            }
        }
        let mut b = Bounds::EMPTY;
        let traits = self.fast_contents(root, root, key, &mut b);
        let group = self.group_mut(root);
        let world = traits.world_dependent.then_some(group.world_transform);
        group.bounds_cache = (!traits.volatile).then_some(CachedBounds {
            bounds: b,
            key,
            world,
        });
        (b, traits)
    }

    /// Bounds of `id`'s content in the space of the group rooted at `space`.
    fn fast_contents(
        &mut self,
        id: NodeId,
        space: NodeId,
        key: BoundsKey,
        out: &mut Bounds,
    ) -> CacheTraits {
        let node = self.node(id);
        let to_space = if id == space {
            Affine::IDENTITY
        } else {
            node.relative_group_transform
        };
        let mut traits = CacheTraits::default();
        let mut b = Bounds::EMPTY;
        if let Some(area) = node.bounds_area {
            b.add_rect_transformed(area, to_space);
        } else {
            if let Some(view) = &node.view {
                let mut local = Bounds::EMPTY;
                view.add_bounds(&mut local);
                b.add_bounds_transformed(&local, to_space);
            }
            for i in 0..self.node(id).children.len() {
                let child = self.node(id).children[i];
                traits |= self.fast_visit(child, space, key, &mut b);
            }
        }
        let node = self.node(id);
        if node.mask.is_some() || !node.effects.is_empty() {
            traits |= self.apply_world_gates(id, space, &mut b);
        }
        out.add_bounds(&b);
        traits
    }

    fn fast_visit(
        &mut self,
        id: NodeId,
        space: NodeId,
        key: BoundsKey,
        out: &mut Bounds,
    ) -> CacheTraits {
        let node = self.node(id);
        if !fast_included(node, key) {
            return CacheTraits::default();
        }
        if node.render_group.is_some() {
            let to_space = node.relative_group_transform;
            let (aggregate, traits) = self.group_aggregate(id, key);
            out.add_bounds_transformed(&aggregate, to_space);
            return traits;
        }
        self.fast_contents(id, space, key, out)
    }

    /// Apply the mask and effects of `id` to `b`, which is in the space of `space`.
    ///
    /// Both work in world space, so `b` takes a round trip through the group's
    /// world transform.
    fn apply_world_gates(&self, id: NodeId, space: NodeId, b: &mut Bounds) -> CacheTraits {
        let world = self.group(space).world_transform;
        let from_world = invert(world);
        let node = self.node(id);
        let mut traits = CacheTraits::default();
        if let Some(mask) = node.mask {
            traits.volatile = true;
            if let Some(inv) = from_world {
                let mut mb = Bounds::EMPTY;
                let pass = ExactPass {
                    cached: true,
                    local_effects: false,
                    from_world: Some(Affine::IDENTITY),
                };
                self.exact_visit(mask, self.cached_world(mask), pass, true, &mut mb);
                mb.apply_matrix(inv);
                b.add_bounds_mask(&mb);
            }
        }
        if !node.effects.is_empty() {
            match from_world {
                Some(inv) => {
                    b.apply_matrix(world);
                    for effect in &node.effects {
                        effect.add_bounds(b);
                    }
                    b.apply_matrix(inv);
                    traits.world_dependent = true;
                }
                None => {
                    for effect in &node.effects {
                        effect.add_local_bounds(b);
                    }
                    traits.volatile = true;
                }
            }
        }
        traits
    }

    /// Whether the view of `id` contains a world-space point.
    ///
    /// Transforms are resolved from local transforms. Returns `false` when the
    /// node has no view or its world transform is singular.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn contains_point(&self, id: NodeId, point: Point) -> bool {
        let Some(inv) = invert(self.resolve_world_transform(id)) else {
            return false;
        };
        self.node(id)
            .view
            .as_ref()
            .is_some_and(|v| v.contains_point(inv * point))
    }

    /// Hit test a world-space point. Returns the topmost node.
    ///
    /// Children are tested in reverse paint order before their parent, so later
    /// siblings win. Mask nodes are never hit; a masked subtree is only hit where
    /// its mask's content contains the point. Effects can veto hits through
    /// [`Effect::contains_point`](crate::Effect::contains_point).
    pub fn hit_test_point(&self, point: Point, filter: QueryFilter) -> Option<Hit> {
        let root = self.root();
        let mut path = Vec::new();
        let node = self.hit_visit(root, self.node(root).local_transform, point, filter, &mut path)?;
        Some(Hit { node, path })
    }

    fn hit_visit(
        &self,
        id: NodeId,
        world: Affine,
        point: Point,
        filter: QueryFilter,
        path: &mut Vec<NodeId>,
    ) -> Option<NodeId> {
        let node = self.node(id);
        if node.mask_owner.is_some() {
            return None;
        }
        if filter.visible_only
            && !node
                .flags
                .contains(NodeFlags::VISIBLE | NodeFlags::RENDERABLE)
        {
            return None;
        }
        let local = invert(world)? * point;
        if let Some(mask) = node.mask {
            let mask_world = self.resolve_world_transform(mask);
            if !self.subtree_contains(mask, mask_world, point) {
                return None;
            }
        }
        if !node.effects.iter().all(|e| e.contains_point(local)) {
            return None;
        }
        path.push(id);
        for &child in node.children.iter().rev() {
            let child_world = world * self.node(child).local_transform;
            if let Some(hit) = self.hit_visit(child, child_world, point, filter, path) {
                return Some(hit);
            }
        }
        let pickable = !filter.pickable_only || node.flags.contains(NodeFlags::PICKABLE);
        if pickable && node.view.as_ref().is_some_and(|v| v.contains_point(local)) {
            return Some(id);
        }
        path.pop();
        None
    }

    /// Whether any visible view in the subtree at `id` contains `point`.
    fn subtree_contains(&self, id: NodeId, world: Affine, point: Point) -> bool {
        let node = self.node(id);
        if !node.flags.contains(NodeFlags::VISIBLE) {
            return false;
        }
        let Some(inv) = invert(world) else {
            return false;
        };
        if node.view.as_ref().is_some_and(|v| v.contains_point(inv * point)) {
            return true;
        }
        node.children.iter().any(|&c| {
            self.subtree_contains(c, world * self.node(c).local_transform, point)
        })
    }
}
