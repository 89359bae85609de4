// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node storage and structure: creation, attachment, destruction, and local state.

use alloc::boxed::Box;
use alloc::vec::Vec;
use kurbo::{Affine, Rect, Vec2};

use crate::render_group::RenderGroup;
use crate::render_layer::RenderLayer;
use crate::types::{NodeFlags, NodeId, NodeOptions, RenderLayerId, Transform2d};
use crate::view::{Effect, View};

/// A retained 2D scene graph.
///
/// The scene owns every node in generational slots. Parents own their children
/// through the arena; the child-to-parent link is a plain [`NodeId`] used for
/// traversal and signal bubbling only.
///
/// A scene always has a root node, and that root is always a render group.
pub struct Scene {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    root: NodeId,
    pub(crate) layers: Vec<Option<RenderLayer>>,
    pub(crate) layer_generations: Vec<u32>,
    pub(crate) layer_free_list: Vec<usize>,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let groups = self
            .nodes
            .iter()
            .flatten()
            .filter(|n| n.render_group.is_some())
            .count();
        let layers = self.layers.iter().filter(|l| l.is_some()).count();
        f.debug_struct("Scene")
            .field("root", &self.root)
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("render_groups", &groups)
            .field("render_layers", &layers)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    pub(crate) transform: Transform2d,
    pub(crate) local_transform: Affine,
    /// Maps local space into the space of the owning group (the enclosing one for group roots).
    pub(crate) relative_group_transform: Affine,
    pub(crate) transform_version: u32,

    pub(crate) flags: NodeFlags,
    pub(crate) z_index: i32,
    pub(crate) sortable_children: bool,
    pub(crate) sort_dirty: bool,
    pub(crate) bounds_area: Option<Rect>,
    pub(crate) mask: Option<NodeId>,
    pub(crate) mask_owner: Option<NodeId>,
    /// `MEASURABLE` as it was before the node became a mask.
    pub(crate) measurable_before_mask: bool,
    pub(crate) effects: Vec<Box<dyn Effect>>,
    pub(crate) view: Option<Box<dyn View>>,

    pub(crate) render_group: Option<Box<RenderGroup>>,
    pub(crate) parent_render_group: Option<NodeId>,
    pub(crate) relative_depth: u32,
    pub(crate) did_change: bool,
    pub(crate) did_view_update: bool,
    /// Group whose view-update queue holds this node while `did_view_update` is set.
    pub(crate) queued_in: Option<NodeId>,
    pub(crate) update_tick: u32,

    pub(crate) render_layer: Option<RenderLayerId>,
}

impl Node {
    fn new(generation: u32, options: NodeOptions) -> Self {
        let local_transform = options.transform.to_affine();
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            transform: options.transform,
            local_transform,
            relative_group_transform: local_transform,
            transform_version: 0,
            flags: options.flags,
            z_index: options.z_index,
            sortable_children: options.sortable_children,
            sort_dirty: false,
            bounds_area: options.bounds_area,
            mask: None,
            mask_owner: None,
            measurable_before_mask: false,
            effects: Vec::new(),
            view: options.view,
            render_group: None,
            parent_render_group: None,
            relative_depth: 0,
            did_change: false,
            did_view_update: false,
            queued_in: None,
            update_tick: 0,
            render_layer: None,
        }
    }

    /// The group whose cached bounds include this node's content.
    pub(crate) fn owning_group(&self, id: NodeId) -> Option<NodeId> {
        if self.render_group.is_some() {
            Some(id)
        } else {
            self.parent_render_group
        }
    }
}

impl Scene {
    /// Create a scene with a default root.
    pub fn new() -> Self {
        Self::with_root(NodeOptions::default())
    }

    /// Create a scene whose root is configured by `options`.
    ///
    /// The root is always a render group regardless of `options.is_render_group`.
    pub fn with_root(options: NodeOptions) -> Self {
        let mut scene = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            layers: Vec::new(),
            layer_generations: Vec::new(),
            layer_free_list: Vec::new(),
        };
        scene.root = scene.create(NodeOptions {
            is_render_group: true,
            ..options
        });
        scene
    }

    /// The scene root.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node.
    ///
    /// Detached nodes have no owning render group until they are attached with
    /// [`Scene::add_child`]; reading their world transform composes local transforms.
    pub fn create(&mut self, options: NodeOptions) -> NodeId {
        let is_render_group = options.is_render_group;
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, options));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, options)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if is_render_group {
            self.enable_render_group(id);
        }
        id
    }

    /// Create a node and append it to `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale.
    #[track_caller]
    pub fn insert(&mut self, parent: NodeId, options: NodeOptions) -> NodeId {
        let _ = self.node(parent);
        let id = self.create(options);
        self.add_child(parent, id);
        id
    }

    /// Append `child` to `parent`, detaching it from its previous parent first.
    ///
    /// # Panics
    ///
    /// See [`Scene::add_child_at`].
    #[track_caller]
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.node(parent).children.len();
        self.add_child_at(parent, child, len);
    }

    /// Insert `child` into `parent`'s children at `index` (clamped to the child count).
    ///
    /// The child's subtree joins the parent's render group and is queued for a
    /// transform update. Render layer membership is kept.
    ///
    /// # Panics
    ///
    /// Panics if either id is stale, if `child` is the scene root, or if
    /// `parent` is `child` or one of its descendants.
    #[track_caller]
    pub fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) {
        let _ = self.node(child);
        let _ = self.node(parent);
        assert!(child != self.root, "the scene root cannot be re-parented");
        assert!(
            !self.is_ancestor_or_self(child, parent),
            "cannot attach {child:?} under itself or one of its descendants"
        );
        self.detach(child);

        let sortable = {
            let p = self.node_mut(parent);
            let index = index.min(p.children.len());
            p.children.insert(index, child);
            if p.sortable_children {
                p.sort_dirty = true;
            }
            p.sortable_children
        };
        self.node_mut(child).parent = Some(parent);

        let (group, depth) = self.child_group_and_depth(parent);
        self.set_subtree_group(child, group, depth);
        self.mark_transform_dirty(child);
        if sortable {
            self.on_view_update(parent);
        } else {
            let owner = self.node(parent).owning_group(parent);
            self.invalidate_group_bounds(owner);
        }
    }

    /// Detach `id` from its parent, keeping its subtree alive.
    ///
    /// Transform queue entries left behind in the former render group are skipped
    /// at the next flush; a pending view update is dropped from it.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        self.node_mut(parent).children.retain(|c| *c != id);
        self.node_mut(id).parent = None;
        let owner = self.node(parent).owning_group(parent);
        self.invalidate_group_bounds(owner);
        self.set_subtree_group(id, None, 0);
    }

    /// Move `id` to position `index` among its siblings.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_child_index(&mut self, id: NodeId, index: usize) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        let p = self.node_mut(parent);
        p.children.retain(|c| *c != id);
        let index = index.min(p.children.len());
        p.children.insert(index, id);
        self.on_view_update(parent);
    }

    /// Destroy `id` and its whole subtree.
    ///
    /// Effects and views receive [`Effect::destroy`] / [`View::destroy`], render layer
    /// memberships are dropped, and mask links pointing into the subtree are cleared.
    /// Every destroyed id becomes stale.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale or is the scene root.
    #[track_caller]
    pub fn destroy(&mut self, id: NodeId) {
        let _ = self.node(id);
        assert!(id != self.root, "the scene root cannot be destroyed");
        self.detach(id);
        self.destroy_recursive(id);
    }

    fn destroy_recursive(&mut self, id: NodeId) {
        let children = core::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.destroy_recursive(child);
        }
        let Some(mut node) = self.nodes[id.idx()].take() else {
            return;
        };
        for effect in &mut node.effects {
            effect.destroy();
        }
        if let Some(view) = node.view.as_mut() {
            view.destroy();
        }
        if let Some(layer) = node.render_layer {
            if let Some(l) = self.layer_opt_mut(layer) {
                l.members.retain(|m| *m != id);
            }
        }
        if let Some(owner) = node.mask_owner {
            if let Some(o) = self.node_opt_mut(owner) {
                o.mask = None;
            }
            self.on_view_update_if_alive(owner);
        }
        if let Some(mask) = node.mask {
            self.release_mask(mask);
        }
        self.free_list.push(id.idx());
    }

    // --- local state ---

    /// Replace the whole local transform.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_transform(&mut self, id: NodeId, transform: Transform2d) {
        self.update_transform(id, |t| *t = transform);
    }

    /// Set the position.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_position(&mut self, id: NodeId, x: f64, y: f64) {
        self.update_transform(id, |t| t.position = Vec2::new(x, y));
    }

    /// Set the x position only.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_x(&mut self, id: NodeId, x: f64) {
        self.update_transform(id, |t| t.position.x = x);
    }

    /// Set the y position only.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_y(&mut self, id: NodeId, y: f64) {
        self.update_transform(id, |t| t.position.y = y);
    }

    /// Set the scale.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_scale(&mut self, id: NodeId, x: f64, y: f64) {
        self.update_transform(id, |t| t.scale = Vec2::new(x, y));
    }

    /// Set the rotation in radians.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_rotation(&mut self, id: NodeId, radians: f64) {
        self.update_transform(id, |t| t.rotation = radians);
    }

    /// Set the skew in radians.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_skew(&mut self, id: NodeId, x: f64, y: f64) {
        self.update_transform(id, |t| t.skew = Vec2::new(x, y));
    }

    /// Set the pivot.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_pivot(&mut self, id: NodeId, x: f64, y: f64) {
        self.update_transform(id, |t| t.pivot = Vec2::new(x, y));
    }

    #[track_caller]
    fn update_transform(&mut self, id: NodeId, f: impl FnOnce(&mut Transform2d)) {
        let node = self.node_mut(id);
        let before = node.transform;
        f(&mut node.transform);
        if node.transform == before {
            return;
        }
        node.local_transform = node.transform.to_affine();
        self.mark_transform_dirty(id);
    }

    /// Replace the node flags.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        let node = self.node_mut(id);
        if node.flags == flags {
            return;
        }
        node.flags = flags;
        self.on_view_update(id);
    }

    /// Toggle [`NodeFlags::VISIBLE`].
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        let mut flags = self.node(id).flags;
        flags.set(NodeFlags::VISIBLE, visible);
        self.set_flags(id, flags);
    }

    /// Toggle [`NodeFlags::RENDERABLE`].
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_renderable(&mut self, id: NodeId, renderable: bool) {
        let mut flags = self.node(id).flags;
        flags.set(NodeFlags::RENDERABLE, renderable);
        self.set_flags(id, flags);
    }

    /// Set the z-index. Marks the parent for re-sorting when it sorts its children.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_z_index(&mut self, id: NodeId, z_index: i32) {
        let node = self.node_mut(id);
        if node.z_index == z_index {
            return;
        }
        node.z_index = z_index;
        let Some(parent) = node.parent else {
            return;
        };
        let p = self.node_mut(parent);
        if p.sortable_children {
            p.sort_dirty = true;
            self.on_view_update(parent);
        }
    }

    /// Keep the children of `id` sorted by z-index.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_sortable_children(&mut self, id: NodeId, sortable: bool) {
        let node = self.node_mut(id);
        node.sortable_children = sortable;
        if sortable {
            node.sort_dirty = true;
            self.on_view_update(id);
        }
    }

    /// Stable-sort the children of `id` by z-index now.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn sort_children(&mut self, id: NodeId) {
        let mut children = core::mem::take(&mut self.node_mut(id).children);
        children.sort_by_key(|c| self.node(*c).z_index);
        let node = self.node_mut(id);
        node.children = children;
        node.sort_dirty = false;
    }

    /// Set or clear the bounds override. When set, it replaces the computed
    /// bounds of the whole subtree.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_bounds_area(&mut self, id: NodeId, area: Option<Rect>) {
        self.node_mut(id).bounds_area = area;
        self.on_view_update(id);
    }

    /// Replace the view, destroying the previous one.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn set_view(&mut self, id: NodeId, view: Option<Box<dyn View>>) {
        if let Some(mut old) = core::mem::replace(&mut self.node_mut(id).view, view) {
            old.destroy();
        }
        self.on_view_update(id);
    }

    /// Mutate the view in place and signal the change.
    ///
    /// Returns `None` if the node has no view.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn update_view<R>(&mut self, id: NodeId, f: impl FnOnce(&mut dyn View) -> R) -> Option<R> {
        let out = {
            let view = self.node_mut(id).view.as_deref_mut()?;
            f(view)
        };
        self.on_view_update(id);
        Some(out)
    }

    /// Attach an effect.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn add_effect(&mut self, id: NodeId, effect: Box<dyn Effect>) {
        self.node_mut(id).effects.push(effect);
        self.on_view_update(id);
    }

    /// Destroy and remove every effect attached to `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn clear_effects(&mut self, id: NodeId) {
        let effects = core::mem::take(&mut self.node_mut(id).effects);
        if effects.is_empty() {
            return;
        }
        for mut effect in effects {
            effect.destroy();
        }
        self.on_view_update(id);
    }

    /// Use `mask` to clip the bounds (and hits) of `id`, or clear the mask.
    ///
    /// A mask node stops contributing to its ancestors' bounds while it is in use.
    /// A node masks at most one target; assigning it to a second target moves it.
    ///
    /// # Panics
    ///
    /// Panics if an id is stale, or if `mask` is `id` or one of its ancestors.
    #[track_caller]
    pub fn set_mask(&mut self, id: NodeId, mask: Option<NodeId>) {
        let _ = self.node(id);
        if self.node(id).mask == mask {
            return;
        }
        if let Some(old) = self.node_mut(id).mask.take() {
            self.release_mask(old);
        }
        if let Some(m) = mask {
            let _ = self.node(m);
            assert!(
                !self.is_ancestor_or_self(m, id),
                "a mask cannot be its target or one of its ancestors"
            );
            if let Some(previous_target) = self.node(m).mask_owner {
                self.node_mut(previous_target).mask = None;
                self.on_view_update(previous_target);
            }
            let mask_node = self.node_mut(m);
            if mask_node.mask_owner.is_none() {
                mask_node.measurable_before_mask = mask_node.flags.contains(NodeFlags::MEASURABLE);
            }
            mask_node.mask_owner = Some(id);
            mask_node.flags.remove(NodeFlags::MEASURABLE);
            self.on_view_update(m);
            self.node_mut(id).mask = Some(m);
        }
        self.on_view_update(id);
    }

    fn release_mask(&mut self, mask: NodeId) {
        let Some(m) = self.node_opt_mut(mask) else {
            return;
        };
        m.mask_owner = None;
        m.flags.set(NodeFlags::MEASURABLE, core::mem::take(&mut m.measurable_before_mask));
        self.on_view_update(mask);
    }

    // --- accessors ---

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node_opt(id).is_some()
    }

    /// Parent of `id`, or `None` for detached nodes, the root, and stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.parent
    }

    /// Children of `id` in paint order; empty for stale ids.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Flags of `id` if live.
    pub fn flags(&self, id: NodeId) -> Option<NodeFlags> {
        Some(self.node_opt(id)?.flags)
    }

    /// Z-index of `id` if live.
    pub fn z_index(&self, id: NodeId) -> Option<i32> {
        Some(self.node_opt(id)?.z_index)
    }

    /// Decomposed local transform of `id` if live.
    pub fn transform(&self, id: NodeId) -> Option<Transform2d> {
        Some(self.node_opt(id)?.transform)
    }

    /// Composed local transform of `id` if live.
    pub fn local_transform(&self, id: NodeId) -> Option<Affine> {
        Some(self.node_opt(id)?.local_transform)
    }

    /// Counter bumped on every change of the local transform of `id`.
    pub fn transform_version(&self, id: NodeId) -> Option<u32> {
        Some(self.node_opt(id)?.transform_version)
    }

    /// Bounds override of `id`, if live and set.
    pub fn bounds_area(&self, id: NodeId) -> Option<Rect> {
        self.node_opt(id)?.bounds_area
    }

    /// Mask of `id`, if live and set.
    pub fn mask_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.mask
    }

    /// View of `id`, if live and set.
    pub fn view(&self, id: NodeId) -> Option<&dyn View> {
        self.node_opt(id)?.view.as_deref()
    }

    /// Number of effects attached to `id`; zero for stale ids.
    pub fn effect_count(&self, id: NodeId) -> usize {
        self.node_opt(id).map_or(0, |n| n.effects.len())
    }

    // --- internals ---

    /// Access a node; panics if `id` is stale.
    #[track_caller]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        match self.node_opt(id) {
            Some(n) => n,
            None => panic!("dangling NodeId {id:?}"),
        }
    }

    /// Access a node mutably; panics if `id` is stale.
    #[track_caller]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.node_opt_mut(id) {
            Some(n) => n,
            None => panic!("dangling NodeId {id:?}"),
        }
    }

    pub(crate) fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    pub(crate) fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn on_view_update_if_alive(&mut self, id: NodeId) {
        if self.is_alive(id) {
            self.on_view_update(id);
        }
    }

    /// True if `ancestor` is `id` or lies on the parent chain of `id`.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.node(c).parent;
        }
        false
    }

    /// Render group and relative depth a new child of `parent` joins.
    fn child_group_and_depth(&self, parent: NodeId) -> (Option<NodeId>, u32) {
        let p = self.node(parent);
        if p.render_group.is_some() {
            (Some(parent), 1)
        } else {
            (p.parent_render_group, p.relative_depth + 1)
        }
    }

    /// Re-home the subtree at `id` into `group` at relative `depth`.
    ///
    /// Nested group roots are re-parented but their members are left alone.
    /// Pending view updates follow the node into the new group.
    pub(crate) fn set_subtree_group(&mut self, id: NodeId, group: Option<NodeId>, depth: u32) {
        let node = self.node_mut(id);
        node.parent_render_group = group;
        node.relative_depth = depth;
        node.did_change = false;
        // Ticks are per group; a tick from the previous group must not dedupe here.
        node.update_tick = 0;
        let pending_view = node.did_view_update;
        if node.render_group.is_some() {
            self.set_group_parent(id, group);
        } else {
            for i in 0..self.node(id).children.len() {
                let child = self.node(id).children[i];
                self.set_subtree_group(child, group, depth + 1);
            }
        }
        if pending_view {
            self.on_view_update(id);
        }
    }

    /// Resolve the world transform of `id` from local transforms alone.
    ///
    /// Unlike [`Scene::world_transform`] this ignores every cache, so it is correct
    /// even with pending mutations, at the cost of walking the parent chain.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn resolve_world_transform(&self, id: NodeId) -> Affine {
        let node = self.node(id);
        let mut out = node.local_transform;
        let mut cur = node.parent;
        while let Some(p) = cur {
            let parent = self.node(p);
            out = parent.local_transform * out;
            cur = parent.parent;
        }
        out
    }

    /// Walk every live node id.
    pub fn iter_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| {
            n.as_ref().map(|n| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "NodeId uses 32-bit indices by design."
                )]
                NodeId::new(i as u32, n.generation)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{PaddingEffect, ShapeView};
    use alloc::rc::Rc;
    use core::cell::Cell;

    fn leaf(w: f64, h: f64) -> NodeOptions {
        NodeOptions {
            view: Some(Box::new(ShapeView::rect(w, h))),
            ..Default::default()
        }
    }

    #[derive(Debug)]
    struct CountingView(Rc<Cell<u32>>);

    impl View for CountingView {
        fn bounds(&self) -> crate::Bounds {
            crate::Bounds::new(0.0, 0.0, 1.0, 1.0)
        }
        fn destroy(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Debug)]
    struct CountingEffect(Rc<Cell<u32>>);

    impl Effect for CountingEffect {
        fn add_bounds(&self, _bounds: &mut crate::Bounds) {}
        fn destroy(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn root_is_a_render_group() {
        let scene = Scene::new();
        assert!(scene.render_group(scene.root()).is_some());
        assert_eq!(scene.parent_of(scene.root()), None);
    }

    #[test]
    fn liveness_insert_destroy_reuse() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, leaf(1.0, 1.0));
        assert!(scene.is_alive(a));

        scene.destroy(a);
        assert!(!scene.is_alive(a));
        assert!(scene.children_of(root).is_empty());

        // Reuse slot; the old id must remain stale.
        let b = scene.insert(root, leaf(1.0, 1.0));
        assert!(scene.is_alive(b));
        assert!(!scene.is_alive(a));
        if a.0 == b.0 {
            assert!(b.1 > a.1, "generation must increase on reuse");
        }
    }

    #[test]
    fn destroy_releases_subtree_views_and_effects() {
        let views = Rc::new(Cell::new(0));
        let effects = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.insert(root, NodeOptions::default());
        let child = scene.insert(
            parent,
            NodeOptions {
                view: Some(Box::new(CountingView(views.clone()))),
                ..Default::default()
            },
        );
        scene.add_effect(parent, Box::new(CountingEffect(effects.clone())));
        scene.destroy(parent);
        assert!(!scene.is_alive(child));
        assert_eq!(views.get(), 1);
        assert_eq!(effects.get(), 1);
    }

    #[test]
    fn set_view_destroys_the_previous_view() {
        let views = Rc::new(Cell::new(0));
        let mut scene = Scene::new();
        let n = scene.insert(
            scene.root(),
            NodeOptions {
                view: Some(Box::new(CountingView(views.clone()))),
                ..Default::default()
            },
        );
        scene.set_view(n, Some(Box::new(ShapeView::rect(2.0, 2.0))));
        assert_eq!(views.get(), 1);
    }

    #[test]
    fn reparenting_moves_child() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, NodeOptions::default());
        let b = scene.insert(root, NodeOptions::default());
        let c = scene.insert(a, NodeOptions::default());
        scene.add_child(b, c);
        assert_eq!(scene.parent_of(c), Some(b));
        assert!(scene.children_of(a).is_empty());
        assert_eq!(scene.children_of(b), &[c]);
    }

    #[test]
    #[should_panic(expected = "under itself or one of its descendants")]
    fn attaching_under_descendant_panics() {
        let mut scene = Scene::new();
        let a = scene.insert(scene.root(), NodeOptions::default());
        let b = scene.insert(a, NodeOptions::default());
        scene.add_child(b, a);
    }

    #[test]
    #[should_panic(expected = "dangling NodeId")]
    fn mutating_a_destroyed_node_panics() {
        let mut scene = Scene::new();
        let a = scene.insert(scene.root(), NodeOptions::default());
        scene.destroy(a);
        scene.set_position(a, 1.0, 1.0);
    }

    #[test]
    fn accessors_respect_liveness() {
        let mut scene = Scene::new();
        let a = scene.insert(
            scene.root(),
            NodeOptions {
                z_index: 7,
                ..Default::default()
            },
        );
        assert_eq!(scene.z_index(a), Some(7));
        scene.destroy(a);
        assert_eq!(scene.z_index(a), None);
        assert_eq!(scene.parent_of(a), None);
        assert_eq!(scene.world_transform(a), None);
        assert!(scene.children_of(a).is_empty());
    }

    #[test]
    fn transform_setters_bump_version_only_on_change() {
        let mut scene = Scene::new();
        let a = scene.insert(scene.root(), NodeOptions::default());
        let v0 = scene.transform_version(a).unwrap();
        scene.set_position(a, 10.0, 0.0);
        let v1 = scene.transform_version(a).unwrap();
        assert!(v1 > v0);
        scene.set_x(a, 10.0);
        assert_eq!(scene.transform_version(a), Some(v1));
        assert_eq!(
            scene.local_transform(a),
            Some(Affine::translate((10.0, 0.0)))
        );
    }

    #[test]
    fn sortable_children_sort_at_flush() {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.insert(
            root,
            NodeOptions {
                sortable_children: true,
                ..Default::default()
            },
        );
        let a = scene.insert(parent, NodeOptions::default());
        let b = scene.insert(parent, NodeOptions::default());
        let c = scene.insert(parent, NodeOptions::default());
        scene.set_z_index(a, 5);
        // Order stays until the flush applies the sort.
        assert_eq!(scene.children_of(parent), &[a, b, c]);
        scene.update_transforms(false);
        assert_eq!(scene.children_of(parent), &[b, c, a]);
        // Equal keys keep insertion order.
        scene.set_z_index(c, 5);
        scene.update_transforms(false);
        assert_eq!(scene.children_of(parent), &[b, a, c]);
    }

    #[test]
    fn set_child_index_reorders() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, NodeOptions::default());
        let b = scene.insert(root, NodeOptions::default());
        scene.set_child_index(b, 0);
        assert_eq!(scene.children_of(root), &[b, a]);
    }

    #[test]
    fn mask_is_not_measurable_while_in_use() {
        let mut scene = Scene::new();
        let root = scene.root();
        let target = scene.insert(root, leaf(100.0, 100.0));
        let mask = scene.insert(target, leaf(10.0, 10.0));
        scene.set_mask(target, Some(mask));
        assert!(!scene.flags(mask).unwrap().contains(NodeFlags::MEASURABLE));
        scene.set_mask(target, None);
        assert!(scene.flags(mask).unwrap().contains(NodeFlags::MEASURABLE));
    }

    #[test]
    fn released_mask_keeps_caller_measurability() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, leaf(100.0, 100.0));
        let b = scene.insert(root, leaf(100.0, 100.0));
        let mask = scene.insert(root, leaf(10.0, 10.0));
        scene.set_flags(mask, NodeFlags::default().difference(NodeFlags::MEASURABLE));
        scene.set_mask(a, Some(mask));
        // Moving the mask to another target keeps the remembered state.
        scene.set_mask(b, Some(mask));
        scene.set_mask(b, None);
        assert!(!scene.flags(mask).unwrap().contains(NodeFlags::MEASURABLE));
    }

    #[test]
    fn destroying_mask_clears_target() {
        let mut scene = Scene::new();
        let root = scene.root();
        let target = scene.insert(root, leaf(100.0, 100.0));
        let mask = scene.insert(root, leaf(10.0, 10.0));
        scene.set_mask(target, Some(mask));
        scene.destroy(mask);
        assert_eq!(scene.mask_of(target), None);
    }

    #[test]
    fn clear_effects_destroys_them() {
        let mut scene = Scene::new();
        let n = scene.insert(scene.root(), leaf(1.0, 1.0));
        scene.add_effect(n, Box::new(PaddingEffect::new(1.0)));
        assert_eq!(scene.effect_count(n), 1);
        scene.clear_effects(n);
        assert_eq!(scene.effect_count(n), 0);
    }

    #[test]
    fn update_view_signals_change() {
        let mut scene = Scene::new();
        let n = scene.insert(scene.root(), leaf(1.0, 1.0));
        scene.update_transforms(false);
        let seen = scene.update_view(n, |v| v.bounds());
        assert_eq!(seen, Some(crate::Bounds::new(0.0, 0.0, 1.0, 1.0)));
        let group = scene.render_group(scene.root()).unwrap();
        assert_eq!(group.pending_view_updates(), &[n]);
    }

    #[test]
    fn iter_nodes_lists_live_nodes() {
        let mut scene = Scene::new();
        let a = scene.insert(scene.root(), NodeOptions::default());
        let b = scene.insert(scene.root(), NodeOptions::default());
        scene.destroy(a);
        let ids: Vec<_> = scene.iter_nodes().collect();
        assert_eq!(ids, [scene.root(), b]);
    }
}
