// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render groups: cache boundaries with their own incremental transform pass.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use kurbo::Affine;

use crate::bounds::Bounds;
use crate::scene::Scene;
use crate::types::{NodeId, RenderLayerId};

/// A reusable, append-only list of queued nodes.
///
/// Only the first `index` entries are live; the flush resets `index` to zero and
/// keeps the backing storage for the next frame.
#[derive(Clone, Debug, Default)]
pub(crate) struct UpdateList {
    pub(crate) list: Vec<NodeId>,
    pub(crate) index: usize,
}

impl UpdateList {
    fn push(&mut self, id: NodeId) {
        if self.index < self.list.len() {
            self.list[self.index] = id;
        } else {
            self.list.push(id);
        }
        self.index += 1;
    }

    fn live(&self) -> &[NodeId] {
        &self.list[..self.index]
    }

    /// Drop the live entry for `id`, keeping the order of the others.
    fn remove(&mut self, id: NodeId) {
        if let Some(pos) = self.live().iter().position(|m| *m == id) {
            self.list.remove(pos);
            self.index -= 1;
        }
    }
}

/// Key under which an aggregate bounds value was cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BoundsKey {
    pub(crate) factor_render_layers: bool,
    pub(crate) layer: Option<RenderLayerId>,
}

/// Cached aggregate bounds of a group, in the group root's local space.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CachedBounds {
    pub(crate) bounds: Bounds,
    pub(crate) key: BoundsKey,
    /// Set when effects were applied in world space; the cache is then only
    /// valid while the group keeps this world transform.
    pub(crate) world: Option<Affine>,
}

/// State owned by a render-group root.
///
/// Members of a group store their transform relative to the group root, so
/// moving the root only updates [`RenderGroup::world_transform`]. Members that
/// change are queued per relative depth and recomputed parents-first by
/// [`Scene::update_render_group_transforms`].
#[derive(Debug)]
pub struct RenderGroup {
    pub(crate) root: NodeId,
    pub(crate) parent_group: Option<NodeId>,
    pub(crate) child_groups: Vec<NodeId>,
    pub(crate) world_transform: Affine,
    pub(crate) children_to_update: Vec<UpdateList>,
    pub(crate) renderables_to_update: UpdateList,
    pub(crate) update_tick: u32,
    pub(crate) updating: bool,
    pub(crate) bounds_cache: Option<CachedBounds>,
}

impl RenderGroup {
    fn new(root: NodeId, parent_group: Option<NodeId>, world_transform: Affine) -> Self {
        Self {
            root,
            parent_group,
            child_groups: Vec::new(),
            world_transform,
            children_to_update: Vec::new(),
            renderables_to_update: UpdateList::default(),
            update_tick: 0,
            updating: false,
            bounds_cache: None,
        }
    }

    /// The node that owns this group.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Root of the enclosing group, if any.
    pub fn parent_group(&self) -> Option<NodeId> {
        self.parent_group
    }

    /// Roots of the groups nested directly inside this one.
    pub fn child_groups(&self) -> &[NodeId] {
        &self.child_groups
    }

    /// World transform of the group root as of the last flush.
    pub fn world_transform(&self) -> Affine {
        self.world_transform
    }

    /// Number of queued transform updates awaiting the next flush.
    pub fn pending_transform_updates(&self) -> usize {
        self.children_to_update.iter().map(|l| l.index).sum()
    }

    /// Nodes queued by [`Scene::on_view_update`] since the last flush, in insertion order.
    pub fn pending_view_updates(&self) -> &[NodeId] {
        self.renderables_to_update.live()
    }

    /// Whether an aggregate bounds value is currently cached.
    pub fn has_cached_bounds(&self) -> bool {
        self.bounds_cache.is_some()
    }

    fn queue_transform_update(&mut self, id: NodeId, depth: u32) {
        let depth = depth as usize;
        if self.children_to_update.len() <= depth {
            self.children_to_update
                .resize_with(depth + 1, UpdateList::default);
        }
        self.children_to_update[depth].push(id);
    }
}

impl Scene {
    /// The render group owned by `root`, if `root` is live and a group root.
    pub fn render_group(&self, root: NodeId) -> Option<&RenderGroup> {
        self.node_opt(root)?.render_group.as_deref()
    }

    /// Root of the group whose bounds include `id`: `id` itself for group roots,
    /// otherwise the nearest enclosing group. `None` for detached subtrees without
    /// a group and for stale ids.
    pub fn render_group_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id)?.owning_group(id)
    }

    /// Whether `id` is a live render-group root.
    pub fn is_render_group(&self, id: NodeId) -> bool {
        self.render_group(id).is_some()
    }

    #[track_caller]
    pub(crate) fn group(&self, root: NodeId) -> &RenderGroup {
        self.node(root)
            .render_group
            .as_deref()
            .expect("node is not a render group root")
    }

    #[track_caller]
    pub(crate) fn group_mut(&mut self, root: NodeId) -> &mut RenderGroup {
        self.node_mut(root)
            .render_group
            .as_deref_mut()
            .expect("node is not a render group root")
    }

    /// Cached world transform of `id`, or `None` if `id` is stale.
    ///
    /// Reads the state of the last flush: group roots report their group's world
    /// transform, members compose it with their relative transform. Detached nodes
    /// without a group fall back to [`Scene::resolve_world_transform`].
    pub fn world_transform(&self, id: NodeId) -> Option<Affine> {
        self.node_opt(id)?;
        Some(self.cached_world(id))
    }

    #[track_caller]
    pub(crate) fn cached_world(&self, id: NodeId) -> Affine {
        let node = self.node(id);
        if let Some(group) = &node.render_group {
            return group.world_transform;
        }
        match node.parent_render_group {
            Some(g) => self.group(g).world_transform * node.relative_group_transform,
            None => self.resolve_world_transform(id),
        }
    }

    /// Make `id` the root of its own render group.
    ///
    /// Descendants move into the new group (nested groups are re-parented) and are
    /// queued so their relative transforms are rebuilt at the next flush.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn enable_render_group(&mut self, id: NodeId) {
        if self.node(id).render_group.is_some() {
            return;
        }
        let parent_group = self.node(id).parent_render_group;
        let world = match parent_group {
            Some(_) => self.cached_world(id),
            None => self.resolve_world_transform(id),
        };
        self.node_mut(id).render_group = Some(Box::new(RenderGroup::new(id, parent_group, world)));
        if let Some(pg) = parent_group {
            self.group_mut(pg).child_groups.push(id);
        }
        for i in 0..self.node(id).children.len() {
            let child = self.node(id).children[i];
            self.set_subtree_group(child, Some(id), 1);
            self.mark_transform_dirty(child);
        }
        // A pending view update of the root now belongs to its own group.
        if self.node(id).did_view_update {
            self.on_view_update(id);
        }
        self.invalidate_group_bounds(Some(id));
        log::debug!("enabled render group at {id:?}");
    }

    /// Dissolve the render group rooted at `id`; its members re-attach to the
    /// enclosing group.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale or is the scene root.
    #[track_caller]
    pub fn disable_render_group(&mut self, id: NodeId) {
        let _ = self.node(id);
        assert!(id != self.root(), "the scene root is always a render group");
        let Some(group) = self.node_mut(id).render_group.take() else {
            return;
        };
        let parent_group = group.parent_group;
        if let Some(pg) = parent_group {
            self.group_mut(pg).child_groups.retain(|g| *g != id);
        }
        let depth = self.node(id).relative_depth;
        for i in 0..self.node(id).children.len() {
            let child = self.node(id).children[i];
            self.set_subtree_group(child, parent_group, depth + 1);
            self.mark_transform_dirty(child);
        }
        // Pending view updates of the root itself now belong to the enclosing group.
        if self.node(id).did_view_update {
            self.on_view_update(id);
        }
        self.invalidate_group_bounds(parent_group);
        log::debug!("disabled render group at {id:?}");
    }

    /// Move the group rooted at `root` under `parent`.
    pub(crate) fn set_group_parent(&mut self, root: NodeId, parent: Option<NodeId>) {
        let old = self.group(root).parent_group;
        if old == parent {
            return;
        }
        if let Some(o) = old {
            if let Some(g) = self.node_opt_mut(o).and_then(|n| n.render_group.as_deref_mut()) {
                g.child_groups.retain(|c| *c != root);
            }
        }
        if let Some(p) = parent {
            self.group_mut(p).child_groups.push(root);
        }
        let group = self.group_mut(root);
        group.parent_group = parent;
        group.bounds_cache = None;
    }

    /// Signal that the content of `id` changed.
    ///
    /// Records `id` once per flush in the view-update queue of the group whose bounds
    /// include it, and invalidates the cached bounds of that group and every
    /// enclosing group. Repeated calls before the next flush only re-invalidate.
    /// A pending entry follows the node when it is re-homed into another group.
    ///
    /// # Panics
    ///
    /// Panics if `id` is stale.
    #[track_caller]
    pub fn on_view_update(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        let group = node.owning_group(id);
        let queued = node.did_view_update.then_some(node.queued_in).flatten();
        if !node.did_view_update || queued != group {
            node.did_view_update = true;
            node.queued_in = group;
            if let Some(old) = queued {
                // The old group may have been dissolved or destroyed.
                let old_group = self
                    .node_opt_mut(old)
                    .and_then(|n| n.render_group.as_deref_mut());
                if let Some(g) = old_group {
                    g.renderables_to_update.remove(id);
                }
            }
            if let Some(g) = group {
                self.group_mut(g).renderables_to_update.push(id);
            }
        }
        self.invalidate_group_bounds(group);
    }

    /// Record a local transform change of `id` in the queue of its group.
    pub(crate) fn mark_transform_dirty(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.transform_version = node.transform_version.wrapping_add(1);
        if node.did_change {
            return;
        }
        // Group roots are members of the enclosing group for their own transform.
        let Some(group) = node.parent_render_group else {
            return;
        };
        node.did_change = true;
        let depth = node.relative_depth;
        self.group_mut(group).queue_transform_update(id, depth);
        self.invalidate_group_bounds(Some(group));
    }

    /// Drop the cached aggregate bounds of `group` and all enclosing groups.
    pub(crate) fn invalidate_group_bounds(&mut self, group: Option<NodeId>) {
        let mut cur = group;
        while let Some(g) = cur {
            let Some(rg) = self.node_opt_mut(g).and_then(|n| n.render_group.as_deref_mut())
            else {
                return;
            };
            rg.bounds_cache = None;
            cur = rg.parent_group;
        }
    }

    /// Recompute the transforms of the members of the group rooted at `root`.
    ///
    /// Refreshes the group's world transform from its enclosing group (or from
    /// local transforms for top-level groups), then recomputes queued members and
    /// their subtrees, shallowest depth first, skipping entries whose node was
    /// destroyed or moved since it was queued. With `force`, every member is
    /// recomputed. Nested groups contribute only their root's relative transform;
    /// flush them separately, or use [`Scene::update_transforms`].
    ///
    /// Also drains the view-update queue (applying pending child sorts) and
    /// invalidates cached bounds when anything changed. Calling it again without
    /// intervening mutations does no work.
    ///
    /// A call made while the same group is already flushing is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `root` is stale or not a render-group root.
    #[track_caller]
    pub fn update_render_group_transforms(&mut self, root: NodeId, force: bool) {
        let group = self.group_mut(root);
        if group.updating {
            log::warn!("ignoring re-entrant flush of render group {root:?}");
            return;
        }
        group.updating = true;
        group.update_tick = group.update_tick.wrapping_add(1);
        let tick = group.update_tick;

        let world_changed = self.update_group_world(root);
        let mut processed = 0_usize;
        if force {
            for i in 0..self.node(root).children.len() {
                let child = self.node(root).children[i];
                processed += self.update_transform_and_children(child, root, tick);
            }
            for list in &mut self.group_mut(root).children_to_update {
                list.index = 0;
            }
        } else {
            for depth in 0..self.group(root).children_to_update.len() {
                let count = self.group(root).children_to_update[depth].index;
                for i in 0..count {
                    let id = self.group(root).children_to_update[depth].list[i];
                    let live = self.node_opt(id).is_some_and(|n| {
                        n.parent_render_group == Some(root)
                            && n.relative_depth as usize == depth
                            && n.update_tick != tick
                    });
                    if live {
                        processed += self.update_transform_and_children(id, root, tick);
                    }
                }
                self.group_mut(root).children_to_update[depth].index = 0;
            }
        }
        let drained = self.drain_view_updates(root);

        if processed > 0 || drained > 0 || force {
            self.invalidate_group_bounds(Some(root));
        } else if world_changed {
            // Aggregates are stored in group space; only the enclosing group sees the move.
            let parent = self.group(root).parent_group;
            self.invalidate_group_bounds(parent);
        }
        self.group_mut(root).updating = false;
        log::trace!(
            "flushed render group {root:?}: {processed} transforms, {drained} view updates"
        );
    }

    /// Flush every render group reachable from the scene root, parents first.
    ///
    /// This is the once-per-frame entry point before reading world transforms or
    /// running fast bounds queries.
    pub fn update_transforms(&mut self, force: bool) {
        let mut stack = vec![self.root()];
        while let Some(g) = stack.pop() {
            self.update_render_group_transforms(g, force);
            stack.extend(self.group(g).child_groups.iter().rev().copied());
        }
    }

    /// Refresh the world transform of a group; returns whether it changed.
    fn update_group_world(&mut self, root: NodeId) -> bool {
        let world = match self.group(root).parent_group {
            Some(pg) => self.group(pg).world_transform * self.node(root).relative_group_transform,
            None => {
                // Top-level roots are not queued anywhere; their flag only dedupes.
                self.node_mut(root).did_change = false;
                self.resolve_world_transform(root)
            }
        };
        let group = self.group_mut(root);
        let changed = group.world_transform != world;
        group.world_transform = world;
        changed
    }

    /// Recompute the relative transform of `id` and, unless it roots a nested
    /// group, of its subtree. Returns the number of nodes visited.
    fn update_transform_and_children(
        &mut self,
        id: NodeId,
        group_root: NodeId,
        tick: u32,
    ) -> usize {
        let node = self.node(id);
        if node.update_tick == tick {
            return 0;
        }
        let parent_relative = match node.parent {
            Some(p) if p != group_root => Some(self.node(p).relative_group_transform),
            _ => None,
        };
        let node = self.node_mut(id);
        node.update_tick = tick;
        node.did_change = false;
        node.relative_group_transform = match parent_relative {
            Some(parent) => parent * node.local_transform,
            None => node.local_transform,
        };
        if node.render_group.is_some() {
            return 1;
        }
        let mut count = 1;
        for i in 0..self.node(id).children.len() {
            let child = self.node(id).children[i];
            count += self.update_transform_and_children(child, group_root, tick);
        }
        count
    }

    /// Apply and clear pending view updates of the group; returns how many were live.
    fn drain_view_updates(&mut self, root: NodeId) -> usize {
        let mut drained = 0;
        let count = self.group(root).renderables_to_update.index;
        for i in 0..count {
            let id = self.group(root).renderables_to_update.list[i];
            let Some(node) = self.node_opt_mut(id) else {
                continue;
            };
            if !node.did_view_update || node.queued_in != Some(root) {
                continue;
            }
            node.did_view_update = false;
            node.queued_in = None;
            if node.sort_dirty {
                self.sort_children(id);
            }
            drained += 1;
        }
        self.group_mut(root).renderables_to_update.index = 0;
        drained
    }
}
