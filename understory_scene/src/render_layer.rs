// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render layers: render-order lists that are independent of tree parentage.

use alloc::vec::Vec;

use crate::bounds::Bounds;
use crate::scene::Scene;
use crate::types::{NodeId, RenderLayerId};

/// An ordered, non-owning list of nodes rendered together.
///
/// Membership never changes parentage or transforms. A node belongs to at most
/// one layer at a time.
#[derive(Clone, Debug)]
pub struct RenderLayer {
    generation: u32,
    pub(crate) members: Vec<NodeId>,
}

impl RenderLayer {
    /// Members in render order.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the layer has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Scene {
    /// Create an empty render layer.
    pub fn create_render_layer(&mut self) -> RenderLayerId {
        let (idx, generation) = if let Some(idx) = self.layer_free_list.pop() {
            let generation = self.layer_generations[idx].saturating_add(1);
            self.layer_generations[idx] = generation;
            (idx, generation)
        } else {
            self.layer_generations.push(1);
            self.layers.push(None);
            (self.layers.len() - 1, 1)
        };
        self.layers[idx] = Some(RenderLayer {
            generation,
            members: Vec::new(),
        });
        #[allow(
            clippy::cast_possible_truncation,
            reason = "RenderLayerId uses 32-bit indices by design."
        )]
        let id = RenderLayerId(idx as u32, generation);
        log::debug!("created render layer {id:?}");
        id
    }

    /// Destroy a render layer, releasing every member. The nodes stay in the tree.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is stale.
    #[track_caller]
    pub fn destroy_render_layer(&mut self, layer: RenderLayerId) {
        let _ = self.layer(layer);
        let Some(removed) = self.layers[layer.idx()].take() else {
            return;
        };
        for member in removed.members {
            self.node_mut(member).render_layer = None;
            self.invalidate_owner_bounds(member);
        }
        self.layer_free_list.push(layer.idx());
        log::debug!("destroyed render layer {layer:?}");
    }

    /// The layer behind `layer`, or `None` if it is stale.
    pub fn render_layer(&self, layer: RenderLayerId) -> Option<&RenderLayer> {
        let l = self.layers.get(layer.idx())?.as_ref()?;
        (l.generation == layer.1).then_some(l)
    }

    /// Layer that `id` belongs to, if any. `None` for stale ids.
    pub fn render_layer_of(&self, id: NodeId) -> Option<RenderLayerId> {
        self.node_opt(id)?.render_layer
    }

    pub(crate) fn layer_opt_mut(&mut self, layer: RenderLayerId) -> Option<&mut RenderLayer> {
        let l = self.layers.get_mut(layer.idx())?.as_mut()?;
        if l.generation != layer.1 {
            return None;
        }
        Some(l)
    }

    #[track_caller]
    fn layer(&self, layer: RenderLayerId) -> &RenderLayer {
        match self.render_layer(layer) {
            Some(l) => l,
            None => panic!("dangling RenderLayerId {layer:?}"),
        }
    }

    #[track_caller]
    fn layer_mut(&mut self, layer: RenderLayerId) -> &mut RenderLayer {
        match self.layer_opt_mut(layer) {
            Some(l) => l,
            None => panic!("dangling RenderLayerId {layer:?}"),
        }
    }

    /// Append `id` to `layer`.
    ///
    /// A node already claimed by another layer moves to `layer` (the last add
    /// wins). Adding a node to the layer it already belongs to does nothing.
    ///
    /// # Panics
    ///
    /// Panics if `layer` or `id` is stale.
    #[track_caller]
    pub fn add_to_render_layer(&mut self, layer: RenderLayerId, id: NodeId) {
        let _ = self.layer(layer);
        match self.node(id).render_layer {
            Some(current) if current == layer => return,
            Some(previous) => {
                log::warn!("{id:?} moves from render layer {previous:?} to {layer:?}");
                if let Some(l) = self.layer_opt_mut(previous) {
                    l.members.retain(|m| *m != id);
                }
            }
            None => {}
        }
        self.layer_mut(layer).members.push(id);
        self.node_mut(id).render_layer = Some(layer);
        self.invalidate_owner_bounds(id);
    }

    /// Remove `id` from `layer`. Does nothing if `id` is not a member.
    ///
    /// # Panics
    ///
    /// Panics if `layer` or `id` is stale.
    #[track_caller]
    pub fn remove_from_render_layer(&mut self, layer: RenderLayerId, id: NodeId) {
        let _ = self.layer(layer);
        if self.node(id).render_layer != Some(layer) {
            return;
        }
        self.layer_mut(layer).members.retain(|m| *m != id);
        self.node_mut(id).render_layer = None;
        self.invalidate_owner_bounds(id);
    }

    /// Stable-sort the members of `layer` by z-index.
    ///
    /// # Panics
    ///
    /// Panics if `layer` is stale.
    #[track_caller]
    pub fn sort_render_layer(&mut self, layer: RenderLayerId) {
        let mut members = core::mem::take(&mut self.layer_mut(layer).members);
        members.sort_by_key(|m| self.node(*m).z_index);
        self.layer_mut(layer).members = members;
    }

    /// Union of the fast bounds of every member, with `layer` as the active layer.
    ///
    /// Members nested inside other members are only counted once. Assumes
    /// flushed transforms, like [`Scene::fast_global_bounds`].
    ///
    /// # Panics
    ///
    /// Panics if `layer` is stale.
    #[track_caller]
    pub fn render_layer_bounds(&mut self, layer: RenderLayerId) -> Bounds {
        let members = self.layer(layer).members.clone();
        let mut out = Bounds::EMPTY;
        for member in members {
            out.add_bounds(&self.fast_global_bounds_in_layer(member, true, Some(layer)));
        }
        *out.or_zero()
    }

    fn invalidate_owner_bounds(&mut self, id: NodeId) {
        let owner = self.node(id).owning_group(id);
        self.invalidate_group_bounds(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NodeOptions, Transform2d};
    use crate::view::ShapeView;
    use alloc::boxed::Box;

    fn sprite(x: f64, w: f64) -> NodeOptions {
        NodeOptions {
            transform: Transform2d::from_position(x, 0.0),
            view: Some(Box::new(ShapeView::rect(w, w))),
            ..Default::default()
        }
    }

    #[test]
    fn membership_does_not_touch_the_tree() {
        let mut scene = Scene::new();
        let root = scene.root();
        let n = scene.insert(root, sprite(10.0, 5.0));
        let layer = scene.create_render_layer();
        scene.add_to_render_layer(layer, n);
        assert_eq!(scene.render_layer_of(n), Some(layer));
        assert_eq!(scene.parent_of(n), Some(root));
        assert_eq!(scene.render_layer(layer).unwrap().members(), &[n]);

        scene.remove_from_render_layer(layer, n);
        assert_eq!(scene.render_layer_of(n), None);
        assert!(scene.render_layer(layer).unwrap().is_empty());
    }

    #[test]
    fn last_add_wins() {
        let mut scene = Scene::new();
        let n = scene.insert(scene.root(), sprite(0.0, 1.0));
        let a = scene.create_render_layer();
        let b = scene.create_render_layer();
        scene.add_to_render_layer(a, n);
        scene.add_to_render_layer(b, n);
        assert_eq!(scene.render_layer_of(n), Some(b));
        assert!(scene.render_layer(a).unwrap().is_empty());
        assert_eq!(scene.render_layer(b).unwrap().len(), 1);
        // Re-adding to the current layer is a no-op.
        scene.add_to_render_layer(b, n);
        assert_eq!(scene.render_layer(b).unwrap().len(), 1);
    }

    #[test]
    fn reparenting_keeps_membership() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, NodeOptions::default());
        let n = scene.insert(root, sprite(0.0, 1.0));
        let layer = scene.create_render_layer();
        scene.add_to_render_layer(layer, n);
        scene.add_child(a, n);
        assert_eq!(scene.render_layer_of(n), Some(layer));
    }

    #[test]
    fn destroying_members_and_layers() {
        let mut scene = Scene::new();
        let root = scene.root();
        let n = scene.insert(root, sprite(0.0, 1.0));
        let m = scene.insert(root, sprite(0.0, 1.0));
        let layer = scene.create_render_layer();
        scene.add_to_render_layer(layer, n);
        scene.add_to_render_layer(layer, m);
        scene.destroy(n);
        assert_eq!(scene.render_layer(layer).unwrap().members(), &[m]);

        scene.destroy_render_layer(layer);
        assert!(scene.render_layer(layer).is_none());
        assert_eq!(scene.render_layer_of(m), None);
        let again = scene.create_render_layer();
        assert_ne!(again, layer);
    }

    #[test]
    #[should_panic(expected = "dangling RenderLayerId")]
    fn stale_layer_panics() {
        let mut scene = Scene::new();
        let n = scene.insert(scene.root(), sprite(0.0, 1.0));
        let layer = scene.create_render_layer();
        scene.destroy_render_layer(layer);
        scene.add_to_render_layer(layer, n);
    }

    #[test]
    fn sort_orders_members_by_z_index() {
        let mut scene = Scene::new();
        let root = scene.root();
        let layer = scene.create_render_layer();
        let mut ids = Vec::new();
        for z in [3, 1, 2, 1] {
            let n = scene.insert(
                root,
                NodeOptions {
                    z_index: z,
                    ..Default::default()
                },
            );
            scene.add_to_render_layer(layer, n);
            ids.push(n);
        }
        scene.sort_render_layer(layer);
        assert_eq!(
            scene.render_layer(layer).unwrap().members(),
            &[ids[1], ids[3], ids[2], ids[0]]
        );
    }

    #[test]
    fn layer_bounds_union_members() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.insert(root, sprite(0.0, 10.0));
        let b = scene.insert(root, sprite(100.0, 10.0));
        let _other = scene.insert(root, sprite(500.0, 10.0));
        let layer = scene.create_render_layer();
        scene.add_to_render_layer(layer, a);
        scene.add_to_render_layer(layer, b);
        scene.update_transforms(false);
        assert_eq!(
            scene.render_layer_bounds(layer),
            Bounds::new(0.0, 0.0, 110.0, 10.0)
        );
        let empty = scene.create_render_layer();
        assert_eq!(scene.render_layer_bounds(empty), Bounds::ZERO);
    }
}
