use std::collections::HashSet;
use std::sync::Arc;

use bookshelf_assets::{Aabb, AssetScene, Handle, MeshData};
use bookshelf_core::{time::Time, transform::Transform};
use flecs_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// A node of the scene world. Wraps the flecs entity that carries the node's components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(Entity);

impl NodeId {
    pub fn entity(&self) -> Entity {
        self.0
    }
}

#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub struct NodeName(pub String);

#[derive(Component, Clone, Debug)]
pub struct MeshRef {
    pub handle: Handle<MeshData>,
    pub data: Arc<MeshData>,
}

/// Spawn order. Siblings and in-scene roots are listed by it.
#[derive(Component, Clone, Copy, Debug)]
struct SpawnOrder(u64);

/// Marks a top-level object that is part of the scene. The value orders the roots by
/// insertion.
#[derive(Component, Clone, Copy, Debug)]
struct InScene(u64);

/// Blueprint for one node, turned into an entity by [`SceneGraph::spawn`].
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshRef>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh: None,
        }
    }
}

/// The scene world. Nodes are entities linked by `ChildOf`; top-level objects tagged
/// `InScene` are rendered and picked. Detached subtrees (fresh instances, template
/// bases) live in the world untagged.
pub struct SceneGraph {
    world: World,
    next_order: u64,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let world = World::new();

        world
            .component::<Time>()
            .add_trait::<flecs::Singleton>()
            .set(Time::default());

        world
            .system_named::<&mut Time>("Tick frame clock")
            .kind(flecs::pipeline::OnLoad)
            .each(|time| time.update());

        Self {
            world,
            next_order: 0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Runs one pass of the world pipeline and returns the seconds since the last one.
    pub fn advance_clock(&mut self) -> f32 {
        self.world.progress();
        self.world.get::<&Time>(|time| time.delta_seconds())
    }

    /// Restarts delta accounting so the next frame does not jump.
    pub fn reset_clock(&mut self) {
        self.world.get::<&mut Time>(|time| time.reset());
    }

    pub(crate) fn view(&self, id: NodeId) -> Option<EntityView<'_>> {
        self.world
            .is_alive(id.0)
            .then(|| self.world.entity_from_id(id.0))
    }

    fn order(&mut self) -> u64 {
        self.next_order += 1;
        self.next_order
    }

    /// Number of nodes in the world, detached ones included.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.world
            .query::<&NodeName>()
            .build()
            .each(|_| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.view(id).is_some()
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) {
        if let Some(entity) = self.view(id) {
            entity.set(NodeName(name.into()));
        }
    }

    pub fn name(&self, id: NodeId) -> Option<String> {
        self.view(id)?.try_get::<&NodeName>(|name| name.0.clone())
    }

    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.view(id)?.try_get::<&Transform>(|transform| *transform)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        if let Some(entity) = self.view(id) {
            entity.set(transform);
        }
    }

    /// Edits the local transform in place. Returns false for unknown nodes.
    pub fn update_transform(&mut self, id: NodeId, edit: impl FnOnce(&mut Transform)) -> bool {
        self.view(id)
            .and_then(|entity| entity.try_get::<&mut Transform>(|transform| edit(transform)))
            .is_some()
    }

    pub fn mesh(&self, id: NodeId) -> Option<MeshRef> {
        self.view(id)?.try_get::<&MeshRef>(|mesh| mesh.clone())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.view(id)?.parent().map(|parent| NodeId(parent.id()))
    }

    /// Direct children in spawn order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let Some(entity) = self.view(id) else {
            return Vec::new();
        };
        let mut children = Vec::new();
        entity.each_child(|child| {
            let order = child.try_get::<&SpawnOrder>(|order| order.0).unwrap_or(0);
            children.push((order, NodeId(child.id())));
        });
        children.sort_by_key(|(order, _)| *order);
        children.into_iter().map(|(_, child)| child).collect()
    }

    /// Top-level objects currently in the scene, in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots = Vec::new();
        self.world
            .query::<&InScene>()
            .build()
            .each_entity(|entity, in_scene| roots.push((in_scene.0, NodeId(entity.id()))));
        roots.sort_by_key(|(order, _)| *order);
        roots.into_iter().map(|(_, root)| root).collect()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.view(id)
            .and_then(|entity| entity.try_get::<&InScene>(|_| ()))
            .is_some()
    }

    /// Adds a detached node, optionally under `parent`.
    pub fn spawn(&mut self, node: SceneNode, parent: Option<NodeId>) -> NodeId {
        let order = self.order();
        let entity = self
            .world
            .entity()
            .set(NodeName(node.name))
            .set(node.transform)
            .set(SpawnOrder(order));
        if let Some(mesh) = node.mesh {
            entity.set(mesh);
        }
        if let Some(parent) = parent.filter(|parent| self.exists(*parent)) {
            entity.child_of(parent.0);
        }
        NodeId(entity.id())
    }

    /// Builds a detached copy of `asset`. The returned group node's children are the
    /// asset's root nodes.
    pub fn instantiate(&mut self, asset: &AssetScene) -> NodeId {
        let group = self.spawn(SceneNode::new(""), None);
        let mut spawned = HashSet::new();

        for &root in &asset.roots {
            self.instantiate_node(asset, root, group, &mut spawned);
        }
        group
    }

    fn instantiate_node(
        &mut self,
        asset: &AssetScene,
        index: usize,
        parent: NodeId,
        spawned: &mut HashSet<usize>,
    ) {
        // glTF forbids shared children, guard against malformed cycles anyway
        if !spawned.insert(index) {
            return;
        }
        let Some(source) = asset.nodes.get(index) else {
            return;
        };

        let node = SceneNode {
            name: source.name.clone(),
            transform: source.transform,
            mesh: asset.mesh(source).map(|(handle, data)| MeshRef {
                handle: handle.clone(),
                data: data.clone(),
            }),
        };
        let id = self.spawn(node, Some(parent));

        for &child in &source.children {
            self.instantiate_node(asset, child, id, spawned);
        }
    }

    /// Deep copy of the subtree under `id`, detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        self.clone_node(id, None)
    }

    fn clone_node(&mut self, id: NodeId, parent: Option<NodeId>) -> Option<NodeId> {
        let node = SceneNode {
            name: self.name(id)?,
            transform: self.transform(id).unwrap_or_default(),
            mesh: self.mesh(id),
        };
        let copy = self.spawn(node, parent);
        for child in self.children(id) {
            self.clone_node(child, Some(copy));
        }
        Some(copy)
    }

    /// Puts a detached top-level node into the scene.
    pub fn insert(&mut self, id: NodeId) {
        if !self.exists(id) || self.contains(id) {
            return;
        }
        let order = self.order();
        self.world.entity_from_id(id.0).set(InScene(order));
    }

    /// Deletes `id` and its whole subtree.
    pub fn despawn(&mut self, id: NodeId) {
        if let Some(entity) = self.view(id) {
            entity.destruct();
        }
    }

    /// Follows child indices from `id`, e.g. `[0, 0, 24]`.
    pub fn child_at_path(&self, id: NodeId, path: &[usize]) -> Option<NodeId> {
        path.iter().try_fold(id, |current, &index| {
            self.children(current).get(index).copied()
        })
    }

    /// Walks up to the node that has no parent.
    pub fn top_level_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.view(id)?;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        Some(NodeId(current.id()))
    }

    /// `id` followed by every descendant, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.exists(current) {
                out.push(current);
                stack.extend(self.children(current).into_iter().rev());
            }
        }
        out
    }

    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.name(*id).is_some_and(|node| node == name))
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = self.view(id);
        while let Some(entity) = current {
            let local = entity
                .try_get::<&Transform>(|transform| transform.compute_matrix())
                .unwrap_or(Mat4::IDENTITY);
            matrix = local * matrix;
            current = entity.parent();
        }
        matrix
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).w_axis.truncate()
    }

    pub fn world_rotation(&self, id: NodeId) -> Quat {
        let (_, rotation, _) = self.world_matrix(id).to_scale_rotation_translation();
        rotation
    }

    /// The eight corners of the node's own mesh bounds, placed in world space.
    pub fn mesh_corners(&self, id: NodeId) -> Option<[Vec3; 8]> {
        let mesh = self.mesh(id)?;
        Some(mesh.data.bounds.transformed_corners(self.world_matrix(id)))
    }

    /// World-space box enclosing every mesh in the subtree.
    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        let corners: Vec<Vec3> = self
            .descendants(id)
            .into_iter()
            .filter_map(|node| self.mesh_corners(node))
            .flatten()
            .collect();
        Aabb::from_points(corners)
    }

    /// Every in-scene node carrying a mesh, with its world matrix.
    pub fn renderables(&self) -> Vec<(NodeId, Mat4, MeshRef)> {
        let mut out = Vec::new();
        for root in self.roots() {
            self.collect_renderables(root, Mat4::IDENTITY, &mut out);
        }
        out
    }

    fn collect_renderables(&self, id: NodeId, parent: Mat4, out: &mut Vec<(NodeId, Mat4, MeshRef)>) {
        let Some(transform) = self.transform(id) else {
            return;
        };
        let world = parent * transform.compute_matrix();
        if let Some(mesh) = self.mesh(id) {
            out.push((id, world, mesh));
        }
        for child in self.children(id) {
            self.collect_renderables(child, world, out);
        }
    }
}
