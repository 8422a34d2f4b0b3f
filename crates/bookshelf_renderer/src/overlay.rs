use bookshelf_core::{Camera, Viewport};
use bookshelf_scene::{NodeId, SceneGraph};
use glam::{Quat, Vec2, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OverlayHandle(u64);

/// Flat content laid out in screen pixels and pinned to a scene node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayElement {
    pub label: String,
    /// Width and height in pixels.
    pub size: Vec2,
    /// Offset from the anchor in the element's own pixel space.
    pub local_offset: Vec3,
    /// Sanitized HTML blocks, in display order.
    pub blocks: Vec<String>,
}

impl OverlayElement {
    pub fn new(label: impl Into<String>, size: Vec2) -> Self {
        Self {
            label: label.into(),
            size,
            ..Default::default()
        }
    }
}

/// World placement of an overlay for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// World units per pixel.
    pub scale: f32,
}

impl Default for OverlayPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayDraw {
    pub pose: OverlayPose,
    pub size: Vec2,
}

struct Binding {
    handle: OverlayHandle,
    element: OverlayElement,
    anchor: NodeId,
    rotation_offset: Option<Quat>,
    pose: Option<OverlayPose>,
}

/// Keeps screen-space elements glued to scene nodes, sized so one element pixel
/// covers one screen pixel at the anchor's depth.
#[derive(Default)]
pub struct OverlayRenderer {
    next_handle: u64,
    bindings: Vec<Binding>,
}

impl OverlayRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(
        &mut self,
        element: OverlayElement,
        anchor: NodeId,
        rotation_offset: Option<Quat>,
    ) -> OverlayHandle {
        log::debug!("Adding overlay object: {}", element.label);
        let handle = OverlayHandle(self.next_handle);
        self.next_handle += 1;
        self.bindings.push(Binding {
            handle,
            element,
            anchor,
            rotation_offset,
            pose: None,
        });
        handle
    }

    /// Removing an unknown or already removed handle does nothing.
    pub fn remove_object(&mut self, handle: OverlayHandle) -> Option<OverlayElement> {
        let index = self.bindings.iter().position(|b| b.handle == handle)?;
        Some(self.bindings.remove(index).element)
    }

    pub fn contains(&self, handle: OverlayHandle) -> bool {
        self.bindings.iter().any(|b| b.handle == handle)
    }

    pub fn element(&self, handle: OverlayHandle) -> Option<&OverlayElement> {
        self.binding(handle).map(|b| &b.element)
    }

    pub fn element_mut(&mut self, handle: OverlayHandle) -> Option<&mut OverlayElement> {
        self.bindings
            .iter_mut()
            .find(|b| b.handle == handle)
            .map(|b| &mut b.element)
    }

    pub fn pose(&self, handle: OverlayHandle) -> Option<OverlayPose> {
        self.binding(handle).and_then(|b| b.pose)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Sync pass, once per frame before presenting.
    pub fn animate(&mut self, camera: &Camera, viewport: Viewport, graph: &SceneGraph) {
        let camera_position = camera.position();

        for binding in &mut self.bindings {
            if !graph.exists(binding.anchor) {
                binding.pose = None;
                continue;
            }

            let anchor_position = graph.world_position(binding.anchor);
            let mut rotation = graph.world_rotation(binding.anchor);
            if let Some(offset) = binding.rotation_offset {
                rotation *= offset;
            }

            let scale = scale_at_distance(camera, viewport, camera_position.distance(anchor_position));
            let position = anchor_position + rotation * (binding.element.local_offset * scale);

            binding.pose = Some(OverlayPose {
                position,
                rotation,
                scale,
            });
        }
    }

    /// Elements posed by the last sync pass.
    pub fn draws(&self) -> Vec<OverlayDraw> {
        self.bindings
            .iter()
            .filter_map(|b| {
                b.pose.map(|pose| OverlayDraw {
                    pose,
                    size: b.element.size,
                })
            })
            .collect()
    }

    fn binding(&self, handle: OverlayHandle) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.handle == handle)
    }
}

/// World units covered by one pixel at `distance` from the camera.
pub fn scale_at_distance(camera: &Camera, viewport: Viewport, distance: f32) -> f32 {
    if viewport.height <= 0.0 {
        return 0.0;
    }
    camera.visible_height_at(distance) / viewport.height
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use bookshelf_scene::SceneNode;

    use super::*;

    fn setup(anchor_z: f32) -> (Camera, SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let mut node = SceneNode::new("slot");
        node.transform.translation = Vec3::new(0.0, 0.0, anchor_z);
        node.transform.rotation = Quat::from_rotation_y(FRAC_PI_2);
        let anchor = graph.spawn(node, None);
        (Camera::default(), graph, anchor)
    }

    #[test]
    fn scale_doubles_with_distance() {
        let camera = Camera::default();
        let viewport = Viewport::new(800.0, 600.0);
        let near = scale_at_distance(&camera, viewport, 2.0);
        let far = scale_at_distance(&camera, viewport, 4.0);
        assert!((far - 2.0 * near).abs() < 1e-6);
        assert!((near - 2.0 * (30.0f32.to_radians()).tan() * 2.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn pose_follows_anchor_and_offset() {
        let (camera, graph, anchor) = setup(-5.0);
        let mut overlays = OverlayRenderer::new();
        let offset = Quat::from_rotation_x(FRAC_PI_2);
        let handle = overlays.add_object(OverlayElement::new("page", Vec2::new(100.0, 200.0)), anchor, Some(offset));

        overlays.animate(&camera, Viewport::new(800.0, 600.0), &graph);

        let pose = overlays.pose(handle).unwrap();
        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
        assert!(pose.rotation.abs_diff_eq(Quat::from_rotation_y(FRAC_PI_2) * offset, 1e-5));
        assert_eq!(overlays.draws().len(), 1);
    }

    #[test]
    fn local_offset_is_in_scaled_pixels() {
        let (camera, mut graph, anchor) = setup(-5.0);
        graph.update_transform(anchor, |t| t.rotation = Quat::IDENTITY);
        let mut overlays = OverlayRenderer::new();
        let mut element = OverlayElement::new("left page", Vec2::new(100.0, 200.0));
        element.local_offset = Vec3::new(-50.0, 0.0, 0.0);
        let handle = overlays.add_object(element, anchor, None);

        let viewport = Viewport::new(800.0, 600.0);
        overlays.animate(&camera, viewport, &graph);

        let pose = overlays.pose(handle).unwrap();
        let expected = -50.0 * scale_at_distance(&camera, viewport, 5.0);
        assert!((pose.position.x - expected).abs() < 1e-5);
    }

    #[test]
    fn remove_is_idempotent() {
        let (_, _, anchor) = setup(-1.0);
        let mut overlays = OverlayRenderer::new();
        let handle = overlays.add_object(OverlayElement::default(), anchor, None);
        assert!(overlays.remove_object(handle).is_some());
        assert!(overlays.remove_object(handle).is_none());
        assert!(overlays.is_empty());
    }

    #[test]
    fn missing_anchor_is_not_drawn() {
        let (camera, mut graph, anchor) = setup(-1.0);
        let mut overlays = OverlayRenderer::new();
        let handle = overlays.add_object(OverlayElement::default(), anchor, None);
        graph.despawn(anchor);

        overlays.animate(&camera, Viewport::new(800.0, 600.0), &graph);
        assert!(overlays.pose(handle).is_none());
        assert!(overlays.draws().is_empty());
    }
}
