use std::collections::{HashMap, HashSet};

use bookshelf_scene::NodeId;
use glam::{Mat4, Vec3};
use uuid::Uuid;
use wgpu::{Device, Queue, Surface, SurfaceConfiguration};

use crate::{
    FrameData, RenderBackend, RenderError,
    global_resources::GlobalResources,
    mesh::{GpuGeometry, MeshInstance, MeshUniform},
    programs::{DrawItem, GpuProgram, GpuProgramRenderContext, SceneProgram},
    texture::TextureHelper,
};

const PAPER: [f32; 4] = [0.98, 0.97, 0.93, 1.0];

/// Draws the scene graph and overlay quads into a native window surface.
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    config: SurfaceConfiguration,
    depth_texture: wgpu::TextureView,

    global_resources: GlobalResources,
    scene_program: SceneProgram,

    geometries: HashMap<Uuid, GpuGeometry>,
    instances: HashMap<NodeId, MeshInstance>,
    overlay_quad: GpuGeometry,
    overlay_instances: Vec<MeshInstance>,
}

impl WgpuBackend {
    /// `target` is usually an `Arc<winit::window::Window>`.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        log::info!("Initializing GPU");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        // Adapter requests are async, the frame loop has no executor so block here
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| RenderError::Adapter(e.to_string()))?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
                .map_err(|e| RenderError::Device(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Surface("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync On
            desired_maximum_frame_latency: 2,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureHelper::create_depth_texture(&device, config.width, config.height, "Depth Texture");
        let global_resources = GlobalResources::new(&device);
        let scene_program = SceneProgram::new(
            &GpuProgramRenderContext {
                device: &device,
                format,
            },
            &global_resources.layout,
        );
        let overlay_quad = GpuGeometry::quad(&device);

        log::info!("Pipeline compiled for {format:?}");

        Ok(Self {
            device,
            queue,
            surface,
            config,
            depth_texture,
            global_resources,
            scene_program,
            geometries: HashMap::new(),
            instances: HashMap::new(),
            overlay_quad,
            overlay_instances: Vec::new(),
        })
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = TextureHelper::create_depth_texture(
            &self.device,
            self.config.width,
            self.config.height,
            "Depth Texture",
        );
    }

    // Uploads new geometry and refreshes per-node uniforms. Returns the draw order.
    fn prepare_meshes(&mut self, frame: &FrameData<'_>) -> Vec<(NodeId, Uuid)> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();

        for (node, world, mesh) in frame.graph.renderables() {
            let mesh_id = mesh.handle.id;
            if !self.geometries.contains_key(&mesh_id) {
                log::debug!("Uploading mesh {mesh_id}");
                self.geometries
                    .insert(mesh_id, GpuGeometry::from_mesh(&self.device, &mesh.data));
            }

            let uniform = MeshUniform::new(world, mesh.data.base_color);
            match self.instances.get(&node) {
                Some(instance) => instance.update(&self.queue, uniform),
                None => {
                    let instance =
                        MeshInstance::new(&self.device, &self.scene_program.mesh_layout, uniform);
                    self.instances.insert(node, instance);
                }
            }
            seen.insert(node);
            order.push((node, mesh_id));
        }

        self.instances.retain(|node, _| seen.contains(node));
        order
    }

    fn prepare_overlays(&mut self, frame: &FrameData<'_>) {
        for (index, draw) in frame.overlays.iter().enumerate() {
            let extent = draw.size * draw.pose.scale;
            let model = Mat4::from_scale_rotation_translation(
                Vec3::new(extent.x, extent.y, 1.0),
                draw.pose.rotation,
                draw.pose.position,
            );
            let uniform = MeshUniform::new(model, PAPER);

            match self.overlay_instances.get(index) {
                Some(instance) => instance.update(&self.queue, uniform),
                None => self.overlay_instances.push(MeshInstance::new(
                    &self.device,
                    &self.scene_program.mesh_layout,
                    uniform,
                )),
            }
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        let width = (width as f32 * pixel_ratio).round() as u32;
        let height = (height as f32 * pixel_ratio).round() as u32;
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
    }

    fn render(&mut self, frame: &FrameData<'_>) -> Result<(), RenderError> {
        let order = self.prepare_meshes(frame);
        self.prepare_overlays(frame);
        self.global_resources
            .update_camera(&self.queue, frame.camera.compute_view_projection());

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(e) => return Err(RenderError::Frame(e.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut items: Vec<DrawItem<'_>> = order
            .iter()
            .filter_map(|(node, mesh_id)| {
                Some(DrawItem {
                    geometry: self.geometries.get(mesh_id)?,
                    instance: self.instances.get(node)?,
                })
            })
            .collect();
        items.extend(
            self.overlay_instances
                .iter()
                .take(frame.overlays.len())
                .map(|instance| DrawItem {
                    geometry: &self.overlay_quad,
                    instance,
                }),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let [r, g, b] = frame.background;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            self.scene_program
                .record(&mut render_pass, (&self.global_resources.bind_group, items.as_slice()));
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn dispose(&mut self) {
        log::debug!(
            "Releasing {} geometries and {} instances",
            self.geometries.len(),
            self.instances.len()
        );
        self.geometries.clear();
        self.instances.clear();
        self.overlay_instances.clear();
    }
}
