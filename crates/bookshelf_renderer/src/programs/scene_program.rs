use wgpu::RenderPipeline;

use crate::{
    mesh::{GpuGeometry, MeshInstance, Vertex},
    programs::{GpuProgram, GpuProgramRenderContext},
    texture::TextureHelper,
};

pub struct DrawItem<'a> {
    pub geometry: &'a GpuGeometry,
    pub instance: &'a MeshInstance,
}

/// Lambert-shaded meshes with a flat base colour.
pub struct SceneProgram {
    pipeline: RenderPipeline,
    pub mesh_layout: wgpu::BindGroupLayout,
}

impl GpuProgram for SceneProgram {
    type InitData = wgpu::BindGroupLayout;
    type DrawData<'a> = (
        &'a wgpu::BindGroup, // Global (camera/light) - group 0
        &'a [DrawItem<'a>],  // Meshes - group 1
    );

    fn new(ctx: &GpuProgramRenderContext, global_layout: &Self::InitData) -> Self {
        let shader = ctx
            .device
            .create_shader_module(wgpu::include_wgsl!("../shader.wgsl"));

        let mesh_bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Mesh Bind Group Layout"),
                    entries: &[
                        // --- BINDING 0: model, normal matrix, colour ---
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

        let render_pipeline_layout =
            ctx.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("Scene Pipeline Layout"),
                    bind_group_layouts: &[global_layout, &mesh_bind_group_layout],
                    push_constant_ranges: &[],
                });

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                cache: None,
                label: Some("Scene Pipeline"),
                layout: Some(&render_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: ctx.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: TextureHelper::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // Pages are flipped to face outward, so both sides are drawn
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        Self {
            pipeline,
            mesh_layout: mesh_bind_group_layout,
        }
    }

    fn record<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, data: Self::DrawData<'a>) {
        let (global_bind_group, items) = data;

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, global_bind_group, &[]);

        for item in items {
            render_pass.set_bind_group(1, &item.instance.bind_group, &[]);
            render_pass.set_vertex_buffer(0, item.geometry.vertex_buffer.slice(..));
            render_pass.set_index_buffer(
                item.geometry.index_buffer.slice(..),
                wgpu::IndexFormat::Uint32,
            );
            render_pass.draw_indexed(0..item.geometry.index_count, 0, 0..1);
        }
    }
}
