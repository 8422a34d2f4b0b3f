pub mod scene_program;

pub use scene_program::{DrawItem, SceneProgram};

/// Holds common WGPU references to simplify function signatures.
pub struct GpuProgramRenderContext<'a> {
    pub device: &'a wgpu::Device,
    pub format: wgpu::TextureFormat, // The output format (swapchain)
}

pub trait GpuProgram {
    /// Data required to initialize the pipeline (e.g., global layouts)
    type InitData;

    /// Data required to draw a frame
    type DrawData<'a>
    where
        Self: 'a;

    /// Compiles shaders, creates pipeline layouts and the pipeline itself.
    fn new(ctx: &GpuProgramRenderContext, init_data: &Self::InitData) -> Self;

    /// Encodes commands into the render pass.
    fn record<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, data: Self::DrawData<'a>);
}
