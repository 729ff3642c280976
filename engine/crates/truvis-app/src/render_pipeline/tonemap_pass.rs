//! Tonemap：HDR -> LDR 的 compute pass

use ash::vk;
use bytemuck::{Pod, Zeroable};
use truvis_render_graph::error::RgResult;
use truvis_render_graph::graph::RenderGraph;
use truvis_render_graph::handles::{RgCellHandle, RgComputePassHandle};
use truvis_render_graph::interface::RgShaderProgram;
use truvis_render_graph::pass::dependency::RgDependency;
use truvis_render_graph::pass::pass::RgComputePass;
use truvis_render_graph::resources::payload::RgTexture;
use truvis_render_graph::state::access::RgAccessKind;

use crate::headless_renderer::HeadlessShaderProgram;
use crate::render_pipeline::PassPipeline;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TonemapPushConstant {
    pub extent: [u32; 2],
    pub exposure: f32,
    pub _padding: f32,
}

pub struct TonemapPass {
    pass: RgComputePassHandle,
    pipeline: PassPipeline,
}

// new & init
impl TonemapPass {
    pub const HDR: &'static str = "hdr";
    pub const LDR: &'static str = "ldr";
    /// 与 shader 中的 workgroup 大小一致
    pub const GROUP_SIZE: u32 = 8;

    pub fn new(
        graph: &mut RenderGraph,
        hdr: RgCellHandle<RgTexture>,
        ldr: RgCellHandle<RgTexture>,
        frames_in_flight: usize,
        pipeline: PassPipeline,
    ) -> RgResult<Self> {
        let mut pass = RgComputePass::new("tonemap", frames_in_flight)?;
        pass.add_dependencies([
            RgDependency::bound(Self::HDR, RgAccessKind::ComputeRead, hdr),
            RgDependency::bound(Self::LDR, RgAccessKind::ComputeWrite, ldr),
        ])?;

        Ok(Self {
            pass: graph.add_compute_pass(pass),
            pipeline,
        })
    }
}

// per frame
impl TonemapPass {
    pub fn prepare(&self, graph: &mut RenderGraph, exposure: f32, extent: vk::Extent2D) -> RgResult<()> {
        let pipeline = self.pipeline;
        let push_constant = TonemapPushConstant {
            extent: [extent.width, extent.height],
            exposure,
            _padding: 0.0,
        };

        graph.compute_pass_mut(self.pass)?.set_execute_callback(move |ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;

            let registry = ctx.registry();
            let mut program = HeadlessShaderProgram::new();
            program.set_rg_texture(Self::HDR, registry, ctx.resolve(Self::HDR)?)?;
            program.set_rg_texture(Self::LDR, registry, ctx.resolve(Self::LDR)?)?;
            program.push_constants(vk::ShaderStageFlags::COMPUTE, bytemuck::bytes_of(&push_constant));

            ctx.bind_pipeline(pipeline.pipeline)?;
            ctx.bind_descriptor_sets(pipeline.layout, 0, &[program.descriptor_set()])?;
            ctx.push_constants(pipeline.layout, program.push_constant_stages(), 0, program.push_constant_data())?;
            ctx.dispatch(
                extent.width.div_ceil(Self::GROUP_SIZE),
                extent.height.div_ceil(Self::GROUP_SIZE),
                1,
            )?;
            ctx.end_recording()
        });
        Ok(())
    }
}

// getters
impl TonemapPass {
    #[inline]
    pub fn pass(&self) -> RgComputePassHandle {
        self.pass
    }
}
