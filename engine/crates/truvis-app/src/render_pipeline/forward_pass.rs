//! Forward 光照 Pass
//!
//! 写入 HDR 颜色和深度，读取本帧处于激活状态的 shadow map、相机和灯光 buffer。

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use truvis_render_graph::command::rendering::{RgRenderTarget, RgRenderingInfo};
use truvis_render_graph::error::RgResult;
use truvis_render_graph::graph::RenderGraph;
use truvis_render_graph::handles::{RgCellHandle, RgGraphicsPassHandle};
use truvis_render_graph::interface::RgShaderProgram;
use truvis_render_graph::pass::dependency::RgDependency;
use truvis_render_graph::pass::pass::RgGraphicsPass;
use truvis_render_graph::resources::payload::{RgBuffer, RgTexture, RgTextureArray};
use truvis_render_graph::state::access::RgAccessKind;

use crate::headless_renderer::HeadlessShaderProgram;
use crate::render_pipeline::PassPipeline;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ForwardPushConstant {
    pub view_proj: Mat4,
    pub light_count: u32,
    pub _padding: [u32; 3],
}

/// forward pass 依赖的全部 cell
#[derive(Clone, Copy, Debug)]
pub struct ForwardPassResources {
    pub color: RgCellHandle<RgTexture>,
    pub depth: RgCellHandle<RgTexture>,
    pub shadow_maps: RgCellHandle<RgTextureArray>,
    pub camera: RgCellHandle<RgBuffer>,
    pub lights: RgCellHandle<RgBuffer>,
}

pub struct ForwardPass {
    pass: RgGraphicsPassHandle,
    pipeline: PassPipeline,
}

// new & init
impl ForwardPass {
    pub const COLOR: &'static str = "color";
    pub const DEPTH: &'static str = "depth";
    pub const SHADOW_MAPS: &'static str = "shadow_maps";
    pub const CAMERA: &'static str = "camera";
    pub const LIGHTS: &'static str = "lights";

    pub fn new(
        graph: &mut RenderGraph,
        resources: ForwardPassResources,
        frames_in_flight: usize,
        pipeline: PassPipeline,
    ) -> RgResult<Self> {
        let mut pass = RgGraphicsPass::new("forward", frames_in_flight)?;
        pass.add_dependencies([
            RgDependency::bound(Self::COLOR, RgAccessKind::RenderTargetWrite, resources.color),
            RgDependency::bound(Self::DEPTH, RgAccessKind::RenderTargetWrite, resources.depth),
            RgDependency::bound(Self::SHADOW_MAPS, RgAccessKind::FragmentRead, resources.shadow_maps),
            RgDependency::bound(Self::CAMERA, RgAccessKind::FragmentRead, resources.camera),
            RgDependency::bound(Self::LIGHTS, RgAccessKind::FragmentRead, resources.lights),
        ])?;

        Ok(Self {
            pass: graph.add_graphics_pass(pass),
            pipeline,
        })
    }
}

// per frame
impl ForwardPass {
    pub fn prepare(
        &self,
        graph: &mut RenderGraph,
        view_proj: Mat4,
        light_count: usize,
        index_count: u32,
        extent: vk::Extent2D,
    ) -> RgResult<()> {
        let pipeline = self.pipeline;
        let push_constant = ForwardPushConstant {
            view_proj,
            light_count: light_count as u32,
            _padding: [0; 3],
        };

        graph.graphics_pass_mut(self.pass)?.set_execute_callback(move |ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;

            let registry = ctx.registry();
            let color = ctx.resolve::<RgTexture>(Self::COLOR)?;
            let depth = ctx.resolve::<RgTexture>(Self::DEPTH)?;

            let mut program = HeadlessShaderProgram::new();
            program.set_rg_texture_array(Self::SHADOW_MAPS, registry, ctx.resolve(Self::SHADOW_MAPS)?)?;
            program.set_rg_buffer(Self::CAMERA, registry, ctx.resolve(Self::CAMERA)?)?;
            program.set_rg_buffer(Self::LIGHTS, registry, ctx.resolve(Self::LIGHTS)?)?;
            program.push_constants(
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                bytemuck::bytes_of(&push_constant),
            );

            ctx.start_rendering(
                &RgRenderingInfo::new(
                    RgRenderTarget::new(vec![color.image], Some(depth.image)),
                    extent.width,
                    extent.height,
                )
                .clear_color([0.1, 0.1, 0.12, 1.0]),
            )?;
            ctx.set_cull_mode(vk::CullModeFlags::BACK)?;
            ctx.bind_pipeline(pipeline.pipeline)?;
            ctx.bind_descriptor_sets(pipeline.layout, 0, &[program.descriptor_set()])?;
            ctx.push_constants(pipeline.layout, program.push_constant_stages(), 0, program.push_constant_data())?;
            ctx.draw_indexed(index_count, 1)?;
            ctx.end_rendering()?;
            ctx.end_recording()
        });
        Ok(())
    }
}

// getters
impl ForwardPass {
    #[inline]
    pub fn pass(&self) -> RgGraphicsPassHandle {
        self.pass
    }
}
