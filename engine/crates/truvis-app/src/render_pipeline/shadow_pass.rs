//! 阴影 Pass
//!
//! 每个灯光槽位对应一个 graphics pass，写入 shadow map 数组中同一下标的元素。
//! 本帧灯光数之外的槽位不设置回调，由 RenderGraph 跳过。

use ash::vk;
use truvis_render_graph::command::rendering::{RgRenderTarget, RgRenderingInfo};
use truvis_render_graph::error::RgResult;
use truvis_render_graph::graph::RenderGraph;
use truvis_render_graph::handles::{RgCellHandle, RgGraphicsPassHandle};
use truvis_render_graph::pass::dependency::RgDependency;
use truvis_render_graph::pass::pass::RgGraphicsPass;
use truvis_render_graph::resources::payload::RgTextureArray;
use truvis_render_graph::state::access::RgAccessKind;

use crate::render_pipeline::PassPipeline;
use crate::render_pipeline::scene::SceneLight;

pub struct ShadowPasses {
    /// 下标即灯光槽位
    passes: Vec<RgGraphicsPassHandle>,
    pipeline: PassPipeline,
}

// new & init
impl ShadowPasses {
    pub const SHADOW_MAP: &'static str = "shadow_map";

    pub fn new(
        graph: &mut RenderGraph,
        shadow_maps: RgCellHandle<RgTextureArray>,
        max_lights: usize,
        frames_in_flight: usize,
        pipeline: PassPipeline,
    ) -> RgResult<Self> {
        let passes = (0..max_lights)
            .map(|slot| {
                let mut pass = RgGraphicsPass::new(format!("shadow_{slot}"), frames_in_flight)?;
                let mut shadow_map = RgDependency::new(Self::SHADOW_MAP, RgAccessKind::RenderTargetWrite);
                shadow_map.bind_element(shadow_maps, slot);
                pass.add_dependencies([shadow_map])?;
                Ok(graph.add_graphics_pass(pass))
            })
            .collect::<RgResult<Vec<_>>>()?;

        Ok(Self { passes, pipeline })
    }
}

// per frame
impl ShadowPasses {
    /// 为前 `lights.len()` 个槽位设置本帧的回调
    pub fn prepare(&self, graph: &mut RenderGraph, lights: &[SceneLight], index_count: u32) -> RgResult<()> {
        for (slot, light) in lights.iter().enumerate().take(self.passes.len()) {
            let light_view_proj = light.view_proj();
            let pipeline = self.pipeline;

            graph.graphics_pass_mut(self.passes[slot])?.set_execute_callback(move |ctx| {
                ctx.start_recording()?;
                ctx.resolve_barriers()?;

                let shadow_map = ctx.resolve::<RgTextureArray>(Self::SHADOW_MAP)?.get(slot)?;
                let extent = ctx.registry().get_image(shadow_map.image)?.extent;

                ctx.start_rendering(&RgRenderingInfo::new(
                    RgRenderTarget::depth_only(shadow_map.image),
                    extent.width,
                    extent.height,
                ))?;
                // 减少 shadow acne
                ctx.set_cull_mode(vk::CullModeFlags::FRONT)?;
                ctx.bind_pipeline(pipeline.pipeline)?;
                ctx.push_constants(
                    pipeline.layout,
                    vk::ShaderStageFlags::VERTEX,
                    0,
                    bytemuck::bytes_of(&light_view_proj),
                )?;
                ctx.draw_indexed(index_count, 1)?;
                ctx.end_rendering()?;
                ctx.end_recording()
            });
        }
        Ok(())
    }
}

// getters
impl ShadowPasses {
    #[inline]
    pub fn passes(&self) -> &[RgGraphicsPassHandle] {
        &self.passes
    }
}
