//! 把 LDR 结果 blit 到 swapchain image，再转换到 PRESENT_SRC

use truvis_render_graph::error::RgResult;
use truvis_render_graph::graph::RenderGraph;
use truvis_render_graph::handles::{RgCellHandle, RgGraphicsPassHandle};
use truvis_render_graph::pass::dependency::RgDependency;
use truvis_render_graph::pass::pass::RgGraphicsPass;
use truvis_render_graph::resources::payload::RgTexture;
use truvis_render_graph::state::access::RgAccessKind;

pub struct PresentPasses {
    blit: RgGraphicsPassHandle,
    present: RgGraphicsPassHandle,
}

// new & init
impl PresentPasses {
    pub const SRC: &'static str = "src";
    pub const SWAPCHAIN: &'static str = "swapchain";

    pub fn new(
        graph: &mut RenderGraph,
        ldr: RgCellHandle<RgTexture>,
        swapchain: RgCellHandle<RgTexture>,
        frames_in_flight: usize,
    ) -> RgResult<Self> {
        let mut blit = RgGraphicsPass::new("blit_to_swapchain", frames_in_flight)?;
        blit.add_dependencies([
            RgDependency::bound(Self::SRC, RgAccessKind::TransferSrc, ldr),
            RgDependency::bound(Self::SWAPCHAIN, RgAccessKind::TransferDst, swapchain),
        ])?;

        let mut present = RgGraphicsPass::new("present", frames_in_flight)?;
        present.add_dependencies([RgDependency::bound(Self::SWAPCHAIN, RgAccessKind::Present, swapchain)])?;

        Ok(Self {
            blit: graph.add_graphics_pass(blit),
            present: graph.add_graphics_pass(present),
        })
    }
}

// per frame
impl PresentPasses {
    pub fn prepare(&self, graph: &mut RenderGraph) -> RgResult<()> {
        graph.graphics_pass_mut(self.blit)?.set_execute_callback(|ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            let src = ctx.resolve::<RgTexture>(Self::SRC)?.image;
            let dst = ctx.resolve::<RgTexture>(Self::SWAPCHAIN)?.image;
            ctx.blit_image(src, dst)?;
            ctx.end_recording()
        });

        // 只做 layout 转换
        graph.graphics_pass_mut(self.present)?.set_execute_callback(|ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            ctx.end_recording()
        });
        Ok(())
    }
}

// getters
impl PresentPasses {
    #[inline]
    pub fn blit(&self) -> RgGraphicsPassHandle {
        self.blit
    }

    /// 整个管线的 target pass
    #[inline]
    pub fn present(&self) -> RgGraphicsPassHandle {
        self.present
    }
}
