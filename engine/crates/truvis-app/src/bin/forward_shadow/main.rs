use ash::vk;
use truvis_app::headless_renderer::HeadlessRenderer;
use truvis_app::render_pipeline::forward_shadow_pipeline::ForwardShadowPipeline;
use truvis_app::render_pipeline::scene::SceneData;
use truvis_render_graph::graph::RenderGraph;
use truvis_render_graph::interface::RgRenderer;
use truvis_render_graph::resources::registry::RgResourceRegistry;
use truvis_render_graph::settings::{DefaultRendererSettings, FrameSettings, RgGraphSettings};

const MAX_LIGHTS: usize = 4;
const FRAME_COUNT: u64 = 12;

static PASS_DUMP: std::sync::Once = std::sync::Once::new();

fn main() -> anyhow::Result<()> {
    truvis_crate_tools::init_log::init_log();

    #[cfg(feature = "profiling")]
    let _tracy = tracy_client::Client::start();

    let mut registry = RgResourceRegistry::new();
    let mut renderer = HeadlessRenderer::new(
        &mut registry,
        DefaultRendererSettings::MAX_FRAMES_IN_FLIGHT,
        FrameSettings::default(),
        3,
    );
    let mut graph = RenderGraph::new(RgGraphSettings::default());
    let mut pipeline = ForwardShadowPipeline::new(&mut renderer, &mut registry, &mut graph, MAX_LIGHTS)?;

    for frame in 0..FRAME_COUNT {
        // 中途改变一次窗口尺寸
        if frame == FRAME_COUNT / 2 {
            let extent = vk::Extent2D {
                width: 1920,
                height: 1080,
            };
            if renderer.resize(&mut registry, extent) {
                pipeline.resize(&mut renderer, &mut registry)?;
            }
        }

        let light_count = (frame as usize % (MAX_LIGHTS + 1)).max(1);
        let scene = SceneData::orbiting(light_count, frame as f32 * 0.1);
        pipeline.prepare_frame(&mut renderer, &mut registry, &mut graph, &scene)?;

        PASS_DUMP.call_once(|| graph.log_execution_plan(&registry));

        let frame_name = renderer.frame_counter().frame_name();
        let report = renderer.render(&mut graph, &registry)?;
        log::info!(
            "{frame_name} {light_count} lights: barriers per pass {:?}, skipped {:?}",
            report.barrier_counts(),
            report.skipped
        );

        #[cfg(feature = "profiling")]
        if let Some(client) = tracy_client::Client::running() {
            client.frame_mark();
        }
    }

    log::info!(
        "done: {} frames, {} images / {} buffers registered, {} resource states tracked",
        FRAME_COUNT,
        registry.image_count(),
        registry.buffer_count(),
        graph.resolver().tracked_count()
    );
    Ok(())
}
