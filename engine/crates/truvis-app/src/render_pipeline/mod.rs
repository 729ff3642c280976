use ash::vk;

pub mod forward_pass;
pub mod forward_shadow_pipeline;
pub mod present_pass;
pub mod scene;
pub mod shadow_pass;
pub mod tonemap_pass;

/// 外部创建好的 pipeline 和 layout，headless 模式下为 null
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}
