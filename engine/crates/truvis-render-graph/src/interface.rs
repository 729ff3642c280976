//! 由外部实现的协作者接口

use ash::vk;

use crate::command::rendering::RgRenderTarget;
use crate::error::RgResult;
use crate::graph::{RenderGraph, RgFrameReport};
use crate::resources::payload::{RgBuffer, RgTexture, RgTextureArray};
use crate::resources::registry::RgResourceRegistry;

/// 渲染器：负责 fence 等待、获取 swapchain image、提交与呈现
///
/// 这些等待发生在 `RenderGraph::execute` 之前，限制了同时 in flight 的帧数。
pub trait RgRenderer {
    fn frame_index(&self) -> usize;
    fn max_frames_in_flight(&self) -> usize;
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// 本帧要写入并呈现的 swapchain image
    fn swapchain_render_target(&self) -> RgRenderTarget;

    /// 执行 graph 并提交本帧
    fn render(&mut self, graph: &mut RenderGraph, registry: &RgResourceRegistry) -> RgResult<RgFrameReport>;
}

/// 接收具名 descriptor 更新和 push constant 的着色器程序
///
/// 在 `resolve_barriers` 之后、draw / dispatch 之前由管线代码调用。
pub trait RgShaderProgram {
    fn set_texture(&mut self, name: &str, view: vk::ImageView);
    fn set_sampler(&mut self, name: &str, sampler: vk::Sampler);
    fn set_buffer(&mut self, name: &str, buffer: vk::Buffer, size: vk::DeviceSize);
    fn set_texture_array_element(&mut self, name: &str, index: usize, view: vk::ImageView, sampler: Option<vk::Sampler>);
    fn push_constants(&mut self, stages: vk::ShaderStageFlags, data: &[u8]);

    /// 从 registry 中取出 image view 和 sampler
    fn set_rg_texture(&mut self, name: &str, registry: &RgResourceRegistry, texture: &RgTexture) -> RgResult<()> {
        self.set_texture(name, registry.get_image(texture.image)?.vk_view);
        if let Some(sampler) = texture.sampler {
            self.set_sampler(name, registry.get_sampler(sampler)?.vk_sampler);
        }
        Ok(())
    }

    /// 只绑定数组中处于激活状态的元素
    fn set_rg_texture_array(
        &mut self,
        name: &str,
        registry: &RgResourceRegistry,
        array: &RgTextureArray,
    ) -> RgResult<()> {
        for (index, texture) in array.active().iter().enumerate() {
            let view = registry.get_image(texture.image)?.vk_view;
            let sampler = texture
                .sampler
                .map(|sampler| registry.get_sampler(sampler).map(|sampler| sampler.vk_sampler))
                .transpose()?;
            self.set_texture_array_element(name, index, view, sampler);
        }
        Ok(())
    }

    fn set_rg_buffer(&mut self, name: &str, registry: &RgResourceRegistry, buffer: &RgBuffer) -> RgResult<()> {
        let buffer = registry.get_buffer(buffer.buffer)?;
        self.set_buffer(name, buffer.vk_buffer, buffer.size);
        Ok(())
    }
}
