//! 不依赖 GPU 的渲染器
//!
//! 物理资源只分配假的 Vulkan handle 并登记到 registry，命令录制到
//! `HeadlessRecorder`，写入 buffer 的数据保存在内存中。帧节奏（frame index、swapchain image 轮换、resize）
//! 与真实渲染器一致。

use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle;
use truvis_render_graph::command::recorder::{HeadlessRecorder, RgCommand};
use truvis_render_graph::command::rendering::RgRenderTarget;
use truvis_render_graph::error::{RgError, RgResult};
use truvis_render_graph::frame_counter::RgFrameCounter;
use truvis_render_graph::graph::{RenderGraph, RgFrameReport};
use truvis_render_graph::handles::{GfxBufferHandle, GfxImageHandle};
use truvis_render_graph::interface::{RgRenderer, RgShaderProgram};
use truvis_render_graph::resources::physical::{RgPhysicalBuffer, RgPhysicalImage};
use truvis_render_graph::resources::registry::RgResourceRegistry;
use truvis_render_graph::settings::FrameSettings;

pub struct HeadlessRenderer {
    frame_counter: RgFrameCounter,
    frame_settings: FrameSettings,

    swapchain_format: vk::Format,
    swapchain_images: Vec<GfxImageHandle>,
    /// 本帧 "acquire" 到的 swapchain image
    swapchain_image_index: usize,

    recorder: HeadlessRecorder,
    /// 上一次 render 提交的命令
    submitted: Vec<RgCommand>,

    /// 每个 buffer 最近一次写入的内容
    buffer_contents: HashMap<GfxBufferHandle, Vec<u8>>,

    /// 用于生成互不相同的假 handle
    next_raw_handle: u64,
}

// new & init
impl HeadlessRenderer {
    pub const SWAPCHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

    pub fn new(
        registry: &mut RgResourceRegistry,
        fif_count: usize,
        frame_settings: FrameSettings,
        swapchain_image_count: usize,
    ) -> Self {
        let mut renderer = Self {
            frame_counter: RgFrameCounter::new(0, fif_count),
            frame_settings,
            swapchain_format: Self::SWAPCHAIN_FORMAT,
            swapchain_images: Vec::new(),
            swapchain_image_index: 0,
            recorder: HeadlessRecorder::new(),
            submitted: Vec::new(),
            buffer_contents: HashMap::new(),
            next_raw_handle: 0,
        };
        renderer.create_swapchain(registry, swapchain_image_count.max(1));

        log::info!(
            "headless renderer: {} frames in flight, {} swapchain images, {}x{}",
            renderer.frame_counter.fif_count(),
            renderer.swapchain_images.len(),
            frame_settings.frame_extent.width,
            frame_settings.frame_extent.height
        );
        renderer
    }

    fn create_swapchain(&mut self, registry: &mut RgResourceRegistry, image_count: usize) {
        let extent = self.frame_settings.frame_extent;
        let format = self.swapchain_format;
        self.swapchain_images = (0..image_count)
            .map(|i| self.create_image(registry, format!("swapchain-{i}"), format, extent))
            .collect();
        self.swapchain_image_index = 0;
    }

    fn next_handle<T: Handle>(&mut self) -> T {
        self.next_raw_handle += 1;
        T::from_raw(self.next_raw_handle)
    }
}

// resources
impl HeadlessRenderer {
    pub fn create_image(
        &mut self,
        registry: &mut RgResourceRegistry,
        name: impl Into<String>,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> GfxImageHandle {
        let image = self.next_handle::<vk::Image>();
        let view = self.next_handle::<vk::ImageView>();
        registry.register_image(RgPhysicalImage::new(name, image, view, format, extent))
    }

    pub fn create_buffer(
        &mut self,
        registry: &mut RgResourceRegistry,
        name: impl Into<String>,
        size: vk::DeviceSize,
    ) -> GfxBufferHandle {
        let buffer = self.next_handle::<vk::Buffer>();
        registry.register_buffer(RgPhysicalBuffer::new(name, buffer, size))
    }

    /// 相当于 mmap 后整体拷贝，数据不能超过 buffer 的大小
    pub fn write_buffer(&mut self, registry: &RgResourceRegistry, buffer: GfxBufferHandle, data: &[u8]) -> RgResult<()> {
        let info = registry.get_buffer(buffer)?;
        if data.len() as vk::DeviceSize > info.size {
            return Err(RgError::OutOfRange {
                what: format!("write to buffer `{}`", info.name),
                index: data.len(),
                len: info.size as usize,
            });
        }
        log::trace!("write {} bytes to buffer `{}`", data.len(), info.name);
        self.buffer_contents.insert(buffer, data.to_vec());
        Ok(())
    }

    pub fn destroy_image(&mut self, registry: &mut RgResourceRegistry, image: GfxImageHandle) {
        if registry.unregister_image(image).is_none() {
            log::warn!("destroy_image: {image:?} is not registered");
        }
    }

    /// 尺寸变化时重建 swapchain，返回是否真的发生了变化
    pub fn resize(&mut self, registry: &mut RgResourceRegistry, extent: vk::Extent2D) -> bool {
        if extent == self.frame_settings.frame_extent {
            return false;
        }

        let image_count = self.swapchain_images.len();
        for image in std::mem::take(&mut self.swapchain_images) {
            self.destroy_image(registry, image);
        }
        self.frame_settings.frame_extent = extent;
        self.create_swapchain(registry, image_count);

        log::info!("swapchain resized to {}x{}", extent.width, extent.height);
        true
    }
}

// getters
impl HeadlessRenderer {
    #[inline]
    pub fn frame_counter(&self) -> &RgFrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn frame_settings(&self) -> &FrameSettings {
        &self.frame_settings
    }

    #[inline]
    pub fn swapchain_image(&self) -> GfxImageHandle {
        self.swapchain_images[self.swapchain_image_index]
    }

    #[inline]
    pub fn swapchain_images(&self) -> &[GfxImageHandle] {
        &self.swapchain_images
    }

    #[inline]
    pub fn submitted_commands(&self) -> &[RgCommand] {
        &self.submitted
    }

    /// 还没有写入过时返回 `None`
    #[inline]
    pub fn buffer_contents(&self, buffer: GfxBufferHandle) -> Option<&[u8]> {
        self.buffer_contents.get(&buffer).map(Vec::as_slice)
    }
}

impl RgRenderer for HeadlessRenderer {
    fn frame_index(&self) -> usize {
        self.frame_counter.frame_index()
    }

    fn max_frames_in_flight(&self) -> usize {
        self.frame_counter.fif_count()
    }

    fn width(&self) -> u32 {
        self.frame_settings.frame_extent.width
    }

    fn height(&self) -> u32 {
        self.frame_settings.frame_extent.height
    }

    fn swapchain_render_target(&self) -> RgRenderTarget {
        RgRenderTarget::color_only(self.swapchain_image())
    }

    fn render(&mut self, graph: &mut RenderGraph, registry: &RgResourceRegistry) -> RgResult<RgFrameReport> {
        let report = match graph.execute(self.frame_index(), registry, &mut self.recorder) {
            Ok(report) => report,
            Err(err) => {
                // 出错的帧不提交：丢弃已经录制的命令，记录的状态也不再可信
                self.recorder.clear();
                graph.resolver_mut().reset();
                log::warn!("{} dropped: {err}", self.frame_counter.frame_name());
                return Err(err);
            }
        };
        self.submitted = self.recorder.take();

        log::debug!(
            "{} submitted: {} passes, {} skipped, {} barriers, {} commands",
            self.frame_counter.frame_name(),
            report.passes.len(),
            report.skipped.len(),
            report.barrier_count(),
            self.submitted.len()
        );

        self.frame_counter.next_frame();
        self.swapchain_image_index = (self.swapchain_image_index + 1) % self.swapchain_images.len();
        Ok(report)
    }
}

/// 记录下来的一次 descriptor 写入
#[derive(Clone, Debug, PartialEq)]
pub enum HeadlessBinding {
    Texture {
        name: String,
        view: vk::ImageView,
    },
    Sampler {
        name: String,
        sampler: vk::Sampler,
    },
    Buffer {
        name: String,
        buffer: vk::Buffer,
        size: vk::DeviceSize,
    },
    TextureArrayElement {
        name: String,
        index: usize,
        view: vk::ImageView,
        sampler: Option<vk::Sampler>,
    },
}

/// 只记录写入内容的着色器程序，descriptor set 始终为 null
#[derive(Debug, Default)]
pub struct HeadlessShaderProgram {
    bindings: Vec<HeadlessBinding>,
    push_constant_stages: vk::ShaderStageFlags,
    push_constant_data: Vec<u8>,
}

impl HeadlessShaderProgram {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn bindings(&self) -> &[HeadlessBinding] {
        &self.bindings
    }

    #[inline]
    pub fn push_constant_stages(&self) -> vk::ShaderStageFlags {
        self.push_constant_stages
    }

    #[inline]
    pub fn push_constant_data(&self) -> &[u8] {
        &self.push_constant_data
    }

    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        vk::DescriptorSet::null()
    }
}

impl RgShaderProgram for HeadlessShaderProgram {
    fn set_texture(&mut self, name: &str, view: vk::ImageView) {
        self.bindings.push(HeadlessBinding::Texture {
            name: name.to_string(),
            view,
        });
    }

    fn set_sampler(&mut self, name: &str, sampler: vk::Sampler) {
        self.bindings.push(HeadlessBinding::Sampler {
            name: name.to_string(),
            sampler,
        });
    }

    fn set_buffer(&mut self, name: &str, buffer: vk::Buffer, size: vk::DeviceSize) {
        self.bindings.push(HeadlessBinding::Buffer {
            name: name.to_string(),
            buffer,
            size,
        });
    }

    fn set_texture_array_element(&mut self, name: &str, index: usize, view: vk::ImageView, sampler: Option<vk::Sampler>) {
        self.bindings.push(HeadlessBinding::TextureArrayElement {
            name: name.to_string(),
            index,
            view,
            sampler,
        });
    }

    fn push_constants(&mut self, stages: vk::ShaderStageFlags, data: &[u8]) {
        self.push_constant_stages = stages;
        self.push_constant_data.clear();
        self.push_constant_data.extend_from_slice(data);
    }
}
