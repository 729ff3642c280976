//! Forward + Shadow 管线
//!
//! ```text
//! shadow_0 .. shadow_{N-1}   (RenderTargetWrite shadow_maps[i])
//!          |
//!          v
//! forward                    (RenderTargetWrite hdr + depth, FragmentRead shadow_maps / camera / lights)
//!          |
//!          v
//! tonemap                    (ComputeRead hdr, ComputeWrite ldr)
//!          |
//!          v
//! blit_to_swapchain          (TransferSrc ldr, TransferDst swapchain)
//!          |
//!          v
//! present  <- target         (Present swapchain)
//! ```
//!
//! 灯光数量每帧可以变化：shadow map 数组的 active count 随之更新，
//! 多出来的 shadow pass 本帧不设置回调。窗口尺寸变化时重建与尺寸相关的
//! 图像并重新绑定对应的 cell。

use ash::vk;
use itertools::Itertools;
use truvis_render_graph::error::RgResult;
use truvis_render_graph::graph::RenderGraph;
use truvis_render_graph::handles::{GfxImageHandle, RgCellHandle};
use truvis_render_graph::interface::RgRenderer;
use truvis_render_graph::resources::payload::{RgBuffer, RgTexture, RgTextureArray};
use truvis_render_graph::resources::registry::RgResourceRegistry;
use truvis_render_graph::settings::{DefaultRendererSettings, FrameSettings};

use crate::headless_renderer::HeadlessRenderer;
use crate::render_pipeline::PassPipeline;
use crate::render_pipeline::forward_pass::{ForwardPass, ForwardPassResources};
use crate::render_pipeline::present_pass::PresentPasses;
use crate::render_pipeline::scene::{CameraUniform, LightUniform, SceneData, SceneLight};
use crate::render_pipeline::shadow_pass::ShadowPasses;
use crate::render_pipeline::tonemap_pass::TonemapPass;

/// 每帧一份、尺寸跟随窗口的图像
struct FrameTargets {
    hdr: Vec<RgTexture>,
    depth: Vec<RgTexture>,
    ldr: Vec<RgTexture>,
}

impl FrameTargets {
    const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

    fn create(
        renderer: &mut HeadlessRenderer,
        registry: &mut RgResourceRegistry,
        frame_settings: &FrameSettings,
        frames_in_flight: usize,
    ) -> Self {
        let extent = frame_settings.frame_extent;
        let mut create = |name: &str, format: vk::Format| {
            (0..frames_in_flight)
                .map(|frame| RgTexture::new(renderer.create_image(registry, format!("{name}-{frame}"), format, extent)))
                .collect_vec()
        };

        Self {
            hdr: create("hdr", Self::HDR_FORMAT),
            depth: create("depth", frame_settings.depth_format),
            ldr: create("ldr", frame_settings.color_format),
        }
    }

    fn images(&self) -> impl Iterator<Item = GfxImageHandle> + '_ {
        self.hdr.iter().chain(&self.depth).chain(&self.ldr).map(|texture| texture.image)
    }
}

pub struct ForwardShadowPipeline {
    frames_in_flight: usize,
    max_lights: usize,
    frame_extent: vk::Extent2D,

    frame_targets: FrameTargets,

    shadow_maps: RgCellHandle<RgTextureArray>,
    hdr: RgCellHandle<RgTexture>,
    depth: RgCellHandle<RgTexture>,
    ldr: RgCellHandle<RgTexture>,
    camera: RgCellHandle<RgBuffer>,
    lights: RgCellHandle<RgBuffer>,
    swapchain: RgCellHandle<RgTexture>,

    shadow_passes: ShadowPasses,
    forward_pass: ForwardPass,
    tonemap_pass: TonemapPass,
    present_passes: PresentPasses,
}

// new & init
impl ForwardShadowPipeline {
    pub const SHADOW_MAP_SIZE: u32 = 1024;
    pub const EXPOSURE: f32 = 1.0;

    /// 创建资源和 Pass，并把 present pass 设为 target
    pub fn new(
        renderer: &mut HeadlessRenderer,
        registry: &mut RgResourceRegistry,
        graph: &mut RenderGraph,
        max_lights: usize,
    ) -> RgResult<Self> {
        let frames_in_flight = renderer.max_frames_in_flight();
        let frame_settings = *renderer.frame_settings();

        let shadow_maps = (0..frames_in_flight)
            .map(|frame| {
                let textures = (0..max_lights)
                    .map(|light| {
                        RgTexture::new(renderer.create_image(
                            registry,
                            format!("shadow-map-{frame}-{light}"),
                            DefaultRendererSettings::SHADOW_MAP_FORMAT,
                            vk::Extent2D {
                                width: Self::SHADOW_MAP_SIZE,
                                height: Self::SHADOW_MAP_SIZE,
                            },
                        ))
                    })
                    .collect_vec();
                RgTextureArray::new(textures)
            })
            .collect_vec();
        let camera = (0..frames_in_flight)
            .map(|frame| {
                let size = size_of::<CameraUniform>() as vk::DeviceSize;
                RgBuffer::new(renderer.create_buffer(registry, format!("camera-{frame}"), size))
            })
            .collect_vec();
        let lights = (0..frames_in_flight)
            .map(|frame| {
                let size = (size_of::<LightUniform>() * max_lights.max(1)) as vk::DeviceSize;
                RgBuffer::new(renderer.create_buffer(registry, format!("lights-{frame}"), size))
            })
            .collect_vec();
        let frame_targets = FrameTargets::create(renderer, registry, &frame_settings, frames_in_flight);
        let swapchain = vec![RgTexture::new(renderer.swapchain_image()); frames_in_flight];

        let shadow_maps = registry.create_cell("shadow_maps", shadow_maps);
        let hdr = registry.create_cell("hdr", frame_targets.hdr.clone());
        let depth = registry.create_cell("depth", frame_targets.depth.clone());
        let ldr = registry.create_cell("ldr", frame_targets.ldr.clone());
        let camera = registry.create_cell("camera", camera);
        let lights = registry.create_cell("lights", lights);
        let swapchain = registry.create_cell("swapchain", swapchain);

        // headless 模式下没有真正的 pipeline 对象
        let pipeline = PassPipeline::default();
        let shadow_passes = ShadowPasses::new(graph, shadow_maps, max_lights, frames_in_flight, pipeline)?;
        let forward_pass = ForwardPass::new(
            graph,
            ForwardPassResources {
                color: hdr,
                depth,
                shadow_maps,
                camera,
                lights,
            },
            frames_in_flight,
            pipeline,
        )?;
        let tonemap_pass = TonemapPass::new(graph, hdr, ldr, frames_in_flight, pipeline)?;
        let present_passes = PresentPasses::new(graph, ldr, swapchain, frames_in_flight)?;
        graph.set_target_pass(present_passes.present())?;

        log::info!(
            "forward shadow pipeline: {frames_in_flight} frames in flight, up to {max_lights} lights, {} passes",
            graph.pass_count()
        );

        Ok(Self {
            frames_in_flight,
            max_lights,
            frame_extent: frame_settings.frame_extent,
            frame_targets,
            shadow_maps,
            hdr,
            depth,
            ldr,
            camera,
            lights,
            swapchain,
            shadow_passes,
            forward_pass,
            tonemap_pass,
            present_passes,
        })
    }
}

// per frame
impl ForwardShadowPipeline {
    /// 更新本帧的 cell 内容，上传相机和灯光数据，并为每个 Pass 设置回调
    pub fn prepare_frame(
        &mut self,
        renderer: &mut HeadlessRenderer,
        registry: &mut RgResourceRegistry,
        graph: &mut RenderGraph,
        scene: &SceneData,
    ) -> RgResult<()> {
        let frame_index = renderer.frame_index();
        let extent = vk::Extent2D {
            width: renderer.width(),
            height: renderer.height(),
        };
        if extent != self.frame_extent {
            log::warn!(
                "pipeline targets are {}x{} but the renderer is {}x{}, call resize first",
                self.frame_extent.width,
                self.frame_extent.height,
                extent.width,
                extent.height
            );
        }

        let light_count = scene.lights.len().min(self.max_lights);
        if light_count < scene.lights.len() {
            log::warn!("scene has {} lights, only the first {light_count} cast shadows", scene.lights.len());
        }
        let lights = &scene.lights[..light_count];

        let swapchain_target = renderer.swapchain_render_target();
        if let Some(&swapchain_image) = swapchain_target.color.first() {
            registry.update_cell_slot(self.swapchain, frame_index, RgTexture::new(swapchain_image))?;
        }
        registry.update_cell_slot_with(self.shadow_maps, frame_index, |shadow_maps| {
            shadow_maps.set_active_count(light_count)
        })?;

        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let camera = scene.camera_uniform(aspect);
        let camera_buffer = registry.cell(self.camera)?.get(frame_index)?.buffer;
        renderer.write_buffer(registry, camera_buffer, bytemuck::bytes_of(&camera))?;

        let light_uniforms = lights.iter().map(SceneLight::uniform).collect_vec();
        let lights_buffer = registry.cell(self.lights)?.get(frame_index)?.buffer;
        renderer.write_buffer(registry, lights_buffer, bytemuck::cast_slice(&light_uniforms))?;

        self.shadow_passes.prepare(graph, lights, scene.index_count)?;
        self.forward_pass.prepare(graph, camera.view_proj, light_count, scene.index_count, extent)?;
        self.tonemap_pass.prepare(graph, Self::EXPOSURE, extent)?;
        self.present_passes.prepare(graph)?;
        Ok(())
    }

    /// 重建与窗口尺寸相关的图像，并重新绑定 cell
    pub fn resize(&mut self, renderer: &mut HeadlessRenderer, registry: &mut RgResourceRegistry) -> RgResult<()> {
        let frame_settings = *renderer.frame_settings();
        if frame_settings.frame_extent == self.frame_extent {
            return Ok(());
        }

        let old_images = self.frame_targets.images().collect_vec();
        for image in old_images {
            renderer.destroy_image(registry, image);
        }
        self.frame_targets = FrameTargets::create(renderer, registry, &frame_settings, self.frames_in_flight);

        registry.rebind_cell(self.hdr, self.frame_targets.hdr.clone())?;
        registry.rebind_cell(self.depth, self.frame_targets.depth.clone())?;
        registry.rebind_cell(self.ldr, self.frame_targets.ldr.clone())?;
        // swapchain image 已被渲染器重建，下一次 prepare_frame 会写入新的
        let swapchain = vec![RgTexture::new(renderer.swapchain_image()); self.frames_in_flight];
        registry.rebind_cell(self.swapchain, swapchain)?;

        self.frame_extent = frame_settings.frame_extent;
        log::info!(
            "forward shadow pipeline resized to {}x{}",
            self.frame_extent.width,
            self.frame_extent.height
        );
        Ok(())
    }
}

// getters
impl ForwardShadowPipeline {
    #[inline]
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    #[inline]
    pub fn shadow_maps(&self) -> RgCellHandle<RgTextureArray> {
        self.shadow_maps
    }

    #[inline]
    pub fn hdr(&self) -> RgCellHandle<RgTexture> {
        self.hdr
    }

    #[inline]
    pub fn swapchain(&self) -> RgCellHandle<RgTexture> {
        self.swapchain
    }

    #[inline]
    pub fn camera(&self) -> RgCellHandle<RgBuffer> {
        self.camera
    }

    #[inline]
    pub fn lights(&self) -> RgCellHandle<RgBuffer> {
        self.lights
    }
}
