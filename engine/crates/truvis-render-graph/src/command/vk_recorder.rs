//! 基于 ash 的 recorder

use std::ffi::CString;

use ash::vk;
use itertools::Itertools;

use crate::command::barrier::RgPassBarriers;
use crate::command::recorder::{RgCommandRecorder, RgImageBlit};
use crate::command::rendering::RgResolvedRendering;
use crate::error::{RgError, RgResult};

/// Pass 的 debug label 颜色
const PASS_LABEL_COLOR: [f32; 4] = [0.35, 0.65, 0.95, 1.0];

/// 把 Pass 的命令写入每帧一个的 vk command buffer
///
/// command buffer 由 renderer 分配，并在 `RenderGraph::execute` 前后 begin / end。
/// 需要 Vulkan 1.3（synchronization2、dynamic rendering、extended dynamic state）。
pub struct VkCommandRecorder {
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,

    /// 以 frame index 为下标
    command_buffers: Vec<vk::CommandBuffer>,
    current: vk::CommandBuffer,
}

// new & init
impl VkCommandRecorder {
    pub fn new(device: ash::Device, command_buffers: Vec<vk::CommandBuffer>) -> Self {
        Self {
            device,
            debug_utils: None,
            command_buffers,
            current: vk::CommandBuffer::null(),
        }
    }

    /// builder
    pub fn with_debug_utils(mut self, debug_utils: ash::ext::debug_utils::Device) -> Self {
        self.debug_utils = Some(debug_utils);
        self
    }

    /// swapchain 重建后 command buffer 可能重新分配
    pub fn set_command_buffers(&mut self, command_buffers: Vec<vk::CommandBuffer>) {
        self.command_buffers = command_buffers;
        self.current = vk::CommandBuffer::null();
    }
}

// getters
impl VkCommandRecorder {
    #[inline]
    pub fn current(&self) -> vk::CommandBuffer {
        self.current
    }
}

impl RgCommandRecorder for VkCommandRecorder {
    fn begin_pass(&mut self, frame_index: usize) -> RgResult<()> {
        self.current = *self
            .command_buffers
            .get(frame_index)
            .ok_or_else(|| RgError::out_of_range("command buffers", frame_index, self.command_buffers.len()))?;
        Ok(())
    }

    fn end_pass(&mut self) {
        self.current = vk::CommandBuffer::null();
    }

    fn begin_label(&mut self, label: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(label) else {
            log::warn!("debug label `{label}` contains a nul byte");
            return;
        };
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.current,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(PASS_LABEL_COLOR),
            );
        }
    }

    fn end_label(&mut self) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.current);
            }
        }
    }

    fn pipeline_barrier(&mut self, barriers: &RgPassBarriers) {
        let image_barriers = barriers.image_barriers.iter().map(|b| b.to_vk()).collect_vec();
        let buffer_barriers = barriers.buffer_barriers.iter().map(|b| b.to_vk()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.current, &dependency_info);
        }
    }

    fn begin_rendering(&mut self, rendering: &RgResolvedRendering) {
        let color_attachments = rendering.color_attachments();
        let depth_attachment = rendering.depth_attachment();

        let mut rendering_info = vk::RenderingInfo::default()
            .layer_count(1)
            .render_area(rendering.area)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = &depth_attachment {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        let extent = rendering.area.extent;
        unsafe {
            self.device.cmd_begin_rendering(self.current, &rendering_info);
            self.device.cmd_set_viewport(
                self.current,
                0,
                &[vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                }],
            );
            self.device.cmd_set_scissor(self.current, 0, &[rendering.area]);
        }
    }

    fn end_rendering(&mut self) {
        unsafe {
            self.device.cmd_end_rendering(self.current);
        }
    }

    fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags) {
        unsafe {
            self.device.cmd_set_cull_mode(self.current, cull_mode);
        }
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device.cmd_push_constants(self.current, layout, stages, offset, data);
        }
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(self.current, bind_point, pipeline);
        }
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(self.current, bind_point, layout, first_set, descriptor_sets, &[]);
        }
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device.cmd_draw_indexed(self.current, index_count, instance_count, 0, 0, 0);
        }
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        unsafe {
            self.device.cmd_dispatch(self.current, group_x, group_y, group_z);
        }
    }

    fn blit_image(&mut self, blit: &RgImageBlit) {
        let subresource = vk::ImageSubresourceLayers {
            aspect_mask: blit.aspect,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        };
        let corner = |extent: vk::Extent2D| vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        };
        let region = vk::ImageBlit {
            src_subresource: subresource,
            src_offsets: [vk::Offset3D::default(), corner(blit.src_extent)],
            dst_subresource: subresource,
            dst_offsets: [vk::Offset3D::default(), corner(blit.dst_extent)],
        };
        unsafe {
            self.device.cmd_blit_image(
                self.current,
                blit.src_image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                blit.dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
                blit_filter(blit.aspect),
            );
        }
    }
}

/// depth / stencil 只允许 NEAREST 过滤
fn blit_filter(aspect: vk::ImageAspectFlags) -> vk::Filter {
    if aspect == vk::ImageAspectFlags::COLOR {
        vk::Filter::LINEAR
    } else {
        vk::Filter::NEAREST
    }
}
