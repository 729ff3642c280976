//! 命令录制接口
//!
//! Pass 上下文不直接操作 command buffer，而是通过 `RgCommandRecorder`。
//! `VkCommandRecorder` 写入真正的 vk command buffer，`HeadlessRecorder`
//! 只把命令记在列表里，用于无 GPU 的运行和测试。

use ash::vk;

use crate::command::barrier::{RgBufferBarrier, RgImageBarrier, RgPassBarriers};
use crate::command::rendering::RgResolvedRendering;
use crate::error::RgResult;

/// 帧级别的 command buffer 由 renderer 负责 begin / end，
/// recorder 只在其中录制各个 Pass 的命令。
pub trait RgCommandRecorder {
    /// Pass 开始录制，选择 `frame_index` 对应的 command buffer
    fn begin_pass(&mut self, frame_index: usize) -> RgResult<()>;
    fn end_pass(&mut self);

    fn begin_label(&mut self, label: &str);
    fn end_label(&mut self);

    fn pipeline_barrier(&mut self, barriers: &RgPassBarriers);

    fn begin_rendering(&mut self, rendering: &RgResolvedRendering);
    fn end_rendering(&mut self);

    fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags);
    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );
    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);
    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    );

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32);
    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32);

    /// src 处于 TRANSFER_SRC_OPTIMAL，dst 处于 TRANSFER_DST_OPTIMAL
    fn blit_image(&mut self, blit: &RgImageBlit);
}

/// 整张图像的 blit，尺寸不同时线性过滤
#[derive(Clone, Debug, PartialEq)]
pub struct RgImageBlit {
    pub src_image: vk::Image,
    pub src_extent: vk::Extent2D,
    pub dst_image: vk::Image,
    pub dst_extent: vk::Extent2D,
    pub aspect: vk::ImageAspectFlags,
}

/// `HeadlessRecorder` 记录下来的命令
#[derive(Clone, Debug, PartialEq)]
pub enum RgCommand {
    BeginPass { frame_index: usize },
    EndPass,
    BeginLabel(String),
    EndLabel,
    PipelineBarrier {
        image_barriers: Vec<RgImageBarrier>,
        buffer_barriers: Vec<RgBufferBarrier>,
    },
    BeginRendering(RgResolvedRendering),
    EndRendering,
    SetCullMode(vk::CullModeFlags),
    PushConstants {
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        first_set: u32,
        descriptor_sets: Vec<vk::DescriptorSet>,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Dispatch {
        group_x: u32,
        group_y: u32,
        group_z: u32,
    },
    BlitImage(RgImageBlit),
}

/// 不依赖 GPU 的 recorder
#[derive(Debug, Default)]
pub struct HeadlessRecorder {
    commands: Vec<RgCommand>,
}

// new & init
impl HeadlessRecorder {
    pub fn new() -> Self {
        Self::default()
    }
}

// getters
impl HeadlessRecorder {
    #[inline]
    pub fn commands(&self) -> &[RgCommand] {
        &self.commands
    }

    /// 取出目前为止的全部命令
    pub fn take(&mut self) -> Vec<RgCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// 所有 PipelineBarrier 命令中 barrier 的总数
    pub fn barrier_count(&self) -> usize {
        self.image_barriers().count() + self.buffer_barriers().count()
    }

    pub fn image_barriers(&self) -> impl Iterator<Item = &RgImageBarrier> {
        self.commands.iter().flat_map(|command| {
            let barriers: &[RgImageBarrier] = match command {
                RgCommand::PipelineBarrier { image_barriers, .. } => image_barriers,
                _ => &[],
            };
            barriers
        })
    }

    pub fn buffer_barriers(&self) -> impl Iterator<Item = &RgBufferBarrier> {
        self.commands.iter().flat_map(|command| {
            let barriers: &[RgBufferBarrier] = match command {
                RgCommand::PipelineBarrier { buffer_barriers, .. } => buffer_barriers,
                _ => &[],
            };
            barriers
        })
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, RgCommand::DrawIndexed { .. } | RgCommand::Dispatch { .. }))
            .count()
    }
}

impl RgCommandRecorder for HeadlessRecorder {
    fn begin_pass(&mut self, frame_index: usize) -> RgResult<()> {
        self.commands.push(RgCommand::BeginPass { frame_index });
        Ok(())
    }

    fn end_pass(&mut self) {
        self.commands.push(RgCommand::EndPass);
    }

    fn begin_label(&mut self, label: &str) {
        self.commands.push(RgCommand::BeginLabel(label.to_string()));
    }

    fn end_label(&mut self) {
        self.commands.push(RgCommand::EndLabel);
    }

    fn pipeline_barrier(&mut self, barriers: &RgPassBarriers) {
        self.commands.push(RgCommand::PipelineBarrier {
            image_barriers: barriers.image_barriers.clone(),
            buffer_barriers: barriers.buffer_barriers.clone(),
        });
    }

    fn begin_rendering(&mut self, rendering: &RgResolvedRendering) {
        self.commands.push(RgCommand::BeginRendering(rendering.clone()));
    }

    fn end_rendering(&mut self) {
        self.commands.push(RgCommand::EndRendering);
    }

    fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags) {
        self.commands.push(RgCommand::SetCullMode(cull_mode));
    }

    fn push_constants(
        &mut self,
        _layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.commands.push(RgCommand::PushConstants {
            stages,
            offset,
            data: data.to_vec(),
        });
    }

    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.commands.push(RgCommand::BindPipeline { bind_point, pipeline });
    }

    fn bind_descriptor_sets(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) {
        self.commands.push(RgCommand::BindDescriptorSets {
            bind_point,
            first_set,
            descriptor_sets: descriptor_sets.to_vec(),
        });
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.commands.push(RgCommand::DrawIndexed {
            index_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) {
        self.commands.push(RgCommand::Dispatch {
            group_x,
            group_y,
            group_z,
        });
    }

    fn blit_image(&mut self, blit: &RgImageBlit) {
        self.commands.push(RgCommand::BlitImage(blit.clone()));
    }
}
