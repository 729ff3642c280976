//! Barrier 描述
//!
//! 由 barrier 解析器生成，交给 `RgCommandRecorder` 一次性提交。

use ash::vk;

use crate::handles::{GfxBufferHandle, GfxImageHandle};
use crate::state::resource_state::{RgBufferState, RgImageState};

/// 图像 Barrier 描述
#[derive(Clone, Debug)]
pub struct RgImageBarrier {
    pub image: GfxImageHandle,
    pub vk_image: vk::Image,
    pub range: vk::ImageSubresourceRange,
    /// 上一个使用者留下的状态
    pub src_state: RgImageState,
    pub dst_state: RgImageState,
}

// vk::ImageSubresourceRange 没有实现 PartialEq，逐字段比较
impl PartialEq for RgImageBarrier {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.range, &other.range);
        self.image == other.image
            && self.vk_image == other.vk_image
            && a.aspect_mask == b.aspect_mask
            && a.base_mip_level == b.base_mip_level
            && a.level_count == b.level_count
            && a.base_array_layer == b.base_array_layer
            && a.layer_count == b.layer_count
            && self.src_state == other.src_state
            && self.dst_state == other.dst_state
    }
}

impl RgImageBarrier {
    #[inline]
    pub fn is_layout_transition(&self) -> bool {
        self.src_state.layout != self.dst_state.layout
    }

    pub fn to_vk(&self) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .image(self.vk_image)
            .old_layout(self.src_state.layout)
            .new_layout(self.dst_state.layout)
            .src_stage_mask(self.src_state.stage)
            .src_access_mask(self.src_state.src_access())
            .dst_stage_mask(self.dst_state.stage)
            .dst_access_mask(self.dst_state.access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .subresource_range(self.range)
    }
}

/// 缓冲区 Barrier 描述，总是覆盖整个缓冲区
#[derive(Clone, Debug, PartialEq)]
pub struct RgBufferBarrier {
    pub buffer: GfxBufferHandle,
    pub vk_buffer: vk::Buffer,
    pub src_state: RgBufferState,
    pub dst_state: RgBufferState,
}

impl RgBufferBarrier {
    pub fn to_vk(&self) -> vk::BufferMemoryBarrier2<'static> {
        vk::BufferMemoryBarrier2::default()
            .buffer(self.vk_buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE)
            .src_stage_mask(self.src_state.stage)
            .src_access_mask(self.src_state.src_access())
            .dst_stage_mask(self.dst_state.stage)
            .dst_access_mask(self.dst_state.access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
    }
}

/// 一个 Pass 在 resolve_barriers 时需要的全部 barrier
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RgPassBarriers {
    pub image_barriers: Vec<RgImageBarrier>,
    pub buffer_barriers: Vec<RgBufferBarrier>,
}

impl RgPassBarriers {
    #[inline]
    pub fn len(&self) -> usize {
        self.image_barriers.len() + self.buffer_barriers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_barriers.is_empty() && self.buffer_barriers.is_empty()
    }
}
