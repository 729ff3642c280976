//! 资源状态定义
//!
//! 封装 Vulkan 的 pipeline stage、access mask 和 image layout，
//! 提供访问表用到的预定义状态组合。

use ash::vk;

/// 图像资源状态
///
/// 描述图像在某个 Pass 中的使用方式，barrier 解析器按值比较前后两个状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgImageState {
    /// Pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Access mask
    pub access: vk::AccessFlags2,
    /// Image layout
    pub layout: vk::ImageLayout,
}

impl Default for RgImageState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl RgImageState {
    /// 创建自定义状态
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    // ============ 预定义状态常量 ============

    /// 未定义状态（从未被 graph 访问过的资源）
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 颜色附件输出（图形管线写入）
    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// 深度附件写入
    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
        ),
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// 着色器只读采样（片段着色器）
    pub const SHADER_READ_FRAGMENT: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 着色器只读采样（计算着色器）
    pub const SHADER_READ_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 存储图像写入（计算着色器）
    pub const STORAGE_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    /// 传输源
    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    /// 传输目标
    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    /// 呈现（swapchain image）
    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    // ============ 辅助方法 ============

    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    /// 检查是否为写操作
    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// 获取用于 barrier src 的 access（只有写操作需要 make available）
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }
}

/// 缓冲区资源状态
///
/// 缓冲区没有 layout，只比较 stage 和 access。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgBufferState {
    /// Pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Access mask
    pub access: vk::AccessFlags2,
}

impl Default for RgBufferState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl RgBufferState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { stage, access }
    }

    /// 未定义状态
    pub const UNDEFINED: Self = Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE);

    /// Uniform / Storage 读取（片段着色器）
    pub const SHADER_READ_FRAGMENT: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::UNIFORM_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw(),
        ),
    );

    /// Uniform / Storage 读取（计算着色器）
    pub const SHADER_READ_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::UNIFORM_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw(),
        ),
    );

    /// 存储缓冲区写入（计算着色器）
    pub const STORAGE_WRITE_COMPUTE: Self =
        Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE);

    /// 传输源
    pub const TRANSFER_SRC: Self = Self::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);

    /// 传输目标
    pub const TRANSFER_DST: Self = Self::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);

    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access & Self::WRITE_ACCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_states() {
        assert!(RgImageState::COLOR_ATTACHMENT_WRITE.is_write());
        assert!(RgImageState::STORAGE_WRITE_COMPUTE.is_write());
        assert!(!RgImageState::SHADER_READ_FRAGMENT.is_write());
        assert!(!RgImageState::PRESENT.is_write());
        assert!(RgBufferState::STORAGE_WRITE_COMPUTE.is_write());
        assert!(!RgBufferState::SHADER_READ_COMPUTE.is_write());
    }

    #[test]
    fn test_src_access_drops_reads() {
        assert_eq!(RgImageState::SHADER_READ_COMPUTE.src_access(), vk::AccessFlags2::NONE);
        assert_eq!(
            RgImageState::COLOR_ATTACHMENT_WRITE.src_access(),
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
        );
    }

    #[test]
    fn test_same_layout_different_stage_is_a_different_state() {
        // 同样是 SHADER_READ_ONLY_OPTIMAL，但 stage 不同，解析器必须视为不同状态
        assert_eq!(RgImageState::SHADER_READ_COMPUTE.layout, RgImageState::SHADER_READ_FRAGMENT.layout);
        assert_ne!(RgImageState::SHADER_READ_COMPUTE, RgImageState::SHADER_READ_FRAGMENT);
    }
}
