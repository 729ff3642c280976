use std::fmt::Display;
use std::ops::Deref;

use ash::vk;

use crate::error::{RgError, RgResult};

/// RenderGraph 级配置
#[derive(Copy, Clone, Debug)]
pub struct RgGraphSettings {
    /// 读取一个从未被写过的资源时输出 warning，不改变执行结果
    pub validate_access_order: bool,
    /// 为每个 Pass 插入 debug label
    pub debug_labels: bool,
}

impl Default for RgGraphSettings {
    fn default() -> Self {
        Self {
            validate_access_order: cfg!(debug_assertions),
            debug_labels: true,
        }
    }
}

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    /// frames in flight 的上限
    pub const MAX_FRAMES_IN_FLIGHT: usize = 3;
    pub const DEFAULT_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
    pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
    pub const SHADOW_MAP_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
}

/// 帧级渲染配置
#[derive(Copy, Clone, Debug)]
pub struct FrameSettings {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub frame_extent: vk::Extent2D,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            color_format: DefaultRendererSettings::DEFAULT_COLOR_FORMAT,
            depth_format: DefaultRendererSettings::DEFAULT_DEPTH_FORMAT,
            frame_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
        }
    }
}

/// 帧标签（A/B/C）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
/// 通过 `Deref` 转换为索引 0/1/2。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameLabel {
    A,
    B,
    C,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 3] = [0, 1, 2];
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    #[inline]
    pub fn from_usize(idx: usize) -> RgResult<Self> {
        Self::ALL
            .get(idx)
            .copied()
            .ok_or_else(|| RgError::out_of_range("frame label", idx, Self::ALL.len()))
    }
}
