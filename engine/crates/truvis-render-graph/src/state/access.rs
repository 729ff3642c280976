//! 访问类型和访问表
//!
//! Pass 的每个依赖只声明一个 `RgAccessKind`，真正的 stage / access / layout
//! 由 `RgAccessTable` 决定。访问表在启动时构造一次，之后只读。

use std::collections::HashMap;

use crate::error::{RgError, RgResult};
use crate::state::resource_state::{RgBufferState, RgImageState};

/// 依赖对资源的访问方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgAccessKind {
    /// 作为颜色或深度附件写入
    RenderTargetWrite,
    /// 计算着色器只读
    ComputeRead,
    /// 计算着色器写入（storage image / storage buffer）
    ComputeWrite,
    /// 片段着色器只读
    FragmentRead,
    /// 交给呈现引擎
    Present,
    /// blit / copy 的源
    TransferSrc,
    /// blit / copy 的目标
    TransferDst,
}

impl RgAccessKind {
    pub const ALL: [Self; 7] = [
        Self::RenderTargetWrite,
        Self::ComputeRead,
        Self::ComputeWrite,
        Self::FragmentRead,
        Self::Present,
        Self::TransferSrc,
        Self::TransferDst,
    ];

    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, Self::RenderTargetWrite | Self::ComputeWrite | Self::TransferDst)
    }
}

/// 一个访问类型在不同资源上的目标状态
///
/// `None` 表示该访问类型不能作用于这种资源（例如对 buffer 做 Present）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgAccessRule {
    /// 颜色图像
    pub color_image: Option<RgImageState>,
    /// 深度 / 模板图像
    pub depth_image: Option<RgImageState>,
    /// 缓冲区
    pub buffer: Option<RgBufferState>,
}

impl RgAccessRule {
    pub const fn images(color: RgImageState, depth: RgImageState) -> Self {
        Self {
            color_image: Some(color),
            depth_image: Some(depth),
            buffer: None,
        }
    }

    pub const fn with_buffer(mut self, buffer: RgBufferState) -> Self {
        self.buffer = Some(buffer);
        self
    }
}

/// 访问类型 -> 资源状态 的映射表
#[derive(Clone, Debug, Default)]
pub struct RgAccessTable {
    rules: HashMap<RgAccessKind, RgAccessRule>,
}

// new & init
impl RgAccessTable {
    /// 空表，用于完全自定义映射
    pub fn empty() -> Self {
        Self::default()
    }

    /// 所有管线共用的标准映射
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(
                RgAccessKind::RenderTargetWrite,
                RgAccessRule::images(RgImageState::COLOR_ATTACHMENT_WRITE, RgImageState::DEPTH_ATTACHMENT_WRITE),
            )
            .with_rule(
                RgAccessKind::ComputeRead,
                RgAccessRule::images(RgImageState::SHADER_READ_COMPUTE, RgImageState::SHADER_READ_COMPUTE)
                    .with_buffer(RgBufferState::SHADER_READ_COMPUTE),
            )
            .with_rule(
                RgAccessKind::ComputeWrite,
                RgAccessRule::images(RgImageState::STORAGE_WRITE_COMPUTE, RgImageState::STORAGE_WRITE_COMPUTE)
                    .with_buffer(RgBufferState::STORAGE_WRITE_COMPUTE),
            )
            .with_rule(
                RgAccessKind::FragmentRead,
                RgAccessRule::images(RgImageState::SHADER_READ_FRAGMENT, RgImageState::SHADER_READ_FRAGMENT)
                    .with_buffer(RgBufferState::SHADER_READ_FRAGMENT),
            )
            .with_rule(
                RgAccessKind::Present,
                RgAccessRule {
                    color_image: Some(RgImageState::PRESENT),
                    depth_image: None,
                    buffer: None,
                },
            )
            .with_rule(
                RgAccessKind::TransferSrc,
                RgAccessRule::images(RgImageState::TRANSFER_SRC, RgImageState::TRANSFER_SRC)
                    .with_buffer(RgBufferState::TRANSFER_SRC),
            )
            .with_rule(
                RgAccessKind::TransferDst,
                RgAccessRule::images(RgImageState::TRANSFER_DST, RgImageState::TRANSFER_DST)
                    .with_buffer(RgBufferState::TRANSFER_DST),
            )
    }

    /// builder
    pub fn with_rule(mut self, access: RgAccessKind, rule: RgAccessRule) -> Self {
        self.rules.insert(access, rule);
        self
    }
}

// lookup
impl RgAccessTable {
    #[inline]
    pub fn rule(&self, access: RgAccessKind) -> RgResult<&RgAccessRule> {
        self.rules.get(&access).ok_or(RgError::UnmappedAccessKind(access))
    }

    pub fn image_state(&self, access: RgAccessKind, is_depth: bool) -> RgResult<RgImageState> {
        let rule = self.rule(access)?;
        let state = if is_depth { rule.depth_image } else { rule.color_image };
        state.ok_or(RgError::UnsupportedAccess {
            access,
            resource: if is_depth { "depth image" } else { "color image" },
        })
    }

    pub fn buffer_state(&self, access: RgAccessKind) -> RgResult<RgBufferState> {
        self.rule(access)?.buffer.ok_or(RgError::UnsupportedAccess {
            access,
            resource: "buffer",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RgErrorCategory;

    #[test]
    fn test_standard_table_covers_every_kind() {
        let table = RgAccessTable::standard();
        for access in RgAccessKind::ALL {
            assert!(table.rule(access).is_ok(), "{access:?} is not mapped");
        }
    }

    #[test]
    fn test_render_target_write_depends_on_aspect() {
        let table = RgAccessTable::standard();
        assert_eq!(
            table.image_state(RgAccessKind::RenderTargetWrite, false).unwrap(),
            RgImageState::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(
            table.image_state(RgAccessKind::RenderTargetWrite, true).unwrap(),
            RgImageState::DEPTH_ATTACHMENT_WRITE
        );
    }

    #[test]
    fn test_unmapped_access_is_a_configuration_error() {
        let table = RgAccessTable::empty().with_rule(
            RgAccessKind::FragmentRead,
            RgAccessRule::images(RgImageState::SHADER_READ_FRAGMENT, RgImageState::SHADER_READ_FRAGMENT),
        );
        let err = table.image_state(RgAccessKind::ComputeRead, false).unwrap_err();
        assert!(matches!(err, RgError::UnmappedAccessKind(RgAccessKind::ComputeRead)));
        assert_eq!(err.category(), RgErrorCategory::Configuration);
    }

    #[test]
    fn test_present_on_buffer_is_rejected() {
        let table = RgAccessTable::standard();
        let err = table.buffer_state(RgAccessKind::Present).unwrap_err();
        assert!(matches!(err, RgError::UnsupportedAccess { resource: "buffer", .. }));
        assert!(table.buffer_state(RgAccessKind::RenderTargetWrite).is_err());
    }
}
