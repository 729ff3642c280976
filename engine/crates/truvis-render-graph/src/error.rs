//! RenderGraph 错误定义
//!
//! 所有错误都表示 graph 的接线方式有问题（编程错误 / 集成错误），
//! 不会在内部重试，直接通过 `?` 返回给 `RenderGraph::execute` 的调用者。

use crate::resources::payload::RgCellKind;
use crate::state::access::RgAccessKind;

pub type RgResult<T> = Result<T, RgError>;

/// 错误的大类，对应调用方需要排查的方向
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgErrorCategory {
    /// Pass / 依赖 / 访问表的声明本身有问题
    Configuration,
    /// 录制时依赖还没有绑定资源
    UnboundDependency,
    /// Pass 在录制中再次 start_recording
    ReentrantRecording,
    /// frame index 超出数组长度
    OutOfRange,
    /// 录制状态机或句柄的误用
    Usage,
}

#[derive(Debug, thiserror::Error)]
pub enum RgError {
    #[error("pass `{pass}` already declares a dependency named `{name}`")]
    DuplicateDependency { pass: String, name: String },

    #[error("access kind {0:?} has no entry in the access table")]
    UnmappedAccessKind(RgAccessKind),

    #[error("access kind {access:?} cannot be applied to a {resource}")]
    UnsupportedAccess { access: RgAccessKind, resource: &'static str },

    #[error("resource cell `{cell}` holds {found:?}, but {expected:?} was requested")]
    CellTypeMismatch {
        cell: String,
        expected: RgCellKind,
        found: RgCellKind,
    },

    #[error("pass `{pass}` must have at least one frame in flight")]
    NoFramesInFlight { pass: String },

    #[error("pass handle {0} does not belong to this render graph")]
    PassNotFound(usize),

    #[error("pass `{pass}` is a {found} pass, expected a {expected} pass")]
    PassKindMismatch {
        pass: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("pass `{pass}`: rendering requests a {attachment} attachment but the render target has none")]
    MissingAttachment { pass: String, attachment: &'static str },

    #[error("dependency `{name}` of pass `{pass}` is not bound to any resource cell")]
    UnboundDependency { pass: String, name: String },

    #[error("pass `{pass}` has no dependency named `{name}`")]
    DependencyNotFound { pass: String, name: String },

    #[error("pass `{pass}` is already recording")]
    ReentrantRecording { pass: String },

    #[error("{what}: index {index} is out of range (len {len})")]
    OutOfRange { what: String, index: usize, len: usize },

    #[error("pass `{pass}`: `{op}` requires an open recording scope")]
    NotRecording { pass: String, op: &'static str },

    #[error("pass `{pass}`: barriers were already resolved in this recording")]
    BarriersAlreadyResolved { pass: String },

    #[error("pass `{pass}`: `{op}` called before resolve_barriers")]
    BarriersNotResolved { pass: String, op: &'static str },

    #[error("pass `{pass}`: a rendering scope is already open")]
    RenderingAlreadyActive { pass: String },

    #[error("pass `{pass}`: `{op}` requires an open rendering scope")]
    NotRendering { pass: String, op: &'static str },

    #[error("pass `{pass}`: end_recording called while the rendering scope is still open")]
    RenderingStillActive { pass: String },

    #[error("pass `{pass}`: execute callback returned without ending its recording")]
    RecordingNotClosed { pass: String },

    #[error("resource cell `{cell}` has been removed from the registry")]
    StaleCell { cell: String },

    #[error("physical {resource} {handle} is not registered")]
    UnknownPhysicalResource { resource: &'static str, handle: String },
}

impl RgError {
    pub fn category(&self) -> RgErrorCategory {
        match self {
            Self::DuplicateDependency { .. }
            | Self::UnmappedAccessKind(_)
            | Self::UnsupportedAccess { .. }
            | Self::CellTypeMismatch { .. }
            | Self::NoFramesInFlight { .. }
            | Self::PassNotFound(_)
            | Self::PassKindMismatch { .. }
            | Self::MissingAttachment { .. } => RgErrorCategory::Configuration,

            Self::UnboundDependency { .. } => RgErrorCategory::UnboundDependency,
            Self::ReentrantRecording { .. } => RgErrorCategory::ReentrantRecording,
            Self::OutOfRange { .. } => RgErrorCategory::OutOfRange,

            Self::DependencyNotFound { .. }
            | Self::NotRecording { .. }
            | Self::BarriersAlreadyResolved { .. }
            | Self::BarriersNotResolved { .. }
            | Self::RenderingAlreadyActive { .. }
            | Self::NotRendering { .. }
            | Self::RenderingStillActive { .. }
            | Self::RecordingNotClosed { .. }
            | Self::StaleCell { .. }
            | Self::UnknownPhysicalResource { .. } => RgErrorCategory::Usage,
        }
    }

    pub(crate) fn out_of_range(what: impl Into<String>, index: usize, len: usize) -> Self {
        Self::OutOfRange {
            what: what.into(),
            index,
            len,
        }
    }
}
