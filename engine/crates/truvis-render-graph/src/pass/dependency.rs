//! Pass 的具名依赖
//!
//! 依赖只记录"绑定到哪个 cell、以什么方式访问"，真正的物理资源
//! 在每次解析时按 frame index 从 cell 中取出，所以 rebind 在下一次解析时生效。

use crate::error::{RgError, RgResult};
use crate::handles::{RgCellHandle, RgCellKey};
use crate::resources::payload::{RgCellKind, RgCellPayload, RgPhysicalId};
use crate::resources::registry::RgResourceRegistry;
use crate::state::access::RgAccessKind;

/// 依赖当前绑定的目标
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgDependencyBinding {
    pub cell: RgCellKey,
    pub kind: RgCellKind,
    /// 只引用纹理数组中的某一个元素
    pub element: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct RgDependency {
    name: String,
    access: RgAccessKind,
    binding: Option<RgDependencyBinding>,
}

// new & init
impl RgDependency {
    /// 创建未绑定的依赖，录制前必须 bind
    pub fn new(name: impl Into<String>, access: RgAccessKind) -> Self {
        Self {
            name: name.into(),
            access,
            binding: None,
        }
    }

    pub fn bound<T: RgCellPayload>(name: impl Into<String>, access: RgAccessKind, cell: RgCellHandle<T>) -> Self {
        let mut dependency = Self::new(name, access);
        dependency.bind(cell);
        dependency
    }
}

// binding
impl RgDependency {
    /// 绑定整个 cell；与当前绑定相同时不做任何事，返回是否发生了变化
    pub fn bind<T: RgCellPayload>(&mut self, cell: RgCellHandle<T>) -> bool {
        self.set_binding(Some(RgDependencyBinding {
            cell: cell.key(),
            kind: T::KIND,
            element: None,
        }))
    }

    /// 只绑定纹理数组中的第 `element` 个元素
    pub fn bind_element<T: RgCellPayload>(&mut self, cell: RgCellHandle<T>, element: usize) -> bool {
        self.set_binding(Some(RgDependencyBinding {
            cell: cell.key(),
            kind: T::KIND,
            element: Some(element),
        }))
    }

    pub fn unbind(&mut self) -> bool {
        self.set_binding(None)
    }

    fn set_binding(&mut self, binding: Option<RgDependencyBinding>) -> bool {
        if self.binding == binding {
            return false;
        }
        self.binding = binding;
        true
    }
}

// resolve
impl RgDependency {
    fn require_binding(&self, pass: &str) -> RgResult<&RgDependencyBinding> {
        self.binding.as_ref().ok_or_else(|| RgError::UnboundDependency {
            pass: pass.to_string(),
            name: self.name.clone(),
        })
    }

    /// 取得 `frame_index` 这一帧绑定的资源
    pub fn resolve<'a, T: RgCellPayload>(
        &self,
        pass: &str,
        registry: &'a RgResourceRegistry,
        frame_index: usize,
    ) -> RgResult<&'a T> {
        let binding = self.require_binding(pass)?;
        let slot = registry.slot(binding.cell)?;
        let cell = T::from_slot(slot).ok_or_else(|| RgError::CellTypeMismatch {
            cell: slot.name().to_string(),
            expected: T::KIND,
            found: slot.kind(),
        })?;
        cell.get(frame_index)
    }

    /// 收集参与 barrier 的物理资源
    ///
    /// `frames_in_flight` 是所属 Pass 声明的帧数，cell 长度必须不小于它。
    pub(crate) fn collect_physical(
        &self,
        pass: &str,
        registry: &RgResourceRegistry,
        frame_index: usize,
        frames_in_flight: usize,
        out: &mut Vec<RgPhysicalId>,
    ) -> RgResult<()> {
        let binding = self.require_binding(pass)?;
        let slot = registry.slot(binding.cell)?;
        if slot.len() < frames_in_flight {
            return Err(RgError::out_of_range(
                format!("resource cell `{}` of pass `{pass}` (frames in flight)", slot.name()),
                frames_in_flight - 1,
                slot.len(),
            ));
        }
        slot.collect_physical(frame_index, binding.element, out)
    }
}

// getters
impl RgDependency {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn access(&self) -> RgAccessKind {
        self.access
    }

    #[inline]
    pub fn binding(&self) -> Option<&RgDependencyBinding> {
        self.binding.as_ref()
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::error::RgErrorCategory;
    use crate::resources::payload::{RgBuffer, RgTexture};
    use crate::resources::physical::{RgPhysicalBuffer, RgPhysicalImage};

    fn registry_with_texture() -> (RgResourceRegistry, RgCellHandle<RgTexture>) {
        let mut registry = RgResourceRegistry::new();
        let textures: Vec<_> = (0..2)
            .map(|i| {
                RgTexture::new(registry.register_image(RgPhysicalImage::new(
                    format!("color{i}"),
                    vk::Image::null(),
                    vk::ImageView::null(),
                    vk::Format::R8G8B8A8_UNORM,
                    vk::Extent2D { width: 4, height: 4 },
                )))
            })
            .collect();
        let cell = registry.create_cell("color", textures);
        (registry, cell)
    }

    #[test]
    fn test_unbound_dependency_fails_closed() {
        let (registry, _) = registry_with_texture();
        let dependency = RgDependency::new("color", RgAccessKind::FragmentRead);
        let err = dependency.resolve::<RgTexture>("post", &registry, 0).unwrap_err();
        assert!(matches!(err, RgError::UnboundDependency { .. }));
        assert_eq!(err.category(), RgErrorCategory::UnboundDependency);
    }

    #[test]
    fn test_rebind_same_cell_is_noop() {
        let (registry, cell) = registry_with_texture();
        let mut dependency = RgDependency::bound("color", RgAccessKind::FragmentRead, cell);
        assert!(!dependency.bind(cell));
        assert!(dependency.bind_element(cell, 0));
        assert!(!dependency.bind_element(cell, 0));
        assert!(dependency.resolve::<RgTexture>("post", &registry, 1).is_ok());
    }

    #[test]
    fn test_resolve_with_wrong_payload_type() {
        let (mut registry, cell) = registry_with_texture();
        let buffer = registry.register_buffer(RgPhysicalBuffer::new("camera", vk::Buffer::null(), 64));
        let _ = registry.create_cell("camera", vec![RgBuffer::new(buffer)]);

        let dependency = RgDependency::bound("color", RgAccessKind::FragmentRead, cell);
        let err = dependency.resolve::<RgBuffer>("post", &registry, 0).unwrap_err();
        assert!(matches!(err, RgError::CellTypeMismatch { .. }));
    }

    #[test]
    fn test_cell_shorter_than_frames_in_flight() {
        let (registry, cell) = registry_with_texture();
        let dependency = RgDependency::bound("color", RgAccessKind::FragmentRead, cell);
        let mut out = Vec::new();
        assert!(dependency.collect_physical("post", &registry, 0, 2, &mut out).is_ok());

        out.clear();
        let err = dependency.collect_physical("post", &registry, 0, 3, &mut out).unwrap_err();
        assert!(matches!(err, RgError::OutOfRange { len: 2, .. }));
    }
}
