//! 资源注册表
//!
//! 登记外部创建的物理资源，并持有所有 `ResourceCell`。
//! graph 执行期间只以 `&RgResourceRegistry` 的形式出现，所有 rebind 都发生在两帧之间。

use slotmap::SlotMap;

use crate::error::{RgError, RgResult};
use crate::handles::{GfxBufferHandle, GfxImageHandle, GfxSamplerHandle, RgCellHandle, RgCellKey};
use crate::resources::payload::RgCellPayload;
use crate::resources::physical::{RgPhysicalBuffer, RgPhysicalImage, RgPhysicalSampler};
use crate::resources::resource_cell::{ResourceCell, RgCellSlot};

/// 某个 cell 在某一时刻的版本，用来检测缓存的解析结果是否过期
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgCellStamp {
    pub cell: RgCellKey,
    pub generation: u64,
}

#[derive(Default)]
pub struct RgResourceRegistry {
    images: SlotMap<GfxImageHandle, RgPhysicalImage>,
    buffers: SlotMap<GfxBufferHandle, RgPhysicalBuffer>,
    samplers: SlotMap<GfxSamplerHandle, RgPhysicalSampler>,
    cells: SlotMap<RgCellKey, RgCellSlot>,
}

// new & init
impl RgResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

// register
impl RgResourceRegistry {
    pub fn register_image(&mut self, image: RgPhysicalImage) -> GfxImageHandle {
        self.images.insert(image)
    }

    pub fn register_buffer(&mut self, buffer: RgPhysicalBuffer) -> GfxBufferHandle {
        self.buffers.insert(buffer)
    }

    pub fn register_sampler(&mut self, sampler: RgPhysicalSampler) -> GfxSamplerHandle {
        self.samplers.insert(sampler)
    }

    /// 注销后句柄永久失效；barrier 解析器在下一次 execute 时清理对应的状态
    pub fn unregister_image(&mut self, handle: GfxImageHandle) -> Option<RgPhysicalImage> {
        self.images.remove(handle)
    }

    pub fn unregister_buffer(&mut self, handle: GfxBufferHandle) -> Option<RgPhysicalBuffer> {
        self.buffers.remove(handle)
    }

    pub fn unregister_sampler(&mut self, handle: GfxSamplerHandle) -> Option<RgPhysicalSampler> {
        self.samplers.remove(handle)
    }
}

// physical getters
impl RgResourceRegistry {
    pub fn get_image(&self, handle: GfxImageHandle) -> RgResult<&RgPhysicalImage> {
        self.images.get(handle).ok_or_else(|| RgError::UnknownPhysicalResource {
            resource: "image",
            handle: format!("{handle:?}"),
        })
    }

    pub fn get_buffer(&self, handle: GfxBufferHandle) -> RgResult<&RgPhysicalBuffer> {
        self.buffers.get(handle).ok_or_else(|| RgError::UnknownPhysicalResource {
            resource: "buffer",
            handle: format!("{handle:?}"),
        })
    }

    pub fn get_sampler(&self, handle: GfxSamplerHandle) -> RgResult<&RgPhysicalSampler> {
        self.samplers.get(handle).ok_or_else(|| RgError::UnknownPhysicalResource {
            resource: "sampler",
            handle: format!("{handle:?}"),
        })
    }

    #[inline]
    pub fn contains_image(&self, handle: GfxImageHandle) -> bool {
        self.images.contains_key(handle)
    }

    #[inline]
    pub fn contains_buffer(&self, handle: GfxBufferHandle) -> bool {
        self.buffers.contains_key(handle)
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}

// cells
impl RgResourceRegistry {
    /// 创建 cell，`frames.len()` 通常等于 frames in flight 的数量
    pub fn create_cell<T: RgCellPayload>(&mut self, name: impl Into<String>, frames: Vec<T>) -> RgCellHandle<T> {
        let cell = ResourceCell::new(name, frames);
        log::debug!("create resource cell `{}` ({:?}, {} frames)", cell.name(), T::KIND, cell.len());
        RgCellHandle::new(self.cells.insert(T::into_slot(cell)))
    }

    pub fn cell<T: RgCellPayload>(&self, handle: RgCellHandle<T>) -> RgResult<&ResourceCell<T>> {
        let slot = self.slot(handle.key)?;
        T::from_slot(slot).ok_or_else(|| RgError::CellTypeMismatch {
            cell: slot.name().to_string(),
            expected: T::KIND,
            found: slot.kind(),
        })
    }

    fn cell_mut<T: RgCellPayload>(&mut self, handle: RgCellHandle<T>) -> RgResult<&mut ResourceCell<T>> {
        let slot = self.cells.get_mut(handle.key).ok_or_else(|| RgError::StaleCell {
            cell: format!("{:?}", handle.key),
        })?;
        let (name, found) = (slot.name().to_string(), slot.kind());
        T::from_slot_mut(slot).ok_or(RgError::CellTypeMismatch {
            cell: name,
            expected: T::KIND,
            found,
        })
    }

    /// 整体替换 cell 的内容，返回是否发生了变化
    pub fn rebind_cell<T: RgCellPayload>(&mut self, handle: RgCellHandle<T>, frames: Vec<T>) -> RgResult<bool> {
        let cell = self.cell_mut(handle)?;
        let changed = cell.rebind(frames);
        if changed {
            log::debug!("rebind resource cell `{}` -> generation {}", cell.name(), cell.generation());
        }
        Ok(changed)
    }

    pub fn update_cell_slot<T: RgCellPayload>(
        &mut self,
        handle: RgCellHandle<T>,
        frame_index: usize,
        value: T,
    ) -> RgResult<bool> {
        self.cell_mut(handle)?.update_slot(frame_index, value)
    }

    pub fn update_cell_slot_with<T: RgCellPayload, R>(
        &mut self,
        handle: RgCellHandle<T>,
        frame_index: usize,
        f: impl FnOnce(&mut T) -> RgResult<R>,
    ) -> RgResult<R> {
        self.cell_mut(handle)?.update_slot_with(frame_index, f)
    }

    /// 删除后所有指向它的依赖在解析时返回 `StaleCell`
    pub fn remove_cell<T: RgCellPayload>(&mut self, handle: RgCellHandle<T>) -> Option<ResourceCell<T>> {
        match self.cells.get(handle.key) {
            Some(slot) if T::from_slot(slot).is_some() => {}
            _ => return None,
        }
        let cell = self.cells.remove(handle.key).and_then(T::from_slot_owned)?;
        log::debug!("remove resource cell `{}`", cell.name());
        Some(cell)
    }

    pub fn stamp<T: RgCellPayload>(&self, handle: RgCellHandle<T>) -> RgResult<RgCellStamp> {
        let cell = self.cell(handle)?;
        Ok(RgCellStamp {
            cell: handle.key,
            generation: cell.generation(),
        })
    }

    /// stamp 之后 cell 没有被修改，也没有被删除
    pub fn is_current(&self, stamp: RgCellStamp) -> bool {
        self.cells.get(stamp.cell).is_some_and(|slot| slot.generation() == stamp.generation)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn slot(&self, key: RgCellKey) -> RgResult<&RgCellSlot> {
        self.cells.get(key).ok_or_else(|| RgError::StaleCell {
            cell: format!("{key:?}"),
        })
    }

    pub(crate) fn cells(&self) -> impl Iterator<Item = (RgCellKey, &RgCellSlot)> {
        self.cells.iter()
    }

    pub(crate) fn contains_cell(&self, key: RgCellKey) -> bool {
        self.cells.contains_key(key)
    }
}
