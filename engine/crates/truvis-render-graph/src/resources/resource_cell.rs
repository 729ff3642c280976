//! 可重新绑定的资源容器
//!
//! 每个 `ResourceCell<T>` 为每个 frame in flight 保存一份 `T`。
//! 重新绑定时整体替换，registry 在 graph 执行期间只被不可变借用，
//! 所以 Pass 不可能观察到替换了一半的状态。

use crate::error::{RgError, RgResult};
use crate::resources::payload::{RgBuffer, RgCellKind, RgCellPayload, RgPhysicalId, RgTexture, RgTextureArray};

#[derive(Clone, Debug)]
pub struct ResourceCell<T> {
    name: String,
    frames: Vec<T>,
    /// 每次有效的 rebind / update_slot 加一
    generation: u64,
}

// new & init
impl<T: RgCellPayload> ResourceCell<T> {
    pub fn new(name: impl Into<String>, frames: Vec<T>) -> Self {
        Self {
            name: name.into(),
            frames,
            generation: 0,
        }
    }
}

// getters
impl<T: RgCellPayload> ResourceCell<T> {
    /// 取得 `frame_index` 对应的资源
    pub fn get(&self, frame_index: usize) -> RgResult<&T> {
        self.frames
            .get(frame_index)
            .ok_or_else(|| RgError::out_of_range(format!("resource cell `{}`", self.name), frame_index, self.frames.len()))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn frames(&self) -> &[T] {
        &self.frames
    }
}

// update
impl<T: RgCellPayload> ResourceCell<T> {
    /// 整体替换；内容相同时什么也不做
    ///
    /// 返回是否真的发生了替换
    pub fn rebind(&mut self, frames: Vec<T>) -> bool {
        if self.frames == frames {
            return false;
        }
        self.frames = frames;
        self.generation += 1;
        true
    }

    /// 只替换一个 slot，例如 swapchain 轮换到新的 image
    pub fn update_slot(&mut self, frame_index: usize, value: T) -> RgResult<bool> {
        let len = self.frames.len();
        let name = &self.name;
        let slot = self
            .frames
            .get_mut(frame_index)
            .ok_or_else(|| RgError::out_of_range(format!("resource cell `{name}`"), frame_index, len))?;
        if *slot == value {
            return Ok(false);
        }
        *slot = value;
        self.generation += 1;
        Ok(true)
    }

    /// 原地修改一个 slot（例如调整纹理数组的 active count）
    pub fn update_slot_with<R>(&mut self, frame_index: usize, f: impl FnOnce(&mut T) -> RgResult<R>) -> RgResult<R> {
        let len = self.frames.len();
        let name = &self.name;
        let slot = self
            .frames
            .get_mut(frame_index)
            .ok_or_else(|| RgError::out_of_range(format!("resource cell `{name}`"), frame_index, len))?;
        let before = slot.clone();
        let result = f(slot)?;
        if *slot != before {
            self.generation += 1;
        }
        Ok(result)
    }
}

/// 类型擦除后的 cell，registry 统一存放在一个 SlotMap 中
#[derive(Clone, Debug)]
pub enum RgCellSlot {
    Texture(ResourceCell<RgTexture>),
    TextureArray(ResourceCell<RgTextureArray>),
    Buffer(ResourceCell<RgBuffer>),
}

impl RgCellSlot {
    pub fn name(&self) -> &str {
        match self {
            Self::Texture(cell) => cell.name(),
            Self::TextureArray(cell) => cell.name(),
            Self::Buffer(cell) => cell.name(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Texture(cell) => cell.len(),
            Self::TextureArray(cell) => cell.len(),
            Self::Buffer(cell) => cell.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        match self {
            Self::Texture(cell) => cell.generation(),
            Self::TextureArray(cell) => cell.generation(),
            Self::Buffer(cell) => cell.generation(),
        }
    }

    pub fn kind(&self) -> RgCellKind {
        match self {
            Self::Texture(_) => RgCellKind::Texture,
            Self::TextureArray(_) => RgCellKind::TextureArray,
            Self::Buffer(_) => RgCellKind::Buffer,
        }
    }

    /// 收集 `frame_index` 这一帧需要做 barrier 的物理资源
    pub fn collect_physical(
        &self,
        frame_index: usize,
        element: Option<usize>,
        out: &mut Vec<RgPhysicalId>,
    ) -> RgResult<()> {
        match self {
            Self::Texture(cell) => cell.get(frame_index)?.collect_physical(element, out),
            Self::TextureArray(cell) => cell.get(frame_index)?.collect_physical(element, out),
            Self::Buffer(cell) => cell.get(frame_index)?.collect_physical(element, out),
        }
    }

    /// 所有 frame slot 中绑定的物理资源
    pub fn collect_all_physical(&self, out: &mut Vec<RgPhysicalId>) {
        fn collect<T: RgCellPayload>(cell: &ResourceCell<T>, out: &mut Vec<RgPhysicalId>) {
            cell.frames().iter().for_each(|payload| payload.collect_all_physical(out));
        }
        match self {
            Self::Texture(cell) => collect(cell, out),
            Self::TextureArray(cell) => collect(cell, out),
            Self::Buffer(cell) => collect(cell, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;
    use crate::handles::GfxBufferHandle;

    /// 同一个 SlotMap 分配，保证每次得到的句柄互不相同
    fn buffers(keys: &mut SlotMap<GfxBufferHandle, ()>, count: usize) -> Vec<RgBuffer> {
        (0..count).map(|_| RgBuffer::new(keys.insert(()))).collect()
    }

    #[test]
    fn test_get_out_of_range() {
        let mut keys = SlotMap::with_key();
        let cell = ResourceCell::new("camera", buffers(&mut keys, 2));
        assert!(cell.get(1).is_ok());
        let err = cell.get(2).unwrap_err();
        assert!(matches!(err, RgError::OutOfRange { index: 2, len: 2, .. }));
    }

    #[test]
    fn test_rebind_bumps_generation_only_on_change() {
        let mut keys = SlotMap::with_key();
        let frames = buffers(&mut keys, 2);
        let mut cell = ResourceCell::new("camera", frames.clone());

        assert!(!cell.rebind(frames.clone()));
        assert_eq!(cell.generation(), 0);

        let other = buffers(&mut keys, 2);
        assert_ne!(other, frames);
        assert!(cell.rebind(other.clone()));
        assert_eq!(cell.generation(), 1);
        assert_eq!(cell.get(0).unwrap(), &other[0]);
    }

    #[test]
    fn test_update_slot_touches_single_frame() {
        let mut keys = SlotMap::with_key();
        let frames = buffers(&mut keys, 3);
        let replacement = buffers(&mut keys, 1)[0];
        let mut cell = ResourceCell::new("swapchain", frames.clone());

        assert!(cell.update_slot(1, replacement).unwrap());
        assert_eq!(cell.get(0).unwrap(), &frames[0]);
        assert_eq!(cell.get(1).unwrap(), &replacement);
        assert_eq!(cell.get(2).unwrap(), &frames[2]);
        assert_eq!(cell.generation(), 1);

        assert!(!cell.update_slot(1, replacement).unwrap());
        assert!(cell.update_slot(3, replacement).is_err());
    }
}
