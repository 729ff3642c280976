//! ResourceCell 中每个 frame slot 存放的资源类型

use crate::error::{RgError, RgResult};
use crate::handles::{GfxBufferHandle, GfxImageHandle, GfxSamplerHandle};
use crate::resources::resource_cell::{ResourceCell, RgCellSlot};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgCellKind {
    Texture,
    TextureArray,
    Buffer,
}

/// 需要参与 barrier 解析的物理资源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgPhysicalId {
    Image(GfxImageHandle),
    Buffer(GfxBufferHandle),
}

/// 单张纹理 + 可选的采样器
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgTexture {
    pub image: GfxImageHandle,
    pub sampler: Option<GfxSamplerHandle>,
}

impl RgTexture {
    #[inline]
    pub fn new(image: GfxImageHandle) -> Self {
        Self { image, sampler: None }
    }

    #[inline]
    pub fn sampled(image: GfxImageHandle, sampler: GfxSamplerHandle) -> Self {
        Self {
            image,
            sampler: Some(sampler),
        }
    }
}

/// 容量固定的纹理数组（例如每个光源一张 shadow map）
///
/// 创建时分配好全部容量，每帧只修改 `active_count`，不会重新分配。
/// 只有前 `active_count` 个元素参与 barrier 解析。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RgTextureArray {
    textures: Vec<RgTexture>,
    active_count: usize,
}

// new & init
impl RgTextureArray {
    /// 容量等于 `textures.len()`，初始时全部激活
    pub fn new(textures: Vec<RgTexture>) -> Self {
        let active_count = textures.len();
        Self { textures, active_count }
    }
}

// update
impl RgTextureArray {
    pub fn set_active_count(&mut self, active_count: usize) -> RgResult<()> {
        if active_count > self.textures.len() {
            return Err(RgError::out_of_range("texture array active count", active_count, self.textures.len()));
        }
        self.active_count = active_count;
        Ok(())
    }

    pub fn set(&mut self, index: usize, texture: RgTexture) -> RgResult<()> {
        let capacity = self.textures.len();
        let slot = self
            .textures
            .get_mut(index)
            .ok_or_else(|| RgError::out_of_range("texture array element", index, capacity))?;
        *slot = texture;
        Ok(())
    }
}

// getters
impl RgTextureArray {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.textures.len()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    #[inline]
    pub fn active(&self) -> &[RgTexture] {
        &self.textures[..self.active_count]
    }

    pub fn get(&self, index: usize) -> RgResult<&RgTexture> {
        self.active()
            .get(index)
            .ok_or_else(|| RgError::out_of_range("texture array element", index, self.active_count))
    }
}

/// 单个缓冲区
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgBuffer {
    pub buffer: GfxBufferHandle,
}

impl RgBuffer {
    #[inline]
    pub fn new(buffer: GfxBufferHandle) -> Self {
        Self { buffer }
    }
}

/// 可以放进 `ResourceCell` 的资源类型
pub trait RgCellPayload: Clone + PartialEq + 'static {
    const KIND: RgCellKind;

    /// 收集需要做 barrier 的物理资源；`element` 为 `Some` 时只取数组中的一个元素
    fn collect_physical(&self, element: Option<usize>, out: &mut Vec<RgPhysicalId>) -> RgResult<()>;

    /// 收集绑定的全部物理资源，纹理数组包括未激活的元素
    fn collect_all_physical(&self, out: &mut Vec<RgPhysicalId>);

    #[doc(hidden)]
    fn into_slot(cell: ResourceCell<Self>) -> RgCellSlot;
    #[doc(hidden)]
    fn from_slot(slot: &RgCellSlot) -> Option<&ResourceCell<Self>>;
    #[doc(hidden)]
    fn from_slot_mut(slot: &mut RgCellSlot) -> Option<&mut ResourceCell<Self>>;
    #[doc(hidden)]
    fn from_slot_owned(slot: RgCellSlot) -> Option<ResourceCell<Self>>;
}

/// `RgCellSlot` 与具体 `ResourceCell<T>` 之间的转换
macro_rules! slot_conversions {
    ($variant:ident) => {
        fn into_slot(cell: ResourceCell<Self>) -> RgCellSlot {
            RgCellSlot::$variant(cell)
        }

        fn from_slot(slot: &RgCellSlot) -> Option<&ResourceCell<Self>> {
            match slot {
                RgCellSlot::$variant(cell) => Some(cell),
                _ => None,
            }
        }

        fn from_slot_mut(slot: &mut RgCellSlot) -> Option<&mut ResourceCell<Self>> {
            match slot {
                RgCellSlot::$variant(cell) => Some(cell),
                _ => None,
            }
        }

        fn from_slot_owned(slot: RgCellSlot) -> Option<ResourceCell<Self>> {
            match slot {
                RgCellSlot::$variant(cell) => Some(cell),
                _ => None,
            }
        }
    };
}

fn check_single_element(element: Option<usize>) -> RgResult<()> {
    match element {
        None | Some(0) => Ok(()),
        Some(index) => Err(RgError::out_of_range("single resource element", index, 1)),
    }
}

impl RgCellPayload for RgTexture {
    const KIND: RgCellKind = RgCellKind::Texture;

    fn collect_physical(&self, element: Option<usize>, out: &mut Vec<RgPhysicalId>) -> RgResult<()> {
        check_single_element(element)?;
        out.push(RgPhysicalId::Image(self.image));
        Ok(())
    }

    fn collect_all_physical(&self, out: &mut Vec<RgPhysicalId>) {
        out.push(RgPhysicalId::Image(self.image));
    }

    slot_conversions!(Texture);
}

impl RgCellPayload for RgTextureArray {
    const KIND: RgCellKind = RgCellKind::TextureArray;

    fn collect_physical(&self, element: Option<usize>, out: &mut Vec<RgPhysicalId>) -> RgResult<()> {
        match element {
            Some(index) => out.push(RgPhysicalId::Image(self.get(index)?.image)),
            None => out.extend(self.active().iter().map(|texture| RgPhysicalId::Image(texture.image))),
        }
        Ok(())
    }

    fn collect_all_physical(&self, out: &mut Vec<RgPhysicalId>) {
        out.extend(self.textures.iter().map(|texture| RgPhysicalId::Image(texture.image)));
    }

    slot_conversions!(TextureArray);
}

impl RgCellPayload for RgBuffer {
    const KIND: RgCellKind = RgCellKind::Buffer;

    fn collect_physical(&self, element: Option<usize>, out: &mut Vec<RgPhysicalId>) -> RgResult<()> {
        check_single_element(element)?;
        out.push(RgPhysicalId::Buffer(self.buffer));
        Ok(())
    }

    fn collect_all_physical(&self, out: &mut Vec<RgPhysicalId>) {
        out.push(RgPhysicalId::Buffer(self.buffer));
    }

    slot_conversions!(Buffer);
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    fn images(count: usize) -> (SlotMap<GfxImageHandle, ()>, Vec<RgTexture>) {
        let mut sm = SlotMap::with_key();
        let textures = (0..count).map(|_| RgTexture::new(sm.insert(()))).collect();
        (sm, textures)
    }

    #[test]
    fn test_active_count_is_bounded_by_capacity() {
        let (_sm, textures) = images(4);
        let mut array = RgTextureArray::new(textures);
        assert_eq!(array.active_count(), 4);

        array.set_active_count(2).unwrap();
        assert_eq!(array.active().len(), 2);
        assert_eq!(array.capacity(), 4);

        let err = array.set_active_count(5).unwrap_err();
        assert!(matches!(err, RgError::OutOfRange { index: 5, len: 4, .. }));
    }

    #[test]
    fn test_only_active_elements_are_collected() {
        let (_sm, textures) = images(3);
        let mut array = RgTextureArray::new(textures.clone());
        array.set_active_count(1).unwrap();

        let mut out = Vec::new();
        array.collect_physical(None, &mut out).unwrap();
        assert_eq!(out, vec![RgPhysicalId::Image(textures[0].image)]);

        // 非激活元素不能单独引用
        assert!(array.collect_physical(Some(2), &mut out).is_err());
    }

    #[test]
    fn test_single_texture_rejects_element_index() {
        let (_sm, textures) = images(1);
        let mut out = Vec::new();
        assert!(textures[0].collect_physical(Some(0), &mut out).is_ok());
        assert!(textures[0].collect_physical(Some(1), &mut out).is_err());
    }
}
