//! RenderGraph 使用的句柄
//!
//! - 物理资源句柄（`GfxImageHandle` 等）指向 registry 中登记的 GPU 对象，
//!   SlotMap 的 key 自带代际号，销毁后重新登记的资源永远不会与旧句柄相等，
//!   因此 barrier 解析器可以直接用它作为状态表的 key。
//! - `RgCellHandle<T>` 指向一个可重新绑定的 `ResourceCell<T>`。
//! - Pass 句柄只在创建它的 `RenderGraph` 中有效。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use slotmap::new_key_type;

new_key_type! {
    /// 物理 Image 句柄
    pub struct GfxImageHandle;
    /// 物理 Buffer 句柄
    pub struct GfxBufferHandle;
    /// 物理 Sampler 句柄
    pub struct GfxSamplerHandle;
    /// 类型擦除的 ResourceCell key
    pub struct RgCellKey;
}

/// 强类型的 ResourceCell 句柄
///
/// 泛型 `T` 表示 cell 中每个 frame slot 存放的资源类型。
pub struct RgCellHandle<T> {
    pub(crate) key: RgCellKey,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T> RgCellHandle<T> {
    #[inline]
    pub(crate) fn new(key: RgCellKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn key(&self) -> RgCellKey {
        self.key
    }
}

impl<T> Clone for RgCellHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RgCellHandle<T> {}

impl<T> PartialEq for RgCellHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for RgCellHandle<T> {}

impl<T> Hash for RgCellHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<T> fmt::Debug for RgCellHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RgCell({:?})", self.key)
    }
}

/// 类型擦除的 Pass 句柄（graph 内部的下标）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgPassHandle(pub(crate) u32);

impl RgPassHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Graphics Pass 句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgGraphicsPassHandle(pub(crate) RgPassHandle);

/// Compute Pass 句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgComputePassHandle(pub(crate) RgPassHandle);

impl From<RgGraphicsPassHandle> for RgPassHandle {
    fn from(handle: RgGraphicsPassHandle) -> Self {
        handle.0
    }
}

impl From<RgComputePassHandle> for RgPassHandle {
    fn from(handle: RgComputePassHandle) -> Self {
        handle.0
    }
}
