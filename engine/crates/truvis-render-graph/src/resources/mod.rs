//! 资源层
//!
//! - `physical`: 外部创建、登记到 registry 的 GPU 对象（graph 只保存和转换它们）
//! - `payload`: cell 中每个 frame slot 存放的资源类型
//! - `resource_cell`: 按 frame in flight 索引、可整体替换的 `ResourceCell<T>`
//! - `registry`: 物理资源和 cell 的 SlotMap 仓库

pub mod payload;
pub mod physical;
pub mod registry;
pub mod resource_cell;
