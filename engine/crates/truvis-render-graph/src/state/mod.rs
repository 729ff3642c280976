//! 资源访问状态
//!
//! - `resource_state`: Vulkan 的 stage / access / layout 组合
//! - `access`: Pass 依赖声明的访问类型，以及访问类型到状态的映射表

pub mod access;
pub mod resource_state;
