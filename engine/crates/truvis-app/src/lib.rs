//! RenderGraph 的示例应用
//!
//! - `headless_renderer`：不依赖 GPU 的 `RgRenderer` 实现，记录命令流，用于演示和测试
//! - `render_pipeline`：forward + shadow 管线，每个 Pass 每帧重新设置回调

pub mod headless_renderer;
pub mod render_pipeline;
