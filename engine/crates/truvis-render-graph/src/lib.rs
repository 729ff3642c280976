//! 按声明顺序执行的渲染图
//!
//! 管线代码在初始化时创建 Pass 并声明依赖（绑定到 `ResourceCell`），
//! 每帧重新绑定变化的资源、设置 execute 回调，然后调用 [`graph::RenderGraph::execute`]。
//! 每个 Pass 在 `resolve_barriers` 时由 [`barrier::RgBarrierResolver`] 比较资源的
//! 目标状态与记录的状态，只在两者不同时插入 barrier。
//!
//! # 使用示例
//! ```ignore
//! let color = registry.create_cell("color", color_textures);
//!
//! let mut forward = RgGraphicsPass::new("forward", fif_count)?;
//! forward.add_dependencies([RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)])?;
//! let forward = graph.add_graphics_pass(forward);
//! graph.set_target_pass(forward)?;
//!
//! // 每帧
//! graph.graphics_pass_mut(forward)?.set_execute_callback(move |ctx| {
//!     ctx.start_recording()?;
//!     ctx.resolve_barriers()?;
//!     let target = RgRenderTarget::color_only(ctx.resolve::<RgTexture>("color")?.image);
//!     ctx.start_rendering(&RgRenderingInfo::new(target, width, height))?;
//!     ctx.draw_indexed(index_count, 1)?;
//!     ctx.end_rendering()?;
//!     ctx.end_recording()
//! });
//! graph.execute(frame_index, &registry, &mut recorder)?;
//! ```

pub mod barrier;
pub mod command;
pub mod error;
pub mod frame_counter;
pub mod graph;
pub mod handles;
pub mod interface;
pub mod pass;
pub mod resources;
pub mod settings;
pub mod state;
