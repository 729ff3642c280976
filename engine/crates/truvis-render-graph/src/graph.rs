//! RenderGraph
//!
//! 按声明顺序依次执行 Pass，不做任何依赖排序；执行到 target pass 为止。
//! 同一次 execute 中，Pass N+1 的 barrier 解析总是看到 Pass N 留下的状态。

use std::fmt::Write;

use itertools::Itertools;

use crate::barrier::RgBarrierResolver;
use crate::command::recorder::RgCommandRecorder;
use crate::error::{RgError, RgResult};
use crate::handles::{RgComputePassHandle, RgGraphicsPassHandle, RgPassHandle};
use crate::pass::context::{RgComputePassContext, RgGraphicsPassContext, RgPassEnv};
use crate::pass::pass::{RgComputePass, RgGraphicsPass, RgPass};
use crate::resources::registry::RgResourceRegistry;
use crate::settings::RgGraphSettings;
use crate::state::access::RgAccessTable;

/// 一个 Pass 在本帧的执行结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgPassReport {
    pub name: String,
    pub kind: &'static str,
    pub barrier_count: usize,
}

/// `RenderGraph::execute` 的返回值
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgFrameReport {
    pub frame_index: usize,
    /// 按执行顺序
    pub passes: Vec<RgPassReport>,
    /// 本帧没有设置回调而被跳过的 Pass
    pub skipped: Vec<String>,
}

impl RgFrameReport {
    #[inline]
    pub fn barrier_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.barrier_count).sum()
    }

    pub fn pass(&self, name: &str) -> Option<&RgPassReport> {
        self.passes.iter().find(|pass| pass.name == name)
    }

    /// 各 Pass 的 barrier 数量，按执行顺序
    pub fn barrier_counts(&self) -> Vec<usize> {
        self.passes.iter().map(|pass| pass.barrier_count).collect()
    }
}

pub struct RenderGraph {
    passes: Vec<RgPass>,
    target_pass: Option<RgPassHandle>,
    resolver: RgBarrierResolver,
    settings: RgGraphSettings,
}

// new & init
impl RenderGraph {
    pub fn new(settings: RgGraphSettings) -> Self {
        Self::with_access_table(settings, RgAccessTable::standard())
    }

    /// 使用自定义访问表
    pub fn with_access_table(settings: RgGraphSettings, access_table: RgAccessTable) -> Self {
        Self {
            passes: Vec::new(),
            target_pass: None,
            resolver: RgBarrierResolver::new(access_table, settings.validate_access_order),
            settings,
        }
    }

    /// 按顺序追加，不做去重
    pub fn add_passes(&mut self, passes: impl IntoIterator<Item = RgPass>) -> Vec<RgPassHandle> {
        passes.into_iter().map(|pass| self.push_pass(pass)).collect()
    }

    pub fn add_graphics_pass(&mut self, pass: RgGraphicsPass) -> RgGraphicsPassHandle {
        RgGraphicsPassHandle(self.push_pass(pass.into()))
    }

    pub fn add_compute_pass(&mut self, pass: RgComputePass) -> RgComputePassHandle {
        RgComputePassHandle(self.push_pass(pass.into()))
    }

    fn push_pass(&mut self, pass: RgPass) -> RgPassHandle {
        let handle = RgPassHandle(self.passes.len() as u32);
        log::info!(
            "render graph: add {} pass `{}` ({} dependencies) at #{}",
            pass.kind_name(),
            pass.core().name(),
            pass.core().dependency_count(),
            handle.index()
        );
        self.passes.push(pass);
        handle
    }

    /// 设置本帧执行到哪个 Pass 为止
    pub fn set_target_pass(&mut self, handle: impl Into<RgPassHandle>) -> RgResult<()> {
        let handle = handle.into();
        let pass = self.pass(handle)?;
        log::info!("render graph: target pass -> `{}`", pass.core().name());
        self.target_pass = Some(handle);
        Ok(())
    }
}

// getters
impl RenderGraph {
    pub fn pass(&self, handle: impl Into<RgPassHandle>) -> RgResult<&RgPass> {
        let handle = handle.into();
        self.passes.get(handle.index()).ok_or(RgError::PassNotFound(handle.index()))
    }

    pub fn graphics_pass_mut(&mut self, handle: RgGraphicsPassHandle) -> RgResult<&mut RgGraphicsPass> {
        match self.passes.get_mut(handle.0.index()) {
            Some(RgPass::Graphics(pass)) => Ok(pass),
            Some(RgPass::Compute(pass)) => Err(RgError::PassKindMismatch {
                pass: pass.name().to_string(),
                expected: "graphics",
                found: "compute",
            }),
            None => Err(RgError::PassNotFound(handle.0.index())),
        }
    }

    pub fn compute_pass_mut(&mut self, handle: RgComputePassHandle) -> RgResult<&mut RgComputePass> {
        match self.passes.get_mut(handle.0.index()) {
            Some(RgPass::Compute(pass)) => Ok(pass),
            Some(RgPass::Graphics(pass)) => Err(RgError::PassKindMismatch {
                pass: pass.name().to_string(),
                expected: "compute",
                found: "graphics",
            }),
            None => Err(RgError::PassNotFound(handle.0.index())),
        }
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn target_pass(&self) -> Option<RgPassHandle> {
        self.target_pass
    }

    #[inline]
    pub fn resolver(&self) -> &RgBarrierResolver {
        &self.resolver
    }

    #[inline]
    pub fn resolver_mut(&mut self) -> &mut RgBarrierResolver {
        &mut self.resolver
    }

    #[inline]
    pub fn settings(&self) -> &RgGraphSettings {
        &self.settings
    }
}

// execute
impl RenderGraph {
    /// 按声明顺序执行各 Pass 的回调，直到 target pass
    ///
    /// 没有设置回调的 Pass 本帧被跳过。任何错误都会中止本帧并返回给调用者。
    pub fn execute(
        &mut self,
        frame_index: usize,
        registry: &RgResourceRegistry,
        recorder: &mut dyn RgCommandRecorder,
    ) -> RgResult<RgFrameReport> {
        // 没有运行中的 tracy client 时不记录
        #[cfg(feature = "profiling")]
        let _span = tracy_client::Client::running()
            .map(|client| client.span_alloc(Some("RenderGraph::execute"), "RenderGraph::execute", file!(), line!(), 0));

        self.resolver.prune(registry);
        self.resolver.sync_cells(registry);

        let end = self.target_pass.map_or(self.passes.len(), |target| target.index() + 1);
        let mut report = RgFrameReport {
            frame_index,
            ..Default::default()
        };

        for pass in &mut self.passes[..end] {
            let name = pass.core().name().to_string();
            let kind = pass.kind_name();

            #[cfg(feature = "profiling")]
            let _pass_span = tracy_client::Client::running()
                .map(|client| client.span_alloc(Some(&name), "RenderGraph::execute", file!(), line!(), 0));

            let env = RgPassEnv {
                frame_index,
                registry,
                resolver: &mut self.resolver,
                recorder: &mut *recorder,
                settings: &self.settings,
            };

            let barrier_count = match pass {
                RgPass::Graphics(pass) => {
                    let Some(callback) = pass.take_callback() else {
                        log::debug!("pass `{name}` has no callback this frame, skipped");
                        report.skipped.push(name);
                        continue;
                    };
                    let mut ctx = RgGraphicsPassContext::new(&mut **pass, env);
                    let result = callback(&mut ctx);
                    ctx.finish(result)?
                }
                RgPass::Compute(pass) => {
                    let Some(callback) = pass.take_callback() else {
                        log::debug!("pass `{name}` has no callback this frame, skipped");
                        report.skipped.push(name);
                        continue;
                    };
                    let mut ctx = RgComputePassContext::new(&mut **pass, env);
                    let result = callback(&mut ctx);
                    ctx.finish(result)?
                }
            };

            report.passes.push(RgPassReport {
                name,
                kind,
                barrier_count,
            });
        }

        if end < self.passes.len() {
            log::trace!("render graph: {} passes after the target were not executed", self.passes.len() - end);
        }
        Ok(report)
    }
}

// debug
impl RenderGraph {
    /// 声明顺序、target 和各依赖的绑定情况
    pub fn execution_plan(&self, registry: &RgResourceRegistry) -> String {
        let target = self.target_pass.and_then(|target| self.passes.get(target.index()));
        let mut plan = String::new();

        let _ = writeln!(plan, "╔══════════════════════════════════════════════════════════════════╗");
        let _ = writeln!(plan, "║              RenderGraph Execution Plan                          ║");
        let _ = writeln!(plan, "╠══════════════════════════════════════════════════════════════════╣");
        let _ = writeln!(
            plan,
            "║ Total Passes: {}  |  Target: {}  |  Order: [{}]",
            self.passes.len(),
            target.map_or("<none>", |pass| pass.core().name()),
            self.passes.iter().map(|pass| pass.core().name()).join(" → ")
        );
        let _ = writeln!(plan, "╚══════════════════════════════════════════════════════════════════╝");

        for (order, pass) in self.passes.iter().enumerate() {
            let core = pass.core();
            let _ = writeln!(
                plan,
                "[{}/{}] {} pass \"{}\" (frames in flight: {})",
                order + 1,
                self.passes.len(),
                pass.kind_name(),
                core.name(),
                core.frames_in_flight()
            );
            for dependency in core.dependencies() {
                let binding = match dependency.binding() {
                    None => "<unbound>".to_string(),
                    Some(binding) => {
                        let cell = registry.slot(binding.cell).map_or("<removed>", |slot| slot.name());
                        match binding.element {
                            Some(element) => format!("`{cell}`[{element}]"),
                            None => format!("`{cell}`"),
                        }
                    }
                };
                let _ = writeln!(plan, "    - {:<16} {:?} -> {}", dependency.name(), dependency.access(), binding);
            }
        }
        plan
    }

    pub fn log_execution_plan(&self, registry: &RgResourceRegistry) {
        for line in self.execution_plan(registry).lines() {
            log::info!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::command::recorder::{HeadlessRecorder, RgCommand};
    use crate::command::rendering::{RgRenderTarget, RgRenderingInfo};
    use crate::error::RgErrorCategory;
    use crate::handles::{GfxImageHandle, RgCellHandle};
    use crate::pass::dependency::RgDependency;
    use crate::resources::payload::RgTexture;
    use crate::resources::physical::RgPhysicalImage;
    use crate::state::access::RgAccessKind;
    use crate::state::resource_state::RgImageState;

    /// 每个用例都从这里创建 graph，顺便初始化日志
    fn settings() -> RgGraphSettings {
        truvis_crate_tools::init_log::init_test_log();
        RgGraphSettings {
            validate_access_order: true,
            debug_labels: false,
        }
    }

    fn image(registry: &mut RgResourceRegistry, name: &str) -> GfxImageHandle {
        registry.register_image(RgPhysicalImage::new(
            name,
            vk::Image::null(),
            vk::ImageView::null(),
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Extent2D { width: 64, height: 64 },
        ))
    }

    fn texture_cell(registry: &mut RgResourceRegistry, name: &str, frames: usize) -> RgCellHandle<RgTexture> {
        let textures: Vec<_> = (0..frames).map(|i| RgTexture::new(image(registry, &format!("{name}{i}")))).collect();
        registry.create_cell(name, textures)
    }

    fn graphics_pass(name: &str, dependencies: Vec<RgDependency>) -> RgGraphicsPass {
        let mut pass = RgGraphicsPass::new(name, 2).unwrap();
        pass.add_dependencies(dependencies).unwrap();
        pass
    }

    fn compute_pass(name: &str, dependencies: Vec<RgDependency>) -> RgComputePass {
        let mut pass = RgComputePass::new(name, 2).unwrap();
        pass.add_dependencies(dependencies).unwrap();
        pass
    }

    /// start -> resolve -> end
    fn arm_graphics(graph: &mut RenderGraph, handle: RgGraphicsPassHandle) {
        graph.graphics_pass_mut(handle).unwrap().set_execute_callback(|ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            ctx.end_recording()
        });
    }

    fn arm_compute(graph: &mut RenderGraph, handle: RgComputePassHandle) {
        graph.compute_pass_mut(handle).unwrap().set_execute_callback(|ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            ctx.dispatch(8, 8, 1)?;
            ctx.end_recording()
        });
    }

    #[test]
    fn test_write_compute_read_fragment_read() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 2);
        let mut graph = RenderGraph::new(settings());

        let write = graph.add_graphics_pass(graphics_pass(
            "write",
            vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)],
        ));
        let compute = graph.add_compute_pass(compute_pass(
            "compute",
            vec![RgDependency::bound("color", RgAccessKind::ComputeRead, color)],
        ));
        let read_a = graph.add_graphics_pass(graphics_pass(
            "read_a",
            vec![RgDependency::bound("color", RgAccessKind::FragmentRead, color)],
        ));
        let read_b = graph.add_graphics_pass(graphics_pass(
            "read_b",
            vec![RgDependency::bound("color", RgAccessKind::FragmentRead, color)],
        ));
        graph.set_target_pass(read_b).unwrap();

        let mut recorder = HeadlessRecorder::new();
        for frame in [0, 1, 0] {
            arm_graphics(&mut graph, write);
            arm_compute(&mut graph, compute);
            arm_graphics(&mut graph, read_a);
            arm_graphics(&mut graph, read_b);
            let report = graph.execute(frame, &registry, &mut recorder).unwrap();
            // 写入 -> 计算读 -> 片段读 各一个，重复的片段读不需要 barrier
            assert_eq!(report.barrier_counts(), vec![1, 1, 1, 0], "frame {frame}");
        }

        let frame0 = registry.cell(color).unwrap().get(0).unwrap().image;
        assert_eq!(graph.resolver().image_state(frame0), Some(RgImageState::SHADER_READ_FRAGMENT));
        assert_eq!(recorder.draw_count(), 3);
    }

    #[test]
    fn test_frame_index_beyond_frames_in_flight() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 3);
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)],
        ));

        arm_graphics(&mut graph, pass);
        let err = graph.execute(2, &registry, &mut HeadlessRecorder::new()).unwrap_err();
        assert_eq!(err.category(), RgErrorCategory::OutOfRange);
    }

    #[test]
    fn test_cell_shorter_than_pass_frames() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 1);
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)],
        ));

        arm_graphics(&mut graph, pass);
        let err = graph.execute(0, &registry, &mut HeadlessRecorder::new()).unwrap_err();
        assert!(matches!(err, RgError::OutOfRange { len: 1, .. }));
    }

    #[test]
    fn test_unbound_dependency_then_bind() {
        let mut registry = RgResourceRegistry::new();
        let shadow = texture_cell(&mut registry, "shadow", 2);
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::new("shadow", RgAccessKind::FragmentRead)],
        ));
        let mut recorder = HeadlessRecorder::new();

        arm_graphics(&mut graph, pass);
        let err = graph.execute(0, &registry, &mut recorder).unwrap_err();
        assert!(matches!(err, RgError::UnboundDependency { .. }));
        assert_eq!(graph.resolver().tracked_count(), 0);

        // 失败的 Pass 被关闭，下一帧可以继续使用
        assert!(!graph.pass(pass).unwrap().core().is_recording());
        graph.graphics_pass_mut(pass).unwrap().dependency_mut("shadow").unwrap().bind(shadow);
        arm_graphics(&mut graph, pass);
        assert_eq!(graph.execute(0, &registry, &mut recorder).unwrap().barrier_count(), 1);
    }

    #[test]
    fn test_rebind_takes_effect_next_frame() {
        let mut registry = RgResourceRegistry::new();
        let a = texture_cell(&mut registry, "a", 2);
        let b = texture_cell(&mut registry, "b", 2);
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("target", RgAccessKind::RenderTargetWrite, a)],
        ));
        let mut recorder = HeadlessRecorder::new();

        arm_graphics(&mut graph, pass);
        graph.execute(0, &registry, &mut recorder).unwrap();
        let a0 = registry.cell(a).unwrap().get(0).unwrap().image;
        let b0 = registry.cell(b).unwrap().get(0).unwrap().image;
        assert_eq!(graph.resolver().image_state(b0), None);

        // 绑定到同一个 cell：没有任何变化
        assert!(!graph.graphics_pass_mut(pass).unwrap().dependency_mut("target").unwrap().bind(a));
        arm_graphics(&mut graph, pass);
        assert_eq!(graph.execute(0, &registry, &mut recorder).unwrap().barrier_count(), 0);

        assert!(graph.graphics_pass_mut(pass).unwrap().dependency_mut("target").unwrap().bind(b));
        arm_graphics(&mut graph, pass);
        assert_eq!(graph.execute(0, &registry, &mut recorder).unwrap().barrier_count(), 1);
        assert_eq!(graph.resolver().image_state(a0), Some(RgImageState::COLOR_ATTACHMENT_WRITE));
        assert_eq!(graph.resolver().image_state(b0), Some(RgImageState::COLOR_ATTACHMENT_WRITE));
    }

    #[test]
    fn test_rebound_cell_restarts_from_undefined() {
        let mut registry = RgResourceRegistry::new();
        let target = texture_cell(&mut registry, "target", 2);
        let original = registry.cell(target).unwrap().frames().to_vec();
        let replacement: Vec<_> = (0..2).map(|i| RgTexture::new(image(&mut registry, &format!("other{i}")))).collect();
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("target", RgAccessKind::RenderTargetWrite, target)],
        ));
        let mut recorder = HeadlessRecorder::new();

        arm_graphics(&mut graph, pass);
        assert_eq!(graph.execute(0, &registry, &mut recorder).unwrap().barrier_count(), 1);

        assert!(registry.rebind_cell(target, replacement.clone()).unwrap());
        arm_graphics(&mut graph, pass);
        assert_eq!(graph.execute(0, &registry, &mut recorder).unwrap().barrier_count(), 1);
        // 被换走的图像不再保留旧状态
        assert_eq!(graph.resolver().image_state(original[0].image), None);
        assert_eq!(
            graph.resolver().image_state(replacement[0].image),
            Some(RgImageState::COLOR_ATTACHMENT_WRITE)
        );

        // 换回原来的图像，仍然从 UNDEFINED 开始
        assert!(registry.rebind_cell(target, original.clone()).unwrap());
        arm_graphics(&mut graph, pass);
        let report = graph.execute(0, &registry, &mut recorder).unwrap();
        assert_eq!(report.barrier_count(), 1);
        assert_eq!(graph.resolver().image_state(replacement[0].image), None);
    }

    #[test]
    fn test_removed_cell_forgets_snapshot() {
        let mut registry = RgResourceRegistry::new();
        let target = texture_cell(&mut registry, "target", 2);
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("target", RgAccessKind::RenderTargetWrite, target)],
        ));
        let mut recorder = HeadlessRecorder::new();

        arm_graphics(&mut graph, pass);
        graph.execute(0, &registry, &mut recorder).unwrap();
        assert!(registry.remove_cell(target).is_some());

        arm_graphics(&mut graph, pass);
        let err = graph.execute(0, &registry, &mut recorder).unwrap_err();
        assert!(matches!(err, RgError::StaleCell { .. }));
    }

    #[test]
    fn test_execution_stops_after_target() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 2);
        let mut graph = RenderGraph::new(settings());
        let handles = graph.add_passes([
            graphics_pass("first", vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)]).into(),
            graphics_pass("present", vec![RgDependency::bound("color", RgAccessKind::Present, color)]).into(),
            compute_pass("after", vec![]).into(),
        ]);
        graph.set_target_pass(handles[1]).unwrap();

        arm_graphics(&mut graph, RgGraphicsPassHandle(handles[0]));
        arm_graphics(&mut graph, RgGraphicsPassHandle(handles[1]));
        arm_compute(&mut graph, RgComputePassHandle(handles[2]));

        let report = graph.execute(1, &registry, &mut HeadlessRecorder::new()).unwrap();
        assert_eq!(report.passes.iter().map(|pass| pass.name.as_str()).collect_vec(), vec!["first", "present"]);
        assert!(report.pass("after").is_none());
    }

    #[test]
    fn test_pass_without_callback_is_skipped() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 2);
        let mut graph = RenderGraph::new(settings());
        let write = graph.add_graphics_pass(graphics_pass(
            "write",
            vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)],
        ));
        let _idle = graph.add_graphics_pass(graphics_pass("idle", vec![]));

        arm_graphics(&mut graph, write);
        let report = graph.execute(0, &registry, &mut HeadlessRecorder::new()).unwrap();
        assert_eq!(report.skipped, vec!["idle".to_string()]);

        // 回调在执行后被消耗
        let report = graph.execute(0, &registry, &mut HeadlessRecorder::new()).unwrap();
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_reentrant_recording() {
        let registry = RgResourceRegistry::new();
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_compute_pass(compute_pass("post", vec![]));

        graph.compute_pass_mut(pass).unwrap().set_execute_callback(|ctx| {
            ctx.start_recording()?;
            ctx.start_recording()
        });
        let err = graph.execute(0, &registry, &mut HeadlessRecorder::new()).unwrap_err();
        assert_eq!(err.category(), RgErrorCategory::ReentrantRecording);

        arm_compute(&mut graph, pass);
        assert!(graph.execute(0, &registry, &mut HeadlessRecorder::new()).is_ok());
    }

    #[test]
    fn test_recording_state_machine() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 2);
        let mut graph = RenderGraph::new(settings());
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)],
        ));

        let run = |graph: &mut RenderGraph,
                   callback: fn(&mut RgGraphicsPassContext<'_>) -> RgResult<()>|
         -> RgError {
            graph.graphics_pass_mut(pass).unwrap().set_execute_callback(callback);
            graph.execute(0, &registry, &mut HeadlessRecorder::new()).unwrap_err()
        };

        let err = run(&mut graph, |ctx| ctx.resolve_barriers().map(|_| ()));
        assert!(matches!(err, RgError::NotRecording { op: "resolve_barriers", .. }));

        let err = run(&mut graph, |ctx| {
            ctx.start_recording()?;
            ctx.draw_indexed(3, 1)
        });
        assert!(matches!(err, RgError::BarriersNotResolved { op: "draw_indexed", .. }));

        let err = run(&mut graph, |ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            ctx.resolve_barriers().map(|_| ())
        });
        assert!(matches!(err, RgError::BarriersAlreadyResolved { .. }));

        let err = run(&mut graph, |ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            ctx.draw_indexed(3, 1)
        });
        assert!(matches!(err, RgError::NotRendering { .. }));

        let err = run(&mut graph, |ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            let target = RgRenderTarget::color_only(ctx.resolve::<RgTexture>("color")?.image);
            ctx.start_rendering(&RgRenderingInfo::new(target, 64, 64))?;
            ctx.end_recording()
        });
        assert!(matches!(err, RgError::RenderingStillActive { .. }));

        let err = run(&mut graph, |ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers().map(|_| ())
        });
        assert!(matches!(err, RgError::RecordingNotClosed { .. }));
        assert!(!graph.pass(pass).unwrap().core().is_recording());
    }

    #[test]
    fn test_full_graphics_recording() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 2);
        let mut graph = RenderGraph::new(RgGraphSettings {
            validate_access_order: true,
            debug_labels: true,
        });
        let pass = graph.add_graphics_pass(graphics_pass(
            "forward",
            vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)],
        ));

        graph.graphics_pass_mut(pass).unwrap().set_execute_callback(|ctx| {
            ctx.start_recording()?;
            ctx.resolve_barriers()?;
            let target = RgRenderTarget::color_only(ctx.resolve::<RgTexture>("color")?.image);
            ctx.start_rendering(&RgRenderingInfo::new(target, 64, 64).clear_color([0.1, 0.2, 0.3, 1.0]))?;
            ctx.set_cull_mode(vk::CullModeFlags::BACK)?;
            ctx.push_constants(vk::PipelineLayout::null(), vk::ShaderStageFlags::VERTEX, 0, &[1, 2, 3, 4])?;
            ctx.draw_indexed(36, 2)?;
            ctx.end_rendering()?;
            ctx.end_recording()
        });

        let mut recorder = HeadlessRecorder::new();
        graph.execute(1, &registry, &mut recorder).unwrap();
        let commands = recorder.commands();
        assert_eq!(commands.first(), Some(&RgCommand::BeginPass { frame_index: 1 }));
        assert_eq!(commands[1], RgCommand::BeginLabel("forward".to_string()));
        assert!(matches!(commands[2], RgCommand::PipelineBarrier { .. }));
        assert!(matches!(commands[3], RgCommand::BeginRendering(_)));
        assert_eq!(
            commands[6],
            RgCommand::DrawIndexed {
                index_count: 36,
                instance_count: 2
            }
        );
        assert_eq!(&commands[7..], &[RgCommand::EndRendering, RgCommand::EndLabel, RgCommand::EndPass]);
    }

    #[test]
    fn test_handles_are_checked() {
        let mut graph = RenderGraph::new(settings());
        let compute = graph.add_compute_pass(compute_pass("post", vec![]));

        assert!(matches!(graph.set_target_pass(RgPassHandle(5)).unwrap_err(), RgError::PassNotFound(5)));
        let err = graph.graphics_pass_mut(RgGraphicsPassHandle(compute.into())).err().unwrap();
        assert!(matches!(err, RgError::PassKindMismatch { expected: "graphics", .. }));
    }

    #[test]
    fn test_execution_plan_lists_bindings() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "scene color", 2);
        let mut graph = RenderGraph::new(settings());
        let present = graph.add_graphics_pass(graphics_pass(
            "present",
            vec![
                RgDependency::bound("color", RgAccessKind::Present, color),
                RgDependency::new("overlay", RgAccessKind::FragmentRead),
            ],
        ));
        graph.set_target_pass(present).unwrap();

        let plan = graph.execution_plan(&registry);
        assert!(plan.contains("Target: present"));
        assert!(plan.contains("`scene color`"));
        assert!(plan.contains("<unbound>"));
    }
}
