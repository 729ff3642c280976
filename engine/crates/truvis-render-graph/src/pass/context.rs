//! Pass 执行回调拿到的上下文
//!
//! 录制状态机：Idle -> start_recording -> Recording -> end_recording -> Idle。
//! Recording 期间必须先 resolve_barriers 才能 draw / dispatch；
//! Graphics Pass 的 draw 还需要在 start_rendering / end_rendering 之间。

use std::marker::PhantomData;

use ash::vk;

use crate::barrier::RgBarrierResolver;
use crate::command::recorder::{RgCommandRecorder, RgImageBlit};
use crate::command::rendering::RgRenderingInfo;
use crate::error::{RgError, RgResult};
use crate::handles::GfxImageHandle;
use crate::pass::dependency::RgDependency;
use crate::pass::pass::{RgPassCore, RgRecordingScope};
use crate::resources::payload::RgCellPayload;
use crate::resources::registry::RgResourceRegistry;
use crate::settings::RgGraphSettings;

/// 一次 `RenderGraph::execute` 中所有 Pass 共享的环境
pub(crate) struct RgPassEnv<'a> {
    pub frame_index: usize,
    pub registry: &'a RgResourceRegistry,
    pub resolver: &'a mut RgBarrierResolver,
    pub recorder: &'a mut dyn RgCommandRecorder,
    pub settings: &'a RgGraphSettings,
}

pub struct RgGraphicsKind;
pub struct RgComputeKind;

pub struct RgPassContext<'a, K> {
    core: &'a mut RgPassCore,
    env: RgPassEnv<'a>,
    /// 本次录制中 resolve_barriers 生成的 barrier 数量
    barrier_count: usize,
    _kind: PhantomData<K>,
}

pub type RgGraphicsPassContext<'a> = RgPassContext<'a, RgGraphicsKind>;
pub type RgComputePassContext<'a> = RgPassContext<'a, RgComputeKind>;

// new & init
impl<'a, K> RgPassContext<'a, K> {
    pub(crate) fn new(core: &'a mut RgPassCore, env: RgPassEnv<'a>) -> Self {
        Self {
            core,
            env,
            barrier_count: 0,
            _kind: PhantomData,
        }
    }
}

// getters
impl<'a, K> RgPassContext<'a, K> {
    #[inline]
    pub fn frame_index(&self) -> usize {
        self.env.frame_index
    }

    #[inline]
    pub fn pass_name(&self) -> &str {
        self.core.name()
    }

    #[inline]
    pub fn registry(&self) -> &'a RgResourceRegistry {
        self.env.registry
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.core.is_recording()
    }

    pub fn dependency(&self, name: &str) -> RgResult<&RgDependency> {
        self.core.dependency(name)
    }

    /// 回调中重新绑定依赖，需要在 resolve_barriers 之前完成才会影响本帧的 barrier
    pub fn dependency_mut(&mut self, name: &str) -> RgResult<&mut RgDependency> {
        if self.core.recording.is_some_and(|scope| scope.barriers_resolved) {
            log::warn!(
                "pass `{}`: dependency `{name}` modified after resolve_barriers, takes effect next frame",
                self.core.name()
            );
        }
        self.core.dependency_mut(name)
    }

    /// 取得依赖在当前帧绑定的资源
    pub fn resolve<T: RgCellPayload>(&self, name: &str) -> RgResult<&'a T> {
        self.core
            .dependency(name)?
            .resolve(self.core.name(), self.env.registry, self.env.frame_index)
    }
}

// state checks
impl<K> RgPassContext<'_, K> {
    fn scope(&self, op: &'static str) -> RgResult<RgRecordingScope> {
        self.core.recording.ok_or_else(|| RgError::NotRecording {
            pass: self.core.name().to_string(),
            op,
        })
    }

    fn scope_mut(&mut self, op: &'static str) -> RgResult<&mut RgRecordingScope> {
        let pass = self.core.name().to_string();
        self.core.recording.as_mut().ok_or(RgError::NotRecording { pass, op })
    }

    fn require_resolved(&self, op: &'static str) -> RgResult<RgRecordingScope> {
        let scope = self.scope(op)?;
        if !scope.barriers_resolved {
            return Err(RgError::BarriersNotResolved {
                pass: self.core.name().to_string(),
                op,
            });
        }
        Ok(scope)
    }
}

// recording
impl<K> RgPassContext<'_, K> {
    /// 使用 graph 当前的 frame index 开始录制
    pub fn start_recording(&mut self) -> RgResult<()> {
        if self.core.is_recording() {
            return Err(RgError::ReentrantRecording {
                pass: self.core.name().to_string(),
            });
        }
        let frame_index = self.env.frame_index;
        if frame_index >= self.core.frames_in_flight() {
            return Err(RgError::out_of_range(
                format!("frame index of pass `{}`", self.core.name()),
                frame_index,
                self.core.frames_in_flight(),
            ));
        }

        self.env.recorder.begin_pass(frame_index)?;
        if self.env.settings.debug_labels {
            self.env.recorder.begin_label(self.core.name());
        }
        self.core.recording = Some(RgRecordingScope {
            frame_index,
            barriers_resolved: false,
            rendering: false,
        });
        Ok(())
    }

    /// 每次录制必须且只能调用一次，返回本次插入的 barrier 数量
    pub fn resolve_barriers(&mut self) -> RgResult<usize> {
        let scope = self.scope("resolve_barriers")?;
        if scope.barriers_resolved {
            return Err(RgError::BarriersAlreadyResolved {
                pass: self.core.name().to_string(),
            });
        }

        let count = self
            .env
            .resolver
            .resolve(self.core, scope.frame_index, self.env.registry, &mut *self.env.recorder)?;
        self.scope_mut("resolve_barriers")?.barriers_resolved = true;
        self.barrier_count += count;
        Ok(count)
    }

    pub fn end_recording(&mut self) -> RgResult<()> {
        let scope = self.scope("end_recording")?;
        if scope.rendering {
            return Err(RgError::RenderingStillActive {
                pass: self.core.name().to_string(),
            });
        }
        if !scope.barriers_resolved && self.core.dependency_count() > 0 {
            log::warn!("pass `{}` ended its recording without resolving barriers", self.core.name());
        }

        self.close_scope(scope);
        Ok(())
    }

    fn close_scope(&mut self, scope: RgRecordingScope) {
        if scope.rendering {
            self.env.recorder.end_rendering();
        }
        if self.env.settings.debug_labels {
            self.env.recorder.end_label();
        }
        self.env.recorder.end_pass();
        self.core.recording = None;
    }

    /// 回调返回后由 graph 调用：仍在录制的 Pass 会被强制关闭，
    /// 下一帧可以重新 start_recording
    pub(crate) fn finish(&mut self, result: RgResult<()>) -> RgResult<usize> {
        let open_scope = self.core.recording;
        if let Some(scope) = open_scope {
            self.close_scope(scope);
        }
        result?;
        if open_scope.is_some() {
            return Err(RgError::RecordingNotClosed {
                pass: self.core.name().to_string(),
            });
        }
        Ok(self.barrier_count)
    }
}

// shared commands
impl<K> RgPassContext<'_, K> {
    pub fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RgResult<()> {
        self.scope("push_constants")?;
        self.env.recorder.push_constants(layout, stages, offset, data);
        Ok(())
    }

    /// 整张图像的 blit；两者的 layout 由依赖的 TransferSrc / TransferDst 保证
    pub fn blit_image(&mut self, src: GfxImageHandle, dst: GfxImageHandle) -> RgResult<()> {
        let scope = self.require_resolved("blit_image")?;
        if scope.rendering {
            return Err(RgError::RenderingAlreadyActive {
                pass: self.core.name().to_string(),
            });
        }
        let src = self.env.registry.get_image(src)?;
        let dst = self.env.registry.get_image(dst)?;
        self.env.recorder.blit_image(&RgImageBlit {
            src_image: src.vk_image,
            src_extent: src.extent,
            dst_image: dst.vk_image,
            dst_extent: dst.extent,
            aspect: src.aspect(),
        });
        Ok(())
    }

    fn bind_pipeline_at(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) -> RgResult<()> {
        self.scope("bind_pipeline")?;
        self.env.recorder.bind_pipeline(bind_point, pipeline);
        Ok(())
    }

    fn bind_descriptor_sets_at(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) -> RgResult<()> {
        self.scope("bind_descriptor_sets")?;
        self.env.recorder.bind_descriptor_sets(bind_point, layout, first_set, descriptor_sets);
        Ok(())
    }
}

// graphics
impl RgGraphicsPassContext<'_> {
    /// 开始 dynamic rendering，必须在 resolve_barriers 之后（附件的 layout 由 barrier 保证）
    pub fn start_rendering(&mut self, info: &RgRenderingInfo) -> RgResult<()> {
        let scope = self.require_resolved("start_rendering")?;
        if scope.rendering {
            return Err(RgError::RenderingAlreadyActive {
                pass: self.core.name().to_string(),
            });
        }

        let resolved = info.resolve(self.core.name(), self.env.registry)?;
        self.env.recorder.begin_rendering(&resolved);
        self.scope_mut("start_rendering")?.rendering = true;
        Ok(())
    }

    pub fn end_rendering(&mut self) -> RgResult<()> {
        let scope = self.scope("end_rendering")?;
        if !scope.rendering {
            return Err(RgError::NotRendering {
                pass: self.core.name().to_string(),
                op: "end_rendering",
            });
        }
        self.env.recorder.end_rendering();
        self.scope_mut("end_rendering")?.rendering = false;
        Ok(())
    }

    pub fn set_cull_mode(&mut self, cull_mode: vk::CullModeFlags) -> RgResult<()> {
        self.scope("set_cull_mode")?;
        self.env.recorder.set_cull_mode(cull_mode);
        Ok(())
    }

    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) -> RgResult<()> {
        self.bind_pipeline_at(vk::PipelineBindPoint::GRAPHICS, pipeline)
    }

    pub fn bind_descriptor_sets(
        &mut self,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) -> RgResult<()> {
        self.bind_descriptor_sets_at(vk::PipelineBindPoint::GRAPHICS, layout, first_set, descriptor_sets)
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> RgResult<()> {
        let scope = self.require_resolved("draw_indexed")?;
        if !scope.rendering {
            return Err(RgError::NotRendering {
                pass: self.core.name().to_string(),
                op: "draw_indexed",
            });
        }
        self.env.recorder.draw_indexed(index_count, instance_count);
        Ok(())
    }
}

// compute
impl RgComputePassContext<'_> {
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) -> RgResult<()> {
        self.bind_pipeline_at(vk::PipelineBindPoint::COMPUTE, pipeline)
    }

    pub fn bind_descriptor_sets(
        &mut self,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
    ) -> RgResult<()> {
        self.bind_descriptor_sets_at(vk::PipelineBindPoint::COMPUTE, layout, first_set, descriptor_sets)
    }

    pub fn dispatch(&mut self, group_x: u32, group_y: u32, group_z: u32) -> RgResult<()> {
        self.require_resolved("dispatch")?;
        self.env.recorder.dispatch(group_x, group_y, group_z);
        Ok(())
    }
}
