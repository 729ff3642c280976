//! Graphics / Compute Pass
//!
//! Pass 在初始化时创建一次，依赖集合和类型之后不再变化；
//! 依赖的绑定和 execute 回调每帧由管线代码更新。

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use itertools::Itertools;

use crate::error::{RgError, RgResult};
use crate::pass::context::{RgComputePassContext, RgGraphicsPassContext};
use crate::pass::dependency::RgDependency;

/// 一次录制期间的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgRecordingScope {
    pub frame_index: usize,
    pub barriers_resolved: bool,
    pub rendering: bool,
}

/// Graphics / Compute 共用的部分
#[derive(Debug)]
pub struct RgPassCore {
    name: String,
    frames_in_flight: usize,
    /// 保持声明顺序
    dependencies: IndexMap<String, RgDependency>,
    /// `None` 表示 Idle
    pub(crate) recording: Option<RgRecordingScope>,
}

// new & init
impl RgPassCore {
    /// `frames_in_flight` 为 0 时返回 `NoFramesInFlight`
    pub fn new(name: impl Into<String>, frames_in_flight: usize) -> RgResult<Self> {
        let name = name.into();
        if frames_in_flight == 0 {
            return Err(RgError::NoFramesInFlight { pass: name });
        }
        Ok(Self {
            name,
            frames_in_flight,
            dependencies: IndexMap::new(),
            recording: None,
        })
    }

    /// 追加依赖；名字冲突时整批都不会被添加
    pub fn add_dependencies(&mut self, dependencies: impl IntoIterator<Item = RgDependency>) -> RgResult<()> {
        let dependencies = dependencies.into_iter().collect_vec();

        let duplicate = dependencies
            .iter()
            .map(RgDependency::name)
            .duplicates()
            .chain(dependencies.iter().map(RgDependency::name).filter(|name| self.dependencies.contains_key(*name)))
            .next();
        if let Some(name) = duplicate {
            return Err(RgError::DuplicateDependency {
                pass: self.name.clone(),
                name: name.to_string(),
            });
        }

        for dependency in dependencies {
            self.dependencies.insert(dependency.name().to_string(), dependency);
        }
        Ok(())
    }
}

// getters
impl RgPassCore {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn dependency(&self, name: &str) -> RgResult<&RgDependency> {
        self.dependencies.get(name).ok_or_else(|| RgError::DependencyNotFound {
            pass: self.name.clone(),
            name: name.to_string(),
        })
    }

    pub fn dependency_mut(&mut self, name: &str) -> RgResult<&mut RgDependency> {
        let pass = &self.name;
        self.dependencies.get_mut(name).ok_or_else(|| RgError::DependencyNotFound {
            pass: pass.clone(),
            name: name.to_string(),
        })
    }

    /// 按声明顺序迭代
    #[inline]
    pub fn dependencies(&self) -> impl Iterator<Item = &RgDependency> {
        self.dependencies.values()
    }

    #[inline]
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }
}

pub type RgGraphicsCallback = Box<dyn FnOnce(&mut RgGraphicsPassContext<'_>) -> RgResult<()>>;
pub type RgComputeCallback = Box<dyn FnOnce(&mut RgComputePassContext<'_>) -> RgResult<()>>;

/// 光栅化 Pass
pub struct RgGraphicsPass {
    core: RgPassCore,
    callback: Option<RgGraphicsCallback>,
}

impl RgGraphicsPass {
    pub fn new(name: impl Into<String>, frames_in_flight: usize) -> RgResult<Self> {
        Ok(Self {
            core: RgPassCore::new(name, frames_in_flight)?,
            callback: None,
        })
    }

    /// 本帧要执行的内容，覆盖之前设置但还没执行的回调
    pub fn set_execute_callback(
        &mut self,
        callback: impl FnOnce(&mut RgGraphicsPassContext<'_>) -> RgResult<()> + 'static,
    ) {
        self.callback = Some(Box::new(callback));
    }

    #[inline]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn take_callback(&mut self) -> Option<RgGraphicsCallback> {
        self.callback.take()
    }
}

impl Deref for RgGraphicsPass {
    type Target = RgPassCore;
    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl DerefMut for RgGraphicsPass {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}

/// 计算 Pass
pub struct RgComputePass {
    core: RgPassCore,
    callback: Option<RgComputeCallback>,
}

impl RgComputePass {
    pub fn new(name: impl Into<String>, frames_in_flight: usize) -> RgResult<Self> {
        Ok(Self {
            core: RgPassCore::new(name, frames_in_flight)?,
            callback: None,
        })
    }

    /// 本帧要执行的内容，覆盖之前设置但还没执行的回调
    pub fn set_execute_callback(
        &mut self,
        callback: impl FnOnce(&mut RgComputePassContext<'_>) -> RgResult<()> + 'static,
    ) {
        self.callback = Some(Box::new(callback));
    }

    #[inline]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn take_callback(&mut self) -> Option<RgComputeCallback> {
        self.callback.take()
    }
}

impl Deref for RgComputePass {
    type Target = RgPassCore;
    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl DerefMut for RgComputePass {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.core
    }
}

/// graph 中存放的 Pass
pub enum RgPass {
    Graphics(RgGraphicsPass),
    Compute(RgComputePass),
}

impl RgPass {
    #[inline]
    pub fn core(&self) -> &RgPassCore {
        match self {
            Self::Graphics(pass) => &pass.core,
            Self::Compute(pass) => &pass.core,
        }
    }

    #[inline]
    pub fn core_mut(&mut self) -> &mut RgPassCore {
        match self {
            Self::Graphics(pass) => &mut pass.core,
            Self::Compute(pass) => &mut pass.core,
        }
    }

    #[inline]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Graphics(_) => "graphics",
            Self::Compute(_) => "compute",
        }
    }

    #[inline]
    pub fn has_callback(&self) -> bool {
        match self {
            Self::Graphics(pass) => pass.has_callback(),
            Self::Compute(pass) => pass.has_callback(),
        }
    }
}

impl From<RgGraphicsPass> for RgPass {
    fn from(pass: RgGraphicsPass) -> Self {
        Self::Graphics(pass)
    }
}

impl From<RgComputePass> for RgPass {
    fn from(pass: RgComputePass) -> Self {
        Self::Compute(pass)
    }
}
