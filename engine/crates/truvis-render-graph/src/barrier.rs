//! Barrier 解析器
//!
//! 记录每个物理资源最后一次被访问时的状态。每个 Pass 在 `resolve_barriers` 时：
//! 1. 按声明顺序把依赖解析为当前帧的物理资源
//! 2. 通过访问表得到目标状态
//! 3. 与记录的状态比较，不同才生成 barrier（从未见过的资源视为 UNDEFINED）
//! 4. 所有依赖都解析成功后才更新状态表并提交 barrier
//!
//! 状态表以物理句柄为 key，同一个纹理数组的不同元素互不影响，
//! 不同 frame slot 的资源也互不影响。
//!
//! cell 被重新绑定后，被替换掉的资源和新绑定的资源都回到未知状态，
//! 下一次访问从 UNDEFINED 开始。

use std::collections::{HashMap, HashSet};

use slotmap::SecondaryMap;

use crate::command::barrier::{RgBufferBarrier, RgImageBarrier, RgPassBarriers};
use crate::command::recorder::RgCommandRecorder;
use crate::error::RgResult;
use crate::handles::{GfxBufferHandle, GfxImageHandle, RgCellKey};
use crate::pass::pass::RgPassCore;
use crate::resources::payload::RgPhysicalId;
use crate::resources::registry::RgResourceRegistry;
use crate::state::access::{RgAccessKind, RgAccessTable};
use crate::state::resource_state::{RgBufferState, RgImageState};

pub struct RgBarrierResolver {
    access_table: RgAccessTable,

    image_states: SecondaryMap<GfxImageHandle, RgImageState>,
    buffer_states: SecondaryMap<GfxBufferHandle, RgBufferState>,

    /// 上一次同步时每个 cell 的 generation 以及绑定的物理资源
    cell_snapshots: SecondaryMap<RgCellKey, RgCellSnapshot>,

    validate_access_order: bool,
}

struct RgCellSnapshot {
    generation: u64,
    physical: HashSet<RgPhysicalId>,
}

// new & init
impl RgBarrierResolver {
    pub fn new(access_table: RgAccessTable, validate_access_order: bool) -> Self {
        Self {
            access_table,
            image_states: SecondaryMap::new(),
            buffer_states: SecondaryMap::new(),
            cell_snapshots: SecondaryMap::new(),
            validate_access_order,
        }
    }
}

// getters
impl RgBarrierResolver {
    #[inline]
    pub fn access_table(&self) -> &RgAccessTable {
        &self.access_table
    }

    /// 资源最后一次被记录的状态，从未见过时返回 `None`
    #[inline]
    pub fn image_state(&self, image: GfxImageHandle) -> Option<RgImageState> {
        self.image_states.get(image).copied()
    }

    #[inline]
    pub fn buffer_state(&self, buffer: GfxBufferHandle) -> Option<RgBufferState> {
        self.buffer_states.get(buffer).copied()
    }

    #[inline]
    pub fn tracked_count(&self) -> usize {
        self.image_states.len() + self.buffer_states.len()
    }
}

// tools
impl RgBarrierResolver {
    /// 删除已经注销的物理资源的状态
    pub fn prune(&mut self, registry: &RgResourceRegistry) {
        let before = self.tracked_count();
        self.image_states.retain(|image, _| registry.contains_image(image));
        self.buffer_states.retain(|buffer, _| registry.contains_buffer(buffer));
        let removed = before - self.tracked_count();
        if removed > 0 {
            log::debug!("pruned {removed} resource states of unregistered resources");
        }
    }

    /// 对比 cell 的 generation，清除 rebind 前后发生变化的资源的状态
    ///
    /// 第一次见到的 cell 只记录快照。两次同步之间换走又换回的资源不受影响。
    pub fn sync_cells(&mut self, registry: &RgResourceRegistry) {
        self.cell_snapshots.retain(|key, _| registry.contains_cell(key));

        let mut physical = Vec::new();
        for (key, slot) in registry.cells() {
            if self.cell_snapshots.get(key).is_some_and(|snapshot| snapshot.generation == slot.generation()) {
                continue;
            }

            physical.clear();
            slot.collect_all_physical(&mut physical);
            let current: HashSet<RgPhysicalId> = physical.iter().copied().collect();

            let mut invalidated = 0;
            if let Some(previous) = self.cell_snapshots.get(key) {
                for &id in previous.physical.symmetric_difference(&current) {
                    let removed = match id {
                        RgPhysicalId::Image(image) => self.image_states.remove(image).is_some(),
                        RgPhysicalId::Buffer(buffer) => self.buffer_states.remove(buffer).is_some(),
                    };
                    invalidated += removed as usize;
                }
            }
            self.cell_snapshots.insert(
                key,
                RgCellSnapshot {
                    generation: slot.generation(),
                    physical: current,
                },
            );
            if invalidated > 0 {
                log::debug!("cell `{}` was rebound: {invalidated} resource states invalidated", slot.name());
            }
        }
    }

    /// 忘记所有记录的状态，例如设备重建后
    pub fn reset(&mut self) {
        self.image_states.clear();
        self.buffer_states.clear();
    }
}

// resolve
impl RgBarrierResolver {
    /// 计算并提交 `pass` 在 `frame_index` 这一帧需要的 barrier，返回 barrier 数量
    pub fn resolve(
        &mut self,
        pass: &RgPassCore,
        frame_index: usize,
        registry: &RgResourceRegistry,
        recorder: &mut dyn RgCommandRecorder,
    ) -> RgResult<usize> {
        let barriers = self.plan(pass, frame_index, registry)?;
        let count = barriers.len();

        if !barriers.is_empty() {
            recorder.pipeline_barrier(&barriers);
        }
        log::debug!("pass `{}` [frame {frame_index}]: {count} barriers", pass.name());
        Ok(count)
    }

    /// 只有全部依赖都成功解析后才修改状态表
    fn plan(
        &mut self,
        pass: &RgPassCore,
        frame_index: usize,
        registry: &RgResourceRegistry,
    ) -> RgResult<RgPassBarriers> {
        let mut barriers = RgPassBarriers::default();
        // 暂存的新状态，全部依赖解析成功前不写入状态表
        let mut pending_images: HashMap<GfxImageHandle, RgImageState> = HashMap::new();
        let mut pending_buffers: HashMap<GfxBufferHandle, RgBufferState> = HashMap::new();
        let mut physical = Vec::new();

        for dependency in pass.dependencies() {
            physical.clear();
            dependency.collect_physical(pass.name(), registry, frame_index, pass.frames_in_flight(), &mut physical)?;
            let access = dependency.access();

            for &id in &physical {
                match id {
                    RgPhysicalId::Image(image) => {
                        let info = registry.get_image(image)?;
                        let dst_state = self.access_table.image_state(access, info.is_depth())?;
                        let src_state =
                            pending_images.get(&image).or_else(|| self.image_states.get(image)).copied();
                        self.check_access_order(pass, dependency.name(), &info.name, access, src_state.is_none());

                        let src_state = src_state.unwrap_or(RgImageState::UNDEFINED);
                        if src_state == dst_state {
                            continue;
                        }
                        if pending_images.contains_key(&image) {
                            log::warn!(
                                "pass `{}`: image `{}` is transitioned twice in one barrier batch",
                                pass.name(),
                                info.name
                            );
                        }
                        log::trace!(
                            "pass `{}`: image `{}` {:?} -> {:?}",
                            pass.name(),
                            info.name,
                            src_state.layout,
                            dst_state.layout
                        );
                        barriers.image_barriers.push(RgImageBarrier {
                            image,
                            vk_image: info.vk_image,
                            range: info.full_range(),
                            src_state,
                            dst_state,
                        });
                        pending_images.insert(image, dst_state);
                    }
                    RgPhysicalId::Buffer(buffer) => {
                        let info = registry.get_buffer(buffer)?;
                        let dst_state = self.access_table.buffer_state(access)?;
                        let src_state =
                            pending_buffers.get(&buffer).or_else(|| self.buffer_states.get(buffer)).copied();
                        self.check_access_order(pass, dependency.name(), &info.name, access, src_state.is_none());

                        let src_state = src_state.unwrap_or(RgBufferState::UNDEFINED);
                        if src_state == dst_state {
                            continue;
                        }
                        log::trace!(
                            "pass `{}`: buffer `{}` {:?} -> {:?}",
                            pass.name(),
                            info.name,
                            src_state.stage,
                            dst_state.stage
                        );
                        barriers.buffer_barriers.push(RgBufferBarrier {
                            buffer,
                            vk_buffer: info.vk_buffer,
                            src_state,
                            dst_state,
                        });
                        pending_buffers.insert(buffer, dst_state);
                    }
                }
            }
        }

        for (image, state) in pending_images {
            self.image_states.insert(image, state);
        }
        for (buffer, state) in pending_buffers {
            self.buffer_states.insert(buffer, state);
        }

        Ok(barriers)
    }

    fn check_access_order(
        &self,
        pass: &RgPassCore,
        dependency: &str,
        resource: &str,
        access: RgAccessKind,
        never_seen: bool,
    ) {
        if self.validate_access_order && never_seen && !access.is_write() {
            log::warn!(
                "pass `{}` reads `{resource}` through `{dependency}` ({access:?}) before any pass has written it",
                pass.name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::*;
    use crate::command::recorder::HeadlessRecorder;
    use crate::error::{RgError, RgErrorCategory};
    use crate::handles::RgCellHandle;
    use crate::pass::dependency::RgDependency;
    use crate::resources::payload::{RgBuffer, RgTexture, RgTextureArray};
    use crate::resources::physical::{RgPhysicalBuffer, RgPhysicalImage};

    fn image(registry: &mut RgResourceRegistry, name: &str, format: vk::Format) -> GfxImageHandle {
        registry.register_image(RgPhysicalImage::new(
            name,
            vk::Image::null(),
            vk::ImageView::null(),
            format,
            vk::Extent2D { width: 8, height: 8 },
        ))
    }

    fn texture_cell(registry: &mut RgResourceRegistry, name: &str, frames: usize) -> RgCellHandle<RgTexture> {
        let textures: Vec<_> = (0..frames)
            .map(|i| RgTexture::new(image(registry, &format!("{name}{i}"), vk::Format::R16G16B16A16_SFLOAT)))
            .collect();
        registry.create_cell(name, textures)
    }

    fn pass_with(name: &str, frames_in_flight: usize, dependencies: Vec<RgDependency>) -> RgPassCore {
        let mut pass = RgPassCore::new(name, frames_in_flight).unwrap();
        pass.add_dependencies(dependencies).unwrap();
        pass
    }

    fn resolver() -> RgBarrierResolver {
        RgBarrierResolver::new(RgAccessTable::standard(), true)
    }

    #[test]
    fn test_transition_count_matches_state_changes() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 1);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();

        let accesses = [
            (RgAccessKind::RenderTargetWrite, 1),
            (RgAccessKind::ComputeRead, 1),
            (RgAccessKind::FragmentRead, 1),
            (RgAccessKind::FragmentRead, 0),
            (RgAccessKind::ComputeWrite, 1),
            (RgAccessKind::ComputeWrite, 0),
        ];
        for (i, (access, expected)) in accesses.into_iter().enumerate() {
            let pass = pass_with(&format!("pass{i}"), 1, vec![RgDependency::bound("color", access, color)]);
            assert_eq!(resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap(), expected, "pass{i}");
        }
        assert_eq!(recorder.barrier_count(), 4);
    }

    #[test]
    fn test_frame_slots_are_independent() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 2);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();
        let pass = pass_with("forward", 2, vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)]);

        assert_eq!(resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap(), 1);
        // frame 1 使用另一张图像，仍然从 UNDEFINED 开始
        assert_eq!(resolver.resolve(&pass, 1, &registry, &mut recorder).unwrap(), 1);
        assert_eq!(resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap(), 0);

        let frame1 = registry.cell(color).unwrap().get(1).unwrap().image;
        assert_eq!(resolver.image_state(frame1), Some(RgImageState::COLOR_ATTACHMENT_WRITE));
    }

    #[test]
    fn test_array_elements_are_keyed_by_physical_image() {
        let mut registry = RgResourceRegistry::new();
        let maps: Vec<_> = (0..3)
            .map(|i| RgTexture::new(image(&mut registry, &format!("shadow{i}"), vk::Format::D32_SFLOAT)))
            .collect();
        let shadow = registry.create_cell("shadow maps", vec![RgTextureArray::new(maps.clone())]);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();

        // 只写第 1 个元素
        let mut write = RgDependency::new("shadow", RgAccessKind::RenderTargetWrite);
        write.bind_element(shadow, 1);
        let shadow_pass = pass_with("shadow1", 1, vec![write]);
        assert_eq!(resolver.resolve(&shadow_pass, 0, &registry, &mut recorder).unwrap(), 1);
        assert_eq!(resolver.image_state(maps[0].image), None);
        assert_eq!(resolver.image_state(maps[1].image), Some(RgImageState::DEPTH_ATTACHMENT_WRITE));

        // 读取整个数组：3 个元素各需要一个 barrier
        let read = pass_with("forward", 1, vec![RgDependency::bound("shadow", RgAccessKind::FragmentRead, shadow)]);
        assert_eq!(resolver.resolve(&read, 0, &registry, &mut recorder).unwrap(), 3);
    }

    #[test]
    fn test_failed_resolution_leaves_states_untouched() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 1);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();

        let pass = pass_with(
            "broken",
            1,
            vec![
                RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color),
                RgDependency::new("late", RgAccessKind::FragmentRead),
            ],
        );
        let err = resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap_err();
        assert_eq!(err.category(), RgErrorCategory::UnboundDependency);
        assert_eq!(resolver.tracked_count(), 0);
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_buffer_rejects_image_only_access() {
        let mut registry = RgResourceRegistry::new();
        let buffer = registry.register_buffer(RgPhysicalBuffer::new("camera", vk::Buffer::null(), 256));
        let camera = registry.create_cell("camera", vec![RgBuffer::new(buffer)]);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();

        let read = pass_with("forward", 1, vec![RgDependency::bound("camera", RgAccessKind::FragmentRead, camera)]);
        assert_eq!(resolver.resolve(&read, 0, &registry, &mut recorder).unwrap(), 1);
        assert_eq!(resolver.buffer_state(buffer), Some(RgBufferState::SHADER_READ_FRAGMENT));

        let present = pass_with("present", 1, vec![RgDependency::bound("camera", RgAccessKind::Present, camera)]);
        let err = resolver.resolve(&present, 0, &registry, &mut recorder).unwrap_err();
        assert!(matches!(err, RgError::UnsupportedAccess { resource: "buffer", .. }));
    }

    #[test]
    fn test_prune_drops_unregistered_resources() {
        let mut registry = RgResourceRegistry::new();
        let color = texture_cell(&mut registry, "color", 1);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();
        let pass = pass_with("forward", 1, vec![RgDependency::bound("color", RgAccessKind::RenderTargetWrite, color)]);
        resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap();

        let old = registry.cell(color).unwrap().get(0).unwrap().image;
        registry.unregister_image(old);
        resolver.prune(&registry);
        assert_eq!(resolver.tracked_count(), 0);
    }

    #[test]
    fn test_sync_cells_invalidates_swapped_slot_only() {
        let mut registry = RgResourceRegistry::new();
        let swapchain = texture_cell(&mut registry, "swapchain", 2);
        let next = RgTexture::new(image(&mut registry, "swapchain2", vk::Format::B8G8R8A8_UNORM));
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();
        let pass = pass_with(
            "present",
            2,
            vec![RgDependency::bound("swapchain", RgAccessKind::Present, swapchain)],
        );

        resolver.sync_cells(&registry);
        resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap();
        resolver.resolve(&pass, 1, &registry, &mut recorder).unwrap();
        let [slot0, slot1] = [0, 1].map(|i| registry.cell(swapchain).unwrap().get(i).unwrap().image);

        // 没有变化时同步不影响任何状态
        resolver.sync_cells(&registry);
        assert_eq!(resolver.tracked_count(), 2);

        assert!(registry.update_cell_slot(swapchain, 0, next).unwrap());
        resolver.sync_cells(&registry);
        assert_eq!(resolver.image_state(slot0), None);
        assert_eq!(resolver.image_state(slot1), Some(RgImageState::PRESENT));
        assert_eq!(resolver.resolve(&pass, 0, &registry, &mut recorder).unwrap(), 1);
    }

    #[test]
    fn test_active_count_change_keeps_states() {
        let mut registry = RgResourceRegistry::new();
        let maps: Vec<_> = (0..2)
            .map(|i| RgTexture::new(image(&mut registry, &format!("shadow{i}"), vk::Format::D32_SFLOAT)))
            .collect();
        let shadow = registry.create_cell("shadow maps", vec![RgTextureArray::new(maps.clone())]);
        let mut resolver = resolver();
        let mut recorder = HeadlessRecorder::new();
        let write = pass_with("shadow", 1, vec![RgDependency::bound("shadow", RgAccessKind::RenderTargetWrite, shadow)]);

        resolver.sync_cells(&registry);
        assert_eq!(resolver.resolve(&write, 0, &registry, &mut recorder).unwrap(), 2);

        registry.update_cell_slot_with(shadow, 0, |array| array.set_active_count(1)).unwrap();
        resolver.sync_cells(&registry);
        assert_eq!(resolver.image_state(maps[1].image), Some(RgImageState::DEPTH_ATTACHMENT_WRITE));
        assert_eq!(resolver.resolve(&write, 0, &registry, &mut recorder).unwrap(), 0);
    }
}
