//! Barrier 规划
//!
//! 把 pass 声明的状态需求与状态表比较，生成有序的最少 barrier 集合。

use noctis_gfx::commands::barrier::GfxBarrierDesc;
use noctis_gfx::resource_state::GfxResourceState;
use noctis_render_interface::gfx_resource_manager::GfxResourceManager;
use noctis_render_interface::handles::GfxResourceHandle;

use super::state_table::RgResourceStateTable;

/// pass 对某个资源的状态需求
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgStateRequirement {
    pub handle: GfxResourceHandle,
    pub state: GfxResourceState,
}

impl RgStateRequirement {
    #[inline]
    pub fn new(handle: GfxResourceHandle, state: GfxResourceState) -> Self {
        Self { handle, state }
    }
}

/// 一个资源从 before 到 after 的转换
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBarrier {
    pub handle: GfxResourceHandle,
    pub before: GfxResourceState,
    pub after: GfxResourceState,
}

impl RgBarrier {
    /// layout 是否改变
    #[inline]
    pub fn is_layout_transition(&self) -> bool {
        self.before.layout != self.after.layout
    }

    /// 状态不变，只为了保证存储写入可见
    #[inline]
    pub fn is_hazard(&self) -> bool {
        self.before == self.after
    }

    /// 转换为设备侧的 barrier 描述
    pub fn to_gfx_desc(&self, manager: &GfxResourceManager) -> GfxBarrierDesc {
        let Some(resource) = manager.get(self.handle) else {
            panic!("barrier for unknown resource {:?}", self.handle);
        };
        GfxBarrierDesc::new(resource.native(), self.before, self.after).with_aspect(resource.aspect())
    }

    pub fn to_gfx_descs(barriers: &[RgBarrier], manager: &GfxResourceManager) -> Vec<GfxBarrierDesc> {
        barriers.iter().map(|barrier| barrier.to_gfx_desc(manager)).collect()
    }
}

/// Barrier 规划器
pub struct RgBarrierPlanner;

impl RgBarrierPlanner {
    /// 从 current 进入 desired 是否需要 barrier
    ///
    /// - 状态不同：需要
    /// - 两侧都是存储读写：需要，连续的计算 pass 读写同一个存储资源时，
    ///   GPU 不保证前一个 pass 的写入对后一个可见
    #[inline]
    pub fn needs_barrier(current: GfxResourceState, desired: GfxResourceState) -> bool {
        current != desired || (current.is_storage_read_write() && desired.is_storage_read_write())
    }

    /// 为下一个 pass 计算 barrier
    ///
    /// 每生成一个 barrier 就立即更新状态表，因此同一次调用中后续针对同一资源的
    /// barrier 的 before 状态总是准确的。输出顺序与输入一致，不做合并或重排。
    ///
    /// # Panics
    /// 需求中出现未注册的资源
    pub fn plan(table: &mut RgResourceStateTable, requirements: &[RgStateRequirement]) -> Vec<RgBarrier> {
        let mut barriers = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let current = table.get(requirement.handle);
            if Self::needs_barrier(current, requirement.state) {
                let before = table.set(requirement.handle, requirement.state);
                barriers.push(RgBarrier {
                    handle: requirement.handle,
                    before,
                    after: requirement.state,
                });
            }
        }
        barriers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_table(states: &[GfxResourceState]) -> (RgResourceStateTable, Vec<GfxResourceHandle>) {
        let mut keys: SlotMap<GfxResourceHandle, ()> = SlotMap::with_key();
        let mut table = RgResourceStateTable::new();
        let handles = states
            .iter()
            .map(|state| {
                let handle = keys.insert(());
                table.register(handle, *state);
                handle
            })
            .collect();
        (table, handles)
    }

    #[test]
    fn test_second_plan_is_noop() {
        let (mut table, handles) =
            make_table(&[GfxResourceState::SHADER_READ_COMPUTE, GfxResourceState::TRANSFER_SRC]);
        let requirements = [
            RgStateRequirement::new(handles[0], GfxResourceState::TRANSFER_DST),
            RgStateRequirement::new(handles[1], GfxResourceState::SHADER_READ_COMPUTE),
        ];

        assert_eq!(RgBarrierPlanner::plan(&mut table, &requirements).len(), 2);
        assert!(RgBarrierPlanner::plan(&mut table, &requirements).is_empty());
    }

    #[test]
    fn test_storage_hazard_emitted_every_time() {
        let (mut table, handles) = make_table(&[GfxResourceState::SHADER_READ_COMPUTE]);
        let requirements = [RgStateRequirement::new(handles[0], GfxResourceState::STORAGE_READ_WRITE_COMPUTE)];

        let first = RgBarrierPlanner::plan(&mut table, &requirements);
        assert_eq!(first.len(), 1);
        assert!(first[0].is_layout_transition());

        let second = RgBarrierPlanner::plan(&mut table, &requirements);
        assert_eq!(second.len(), 1);
        assert!(second[0].is_hazard());
        assert_eq!(second[0].before, GfxResourceState::STORAGE_READ_WRITE_COMPUTE);
    }

    #[test]
    fn test_only_changed_resource_gets_barrier() {
        let (mut table, handles) = make_table(&[
            GfxResourceState::SHADER_READ_COMPUTE,
            GfxResourceState::SHADER_READ_COMPUTE,
            GfxResourceState::TRANSFER_SRC,
            GfxResourceState::SHADER_READ_COMPUTE,
        ]);
        let requirements = [
            RgStateRequirement::new(handles[0], GfxResourceState::SHADER_READ_COMPUTE),
            RgStateRequirement::new(handles[1], GfxResourceState::SHADER_READ_COMPUTE),
            RgStateRequirement::new(handles[2], GfxResourceState::TRANSFER_SRC),
            RgStateRequirement::new(handles[3], GfxResourceState::STORAGE_READ_WRITE_COMPUTE),
        ];

        let barriers = RgBarrierPlanner::plan(&mut table, &requirements);
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].handle, handles[3]);
    }

    #[test]
    fn test_repeated_resource_uses_updated_before_state() {
        let (mut table, handles) = make_table(&[GfxResourceState::SHADER_READ_COMPUTE]);
        let requirements = [
            RgStateRequirement::new(handles[0], GfxResourceState::TRANSFER_DST),
            RgStateRequirement::new(handles[0], GfxResourceState::TRANSFER_SRC),
        ];

        let barriers = RgBarrierPlanner::plan(&mut table, &requirements);
        assert_eq!(barriers.len(), 2);
        assert_eq!(barriers[0].before, GfxResourceState::SHADER_READ_COMPUTE);
        assert_eq!(barriers[1].before, GfxResourceState::TRANSFER_DST);
        assert_eq!(table.get(handles[0]), GfxResourceState::TRANSFER_SRC);
    }

    #[test]
    fn test_order_follows_requirements() {
        let (mut table, handles) = make_table(&[GfxResourceState::UNDEFINED; 3]);
        let requirements = [
            RgStateRequirement::new(handles[2], GfxResourceState::SHADER_READ_COMPUTE),
            RgStateRequirement::new(handles[0], GfxResourceState::SHADER_READ_COMPUTE),
            RgStateRequirement::new(handles[1], GfxResourceState::SHADER_READ_COMPUTE),
        ];

        let order: Vec<_> = RgBarrierPlanner::plan(&mut table, &requirements).iter().map(|b| b.handle).collect();
        assert_eq!(order, vec![handles[2], handles[0], handles[1]]);
    }

    #[test]
    #[should_panic(expected = "unregistered")]
    fn test_unregistered_requirement_panics() {
        let mut keys: SlotMap<GfxResourceHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());
        let mut table = RgResourceStateTable::new();
        RgBarrierPlanner::plan(&mut table, &[RgStateRequirement::new(handle, GfxResourceState::TRANSFER_DST)]);
    }
}
