use indexmap::IndexMap;

use noctis_gfx::resource_state::GfxResourceState;
use noctis_gfx::resources::desc::GfxNativeHandle;
use noctis_render_interface::handles::GfxResourceHandle;

use super::DenoiserSlot;

/// 快照中的一个资源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenoiserSnapshotEntry {
    pub handle: GfxResourceHandle,
    pub native: GfxNativeHandle,
    /// 调用前为状态表中的当前状态，调用后为降噪库报告的状态
    pub state: GfxResourceState,
}

/// 一次降噪调用的资源快照
///
/// 多个槽位可以指向同一个资源（例如两个 confidence 输入），
/// 资源只记录一次，状态的写回按资源而不是按槽位进行。
/// 每次调用前重新构建，调用结束后丢弃。
#[derive(Debug, Default)]
pub struct DenoiserSnapshot {
    unique: IndexMap<GfxResourceHandle, DenoiserSnapshotEntry>,
    slots: IndexMap<DenoiserSlot, GfxResourceHandle>,

    /// 降噪库已经把所有资源恢复到调用前的状态
    pub restore_initial_state: bool,
}

// new & init
impl DenoiserSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把槽位绑定到资源
    ///
    /// 资源第一次出现时记录它的状态；再次出现时只增加槽位。
    pub fn set_resource(
        &mut self,
        slot: DenoiserSlot,
        handle: GfxResourceHandle,
        native: GfxNativeHandle,
        state: GfxResourceState,
    ) {
        let entry = self.unique.entry(handle).or_insert(DenoiserSnapshotEntry { handle, native, state });
        debug_assert_eq!(entry.state, state, "slot {} sees a different state for an aliased resource", slot.name());

        let previous = self.slots.insert(slot, handle);
        debug_assert!(previous.is_none_or(|p| p == handle), "slot {} bound twice", slot.name());
    }
}

// getters
impl DenoiserSnapshot {
    #[inline]
    pub fn slot(&self, slot: DenoiserSlot) -> Option<&DenoiserSnapshotEntry> {
        self.slots.get(&slot).and_then(|handle| self.unique.get(handle))
    }

    #[inline]
    pub fn slots(&self) -> impl Iterator<Item = (DenoiserSlot, GfxResourceHandle)> + '_ {
        self.slots.iter().map(|(slot, handle)| (*slot, *handle))
    }

    /// 绑定到某个资源的所有槽位
    pub fn slots_of(&self, handle: GfxResourceHandle) -> impl Iterator<Item = DenoiserSlot> + '_ {
        self.slots.iter().filter(move |(_, h)| **h == handle).map(|(slot, _)| *slot)
    }

    /// 去重后的资源，按第一次绑定的顺序
    #[inline]
    pub fn unique(&self) -> impl Iterator<Item = &DenoiserSnapshotEntry> {
        self.unique.values()
    }

    #[inline]
    pub fn unique_mut(&mut self) -> impl Iterator<Item = &mut DenoiserSnapshotEntry> {
        self.unique.values_mut()
    }

    #[inline]
    pub fn unique_len(&self) -> usize {
        self.unique.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.unique.is_empty()
    }
}
