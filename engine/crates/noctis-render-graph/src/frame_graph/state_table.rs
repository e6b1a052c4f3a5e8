//! 资源状态表
//!
//! 记录每个资源最后已知的状态。帧与帧之间的状态只通过这张表延续，
//! 它的生命周期与设备绑定，由渲染器唯一持有。

use slotmap::SecondaryMap;

use noctis_gfx::resource_state::GfxResourceState;
use noctis_render_interface::handles::GfxResourceHandle;

/// 资源状态表
///
/// 只做存取，不做校验：状态是否合理由 `RgBarrierPlanner` 保证。
/// 访问未注册的资源属于程序错误，直接 panic。
#[derive(Default)]
pub struct RgResourceStateTable {
    states: SecondaryMap<GfxResourceHandle, GfxResourceState>,
}

// new & init
impl RgResourceStateTable {
    pub fn new() -> Self {
        Self {
            states: SecondaryMap::new(),
        }
    }

    /// 注册资源的初始状态
    pub fn register(&mut self, handle: GfxResourceHandle, initial_state: GfxResourceState) {
        let previous = self.states.insert(handle, initial_state);
        debug_assert!(previous.is_none(), "resource {:?} registered twice", handle);
    }

    /// 资源销毁时移除
    pub fn unregister(&mut self, handle: GfxResourceHandle) -> Option<GfxResourceState> {
        self.states.remove(handle)
    }
}

// 读写
impl RgResourceStateTable {
    /// 当前状态
    #[inline]
    pub fn get(&self, handle: GfxResourceHandle) -> GfxResourceState {
        match self.states.get(handle) {
            Some(state) => *state,
            None => panic!("state requested for unregistered resource {:?}", handle),
        }
    }

    /// 写入新状态并返回旧状态，方便一次调用构造 barrier
    #[inline]
    pub fn set(&mut self, handle: GfxResourceHandle, new_state: GfxResourceState) -> GfxResourceState {
        match self.states.get_mut(handle) {
            Some(state) => std::mem::replace(state, new_state),
            None => panic!("state written for unregistered resource {:?}", handle),
        }
    }
}

// getters
impl RgResourceStateTable {
    #[inline]
    pub fn contains(&self, handle: GfxResourceHandle) -> bool {
        self.states.contains_key(handle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (GfxResourceHandle, &GfxResourceState)> {
        self.states.iter()
    }
}
