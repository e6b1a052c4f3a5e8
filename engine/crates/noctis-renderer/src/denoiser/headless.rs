use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use noctis_gfx::commands::barrier::GfxBarrierDesc;
use noctis_gfx::device::GfxDevice;
use noctis_gfx::resource_state::GfxResourceState;

use super::{CommonSettings, Denoiser, DenoiserAlgorithmSettings, DenoiserId, DenoiserSlot, DenoiserSnapshot};

/// 一次 `denoise` 调用的记录
#[derive(Clone, Debug)]
pub struct HeadlessDenoiserCall {
    pub ids: Vec<DenoiserId>,
    pub common: CommonSettings,
    pub settings: Vec<DenoiserAlgorithmSettings>,
    pub slots: Vec<DenoiserSlot>,
    /// 调用时各资源的状态（去重后）
    pub input_states: Vec<GfxResourceState>,
}

/// 不做任何计算的降噪库
///
/// 与真实的降噪库一样自己插入 barrier：输入转换为着色器只读，输出转换为存储读写，
/// 并把最终状态写回快照。开启 `restore_initial_state` 后会在返回前转换回调用前的状态。
pub struct HeadlessDenoiser {
    supported: Vec<DenoiserId>,
    restore_initial_state: bool,

    frame_count: u64,
    common: CommonSettings,
    settings: HashMap<DenoiserId, DenoiserAlgorithmSettings>,

    calls: Rc<RefCell<Vec<HeadlessDenoiserCall>>>,
}

impl Default for HeadlessDenoiser {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl HeadlessDenoiser {
    pub fn new() -> Self {
        Self {
            supported: DenoiserId::ALL.to_vec(),
            restore_initial_state: false,
            frame_count: 0,
            common: CommonSettings::default(),
            settings: HashMap::new(),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// 只支持部分算法，用于模拟初始化失败
    pub fn with_supported(mut self, supported: &[DenoiserId]) -> Self {
        self.supported = supported.to_vec();
        self
    }

    pub fn with_restore_initial_state(mut self, restore: bool) -> Self {
        self.restore_initial_state = restore;
        self
    }
}

// getters
impl HeadlessDenoiser {
    /// 调用记录，降噪库被 `Box` 起来之后依然可以读取
    #[inline]
    pub fn calls(&self) -> Rc<RefCell<Vec<HeadlessDenoiserCall>>> {
        self.calls.clone()
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Denoiser for HeadlessDenoiser {
    fn supported(&self, id: DenoiserId) -> bool {
        self.supported.contains(&id)
    }

    fn new_frame(&mut self) {
        self.frame_count += 1;
    }

    fn set_common_settings(&mut self, settings: &CommonSettings) {
        self.common = *settings;
    }

    fn set_denoiser_settings(&mut self, settings: &DenoiserAlgorithmSettings) {
        self.settings.insert(settings.id(), *settings);
    }

    fn denoise(
        &mut self,
        device: &mut dyn GfxDevice,
        cmd_slot: usize,
        ids: &[DenoiserId],
        snapshot: &mut DenoiserSnapshot,
    ) {
        for id in ids {
            assert!(self.supported(*id), "denoiser {:?} was not created", id);
        }

        let input_states: Vec<_> = snapshot.unique().map(|entry| entry.state).collect();
        let final_states: Vec<_> = snapshot
            .unique()
            .map(|entry| {
                if snapshot.slots_of(entry.handle).any(DenoiserSlot::is_output) {
                    GfxResourceState::STORAGE_READ_WRITE_COMPUTE
                } else {
                    GfxResourceState::SHADER_READ_COMPUTE
                }
            })
            .collect();

        let to_final: Vec<_> = snapshot
            .unique()
            .zip(&final_states)
            .filter(|(entry, after)| entry.state != **after)
            .map(|(entry, after)| GfxBarrierDesc::new(entry.native, entry.state, *after))
            .collect();

        device.cmd_begin_label(cmd_slot, &format!("denoiser {:?}", ids));
        device.cmd_barriers(cmd_slot, &to_final);
        for id in ids {
            device.cmd_dispatch(cmd_slot, &format!("denoiser::{:?}", id), glam::UVec3::ONE);
        }

        if self.restore_initial_state {
            let back: Vec<_> = to_final.iter().map(|b| GfxBarrierDesc::new(b.target, b.after, b.before)).collect();
            device.cmd_barriers(cmd_slot, &back);
            snapshot.restore_initial_state = true;
        } else {
            for (entry, after) in snapshot.unique_mut().zip(final_states) {
                entry.state = after;
            }
        }
        device.cmd_end_label(cmd_slot);

        self.calls.borrow_mut().push(HeadlessDenoiserCall {
            ids: ids.to_vec(),
            common: self.common,
            settings: ids.iter().filter_map(|id| self.settings.get(id).copied()).collect(),
            slots: snapshot.slots().map(|(slot, _)| slot).collect(),
            input_states,
        });
    }
}
