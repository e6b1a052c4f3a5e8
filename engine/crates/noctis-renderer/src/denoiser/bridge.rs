use noctis_gfx::device::GfxDevice;
use noctis_render_graph::frame_graph::{CONFIDENCE_BLUR_ITERATIONS, FrameResources, RgResourceStateTable};
use noctis_render_interface::gfx_resource_manager::GfxResourceManager;
use noctis_render_interface::handles::GfxResourceHandle;

use super::{CommonSettings, Denoiser, DenoiserAlgorithmSettings, DenoiserId, DenoiserSlot, DenoiserSnapshot};

/// 渲染器与降噪库之间的桥
///
/// 每次调用：
/// 1. 用状态表中的当前状态构建快照
/// 2. 调用降噪库
/// 3. 把降噪库报告的状态写回状态表（除非降噪库声明已经恢复了初始状态）
///
/// 第 3 步是外部库修改的资源状态回到渲染器的唯一入口，漏掉会让下一次 barrier 规划基于错误的状态。
pub struct DenoiserBridge {
    denoiser: Box<dyn Denoiser>,
}

// new & init
impl DenoiserBridge {
    /// 降噪库必须支持所有 `required` 中的算法，否则初始化失败
    pub fn new(denoiser: Box<dyn Denoiser>, required: &[DenoiserId]) -> anyhow::Result<Self> {
        for id in required {
            anyhow::ensure!(denoiser.supported(*id), "denoiser library does not provide {:?}", id);
        }
        Ok(Self { denoiser })
    }
}

// 每帧调用
impl DenoiserBridge {
    pub fn new_frame(&mut self, common: &CommonSettings) {
        self.denoiser.new_frame();
        self.denoiser.set_common_settings(common);
    }

    /// reference 模式会在同一帧内用修改过的设置再调用一次
    pub fn set_common_settings(&mut self, common: &CommonSettings) {
        self.denoiser.set_common_settings(common);
    }

    pub fn set_denoiser_settings(&mut self, settings: &DenoiserAlgorithmSettings) {
        self.denoiser.set_denoiser_settings(settings);
    }

    /// 对帧资源执行降噪，返回写回状态表的资源数量
    pub fn denoise(
        &mut self,
        device: &mut dyn GfxDevice,
        cmd_slot: usize,
        ids: &[DenoiserId],
        resources: &FrameResources,
        table: &mut RgResourceStateTable,
        manager: &GfxResourceManager,
    ) -> usize {
        self.denoise_with(device, cmd_slot, ids, |slot| Self::slot_resource(resources, slot), table, manager)
    }

    /// 与 [`Self::denoise`] 相同，槽位到资源的映射由调用者给出
    pub fn denoise_with(
        &mut self,
        device: &mut dyn GfxDevice,
        cmd_slot: usize,
        ids: &[DenoiserId],
        bind: impl Fn(DenoiserSlot) -> GfxResourceHandle,
        table: &mut RgResourceStateTable,
        manager: &GfxResourceManager,
    ) -> usize {
        let mut snapshot = Self::build_snapshot(ids, bind, table, manager);
        self.denoiser.denoise(device, cmd_slot, ids, &mut snapshot);
        let reconciled = Self::reconcile(&snapshot, table);
        log::trace!("denoise {:?}: {} resources, {} reconciled", ids, snapshot.unique_len(), reconciled);
        reconciled
    }
}

// tools
impl DenoiserBridge {
    /// 帧资源在各个槽位上扮演的角色
    pub fn slot_resource(resources: &FrameResources, slot: DenoiserSlot) -> GfxResourceHandle {
        match slot {
            DenoiserSlot::InMv => resources.mv,
            DenoiserSlot::InNormalRoughness => resources.normal_roughness,
            DenoiserSlot::InViewZ => resources.view_z,
            DenoiserSlot::InDiffRadianceHitDist => resources.unfiltered_diff,
            DenoiserSlot::OutDiffRadianceHitDist => resources.diff,
            DenoiserSlot::InSpecRadianceHitDist => resources.unfiltered_spec,
            DenoiserSlot::OutSpecRadianceHitDist => resources.spec,
            // 模糊之后的 confidence
            DenoiserSlot::InDiffConfidence | DenoiserSlot::InSpecConfidence => {
                resources.confidence.final_output(CONFIDENCE_BLUR_ITERATIONS)
            }
            DenoiserSlot::InPenumbra => resources.unfiltered_penumbra,
            DenoiserSlot::InTranslucency => resources.unfiltered_translucency,
            DenoiserSlot::OutShadowTranslucency => resources.shadow,
            DenoiserSlot::InSignal | DenoiserSlot::OutSignal => resources.composed,
            DenoiserSlot::OutValidation => resources.validation,
        }
    }

    /// 用所有算法需要的槽位的并集构建快照
    pub fn build_snapshot(
        ids: &[DenoiserId],
        bind: impl Fn(DenoiserSlot) -> GfxResourceHandle,
        table: &RgResourceStateTable,
        manager: &GfxResourceManager,
    ) -> DenoiserSnapshot {
        let mut snapshot = DenoiserSnapshot::new();
        for slot in ids.iter().flat_map(|id| id.required_slots()) {
            let handle = bind(*slot);
            snapshot.set_resource(*slot, handle, manager.native(handle), table.get(handle));
        }
        snapshot
    }

    /// 把降噪库报告的状态写回状态表
    ///
    /// # Panics
    /// 快照中的资源不在状态表中
    pub fn reconcile(snapshot: &DenoiserSnapshot, table: &mut RgResourceStateTable) -> usize {
        if snapshot.restore_initial_state {
            return 0;
        }
        for entry in snapshot.unique() {
            table.set(entry.handle, entry.state);
        }
        snapshot.unique_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::denoiser::HeadlessDenoiser;
    use ash::vk;
    use noctis_gfx::headless::HeadlessDevice;
    use noctis_gfx::resource_state::GfxResourceState;
    use noctis_gfx::resources::desc::GfxTextureDesc;

    struct Fixture {
        device: HeadlessDevice,
        manager: GfxResourceManager,
        table: RgResourceStateTable,
        handles: Vec<GfxResourceHandle>,
    }

    impl Fixture {
        /// 每个槽位一个独立的纹理，confidence 和 signal 按别名共享
        fn new() -> Self {
            let mut device = HeadlessDevice::new(1, vk::Extent2D { width: 8, height: 8 });
            let mut manager = GfxResourceManager::new();
            let mut table = RgResourceStateTable::new();
            let handles = (0..4)
                .map(|i| {
                    let handle = manager.create_texture(
                        &mut device,
                        format!("tex{i}"),
                        GfxTextureDesc::new(vk::Format::R16G16B16A16_SFLOAT, 8, 8),
                    );
                    table.register(handle, GfxResourceState::STORAGE_READ_WRITE_COMPUTE);
                    handle
                })
                .collect();
            device.begin_commands(0, "denoise");
            Self {
                device,
                manager,
                table,
                handles,
            }
        }

        /// 输入统一绑定到 0，confidence 到 1，输出到 2，signal 到 3
        fn bind(&self) -> Box<dyn Fn(DenoiserSlot) -> GfxResourceHandle> {
            let handles = self.handles.clone();
            Box::new(move |slot| match slot {
                DenoiserSlot::InDiffConfidence | DenoiserSlot::InSpecConfidence => handles[1],
                DenoiserSlot::InSignal | DenoiserSlot::OutSignal => handles[3],
                slot if slot.is_output() => handles[2],
                _ => handles[0],
            })
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.manager.destroy_mut(&mut self.device);
        }
    }

    #[test]
    fn test_reconcile_writes_back_reported_states() {
        let mut fx = Fixture::new();
        let mut bridge = DenoiserBridge::new(Box::new(HeadlessDenoiser::new()), &DenoiserId::ALL).unwrap();

        let bind = fx.bind();
        let reconciled = bridge.denoise_with(
            &mut fx.device,
            0,
            &[DenoiserId::Reblur],
            bind,
            &mut fx.table,
            &fx.manager,
        );

        assert_eq!(reconciled, 3);
        assert_eq!(fx.table.get(fx.handles[0]), GfxResourceState::SHADER_READ_COMPUTE);
        assert_eq!(fx.table.get(fx.handles[1]), GfxResourceState::SHADER_READ_COMPUTE);
        assert_eq!(fx.table.get(fx.handles[2]), GfxResourceState::STORAGE_READ_WRITE_COMPUTE);
        // 不属于该算法的资源不受影响
        assert_eq!(fx.table.get(fx.handles[3]), GfxResourceState::STORAGE_READ_WRITE_COMPUTE);
    }

    #[test]
    fn test_restore_initial_state_leaves_table_untouched() {
        let mut fx = Fixture::new();
        let before: Vec<_> = fx.table.iter().map(|(h, s)| (h, *s)).collect();

        let denoiser = HeadlessDenoiser::new().with_restore_initial_state(true);
        let mut bridge = DenoiserBridge::new(Box::new(denoiser), &[DenoiserId::Shadow]).unwrap();
        let bind = fx.bind();
        let reconciled =
            bridge.denoise_with(&mut fx.device, 0, &[DenoiserId::Shadow], bind, &mut fx.table, &fx.manager);

        let after: Vec<_> = fx.table.iter().map(|(h, s)| (h, *s)).collect();
        assert_eq!(reconciled, 0);
        assert_eq!(before, after);
    }

    #[test]
    fn test_reference_signal_is_one_resource() {
        let fx = Fixture::new();
        let snapshot = DenoiserBridge::build_snapshot(&[DenoiserId::Reference], fx.bind(), &fx.table, &fx.manager);
        assert_eq!(snapshot.unique_len(), 1);
        assert_eq!(snapshot.slots().count(), 2);
    }

    #[test]
    fn test_unsupported_algorithm_fails_init() {
        let denoiser = HeadlessDenoiser::new().with_supported(&[DenoiserId::Shadow]);
        assert!(DenoiserBridge::new(Box::new(denoiser), &[DenoiserId::Shadow, DenoiserId::Relax]).is_err());
    }

    #[test]
    #[should_panic(expected = "unregistered")]
    fn test_reconcile_unknown_resource_panics() {
        let mut fx = Fixture::new();
        let snapshot = DenoiserBridge::build_snapshot(&[DenoiserId::Shadow], fx.bind(), &fx.table, &fx.manager);
        fx.table.unregister(fx.handles[0]);
        DenoiserBridge::reconcile(&snapshot, &mut fx.table);
    }
}
