use anyhow::Context;
use glam::{Mat4, UVec2, Vec2, Vec3};

use noctis_gfx::device::GfxDevice;
use noctis_render_graph::frame_graph::{
    FrameResources, RgBarrier, RgBarrierPlanner, RgDenoiseStage, RgFrameContext, RgFramePlan, RgPassKind, RgPassNode,
    RgPlanEntry, RgResourceStateTable, build_frame_passes,
};
use noctis_render_interface::config::RendererConfig;
use noctis_render_interface::frame_counter::FrameCounter;
use noctis_render_interface::gfx_resource_manager::GfxResourceManager;
use noctis_render_interface::pipeline_settings::{DenoiserKind, FrameSettings, PipelineSettings};
use noctis_render_interface::timer::Timer;

use crate::denoiser::{
    CommonSettings, Denoiser, DenoiserAlgorithmSettings, DenoiserBridge, DenoiserId, ReblurSettings,
    ReferenceSettings, RelaxSettings, ShadowSettings,
};
use crate::frame_queue::FrameQueueController;
use crate::history_policy::{HistoryDecision, HistoryPolicy};
use crate::upscaler::{Upscaler, UpscalerDispatchDesc, UpscalerGuides};

/// 应用每帧交给渲染器的输入
#[derive(Clone, Copy, Debug)]
pub struct FrameInput {
    pub view_to_clip: Mat4,
    pub world_to_view: Mat4,
    /// 像素单位的相机抖动，关闭 jitter 时被忽略
    pub jitter: Vec2,
    /// 上一帧到这一帧的时间
    pub delta_ms: f32,
    pub settings: PipelineSettings,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            view_to_clip: Mat4::IDENTITY,
            world_to_view: Mat4::IDENTITY,
            jitter: Vec2::ZERO,
            delta_ms: 1000.0 / 60.0,
            settings: PipelineSettings::default(),
        }
    }
}

/// 一帧的执行结果
#[derive(Clone, Copy, Debug)]
pub struct FrameReport {
    pub frame_index: u64,
    pub decision: HistoryDecision,
    pub pass_count: usize,
    pub barrier_count: usize,
    /// 降噪库返回后写回状态表的资源数量（所有降噪 pass 之和）
    pub reconciled_count: usize,
    pub swapchain_image: usize,
}

/// 上一帧的相机与分辨率，用于降噪库的 `*_prev` 参数
#[derive(Clone, Copy, Debug)]
struct PrevFrame {
    view_to_clip: Mat4,
    world_to_view: Mat4,
    jitter: Vec2,
    resource_size: UVec2,
    rect_size: UVec2,
}

/// 录制过程中每个 pass 都要用到的本帧信息
struct FrameRecordContext<'a> {
    cmd_slot: usize,
    input: &'a FrameInput,
    decision: &'a HistoryDecision,
    common: CommonSettings,
    jitter: Vec2,
    rect_size: UVec2,
}

/// 帧循环
///
/// 持有状态表、资源 arena 以及所有外部协作者，每帧的流程：
/// 1. 帧队列准入（等待复用的命令槽位空闲）
/// 2. HistoryPolicy 计算本帧的 history 长度
/// 3. 按固定顺序录制 pass，每个 pass 前先用 BarrierPlanner 对齐状态
/// 4. 降噪 pass 交给 DenoiserBridge，返回后状态写回状态表
/// 5. 提交、呈现
pub struct Renderer<D: GfxDevice> {
    config: RendererConfig,

    device: D,
    manager: GfxResourceManager,
    table: RgResourceStateTable,
    resources: FrameResources,

    denoiser: DenoiserBridge,
    temporal_upscaler: Box<dyn Upscaler>,
    sharpener: Box<dyn Upscaler>,

    history_policy: HistoryPolicy,
    frame_queue: FrameQueueController,
    frame_counter: FrameCounter,
    timer: Timer,

    prev_frame: Option<PrevFrame>,
    reset_requested: bool,
    /// 资源刚刚创建，下一帧需要清零辐射度缓存
    resources_recreated: bool,
    last_plan: RgFramePlan,

    destroyed: bool,
}

// new & init
impl<D: GfxDevice> Renderer<D> {
    /// 配置不合法或降噪库缺少算法时返回错误
    pub fn new(
        config: RendererConfig,
        mut device: D,
        denoiser: Box<dyn Denoiser>,
        temporal_upscaler: Box<dyn Upscaler>,
        sharpener: Box<dyn Upscaler>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid renderer config")?;
        anyhow::ensure!(!device.swapchain_images().is_empty(), "device has no swapchain images");
        let denoiser = DenoiserBridge::new(denoiser, &DenoiserId::ALL).context("failed to create denoiser")?;

        let mut manager = GfxResourceManager::new();
        let mut table = RgResourceStateTable::new();
        let resources = FrameResources::create(&mut device, &mut manager, &mut table, &config.frame);

        log::info!(
            "renderer created: {} frames in flight, denoiser {:?}, upscaler {:?}",
            config.queued_frame_num,
            config.pipeline.denoiser,
            config.pipeline.upscaler
        );

        Ok(Self {
            history_policy: HistoryPolicy::new(config.history),
            frame_queue: FrameQueueController::new(config.queued_frame_num),
            config,
            device,
            manager,
            table,
            resources,
            denoiser,
            temporal_upscaler,
            sharpener,
            frame_counter: FrameCounter::default(),
            timer: Timer::default(),
            prev_frame: None,
            reset_requested: false,
            resources_recreated: true,
            last_plan: RgFramePlan::default(),
            destroyed: false,
        })
    }
}

// destroy
impl<D: GfxDevice> Renderer<D> {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    /// 等待所有在飞行中的帧完成后销毁资源，设备依然可以通过 [`Self::device`] 访问
    pub fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }
        self.wait_idle();

        for handle in self.resources.all_handles() {
            self.table.unregister(handle);
        }
        self.manager.destroy_mut(&mut self.device);
        self.destroyed = true;

        log::info!("renderer destroyed after {} frames", self.frame_counter.frame_id());
    }
}

impl<D: GfxDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        assert!(self.destroyed || std::thread::panicking(), "Renderer dropped without destroy");
    }
}

// getters
impl<D: GfxDevice> Renderer<D> {
    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn resource_manager(&self) -> &GfxResourceManager {
        &self.manager
    }

    #[inline]
    pub fn state_table(&self) -> &RgResourceStateTable {
        &self.table
    }

    #[inline]
    pub fn resources(&self) -> &FrameResources {
        &self.resources
    }

    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// 最近一帧的执行计划
    #[inline]
    pub fn last_plan(&self) -> &RgFramePlan {
        &self.last_plan
    }
}

// phase call
impl<D: GfxDevice> Renderer<D> {
    /// 下一帧强制丢弃所有 history
    pub fn request_history_reset(&mut self) {
        self.reset_requested = true;
    }

    /// 重新创建所有与分辨率相关的资源
    ///
    /// 新资源以初始状态重新登记，下一帧强制重置 history。
    pub fn resize(&mut self, frame: FrameSettings) -> anyhow::Result<()> {
        let config = RendererConfig { frame, ..self.config };
        config.validate().context("invalid frame settings")?;

        self.wait_idle();
        let resources = FrameResources::create(&mut self.device, &mut self.manager, &mut self.table, &frame);
        let old = std::mem::replace(&mut self.resources, resources);
        old.destroy(&mut self.device, &mut self.manager, &mut self.table);

        self.config = config;
        self.reset_requested = true;
        self.resources_recreated = true;
        log::info!("renderer resized to {}x{}", frame.render_width, frame.render_height);
        Ok(())
    }

    pub fn print_frame_plan(&self) {
        self.last_plan.print(&self.manager);
    }

    pub fn render_frame(&mut self, input: &FrameInput) -> FrameReport {
        let frame_index = self.frame_counter.frame_id();
        let settings = &input.settings;

        // 1. 等待同一个命令槽位上的旧帧
        let cmd_slot = self.frame_queue.admit(&mut self.device, frame_index);

        // 2. history 长度
        self.timer.update_with_delta_ms(input.delta_ms);
        let reset_requested = std::mem::take(&mut self.reset_requested);
        let decision = self.history_policy.evaluate(
            frame_index,
            settings,
            self.timer.very_smoothed_frame_time_ms(),
            reset_requested,
        );

        let swapchain_image = self.device.acquire_next_image();

        // 3. 降噪库的每帧设置
        let rect_size = self.config.frame.rect_size(settings.resolution_scale).max(UVec2::ONE);
        let jitter = if settings.camera_jitter { input.jitter } else { Vec2::ZERO };
        let common = self.common_settings(input, &decision, jitter, rect_size);
        self.denoiser.new_frame(&common);

        // 4. 按顺序录制 pass
        let ctx = RgFrameContext {
            frame_index,
            parity: self.frame_counter.parity(),
            denoiser: settings.denoiser,
            upscaler: settings.upscaler,
            swapchain_image,
            rect_size,
            output_extent: self.config.frame.output_extent(),
            sharc_extent: self.config.frame.sharc_extent(),
            clear_radiance_cache: std::mem::take(&mut self.resources_recreated),
        };
        let passes = build_frame_passes(&self.resources, &ctx);

        let record_ctx = FrameRecordContext {
            cmd_slot,
            input,
            decision: &decision,
            common,
            jitter,
            rect_size,
        };

        self.device.begin_commands(cmd_slot, &self.frame_counter.frame_name());
        let mut plan = RgFramePlan::new(self.frame_counter.frame_name());
        for pass in &passes {
            let requirements = pass.requirements();
            let barriers = RgBarrierPlanner::plan(&mut self.table, &requirements);

            self.device.cmd_begin_label(cmd_slot, &pass.name);
            self.device.cmd_barriers(cmd_slot, &RgBarrier::to_gfx_descs(&barriers, &self.manager));
            let reconciled = self.record_pass(pass, &record_ctx);
            self.device.cmd_end_label(cmd_slot);

            log::trace!("pass \"{}\": {} barriers", pass.name, barriers.len());
            plan.push(RgPlanEntry {
                pass_name: pass.name.clone(),
                requirements,
                barriers,
                reconciled,
            });
        }
        self.device.end_commands(cmd_slot);

        // 5. 提交与呈现
        self.device.submit(cmd_slot, FrameQueueController::signal_value(frame_index));
        self.device.present(swapchain_image);

        let report = FrameReport {
            frame_index,
            decision,
            pass_count: plan.entries.len(),
            barrier_count: plan.total_barriers(),
            reconciled_count: plan.entries.iter().map(|e| e.reconciled).sum(),
            swapchain_image,
        };

        self.prev_frame = Some(PrevFrame {
            view_to_clip: input.view_to_clip,
            world_to_view: input.world_to_view,
            jitter,
            resource_size: common.resource_size,
            rect_size,
        });
        self.last_plan = plan;
        self.frame_counter.next_frame();

        report
    }
}

// tools
impl<D: GfxDevice> Renderer<D> {
    /// 等待已经提交的所有帧
    fn wait_idle(&mut self) {
        let submitted = self.frame_counter.frame_id();
        if submitted > 0 {
            self.device.wait_frame_fence(submitted);
        }
    }

    fn common_settings(
        &self,
        input: &FrameInput,
        decision: &HistoryDecision,
        jitter: Vec2,
        rect_size: UVec2,
    ) -> CommonSettings {
        let settings = &input.settings;
        let resource_size = UVec2::new(self.config.frame.render_width, self.config.frame.render_height);
        let prev = self.prev_frame.unwrap_or(PrevFrame {
            view_to_clip: input.view_to_clip,
            world_to_view: input.world_to_view,
            jitter,
            resource_size,
            rect_size,
        });

        // reference 与 RR 模式下降噪结果不参与分屏对比
        let split_screen = if settings.denoiser == DenoiserKind::Reference || settings.upscaler.is_reconstruction() {
            1.0
        } else {
            settings.separator
        };

        CommonSettings {
            view_to_clip: input.view_to_clip,
            view_to_clip_prev: prev.view_to_clip,
            world_to_view: input.world_to_view,
            world_to_view_prev: prev.world_to_view,
            motion_vector_scale: Vec3::new(1.0 / rect_size.x as f32, 1.0 / rect_size.y as f32, 1.0),
            camera_jitter: jitter,
            camera_jitter_prev: prev.jitter,
            resource_size,
            resource_size_prev: prev.resource_size,
            rect_size,
            rect_size_prev: prev.rect_size,
            denoising_range: settings.denoising_range,
            split_screen,
            frame_index: self.frame_counter.frame_id() as u32,
            accumulation_mode: decision.accumulation_mode,
            is_history_confidence_available: settings.history_confidence,
            enable_validation: settings.show_validation,
        }
    }

    /// 录制一个 pass 的命令，返回降噪库写回的资源数量
    fn record_pass(&mut self, pass: &RgPassNode, ctx: &FrameRecordContext) -> usize {
        let cmd_slot = ctx.cmd_slot;
        match &pass.kind {
            RgPassKind::StreamBuffer { dst } => {
                self.device.cmd_stream_buffer(cmd_slot, self.manager.native(*dst));
            }
            RgPassKind::UpdateConstants { dst } => {
                let data = bytemuck::bytes_of(&ctx.decision.feedback);
                self.device.cmd_update_buffer(cmd_slot, self.manager.native(*dst), data);
            }
            RgPassKind::FillBuffer { dst, value } => {
                self.device.cmd_fill_buffer(cmd_slot, self.manager.native(*dst), *value);
            }
            RgPassKind::BuildAccelerationStructures { targets } => {
                let targets: Vec<_> = targets.iter().map(|handle| self.manager.native(*handle)).collect();
                self.device.cmd_build_acceleration_structures(cmd_slot, &targets);
            }
            RgPassKind::Dispatch { pipeline, group_count } => {
                self.device.cmd_dispatch(cmd_slot, pipeline, *group_count);
            }
            RgPassKind::Denoise(stage) => return self.record_denoise(*stage, ctx),
            RgPassKind::TemporalUpscale { input, output } => {
                let settings = &ctx.input.settings;
                let guides = settings.upscaler.is_reconstruction().then(|| UpscalerGuides {
                    diffuse_albedo: self.manager.native(self.resources.rr_guide_diff_albedo),
                    specular_albedo: self.manager.native(self.resources.rr_guide_spec_albedo),
                    specular_hit_distance: self.manager.native(self.resources.rr_guide_spec_hit_distance),
                    normal_roughness: self.manager.native(self.resources.rr_guide_normal_roughness),
                });
                let desc = UpscalerDispatchDesc {
                    output: self.manager.native(*output),
                    input: self.manager.native(*input),
                    current_resolution: ctx.rect_size,
                    jitter: ctx.jitter,
                    reset: ctx.decision.upscaler_reset,
                    guides,
                    sharpness: settings.sharpness,
                };
                self.temporal_upscaler.dispatch(&mut self.device, cmd_slot, &desc);
            }
            RgPassKind::Sharpen { input, output } => {
                let settings = &ctx.input.settings;
                // 时域 upscaler 之后输入已经是输出分辨率
                let current_resolution = if settings.upscaler.is_enabled() {
                    let output_extent = self.config.frame.output_extent();
                    UVec2::new(output_extent.width, output_extent.height)
                } else {
                    ctx.rect_size
                };
                let desc = UpscalerDispatchDesc {
                    output: self.manager.native(*output),
                    input: self.manager.native(*input),
                    current_resolution,
                    jitter: Vec2::ZERO,
                    reset: ctx.decision.force_reset,
                    guides: None,
                    sharpness: settings.sharpness,
                };
                self.sharpener.dispatch(&mut self.device, cmd_slot, &desc);
            }
            RgPassKind::CopyTexture { src, dst } => {
                self.device.cmd_copy_texture(cmd_slot, self.manager.native(*src), self.manager.native(*dst));
            }
            // 只需要 barrier，present 在提交之后
            RgPassKind::Present { .. } => {}
        }
        0
    }

    fn record_denoise(&mut self, stage: RgDenoiseStage, ctx: &FrameRecordContext) -> usize {
        let settings = &ctx.input.settings;
        let budget = &ctx.decision.budget;

        let (id, algorithm_settings) = match stage {
            RgDenoiseStage::Shadow => (
                DenoiserId::Shadow,
                DenoiserAlgorithmSettings::Shadow(ShadowSettings {
                    light_direction: settings.sun_direction,
                    max_stabilized_frame_num: ctx.decision.shadow_stabilized,
                }),
            ),
            // reference 模式下主信号依然走 Reblur
            RgDenoiseStage::Opaque if settings.denoiser == DenoiserKind::Relax => (
                DenoiserId::Relax,
                DenoiserAlgorithmSettings::Relax(RelaxSettings {
                    diffuse_max_accumulated_frame_num: budget.max_accumulated,
                    diffuse_max_fast_accumulated_frame_num: budget.max_fast_accumulated,
                    specular_max_accumulated_frame_num: budget.max_accumulated,
                    specular_max_fast_accumulated_frame_num: budget.max_fast_accumulated,
                }),
            ),
            RgDenoiseStage::Opaque => (
                DenoiserId::Reblur,
                DenoiserAlgorithmSettings::Reblur(ReblurSettings {
                    max_accumulated_frame_num: budget.max_accumulated,
                    max_fast_accumulated_frame_num: budget.max_fast_accumulated,
                    max_stabilized_frame_num: budget.max_stabilized,
                    hit_distance_scale: settings.hit_dist_scale,
                }),
            ),
            RgDenoiseStage::ReferenceOverride => {
                // 累积结果参与分屏对比
                let common = CommonSettings {
                    split_screen: settings.separator,
                    ..ctx.common
                };
                self.denoiser.set_common_settings(&common);
                (DenoiserId::Reference, DenoiserAlgorithmSettings::Reference(ReferenceSettings::default()))
            }
        };

        self.denoiser.set_denoiser_settings(&algorithm_settings);
        self.denoiser.denoise(&mut self.device, ctx.cmd_slot, &[id], &self.resources, &mut self.table, &self.manager)
    }
}
