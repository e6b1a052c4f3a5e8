//! 每帧的 history 长度决策
//!
//! 离散事件（算法切换、投影模式切换、第一帧、手动重置）决定是否强制重置；
//! 连续信号（发光强度变化）得到一个平滑衰减的系数。两者最后统一为对 history 长度的缩放，
//! 强制重置就是系数为 0 的特例。

use std::fmt::Display;

use noctis_render_interface::pipeline_settings::{DenoiserKind, HistorySettings, PipelineSettings};

use crate::denoiser::AccumulationMode;

/// 强制重置的原因
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryResetCause {
    FirstFrame,
    DenoiserChanged,
    ProjectionChanged,
    ReconstructionToggled,
    /// 手动请求或分辨率变化
    Requested,
}

impl Display for HistoryResetCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstFrame => write!(f, "first frame"),
            Self::DenoiserChanged => write!(f, "denoiser changed"),
            Self::ProjectionChanged => write!(f, "projection changed"),
            Self::ReconstructionToggled => write!(f, "ray reconstruction toggled"),
            Self::Requested => write!(f, "requested"),
        }
    }
}

/// 时域累积器允许保留的帧数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccumulationBudget {
    pub max_accumulated: u32,
    pub max_fast_accumulated: u32,
    pub max_stabilized: u32,
}

/// 着色器中 TAA 与上一帧反馈使用的常量
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TemporalFeedbackConstants {
    /// TAA 中当前帧的权重，1 表示不使用 history
    pub taa_weight: f32,
    /// 上一帧合成结果作为反馈输入时的置信度
    pub prev_frame_confidence: f32,
    pub max_accumulated_frame_num: u32,
    pub reset_factor: f32,
}

/// 一帧的决策结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryDecision {
    pub force_reset: bool,
    /// 第一个命中的强制重置原因
    pub reset_cause: Option<HistoryResetCause>,
    /// [0, 1]，强制重置时为 0
    pub reset_factor: f32,
    /// 缩放前的帧数
    pub base_budget: AccumulationBudget,
    /// 本帧实际交给降噪库和 upscaler 的帧数
    pub budget: AccumulationBudget,
    /// 阴影降噪的 stabilization 帧数
    pub shadow_stabilized: u32,
    pub accumulation_mode: AccumulationMode,
    /// 时域 upscaler 是否丢弃 history
    pub upscaler_reset: bool,
    pub feedback: TemporalFeedbackConstants,
}

/// History 策略
///
/// 只保存上一帧的设置，每帧调用一次 [`HistoryPolicy::evaluate`]。
pub struct HistoryPolicy {
    history: HistorySettings,
    prev_settings: Option<PipelineSettings>,
}

// new & init
impl HistoryPolicy {
    pub fn new(history: HistorySettings) -> Self {
        Self {
            history,
            prev_settings: None,
        }
    }
}

// update
impl HistoryPolicy {
    /// 计算本帧的决策，并记住本帧的设置
    ///
    /// `very_smoothed_frame_time_ms` 为对偶发卡顿不敏感的平均帧时间。
    pub fn evaluate(
        &mut self,
        frame_index: u64,
        settings: &PipelineSettings,
        very_smoothed_frame_time_ms: f32,
        reset_requested: bool,
    ) -> HistoryDecision {
        let prev = self.prev_settings.unwrap_or(*settings);
        let frame_time_ms = very_smoothed_frame_time_ms.max(f32::EPSILON);

        // 1. 不兼容的状态变化
        let reset_cause = Self::reset_cause(frame_index, settings, &prev, reset_requested);
        let force_reset = reset_cause.is_some();

        // 2. 发光强度变化，换算为与帧率无关的速率
        let reset_factor = if force_reset {
            0.0
        } else {
            let a = (1.0 + settings.emission_intensity()).log2();
            let b = (1.0 + prev.emission_intensity()).log2();
            let d = (a - b).abs() * 1000.0 / frame_time_ms;
            let factor = 1.0 / (1.0 + self.history.emission_sensitivity * d);
            if factor.is_nan() { 0.0 } else { factor.clamp(0.0, 1.0) }
        };

        // 3. 按帧率换算的 history 长度
        let (base_budget, shadow_stabilized) = if settings.adaptive_accumulation {
            let fps = (1000.0 / frame_time_ms).min(self.history.fps_clamp);
            let max_accumulated = Self::frames_for_time(self.history.accumulation_time_s, fps)
                .max(1)
                .min(self.history.max_history_frame_num);
            let shadow = Self::frames_for_time(self.history.shadow_accumulation_time_s, fps)
                .min(self.history.max_shadow_stabilized_frame_num);
            (
                AccumulationBudget {
                    max_accumulated,
                    max_fast_accumulated: max_accumulated / self.history.fast_history_divisor,
                    max_stabilized: max_accumulated,
                },
                shadow,
            )
        } else {
            let max_accumulated = settings.max_accumulated_frame_num.min(self.history.max_history_frame_num);
            (
                AccumulationBudget {
                    max_accumulated,
                    max_fast_accumulated: settings.max_fast_accumulated_frame_num.min(max_accumulated),
                    max_stabilized: max_accumulated,
                },
                self.history.max_shadow_stabilized_frame_num,
            )
        };

        // 4. 按系数缩放
        let budget = AccumulationBudget {
            max_accumulated: Self::scale_frames(base_budget.max_accumulated, reset_factor, true),
            max_fast_accumulated: Self::scale_frames(base_budget.max_fast_accumulated, reset_factor, false),
            max_stabilized: base_budget.max_stabilized,
        };

        let upscaler_reset = force_reset || settings.upscaler.is_enabled() != prev.upscaler.is_enabled();
        let feedback = self.feedback_constants(settings, budget.max_accumulated, reset_factor);

        self.prev_settings = Some(*settings);

        if let Some(cause) = reset_cause {
            log::info!("history reset at frame {}: {}", frame_index, cause);
        }
        log::debug!(
            "history: factor {:.3}, frames {}/{} (base {}/{}), stabilized {}, shadow {}",
            reset_factor,
            budget.max_accumulated,
            budget.max_fast_accumulated,
            base_budget.max_accumulated,
            base_budget.max_fast_accumulated,
            budget.max_stabilized,
            shadow_stabilized
        );

        HistoryDecision {
            force_reset,
            reset_cause,
            reset_factor,
            base_budget,
            budget,
            shadow_stabilized,
            accumulation_mode: if force_reset { AccumulationMode::ClearAndRestart } else { AccumulationMode::Continue },
            upscaler_reset,
            feedback,
        }
    }
}

// tools
impl HistoryPolicy {
    fn reset_cause(
        frame_index: u64,
        settings: &PipelineSettings,
        prev: &PipelineSettings,
        reset_requested: bool,
    ) -> Option<HistoryResetCause> {
        if frame_index == 0 {
            Some(HistoryResetCause::FirstFrame)
        } else if settings.denoiser != prev.denoiser {
            Some(HistoryResetCause::DenoiserChanged)
        } else if settings.ortho != prev.ortho {
            Some(HistoryResetCause::ProjectionChanged)
        } else if settings.upscaler.is_reconstruction() != prev.upscaler.is_reconstruction() {
            Some(HistoryResetCause::ReconstructionToggled)
        } else if reset_requested {
            Some(HistoryResetCause::Requested)
        } else {
            None
        }
    }

    /// 在给定帧率下累积 `time_s` 秒需要的帧数，四舍五入
    #[inline]
    fn frames_for_time(time_s: f32, fps: f32) -> u32 {
        (time_s * fps + 0.5) as u32
    }

    /// 按系数缩放帧数，四舍五入
    ///
    /// `keep_one` 时只要系数大于 0，原本非零的帧数缩放后至少为 1。
    #[inline]
    fn scale_frames(frames: u32, factor: f32, keep_one: bool) -> u32 {
        let scaled = (frames as f32 * factor + 0.5) as u32;
        if keep_one && factor > 0.0 && frames >= 1 { scaled.max(1) } else { scaled }
    }

    fn feedback_constants(
        &self,
        settings: &PipelineSettings,
        max_accumulated: u32,
        reset_factor: f32,
    ) -> TemporalFeedbackConstants {
        let is_reference = settings.denoiser == DenoiserKind::Reference;

        let taa_frames = max_accumulated as f32 * self.history.taa_history_scale;
        let taa_weight = if !is_reference && settings.taa { 1.0 / (1.0 + taa_frames) } else { 1.0 };

        let prev_frames = max_accumulated as f32 * self.history.prev_frame_history_scale;
        let prev_frame_confidence =
            if settings.use_prev_frame && !settings.upscaler.is_reconstruction() && !is_reference {
                prev_frames / (1.0 + prev_frames)
            } else {
                0.0
            };

        TemporalFeedbackConstants {
            taa_weight,
            prev_frame_confidence,
            max_accumulated_frame_num: max_accumulated,
            reset_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noctis_render_interface::pipeline_settings::UpscalerMode;

    const FPS_60_MS: f32 = 1000.0 / 60.0;

    fn policy() -> HistoryPolicy {
        HistoryPolicy::new(HistorySettings::default())
    }

    #[test]
    fn test_first_frame_forces_reset() {
        let mut policy = policy();
        let decision = policy.evaluate(0, &PipelineSettings::default(), FPS_60_MS, false);

        assert!(decision.force_reset);
        assert_eq!(decision.reset_cause, Some(HistoryResetCause::FirstFrame));
        assert_eq!(decision.reset_factor, 0.0);
        assert_eq!(decision.budget.max_accumulated, 0);
        assert_eq!(decision.budget.max_fast_accumulated, 0);
        assert_eq!(decision.accumulation_mode, AccumulationMode::ClearAndRestart);
        assert!(decision.upscaler_reset);
        assert_eq!(decision.feedback.taa_weight, 1.0);
    }

    #[test]
    fn test_adaptive_budget_at_60_fps() {
        let mut policy = policy();
        let settings = PipelineSettings::default();
        policy.evaluate(0, &settings, FPS_60_MS, false);
        let decision = policy.evaluate(1, &settings, FPS_60_MS, false);

        assert!(!decision.force_reset);
        assert_eq!(decision.reset_factor, 1.0);
        assert_eq!(decision.budget.max_accumulated, 20);
        assert_eq!(decision.budget.max_fast_accumulated, 4);
        assert_eq!(decision.budget.max_stabilized, 20);
        assert_eq!(decision.shadow_stabilized, 6);
        assert_eq!(decision.accumulation_mode, AccumulationMode::Continue);
        assert!((decision.feedback.taa_weight - 1.0 / 11.0).abs() < 1e-6);
        assert!((decision.feedback.prev_frame_confidence - 6.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_budget_respects_cap() {
        let mut policy = policy();
        let settings = PipelineSettings::default();
        for frame_time_ms in [0.1, 1.0, 8.0, 16.6, 33.3, 100.0, 1000.0, 10000.0] {
            let decision = policy.evaluate(1, &settings, frame_time_ms, false);
            assert!(decision.budget.max_accumulated <= 60, "{frame_time_ms} ms");
            assert!(decision.budget.max_accumulated >= 1, "{frame_time_ms} ms");
            assert!(decision.shadow_stabilized <= 7);
        }
        // 121 fps 上限：0.33 * 121 ≈ 40
        assert_eq!(policy.evaluate(2, &settings, 0.1, false).base_budget.max_accumulated, 40);
    }

    #[test]
    fn test_force_reset_ignores_continuous_signals() {
        let mut policy = policy();
        let mut settings = PipelineSettings::default();
        policy.evaluate(0, &settings, FPS_60_MS, false);
        policy.evaluate(1, &settings, FPS_60_MS, false);

        settings.denoiser = DenoiserKind::Relax;
        let decision = policy.evaluate(2, &settings, FPS_60_MS, false);
        assert_eq!(decision.reset_cause, Some(HistoryResetCause::DenoiserChanged));
        assert_eq!(decision.reset_factor, 0.0);

        settings.ortho = true;
        assert_eq!(policy.evaluate(3, &settings, FPS_60_MS, false).reset_cause, Some(HistoryResetCause::ProjectionChanged));

        settings.upscaler = UpscalerMode::Rr;
        let decision = policy.evaluate(4, &settings, FPS_60_MS, false);
        assert_eq!(decision.reset_cause, Some(HistoryResetCause::ReconstructionToggled));
        assert!(decision.upscaler_reset);

        assert_eq!(policy.evaluate(5, &settings, FPS_60_MS, true).reset_cause, Some(HistoryResetCause::Requested));
        assert!(!policy.evaluate(6, &settings, FPS_60_MS, false).force_reset);
    }

    #[test]
    fn test_emission_change_decays_history() {
        let mut policy = policy();
        let mut settings = PipelineSettings {
            emission: true,
            ..Default::default()
        };
        policy.evaluate(0, &settings, FPS_60_MS, false);
        policy.evaluate(1, &settings, FPS_60_MS, false);

        settings.emission_intensity_lights = 4.0;
        let decision = policy.evaluate(2, &settings, FPS_60_MS, false);
        assert!(!decision.force_reset);
        assert!(decision.reset_factor > 0.0 && decision.reset_factor < 1.0);
        // 系数很小时依然保留至少 1 帧
        assert!(decision.budget.max_accumulated >= 1);
        assert!(decision.budget.max_accumulated < decision.base_budget.max_accumulated);

        // 设置不再变化，恢复完整的 history
        assert_eq!(policy.evaluate(3, &settings, FPS_60_MS, false).reset_factor, 1.0);
    }

    #[test]
    fn test_sr_toggle_resets_upscaler_only() {
        let mut policy = policy();
        let mut settings = PipelineSettings::default();
        policy.evaluate(0, &settings, FPS_60_MS, false);
        policy.evaluate(1, &settings, FPS_60_MS, false);

        settings.upscaler = UpscalerMode::Sr;
        let decision = policy.evaluate(2, &settings, FPS_60_MS, false);
        assert!(!decision.force_reset);
        assert!(decision.upscaler_reset);
    }

    #[test]
    fn test_manual_budget_when_not_adaptive() {
        let mut policy = policy();
        let settings = PipelineSettings {
            adaptive_accumulation: false,
            ..Default::default()
        };
        policy.evaluate(0, &settings, FPS_60_MS, false);
        let decision = policy.evaluate(1, &settings, 5.0, false);
        assert_eq!(decision.budget.max_accumulated, 31);
        assert_eq!(decision.budget.max_fast_accumulated, 7);
        assert_eq!(decision.shadow_stabilized, 7);
    }

    #[test]
    fn test_manual_budget_is_capped() {
        let mut policy = policy();
        let settings = PipelineSettings {
            adaptive_accumulation: false,
            max_accumulated_frame_num: 500,
            max_fast_accumulated_frame_num: 200,
            ..Default::default()
        };
        policy.evaluate(0, &settings, FPS_60_MS, false);
        let decision = policy.evaluate(1, &settings, FPS_60_MS, false);
        assert_eq!(decision.base_budget.max_accumulated, 60);
        assert_eq!(decision.budget.max_accumulated, 60);
        assert_eq!(decision.budget.max_fast_accumulated, 60);
        assert_eq!(decision.budget.max_stabilized, 60);
        assert_eq!(decision.feedback.max_accumulated_frame_num, 60);
    }

    #[test]
    fn test_negative_emission_keeps_factor_in_range() {
        let mut policy = policy();
        let mut settings = PipelineSettings {
            emission: true,
            emission_intensity_lights: -3.0,
            emission_intensity_cubes: -3.0,
            ..Default::default()
        };
        policy.evaluate(0, &settings, FPS_60_MS, false);
        let decision = policy.evaluate(1, &settings, FPS_60_MS, false);
        assert_eq!(decision.reset_factor, 1.0);
        assert_eq!(decision.budget.max_accumulated, 20);

        settings.emission_intensity_lights = 2.0;
        let decision = policy.evaluate(2, &settings, FPS_60_MS, false);
        assert!((0.0..=1.0).contains(&decision.reset_factor));
        assert!(!decision.feedback.reset_factor.is_nan());
    }

    #[test]
    fn test_reference_disables_feedback() {
        let mut policy = policy();
        let settings = PipelineSettings {
            denoiser: DenoiserKind::Reference,
            ..Default::default()
        };
        policy.evaluate(0, &settings, FPS_60_MS, false);
        let decision = policy.evaluate(1, &settings, FPS_60_MS, false);
        assert_eq!(decision.feedback.taa_weight, 1.0);
        assert_eq!(decision.feedback.prev_frame_confidence, 0.0);
        assert_eq!(bytemuck::bytes_of(&decision.feedback).len(), 16);
    }
}
