//! 外部降噪库的边界
//!
//! 降噪库本身是不透明的：渲染器只通过 [`DenoiserSnapshot`] 告诉它每个语义槽位当前对应哪个资源、
//! 处于什么状态，降噪库返回后再通过快照报告资源的最终状态。

mod bridge;
mod headless;
mod snapshot;

pub use bridge::DenoiserBridge;
pub use headless::{HeadlessDenoiser, HeadlessDenoiserCall};
pub use snapshot::{DenoiserSnapshot, DenoiserSnapshotEntry};

use noctis_gfx::device::GfxDevice;

/// 降噪库的语义槽位
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DenoiserSlot {
    InMv,
    InNormalRoughness,
    InViewZ,
    InDiffRadianceHitDist,
    OutDiffRadianceHitDist,
    InSpecRadianceHitDist,
    OutSpecRadianceHitDist,
    InDiffConfidence,
    InSpecConfidence,
    InPenumbra,
    InTranslucency,
    OutShadowTranslucency,
    /// reference 模式的输入，与 `OutSignal` 指向同一个资源
    InSignal,
    OutSignal,
    OutValidation,
}

impl DenoiserSlot {
    #[inline]
    pub fn is_output(self) -> bool {
        matches!(
            self,
            Self::OutDiffRadianceHitDist
                | Self::OutSpecRadianceHitDist
                | Self::OutShadowTranslucency
                | Self::OutSignal
                | Self::OutValidation
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InMv => "IN_MV",
            Self::InNormalRoughness => "IN_NORMAL_ROUGHNESS",
            Self::InViewZ => "IN_VIEWZ",
            Self::InDiffRadianceHitDist => "IN_DIFF_RADIANCE_HITDIST",
            Self::OutDiffRadianceHitDist => "OUT_DIFF_RADIANCE_HITDIST",
            Self::InSpecRadianceHitDist => "IN_SPEC_RADIANCE_HITDIST",
            Self::OutSpecRadianceHitDist => "OUT_SPEC_RADIANCE_HITDIST",
            Self::InDiffConfidence => "IN_DIFF_CONFIDENCE",
            Self::InSpecConfidence => "IN_SPEC_CONFIDENCE",
            Self::InPenumbra => "IN_PENUMBRA",
            Self::InTranslucency => "IN_TRANSLUCENCY",
            Self::OutShadowTranslucency => "OUT_SHADOW_TRANSLUCENCY",
            Self::InSignal => "IN_SIGNAL",
            Self::OutSignal => "OUT_SIGNAL",
            Self::OutValidation => "OUT_VALIDATION",
        }
    }
}

/// 降噪库中的算法实例
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenoiserId {
    /// 阴影 + 半透明阴影
    Shadow,
    /// 漫反射 + 镜面反射，时空降噪 A
    Reblur,
    /// 漫反射 + 镜面反射，时空降噪 B
    Relax,
    /// 无偏累积
    Reference,
}

impl DenoiserId {
    pub const ALL: [DenoiserId; 4] = [Self::Shadow, Self::Reblur, Self::Relax, Self::Reference];

    /// 算法读写的槽位
    pub fn required_slots(self) -> &'static [DenoiserSlot] {
        use DenoiserSlot::*;
        match self {
            Self::Shadow => &[InMv, InNormalRoughness, InViewZ, InPenumbra, InTranslucency, OutShadowTranslucency],
            Self::Reblur | Self::Relax => &[
                InMv,
                InNormalRoughness,
                InViewZ,
                InDiffRadianceHitDist,
                OutDiffRadianceHitDist,
                InSpecRadianceHitDist,
                OutSpecRadianceHitDist,
                InDiffConfidence,
                InSpecConfidence,
                OutValidation,
            ],
            Self::Reference => &[InSignal, OutSignal],
        }
    }
}

/// 累积模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccumulationMode {
    #[default]
    Continue,
    /// 丢弃 history 重新累积
    ClearAndRestart,
}

/// 每帧所有算法共享的设置
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommonSettings {
    pub view_to_clip: glam::Mat4,
    pub view_to_clip_prev: glam::Mat4,
    pub world_to_view: glam::Mat4,
    pub world_to_view_prev: glam::Mat4,
    /// (1 / rect 宽, 1 / rect 高, 1)
    pub motion_vector_scale: glam::Vec3,
    /// 关闭 jitter 时为 0
    pub camera_jitter: glam::Vec2,
    pub camera_jitter_prev: glam::Vec2,
    pub resource_size: glam::UVec2,
    pub resource_size_prev: glam::UVec2,
    pub rect_size: glam::UVec2,
    pub rect_size_prev: glam::UVec2,
    pub denoising_range: f32,
    /// 小于该比例的屏幕区域不降噪，1 表示全屏都不降噪
    pub split_screen: f32,
    pub frame_index: u32,
    pub accumulation_mode: AccumulationMode,
    pub is_history_confidence_available: bool,
    pub enable_validation: bool,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            view_to_clip: glam::Mat4::IDENTITY,
            view_to_clip_prev: glam::Mat4::IDENTITY,
            world_to_view: glam::Mat4::IDENTITY,
            world_to_view_prev: glam::Mat4::IDENTITY,
            motion_vector_scale: glam::Vec3::ONE,
            camera_jitter: glam::Vec2::ZERO,
            camera_jitter_prev: glam::Vec2::ZERO,
            resource_size: glam::UVec2::ZERO,
            resource_size_prev: glam::UVec2::ZERO,
            rect_size: glam::UVec2::ZERO,
            rect_size_prev: glam::UVec2::ZERO,
            denoising_range: 1000.0,
            split_screen: 0.0,
            frame_index: 0,
            accumulation_mode: AccumulationMode::Continue,
            is_history_confidence_available: false,
            enable_validation: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    pub light_direction: glam::Vec3,
    pub max_stabilized_frame_num: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReblurSettings {
    pub max_accumulated_frame_num: u32,
    pub max_fast_accumulated_frame_num: u32,
    pub max_stabilized_frame_num: u32,
    pub hit_distance_scale: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelaxSettings {
    pub diffuse_max_accumulated_frame_num: u32,
    pub diffuse_max_fast_accumulated_frame_num: u32,
    pub specular_max_accumulated_frame_num: u32,
    pub specular_max_fast_accumulated_frame_num: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceSettings {
    pub max_accumulated_frame_num: u32,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            max_accumulated_frame_num: 1024,
        }
    }
}

/// 某个算法的参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DenoiserAlgorithmSettings {
    Shadow(ShadowSettings),
    Reblur(ReblurSettings),
    Relax(RelaxSettings),
    Reference(ReferenceSettings),
}

impl DenoiserAlgorithmSettings {
    /// 参数所属的算法
    pub fn id(&self) -> DenoiserId {
        match self {
            Self::Shadow(_) => DenoiserId::Shadow,
            Self::Reblur(_) => DenoiserId::Reblur,
            Self::Relax(_) => DenoiserId::Relax,
            Self::Reference(_) => DenoiserId::Reference,
        }
    }
}

/// 外部降噪库
///
/// 降噪库在 `denoise` 中自己录制命令、自己插入内部 barrier；
/// 返回前要么把每个资源的最终状态写进快照，要么设置 `restore_initial_state`。
pub trait Denoiser {
    /// 是否支持某个算法，`Renderer::new` 用它检查初始化是否成功
    fn supported(&self, id: DenoiserId) -> bool;

    fn new_frame(&mut self);

    fn set_common_settings(&mut self, settings: &CommonSettings);

    fn set_denoiser_settings(&mut self, settings: &DenoiserAlgorithmSettings);

    fn denoise(
        &mut self,
        device: &mut dyn GfxDevice,
        cmd_slot: usize,
        ids: &[DenoiserId],
        snapshot: &mut DenoiserSnapshot,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_reads_and_writes_signal() {
        let slots = DenoiserId::Reference.required_slots();
        assert_eq!(slots, &[DenoiserSlot::InSignal, DenoiserSlot::OutSignal]);
        assert!(!DenoiserSlot::InSignal.is_output());
        assert!(DenoiserSlot::OutSignal.is_output());
    }

    #[test]
    fn test_settings_know_their_algorithm() {
        let settings = DenoiserAlgorithmSettings::Reference(ReferenceSettings::default());
        assert_eq!(settings.id(), DenoiserId::Reference);
        assert!(DenoiserId::Shadow.required_slots().contains(&DenoiserSlot::OutShadowTranslucency));
    }
}
