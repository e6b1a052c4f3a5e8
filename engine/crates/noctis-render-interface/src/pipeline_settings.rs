use ash::vk;
use serde::{Deserialize, Serialize};

/// 主信号使用的降噪算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiserKind {
    /// 时空降噪 A（带 history confidence 与 stabilization）
    #[default]
    Reblur,
    /// 时空降噪 B
    Relax,
    /// 参考累积：主信号仍然走 Reblur，之后在 composed 上做无偏累积
    Reference,
}

/// 输出分辨率阶段的时域上采样模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscalerMode {
    /// 不使用外部 upscaler，走 TAA
    #[default]
    Off,
    /// super resolution
    Sr,
    /// ray reconstruction，需要额外的 guide 纹理
    Rr,
}
impl UpscalerMode {
    #[inline]
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    #[inline]
    pub fn is_reconstruction(self) -> bool {
        matches!(self, Self::Rr)
    }
}

/// 帧级渲染配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    pub render_width: u32,
    pub render_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub swapchain_image_cnt: usize,
    /// 辐射度缓存相对渲染分辨率的缩小倍数
    pub sharc_downscale: u32,
}
impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            render_width: 1280,
            render_height: 720,
            output_width: 1280,
            output_height: 720,
            swapchain_image_cnt: 3,
            sharc_downscale: 4,
        }
    }
}
impl FrameSettings {
    #[inline]
    pub fn render_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.render_width,
            height: self.render_height,
        }
    }

    #[inline]
    pub fn output_extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.output_width,
            height: self.output_height,
        }
    }

    /// 实际渲染的矩形区域
    pub fn rect_size(&self, resolution_scale: f32) -> glam::UVec2 {
        glam::UVec2::new(
            (self.render_width as f32 * resolution_scale + 0.5) as u32,
            (self.render_height as f32 * resolution_scale + 0.5) as u32,
        )
    }

    /// 辐射度缓存纹理尺寸，对齐到 16
    pub fn sharc_extent(&self) -> vk::Extent2D {
        let downscale = self.sharc_downscale.max(1);
        vk::Extent2D {
            width: 16 * ((self.render_width / downscale).div_ceil(16)),
            height: 16 * ((self.render_height / downscale).div_ceil(16)),
        }
    }
}

/// 管线级配置，每帧都可以改变
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub denoiser: DenoiserKind,
    pub upscaler: UpscalerMode,
    /// 不使用 upscaler 时是否开启 TAA
    pub taa: bool,
    /// 正交投影
    pub ortho: bool,

    pub emission: bool,
    pub emission_intensity_lights: f32,
    pub emission_intensity_cubes: f32,

    /// 根据帧率自动决定 history 长度
    pub adaptive_accumulation: bool,
    /// 非 adaptive 时使用的 history 长度
    pub max_accumulated_frame_num: u32,
    pub max_fast_accumulated_frame_num: u32,

    /// 上一帧的结果参与下一帧的 trace（反馈回路）
    pub use_prev_frame: bool,
    pub history_confidence: bool,
    /// 分屏对比位置，0 表示全屏降噪
    pub separator: f32,
    pub camera_jitter: bool,
    pub show_validation: bool,
    pub resolution_scale: f32,
    pub sharpness: f32,
    pub hit_dist_scale: f32,
    pub denoising_range: f32,
    pub sun_direction: glam::Vec3,
}
impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            denoiser: DenoiserKind::Reblur,
            upscaler: UpscalerMode::Off,
            taa: true,
            ortho: false,

            emission: false,
            emission_intensity_lights: 1.0,
            emission_intensity_cubes: 1.0,

            adaptive_accumulation: true,
            max_accumulated_frame_num: 31,
            max_fast_accumulated_frame_num: 7,

            use_prev_frame: true,
            history_confidence: true,
            separator: 0.0,
            camera_jitter: true,
            show_validation: false,
            resolution_scale: 1.0,
            sharpness: 0.2,
            hit_dist_scale: 3.0,
            denoising_range: 1000.0,
            sun_direction: glam::Vec3::new(-0.3, -1.0, -0.2),
        }
    }
}
impl PipelineSettings {
    /// 经过 log 压缩之前的发光强度，负值视为 0
    #[inline]
    pub fn emission_intensity(&self) -> f32 {
        if self.emission { self.emission_intensity_lights.max(self.emission_intensity_cubes).max(0.0) } else { 0.0 }
    }
}

/// history 长度相关的常量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// 目标累积时间（秒），帧数由帧率换算
    pub accumulation_time_s: f32,
    /// history 长度的硬上限
    pub max_history_frame_num: u32,
    /// 换算帧数时帧率的上限
    pub fps_clamp: f32,
    /// 发光强度变化的敏感度 k
    pub emission_sensitivity: f32,
    pub fast_history_divisor: u32,

    pub shadow_accumulation_time_s: f32,
    pub max_shadow_stabilized_frame_num: u32,

    /// TAA 混合权重使用的 history 比例
    pub taa_history_scale: f32,
    /// 上一帧反馈权重使用的 history 比例
    pub prev_frame_history_scale: f32,
}
impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            accumulation_time_s: 0.33,
            max_history_frame_num: 60,
            fps_clamp: 121.0,
            emission_sensitivity: 0.2,
            fast_history_divisor: 5,

            shadow_accumulation_time_s: 0.1,
            max_shadow_stabilized_frame_num: 7,

            taa_history_scale: 0.5,
            prev_frame_history_scale: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emission_intensity_respects_toggle() {
        let mut settings = PipelineSettings {
            emission_intensity_lights: 2.0,
            emission_intensity_cubes: 5.0,
            ..Default::default()
        };
        assert_eq!(settings.emission_intensity(), 0.0);
        settings.emission = true;
        assert_eq!(settings.emission_intensity(), 5.0);

        settings.emission_intensity_lights = -3.0;
        settings.emission_intensity_cubes = -3.0;
        assert_eq!(settings.emission_intensity(), 0.0);
    }

    #[test]
    fn test_sharc_extent_is_aligned() {
        let frame = FrameSettings {
            render_width: 1920,
            render_height: 1080,
            ..Default::default()
        };
        let extent = frame.sharc_extent();
        assert_eq!(extent.width, 480);
        assert_eq!(extent.height, 272);
    }

    #[test]
    fn test_rect_size_rounds() {
        let frame = FrameSettings::default();
        assert_eq!(frame.rect_size(0.5), glam::UVec2::new(640, 360));
    }
}
