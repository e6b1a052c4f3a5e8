use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::pipeline_settings::{FrameSettings, HistorySettings, PipelineSettings};

/// 渲染器的完整配置
///
/// 所有字段都有默认值，TOML 中缺失的键使用默认值：
///
/// ```toml
/// queued_frame_num = 2
///
/// [frame]
/// render_width = 1280
/// render_height = 720
///
/// [pipeline]
/// denoiser = "relax"
/// upscaler = "off"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// 同时在飞行中的帧数 Q
    pub queued_frame_num: usize,
    pub frame: FrameSettings,
    pub pipeline: PipelineSettings,
    pub history: HistorySettings,
}
impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            queued_frame_num: 2,
            frame: FrameSettings::default(),
            pipeline: PipelineSettings::default(),
            history: HistorySettings::default(),
        }
    }
}
impl RendererConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("failed to parse renderer config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    /// 初始化前的检查，失败时渲染器不会启动
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.queued_frame_num >= 1, "queued_frame_num must be at least 1");
        anyhow::ensure!(
            self.frame.render_width > 0 && self.frame.render_height > 0,
            "render resolution must be non-zero"
        );
        anyhow::ensure!(
            self.frame.output_width > 0 && self.frame.output_height > 0,
            "output resolution must be non-zero"
        );
        anyhow::ensure!(self.frame.swapchain_image_cnt >= 1, "swapchain needs at least one image");
        anyhow::ensure!(
            self.pipeline.resolution_scale > 0.0 && self.pipeline.resolution_scale <= 1.0,
            "resolution_scale must be in (0, 1], got {}",
            self.pipeline.resolution_scale
        );
        anyhow::ensure!(self.history.max_history_frame_num >= 1, "max_history_frame_num must be at least 1");
        anyhow::ensure!(self.history.fast_history_divisor >= 1, "fast_history_divisor must be at least 1");
        Ok(())
    }
}
