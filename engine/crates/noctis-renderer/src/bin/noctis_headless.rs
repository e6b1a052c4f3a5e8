//! 无 GPU 的帧循环
//!
//! 用只记录命令的设备、降噪库与 upscaler 跑一段脚本化的帧序列，
//! 输出每帧的 history 决策与 barrier 数量。
//!
//! 用法：`noctis-headless [config.toml] [--plan]`，不指定配置时读取 `config/noctis.toml`（如果存在）。

use glam::{Mat4, Vec2, Vec3};

use noctis_crate_tools::init_log::init_log;
use noctis_crate_tools::resource::NoctisPath;
use noctis_gfx::headless::HeadlessDevice;
use noctis_render_interface::config::RendererConfig;
use noctis_render_interface::pipeline_settings::{DenoiserKind, PipelineSettings, UpscalerMode};
use noctis_renderer::denoiser::HeadlessDenoiser;
use noctis_renderer::renderer::{FrameInput, Renderer};
use noctis_renderer::upscaler::HeadlessUpscaler;

const FRAME_NUM: u64 = 120;
const FRAME_TIME_MS: f32 = 1000.0 / 60.0;

/// 8 个采样的 Halton(2, 3) 抖动，单位为像素
fn jitter(frame_index: u64) -> Vec2 {
    fn halton(mut index: u64, base: u64) -> f32 {
        let mut f = 1.0;
        let mut r = 0.0;
        while index > 0 {
            f /= base as f32;
            r += f * (index % base) as f32;
            index /= base;
        }
        r
    }
    let i = frame_index % 8 + 1;
    Vec2::new(halton(i, 2) - 0.5, halton(i, 3) - 0.5)
}

/// 脚本：每隔一段时间改变一项设置
fn scripted_settings(base: &PipelineSettings, frame_index: u64) -> PipelineSettings {
    let mut settings = *base;
    if frame_index >= 30 {
        settings.denoiser = DenoiserKind::Relax;
    }
    if frame_index >= 45 {
        settings.emission = true;
        // 缓慢变化的发光强度只会衰减 history，不会强制重置
        settings.emission_intensity_lights = 1.0 + (frame_index - 45) as f32 * 0.05;
    }
    if frame_index >= 60 {
        settings.upscaler = UpscalerMode::Sr;
    }
    if frame_index >= 75 {
        settings.upscaler = UpscalerMode::Rr;
    }
    if frame_index >= 90 {
        settings.denoiser = DenoiserKind::Reference;
        settings.upscaler = UpscalerMode::Off;
    }
    settings
}

fn load_config(path: Option<&str>) -> anyhow::Result<RendererConfig> {
    if let Some(path) = path {
        return RendererConfig::load(path);
    }
    let default_path = NoctisPath::config_path("noctis.toml");
    if default_path.exists() {
        log::info!("using config {}", default_path.display());
        RendererConfig::load(default_path)
    } else {
        Ok(RendererConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    init_log();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let print_plan = args.iter().any(|arg| arg == "--plan");
    let config_path = args.iter().find(|arg| !arg.starts_with("--")).map(String::as_str);
    let config = load_config(config_path)?;

    let device = HeadlessDevice::new(config.frame.swapchain_image_cnt, config.frame.output_extent());
    let mut renderer = Renderer::new(
        config,
        device,
        Box::new(HeadlessDenoiser::new()),
        Box::new(HeadlessUpscaler::new("temporal_upscaler")),
        Box::new(HeadlessUpscaler::new("sharpener")),
    )?;

    let aspect = config.frame.render_width as f32 / config.frame.render_height as f32;
    let view_to_clip = Mat4::perspective_rh(60f32.to_radians(), aspect, 0.1, 1000.0);

    for frame_index in 0..FRAME_NUM {
        let angle = frame_index as f32 * 0.01;
        let eye = Vec3::new(angle.cos() * 10.0, 3.0, angle.sin() * 10.0);
        let input = FrameInput {
            view_to_clip,
            world_to_view: Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
            jitter: jitter(frame_index),
            delta_ms: FRAME_TIME_MS,
            settings: scripted_settings(&config.pipeline, frame_index),
        };

        let report = renderer.render_frame(&input);
        let decision = &report.decision;
        log::info!(
            "frame {:>3}: {:>3} passes, {:>3} barriers, {:>2} reconciled | factor {:.3}, frames {}/{}{}",
            report.frame_index,
            report.pass_count,
            report.barrier_count,
            report.reconciled_count,
            decision.reset_factor,
            decision.budget.max_accumulated,
            decision.budget.max_fast_accumulated,
            decision.reset_cause.map(|cause| format!(", reset: {cause}")).unwrap_or_default()
        );
    }

    if print_plan {
        renderer.print_frame_plan();
    }

    let submissions = renderer.device().submissions().len();
    let blocking_waits = renderer.device().blocking_waits().len();
    renderer.destroy();
    log::info!("{} frames submitted, {} blocking fence waits", submissions, blocking_waits);

    Ok(())
}
