//! 帧计划：记录每个 pass 的状态需求和实际生成的 barrier，用于调试输出

use ash::vk;
use itertools::Itertools;

use noctis_gfx::resource_state::GfxResourceState;
use noctis_render_interface::gfx_resource_manager::GfxResourceManager;

use super::barrier::{RgBarrier, RgStateRequirement};

/// 一个 pass 在本帧的执行记录
#[derive(Clone, Debug)]
pub struct RgPlanEntry {
    pub pass_name: String,
    pub requirements: Vec<RgStateRequirement>,
    pub barriers: Vec<RgBarrier>,
    /// 降噪库返回后写回状态表的资源数量
    pub reconciled: usize,
}

/// 一帧的执行计划
#[derive(Clone, Debug, Default)]
pub struct RgFramePlan {
    pub frame_name: String,
    pub entries: Vec<RgPlanEntry>,
}

impl RgFramePlan {
    pub fn new(frame_name: impl Into<String>) -> Self {
        Self {
            frame_name: frame_name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: RgPlanEntry) {
        self.entries.push(entry);
    }

    #[inline]
    pub fn total_barriers(&self) -> usize {
        self.entries.iter().map(|e| e.barriers.len()).sum()
    }

    pub fn entry(&self, pass_name: &str) -> Option<&RgPlanEntry> {
        self.entries.iter().find(|e| e.pass_name == pass_name)
    }

    #[inline]
    pub fn pass_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.pass_name.as_str()).collect()
    }
}

// 调试输出
impl RgFramePlan {
    /// 打印执行计划
    ///
    /// 每个 pass 输出：状态需求（含资源名称）、生成的 barrier（layout 转换、stage、access）、
    /// 以及降噪库写回的资源数量。
    pub fn print(&self, manager: &GfxResourceManager) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              Frame Plan {:<41}║", self.frame_name);
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!("║ Passes: {}  |  Barriers: {}", self.entries.len(), self.total_barriers());
        log::info!("║ Order: [{}]", self.entries.iter().map(|e| e.pass_name.as_str()).join(" → "));
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (order, entry) in self.entries.iter().enumerate() {
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Pass: \"{}\"", order + 1, self.entries.len(), entry.pass_name);
            log::info!("├─────────────────────────────────────────────────────────────────┤");

            for requirement in &entry.requirements {
                let icon = if requirement.state.is_write() { "✏️ " } else { "📖" };
                log::info!(
                    "│   {} \"{}\" {}",
                    icon,
                    manager.name(requirement.handle),
                    format_state(&requirement.state)
                );
            }

            if entry.barriers.is_empty() {
                log::info!("│ No barriers required");
            } else {
                log::info!("├─────────────────────────────────────────────────────────────────┤");
                log::info!("│ Barriers: {}", entry.barriers.len());
                for barrier in &entry.barriers {
                    let kind = if barrier.is_hazard() { " (hazard)" } else { "" };
                    log::info!("│   🔒 \"{}\"{}:", manager.name(barrier.handle), kind);
                    if barrier.is_layout_transition() {
                        log::info!("│       Layout: {:?} → {:?}", barrier.before.layout, barrier.after.layout);
                    }
                    log::info!(
                        "│       Stage:  {} → {}",
                        format_pipeline_stage(barrier.before.stage),
                        format_pipeline_stage(barrier.after.stage)
                    );
                    log::info!(
                        "│       Access: {} → {}",
                        format_access_flags(barrier.before.access),
                        format_access_flags(barrier.after.access)
                    );
                }
            }

            if entry.reconciled > 0 {
                log::info!("│ Reconciled from denoiser: {} resources", entry.reconciled);
            }
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("═══════════════════════ End of Frame Plan ═══════════════════════");
    }
}

fn format_state(state: &GfxResourceState) -> String {
    if state.layout == vk::ImageLayout::UNDEFINED {
        format!(
            "(stage: {}, access: {})",
            format_pipeline_stage(state.stage),
            format_access_flags(state.access)
        )
    } else {
        format!(
            "@ {:?} (stage: {}, access: {})",
            state.layout,
            format_pipeline_stage(state.stage),
            format_access_flags(state.access)
        )
    }
}

const STAGE_NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
    (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
    (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
    (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE"),
    (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
    (vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR, "AS_BUILD"),
    (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
];

const ACCESS_NAMES: &[(vk::AccessFlags2, &str)] = &[
    (vk::AccessFlags2::SHADER_SAMPLED_READ, "SAMPLED_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
    (vk::AccessFlags2::SHADER_READ, "SHADER_READ"),
    (vk::AccessFlags2::SHADER_WRITE, "SHADER_WRITE"),
    (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
    (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
    (vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR, "AS_READ"),
    (vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR, "AS_WRITE"),
    (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
    (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
];

/// 格式化 PipelineStageFlags2 为可读字符串
fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
    if stage == vk::PipelineStageFlags2::NONE {
        return "NONE".to_string();
    }
    let names = STAGE_NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).join(" | ");
    if names.is_empty() { format!("{:?}", stage) } else { names }
}

/// 格式化 AccessFlags2 为可读字符串
fn format_access_flags(access: vk::AccessFlags2) -> String {
    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }
    let names = ACCESS_NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).join(" | ");
    if names.is_empty() { format!("{:?}", access) } else { names }
}
