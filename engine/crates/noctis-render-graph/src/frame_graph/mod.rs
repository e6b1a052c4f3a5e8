//! 帧级资源状态跟踪与 pass 序列
//!
//! 与通用的 render graph 不同，这里的 pass 顺序是固定的，
//! 只会根据配置（降噪算法、upscaler 模式、reference 模式）裁剪掉部分 pass，
//! 不做依赖分析和拓扑排序。
//!
//! # 核心概念
//!
//! - **RgResourceStateTable**: 每个资源最后已知的 stage / access / layout
//! - **RgBarrierPlanner**: 把 pass 的状态需求与状态表比较，生成最少的 barrier
//! - **RgPingPong**: 按帧奇偶性交替的两个物理资源
//! - **RgPassNode**: 一个 pass 的状态需求（先读后写）与要执行的命令
//! - **FrameResources**: 一帧用到的全部资源及其初始状态
//! - **build_frame_passes**: 根据配置生成当前帧的 pass 序列
//!
//! # 使用示例
//!
//! ```ignore
//! let passes = build_frame_passes(&resources, &ctx);
//! for pass in &passes {
//!     let barriers = RgBarrierPlanner::plan(&mut table, &pass.requirements());
//!     device.cmd_barriers(cmd_slot, &RgBarrier::to_gfx_descs(&barriers, &manager));
//!     // 录制 pass 命令...
//! }
//! ```

mod barrier;
mod frame_passes;
mod frame_resources;
mod pass;
mod ping_pong;
mod plan;
mod state_table;

// Re-exports
pub use barrier::{RgBarrier, RgBarrierPlanner, RgStateRequirement};
pub use frame_passes::{CONFIDENCE_BLUR_ITERATIONS, RgFrameContext, build_frame_passes};
pub use frame_resources::FrameResources;
pub use pass::{RgDenoiseStage, RgPassBuilder, RgPassKind, RgPassNode};
pub use ping_pong::RgPingPong;
pub use plan::{RgFramePlan, RgPlanEntry};
pub use state_table::RgResourceStateTable;
