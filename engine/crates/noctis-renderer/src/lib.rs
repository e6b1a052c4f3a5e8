//! Noctis 帧循环
//!
//! - [`history_policy`]: 每帧允许保留多少 history
//! - [`denoiser`]: 外部降噪库的快照交换与状态写回
//! - [`upscaler`]: 外部时域 upscaler 与锐化
//! - [`frame_queue`]: 在飞行中的帧数上限
//! - [`renderer`]: 把以上部分串成一帧

pub mod denoiser;
pub mod frame_queue;
pub mod history_policy;
pub mod renderer;
pub mod upscaler;
