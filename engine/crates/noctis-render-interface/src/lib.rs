//! 渲染器与 GPU 资源之间的边界
//!
//! - [`handles`]: 强类型的资源句柄
//! - [`gfx_resource_manager`]: 持有所有 GPU 资源的 arena
//! - [`frame_counter`]: 帧序号与奇偶性
//! - [`pipeline_settings`] / [`config`]: 渲染配置与 TOML 加载
//! - [`timer`]: 帧时间与平滑后的帧时间

pub mod config;
pub mod frame_counter;
pub mod gfx_resource_manager;
pub mod handles;
pub mod pipeline_settings;
pub mod timer;
