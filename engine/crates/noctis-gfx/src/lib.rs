//! Noctis 图形设备抽象层
//!
//! 封装资源状态（stage / access / layout）、Vulkan barrier 的构建，
//! 以及渲染器依赖的图形设备协作者接口 [`device::GfxDevice`]。
//!
//! 真实的设备、交换链、管线创建不在这里，渲染器只通过 trait 与其交互。
//! [`headless::HeadlessDevice`] 是一个只记录命令的实现，用于测试与离线运行。

pub mod commands;
pub mod device;
pub mod headless;
pub mod resource_state;
pub mod resources;
