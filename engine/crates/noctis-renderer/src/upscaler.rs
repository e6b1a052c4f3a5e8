//! 外部 upscaler 的边界（时域上采样与锐化）

use std::cell::RefCell;
use std::rc::Rc;

use noctis_gfx::device::GfxDevice;
use noctis_gfx::resources::desc::GfxNativeHandle;

/// ray reconstruction 需要的 guide 纹理
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpscalerGuides {
    pub diffuse_albedo: GfxNativeHandle,
    pub specular_albedo: GfxNativeHandle,
    pub specular_hit_distance: GfxNativeHandle,
    pub normal_roughness: GfxNativeHandle,
}

/// 一次 upscaler 调用
///
/// 调用前渲染器已经通过 barrier 把 input 转换为只读、output 转换为存储读写，
/// upscaler 不改变任何资源的状态。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpscalerDispatchDesc {
    pub output: GfxNativeHandle,
    pub input: GfxNativeHandle,
    pub current_resolution: glam::UVec2,
    pub jitter: glam::Vec2,
    /// 丢弃 history
    pub reset: bool,
    /// 只在 ray reconstruction 模式下提供
    pub guides: Option<UpscalerGuides>,
    pub sharpness: f32,
}

pub trait Upscaler {
    fn dispatch(&mut self, device: &mut dyn GfxDevice, cmd_slot: usize, desc: &UpscalerDispatchDesc);
}

/// 只记录调用的 upscaler
pub struct HeadlessUpscaler {
    name: &'static str,
    dispatches: Rc<RefCell<Vec<UpscalerDispatchDesc>>>,
}

impl HeadlessUpscaler {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            dispatches: Rc::new(RefCell::new(Vec::new())),
        }
    }

    #[inline]
    pub fn dispatches(&self) -> Rc<RefCell<Vec<UpscalerDispatchDesc>>> {
        self.dispatches.clone()
    }
}

impl Upscaler for HeadlessUpscaler {
    fn dispatch(&mut self, device: &mut dyn GfxDevice, cmd_slot: usize, desc: &UpscalerDispatchDesc) {
        let group_count = glam::UVec3::new(desc.current_resolution.x.div_ceil(16), desc.current_resolution.y.div_ceil(16), 1);
        device.cmd_dispatch(cmd_slot, self.name, group_count);
        self.dispatches.borrow_mut().push(*desc);
    }
}
