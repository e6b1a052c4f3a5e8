use slotmap::SlotMap;

use noctis_gfx::device::GfxDevice;
use noctis_gfx::resources::desc::{GfxBufferDesc, GfxNativeHandle, GfxResourceDesc, GfxTextureDesc};

use crate::handles::GfxResourceHandle;

/// arena 中的一个资源
pub struct GfxResource {
    name: String,
    desc: GfxResourceDesc,
    native: GfxNativeHandle,
    /// 外部持有（例如 swapchain image），不由 manager 销毁
    imported: bool,
}

// getters
impl GfxResource {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn desc(&self) -> &GfxResourceDesc {
        &self.desc
    }

    #[inline]
    pub fn native(&self) -> GfxNativeHandle {
        self.native
    }

    #[inline]
    pub fn is_imported(&self) -> bool {
        self.imported
    }

    #[inline]
    pub fn is_texture(&self) -> bool {
        self.desc.is_texture()
    }

    /// 纹理的 aspect，缓冲区返回空
    #[inline]
    pub fn aspect(&self) -> ash::vk::ImageAspectFlags {
        match &self.desc {
            GfxResourceDesc::Texture(desc) => desc.aspect(),
            GfxResourceDesc::Buffer(_) => ash::vk::ImageAspectFlags::empty(),
        }
    }
}

/// 资源管理器
///
/// 持有渲染器生命周期内的所有纹理与缓冲区，对外只提供轻量级的 Handle。
/// 资源只在初始化（或分辨率变化）时创建，不会在帧中途重新分配。
pub struct GfxResourceManager {
    resources: SlotMap<GfxResourceHandle, GfxResource>,

    destroyed: bool,
}
impl Default for GfxResourceManager {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl GfxResourceManager {
    pub fn new() -> Self {
        Self {
            resources: SlotMap::with_key(),
            destroyed: false,
        }
    }
}
// destroy
impl GfxResourceManager {
    pub fn destroy(mut self, device: &mut dyn GfxDevice) {
        self.destroy_mut(device);
    }

    pub fn destroy_mut(&mut self, device: &mut dyn GfxDevice) {
        for (_, resource) in self.resources.drain() {
            if !resource.imported {
                device.destroy_resource(resource.native);
            }
        }
        self.destroyed = true;
    }
}
impl Drop for GfxResourceManager {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            if !std::thread::panicking() {
                assert!(self.destroyed || self.resources.is_empty(), "GfxResourceManager dropped without destroy");
            }
        }
    }
}
// 资源创建与销毁
impl GfxResourceManager {
    pub fn create_texture(
        &mut self,
        device: &mut dyn GfxDevice,
        name: impl Into<String>,
        desc: GfxTextureDesc,
    ) -> GfxResourceHandle {
        let name = name.into();
        let native = device.create_texture(&name, &desc);
        log::debug!("create texture \"{}\" {:?} {}x{}", name, desc.format, desc.extent.width, desc.extent.height);
        self.insert(name, GfxResourceDesc::Texture(desc), native, false)
    }

    pub fn create_buffer(
        &mut self,
        device: &mut dyn GfxDevice,
        name: impl Into<String>,
        desc: GfxBufferDesc,
    ) -> GfxResourceHandle {
        let name = name.into();
        let native = device.create_buffer(&name, &desc);
        log::debug!("create buffer \"{}\" {} bytes", name, desc.size);
        self.insert(name, GfxResourceDesc::Buffer(desc), native, false)
    }

    /// 导入外部持有的纹理（swapchain image）
    pub fn import_texture(
        &mut self,
        name: impl Into<String>,
        native: GfxNativeHandle,
        desc: GfxTextureDesc,
    ) -> GfxResourceHandle {
        self.insert(name.into(), GfxResourceDesc::Texture(desc), native, true)
    }

    /// 销毁单个资源；imported 资源只会被移除
    pub fn destroy_resource(&mut self, device: &mut dyn GfxDevice, handle: GfxResourceHandle) {
        if let Some(resource) = self.resources.remove(handle) {
            if !resource.imported {
                device.destroy_resource(resource.native);
            }
        }
    }

    fn insert(
        &mut self,
        name: String,
        desc: GfxResourceDesc,
        native: GfxNativeHandle,
        imported: bool,
    ) -> GfxResourceHandle {
        self.destroyed = false;
        self.resources.insert(GfxResource {
            name,
            desc,
            native,
            imported,
        })
    }
}
// getters
impl GfxResourceManager {
    #[inline]
    pub fn get(&self, handle: GfxResourceHandle) -> Option<&GfxResource> {
        self.resources.get(handle)
    }

    /// 原生句柄，句柄无效时 panic
    #[inline]
    pub fn native(&self, handle: GfxResourceHandle) -> GfxNativeHandle {
        match self.resources.get(handle) {
            Some(resource) => resource.native,
            None => panic!("unknown resource handle {:?}", handle),
        }
    }

    /// 调试名称，句柄无效时返回 `<unknown>`
    #[inline]
    pub fn name(&self, handle: GfxResourceHandle) -> &str {
        self.resources.get(handle).map(|r| r.name.as_str()).unwrap_or("<unknown>")
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (GfxResourceHandle, &GfxResource)> {
        self.resources.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use noctis_gfx::headless::HeadlessDevice;

    #[test]
    fn test_destroy_skips_imported() {
        let mut device = HeadlessDevice::new(1, vk::Extent2D { width: 8, height: 8 });
        let mut manager = GfxResourceManager::new();

        let texture =
            manager.create_texture(&mut device, "Mv", GfxTextureDesc::new(vk::Format::R16G16B16A16_SFLOAT, 8, 8));
        let buffer = manager.create_buffer(
            &mut device,
            "InstanceData",
            GfxBufferDesc::new(256, vk::BufferUsageFlags::STORAGE_BUFFER),
        );
        let (swapchain_native, swapchain_desc) = device.swapchain_images()[0];
        let swapchain = manager.import_texture("Swapchain#0", swapchain_native, swapchain_desc);

        assert_eq!(manager.len(), 3);
        assert_eq!(manager.name(texture), "Mv");
        assert!(manager.get(buffer).is_some_and(|r| !r.is_texture()));
        assert!(manager.get(swapchain).is_some_and(|r| r.is_imported()));
        assert_eq!(device.live_resource_count(), 2);

        manager.destroy(&mut device);
        assert_eq!(device.live_resource_count(), 0);
    }
}
