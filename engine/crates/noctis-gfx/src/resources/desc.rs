use ash::vk;
use ash::vk::Handle;

/// 纹理描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxTextureDesc {
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
}

impl GfxTextureDesc {
    /// 单 mip、单 layer 的可读写纹理
    pub fn new(format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            format,
            extent: vk::Extent2D { width, height },
            mip_levels: 1,
            array_layers: 1,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE,
        }
    }

    /// builder
    #[inline]
    pub fn usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    /// builder
    #[inline]
    pub fn mips_and_layers(mut self, mip_levels: u32, array_layers: u32) -> Self {
        self.mip_levels = mip_levels;
        self.array_layers = array_layers;
        self
    }

    /// 根据 format 推断 aspect
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        match self.format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }

            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,

            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }

            _ => vk::ImageAspectFlags::COLOR,
        }
    }
}

/// 缓冲区描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

impl GfxBufferDesc {
    #[inline]
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self { size, usage }
    }

    /// 加速结构的存储 buffer
    #[inline]
    pub fn acceleration_structure(size: vk::DeviceSize) -> Self {
        Self::new(
            size,
            vk::BufferUsageFlags::ACCELERATION_STRUCTURE_STORAGE_KHR | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        )
    }
}

/// 资源种类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxResourceDesc {
    Texture(GfxTextureDesc),
    Buffer(GfxBufferDesc),
}

impl GfxResourceDesc {
    #[inline]
    pub fn is_texture(&self) -> bool {
        matches!(self, Self::Texture(_))
    }
}

/// 设备侧的原生句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxNativeHandle {
    Image(vk::Image),
    Buffer(vk::Buffer),
}

impl GfxNativeHandle {
    #[inline]
    pub fn as_raw(&self) -> u64 {
        match self {
            Self::Image(image) => image.as_raw(),
            Self::Buffer(buffer) => buffer.as_raw(),
        }
    }

    #[inline]
    pub fn image(&self) -> Option<vk::Image> {
        match self {
            Self::Image(image) => Some(*image),
            Self::Buffer(_) => None,
        }
    }

    #[inline]
    pub fn buffer(&self) -> Option<vk::Buffer> {
        match self {
            Self::Buffer(buffer) => Some(*buffer),
            Self::Image(_) => None,
        }
    }
}
