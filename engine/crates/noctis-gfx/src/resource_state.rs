//! 资源状态定义
//!
//! 封装 Vulkan 的 pipeline stage、access mask 和 image layout，
//! 纹理与缓冲区共用同一个状态结构，缓冲区的 layout 固定为 `UNDEFINED`。

use ash::vk;

/// 资源状态
///
/// 每个资源在任意时刻都只有一个当前状态，barrier 就是两个状态之间的转换。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxResourceState {
    /// Pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Access mask
    pub access: vk::AccessFlags2,
    /// Image layout，缓冲区恒为 `UNDEFINED`
    pub layout: vk::ImageLayout,
}

impl Default for GfxResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl GfxResourceState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// 纹理状态，layout 由 access 推导
    #[inline]
    pub fn texture(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self::new(stage, access, default_layout_for(access))
    }

    /// 缓冲区状态
    #[inline]
    pub const fn buffer(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self::new(stage, access, vk::ImageLayout::UNDEFINED)
    }

    // ============ 纹理状态常量 ============

    /// 未定义状态（初始状态或不关心内容）
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 着色器只读采样（计算着色器）
    pub const SHADER_READ_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 存储图像读写（计算着色器）
    pub const STORAGE_READ_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
        vk::ImageLayout::GENERAL,
    );

    /// 传输源
    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    /// 传输目标
    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    /// 呈现（swapchain image）
    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    // ============ 缓冲区状态常量 ============

    /// 存储缓冲区只读（计算着色器）
    pub const BUFFER_READ_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ);

    /// 存储缓冲区读写（计算着色器）
    pub const BUFFER_STORAGE_READ_WRITE_COMPUTE: Self = Self::buffer(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
    );

    /// 常量缓冲区（计算着色器）
    pub const BUFFER_UNIFORM_READ_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::UNIFORM_READ);

    /// 缓冲区传输目标（上传、清零）
    pub const BUFFER_TRANSFER_DST: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);

    /// 加速结构构建输入（instance 数据）
    pub const ACCELERATION_STRUCTURE_BUILD_INPUT: Self = Self::buffer(
        vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR,
        vk::AccessFlags2::SHADER_READ,
    );

    /// 加速结构构建输出，scratch buffer 也使用这个状态
    pub const ACCELERATION_STRUCTURE_BUILD_WRITE: Self = Self::buffer(
        vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR.as_raw()
                | vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR.as_raw(),
        ),
    );

    /// 在计算着色器中做 ray query
    pub const ACCELERATION_STRUCTURE_READ_COMPUTE: Self = Self::buffer(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR,
    );

    // ============ 辅助方法 ============

    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_WRITE.as_raw()
            | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
    );

    /// 检查是否为写操作
    #[inline]
    pub fn is_write(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// 检查是否为只读操作
    #[inline]
    pub fn is_read_only(&self) -> bool {
        !self.is_write()
    }

    /// 着色器存储读写（UAV）
    ///
    /// 两个连续的存储读写使用之间，即使状态相同也需要 barrier 保证写入可见。
    #[inline]
    pub fn is_storage_read_write(&self) -> bool {
        self.access.contains(vk::AccessFlags2::SHADER_STORAGE_READ | vk::AccessFlags2::SHADER_STORAGE_WRITE)
    }

    /// 获取用于 barrier src 的 access（去掉读操作）
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        self.access
            & !(vk::AccessFlags2::SHADER_SAMPLED_READ
                | vk::AccessFlags2::SHADER_STORAGE_READ
                | vk::AccessFlags2::SHADER_READ
                | vk::AccessFlags2::TRANSFER_READ
                | vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR
                | vk::AccessFlags2::MEMORY_READ)
    }
}

/// 纹理在给定 access 下的默认 layout
///
/// 写权限优先：只要包含存储写入就是 `GENERAL`。
pub fn default_layout_for(access: vk::AccessFlags2) -> vk::ImageLayout {
    if access == vk::AccessFlags2::NONE {
        vk::ImageLayout::UNDEFINED
    } else if access.intersects(vk::AccessFlags2::SHADER_STORAGE_WRITE | vk::AccessFlags2::SHADER_WRITE) {
        vk::ImageLayout::GENERAL
    } else if access.contains(vk::AccessFlags2::TRANSFER_WRITE) {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL
    } else if access.contains(vk::AccessFlags2::TRANSFER_READ) {
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL
    } else if access.intersects(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE | vk::AccessFlags2::COLOR_ATTACHMENT_READ) {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
    } else if access.contains(vk::AccessFlags2::SHADER_STORAGE_READ) {
        // 只读的 storage image 仍然要求 GENERAL
        vk::ImageLayout::GENERAL
    } else if access.intersects(vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_READ) {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    } else {
        vk::ImageLayout::GENERAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_matches_presets() {
        for state in [
            GfxResourceState::UNDEFINED,
            GfxResourceState::SHADER_READ_COMPUTE,
            GfxResourceState::STORAGE_READ_WRITE_COMPUTE,
            GfxResourceState::TRANSFER_SRC,
            GfxResourceState::TRANSFER_DST,
        ] {
            assert_eq!(default_layout_for(state.access), state.layout, "{:?}", state);
        }
    }

    #[test]
    fn test_texture_constructor_derives_layout() {
        let state = GfxResourceState::texture(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_SAMPLED_READ);
        assert_eq!(state, GfxResourceState::SHADER_READ_COMPUTE);
    }

    #[test]
    fn test_write_classification() {
        assert!(GfxResourceState::STORAGE_READ_WRITE_COMPUTE.is_write());
        assert!(GfxResourceState::TRANSFER_DST.is_write());
        assert!(GfxResourceState::ACCELERATION_STRUCTURE_BUILD_WRITE.is_write());
        assert!(GfxResourceState::SHADER_READ_COMPUTE.is_read_only());
        assert!(GfxResourceState::PRESENT.is_read_only());
    }

    #[test]
    fn test_storage_read_write() {
        assert!(GfxResourceState::STORAGE_READ_WRITE_COMPUTE.is_storage_read_write());
        assert!(GfxResourceState::BUFFER_STORAGE_READ_WRITE_COMPUTE.is_storage_read_write());
        assert!(!GfxResourceState::BUFFER_READ_COMPUTE.is_storage_read_write());
        assert!(!GfxResourceState::ACCELERATION_STRUCTURE_BUILD_WRITE.is_storage_read_write());
    }

    #[test]
    fn test_src_access_drops_reads() {
        let src = GfxResourceState::STORAGE_READ_WRITE_COMPUTE.src_access();
        assert_eq!(src, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(GfxResourceState::SHADER_READ_COMPUTE.src_access(), vk::AccessFlags2::NONE);
    }
}
