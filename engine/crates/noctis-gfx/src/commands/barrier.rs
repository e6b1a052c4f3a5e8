use ash::vk;

use crate::resource_state::GfxResourceState;
use crate::resources::desc::GfxNativeHandle;

/// 便捷创建 image memory barrier 的结构体
#[derive(Clone, Debug)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier2<'static>,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier2 {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::UNDEFINED,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::empty(),
                    base_array_layer: 0,
                    layer_count: vk::REMAINING_ARRAY_LAYERS,
                    base_mip_level: 0,
                    level_count: vk::REMAINING_MIP_LEVELS,
                },
                ..Default::default()
            },
        }
    }
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier2<'_> {
        &self.inner
    }

    /// builder
    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    /// builder
    #[inline]
    pub fn src_mask(mut self, src_stage_mask: vk::PipelineStageFlags2, src_access_mask: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage_mask;
        self.inner.src_access_mask = src_access_mask;
        self
    }

    /// builder
    #[inline]
    pub fn dst_mask(mut self, dst_stage_mask: vk::PipelineStageFlags2, dst_access_mask: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage_mask;
        self.inner.dst_access_mask = dst_access_mask;
        self
    }

    /// builder
    ///
    /// 一次填好 layout 与两侧的 stage/access
    #[inline]
    pub fn transition(self, before: GfxResourceState, after: GfxResourceState) -> Self {
        self.layout_transfer(before.layout, after.layout)
            .src_mask(before.stage, before.src_access())
            .dst_mask(after.stage, after.access)
    }

    /// builder
    /// 覆盖所有 layer 和 miplevel
    #[inline]
    pub fn image_aspect_flag(mut self, aspect_mask: vk::ImageAspectFlags) -> Self {
        self.inner.subresource_range.aspect_mask = aspect_mask;
        self
    }

    /// builder
    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }
}

#[derive(Clone, Debug)]
pub struct GfxBufferBarrier {
    inner: vk::BufferMemoryBarrier2<'static>,
}

impl Default for GfxBufferBarrier {
    fn default() -> Self {
        Self {
            inner: vk::BufferMemoryBarrier2 {
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                size: vk::WHOLE_SIZE,
                ..Default::default()
            },
        }
    }
}

impl GfxBufferBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::BufferMemoryBarrier2<'_> {
        &self.inner
    }

    #[inline]
    pub fn src_mask(mut self, src_stage_mask: vk::PipelineStageFlags2, src_access_mask: vk::AccessFlags2) -> Self {
        self.inner.src_stage_mask = src_stage_mask;
        self.inner.src_access_mask = src_access_mask;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, dst_stage_mask: vk::PipelineStageFlags2, dst_access_mask: vk::AccessFlags2) -> Self {
        self.inner.dst_stage_mask = dst_stage_mask;
        self.inner.dst_access_mask = dst_access_mask;
        self
    }

    /// buffer 没有 layout，只转换 stage/access
    #[inline]
    pub fn transition(self, before: GfxResourceState, after: GfxResourceState) -> Self {
        self.src_mask(before.stage, before.src_access()).dst_mask(after.stage, after.access)
    }

    #[inline]
    pub fn buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.inner.buffer = buffer;
        self.inner.offset = offset;
        self.inner.size = size;
        self
    }
}

/// 提交给设备的 barrier 描述
///
/// 只携带原生句柄与前后状态，具体的 Vulkan 结构体由 [`GfxBarrierDesc::to_vk`] 生成。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxBarrierDesc {
    pub target: GfxNativeHandle,
    pub before: GfxResourceState,
    pub after: GfxResourceState,
    /// 仅对 image 有效
    pub aspect: vk::ImageAspectFlags,
}

/// 转换后的 Vulkan barrier
#[derive(Clone, Debug)]
pub enum GfxBarrier {
    Image(GfxImageBarrier),
    Buffer(GfxBufferBarrier),
}

impl GfxBarrierDesc {
    pub fn new(target: GfxNativeHandle, before: GfxResourceState, after: GfxResourceState) -> Self {
        Self {
            target,
            before,
            after,
            aspect: vk::ImageAspectFlags::COLOR,
        }
    }

    /// 设置 aspect
    #[inline]
    pub fn with_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn to_vk(&self) -> GfxBarrier {
        match self.target {
            GfxNativeHandle::Image(image) => GfxBarrier::Image(
                GfxImageBarrier::new().image(image).transition(self.before, self.after).image_aspect_flag(self.aspect),
            ),
            GfxNativeHandle::Buffer(buffer) => GfxBarrier::Buffer(
                GfxBufferBarrier::new().buffer(buffer, 0, vk::WHOLE_SIZE).transition(self.before, self.after),
            ),
        }
    }
}
