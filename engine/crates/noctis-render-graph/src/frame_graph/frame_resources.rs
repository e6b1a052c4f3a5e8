//! 一帧用到的全部 GPU 资源
//!
//! 在初始化或分辨率变化时一次性创建，同时在状态表中登记初始状态。

use ash::vk;
use noctis_gfx::device::GfxDevice;
use noctis_gfx::resource_state::GfxResourceState;
use noctis_gfx::resources::desc::{GfxBufferDesc, GfxTextureDesc};
use noctis_render_interface::gfx_resource_manager::GfxResourceManager;
use noctis_render_interface::handles::GfxResourceHandle;
use noctis_render_interface::pipeline_settings::FrameSettings;

use super::ping_pong::RgPingPong;
use super::state_table::RgResourceStateTable;

/// 数据纹理（降噪输入输出）
const DATA_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// 对精度敏感的颜色
const CRITICAL_COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
const COLOR_FORMAT: vk::Format = vk::Format::B10G11R11_UFLOAT_PACK32;
const NORMAL_FORMAT: vk::Format = vk::Format::A2B10G10R10_UNORM_PACK32;
const SHADOW_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

const MAX_INSTANCES: vk::DeviceSize = 4096;
const INSTANCE_DATA_STRIDE: vk::DeviceSize = 64;
const MAX_PRIMITIVES: vk::DeviceSize = 1 << 20;
const PRIMITIVE_DATA_STRIDE: vk::DeviceSize = 32;
pub(crate) const SHARC_CAPACITY: vk::DeviceSize = 1 << 22;
const TLAS_SIZE: vk::DeviceSize = 16 << 20;
const TLAS_SCRATCH_SIZE: vk::DeviceSize = 8 << 20;
/// 每帧的常量块，按 uniform buffer 的对齐要求分配
const FRAME_CONSTANTS_SIZE: vk::DeviceSize = 256;

/// 一帧的资源集合
///
/// ping/pong 资源用 [`RgPingPong`] 表示，具体使用哪一个由帧奇偶性或迭代序号决定。
pub struct FrameResources {
    // ============ 渲染分辨率 ============
    pub view_z: GfxResourceHandle,
    pub mv: GfxResourceHandle,
    pub normal_roughness: GfxResourceHandle,
    pub psr_throughput: GfxResourceHandle,
    pub base_color_metalness: GfxResourceHandle,
    pub direct_lighting: GfxResourceHandle,
    pub direct_emission: GfxResourceHandle,
    pub shadow: GfxResourceHandle,
    pub diff: GfxResourceHandle,
    pub spec: GfxResourceHandle,
    pub unfiltered_penumbra: GfxResourceHandle,
    pub unfiltered_diff: GfxResourceHandle,
    pub unfiltered_spec: GfxResourceHandle,
    pub unfiltered_translucency: GfxResourceHandle,
    pub validation: GfxResourceHandle,
    pub composed: GfxResourceHandle,
    /// 上一帧的合成结果，作为下一帧 trace 的反馈输入
    pub composed_diff: GfxResourceHandle,
    pub composed_spec_view_z: GfxResourceHandle,
    pub taa_history: RgPingPong<GfxResourceHandle>,

    // ray reconstruction 的 guide
    pub rr_guide_diff_albedo: GfxResourceHandle,
    pub rr_guide_spec_albedo: GfxResourceHandle,
    pub rr_guide_spec_hit_distance: GfxResourceHandle,
    pub rr_guide_normal_roughness: GfxResourceHandle,

    // ============ 辐射度缓存分辨率 ============
    /// 按帧奇偶性交替：current 写入，previous 读取
    pub sharc_radiance: RgPingPong<GfxResourceHandle>,
    /// 按迭代序号交替的 confidence 模糊
    pub confidence: RgPingPong<GfxResourceHandle>,

    // ============ 输出分辨率 ============
    pub upscaler_output: GfxResourceHandle,
    pub pre_final: GfxResourceHandle,
    pub final_color: GfxResourceHandle,

    // ============ 缓冲区 ============
    pub instance_data: GfxResourceHandle,
    pub primitive_data: GfxResourceHandle,
    pub sharc_hash_entries: GfxResourceHandle,
    pub sharc_accumulated: GfxResourceHandle,
    pub sharc_resolved: GfxResourceHandle,
    pub world_scratch: GfxResourceHandle,
    pub light_scratch: GfxResourceHandle,
    pub tlas_world: GfxResourceHandle,
    pub tlas_emissive: GfxResourceHandle,
    /// 时域反馈常量（TAA 权重、上一帧置信度等）
    pub frame_constants: GfxResourceHandle,

    // ============ 交换链 ============
    pub swapchain_images: Vec<GfxResourceHandle>,
}

/// 创建资源并登记初始状态
struct FrameResourcesCreator<'a> {
    device: &'a mut dyn GfxDevice,
    manager: &'a mut GfxResourceManager,
    table: &'a mut RgResourceStateTable,
}

impl FrameResourcesCreator<'_> {
    fn texture(&mut self, name: &str, desc: GfxTextureDesc, initial_state: GfxResourceState) -> GfxResourceHandle {
        let handle = self.manager.create_texture(self.device, name, desc);
        self.table.register(handle, initial_state);
        handle
    }

    /// 大多数纹理的初始状态为着色器只读
    fn read_only_texture(&mut self, name: &str, format: vk::Format, extent: vk::Extent2D) -> GfxResourceHandle {
        self.texture(
            name,
            GfxTextureDesc::new(format, extent.width, extent.height),
            GfxResourceState::SHADER_READ_COMPUTE,
        )
    }

    fn storage_texture(&mut self, name: &str, format: vk::Format, extent: vk::Extent2D) -> GfxResourceHandle {
        self.texture(
            name,
            GfxTextureDesc::new(format, extent.width, extent.height),
            GfxResourceState::STORAGE_READ_WRITE_COMPUTE,
        )
    }

    fn buffer(&mut self, name: &str, desc: GfxBufferDesc, initial_state: GfxResourceState) -> GfxResourceHandle {
        let handle = self.manager.create_buffer(self.device, name, desc);
        self.table.register(handle, initial_state);
        handle
    }
}

// new & init
impl FrameResources {
    pub fn create(
        device: &mut dyn GfxDevice,
        manager: &mut GfxResourceManager,
        table: &mut RgResourceStateTable,
        frame: &FrameSettings,
    ) -> Self {
        let swapchain = device.swapchain_images();

        let mut c = FrameResourcesCreator { device, manager, table };
        let render = frame.render_extent();
        let output = frame.output_extent();
        let sharc = frame.sharc_extent();

        let storage_buffer = vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_DST;

        let resources = Self {
            view_z: c.read_only_texture("ViewZ", vk::Format::R32_SFLOAT, render),
            mv: c.read_only_texture("Mv", vk::Format::R16G16B16A16_SFLOAT, render),
            normal_roughness: c.read_only_texture("Normal_Roughness", NORMAL_FORMAT, render),
            psr_throughput: c.read_only_texture("PsrThroughput", vk::Format::A2B10G10R10_UNORM_PACK32, render),
            base_color_metalness: c.read_only_texture("BaseColor_Metalness", vk::Format::R8G8B8A8_UNORM, render),
            direct_lighting: c.read_only_texture("DirectLighting", COLOR_FORMAT, render),
            direct_emission: c.read_only_texture("DirectEmission", COLOR_FORMAT, render),
            shadow: c.read_only_texture("Shadow", SHADOW_FORMAT, render),
            diff: c.read_only_texture("Diff", DATA_FORMAT, render),
            spec: c.read_only_texture("Spec", DATA_FORMAT, render),
            unfiltered_penumbra: c.read_only_texture("Unfiltered_Penumbra", vk::Format::R16_SFLOAT, render),
            unfiltered_diff: c.read_only_texture("Unfiltered_Diff", DATA_FORMAT, render),
            unfiltered_spec: c.read_only_texture("Unfiltered_Spec", DATA_FORMAT, render),
            unfiltered_translucency: c.read_only_texture("Unfiltered_Translucency", SHADOW_FORMAT, render),
            validation: c.read_only_texture("Validation", vk::Format::R8G8B8A8_UNORM, render),
            composed: c.read_only_texture("Composed", CRITICAL_COLOR_FORMAT, render),
            composed_diff: c.storage_texture("ComposedDiff", COLOR_FORMAT, render),
            composed_spec_view_z: c.storage_texture("ComposedSpec_ViewZ", vk::Format::R16G16B16A16_SFLOAT, render),
            taa_history: RgPingPong::new(
                c.read_only_texture("TaaHistoryPing", vk::Format::R16G16B16A16_SFLOAT, render),
                c.read_only_texture("TaaHistoryPong", vk::Format::R16G16B16A16_SFLOAT, render),
            ),

            rr_guide_diff_albedo: c.storage_texture("RRGuide_DiffAlbedo", vk::Format::A2B10G10R10_UNORM_PACK32, render),
            rr_guide_spec_albedo: c.storage_texture("RRGuide_SpecAlbedo", vk::Format::A2B10G10R10_UNORM_PACK32, render),
            rr_guide_spec_hit_distance: c.storage_texture("RRGuide_SpecHitDistance", vk::Format::R16_SFLOAT, render),
            rr_guide_normal_roughness: c.storage_texture(
                "RRGuide_Normal_Roughness",
                vk::Format::R16G16B16A16_SFLOAT,
                render,
            ),

            sharc_radiance: RgPingPong::new(
                c.read_only_texture("Gradient_StoredPing", vk::Format::R16G16B16A16_SFLOAT, sharc),
                c.read_only_texture("Gradient_StoredPong", vk::Format::R16G16B16A16_SFLOAT, sharc),
            ),
            confidence: RgPingPong::new(
                c.read_only_texture("Gradient_Ping", vk::Format::R16G16B16A16_SFLOAT, sharc),
                c.read_only_texture("Gradient_Pong", vk::Format::R16G16B16A16_SFLOAT, sharc),
            ),

            upscaler_output: c.read_only_texture("UpscalerOutput", CRITICAL_COLOR_FORMAT, output),
            pre_final: c.read_only_texture("PreFinal", CRITICAL_COLOR_FORMAT, output),
            final_color: c.texture(
                "Final",
                GfxTextureDesc::new(vk::Format::B8G8R8A8_UNORM, output.width, output.height)
                    .usage(vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC),
                GfxResourceState::TRANSFER_SRC,
            ),

            instance_data: c.buffer(
                "InstanceData",
                GfxBufferDesc::new(
                    MAX_INSTANCES * INSTANCE_DATA_STRIDE,
                    storage_buffer | vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR,
                ),
                GfxResourceState::BUFFER_READ_COMPUTE,
            ),
            primitive_data: c.buffer(
                "PrimitiveData",
                GfxBufferDesc::new(MAX_PRIMITIVES * PRIMITIVE_DATA_STRIDE, storage_buffer),
                GfxResourceState::BUFFER_READ_COMPUTE,
            ),
            sharc_hash_entries: c.buffer(
                "SharcHashEntries",
                GfxBufferDesc::new(SHARC_CAPACITY * 8, storage_buffer),
                GfxResourceState::BUFFER_STORAGE_READ_WRITE_COMPUTE,
            ),
            sharc_accumulated: c.buffer(
                "SharcAccumulated",
                GfxBufferDesc::new(SHARC_CAPACITY * 16, storage_buffer),
                GfxResourceState::BUFFER_STORAGE_READ_WRITE_COMPUTE,
            ),
            sharc_resolved: c.buffer(
                "SharcResolved",
                GfxBufferDesc::new(SHARC_CAPACITY * 16, storage_buffer),
                GfxResourceState::BUFFER_STORAGE_READ_WRITE_COMPUTE,
            ),
            world_scratch: c.buffer(
                "WorldScratch",
                GfxBufferDesc::new(TLAS_SCRATCH_SIZE, vk::BufferUsageFlags::STORAGE_BUFFER),
                GfxResourceState::ACCELERATION_STRUCTURE_BUILD_WRITE,
            ),
            light_scratch: c.buffer(
                "LightScratch",
                GfxBufferDesc::new(TLAS_SCRATCH_SIZE, vk::BufferUsageFlags::STORAGE_BUFFER),
                GfxResourceState::ACCELERATION_STRUCTURE_BUILD_WRITE,
            ),
            tlas_world: c.buffer(
                "TLAS_World",
                GfxBufferDesc::acceleration_structure(TLAS_SIZE),
                GfxResourceState::ACCELERATION_STRUCTURE_READ_COMPUTE,
            ),
            tlas_emissive: c.buffer(
                "TLAS_Emissive",
                GfxBufferDesc::acceleration_structure(TLAS_SIZE),
                GfxResourceState::ACCELERATION_STRUCTURE_READ_COMPUTE,
            ),
            frame_constants: c.buffer(
                "FrameConstants",
                GfxBufferDesc::new(
                    FRAME_CONSTANTS_SIZE,
                    vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
                ),
                GfxResourceState::BUFFER_UNIFORM_READ_COMPUTE,
            ),

            swapchain_images: swapchain
                .into_iter()
                .enumerate()
                .map(|(index, (native, desc))| {
                    let handle = c.manager.import_texture(format!("Swapchain#{index}"), native, desc);
                    // 交换链图像的内容在第一次使用前没有意义
                    c.table.register(handle, GfxResourceState::UNDEFINED);
                    handle
                })
                .collect(),
        };

        log::info!(
            "frame resources created: render {}x{}, output {}x{}, radiance cache {}x{}",
            render.width,
            render.height,
            output.width,
            output.height,
            sharc.width,
            sharc.height
        );
        resources
    }
}

// destroy
impl FrameResources {
    pub fn destroy(self, device: &mut dyn GfxDevice, manager: &mut GfxResourceManager, table: &mut RgResourceStateTable) {
        for handle in self.all_handles() {
            table.unregister(handle);
            manager.destroy_resource(device, handle);
        }
    }
}

// getters
impl FrameResources {
    /// 所有资源的句柄，包括交换链图像
    pub fn all_handles(&self) -> Vec<GfxResourceHandle> {
        let mut handles = vec![
            self.view_z,
            self.mv,
            self.normal_roughness,
            self.psr_throughput,
            self.base_color_metalness,
            self.direct_lighting,
            self.direct_emission,
            self.shadow,
            self.diff,
            self.spec,
            self.unfiltered_penumbra,
            self.unfiltered_diff,
            self.unfiltered_spec,
            self.unfiltered_translucency,
            self.validation,
            self.composed,
            self.composed_diff,
            self.composed_spec_view_z,
            self.rr_guide_diff_albedo,
            self.rr_guide_spec_albedo,
            self.rr_guide_spec_hit_distance,
            self.rr_guide_normal_roughness,
            self.upscaler_output,
            self.pre_final,
            self.final_color,
            self.instance_data,
            self.primitive_data,
            self.sharc_hash_entries,
            self.sharc_accumulated,
            self.sharc_resolved,
            self.world_scratch,
            self.light_scratch,
            self.tlas_world,
            self.tlas_emissive,
            self.frame_constants,
        ];
        handles.extend(self.taa_history.as_array());
        handles.extend(self.sharc_radiance.as_array());
        handles.extend(self.confidence.as_array());
        handles.extend(self.swapchain_images.iter().copied());
        handles
    }

    /// ray reconstruction 的 guide 纹理
    #[inline]
    pub fn rr_guides(&self) -> [GfxResourceHandle; 4] {
        [
            self.rr_guide_diff_albedo,
            self.rr_guide_spec_albedo,
            self.rr_guide_spec_hit_distance,
            self.rr_guide_normal_roughness,
        ]
    }

    #[inline]
    pub fn sharc_buffers(&self) -> [GfxResourceHandle; 3] {
        [self.sharc_hash_entries, self.sharc_accumulated, self.sharc_resolved]
    }

    #[inline]
    pub fn tlas(&self) -> [GfxResourceHandle; 2] {
        [self.tlas_world, self.tlas_emissive]
    }

    #[inline]
    pub fn swapchain_image(&self, index: usize) -> GfxResourceHandle {
        self.swapchain_images[index]
    }
}
