use crate::commands::barrier::GfxBarrierDesc;
use crate::resources::desc::{GfxBufferDesc, GfxNativeHandle, GfxTextureDesc};

/// 图形设备协作者
///
/// 渲染器只依赖这些能力：资源创建与销毁、命令录制（barrier / dispatch / copy）、
/// 帧 fence 等待、队列提交、交换链的 acquire 与 present。
///
/// 所有方法都没有返回错误：任何图形 API 的失败都直接终止进程，
/// 因为处于不确定状态的 GPU 资源无法安全地继续使用。
///
/// `cmd_slot` 是 FrameQueueController 分配的命令录制槽位（0..Q）。
pub trait GfxDevice {
    // ============ 资源 ============

    fn create_texture(&mut self, name: &str, desc: &GfxTextureDesc) -> GfxNativeHandle;

    fn create_buffer(&mut self, name: &str, desc: &GfxBufferDesc) -> GfxNativeHandle;

    fn destroy_resource(&mut self, native: GfxNativeHandle);

    // ============ 帧同步 ============

    /// 阻塞直到帧 fence 的值不小于 `value`
    fn wait_frame_fence(&mut self, value: u64);

    /// 重置某个槽位的命令分配器，调用前必须保证该槽位的命令已经执行完毕
    fn reset_command_allocator(&mut self, cmd_slot: usize);

    // ============ 命令录制 ============

    fn begin_commands(&mut self, cmd_slot: usize, label: &str);

    fn end_commands(&mut self, cmd_slot: usize);

    fn cmd_begin_label(&mut self, cmd_slot: usize, label: &str);

    fn cmd_end_label(&mut self, cmd_slot: usize);

    fn cmd_barriers(&mut self, cmd_slot: usize, barriers: &[GfxBarrierDesc]);

    fn cmd_dispatch(&mut self, cmd_slot: usize, pipeline: &str, group_count: glam::UVec3);

    /// 把 streamer 中排队的场景数据拷贝到 buffer
    fn cmd_stream_buffer(&mut self, cmd_slot: usize, dst: GfxNativeHandle);

    /// 在命令中内联上传少量数据，`data` 的长度必须是 4 的倍数且不超过 65536
    fn cmd_update_buffer(&mut self, cmd_slot: usize, dst: GfxNativeHandle, data: &[u8]);

    fn cmd_fill_buffer(&mut self, cmd_slot: usize, dst: GfxNativeHandle, value: u32);

    fn cmd_copy_texture(&mut self, cmd_slot: usize, src: GfxNativeHandle, dst: GfxNativeHandle);

    /// 构建 TLAS，`targets` 为加速结构的存储 buffer
    fn cmd_build_acceleration_structures(&mut self, cmd_slot: usize, targets: &[GfxNativeHandle]);

    // ============ 队列与交换链 ============

    /// 交换链图像（由设备持有，渲染器只做状态跟踪）
    fn swapchain_images(&self) -> Vec<(GfxNativeHandle, GfxTextureDesc)>;

    fn acquire_next_image(&mut self) -> usize;

    /// 提交命令，并在执行完毕后把帧 fence 设置为 `signal_value`
    fn submit(&mut self, cmd_slot: usize, signal_value: u64);

    fn present(&mut self, image_index: usize);
}
