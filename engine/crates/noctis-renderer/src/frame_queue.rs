use noctis_gfx::device::GfxDevice;

/// 控制同时在飞行中的帧数
///
/// 第 N 帧提交时把帧 fence 设置为 N + 1。开始录制第 N 帧之前，
/// 必须等待复用同一个命令槽位（N % Q）的第 N - Q 帧执行完毕，即 fence 达到 N + 1 - Q。
pub struct FrameQueueController {
    queued_frame_num: usize,
}

// new & init
impl FrameQueueController {
    /// # Panics
    /// `queued_frame_num` 为 0
    pub fn new(queued_frame_num: usize) -> Self {
        assert!(queued_frame_num >= 1, "at least one frame must be allowed in flight");
        Self { queued_frame_num }
    }
}

// getters
impl FrameQueueController {
    #[inline]
    pub fn queued_frame_num(&self) -> usize {
        self.queued_frame_num
    }

    /// 第 N 帧使用的命令槽位
    #[inline]
    pub fn cmd_slot(&self, frame_index: u64) -> usize {
        (frame_index % self.queued_frame_num as u64) as usize
    }

    /// 第 N 帧提交时的 signal 值
    #[inline]
    pub fn signal_value(frame_index: u64) -> u64 {
        frame_index + 1
    }

    /// 开始第 N 帧之前需要等待的 fence 值，前 Q 帧不需要等待
    #[inline]
    pub fn wait_value(&self, frame_index: u64) -> Option<u64> {
        let queued = self.queued_frame_num as u64;
        (frame_index >= queued).then(|| frame_index + 1 - queued)
    }
}

// phase call
impl FrameQueueController {
    /// 准备录制第 N 帧：等待槽位空闲，重置命令分配器，返回槽位
    pub fn admit(&self, device: &mut dyn GfxDevice, frame_index: u64) -> usize {
        if let Some(wait_value) = self.wait_value(frame_index) {
            device.wait_frame_fence(wait_value);
        }

        let cmd_slot = self.cmd_slot(frame_index);
        device.reset_command_allocator(cmd_slot);
        log::trace!("frame {} admitted on command slot {}", frame_index, cmd_slot);
        cmd_slot
    }
}
