//! 只记录命令的图形设备
//!
//! 不访问任何 GPU，录制的命令在 `submit` 时归档为 [`GfxSubmission`]。
//! 帧 fence 被模拟为单调递增的计数器：GPU 只会在被等待时"完成"工作，
//! 这样 CPU 领先 GPU 的情况能够在测试中被观察到。

use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle;

use crate::commands::barrier::{GfxBarrier, GfxBarrierDesc};
use crate::device::GfxDevice;
use crate::resources::desc::{GfxBufferDesc, GfxNativeHandle, GfxTextureDesc};

/// 录制下来的命令
#[derive(Clone, Debug)]
pub enum GfxRecordedCommand {
    BeginLabel(String),
    EndLabel,
    Barriers(Vec<GfxBarrier>),
    Dispatch { pipeline: String, group_count: glam::UVec3 },
    StreamBuffer(GfxNativeHandle),
    UpdateBuffer { dst: GfxNativeHandle, data: Vec<u8> },
    FillBuffer { dst: GfxNativeHandle, value: u32 },
    CopyTexture { src: GfxNativeHandle, dst: GfxNativeHandle },
    BuildAccelerationStructures(Vec<GfxNativeHandle>),
}

/// 一次队列提交
#[derive(Clone, Debug)]
pub struct GfxSubmission {
    pub cmd_slot: usize,
    pub signal_value: u64,
    pub label: String,
    pub commands: Vec<GfxRecordedCommand>,
}

impl GfxSubmission {
    /// 本次提交中的 barrier 总数
    pub fn barrier_count(&self) -> usize {
        self.commands
            .iter()
            .map(|cmd| match cmd {
                GfxRecordedCommand::Barriers(barriers) => barriers.len(),
                _ => 0,
            })
            .sum()
    }

    /// 本次提交中对 `dst` 的内联上传，按录制顺序
    pub fn updates_to(&self, dst: GfxNativeHandle) -> Vec<&[u8]> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                GfxRecordedCommand::UpdateBuffer { dst: target, data } if *target == dst => Some(data.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// 本次提交中出现过的 label，按录制顺序
    pub fn labels(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                GfxRecordedCommand::BeginLabel(label) => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct HeadlessCommandSlot {
    label: String,
    commands: Vec<GfxRecordedCommand>,
    recording: bool,
    /// 最近一次提交的 signal 值
    in_flight_value: u64,
    /// 自从上次提交后是否已经 reset
    reset_since_submit: bool,
}

pub struct HeadlessDevice {
    next_raw_handle: u64,
    live_resources: HashMap<GfxNativeHandle, String>,

    slots: Vec<HeadlessCommandSlot>,

    /// 已经提交的最大 signal 值
    submitted_value: u64,
    /// GPU 已经完成的 fence 值
    completed_value: u64,

    swapchain: Vec<(GfxNativeHandle, GfxTextureDesc)>,
    next_image: usize,

    submissions: Vec<GfxSubmission>,
    blocking_waits: Vec<u64>,
    presented: Vec<usize>,
}

// new & init
impl HeadlessDevice {
    pub fn new(swapchain_image_count: usize, output_extent: vk::Extent2D) -> Self {
        let mut device = Self {
            next_raw_handle: 1,
            live_resources: HashMap::new(),
            slots: Vec::new(),
            submitted_value: 0,
            completed_value: 0,
            swapchain: Vec::new(),
            next_image: 0,
            submissions: Vec::new(),
            blocking_waits: Vec::new(),
            presented: Vec::new(),
        };

        let desc = GfxTextureDesc::new(vk::Format::B8G8R8A8_SRGB, output_extent.width, output_extent.height)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::COLOR_ATTACHMENT);
        for _ in 0..swapchain_image_count {
            let image = GfxNativeHandle::Image(vk::Image::from_raw(device.alloc_raw()));
            device.swapchain.push((image, desc));
        }
        device
    }
}

// getters
impl HeadlessDevice {
    #[inline]
    pub fn submissions(&self) -> &[GfxSubmission] {
        &self.submissions
    }

    #[inline]
    pub fn last_submission(&self) -> Option<&GfxSubmission> {
        self.submissions.last()
    }

    /// 真正阻塞过的 fence 等待（等待值大于已完成值）
    #[inline]
    pub fn blocking_waits(&self) -> &[u64] {
        &self.blocking_waits
    }

    #[inline]
    pub fn completed_value(&self) -> u64 {
        self.completed_value
    }

    #[inline]
    pub fn presented(&self) -> &[usize] {
        &self.presented
    }

    #[inline]
    pub fn live_resource_count(&self) -> usize {
        self.live_resources.len()
    }

    pub fn resource_name(&self, native: GfxNativeHandle) -> Option<&str> {
        self.live_resources.get(&native).map(|name| name.as_str())
    }
}

// tools
impl HeadlessDevice {
    /// 让 GPU 完成所有已提交的工作
    pub fn complete_all(&mut self) {
        self.completed_value = self.submitted_value;
    }

    fn alloc_raw(&mut self) -> u64 {
        let raw = self.next_raw_handle;
        self.next_raw_handle += 1;
        raw
    }

    fn slot_mut(&mut self, cmd_slot: usize) -> &mut HeadlessCommandSlot {
        if self.slots.len() <= cmd_slot {
            self.slots.resize_with(cmd_slot + 1, HeadlessCommandSlot::default);
        }
        &mut self.slots[cmd_slot]
    }

    fn record(&mut self, cmd_slot: usize, cmd: GfxRecordedCommand) {
        let slot = self.slot_mut(cmd_slot);
        assert!(slot.recording, "command slot {cmd_slot} is not recording");
        slot.commands.push(cmd);
    }
}

impl GfxDevice for HeadlessDevice {
    fn create_texture(&mut self, name: &str, desc: &GfxTextureDesc) -> GfxNativeHandle {
        assert!(desc.extent.width > 0 && desc.extent.height > 0, "texture {name} has an empty extent");
        let native = GfxNativeHandle::Image(vk::Image::from_raw(self.alloc_raw()));
        self.live_resources.insert(native, name.to_string());
        native
    }

    fn create_buffer(&mut self, name: &str, desc: &GfxBufferDesc) -> GfxNativeHandle {
        assert!(desc.size > 0, "buffer {name} has zero size");
        let native = GfxNativeHandle::Buffer(vk::Buffer::from_raw(self.alloc_raw()));
        self.live_resources.insert(native, name.to_string());
        native
    }

    fn destroy_resource(&mut self, native: GfxNativeHandle) {
        let removed = self.live_resources.remove(&native);
        assert!(removed.is_some(), "destroying unknown resource {:?}", native);
    }

    fn wait_frame_fence(&mut self, value: u64) {
        if value <= self.completed_value {
            return;
        }
        assert!(
            value <= self.submitted_value,
            "waiting for fence value {value} that was never submitted (submitted: {})",
            self.submitted_value
        );
        log::trace!("headless: blocking on frame fence {value}");
        self.blocking_waits.push(value);
        self.completed_value = value;
    }

    fn reset_command_allocator(&mut self, cmd_slot: usize) {
        let completed = self.completed_value;
        let slot = self.slot_mut(cmd_slot);
        assert!(!slot.recording, "resetting command slot {cmd_slot} while recording");
        assert!(
            slot.in_flight_value <= completed,
            "resetting command slot {cmd_slot} that is still in flight (fence {} > {completed})",
            slot.in_flight_value
        );
        slot.reset_since_submit = true;
    }

    fn begin_commands(&mut self, cmd_slot: usize, label: &str) {
        let slot = self.slot_mut(cmd_slot);
        assert!(!slot.recording, "command slot {cmd_slot} is already recording");
        assert!(slot.reset_since_submit || slot.in_flight_value == 0, "command slot {cmd_slot} was not reset");
        slot.recording = true;
        slot.label = label.to_string();
        slot.commands.clear();
    }

    fn end_commands(&mut self, cmd_slot: usize) {
        let slot = self.slot_mut(cmd_slot);
        assert!(slot.recording, "ending command slot {cmd_slot} that is not recording");
        slot.recording = false;
    }

    fn cmd_begin_label(&mut self, cmd_slot: usize, label: &str) {
        self.record(cmd_slot, GfxRecordedCommand::BeginLabel(label.to_string()));
    }

    fn cmd_end_label(&mut self, cmd_slot: usize) {
        self.record(cmd_slot, GfxRecordedCommand::EndLabel);
    }

    fn cmd_barriers(&mut self, cmd_slot: usize, barriers: &[GfxBarrierDesc]) {
        if barriers.is_empty() {
            return;
        }
        let barriers = barriers.iter().map(GfxBarrierDesc::to_vk).collect();
        self.record(cmd_slot, GfxRecordedCommand::Barriers(barriers));
    }

    fn cmd_dispatch(&mut self, cmd_slot: usize, pipeline: &str, group_count: glam::UVec3) {
        self.record(
            cmd_slot,
            GfxRecordedCommand::Dispatch {
                pipeline: pipeline.to_string(),
                group_count,
            },
        );
    }

    fn cmd_stream_buffer(&mut self, cmd_slot: usize, dst: GfxNativeHandle) {
        self.record(cmd_slot, GfxRecordedCommand::StreamBuffer(dst));
    }

    fn cmd_update_buffer(&mut self, cmd_slot: usize, dst: GfxNativeHandle, data: &[u8]) {
        assert!(
            !data.is_empty() && data.len() % 4 == 0 && data.len() <= 65536,
            "invalid inline update size {}",
            data.len()
        );
        self.record(
            cmd_slot,
            GfxRecordedCommand::UpdateBuffer {
                dst,
                data: data.to_vec(),
            },
        );
    }

    fn cmd_fill_buffer(&mut self, cmd_slot: usize, dst: GfxNativeHandle, value: u32) {
        self.record(cmd_slot, GfxRecordedCommand::FillBuffer { dst, value });
    }

    fn cmd_copy_texture(&mut self, cmd_slot: usize, src: GfxNativeHandle, dst: GfxNativeHandle) {
        self.record(cmd_slot, GfxRecordedCommand::CopyTexture { src, dst });
    }

    fn cmd_build_acceleration_structures(&mut self, cmd_slot: usize, targets: &[GfxNativeHandle]) {
        self.record(cmd_slot, GfxRecordedCommand::BuildAccelerationStructures(targets.to_vec()));
    }

    fn swapchain_images(&self) -> Vec<(GfxNativeHandle, GfxTextureDesc)> {
        self.swapchain.clone()
    }

    fn acquire_next_image(&mut self) -> usize {
        assert!(!self.swapchain.is_empty(), "headless device has no swapchain images");
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.swapchain.len();
        index
    }

    fn submit(&mut self, cmd_slot: usize, signal_value: u64) {
        assert!(
            signal_value > self.submitted_value,
            "frame fence must increase monotonically ({signal_value} <= {})",
            self.submitted_value
        );
        let slot = self.slot_mut(cmd_slot);
        assert!(!slot.recording, "submitting command slot {cmd_slot} before end_commands");
        slot.in_flight_value = signal_value;
        slot.reset_since_submit = false;
        let submission = GfxSubmission {
            cmd_slot,
            signal_value,
            label: std::mem::take(&mut slot.label),
            commands: std::mem::take(&mut slot.commands),
        };

        self.submitted_value = signal_value;
        self.submissions.push(submission);
    }

    fn present(&mut self, image_index: usize) {
        assert!(image_index < self.swapchain.len(), "presenting invalid swapchain image {image_index}");
        self.presented.push(image_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_state::GfxResourceState;

    fn record_frame(device: &mut HeadlessDevice, slot: usize, signal: u64) {
        device.begin_commands(slot, "frame");
        device.cmd_dispatch(slot, "noop", glam::UVec3::ONE);
        device.end_commands(slot);
        device.submit(slot, signal);
    }

    #[test]
    fn test_fence_wait_only_blocks_when_needed() {
        let mut device = HeadlessDevice::new(2, vk::Extent2D { width: 4, height: 4 });
        record_frame(&mut device, 0, 1);
        record_frame(&mut device, 1, 2);

        device.wait_frame_fence(0);
        assert!(device.blocking_waits().is_empty());

        device.wait_frame_fence(1);
        device.wait_frame_fence(1);
        assert_eq!(device.blocking_waits(), &[1]);
        assert_eq!(device.completed_value(), 1);
    }

    #[test]
    fn test_inline_update_keeps_bytes() {
        let mut device = HeadlessDevice::new(1, vk::Extent2D { width: 4, height: 4 });
        let buffer = device.create_buffer("constants", &GfxBufferDesc::new(16, vk::BufferUsageFlags::UNIFORM_BUFFER));
        device.begin_commands(0, "frame");
        device.cmd_update_buffer(0, buffer, &[1, 2, 3, 4, 5, 6, 7, 8]);
        device.end_commands(0);
        device.submit(0, 1);

        let submission = device.last_submission().unwrap();
        assert_eq!(submission.updates_to(buffer), vec![&[1u8, 2, 3, 4, 5, 6, 7, 8][..]]);
    }

    #[test]
    #[should_panic(expected = "invalid inline update size")]
    fn test_unaligned_inline_update_panics() {
        let mut device = HeadlessDevice::new(1, vk::Extent2D { width: 4, height: 4 });
        let buffer = device.create_buffer("constants", &GfxBufferDesc::new(16, vk::BufferUsageFlags::UNIFORM_BUFFER));
        device.begin_commands(0, "frame");
        device.cmd_update_buffer(0, buffer, &[1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "still in flight")]
    fn test_reset_in_flight_slot_panics() {
        let mut device = HeadlessDevice::new(2, vk::Extent2D { width: 4, height: 4 });
        record_frame(&mut device, 0, 1);
        device.reset_command_allocator(0);
    }

    #[test]
    fn test_submission_collects_barriers() {
        let mut device = HeadlessDevice::new(1, vk::Extent2D { width: 4, height: 4 });
        let texture = device.create_texture("tex", &GfxTextureDesc::new(vk::Format::R8G8B8A8_UNORM, 4, 4));
        device.begin_commands(0, "frame");
        device.cmd_begin_label(0, "pass");
        device.cmd_barriers(
            0,
            &[GfxBarrierDesc::new(
                texture,
                GfxResourceState::SHADER_READ_COMPUTE,
                GfxResourceState::STORAGE_READ_WRITE_COMPUTE,
            )],
        );
        device.cmd_barriers(0, &[]);
        device.cmd_end_label(0);
        device.end_commands(0);
        device.submit(0, 1);

        let submission = device.last_submission().unwrap();
        assert_eq!(submission.barrier_count(), 1);
        assert_eq!(submission.labels(), vec!["pass"]);
        assert_eq!(device.resource_name(texture), Some("tex"));
    }
}
