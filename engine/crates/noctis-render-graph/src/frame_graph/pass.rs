//! Pass 定义和构建器

use std::collections::HashSet;

use noctis_gfx::resource_state::GfxResourceState;
use noctis_render_interface::handles::GfxResourceHandle;

use super::barrier::RgStateRequirement;

/// 经过外部降噪库的阶段
///
/// 这些 pass 不声明状态需求：降噪库自己负责内部的 barrier，
/// 返回后由 DenoiserBridge 把降噪库报告的状态写回状态表。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RgDenoiseStage {
    /// 阴影与半透明阴影
    Shadow,
    /// 主信号（漫反射 + 镜面反射）
    Opaque,
    /// reference 模式下直接在 composed 上累积
    ReferenceOverride,
}

/// pass 要录制的命令
#[derive(Clone, Debug, PartialEq)]
pub enum RgPassKind {
    /// 拷贝 streamer 中的场景数据
    StreamBuffer {
        dst: GfxResourceHandle,
    },
    /// 上传本帧的时域反馈常量，数据在录制时由渲染器提供
    UpdateConstants {
        dst: GfxResourceHandle,
    },
    FillBuffer {
        dst: GfxResourceHandle,
        value: u32,
    },
    BuildAccelerationStructures {
        targets: Vec<GfxResourceHandle>,
    },
    Dispatch {
        pipeline: &'static str,
        group_count: glam::UVec3,
    },
    Denoise(RgDenoiseStage),
    /// 外部时域 upscaler
    TemporalUpscale {
        input: GfxResourceHandle,
        output: GfxResourceHandle,
    },
    /// 锐化 + 空间上采样
    Sharpen {
        input: GfxResourceHandle,
        output: GfxResourceHandle,
    },
    CopyTexture {
        src: GfxResourceHandle,
        dst: GfxResourceHandle,
    },
    /// 只做状态转换，提交后 present
    Present {
        image: GfxResourceHandle,
    },
}

/// Pass 构建器
///
/// 声明 pass 读写的资源以及期望的状态。读总是排在写前面。
pub struct RgPassBuilder {
    name: String,
    reads: Vec<RgStateRequirement>,
    writes: Vec<RgStateRequirement>,
}

impl RgPassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// 声明读取
    #[inline]
    pub fn read(mut self, handle: GfxResourceHandle, state: GfxResourceState) -> Self {
        self.reads.push(RgStateRequirement::new(handle, state));
        self
    }

    /// 声明写入
    #[inline]
    pub fn write(mut self, handle: GfxResourceHandle, state: GfxResourceState) -> Self {
        self.writes.push(RgStateRequirement::new(handle, state));
        self
    }

    /// 批量声明读取，状态相同
    pub fn read_all(self, handles: impl IntoIterator<Item = GfxResourceHandle>, state: GfxResourceState) -> Self {
        handles.into_iter().fold(self, |builder, handle| builder.read(handle, state))
    }

    /// 批量声明写入，状态相同
    pub fn write_all(self, handles: impl IntoIterator<Item = GfxResourceHandle>, state: GfxResourceState) -> Self {
        handles.into_iter().fold(self, |builder, handle| builder.write(handle, state))
    }

    /// 完成构建
    ///
    /// 同一个资源在一个 pass 中只能声明一次，否则会产生多余的 barrier。
    pub fn build(self, kind: RgPassKind) -> RgPassNode {
        let mut declared = HashSet::new();
        debug_assert!(
            self.reads.iter().chain(self.writes.iter()).all(|r| declared.insert(r.handle)),
            "pass \"{}\" declares a resource more than once",
            self.name
        );
        RgPassNode {
            name: self.name,
            kind,
            reads: self.reads,
            writes: self.writes,
        }
    }
}

/// Pass 节点
#[derive(Clone, Debug)]
pub struct RgPassNode {
    pub name: String,
    pub kind: RgPassKind,
    pub reads: Vec<RgStateRequirement>,
    pub writes: Vec<RgStateRequirement>,
}

impl RgPassNode {
    /// 交给 BarrierPlanner 的有序需求：先读后写
    pub fn requirements(&self) -> Vec<RgStateRequirement> {
        self.reads.iter().chain(self.writes.iter()).copied().collect()
    }

    pub fn touches(&self, handle: GfxResourceHandle) -> bool {
        self.reads.iter().chain(self.writes.iter()).any(|r| r.handle == handle)
    }

    /// 对某个资源声明的状态
    pub fn required_state(&self, handle: GfxResourceHandle) -> Option<GfxResourceState> {
        self.reads.iter().chain(self.writes.iter()).find(|r| r.handle == handle).map(|r| r.state)
    }

    pub fn writes_to(&self, handle: GfxResourceHandle) -> bool {
        self.writes.iter().any(|r| r.handle == handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn test_reads_come_before_writes() {
        let mut keys: SlotMap<GfxResourceHandle, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let c = keys.insert(());

        let node = RgPassBuilder::new("composition")
            .write(a, GfxResourceState::STORAGE_READ_WRITE_COMPUTE)
            .read(b, GfxResourceState::SHADER_READ_COMPUTE)
            .read(c, GfxResourceState::SHADER_READ_COMPUTE)
            .build(RgPassKind::Dispatch {
                pipeline: "composition",
                group_count: glam::UVec3::ONE,
            });

        let order: Vec<_> = node.requirements().iter().map(|r| r.handle).collect();
        assert_eq!(order, vec![b, c, a]);
        assert!(node.writes_to(a));
        assert!(!node.writes_to(b));
        assert_eq!(node.required_state(c), Some(GfxResourceState::SHADER_READ_COMPUTE));
    }
}
