use std::fmt::Display;

/// 帧序号的奇偶性
///
/// ping/pong 资源的 current / previous 只由它决定，与资源内容无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameParity {
    Even,
    Odd,
}
impl FrameParity {
    #[inline]
    pub fn from_frame_index(frame_index: u64) -> Self {
        if frame_index & 1 == 0 { Self::Even } else { Self::Odd }
    }

    /// Even -> 0, Odd -> 1
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Even => 0,
            Self::Odd => 1,
        }
    }

    #[inline]
    pub fn flip(self) -> Self {
        match self {
            Self::Even => Self::Odd,
            Self::Odd => Self::Even,
        }
    }
}
impl Display for FrameParity {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Even => write!(f, "even"),
            Self::Odd => write!(f, "odd"),
        }
    }
}

pub struct FrameCounter {
    /// 当前的帧序号，一直累加；第一帧为 0
    frame_id: u64,
}
// new & init
impl FrameCounter {
    pub fn new(init_frame_id: u64) -> Self {
        Self { frame_id: init_frame_id }
    }
}
impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(0)
    }
}
// update
impl FrameCounter {
    #[inline]
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);
    }
}
// getters
impl FrameCounter {
    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }
    #[inline]
    pub fn is_first_frame(&self) -> bool {
        self.frame_id == 0
    }
    #[inline]
    pub fn parity(&self) -> FrameParity {
        FrameParity::from_frame_index(self.frame_id)
    }
    #[inline]
    pub fn frame_name(&self) -> String {
        format!("[F{}{}]", self.frame_id, if self.frame_id & 1 == 0 { "e" } else { "o" })
    }
}
