//! Ping/pong 资源别名
//!
//! 同一个逻辑资源对应两个物理资源，读上一帧的结果时不会与本帧的写入冲突。

use noctis_render_interface::frame_counter::FrameParity;

/// 两个交替使用的物理资源
///
/// 按帧奇偶性选择时：偶数帧 current 为 ping，奇数帧 current 为 pong，
/// previous 总是另一个。角色只取决于奇偶性，与资源内容无关。
///
/// 也可以按迭代序号使用（多次迭代的模糊）：第 i 次迭代在 i 为偶数时读 ping 写 pong，反之亦然。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgPingPong<T: Copy> {
    slots: [T; 2],
}

impl<T: Copy> RgPingPong<T> {
    #[inline]
    pub fn new(ping: T, pong: T) -> Self {
        Self { slots: [ping, pong] }
    }

    #[inline]
    pub fn ping(&self) -> T {
        self.slots[0]
    }

    #[inline]
    pub fn pong(&self) -> T {
        self.slots[1]
    }

    /// 本帧写入的资源
    #[inline]
    pub fn current(&self, parity: FrameParity) -> T {
        self.slots[parity.index()]
    }

    /// 上一帧写入、本帧读取的资源
    #[inline]
    pub fn previous(&self, parity: FrameParity) -> T {
        self.slots[parity.flip().index()]
    }

    /// 第 `iteration` 次迭代的 (input, output)
    #[inline]
    pub fn iteration(&self, iteration: usize) -> (T, T) {
        let input = iteration & 1;
        (self.slots[input], self.slots[input ^ 1])
    }

    /// 迭代 `iterations` 次之后结果所在的资源
    #[inline]
    pub fn final_output(&self, iterations: usize) -> T {
        assert!(iterations > 0, "ping/pong needs at least one iteration");
        self.iteration(iterations - 1).1
    }

    #[inline]
    pub fn as_array(&self) -> [T; 2] {
        self.slots
    }
}
