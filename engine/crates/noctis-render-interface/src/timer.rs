/// 帧计时器
///
/// 除了原始的帧时间，还维护两个指数滑动平均：
/// - smoothed: 用于显示
/// - very smoothed: 用于 history 长度的决策，对偶发的卡顿不敏感
#[derive(Debug)]
pub struct Timer {
    pub delta_time_ms: f32,
    pub total_time_s: f32,
    pub total_frame: u64,

    smoothed_frame_time_ms: f32,
    very_smoothed_frame_time_ms: f32,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            delta_time_ms: 0.0,
            total_time_s: 0.0,
            total_frame: 0,
            smoothed_frame_time_ms: Self::INITIAL_FRAME_TIME_MS,
            very_smoothed_frame_time_ms: Self::INITIAL_FRAME_TIME_MS,
        }
    }
}

impl Timer {
    /// 还没有任何采样时假设 60 fps
    const INITIAL_FRAME_TIME_MS: f32 = 1000.0 / 60.0;
    const SMOOTH_FACTOR: f32 = 0.1;
    const VERY_SMOOTH_FACTOR: f32 = 0.01;

    /// 用应用给定的帧时间推进一帧
    pub fn update_with_delta_ms(&mut self, delta_ms: f32) {
        let delta_ms = delta_ms.max(f32::EPSILON);
        self.delta_time_ms = delta_ms;
        self.total_time_s += delta_ms / 1000.0;

        if self.total_frame == 0 {
            self.smoothed_frame_time_ms = delta_ms;
            self.very_smoothed_frame_time_ms = delta_ms;
        } else {
            self.smoothed_frame_time_ms += (delta_ms - self.smoothed_frame_time_ms) * Self::SMOOTH_FACTOR;
            self.very_smoothed_frame_time_ms += (delta_ms - self.very_smoothed_frame_time_ms) * Self::VERY_SMOOTH_FACTOR;
        }
        self.total_frame += 1;
    }

    #[inline]
    pub fn smoothed_frame_time_ms(&self) -> f32 {
        self.smoothed_frame_time_ms
    }

    #[inline]
    pub fn very_smoothed_frame_time_ms(&self) -> f32 {
        self.very_smoothed_frame_time_ms
    }
}
