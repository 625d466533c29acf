//! 时间预算：所有扫描循环在记录边界处检查，超时则优雅中止
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    limit: Duration,
}

impl TimeBudget {
    pub fn start(limit: Duration) -> Self {
        Self { started: Instant::now(), limit }
    }

    /// 已用时间达到上限（上限为 0 时总是过期）
    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
