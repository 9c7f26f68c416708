/// 采样当前整机 CPU 使用率
pub trait CpuSampler: Send + Sync {
    /// 0-100 的百分比，单点采样
    fn cpu_usage_percent(&self) -> f64;
}

/// 一次内存采样结果（字节）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// 采样当前进程的内存占用
pub trait MemorySampler: Send + Sync {
    fn sample(&self) -> MemorySample;
}
