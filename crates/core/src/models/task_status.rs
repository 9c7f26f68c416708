use std::fmt;

use serde::{Deserialize, Serialize};

/// 任务状态，对外可查询
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 已注册，尚未成功执行过
    Starting,
    /// 最近一次执行成功
    Ready,
    /// 最近一次执行失败
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 任务优先级（仅作为元数据，不影响调度顺序）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// 调度被跳过的原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// 熔断器处于打开状态
    CircuitOpen,
    /// CPU 负载超过阈值
    HighLoad {
        cpu_percent: f64,
        threshold_percent: f64,
    },
    /// 编排器正在关闭
    ShuttingDown,
}

impl SkipReason {
    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::CircuitOpen => "circuit_open",
            Self::HighLoad { .. } => "high_load",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => f.write_str("circuit breaker open"),
            Self::HighLoad {
                cpu_percent,
                threshold_percent,
            } => write!(
                f,
                "high CPU usage: {cpu_percent:.1}% > {threshold_percent:.1}%"
            ),
            Self::ShuttingDown => f.write_str("orchestrator shutting down"),
        }
    }
}

/// 任务生命周期事件，通过广播通道发送给订阅者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Registered { task_id: String },
    Ready { task_id: String },
    Failed { task_id: String, error: String },
    Skipped { task_id: String, reason: SkipReason },
    Unregistered { task_id: String },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Registered { task_id }
            | Self::Ready { task_id }
            | Self::Failed { task_id, .. }
            | Self::Skipped { task_id, .. }
            | Self::Unregistered { task_id } => task_id,
        }
    }
}
