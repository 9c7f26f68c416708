use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use sentinel_core::{
    CircuitBreakerConfig, LoadGateConfig, SchedulerError, SchedulerResult, TaskPriority,
};

/// 任务ID最大长度
pub const MAX_TASK_ID_LEN: usize = 128;

/// 任务执行体：无参数，返回成功或失败
pub type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 任务定义
///
/// 熔断器和负载闸门配置缺省时由编排器填入默认值。
#[derive(Clone)]
pub struct TaskDefinition {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub execute: TaskFn,
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    pub load_gate: Option<LoadGateConfig>,
    /// 单次执行的超时；超时只放弃等待，记为失败
    pub timeout: Option<Duration>,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
}

impl TaskDefinition {
    pub fn new<F, Fut>(
        id: impl Into<String>,
        name: impl Into<String>,
        schedule: impl Into<String>,
        execute: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            schedule: schedule.into(),
            execute: Arc::new(move || execute().boxed()),
            circuit_breaker: None,
            load_gate: None,
            timeout: None,
            priority: TaskPriority::default(),
            tags: Vec::new(),
        }
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }

    pub fn with_load_gate(mut self, config: LoadGateConfig) -> Self {
        self.load_gate = Some(config);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("load_gate", &self.load_gate)
            .field("timeout", &self.timeout)
            .field("priority", &self.priority)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

/// 校验任务ID：1-128 个 ASCII 字母数字或 `-` `_` `.` `:`
pub fn validate_task_id(id: &str) -> SchedulerResult<()> {
    let invalid = |reason: &str| SchedulerError::InvalidTaskId {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("任务ID不能为空"));
    }
    if id.len() > MAX_TASK_ID_LEN {
        return Err(invalid("任务ID长度不能超过128"));
    }
    if let Some(c) = id
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')))
    {
        return Err(invalid(&format!("包含非法字符 {c:?}")));
    }
    Ok(())
}
