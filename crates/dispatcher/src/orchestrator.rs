use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use metrics::{counter, histogram};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use sentinel_core::{
    ConfigValidator, CpuSampler, OrchestratorConfig, SchedulerError, SchedulerResult, SkipReason,
    TaskEvent, TaskPriority, TaskStatus,
};
use sentinel_infrastructure::{
    CircuitBreaker, CircuitBreakerStats, LoadGate, ProcStatCpuSampler, TimeoutHandler,
};

use crate::schedule::{parse_schedule, Schedule};
use crate::task::{validate_task_id, TaskDefinition};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 一次门控执行的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// 执行体正常完成
    Completed,
    /// 执行体返回错误、panic 或超时
    Failed { error: String },
    /// 没有调用执行体
    Skipped { reason: SkipReason },
}

impl ExecutionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// 任务的可查询快照
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub breaker: CircuitBreakerStats,
    pub load_gate_enabled: bool,
    pub last_skip_reason: Option<String>,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    /// 执行体被调用的次数
    pub executions: u64,
    pub failures: u64,
    pub skips: u64,
}

#[derive(Debug)]
struct TaskRuntime {
    status: TaskStatus,
    last_skip_reason: Option<String>,
    last_error: Option<String>,
    last_run: Option<DateTime<Utc>>,
    executions: u64,
    failures: u64,
    skips: u64,
}

impl Default for TaskRuntime {
    fn default() -> Self {
        Self {
            status: TaskStatus::Starting,
            last_skip_reason: None,
            last_error: None,
            last_run: None,
            executions: 0,
            failures: 0,
            skips: 0,
        }
    }
}

struct RegisteredTask {
    definition: TaskDefinition,
    schedule: Arc<dyn Schedule>,
    breaker: CircuitBreaker,
    gate: LoadGate,
    runtime: Mutex<TaskRuntime>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RegisteredTask {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn runtime(&self) -> MutexGuard<'_, TaskRuntime> {
        self.runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cancel_timer(&self) {
        let handle = self
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

struct Inner {
    config: OrchestratorConfig,
    cpu_sampler: Arc<dyn CpuSampler>,
    timeout_handler: TimeoutHandler,
    tasks: Mutex<HashMap<String, Arc<RegisteredTask>>>,
    shutting_down: AtomicBool,
    run_sequence: AtomicU64,
    total_executions: AtomicU64,
    total_failures: AtomicU64,
    events: broadcast::Sender<TaskEvent>,
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<String, Arc<RegisteredTask>>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, task: &Arc<RegisteredTask>) -> bool {
        self.tasks()
            .get(task.id())
            .is_some_and(|current| Arc::ptr_eq(current, task))
    }

    fn emit(&self, event: TaskEvent) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.events.send(event);
    }
}

/// 任务编排器
///
/// 持有任务注册表，为每个任务驱动周期触发，并在每次触发时
/// 依次经过熔断器和负载闸门。同一任务的重叠触发不做去重。
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// 使用 `/proc/stat` CPU 采样创建编排器
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_cpu_sampler(config, Arc::new(ProcStatCpuSampler::new()))
    }

    pub fn with_cpu_sampler(config: OrchestratorConfig, cpu_sampler: Arc<dyn CpuSampler>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                cpu_sampler,
                timeout_handler: TimeoutHandler::with_default_config(),
                tasks: Mutex::new(HashMap::new()),
                shutting_down: AtomicBool::new(false),
                run_sequence: AtomicU64::new(0),
                total_executions: AtomicU64::new(0),
                total_failures: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// 注册任务并启动定时器
    ///
    /// 相同ID重复注册会替换旧定义和调度，熔断器状态不保留。
    pub fn register(&self, definition: TaskDefinition) -> SchedulerResult<()> {
        if self.is_shutting_down() {
            return Err(SchedulerError::Internal(format!(
                "编排器已关闭，拒绝注册任务 '{}'",
                definition.id
            )));
        }

        validate_task_id(&definition.id)?;
        let schedule = parse_schedule(&definition.schedule)?;

        let breaker_config = definition
            .circuit_breaker
            .clone()
            .unwrap_or_else(|| self.inner.config.circuit_breaker.clone());
        breaker_config.validate()?;

        let gate_config = definition
            .load_gate
            .clone()
            .unwrap_or_else(|| self.inner.config.load_gate.clone());
        gate_config.validate()?;

        let task_id = definition.id.clone();
        let task = Arc::new(RegisteredTask {
            breaker: CircuitBreaker::with_config(task_id.clone(), breaker_config),
            gate: LoadGate::new(gate_config, self.inner.cpu_sampler.clone()),
            schedule,
            definition,
            runtime: Mutex::new(TaskRuntime::default()),
            timer: Mutex::new(None),
        });

        let previous = self.inner.tasks().insert(task_id.clone(), task.clone());
        if let Some(previous) = previous {
            previous.cancel_timer();
            info!(task_id = %task_id, "替换已注册的任务定义");
        }

        let handle = self.spawn_timer(&task);
        *task
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);

        info!(
            task_id = %task_id,
            name = %task.definition.name,
            schedule = %task.schedule.expression(),
            "任务已注册"
        );
        self.inner.emit(TaskEvent::Registered { task_id });
        Ok(())
    }

    /// 取消定时器并移除任务，不存在时为空操作
    pub fn unregister(&self, task_id: &str) -> bool {
        let removed = self.inner.tasks().remove(task_id);
        match removed {
            Some(task) => {
                task.cancel_timer();
                info!(task_id, "任务已注销");
                self.inner.emit(TaskEvent::Unregistered {
                    task_id: task_id.to_string(),
                });
                true
            }
            None => {
                debug!(task_id, "注销不存在的任务，忽略");
                false
            }
        }
    }

    /// 绕过定时器立即执行一次门控路径，并等待其完成
    pub async fn execute_now(&self, task_id: &str) -> SchedulerResult<ExecutionOutcome> {
        let task = self
            .inner
            .tasks()
            .get(task_id)
            .cloned()
            .ok_or_else(|| SchedulerError::TaskNotFound {
                id: task_id.to_string(),
            })?;

        Ok(self.run_gated(&task).await)
    }

    /// 停止调度：之后的触发全部失效，取消所有定时器并清空注册表。
    /// 正在执行的任务体会继续运行到结束。可重复调用。
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("编排器已经关闭");
            return;
        }

        let drained: Vec<_> = self.inner.tasks().drain().map(|(_, task)| task).collect();
        for task in &drained {
            task.cancel_timer();
        }
        info!(cancelled = drained.len(), "编排器已关闭");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        self.inner
            .tasks()
            .get(task_id)
            .map(|task| task.runtime().status)
    }

    pub async fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        let task = self.inner.tasks().get(task_id).cloned()?;
        Some(Self::build_snapshot(&task).await)
    }

    /// 所有任务的快照，按ID排序
    pub async fn snapshots(&self) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<_> = self.inner.tasks().values().cloned().collect();
        tasks.sort_by(|a, b| a.id().cmp(b.id()));

        let mut snapshots = Vec::with_capacity(tasks.len());
        for task in &tasks {
            snapshots.push(Self::build_snapshot(task).await);
        }
        snapshots
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    pub fn task_count(&self) -> usize {
        self.inner.tasks().len()
    }

    pub fn task_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.tasks().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 进程生命周期内执行体调用总数
    pub fn total_executions(&self) -> u64 {
        self.inner.total_executions.load(Ordering::Relaxed)
    }

    /// 进程生命周期内执行失败总数
    pub fn total_failures(&self) -> u64 {
        self.inner.total_failures.load(Ordering::Relaxed)
    }

    async fn build_snapshot(task: &RegisteredTask) -> TaskSnapshot {
        let breaker = task.breaker.stats().await;
        let runtime = task.runtime();
        TaskSnapshot {
            id: task.definition.id.clone(),
            name: task.definition.name.clone(),
            schedule: task.definition.schedule.clone(),
            status: runtime.status,
            priority: task.definition.priority,
            tags: task.definition.tags.clone(),
            breaker,
            load_gate_enabled: task.gate.is_enabled(),
            last_skip_reason: runtime.last_skip_reason.clone(),
            last_error: runtime.last_error.clone(),
            last_run: runtime.last_run,
            executions: runtime.executions,
            failures: runtime.failures,
            skips: runtime.skips,
        }
    }

    fn spawn_timer(&self, task: &Arc<RegisteredTask>) -> JoinHandle<()> {
        let weak_inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let weak_task = Arc::downgrade(task);
        let schedule = task.schedule.clone();
        let task_id = task.definition.id.clone();

        tokio::spawn(async move {
            loop {
                let Some(delay) = schedule.next_delay(Utc::now()) else {
                    warn!(task_id = %task_id, "调度不再产生触发时间，定时器停止");
                    break;
                };
                tokio::time::sleep(delay).await;

                let (Some(inner), Some(task)) = (weak_inner.upgrade(), weak_task.upgrade()) else {
                    break;
                };
                if inner.shutting_down.load(Ordering::SeqCst) {
                    break;
                }
                if !inner.is_current(&task) {
                    debug!(task_id = %task_id, "任务已被替换或注销，旧定时器退出");
                    break;
                }

                let orchestrator = Orchestrator { inner };
                tokio::spawn(async move {
                    orchestrator.run_gated(&task).await;
                });
            }
        })
    }

    /// 门控执行：关闭检查 -> 熔断器 -> 负载闸门 -> 执行体
    async fn run_gated(&self, task: &RegisteredTask) -> ExecutionOutcome {
        let task_id = task.id();

        if self.is_shutting_down() {
            debug!(task_id, "编排器正在关闭，忽略触发");
            return ExecutionOutcome::Skipped {
                reason: SkipReason::ShuttingDown,
            };
        }

        if task.breaker.is_open().await {
            return self.record_skip(task, SkipReason::CircuitOpen);
        }

        if let Some(reason) = task.gate.should_skip() {
            return self.record_skip(task, reason);
        }

        let start = Instant::now();
        let result = self.invoke_body(task).await;
        let duration = start.elapsed();

        self.inner.total_executions.fetch_add(1, Ordering::Relaxed);
        counter!("sentinel_task_executions_total", "task_id" => task_id.to_string()).increment(1);
        histogram!("sentinel_task_duration_seconds", "task_id" => task_id.to_string())
            .record(duration.as_secs_f64());

        match result {
            Ok(()) => {
                task.breaker.record_partial_success().await;
                {
                    let mut runtime = task.runtime();
                    runtime.status = TaskStatus::Ready;
                    runtime.executions += 1;
                    runtime.last_run = Some(Utc::now());
                    runtime.last_error = None;
                }
                debug!(task_id, duration = ?duration, "任务执行成功");
                self.inner.emit(TaskEvent::Ready {
                    task_id: task_id.to_string(),
                });
                ExecutionOutcome::Completed
            }
            Err(error) => {
                task.breaker.record_failure().await;
                {
                    let mut runtime = task.runtime();
                    runtime.status = TaskStatus::Failed;
                    runtime.executions += 1;
                    runtime.failures += 1;
                    runtime.last_run = Some(Utc::now());
                    runtime.last_error = Some(error.clone());
                }
                self.inner.total_failures.fetch_add(1, Ordering::Relaxed);
                counter!("sentinel_task_failures_total", "task_id" => task_id.to_string())
                    .increment(1);
                error!(task_id, duration = ?duration, "任务执行失败: {}", error);
                self.inner.emit(TaskEvent::Failed {
                    task_id: task_id.to_string(),
                    error: error.clone(),
                });
                ExecutionOutcome::Failed { error }
            }
        }
    }

    async fn invoke_body(&self, task: &RegisteredTask) -> Result<(), String> {
        let execute = task.definition.execute.clone();
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| execute())) {
            Ok(future) => future,
            Err(panic) => return Err(panic_message(panic)),
        };

        match task.definition.timeout {
            Some(timeout) => {
                let sequence = self.inner.run_sequence.fetch_add(1, Ordering::Relaxed);
                let operation_id = format!("{}#{}", task.id(), sequence);
                let operation = async move {
                    future
                        .await
                        .map_err(|e| SchedulerError::TaskExecution(format!("{e:#}")))
                };
                self.inner
                    .timeout_handler
                    .execute(operation, timeout, &operation_id)
                    .await
                    .into_result()
                    .map_err(|e| e.to_string())
            }
            None => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(panic) => Err(panic_message(panic)),
            },
        }
    }

    fn record_skip(&self, task: &RegisteredTask, reason: SkipReason) -> ExecutionOutcome {
        {
            let mut runtime = task.runtime();
            runtime.skips += 1;
            runtime.last_skip_reason = Some(reason.to_string());
        }
        counter!(
            "sentinel_task_skips_total",
            "task_id" => task.id().to_string(),
            "reason" => reason.label()
        )
        .increment(1);
        info!(task_id = %task.id(), reason = %reason, "跳过本次触发");
        self.inner.emit(TaskEvent::Skipped {
            task_id: task.id().to_string(),
            reason: reason.clone(),
        });
        ExecutionOutcome::Skipped { reason }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tasks", &self.task_ids())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sentinel_core::{CircuitBreakerConfig, CircuitState, LoadGateConfig};
    use sentinel_testing_utils::{CallCounter, FixedCpuSampler};

    fn orchestrator(cpu: f64) -> (Orchestrator, FixedCpuSampler) {
        let sampler = FixedCpuSampler::new(cpu);
        (
            Orchestrator::with_cpu_sampler(OrchestratorConfig::default(), Arc::new(sampler.clone())),
            sampler,
        )
    }

    fn counting_task(id: &str, counter: &CallCounter, fail: bool) -> TaskDefinition {
        let counter = counter.clone();
        TaskDefinition::new(id, id, "@every 1h", move || {
            let counter = counter.clone();
            async move {
                counter.hit();
                if fail {
                    anyhow::bail!("boom");
                }
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_register_rejects_bad_id_and_schedule() {
        let (orchestrator, _) = orchestrator(0.0);
        let counter = CallCounter::new();

        let err = orchestrator
            .register(counting_task("bad id", &counter, false))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTaskId { .. }));

        let mut task = counting_task("ok", &counter, false);
        task.schedule = "every now and then".to_string();
        let err = orchestrator.register(task).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));

        let mut task = counting_task("huge", &counter, false);
        task.schedule = "@every 18446744073709551615h".to_string();
        let err = orchestrator.register(task).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSchedule { .. }));
        assert_eq!(orchestrator.task_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_now_unknown_task() {
        let (orchestrator, _) = orchestrator(0.0);
        let err = orchestrator.execute_now("missing").await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound { id } if id == "missing"));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (orchestrator, _) = orchestrator(0.0);
        let counter = CallCounter::new();
        orchestrator
            .register(counting_task("status", &counter, false))
            .unwrap();
        assert_eq!(orchestrator.status("status"), Some(TaskStatus::Starting));

        let outcome = orchestrator.execute_now("status").await.unwrap();
        assert!(outcome.is_completed());
        assert_eq!(orchestrator.status("status"), Some(TaskStatus::Ready));
        assert_eq!(counter.count(), 1);
        assert_eq!(orchestrator.total_executions(), 1);
    }

    #[tokio::test]
    async fn test_success_heals_one_failure() {
        let (orchestrator, _) = orchestrator(0.0);
        let counter = CallCounter::new();
        let flaky = counter.clone();
        let task = TaskDefinition::new("flaky", "Flaky", "@every 1h", move || {
            let n = flaky.hit();
            async move {
                if n <= 2 {
                    anyhow::bail!("failure {n}");
                }
                Ok(())
            }
        });
        orchestrator.register(task).unwrap();

        for _ in 0..2 {
            orchestrator.execute_now("flaky").await.unwrap();
        }
        assert_eq!(orchestrator.status("flaky"), Some(TaskStatus::Failed));

        orchestrator.execute_now("flaky").await.unwrap();
        let snapshot = orchestrator.snapshot("flaky").await.unwrap();
        assert_eq!(snapshot.breaker.failure_count, 1);
        assert_eq!(snapshot.breaker.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 2);
        assert_eq!(snapshot.status, TaskStatus::Ready);
    }

    #[tokio::test]
    async fn test_panic_counts_as_failure() {
        let (orchestrator, _) = orchestrator(0.0);
        let task = TaskDefinition::new("panics", "Panics", "@every 1h", || async {
            let values: Vec<u32> = Vec::new();
            if values.is_empty() {
                panic!("kaboom");
            }
            Ok(())
        });
        orchestrator.register(task).unwrap();

        let outcome = orchestrator.execute_now("panics").await.unwrap();
        match outcome {
            ExecutionOutcome::Failed { error } => assert!(error.contains("kaboom")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(orchestrator.total_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timeout_is_failure() {
        let (orchestrator, _) = orchestrator(0.0);
        let task = TaskDefinition::new("slow", "Slow", "@every 1h", || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .with_timeout(Duration::from_secs(1));
        orchestrator.register(task).unwrap();

        let outcome = orchestrator.execute_now("slow").await.unwrap();
        match outcome {
            ExecutionOutcome::Failed { error } => assert!(error.contains("timed out")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_gate_skip_leaves_breaker_untouched() {
        let (orchestrator, sampler) = orchestrator(85.0);
        let counter = CallCounter::new();
        orchestrator
            .register(counting_task("gated", &counter, false))
            .unwrap();

        let outcome = orchestrator.execute_now("gated").await.unwrap();
        assert!(matches!(
            outcome,
            ExecutionOutcome::Skipped {
                reason: SkipReason::HighLoad { .. }
            }
        ));
        assert_eq!(counter.count(), 0);

        let snapshot = orchestrator.snapshot("gated").await.unwrap();
        assert_eq!(snapshot.breaker.state, CircuitState::Closed);
        assert_eq!(snapshot.breaker.failure_count, 0);
        assert_eq!(snapshot.breaker.total_calls, 0);
        assert_eq!(
            snapshot.last_skip_reason.as_deref(),
            Some("high CPU usage: 85.0% > 70.0%")
        );

        sampler.set(40.0);
        assert!(orchestrator.execute_now("gated").await.unwrap().is_completed());
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_gate_ignores_cpu() {
        let (orchestrator, _) = orchestrator(99.0);
        let counter = CallCounter::new();
        orchestrator
            .register(counting_task("ungated", &counter, false).with_load_gate(LoadGateConfig::disabled()))
            .unwrap();

        assert!(orchestrator.execute_now("ungated").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_reregister_resets_breaker() {
        let (orchestrator, _) = orchestrator(0.0);
        let counter = CallCounter::new();
        let config = CircuitBreakerConfig::new(1, Duration::from_secs(300));
        orchestrator
            .register(counting_task("replace", &counter, true).with_circuit_breaker(config.clone()))
            .unwrap();

        orchestrator.execute_now("replace").await.unwrap();
        assert!(orchestrator.execute_now("replace").await.unwrap().is_skipped());

        orchestrator
            .register(counting_task("replace", &counter, false).with_circuit_breaker(config))
            .unwrap();
        assert_eq!(orchestrator.task_count(), 1);
        assert_eq!(orchestrator.status("replace"), Some(TaskStatus::Starting));
        assert!(orchestrator.execute_now("replace").await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let (orchestrator, _) = orchestrator(0.0);
        let mut events = orchestrator.subscribe();
        let counter = CallCounter::new();

        orchestrator
            .register(counting_task("evented", &counter, true))
            .unwrap();
        orchestrator.execute_now("evented").await.unwrap();
        orchestrator.unregister("evented");

        assert!(matches!(events.recv().await.unwrap(), TaskEvent::Registered { .. }));
        assert!(matches!(events.recv().await.unwrap(), TaskEvent::Failed { error, .. } if error == "boom"));
        assert!(matches!(events.recv().await.unwrap(), TaskEvent::Unregistered { .. }));
    }

    #[tokio::test]
    async fn test_unregister_and_shutdown_are_idempotent() {
        let (orchestrator, _) = orchestrator(0.0);
        let counter = CallCounter::new();
        orchestrator.register(counting_task("a", &counter, false)).unwrap();
        orchestrator.register(counting_task("b", &counter, false)).unwrap();

        assert!(orchestrator.unregister("a"));
        assert!(!orchestrator.unregister("a"));

        orchestrator.shutdown();
        orchestrator.shutdown();
        assert!(orchestrator.is_shutting_down());
        assert_eq!(orchestrator.task_count(), 0);
        assert!(orchestrator.register(counting_task("c", &counter, false)).is_err());
        assert!(matches!(
            orchestrator.execute_now("b").await,
            Err(SchedulerError::TaskNotFound { .. })
        ));
    }
}
