use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use metrics::gauge;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sentinel_core::{
    ConfigValidator, LoadGateConfig, MetricsSource, SchedulerResult, TaskPriority, VitalsConfig,
};
use sentinel_dispatcher::{Orchestrator, TaskDefinition};
use sentinel_infrastructure::{BatchedPublisher, MemoryLimiter};

use crate::health::HealthScore;
use crate::snapshot::{LoadVector, Vitals, VitalsSnapshot};

/// 在编排器中注册的周期任务ID
pub const VITALS_TASK_ID: &str = "vitals-publisher";

struct Inner {
    config: VitalsConfig,
    publisher: BatchedPublisher,
    source: Arc<dyn MetricsSource>,
    memory: Option<MemoryLimiter>,
    started_at: Instant,
    last_published: Mutex<Option<i64>>,
    orchestrator: Mutex<Option<Orchestrator>>,
    stopped: AtomicBool,
    // 持有期间完成"检查停止标志 + 入队"，stop() 借此排在进行中的周期之后
    cycle: AsyncMutex<()>,
}

/// 节点健康广播
///
/// 每个周期从指标来源读取一次数据，计算健康等级，
/// 通过批量发布器写入带 TTL 的节点键并在频道上广播。
/// 节点停止发布后键会自动过期。
#[derive(Clone)]
pub struct VitalsPublisher {
    inner: Arc<Inner>,
}

impl VitalsPublisher {
    pub fn new(
        config: VitalsConfig,
        publisher: BatchedPublisher,
        source: Arc<dyn MetricsSource>,
    ) -> SchedulerResult<Self> {
        Self::build(config, publisher, source, None)
    }

    /// 每次发布都通过内存限制器记录内存变化
    pub fn with_memory_limiter(
        config: VitalsConfig,
        publisher: BatchedPublisher,
        source: Arc<dyn MetricsSource>,
        memory: MemoryLimiter,
    ) -> SchedulerResult<Self> {
        Self::build(config, publisher, source, Some(memory))
    }

    fn build(
        config: VitalsConfig,
        publisher: BatchedPublisher,
        source: Arc<dyn MetricsSource>,
        memory: Option<MemoryLimiter>,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                publisher,
                source,
                memory,
                started_at: Instant::now(),
                last_published: Mutex::new(None),
                orchestrator: Mutex::new(None),
                stopped: AtomicBool::new(false),
                cycle: AsyncMutex::new(()),
            }),
        })
    }

    pub fn config(&self) -> &VitalsConfig {
        &self.inner.config
    }

    pub fn node_key(&self) -> String {
        self.inner.config.node_key()
    }

    /// 在编排器中注册周期发布任务
    ///
    /// 负载闸门对该任务关闭，高负载时节点仍需报告自身状态。
    pub fn start(&self, orchestrator: &Orchestrator) -> SchedulerResult<()> {
        let interval = self.inner.config.publish_interval();
        let this = self.clone();
        let task = TaskDefinition::new(
            VITALS_TASK_ID,
            "Vitals publisher",
            format!("@every {}s", interval.as_secs()),
            move || {
                let this = this.clone();
                async move {
                    this.run_cycle().await?;
                    Ok(())
                }
            },
        )
        .with_load_gate(LoadGateConfig::disabled())
        .with_priority(TaskPriority::High)
        .with_tag("vitals");

        self.inner.stopped.store(false, Ordering::SeqCst);
        orchestrator.register(task)?;
        *self.lock_orchestrator() = Some(orchestrator.clone());

        info!(
            node_id = %self.inner.config.node_id,
            interval = ?interval,
            ttl = ?self.inner.config.ttl(),
            "vitals publisher started"
        );
        Ok(())
    }

    /// 取消周期任务并主动删除节点快照
    ///
    /// 已在采集指标的周期不会再写入快照，删除命令总是最后一条。
    pub async fn stop(&self) -> SchedulerResult<()> {
        self.inner.stopped.store(true, Ordering::SeqCst);
        let orchestrator = self.lock_orchestrator().take();
        match orchestrator {
            Some(orchestrator) => {
                orchestrator.unregister(VITALS_TASK_ID);
            }
            None => debug!("vitals publisher was not started"),
        }

        {
            let _cycle = self.inner.cycle.lock().await;
            self.inner.publisher.batch_delete(self.node_key()).await?;
        }
        self.inner.publisher.flush().await;
        info!(node_id = %self.inner.config.node_id, "vitals publisher stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_orchestrator().is_some()
    }

    /// 计算并入队一次快照；发布器已停止时返回 `None`
    pub async fn publish_once(&self) -> SchedulerResult<Option<VitalsSnapshot>> {
        let metrics = self.inner.source.collect().await;
        let score = HealthScore::from_metrics(&metrics);

        let timestamp = Utc::now().timestamp_millis();
        let last_consensus = *self.lock_last_published();
        let snapshot = VitalsSnapshot {
            node_id: self.inner.config.node_id.clone(),
            vitals: Vitals {
                health: score.class,
                load: LoadVector::from(&metrics),
                connections: metrics.connections,
                uptime: self.inner.started_at.elapsed().as_secs(),
                last_consensus,
            },
            timestamp,
            publisher: self.inner.config.publisher.clone(),
        };

        let payload = snapshot.to_json()?;

        let _cycle = self.inner.cycle.lock().await;
        if self.inner.stopped.load(Ordering::SeqCst) {
            debug!(
                node_id = %self.inner.config.node_id,
                "vitals publisher stopped, snapshot discarded"
            );
            return Ok(None);
        }
        self.inner
            .publisher
            .batch_set(self.node_key(), payload.clone(), Some(self.inner.config.ttl_secs))
            .await?;
        self.inner
            .publisher
            .batch_publish(self.inner.config.channel.clone(), payload)
            .await?;

        *self.lock_last_published() = Some(timestamp);
        gauge!("sentinel_vitals_health_score").set(score.overall);

        if score.overall < 0.5 {
            warn!(
                health = %score.class,
                overall = score.overall,
                cpu = metrics.cpu_usage,
                memory = metrics.memory_usage,
                latency_ms = metrics.latency_ms,
                error_rate = metrics.error_rate,
                "node health degraded"
            );
        } else {
            debug!(health = %score.class, overall = score.overall, "vitals published");
        }
        Ok(Some(snapshot))
    }

    async fn run_cycle(&self) -> SchedulerResult<Option<VitalsSnapshot>> {
        match &self.inner.memory {
            Some(memory) => {
                memory
                    .monitor_operation(self.publish_once(), VITALS_TASK_ID)
                    .await
            }
            None => self.publish_once().await,
        }
    }

    fn lock_orchestrator(&self) -> std::sync::MutexGuard<'_, Option<Orchestrator>> {
        self.inner
            .orchestrator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_last_published(&self) -> std::sync::MutexGuard<'_, Option<i64>> {
        self.inner
            .last_published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for VitalsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VitalsPublisher")
            .field("config", &self.inner.config)
            .field("running", &self.is_running())
            .finish()
    }
}
