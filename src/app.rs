use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use sentinel_core::{AppConfig, LifecycleRegistry, PublishTransport};
use sentinel_dispatcher::Orchestrator;
use sentinel_infrastructure::{
    BatchedPublisher, MemoryLimiter, ProcStatCpuSampler, ProcessMemorySampler, RedisTransport,
    TimeoutHandler,
};
use sentinel_vitals::{ConnectionGauge, LocalMetricsSource, VitalsPublisher};

/// 组件清理的单步超时
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 应用程序：持有全部长生命周期组件
pub struct Application {
    config: AppConfig,
    orchestrator: Orchestrator,
    publisher: BatchedPublisher,
    vitals: VitalsPublisher,
    lifecycle: LifecycleRegistry,
}

impl Application {
    /// 连接 Redis 并组装组件
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("连接Redis: {}", mask_redis_url(&config.publisher.redis_url));

        let timeouts = TimeoutHandler::new(&config.timeout);
        let publisher_config = config.publisher.clone();
        let transport = timeouts
            .execute_default(
                async move { RedisTransport::connect(&publisher_config).await },
                "redis_connect",
            )
            .await
            .into_result()
            .context("连接Redis失败")?;
        info!("Redis连接成功");

        Self::with_transport(config, Arc::new(transport))
    }

    /// 使用给定的传输层组装组件
    pub fn with_transport(config: AppConfig, transport: Arc<dyn PublishTransport>) -> Result<Self> {
        let cpu_sampler = Arc::new(ProcStatCpuSampler::new());
        let memory = MemoryLimiter::new(&config.memory, Arc::new(ProcessMemorySampler::new()));

        let publisher = BatchedPublisher::new(transport.clone(), &config.publisher);
        let orchestrator =
            Orchestrator::with_cpu_sampler(config.orchestrator.clone(), cpu_sampler.clone());

        let source = LocalMetricsSource::new(
            cpu_sampler,
            memory.clone(),
            transport,
            orchestrator.clone(),
            ConnectionGauge::new(),
        );
        let vitals = VitalsPublisher::with_memory_limiter(
            config.vitals.clone(),
            publisher.clone(),
            Arc::new(source),
            memory,
        )
        .context("创建健康广播失败")?;

        Ok(Self {
            config,
            orchestrator,
            publisher,
            vitals,
            lifecycle: LifecycleRegistry::new(TEARDOWN_TIMEOUT),
        })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// 启动健康广播并登记清理顺序
    ///
    /// 关闭时按逆序执行：先停止健康广播（删除节点键），再停止编排器，
    /// 最后冲刷并销毁批量发布器。
    pub async fn start(&self) -> Result<()> {
        let publisher = self.publisher.clone();
        self.lifecycle
            .register("publisher", move || async move { publisher.destroy().await })
            .await;

        let orchestrator = self.orchestrator.clone();
        self.lifecycle
            .register("orchestrator", move || async move { orchestrator.shutdown() })
            .await;

        self.vitals
            .start(&self.orchestrator)
            .context("启动健康广播失败")?;
        let vitals = self.vitals.clone();
        self.lifecycle
            .register("vitals", move || async move {
                if let Err(e) = vitals.stop().await {
                    warn!("停止健康广播失败: {}", e);
                }
            })
            .await;

        info!(
            node_id = %self.config.vitals.node_id,
            tasks = self.orchestrator.task_count(),
            "应用程序已启动"
        );
        Ok(())
    }

    /// 优雅关闭；可重复调用
    pub async fn shutdown(&self) {
        self.lifecycle.teardown_all().await;
        let stats = self.publisher.stats();
        info!(
            total_batches = stats.total_batches,
            total_operations = stats.total_operations,
            failed_batches = stats.failed_batches,
            "应用程序已关闭"
        );
    }
}

/// 屏蔽Redis URL中的密码
fn mask_redis_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority = scheme_end + 3;

    if let Some(at_pos) = url[authority..].find('@') {
        let userinfo = &url[authority..authority + at_pos];
        if let Some(colon_pos) = userinfo.find(':') {
            let mut masked = url.to_string();
            masked.replace_range(authority + colon_pos + 1..authority + at_pos, "***");
            return masked;
        }
    }
    url.to_string()
}
