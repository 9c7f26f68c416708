use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{debug, error, info};

use sentinel_core::{init_logging, AppConfig, ConfigValidator, LogLevel, OutputFormat, TaskEvent};

mod app;

use app::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("sentinel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("周期任务编排与节点健康广播服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径（缺省时依次查找默认位置）"),
        )
        .arg(
            Arg::new("node-id")
                .long("node-id")
                .value_name("ID")
                .help("覆盖配置中的节点标识"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "compact"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);

    // 加载配置
    let mut config = AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    // 命令行参数优先于配置文件
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.parse::<LogLevel>()?;
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.logging.format = match format.as_str() {
            "json" => OutputFormat::Json,
            "compact" => OutputFormat::Compact,
            _ => OutputFormat::Pretty,
        };
    }
    if let Some(node_id) = matches.get_one::<String>("node-id") {
        config.vitals.node_id = node_id.clone();
        config.validate().context("命令行参数无效")?;
    }

    // 初始化日志系统
    init_logging(&config.logging)?;

    info!("启动 sentinel {}", env!("CARGO_PKG_VERSION"));
    info!("节点标识: {}", config.vitals.node_id);

    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_listen)?;
    }

    // 创建并启动应用
    let app = Application::new(config).await?;
    spawn_event_logger(&app);
    app.start().await?;

    // 等待关闭信号
    wait_for_shutdown_signal().await?;

    info!("收到关闭信号，开始优雅关闭...");
    app.shutdown().await;

    info!("sentinel 已退出");
    Ok(())
}

/// 安装 Prometheus 导出器
fn init_metrics(listen: &str) -> Result<()> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("无效的指标监听地址: {listen}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!("Prometheus 指标导出已启动: http://{addr}/metrics");
    Ok(())
}

/// 把任务事件写入日志
fn spawn_event_logger(app: &Application) {
    let mut events = app.orchestrator().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TaskEvent::Failed { task_id, error }) => {
                    error!(task_id = %task_id, "任务失败事件: {}", error);
                }
                Ok(event) => debug!(task_id = %event.task_id(), ?event, "任务事件"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "任务事件日志落后，丢弃部分事件");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("安装SIGTERM信号处理器失败")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("安装Ctrl+C信号处理器失败")?;
                info!("收到Ctrl+C信号");
            },
            _ = terminate.recv() => {
                info!("收到SIGTERM信号");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("安装Ctrl+C信号处理器失败")?;
        info!("收到Ctrl+C信号");
    }

    Ok(())
}
