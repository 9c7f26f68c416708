use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use sentinel_core::{SchedulerError, SchedulerResult};

/// 调度能力：给定当前时间，返回距下一次触发的时长
///
/// 编排器只依赖这个接口，不关心底层是固定间隔还是 CRON。
pub trait Schedule: Send + Sync + fmt::Debug {
    /// `None` 表示不会再触发
    fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration>;

    /// 原始表达式
    fn expression(&self) -> &str;
}

/// 解析调度表达式
///
/// - `@every <n><unit>`，unit 为 `ms`/`s`/`m`/`h`
/// - 5 段或 6/7 段 CRON 表达式，以及 `@hourly`、`@daily` 等快捷写法
pub fn parse_schedule(expr: &str) -> SchedulerResult<Arc<dyn Schedule>> {
    let trimmed = expr.trim();
    if trimmed.starts_with("@every") {
        Ok(Arc::new(IntervalSchedule::from_str(trimmed)?))
    } else {
        Ok(Arc::new(CronSchedule::new(trimmed)?))
    }
}

/// 固定间隔调度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSchedule {
    expr: String,
    interval: Duration,
}

impl IntervalSchedule {
    pub fn new(interval: Duration) -> SchedulerResult<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidSchedule {
                expr: format!("{interval:?}"),
                message: "间隔必须大于0".to_string(),
            });
        }
        Ok(Self {
            expr: format!("@every {}ms", interval.as_millis()),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FromStr for IntervalSchedule {
    type Err = SchedulerError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| SchedulerError::InvalidSchedule {
            expr: expr.to_string(),
            message: message.to_string(),
        };

        let every = expr
            .trim()
            .strip_prefix("@every")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("期望格式 '@every <数字><ms|s|m|h>'"))?;

        let split = every
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid("缺少时间单位"))?;
        let (amount, unit) = every.split_at(split);
        let amount: u64 = amount.parse().map_err(|_| invalid("无效的数值"))?;

        let interval = match unit {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" | "h" => {
                let factor = if unit == "m" { 60 } else { 3600 };
                let secs = amount
                    .checked_mul(factor)
                    .ok_or_else(|| invalid("间隔超出范围"))?;
                Duration::from_secs(secs)
            }
            _ => return Err(invalid("未知的时间单位")),
        };

        if interval.is_zero() {
            return Err(invalid("间隔必须大于0"));
        }

        Ok(Self {
            expr: expr.trim().to_string(),
            interval,
        })
    }
}

impl Schedule for IntervalSchedule {
    fn next_delay(&self, _now: DateTime<Utc>) -> Option<Duration> {
        Some(self.interval)
    }

    fn expression(&self) -> &str {
        &self.expr
    }
}

/// CRON表达式调度
#[derive(Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// 5 段表达式会自动补上秒字段
    pub fn new(expr: &str) -> SchedulerResult<Self> {
        let normalized = if !expr.starts_with('@') && expr.split_whitespace().count() == 5 {
            format!("0 {expr}")
        } else {
            expr.to_string()
        };

        let schedule =
            cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidSchedule {
                expr: expr.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            expr: expr.to_string(),
            schedule,
        })
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }
}

impl Schedule for CronSchedule {
    fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        let next = self.next_execution_time(now)?;
        match (next - now).to_std() {
            Ok(delay) => Some(delay),
            Err(_) => {
                debug!("下一次执行时间早于当前时间: {}", next);
                Some(Duration::ZERO)
            }
        }
    }

    fn expression(&self) -> &str {
        &self.expr
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSchedule")
            .field("expr", &self.expr)
            .finish()
    }
}
