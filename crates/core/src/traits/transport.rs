use std::time::Duration;

use async_trait::async_trait;

use crate::{models::BatchOperation, SchedulerResult};

/// 发布/键值传输抽象接口
///
/// 实现者必须把一批命令作为一次网络往返执行。
#[async_trait]
pub trait PublishTransport: Send + Sync {
    /// 在一次往返中执行整批命令
    async fn execute_batch(&self, operations: &[BatchOperation]) -> SchedulerResult<()>;

    /// 测量一次往返耗时
    async fn ping(&self) -> SchedulerResult<Duration>;
}
