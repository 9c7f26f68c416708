use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// 生命周期注册表
///
/// 长生命周期组件（编排器、批量发布器、健康广播）在这里登记一个标识和一个显式的
/// 清理函数。进程根在关闭时按注册的逆序依次执行清理，保证先停止生产者再冲刷管道。
#[derive(Clone)]
pub struct LifecycleRegistry {
    entries: Arc<Mutex<Vec<(String, Teardown)>>>,
    is_shutdown: Arc<AtomicBool>,
    teardown_timeout: Duration,
}

impl LifecycleRegistry {
    pub fn new(teardown_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            is_shutdown: Arc::new(AtomicBool::new(false)),
            teardown_timeout,
        }
    }

    /// 注册清理函数；同名注册会替换旧的（旧函数不会被执行）
    pub async fn register<F, Fut>(&self, id: impl Into<String>, teardown: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let boxed: Teardown = Box::new(move || Box::pin(teardown()));
        let mut entries = self.entries.lock().await;

        if let Some(slot) = entries.iter_mut().find(|(existing, _)| *existing == id) {
            warn!(component = %id, "replacing existing teardown registration");
            slot.1 = boxed;
        } else {
            debug!(component = %id, "registered teardown");
            entries.push((id, boxed));
        }
    }

    /// 立即执行并移除指定组件的清理函数
    pub async fn teardown(&self, id: &str) -> bool {
        let entry = {
            let mut entries = self.entries.lock().await;
            entries
                .iter()
                .position(|(existing, _)| existing == id)
                .map(|idx| entries.remove(idx))
        };

        match entry {
            Some((id, teardown)) => {
                self.run(&id, teardown).await;
                true
            }
            None => false,
        }
    }

    /// 按注册逆序执行全部清理函数；重复调用无副作用
    pub async fn teardown_all(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            debug!("lifecycle registry already torn down");
            return;
        }

        let entries = std::mem::take(&mut *self.entries.lock().await);
        info!(components = entries.len(), "tearing down components");

        for (id, teardown) in entries.into_iter().rev() {
            self.run(&id, teardown).await;
        }

        info!("all components torn down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn run(&self, id: &str, teardown: Teardown) {
        match timeout(self.teardown_timeout, teardown()).await {
            Ok(()) => info!(component = %id, "component torn down"),
            Err(_) => warn!(
                component = %id,
                timeout = ?self.teardown_timeout,
                "component teardown timed out"
            ),
        }
    }
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
