use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use sentinel_core::{BatchOperation, PublishTransport, PublisherConfig, SchedulerError, SchedulerResult};

/// Redis-backed pub/sub + key-value transport.
///
/// Each batch is sent as one pipeline, i.e. one network round trip.
#[derive(Clone)]
pub struct RedisTransport {
    connection: ConnectionManager,
}

impl RedisTransport {
    pub async fn connect(config: &PublisherConfig) -> SchedulerResult<Self> {
        let client = Client::open(config.redis_url.as_str()).map_err(|e| {
            SchedulerError::Transport(format!("Failed to create Redis client: {e}"))
        })?;

        let connection = Self::connect_with_retry(client, config).await?;
        let transport = Self { connection };

        let latency = transport.ping().await?;
        debug!(latency = ?latency, "Successfully connected to Redis");
        Ok(transport)
    }

    async fn connect_with_retry(
        client: Client,
        config: &PublisherConfig,
    ) -> SchedulerResult<ConnectionManager> {
        let attempts = config.connect_retry_attempts;
        let mut last_error = None;

        for attempt in 0..attempts {
            match ConnectionManager::new(client.clone()).await {
                Ok(conn) => {
                    if attempt > 0 {
                        debug!(
                            "Successfully reconnected to Redis after {} attempts",
                            attempt + 1
                        );
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    if attempt + 1 < attempts {
                        warn!(
                            "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {:?}...",
                            attempt + 1,
                            attempts,
                            e,
                            config.connect_retry_delay()
                        );
                        sleep(config.connect_retry_delay()).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error_msg = format!(
            "Failed to connect to Redis after {} attempts. Last error: {}",
            attempts,
            last_error.map_or("Unknown".to_string(), |e| e.to_string())
        );
        error!("{}", error_msg);
        Err(SchedulerError::Transport(error_msg))
    }

    /// Translate a batch into a single pipeline.
    pub fn build_pipeline(operations: &[BatchOperation]) -> redis::Pipeline {
        let mut pipe = redis::pipe();
        for operation in operations {
            match operation {
                BatchOperation::Publish { channel, message } => {
                    pipe.publish(channel, message).ignore();
                }
                BatchOperation::Set {
                    key,
                    value,
                    ttl_seconds: Some(ttl),
                } => {
                    pipe.set_ex(key, value, *ttl).ignore();
                }
                BatchOperation::Set {
                    key,
                    value,
                    ttl_seconds: None,
                } => {
                    pipe.set(key, value).ignore();
                }
                BatchOperation::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }
        pipe
    }
}

#[async_trait]
impl PublishTransport for RedisTransport {
    async fn execute_batch(&self, operations: &[BatchOperation]) -> SchedulerResult<()> {
        if operations.is_empty() {
            return Ok(());
        }

        let pipe = Self::build_pipeline(operations);
        let mut conn = self.connection.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| SchedulerError::Transport(format!("Redis pipeline failed: {e}")))
    }

    async fn ping(&self) -> SchedulerResult<Duration> {
        let mut conn = self.connection.clone();
        let start = Instant::now();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| SchedulerError::Transport(format!("Redis PING failed: {e}")))?;

        if response != "PONG" {
            return Err(SchedulerError::Transport(format!(
                "Unexpected PING response: {response}"
            )));
        }
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_has_one_command_per_operation() {
        let operations = vec![
            BatchOperation::publish("vitals:updates", "{}"),
            BatchOperation::set("vitals:node-1", "{}", Some(30)),
            BatchOperation::set("plain", "v", None),
            BatchOperation::delete("vitals:node-0"),
        ];
        let pipe = RedisTransport::build_pipeline(&operations);
        let packed = String::from_utf8_lossy(&pipe.get_packed_pipeline()).to_string();

        assert!(packed.contains("PUBLISH"));
        assert!(packed.contains("SETEX"));
        assert!(packed.contains("DEL"));
        assert_eq!(pipe.cmd_iter().count(), 4);
    }
}
