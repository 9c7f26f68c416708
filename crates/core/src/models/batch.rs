use serde::{Deserialize, Serialize};

/// 批量管道中的单条命令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    /// 向频道广播一条消息
    Publish { channel: String, message: String },
    /// 写入键值，可带过期时间（秒）
    Set {
        key: String,
        value: String,
        ttl_seconds: Option<u64>,
    },
    /// 删除键
    Delete { key: String },
}

impl BatchOperation {
    pub fn publish(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>, ttl_seconds: Option<u64>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
            ttl_seconds,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// 命令类型名称，用于日志和指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::Set { .. } => "set",
            Self::Delete { .. } => "delete",
        }
    }

    pub fn ttl_seconds(&self) -> Option<u64> {
        match self {
            Self::Set { ttl_seconds, .. } => *ttl_seconds,
            _ => None,
        }
    }
}
