//! # 数据模型
//!
//! 编排器、批量发布器与健康广播之间共享的数据结构。
//!
//! - [`BatchOperation`]：批量发布管道中的一条待执行命令
//! - [`TaskStatus`] / [`TaskEvent`]：任务状态与状态变更事件，供外部应用查询和订阅
//! - [`SkipReason`]：一次调度被跳过的原因（非错误）

pub mod batch;
pub mod task_status;

pub use batch::BatchOperation;
pub use task_status::{SkipReason, TaskEvent, TaskPriority, TaskStatus};
