//! 测试基础设施
//!
//! 提供在不依赖真实存储的情况下测试通知传播、任务服务各组件的工具集。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`MockNotificationSink`] | 替代真实通知存储，可按调用编号注入失败或延迟 |
//! | [`MockIdentityDirectory`] | 替代身份库，预置身份或模拟查询失败 |
//!
//! # 设计原则
//!
//! - **零外部依赖**：所有 Mock 都完全在内存中运行
//! - **可脚本化**：通过 `fail_for_calls()` / `with_delay()` / `with_person()` 精确控制行为
//! - **可观测**：通过 `call_count()` / `delivered()` 等方法检查调用情况
//!
//! # 使用示例
//!
//! ```rust
//! use crm_hub::model::{ObjectRef, Role, Task, TaskStatus};
//! use crm_hub::notifications::NotificationPropagator;
//! use crm_hub::testing::{MockIdentityDirectory, MockNotificationSink};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = Arc::new(MockNotificationSink::new().always_failing());
//! let propagator = NotificationPropagator::new(
//!     sink.clone(),
//!     Arc::new(MockIdentityDirectory::new()),
//!     Duration::from_secs(1),
//! );
//!
//! let task = Task::new("Onboarding", "2026-01-01", TaskStatus::Pending)
//!     .with_members(vec![ObjectRef::generate()]);
//! let report = propagator.task_created(&task).await;
//! assert_eq!(report.failed, 1);
//! assert_eq!(sink.call_count(), 1);
//! # }
//! ```

mod mock_directory;
mod mock_sink;

pub use mock_directory::MockIdentityDirectory;
pub use mock_sink::MockNotificationSink;

use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
