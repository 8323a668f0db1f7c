//! 领域模型：任务、通知、身份与弱引用

pub mod identity;
pub mod notification;
pub mod reference;
pub mod task;

pub use identity::{Account, Credential, Identity, Person, Profile, Role};
pub use notification::{NewNotification, Notification};
pub use reference::ObjectRef;
pub use task::{MemberProgress, Task, TaskStatus};
