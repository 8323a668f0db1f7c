//! 通知：存储（[`NotificationSink`]）与任务变更触发的传播（[`NotificationPropagator`]）

pub mod propagator;
mod sink;

pub use propagator::{
    ADMIN_TO_MEMBER, ADMIN_TO_MENTOR, ActingUser, DispatchReport, MENTOR_TO_MEMBER,
    NotificationPropagator,
};
pub use sink::{DocumentNotificationSink, NotificationSink};
