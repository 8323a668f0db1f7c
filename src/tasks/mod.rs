//! 任务：进度聚合、存储与编排

mod aggregator;
mod service;
mod store;

pub use aggregator::{Aggregate, MemberUpdate, ProgressAggregator, StatusPolicy, reconcile};
pub use service::{
    CreateTask, EditTask, MemberStatusUpdate, MemberTaskQuery, MemberTaskView, TaskListQuery,
    TaskService,
};
pub use store::{DocumentTaskStore, TaskFilter, TaskStore, VersionedTask};
