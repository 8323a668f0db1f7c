pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod notifications;
pub mod store;
pub mod tasks;
pub mod testing;

pub mod prelude {
    pub use crate::api::{AppState, create_router};
    pub use crate::config::AppConfig;
    pub use crate::error::{CrmError, Result};
    pub use crate::model::{Credential, ObjectRef, Task, TaskStatus};
    pub use crate::store::{DocumentStore, FileStore, InMemoryStore};
    pub use crate::tasks::{ProgressAggregator, StatusPolicy};
}
