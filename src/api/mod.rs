//! HTTP 接口
//!
//! 所有 CRM 路由同时挂在根路径和 `/crm` 下；除 `/health` 外都要求上游凭证头
//! （见 [`auth`]）。错误统一以 `{message, error?}` 返回（见 [`error`]）。

pub mod auth;
pub mod error;
mod notification;
mod people;
mod profile;
mod task;

use crate::identity::PeopleRegistry;
use crate::notifications::{DocumentNotificationSink, NotificationPropagator, NotificationSink};
use crate::store::DocumentStore;
use crate::tasks::{DocumentTaskStore, ProgressAggregator, StatusPolicy, TaskService, TaskStore};
use axum::Router;
use axum::routing::{delete, get, post, put};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// 请求处理共享的组件，在 `main` 中构造一次
#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub notifications: Arc<dyn NotificationSink>,
    pub people: Arc<PeopleRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, policy: StatusPolicy, notify_timeout: Duration) -> Self {
        let sink: Arc<dyn NotificationSink> = Arc::new(DocumentNotificationSink::new(store.clone()));
        Self::with_sink(store, sink, policy, notify_timeout)
    }

    /// 指定通知存储，其余组件建在同一个文档存储上
    pub fn with_sink(
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn NotificationSink>,
        policy: StatusPolicy,
        notify_timeout: Duration,
    ) -> Self {
        let aggregator = ProgressAggregator::new(policy);
        let task_store: Arc<dyn TaskStore> = Arc::new(DocumentTaskStore::new(store.clone()));
        let people = Arc::new(PeopleRegistry::new(store, task_store.clone(), aggregator));
        let propagator = Arc::new(NotificationPropagator::new(
            sink.clone(),
            people.clone(),
            notify_timeout,
        ));
        Self {
            tasks: Arc::new(TaskService::new(task_store, propagator, aggregator)),
            notifications: sink,
            people,
        }
    }
}

fn crm_routes() -> Router<AppState> {
    Router::new()
        .route("/task/create", post(task::create))
        .route("/task/list", post(task::list))
        .route("/task/edit/{id}", put(task::edit))
        .route("/task/delete/{id}", delete(task::delete))
        .route("/task/updateStatus", put(task::update_status))
        .route("/task/memberTask", post(task::member_tasks))
        .route("/notification/create", post(notification::create))
        .route("/notification/list", post(notification::list))
        .route("/notification/mark-read/{id}", put(notification::mark_read))
        .route("/notification/unread-count", post(notification::unread_count))
        .route("/notification/mark-all-read", put(notification::mark_all_read))
        .route("/notification/delete/{id}", delete(notification::delete))
        .route("/mentor/create", post(people::create_mentor))
        .route("/mentor/list", get(people::list_mentors))
        .route("/mentor/edit/{id}", put(people::edit_mentor))
        .route("/mentor/delete/{id}", delete(people::delete_mentor))
        .route("/member/create", post(people::create_member))
        .route("/member/list", get(people::list_members))
        .route("/member/edit/{id}", put(people::edit_member))
        .route("/member/delete/{id}", delete(people::delete_member))
        .route("/profile", get(profile::show))
        .route("/profile/edit", put(profile::edit))
        .route("/profile/positions", get(profile::positions))
}

async fn health() -> axum::Json<Value> {
    axum::Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn create_router(state: AppState) -> Router {
    let crm = crm_routes();
    Router::new()
        .route("/health", get(health))
        .merge(crm.clone())
        .nest("/crm", crm)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
