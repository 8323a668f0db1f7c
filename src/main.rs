use clap::Parser;
use crm_hub::api::{AppState, create_router};
use crm_hub::config::AppConfig;
use crm_hub::store::{DocumentStore, FileStore, InMemoryStore};
use crm_hub::tasks::StatusPolicy;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// CRM 任务进度与通知服务
#[derive(Debug, Parser)]
#[command(name = "crm_hub", version, about)]
struct Cli {
    /// YAML 配置文件
    #[arg(short, long, env = "CRM_CONFIG")]
    config: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// JSON 文件存储路径，不指定则使用内存存储
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// progress_threshold | member_status_set
    #[arg(long)]
    status_policy: Option<StatusPolicy>,

    #[arg(long)]
    notify_timeout_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> crm_hub::error::Result<AppConfig> {
        let base = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        let mut config = base.with_env()?;
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(path) = self.store_path {
            config.store_path = Some(path);
        }
        if let Some(policy) = self.status_policy {
            config.status_policy = policy;
        }
        if let Some(ms) = self.notify_timeout_ms {
            config.notify_timeout_ms = ms;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> crm_hub::error::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,crm_hub=debug")),
        )
        .init();

    let config = Cli::parse().into_config()?;

    let store: Arc<dyn DocumentStore> = match &config.store_path {
        Some(path) => Arc::new(FileStore::new(path)?),
        None => {
            info!("🧠 未配置 store_path，使用内存存储");
            Arc::new(InMemoryStore::new())
        }
    };
    let state = AppState::new(store, config.status_policy, config.notify_timeout());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        addr = %config.bind_addr(),
        status_policy = config.status_policy.as_str(),
        notify_timeout_ms = config.notify_timeout_ms,
        "🚀 crm_hub 已启动"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("👋 crm_hub 已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听退出信号: {e}");
    }
}
