use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use project_workflow::config::WorkflowConfig;
use project_workflow::service::{open_store, WorkflowService};

pub mod catalog;
pub mod project;
pub mod team;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build the service from configuration and hand it to `f`
pub async fn with_service<F, Fut, R>(config: &WorkflowConfig, f: F) -> Result<R>
where
    F: FnOnce(Arc<WorkflowService>) -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    let store = open_store(&config.storage).await?;
    let service = Arc::new(WorkflowService::from_config(config, store));
    f(service).await
}
