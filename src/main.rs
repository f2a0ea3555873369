//! AppFlow participant CLI
//!
//! Serves AppFlow stage requests with one of the built-in participants.
//!
//! # Usage
//!
//! ```bash
//! appflow-participant < requests.jsonl
//! appflow-participant --participant surcharge --surcharge-fraction 0.05 requests.jsonl
//! appflow-participant --participant payment --decline-above 5000 --keep-alive
//! ```
//!
//! Each input line is one serialized message envelope and each reply is
//! written to stdout as one line. Logs go to stderr, filtered by
//! `--log-filter` or `RUST_LOG`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (input not readable, service exception, etc.)

use appflow_core::cli;
use appflow_core::io::stdio_connection;
use appflow_core::participant::create_participant;
use appflow_core::service::{FlowServiceDispatcher, PaymentFlowService, ServiceConfig, ServiceHost};
use appflow_core::AppFlowError;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// `--log-filter`, else `RUST_LOG`, else the default; invalid directives fall back
fn log_filter(filter: Option<&str>) -> EnvFilter {
    match filter {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging(filter: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(filter))
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(
    input: Option<&Path>,
    participant: Arc<dyn PaymentFlowService>,
    config: ServiceConfig,
) -> Result<usize, AppFlowError> {
    let (connection, tasks) = stdio_connection(input).await?;
    let host = ServiceHost::new(Arc::new(FlowServiceDispatcher::new(participant)), config);
    let result = host.serve_connection(connection).await;
    tasks.finish().await;
    result
}

fn main() {
    let args = cli::parse_args();
    init_logging(args.log_filter.as_deref());

    let config = args.to_service_config();
    let participant = create_participant(args.participant, args.to_participant_settings());
    tracing::info!(
        participant = ?args.participant,
        component = %config.component_name,
        api_version = %config.api_version,
        "starting"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            process::exit(1);
        }
    };

    match runtime.block_on(serve(args.input_file.as_deref(), participant, config)) {
        Ok(streams) => tracing::info!(streams, "done"),
        Err(e) => {
            tracing::error!(error = %e, "participant failed");
            process::exit(1);
        }
    }
}
