//! Service configuration
//!
//! Controls how a participant identifies itself on the wire, whether it keeps
//! serving after a completed stream, and how many worker threads drive it.

use crate::io::message::API_VERSION;

/// Component name used when none is configured
pub const DEFAULT_COMPONENT_NAME: &str = "appflow-participant";

/// What a connection does after it has completed one request stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceLifecycle {
    /// Tear the connection down after the first completed stream
    #[default]
    StopAfterStream,
    /// Keep reading further requests on the same connection
    KeepAlive,
}

/// Configuration for serving flow requests
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Protocol version stamped on every outgoing message
    pub api_version: String,
    /// Sender name stamped on every outgoing message
    pub component_name: String,
    /// Connection reuse policy
    pub lifecycle: ServiceLifecycle,
    /// Number of runtime worker threads
    pub worker_threads: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            component_name: DEFAULT_COMPONENT_NAME.to_string(),
            lifecycle: ServiceLifecycle::default(),
            worker_threads: num_cpus::get(),
        }
    }
}

impl ServiceConfig {
    /// Create a ServiceConfig with custom values
    ///
    /// Blank names and a zero thread count fall back to the defaults with a
    /// logged warning.
    pub fn new(
        api_version: &str,
        component_name: &str,
        lifecycle: ServiceLifecycle,
        worker_threads: usize,
    ) -> Self {
        let default = Self::default();

        let api_version = if api_version.trim().is_empty() {
            tracing::warn!(
                default = %default.api_version,
                "empty api_version, using default"
            );
            default.api_version
        } else {
            api_version.to_string()
        };

        let component_name = if component_name.trim().is_empty() {
            tracing::warn!(
                default = %default.component_name,
                "empty component_name, using default"
            );
            default.component_name
        } else {
            component_name.to_string()
        };

        let worker_threads = if worker_threads == 0 {
            tracing::warn!(
                default = default.worker_threads,
                "invalid worker_threads (0), using default"
            );
            default.worker_threads
        } else {
            worker_threads
        };

        Self {
            api_version,
            component_name,
            lifecycle,
            worker_threads,
        }
    }
}
