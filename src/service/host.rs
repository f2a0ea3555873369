//! Serving many connections at once
//!
//! Each connection gets its own tokio task; nothing is shared between them
//! except the handler. A failure on one connection does not stop the others,
//! but it is reported once every connection has finished.

use crate::io::channel::Connection;
use crate::service::{run_connection, ApiHandler, ServiceConfig};
use crate::types::AppFlowError;
use futures::{Stream, StreamExt};
use std::sync::Arc;

/// Runs an [`ApiHandler`] over any number of connections
#[derive(Clone)]
pub struct ServiceHost {
    handler: Arc<dyn ApiHandler>,
    config: ServiceConfig,
}

impl ServiceHost {
    /// Create a host
    ///
    /// # Arguments
    ///
    /// * `handler` - Shared business side
    /// * `config` - Identity and lifecycle policy applied to every connection
    pub fn new(handler: Arc<dyn ApiHandler>, config: ServiceConfig) -> Self {
        Self { handler, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Serve a single connection on the current task
    pub async fn serve_connection(&self, connection: Connection) -> Result<usize, AppFlowError> {
        run_connection(Arc::clone(&self.handler), connection, &self.config).await
    }

    /// Serve every connection the stream yields, each on its own task
    ///
    /// # Returns
    ///
    /// The total number of completed request streams.
    ///
    /// # Errors
    ///
    /// Returns the first error any connection ended with. A panic on a
    /// connection task is resumed once all connections are done.
    pub async fn serve<S>(&self, connections: S) -> Result<usize, AppFlowError>
    where
        S: Stream<Item = Connection> + Unpin,
    {
        let mut connections = connections;
        let mut tasks = Vec::new();
        while let Some(connection) = connections.next().await {
            let host = self.clone();
            tasks.push(tokio::spawn(
                async move { host.serve_connection(connection).await },
            ));
            tracing::debug!(connections = tasks.len(), "accepted connection");
        }

        let mut completed = 0;
        let mut first_error = None;
        let mut panic = None;
        for task in tasks {
            match task.await {
                Ok(Ok(streams)) => completed += streams,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "connection failed");
                    first_error.get_or_insert(e);
                }
                Err(e) if e.is_panic() => {
                    tracing::error!("connection task panicked");
                    panic.get_or_insert(e.into_panic());
                }
                Err(e) => tracing::warn!(error = %e, "connection task cancelled"),
            }
        }

        if let Some(payload) = panic {
            std::panic::resume_unwind(payload);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::channel::duplex;
    use crate::service::ServiceContext;
    use crate::types::FlowStage;
    use async_trait::async_trait;

    struct AckOnly;

    #[async_trait]
    impl ApiHandler for AckOnly {
        async fn process_request(&self, context: ServiceContext) -> Result<(), AppFlowError> {
            context.communicator.finish_with_no_response()
        }
    }

    struct Failing;

    #[async_trait]
    impl ApiHandler for Failing {
        async fn process_request(&self, _context: ServiceContext) -> Result<(), AppFlowError> {
            Err(AppFlowError::service_exception("database unavailable"))
        }
    }

    #[tokio::test]
    async fn test_serves_connections_independently() {
        let host = ServiceHost::new(Arc::new(AckOnly), ServiceConfig::default());
        let (first, mut first_client) = duplex("one");
        let (second, mut second_client) = duplex("two");
        first_client.send_request(FlowStage::PreFlow, "{}").unwrap();
        second_client.send_request(FlowStage::PostFlow, "{}").unwrap();

        let completed = host
            .serve(futures::stream::iter(vec![first, second]))
            .await
            .unwrap();

        assert_eq!(completed, 2);
        assert_eq!(first_client.collect_stream().await.len(), 2);
        assert_eq!(second_client.collect_stream().await.len(), 2);
    }

    #[tokio::test]
    async fn test_connection_error_is_reported_after_all_finish() {
        let host = ServiceHost::new(Arc::new(Failing), ServiceConfig::default());
        let (connection, mut client) = duplex("one");
        client.send_request(FlowStage::PreFlow, "{}").unwrap();

        let result = host.serve(futures::stream::iter(vec![connection])).await;

        assert_eq!(
            result,
            Err(AppFlowError::service_exception("database unavailable"))
        );
        let messages = client.collect_stream().await;
        assert_eq!(messages[1].error_payload().unwrap().error_code, "serviceException");
    }
}
