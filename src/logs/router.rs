//! Picks the log backend for each request by logical service name

use super::app::AppLogService;
use super::source::LogSource;
use super::types::{LogStream, APPLICATION_SERVICE};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Routes `application` to the in-process broadcaster and every other name to
/// the container source, if one is configured.
#[derive(Clone)]
pub struct LogRouter {
    application: Arc<AppLogService>,
    containers: Option<Arc<dyn LogSource>>,
}

impl LogRouter {
    pub fn new(application: Arc<AppLogService>) -> Self {
        Self {
            application,
            containers: None,
        }
    }

    pub fn with_containers(mut self, containers: Arc<dyn LogSource>) -> Self {
        self.containers = Some(containers);
        self
    }

    pub fn application(&self) -> &Arc<AppLogService> {
        &self.application
    }

    pub fn has_containers(&self) -> bool {
        self.containers.is_some()
    }

    fn select(&self, service: &str) -> &dyn LogSource {
        match &self.containers {
            Some(containers) if service != APPLICATION_SERVICE => containers.as_ref(),
            _ => self.application.as_ref(),
        }
    }
}

#[async_trait]
impl LogSource for LogRouter {
    async fn stream_logs(
        &self,
        cancel: &CancellationToken,
        service: &str,
        tail: usize,
    ) -> Result<LogStream> {
        self.select(service).stream_logs(cancel, service, tail).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(&'static str);

    #[async_trait]
    impl LogSource for FixedSource {
        async fn stream_logs(
            &self,
            _cancel: &CancellationToken,
            service: &str,
            _tail: usize,
        ) -> Result<LogStream> {
            Ok(LogStream::closed_with(vec![format!("{}:{}", self.0, service)]))
        }
    }

    #[tokio::test]
    async fn test_application_goes_to_broadcaster() {
        let app = Arc::new(AppLogService::new(4));
        app.ingest("from app");
        let router = LogRouter::new(app).with_containers(Arc::new(FixedSource("docker")));

        let cancel = CancellationToken::new();
        let mut stream = router
            .stream_logs(&cancel, APPLICATION_SERVICE, 1)
            .await
            .unwrap();
        assert_eq!(stream.next_line().await.as_deref(), Some("from app"));
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_other_names_go_to_containers() {
        let router = LogRouter::new(Arc::new(AppLogService::new(4)))
            .with_containers(Arc::new(FixedSource("docker")));

        let cancel = CancellationToken::new();
        let lines = router
            .stream_logs(&cancel, "worker", 10)
            .await
            .unwrap()
            .collect_lines()
            .await;
        assert_eq!(lines, vec!["docker:worker"]);
    }

    #[tokio::test]
    async fn test_without_containers_other_names_are_empty() {
        let router = LogRouter::new(Arc::new(AppLogService::new(4)));
        assert!(!router.has_containers());

        let cancel = CancellationToken::new();
        let lines = router
            .stream_logs(&cancel, "worker", 10)
            .await
            .unwrap()
            .collect_lines()
            .await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_application_handle_is_the_shared_broadcaster() {
        let app = Arc::new(AppLogService::new(4));
        let router = LogRouter::new(app.clone());
        assert!(Arc::ptr_eq(router.application(), &app));

        let cancel = CancellationToken::new();
        let mut stream = router
            .stream_logs(&cancel, APPLICATION_SERVICE, 0)
            .await
            .unwrap();
        router.application().close_all();
        assert_eq!(stream.next_line().await, None);
        assert_eq!(app.subscriber_count(), 0);
    }
}
