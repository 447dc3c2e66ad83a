//! The line source seam shared by every log backend

use super::types::LogStream;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Something that can turn a logical service name into a live stream of lines.
///
/// `tail` is the number of historical lines to deliver before live ones; 0 asks
/// for none. An `Err` is returned only when no stream can be started at all.
/// Anything that goes wrong after that is reported as a line inside the stream,
/// which then closes.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn stream_logs(
        &self,
        cancel: &CancellationToken,
        service: &str,
        tail: usize,
    ) -> Result<LogStream>;
}
