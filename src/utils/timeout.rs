//! Async timeout helpers and the gateway's fixed time limits.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// A client must deliver its complete frame within this time
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on flushing a reply to a slow client
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time given to in-flight connections on shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut`, mapping an elapsed deadline to [`ProtocolError::Timeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}
