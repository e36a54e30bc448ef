//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap origin calls with the service's response timeout
//! - Cancel the pending call cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other transport errors

use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

/// Run `fut`, failing with a timeout error for `origin_id` if it exceeds `limit`.
pub async fn with_response_timeout<F, T>(
    origin_id: &str,
    limit: Duration,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::timeout(
            origin_id,
            format!("no response within {}ms", limit.as_millis()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;

    #[tokio::test]
    async fn test_completes_within_limit() {
        let result = with_response_timeout("o1", Duration::from_millis(100), async {
            Ok::<_, TransportError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_times_out() {
        let result = with_response_timeout("o1", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, TransportError>(7)
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Timeout);
        assert_eq!(err.origin_id, "o1");
    }
}
