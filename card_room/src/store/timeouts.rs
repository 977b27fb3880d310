//! Store operation timeout wrapper.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::StoreError;

/// Budget for a single store round trip. Operations that exceed it are
/// surfaced as `StoreError::Timeout` and retried once by the coordinator.
pub const STORE_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Run a store future under [`STORE_OP_TIMEOUT`].
pub async fn with_timeout<F, T>(future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout(STORE_OP_TIMEOUT, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(STORE_OP_TIMEOUT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let result = with_timeout(async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let result = with_timeout(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(7)
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
