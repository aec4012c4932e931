use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::Result;

/// Runs `f` up to `attempts` times, sleeping `delay` between failures.
pub(crate) async fn with_retry<F, Fut, T>(f: F, attempts: u32, delay: Duration) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        debug!("Attempt {} of {}", attempt, attempts);
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!("Operation succeeded after {} retries", attempt - 1);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= attempts {
                    error!("Operation failed after {} attempts: {}", attempt, e);
                    return Err(e);
                }
                warn!("Attempt {} failed: {}. Retrying in {:?}...", attempt, e, delay);
                sleep(delay).await;
            }
        }
    }
}
