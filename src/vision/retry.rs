use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::vision::{DescribeError, ImageDescriber};

/// Retries rate-limited descriptions with linear backoff.
///
/// The n-th retry waits `n * backoff`. Errors other than
/// [`DescribeError::RateLimited`] are returned immediately.
pub struct RetryingDescriber<D> {
    inner: D,
    max_retries: u32,
    backoff: Duration,
}

impl<D: ImageDescriber> RetryingDescriber<D> {
    pub fn new(inner: D, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }
}

impl<D: ImageDescriber> ImageDescriber for RetryingDescriber<D> {
    fn describe(&self, image_base64: &str, context: Option<&str>) -> Result<String, DescribeError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.describe(image_base64, context) {
                Err(DescribeError::RateLimited(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.backoff * attempt;
                    warn!(
                        backend = self.inner.name(),
                        attempt,
                        max_retries = self.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        %reason,
                        "rate limited, backing off"
                    );
                    thread::sleep(wait);
                }
                other => return other,
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn check_connection(&self) -> Result<(), DescribeError> {
        self.inner.check_connection()
    }

    fn check_model(&self) -> Result<(), DescribeError> {
        self.inner.check_model()
    }
}
