//! Ordered fallback across configured model endpoints.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{BotError, Result};
use crate::types::{Endpoint, EndpointKind};

/// Pause before moving on to the next endpoint after a failure
const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_secs(1);

/// Tries endpoints in configured order until one succeeds.
#[derive(Debug, Clone)]
pub struct FallbackDispatcher {
    delay: Duration,
}

impl Default for FallbackDispatcher {
    fn default() -> Self {
        Self {
            delay: DEFAULT_FALLBACK_DELAY,
        }
    }
}

impl FallbackDispatcher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Runs `call` against each endpoint in order and returns the first success.
    ///
    /// Individual failures are logged and swallowed. Once every endpoint has
    /// failed the result is [`BotError::AllEndpointsExhausted`].
    pub async fn dispatch<'a, T, F, Fut>(
        &self,
        kind: EndpointKind,
        endpoints: &'a [Endpoint],
        subject: &str,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut(&'a Endpoint) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        for (index, endpoint) in endpoints.iter().enumerate() {
            debug!(
                "[{subject}] Trying {kind} endpoint #{index} ({})",
                endpoint.model
            );
            match call(endpoint).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        "[{subject}] {kind} endpoint #{index} ({}) failed: {e}",
                        endpoint.model
                    );
                    if index + 1 < endpoints.len() && !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        Err(BotError::AllEndpointsExhausted {
            kind,
            attempts: endpoints.len(),
        })
    }
}
