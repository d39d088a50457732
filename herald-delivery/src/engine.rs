//! The delivery retry loop.

use std::time::Duration;

use herald_common::Signal;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::{DeliveryError, TransportError},
    policy::RetryPolicy,
    request::SendRequest,
    status::{Classification, extract_status_code},
    transport::Transport,
};

/// The result of one call to [`deliver`], with the number of times the
/// transport was invoked to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcome: Result<(), DeliveryError>,
    pub attempts: u32,
}

impl DeliveryReport {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Discards the attempt count.
    ///
    /// # Errors
    ///
    /// The delivery's error, if it failed.
    pub fn into_result(self) -> Result<(), DeliveryError> {
        self.outcome
    }
}

/// Sends `request` through `transport`, retrying while the server answers
/// `421`.
///
/// At most `policy.max_attempts` attempts are made. Any failure other than a
/// `421`, including one with no reply code at all, ends the delivery at
/// once. When every attempt fails with `421`, the last of those errors is
/// returned. Between attempts the call waits according to a backoff drawn
/// once for this delivery.
pub async fn deliver<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: &SendRequest,
) -> DeliveryReport
where
    T: Transport + ?Sized,
{
    run(transport, policy, request, None).await
}

/// Like [`deliver`], but a [`Signal::Shutdown`] received while waiting to
/// retry ends the delivery with [`DeliveryError::Cancelled`].
///
/// An attempt already in progress is allowed to finish. If every sender of
/// the channel is dropped, the delivery carries on uncancellable.
pub async fn deliver_until<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: &SendRequest,
    shutdown: broadcast::Receiver<Signal>,
) -> DeliveryReport
where
    T: Transport + ?Sized,
{
    run(transport, policy, request, Some(shutdown)).await
}

#[tracing::instrument(level = "debug", skip_all, fields(address = %request.address(), max_attempts = policy.max_attempts))]
async fn run<T>(
    transport: &T,
    policy: &RetryPolicy,
    request: &SendRequest,
    mut shutdown: Option<broadcast::Receiver<Signal>>,
) -> DeliveryReport
where
    T: Transport + ?Sized,
{
    let backoff = policy.backoff();
    let address = request.address();
    let auth = request.auth();

    let mut attempts = 0;
    let mut last_error: Option<TransportError> = None;

    while policy.should_retry(attempts) {
        attempts += 1;

        let result = transport
            .send_mail(
                &address,
                &auth,
                request.from(),
                request.to(),
                request.message(),
            )
            .await;

        let error = match result {
            Ok(()) => {
                tracing::debug!(attempts, "Delivery succeeded");
                return DeliveryReport {
                    outcome: Ok(()),
                    attempts,
                };
            }
            Err(error) => error,
        };

        let code = extract_status_code(error.message());
        tracing::debug!(attempts, code, %error, "Delivery attempt failed");

        if !Classification::of_code(code).is_transient() {
            return DeliveryReport {
                outcome: Err(error.into()),
                attempts,
            };
        }

        if policy.should_retry(attempts) {
            let delay = backoff.delay(attempts);
            tracing::info!(
                attempts,
                remaining = policy.remaining_attempts(attempts),
                ?delay,
                "Server temporarily unavailable, retrying"
            );

            if wait(delay, &mut shutdown).await {
                tracing::info!(attempts, "Delivery cancelled");
                return DeliveryReport {
                    outcome: Err(DeliveryError::Cancelled {
                        attempts,
                        last: error,
                    }),
                    attempts,
                };
            }
        }

        last_error = Some(error);
    }

    let outcome = last_error.map_or_else(
        || {
            Err(TransportError::new(format!(
                "no delivery attempted: max_attempts is {}",
                policy.max_attempts
            ))
            .into())
        },
        |error| Err(error.into()),
    );

    DeliveryReport { outcome, attempts }
}

/// Sleeps for `delay`, returning `true` if a shutdown arrived first.
async fn wait(delay: Duration, shutdown: &mut Option<broadcast::Receiver<Signal>>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        let Some(receiver) = shutdown.as_mut() else {
            sleep.await;
            return false;
        };

        let signal = tokio::select! {
            () = &mut sleep => return false,
            signal = receiver.recv() => signal,
        };

        match signal {
            Ok(Signal::Shutdown) | Err(RecvError::Lagged(_)) => return true,
            Err(RecvError::Closed) => *shutdown = None,
        }
    }
}
