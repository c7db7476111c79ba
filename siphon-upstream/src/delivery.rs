use std::time::Duration;

use siphon_config::Config;

use crate::UpstreamRequestError;

/// Timing parameters of a delivery.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeliveryPolicy {
    /// Maximum duration of a single request.
    pub timeout: Duration,
    /// Delay before the one retry of a failed request.
    pub retry_delay: Duration,
}

impl DeliveryPolicy {
    /// Reads the policy from the upstream configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.http_timeout(),
            retry_delay: config.retry_delay(),
        }
    }
}

/// The attempt a request belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Attempt {
    /// The initial request.
    First,
    /// The single retry after a transient failure.
    Retry,
}

impl Attempt {
    /// Returns the number of requests sent up to and including this attempt.
    pub fn count(self) -> u32 {
        match self {
            Self::First => 1,
            Self::Retry => 2,
        }
    }
}

/// The final result of delivering a batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeliveryOutcome {
    /// The metrics API accepted the batch.
    Succeeded {
        /// Number of requests sent.
        attempts: u32,
    },
    /// The metrics API rejected the batch with a client error.
    Rejected {
        /// The response status code.
        status: u16,
    },
    /// The batch was dropped after a transient failure of the retry, or could not be encoded.
    FailedFinal {
        /// Number of requests sent.
        attempts: u32,
    },
    /// The last request exceeded the timeout.
    TimedOut {
        /// Number of requests sent.
        attempts: u32,
    },
}

impl DeliveryOutcome {
    /// Returns `true` if the batch was accepted.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// The step following a finished request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    /// Wait for the retry delay, then send the retry.
    ScheduleRetry,
    /// Delivery is complete.
    Finish(DeliveryOutcome),
}

/// Decides how delivery continues after a request.
///
/// `result` is the status of a 1xx to 3xx response, or the error of the request:
///
///  - Success finishes the delivery.
///  - Server errors and connection failures schedule a retry on the first attempt and fail the
///    delivery on the retry.
///  - Client errors reject the batch.
///  - Timeouts finish the delivery without a retry.
pub fn transition(attempt: Attempt, result: &Result<(), UpstreamRequestError>) -> Transition {
    let attempts = attempt.count();

    let error = match result {
        Ok(()) => return Transition::Finish(DeliveryOutcome::Succeeded { attempts }),
        Err(error) => error,
    };

    match error {
        UpstreamRequestError::Timeout => Transition::Finish(DeliveryOutcome::TimedOut { attempts }),
        UpstreamRequestError::ResponseError(status, _) if error.is_permanent_rejection() => {
            Transition::Finish(DeliveryOutcome::Rejected {
                status: status.as_u16(),
            })
        }
        _ if error.is_network_error() && attempt == Attempt::First => Transition::ScheduleRetry,
        _ => Transition::Finish(DeliveryOutcome::FailedFinal { attempts }),
    }
}
