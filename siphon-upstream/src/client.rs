use std::error::Error;
use std::sync::Arc;

use reqwest::header;
use siphon_common::UnixTimestamp;
use siphon_config::Config;
use siphon_metrics::{Batch, BatchSink};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::{
    Attempt, DeliveryOutcome, DeliveryPolicy, FlushStats, Payload, Transition, UpstreamError,
    UpstreamRequestError, transition,
};

/// Path of the measurement submission endpoint.
const METRICS_PATH: &str = "/v1/metrics";

#[derive(Debug)]
struct Inner {
    client: reqwest::Client,
    url: Url,
    email: String,
    token: String,
    source: Option<String>,
    policy: DeliveryPolicy,
    stats: Arc<FlushStats>,
}

impl Inner {
    async fn send(&self, body: Vec<u8>) -> Result<(), UpstreamRequestError> {
        let response = self
            .client
            .post(self.url.clone())
            .basic_auth(&self.email, Some(&self.token))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .timeout(self.policy.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(UpstreamRequestError::ResponseError(status, text));
        }

        Ok(())
    }

    async fn deliver(&self, batch: Batch) -> DeliveryOutcome {
        let body = match Payload::new(&batch, self.source.as_deref()).to_vec() {
            Ok(body) => body,
            Err(error) => {
                let error = UpstreamRequestError::from(error);
                siphon_log::error!(error = &error as &dyn Error, "dropping batch");
                self.stats.record_exception(UnixTimestamp::now());
                return DeliveryOutcome::FailedFinal { attempts: 0 };
            }
        };

        let mut attempt = Attempt::First;
        loop {
            self.stats.record_dispatch(UnixTimestamp::now());
            let result = self.send(body.clone()).await;

            let outcome = match transition(attempt, &result) {
                Transition::Finish(outcome) => outcome,
                Transition::ScheduleRetry => {
                    if let Err(error) = &result {
                        siphon_log::debug!(
                            error = error as &dyn Error,
                            retry_delay = ?self.policy.retry_delay,
                            "scheduling retry of batch"
                        );
                    }
                    tokio::time::sleep(self.policy.retry_delay).await;
                    attempt = Attempt::Retry;
                    continue;
                }
            };

            self.log_outcome(outcome, &batch, result.err());
            if !outcome.is_success() {
                self.stats.record_exception(UnixTimestamp::now());
            }

            return outcome;
        }
    }

    fn log_outcome(
        &self,
        outcome: DeliveryOutcome,
        batch: &Batch,
        error: Option<UpstreamRequestError>,
    ) {
        let measurements = batch.len();

        match (outcome, error) {
            (DeliveryOutcome::Succeeded { attempts }, _) => {
                siphon_log::trace!(measurements, attempts, "submitted batch");
            }
            (DeliveryOutcome::Rejected { status }, error) => {
                if let Some(UpstreamRequestError::ResponseError(_, body)) = &error {
                    siphon_log::debug!(status, body = body.as_str(), "rejection response");
                }
                siphon_log::warn!(measurements, status, "metrics API rejected batch");
            }
            (DeliveryOutcome::TimedOut { attempts }, _) => {
                siphon_log::warn!(measurements, attempts, "batch submission timed out");
            }
            (DeliveryOutcome::FailedFinal { attempts }, Some(error)) => {
                siphon_log::error!(
                    error = &error as &dyn Error,
                    measurements,
                    attempts,
                    "failed to submit batch"
                );
            }
            (DeliveryOutcome::FailedFinal { attempts }, None) => {
                siphon_log::error!(measurements, attempts, "failed to submit batch");
            }
        }
    }
}

/// Client for the Librato metrics API.
///
/// Cloning the client is cheap, clones share the HTTP connection pool, the statistics and the set
/// of in-flight deliveries.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    inner: Arc<Inner>,
    tracker: TaskTracker,
    handle: Handle,
}

impl UpstreamClient {
    /// Creates a client with the timing from the configuration.
    ///
    /// Must be called within a tokio runtime, which is used to run deliveries.
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        Self::with_policy(config, DeliveryPolicy::from_config(config))
    }

    /// Creates a client with custom timing.
    pub fn with_policy(config: &Config, policy: DeliveryPolicy) -> Result<Self, UpstreamError> {
        let credentials = config.credentials().map_err(UpstreamError::NoCredentials)?;
        let url = config
            .api()
            .get_url(METRICS_PATH)
            .map_err(UpstreamError::InvalidUrl)?;

        let builder = reqwest::Client::builder().user_agent(config.user_agent());
        let builder = match config.proxy() {
            Some(proxy) => {
                builder.proxy(reqwest::Proxy::all(proxy).map_err(UpstreamError::InvalidProxy)?)
            }
            None => builder.no_proxy(),
        };
        let client = builder.build().map_err(UpstreamError::BuildClient)?;

        let handle = Handle::try_current().map_err(UpstreamError::NoRuntime)?;

        let inner = Inner {
            client,
            url,
            email: credentials.email.to_owned(),
            token: credentials.token.to_owned(),
            source: config.source().map(str::to_owned),
            policy,
            stats: Arc::new(FlushStats::new()),
        };

        Ok(Self {
            inner: Arc::new(inner),
            tracker: TaskTracker::new(),
            handle,
        })
    }

    /// Returns the URL batches are posted to.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Returns the shared delivery statistics.
    pub fn stats(&self) -> &Arc<FlushStats> {
        &self.inner.stats
    }

    /// Delivers a batch and waits for the outcome, including a possible retry.
    pub async fn deliver(&self, batch: Batch) -> DeliveryOutcome {
        self.inner.deliver(batch).await
    }

    /// Stops accepting batches and waits for all in-flight deliveries to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl BatchSink for UpstreamClient {
    fn submit(&self, batch: Batch) {
        if self.tracker.is_closed() {
            siphon_log::warn!(measurements = batch.len(), "dropping batch after shutdown");
            return;
        }

        let inner = Arc::clone(&self.inner);
        self.tracker.spawn_on(
            async move {
                inner.deliver(batch).await;
            },
            &self.handle,
        );
    }
}
