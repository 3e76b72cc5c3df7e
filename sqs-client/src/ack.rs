//! Background reporting of the last delivered message id
//!
//! Each successful non-empty pull spawns one reporter task. A task retries
//! until the server accepts the report, with a growing delay between failed
//! attempts. Tasks are neither deduplicated nor ordered; the server ignores
//! an id not beyond what it already holds. Closing the client cancels every
//! task still retrying.
use std::time::Duration;

use backoff::future::retry_notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{ClientError, Result};
use crate::options::AckRetry;
use crate::types::ReceivedParams;

#[derive(Clone)]
pub(crate) struct AckReporter {
    httpc: reqwest::Client,
    retry: AckRetry,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl AckReporter {
    pub(crate) fn new(httpc: reqwest::Client, retry: AckRetry) -> Self {
        Self { httpc, retry, cancel: CancellationToken::new(), tracker: TaskTracker::new() }
    }

    pub(crate) fn spawn(&self, url: String, params: ReceivedParams) {
        if self.cancel.is_cancelled() {
            log::warn!("client closed, message id {} is not reported", params.message_id);
            return;
        }
        let httpc = self.httpc.clone();
        let cancel = self.cancel.clone();
        let retry = self.retry.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("report of message id {} cancelled, {}", params.message_id, params.base.queue_name);
                }
                r = report(&httpc, &retry, &url, &params) => {
                    match r {
                        Ok(()) => log::debug!("message id {} reported, {}", params.message_id, params.base.queue_name),
                        Err(e) => log::error!("report of message id {} abandoned, {e}", params.message_id),
                    }
                }
            }
        });
    }

    #[inline]
    pub(crate) fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub(crate) async fn close(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn report(httpc: &reqwest::Client, retry: &AckRetry, url: &str, params: &ReceivedParams) -> Result<()> {
    let op = || {
        let httpc = httpc.clone();
        let url = url.to_owned();
        let params = params.clone();
        async move {
            let resp = httpc
                .post(url.as_str())
                .json(&params)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ClientError::from(e)))?;
            let status = resp.status();
            if status.is_success() {
                Ok::<(), backoff::Error<ClientError>>(())
            } else {
                let message = resp.text().await.unwrap_or_default();
                Err(backoff::Error::transient(ClientError::Status {
                    op: "report received message id",
                    status: status.as_u16(),
                    message,
                }))
            }
        }
    };
    retry_notify(retry.backoff_strategy(), op, |e: ClientError, delay: Duration| {
        log::warn!("report message id {} failed, retry in {delay:?}, {e}", params.message_id);
    })
    .await
}
