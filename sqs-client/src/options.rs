use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};

use sqs_utils::{deserialize_duration, serialize_duration};

use crate::types::UserAuth;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Options {
    /// Cluster control point, any serving node
    pub endpoint: String,
    #[serde(flatten)]
    pub auth: UserAuth,
    #[serde(
        default = "Options::connect_timeout_default",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub connect_timeout: Duration,
    #[serde(
        default = "Options::timeout_default",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
    #[serde(default)]
    pub ack_retry: AckRetry,
}

impl Options {
    pub fn new<E: Into<String>, A: Into<String>, S: Into<String>>(endpoint: E, access_key: A, secret_key: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: UserAuth { access_key: access_key.into(), secret_key: secret_key.into() },
            connect_timeout: Self::connect_timeout_default(),
            timeout: Self::timeout_default(),
            ack_retry: AckRetry::default(),
        }
    }

    fn connect_timeout_default() -> Duration {
        Duration::from_secs(8)
    }

    fn timeout_default() -> Duration {
        Duration::from_secs(15)
    }
}

/// Delay policy of the background ack reporter. It never gives up, only the
/// delay between attempts grows until `max_interval`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AckRetry {
    /// Delay before the first retry, the first attempt is always immediate
    #[serde(
        default = "AckRetry::initial_interval_default",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub initial_interval: Duration,
    #[serde(
        default = "AckRetry::max_interval_default",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub max_interval: Duration,
    #[serde(default = "AckRetry::multiplier_default")]
    pub multiplier: f64,
    #[serde(default = "AckRetry::randomization_factor_default")]
    pub randomization_factor: f64,
}

impl Default for AckRetry {
    fn default() -> Self {
        Self {
            initial_interval: Self::initial_interval_default(),
            max_interval: Self::max_interval_default(),
            multiplier: Self::multiplier_default(),
            randomization_factor: Self::randomization_factor_default(),
        }
    }
}

impl AckRetry {
    fn initial_interval_default() -> Duration {
        Duration::from_millis(500)
    }
    fn max_interval_default() -> Duration {
        Duration::from_secs(30)
    }
    fn multiplier_default() -> f64 {
        2.0
    }
    fn randomization_factor_default() -> f64 {
        0.2
    }

    pub fn backoff_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoff::backoff::Backoff;

    #[test]
    fn ack_retry_never_gives_up_and_grows() {
        let retry = AckRetry {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(80),
            multiplier: 2.0,
            randomization_factor: 0.0,
        };
        let mut b = retry.backoff_strategy();
        let delays: Vec<Duration> = (0..6).filter_map(|_| b.next_backoff()).collect();
        assert_eq!(delays.len(), 6);
        assert_eq!(delays[0], Duration::from_millis(10));
        assert_eq!(delays[1], Duration::from_millis(20));
        assert_eq!(delays[5], Duration::from_millis(80));
    }

    #[test]
    fn options_from_json() {
        let opts: Options = serde_json::from_str(
            r#"{"endpoint": "127.0.0.1:5446", "access_key": "root", "secret_key": "s",
                "timeout": "3s", "ack_retry": {"initial_interval": "100ms"}}"#,
        )
        .unwrap();
        assert_eq!(opts.auth.access_key, "root");
        assert_eq!(opts.timeout, Duration::from_secs(3));
        assert_eq!(opts.connect_timeout, Duration::from_secs(8));
        assert_eq!(opts.ack_retry.initial_interval, Duration::from_millis(100));
        assert_eq!(opts.ack_retry.max_interval, Duration::from_secs(30));
    }
}
