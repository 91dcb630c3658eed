//! Shared HTTP client settings

use std::time::Duration;

use crate::error::SourceError;
use crate::retry::FetchPolicy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-level timeouts plus the per-call retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let policy = FetchPolicy::default();
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            max_retries: policy.max_retries,
            retry_base_delay: policy.base_delay,
        }
    }
}

impl HttpConfig {
    /// Build a pooled client carrying the connect and request timeouts.
    pub fn build_client(&self) -> Result<reqwest::Client, SourceError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .pool_max_idle_per_host(8)
            .user_agent(concat!("hnpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SourceError::from_reqwest)
    }

    /// Per-call policy for the pipeline. The call timeout matches the request timeout.
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Some(self.request_timeout),
            max_retries: self.max_retries,
            base_delay: self.retry_base_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_follows_config() {
        let config = HttpConfig {
            request_timeout: Duration::from_secs(5),
            max_retries: 3,
            ..HttpConfig::default()
        };
        let policy = config.fetch_policy();
        assert_eq!(policy.timeout, Some(Duration::from_secs(5)));
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn default_client_builds() {
        assert!(HttpConfig::default().build_client().is_ok());
    }
}
