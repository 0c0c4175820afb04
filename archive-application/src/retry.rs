use std::time::Duration;

use archive_domain::CallError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    Transient,
    RateLimited,
    Overloaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Repeat the identical request after `delay` (zero means immediately).
    Retry { cause: RetryCause, delay: Duration },
    /// The cursor ran past the available data.
    NoMoreData,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub rate_limit_backoff: Duration,
    pub overload_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_backoff: Duration::from_secs(10),
            overload_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn classify(&self, err: &CallError) -> Disposition {
        match err {
            CallError::Transport {
                status: Some(429), ..
            } => Disposition::Retry {
                cause: RetryCause::RateLimited,
                delay: self.rate_limit_backoff,
            },
            CallError::Transport {
                status: Some(503 | 504),
                ..
            } => Disposition::Retry {
                cause: RetryCause::Overloaded,
                delay: self.overload_backoff,
            },
            CallError::Transport { .. } => Disposition::Retry {
                cause: RetryCause::Transient,
                delay: Duration::ZERO,
            },
            CallError::Rpc { .. } if err.is_no_more_data() => Disposition::NoMoreData,
            CallError::Rpc { .. } => Disposition::Retry {
                cause: RetryCause::Transient,
                delay: Duration::ZERO,
            },
            CallError::Protocol(_) => Disposition::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_statuses() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.classify(&CallError::transport(Some(429), "too many requests")),
            Disposition::Retry {
                cause: RetryCause::RateLimited,
                delay: Duration::from_secs(10)
            }
        );
        for status in [503, 504] {
            assert_eq!(
                policy.classify(&CallError::transport(Some(status), "unavailable")),
                Disposition::Retry {
                    cause: RetryCause::Overloaded,
                    delay: Duration::from_secs(5)
                }
            );
        }
        assert_eq!(
            policy.classify(&CallError::transport(None, "connection reset")),
            Disposition::Retry {
                cause: RetryCause::Transient,
                delay: Duration::ZERO
            }
        );
        assert_eq!(
            policy.classify(&CallError::transport(Some(500), "internal")),
            Disposition::Retry {
                cause: RetryCause::Transient,
                delay: Duration::ZERO
            }
        );
    }

    #[test]
    fn rpc_codes() {
        let policy = RetryPolicy::default();
        let exhausted = CallError::Rpc {
            code: -32602,
            message: "invalid params".to_string(),
        };
        assert_eq!(policy.classify(&exhausted), Disposition::NoMoreData);

        let other = CallError::Rpc {
            code: -32000,
            message: "busy".to_string(),
        };
        assert!(matches!(
            policy.classify(&other),
            Disposition::Retry {
                cause: RetryCause::Transient,
                ..
            }
        ));
        assert_eq!(
            policy.classify(&CallError::Protocol("not json".to_string())),
            Disposition::Fatal
        );
    }
}
