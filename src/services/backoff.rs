use log::{error, warn};
use std::time::Duration;

use crate::error::ConnectorError;
use crate::models::QueueConfig;

/// Smallest delay between retries, used when the polling interval is shorter.
pub const MIN_BACKOFF: Duration = Duration::from_secs(1);

/// Rough category of a queue service error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Transient,
    Unknown,
}

const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "ExpiredTokenException",
    "IncompleteSignature",
    "InvalidClientTokenId",
    "InvalidSecurity",
    "KMS.AccessDeniedException",
    "MissingAuthenticationToken",
    "NotAuthenticated",
    "NotAuthorizedOrNotFound",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

const TRANSIENT_CODES: &[&str] = &[
    "InternalError",
    "InternalFailure",
    "InternalServerError",
    "KMS.ThrottlingException",
    "KmsThrottled",
    "OverLimit",
    "RequestThrottled",
    "RequestTimeout",
    "RequestTimeoutException",
    "ServiceUnavailable",
    "Throttling",
    "ThrottlingException",
    "TooManyRequests",
];

/// Classify a service error code.
pub fn classify_code(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if AUTH_CODES.contains(&code) => ErrorKind::Auth,
        Some(code) if TRANSIENT_CODES.contains(&code) => ErrorKind::Transient,
        _ => ErrorKind::Unknown,
    }
}

impl ErrorKind {
    pub fn into_error(self, operation: &'static str, message: String) -> ConnectorError {
        match self {
            ErrorKind::Auth => ConnectorError::Auth { operation, message },
            ErrorKind::Transient => ConnectorError::TransientQueue { operation, message },
            ErrorKind::Unknown => ConnectorError::Unclassified { operation, message },
        }
    }
}

/// Exponential backoff between a floor and a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        let floor = floor.max(MIN_BACKOFF);
        let ceiling = ceiling.max(floor);
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay to wait now; doubles the next one up to the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(2)
            .unwrap_or(self.ceiling)
            .min(self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

/// What the poll loop does after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Retry(Duration),
    Stop,
}

/// Decides retry vs. stop for errors raised while polling.
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    backoff: Backoff,
    consecutive_failures: u32,
}

impl ErrorPolicy {
    pub fn new(backoff: Backoff) -> Self {
        Self {
            backoff,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(Backoff::new(config.polling_interval(), config.max_backoff()))
    }

    pub fn on_error(&mut self, err: &ConnectorError) -> Action {
        if err.is_fatal() {
            error!("Fatal queue error, stopping: {}", err);
            return Action::Stop;
        }

        self.consecutive_failures += 1;
        let delay = self.backoff.next_delay();
        match err {
            ConnectorError::Unclassified { .. } => error!(
                "Unexpected queue error (attempt {}), retrying in {:?}: {}",
                self.consecutive_failures, delay, err
            ),
            _ => warn!(
                "Transient queue error (attempt {}), retrying in {:?}: {}",
                self.consecutive_failures, delay, err
            ),
        }
        Action::Retry(delay)
    }

    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttled() -> ConnectorError {
        ConnectorError::TransientQueue {
            operation: "poll",
            message: "ThrottlingException".to_string(),
        }
    }

    #[test]
    fn test_classify_code() {
        assert_eq!(classify_code(Some("AccessDenied")), ErrorKind::Auth);
        assert_eq!(classify_code(Some("NotAuthenticated")), ErrorKind::Auth);
        assert_eq!(classify_code(Some("ThrottlingException")), ErrorKind::Transient);
        assert_eq!(classify_code(Some("ServiceUnavailable")), ErrorKind::Transient);
        assert_eq!(classify_code(Some("QueueDoesNotExist")), ErrorKind::Unknown);
        assert_eq!(classify_code(None), ErrorKind::Unknown);
    }

    #[test]
    fn test_backoff_doubles_up_to_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(10));
        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 10, 10, 10]);
    }

    #[test]
    fn test_backoff_non_decreasing_and_bounded() {
        let mut backoff = Backoff::new(Duration::from_millis(1500), Duration::from_secs(45));
        let mut previous = Duration::ZERO;
        for _ in 0..100 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= Duration::from_secs(45));
            previous = delay;
        }
    }

    #[test]
    fn test_backoff_floor_for_zero_interval() {
        let mut backoff = Backoff::new(Duration::ZERO, Duration::from_secs(60));
        assert_eq!(backoff.next_delay(), MIN_BACKOFF);
        backoff.reset();
        assert_eq!(backoff.next_delay(), MIN_BACKOFF);
    }

    #[test]
    fn test_ceiling_never_below_floor() {
        let mut backoff = Backoff::new(Duration::from_secs(30), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_policy_resets_after_success() {
        let mut policy = ErrorPolicy::new(Backoff::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
        ));

        assert_eq!(policy.on_error(&throttled()), Action::Retry(Duration::from_secs(1)));
        assert_eq!(policy.on_error(&throttled()), Action::Retry(Duration::from_secs(2)));

        policy.on_success();
        assert_eq!(policy.on_error(&throttled()), Action::Retry(Duration::from_secs(1)));
    }

    #[test]
    fn test_policy_stops_on_auth() {
        let mut policy = ErrorPolicy::new(Backoff::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
        ));
        let err = ConnectorError::Auth {
            operation: "poll",
            message: "InvalidClientTokenId".to_string(),
        };
        assert_eq!(policy.on_error(&err), Action::Stop);
    }

    #[test]
    fn test_policy_retries_unclassified() {
        let mut policy = ErrorPolicy::new(Backoff::new(
            Duration::from_secs(5),
            Duration::from_secs(60),
        ));
        let err = ConnectorError::Unclassified {
            operation: "poll",
            message: "QueueDoesNotExist".to_string(),
        };
        assert_eq!(policy.on_error(&err), Action::Retry(Duration::from_secs(5)));
    }
}
