//! Retrying message dispatcher.
//!
//! Each send runs an explicit attempt/delay/outcome state machine over an
//! opaque [`ChatTransport`]: try, and on a retryable failure sleep the fixed
//! delay and try again, up to the configured maximum. Success returns
//! immediately; exhaustion is reported to the caller as an outcome, never
//! raised. The clock is injectable so retry behavior is testable without
//! real delays.
//!
//! Permanent failures (for example an invalid destination) are only retried
//! when `retry_permanent` is explicitly enabled.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RetrySettings;

/// Destination chat identifier.
pub type ChatId = i64;

/// How a delivery failure should be treated by the retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Expected to be recoverable by retrying with the same inputs.
    Transient,
    /// Retrying with the same inputs will not help.
    Permanent,
}

/// A failed delivery attempt.
#[derive(Clone, Debug)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Permanent,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TransportErrorKind::Transient => write!(f, "transient: {}", self.message),
            TransportErrorKind::Permanent => write!(f, "permanent: {}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Message delivery surface of the chat endpoint.
pub trait ChatTransport: Send {
    fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;
    fn send_photo(
        &self,
        chat: ChatId,
        jpeg: &[u8],
        caption: Option<&str>,
    ) -> Result<(), TransportError>;
}

/// Sleep source, injectable for tests.
pub trait Clock: Send {
    fn sleep(&self, duration: Duration);
}

/// Real clock backed by `thread::sleep`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + Sync + ?Sized> Clock for Arc<C> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Retry tunables, fixed per run.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub retry_permanent: bool,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            delay: settings.delay,
            retry_permanent: settings.retry_permanent,
        }
    }

    fn retries(&self, error: &TransportError) -> bool {
        match error.kind {
            TransportErrorKind::Transient => true,
            TransportErrorKind::Permanent => self.retry_permanent,
        }
    }
}

/// Outcome of one dispatched message.
#[derive(Clone, Debug)]
pub enum DispatchOutcome {
    Delivered {
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        last_error: TransportError,
    },
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            DispatchOutcome::Delivered { attempts } => *attempts,
            DispatchOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Transient per-send retry state.
struct DispatchAttempt {
    index: u32,
    max_attempts: u32,
    delay: Duration,
    last_error: Option<TransportError>,
}

impl DispatchAttempt {
    fn begin(policy: &RetryPolicy) -> Self {
        Self {
            index: 0,
            max_attempts: policy.max_attempts,
            delay: policy.delay,
            last_error: None,
        }
    }

    fn next(&mut self) -> u32 {
        self.index += 1;
        self.index
    }

    fn exhausted(&self) -> bool {
        self.index >= self.max_attempts
    }

    fn record(&mut self, error: TransportError) {
        self.last_error = Some(error);
    }

    fn into_outcome(self) -> DispatchOutcome {
        DispatchOutcome::Exhausted {
            attempts: self.index,
            last_error: self
                .last_error
                .unwrap_or_else(|| TransportError::transient("send failed")),
        }
    }
}

/// Delivers messages through a transport with bounded retry.
pub struct Dispatcher {
    transport: Box<dyn ChatTransport>,
    clock: Box<dyn Clock>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(transport: Box<dyn ChatTransport>, policy: RetryPolicy) -> Self {
        Self::with_clock(transport, policy, Box::new(SystemClock))
    }

    pub fn with_clock(
        transport: Box<dyn ChatTransport>,
        policy: RetryPolicy,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            clock,
            policy,
        }
    }

    pub fn send_text(&self, chat: ChatId, text: &str) -> DispatchOutcome {
        self.run("text message", || self.transport.send_text(chat, text))
    }

    pub fn send_photo(&self, chat: ChatId, jpeg: &[u8], caption: Option<&str>) -> DispatchOutcome {
        self.run("photo", || self.transport.send_photo(chat, jpeg, caption))
    }

    fn run<F>(&self, what: &str, mut op: F) -> DispatchOutcome
    where
        F: FnMut() -> Result<(), TransportError>,
    {
        let mut attempt = DispatchAttempt::begin(&self.policy);
        loop {
            let n = attempt.next();
            match op() {
                Ok(()) => {
                    if n > 1 {
                        log::info!("{} delivered after {} attempts", what, n);
                    }
                    return DispatchOutcome::Delivered { attempts: n };
                }
                Err(error) => {
                    if attempt.exhausted() || !self.policy.retries(&error) {
                        log::warn!("{} not delivered after {} attempt(s): {}", what, n, error);
                        attempt.record(error);
                        return attempt.into_outcome();
                    }
                    log::warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        what,
                        n,
                        attempt.max_attempts,
                        error,
                        attempt.delay
                    );
                    attempt.record(error);
                    self.clock.sleep(attempt.delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Transport that fails a scripted number of times before succeeding.
    struct FlakyTransport {
        failures_left: Mutex<u32>,
        kind: TransportErrorKind,
        calls: Mutex<u32>,
    }

    impl FlakyTransport {
        fn new(failures: u32, kind: TransportErrorKind) -> Self {
            Self {
                failures_left: Mutex::new(failures),
                kind,
                calls: Mutex::new(0),
            }
        }

        fn attempt(&self) -> Result<(), TransportError> {
            *self.calls.lock().unwrap() += 1;
            let mut left = self.failures_left.lock().unwrap();
            if *left == 0 {
                return Ok(());
            }
            *left -= 1;
            Err(TransportError {
                kind: self.kind,
                message: "scripted failure".to_string(),
            })
        }
    }

    impl ChatTransport for Arc<FlakyTransport> {
        fn send_text(&self, _chat: ChatId, _text: &str) -> Result<(), TransportError> {
            self.attempt()
        }

        fn send_photo(
            &self,
            _chat: ChatId,
            _jpeg: &[u8],
            _caption: Option<&str>,
        ) -> Result<(), TransportError> {
            self.attempt()
        }
    }

    #[derive(Default)]
    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Clock for RecordingClock {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn policy(max_attempts: u32, delay_secs: u64, retry_permanent: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(delay_secs),
            retry_permanent,
        }
    }

    #[test]
    fn delivers_on_the_last_allowed_attempt() {
        let transport = Arc::new(FlakyTransport::new(2, TransportErrorKind::Transient));
        let clock = Arc::new(RecordingClock::default());
        let dispatcher = Dispatcher::with_clock(
            Box::new(transport.clone()),
            policy(3, 5, false),
            Box::new(clock.clone()),
        );

        let outcome = dispatcher.send_text(7, "hello");
        assert!(outcome.is_delivered());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(*transport.calls.lock().unwrap(), 3);
        // Two sleeps of the configured delay separate the three attempts.
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::from_secs(5), Duration::from_secs(5)]
        );
    }

    #[test]
    fn exhausts_after_max_attempts_when_always_failing() {
        let transport = Arc::new(FlakyTransport::new(u32::MAX, TransportErrorKind::Transient));
        let clock = Arc::new(RecordingClock::default());
        let dispatcher = Dispatcher::with_clock(
            Box::new(transport.clone()),
            policy(3, 5, false),
            Box::new(clock.clone()),
        );

        let outcome = dispatcher.send_photo(7, b"jpeg", None);
        match outcome {
            DispatchOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.kind, TransportErrorKind::Transient);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert_eq!(*transport.calls.lock().unwrap(), 3);
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::from_secs(5), Duration::from_secs(5)]
        );
    }

    #[test]
    fn first_attempt_success_sends_once_without_sleeping() {
        let transport = Arc::new(FlakyTransport::new(0, TransportErrorKind::Transient));
        let clock = Arc::new(RecordingClock::default());
        let dispatcher = Dispatcher::with_clock(
            Box::new(transport.clone()),
            policy(3, 5, false),
            Box::new(clock.clone()),
        );

        let outcome = dispatcher.send_text(7, "hello");
        assert!(outcome.is_delivered());
        assert_eq!(outcome.attempts(), 1);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn permanent_errors_are_not_retried_by_default() {
        let transport = Arc::new(FlakyTransport::new(u32::MAX, TransportErrorKind::Permanent));
        let clock = Arc::new(RecordingClock::default());
        let dispatcher = Dispatcher::with_clock(
            Box::new(transport.clone()),
            policy(3, 5, false),
            Box::new(clock.clone()),
        );

        let outcome = dispatcher.send_text(7, "hello");
        assert!(!outcome.is_delivered());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(*transport.calls.lock().unwrap(), 1);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn permanent_errors_are_retried_when_policy_allows() {
        let transport = Arc::new(FlakyTransport::new(1, TransportErrorKind::Permanent));
        let clock = Arc::new(RecordingClock::default());
        let dispatcher = Dispatcher::with_clock(
            Box::new(transport.clone()),
            policy(3, 5, true),
            Box::new(clock.clone()),
        );

        let outcome = dispatcher.send_text(7, "hello");
        assert!(outcome.is_delivered());
        assert_eq!(outcome.attempts(), 2);
    }
}
