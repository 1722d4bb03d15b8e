//! # Power-On Sequencer
//!
//! ```text
//!   Idle ──attempt──▶ Requesting ──ok──▶ Succeeded
//!                       │    ▲
//!                     fail   └──timer── RetryScheduled
//!                       │
//!                       └── retries == max ──▶ Failed (terminal)
//! ```
//!
//! The retry counter only moves on a failed response. Once it reaches the
//! configured maximum the sequencer stops; only a fresh enable cycle
//! (`reset`) starts it again.

use std::time::Duration;

use bytes::Bytes;
use ril_proto::{radio_power_payload, RilErrno};
use serde::Serialize;

use crate::config::{ModemConfig, MAX_POWER_ON_RETRIES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerState {
    Idle,
    Requesting,
    RetryScheduled,
    Succeeded,
    Failed,
}

/// What the caller must do after a power-on response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOutcome {
    /// Radio is on. Report powered.
    Powered,
    /// Schedule a one-shot retry after `delay`.
    Retry { retries: u32, delay: Duration },
    /// Retry budget spent. Nothing further happens this cycle.
    Exhausted { retries: u32 },
    /// No request was outstanding; the response is stale.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PowerOnSequencer {
    state: PowerState,
    retries: u32,
    attempts: u32,
    max_retries: u32,
    retry_delay: Duration,
}

impl PowerOnSequencer {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        PowerOnSequencer {
            state: PowerState::Idle,
            retries: 0,
            attempts: 0,
            max_retries: max_retries.clamp(1, MAX_POWER_ON_RETRIES),
            retry_delay,
        }
    }

    pub fn from_config(config: &ModemConfig) -> Self {
        Self::new(config.max_power_on_retries, config.retry_delay)
    }

    /// Back to `Idle` with a zero retry count. Called at every enable.
    pub fn reset(&mut self) {
        self.state = PowerState::Idle;
        self.retries = 0;
        self.attempts = 0;
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// Failed responses seen this cycle.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Requests issued this cycle.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_due(&self) -> bool {
        self.state == PowerState::RetryScheduled
    }

    /// Begin an attempt, returning the request payload.
    ///
    /// Only valid from `Idle` or `RetryScheduled`; anything else returns
    /// `None` and leaves the state untouched.
    pub fn begin_attempt(&mut self) -> Option<Bytes> {
        match self.state {
            PowerState::Idle | PowerState::RetryScheduled => {
                self.state = PowerState::Requesting;
                self.attempts += 1;
                Some(radio_power_payload(true))
            }
            _ => None,
        }
    }

    pub fn on_response(&mut self, errno: RilErrno) -> PowerOutcome {
        if self.state != PowerState::Requesting {
            return PowerOutcome::Ignored;
        }

        if errno.is_success() {
            self.state = PowerState::Succeeded;
            return PowerOutcome::Powered;
        }

        self.retries += 1;
        if self.retries < self.max_retries {
            self.state = PowerState::RetryScheduled;
            PowerOutcome::Retry {
                retries: self.retries,
                delay: self.retry_delay,
            }
        } else {
            self.state = PowerState::Failed;
            PowerOutcome::Exhausted {
                retries: self.retries,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ril_proto::RadioPowerRequest;

    fn seq() -> PowerOnSequencer {
        PowerOnSequencer::new(5, Duration::from_secs(1))
    }

    #[test]
    fn attempt_payload_is_power_on() {
        let mut s = seq();
        let payload = s.begin_attempt().unwrap();
        let req = RadioPowerRequest::decode(payload).unwrap();
        assert_eq!((req.array_len, req.value), (1, 1));
        assert_eq!(s.state(), PowerState::Requesting);
    }

    #[test]
    fn success_on_first_try() {
        let mut s = seq();
        s.begin_attempt();
        assert_eq!(s.on_response(RilErrno::Success), PowerOutcome::Powered);
        assert_eq!(s.state(), PowerState::Succeeded);
        assert_eq!(s.retries(), 0);
        assert!(s.begin_attempt().is_none());
    }

    #[test]
    fn four_failures_then_fifth_fails_terminally() {
        let mut s = seq();
        let mut scheduled = 0;
        for n in 1..=4 {
            assert!(s.begin_attempt().is_some());
            match s.on_response(RilErrno::RadioNotAvailable) {
                PowerOutcome::Retry { retries, delay } => {
                    assert_eq!(retries, n);
                    assert_eq!(delay, Duration::from_secs(1));
                    scheduled += 1;
                }
                other => panic!("attempt {n}: unexpected {other:?}"),
            }
        }
        assert_eq!(scheduled, 4);

        assert!(s.begin_attempt().is_some());
        assert_eq!(s.attempts(), 5);
        assert_eq!(
            s.on_response(RilErrno::GenericFailure),
            PowerOutcome::Exhausted { retries: 5 }
        );
        assert_eq!(s.state(), PowerState::Failed);
        assert!(s.begin_attempt().is_none(), "no sixth attempt");
        assert_eq!(s.retries(), 5);
    }

    #[test]
    fn response_without_request_is_ignored() {
        let mut s = seq();
        assert_eq!(s.on_response(RilErrno::GenericFailure), PowerOutcome::Ignored);
        assert_eq!(s.retries(), 0);

        s.begin_attempt();
        s.on_response(RilErrno::Success);
        assert_eq!(s.on_response(RilErrno::Success), PowerOutcome::Ignored);
    }

    #[test]
    fn reset_clears_terminal_state() {
        let mut s = PowerOnSequencer::new(1, Duration::from_millis(10));
        s.begin_attempt();
        assert_eq!(
            s.on_response(RilErrno::GenericFailure),
            PowerOutcome::Exhausted { retries: 1 }
        );
        s.reset();
        assert_eq!(s.state(), PowerState::Idle);
        assert_eq!(s.retries(), 0);
        assert!(s.begin_attempt().is_some());
    }

    #[test]
    fn attempt_while_requesting_is_refused() {
        let mut s = seq();
        s.begin_attempt();
        assert!(s.begin_attempt().is_none());
        assert_eq!(s.attempts(), 1);
    }

    #[test]
    fn retry_limit_is_capped() {
        let mut s = PowerOnSequencer::new(10, Duration::from_millis(10));
        assert_eq!(s.max_retries(), MAX_POWER_ON_RETRIES);

        let mut last = PowerOutcome::Ignored;
        while !matches!(last, PowerOutcome::Exhausted { .. }) {
            assert!(s.begin_attempt().is_some());
            last = s.on_response(RilErrno::GenericFailure);
        }
        assert_eq!(last, PowerOutcome::Exhausted { retries: 5 });
        assert!(s.retries() <= MAX_POWER_ON_RETRIES);
        assert_eq!(s.attempts(), 5);
    }
}
