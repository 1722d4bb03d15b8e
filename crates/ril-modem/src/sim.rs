//! # SIM Status Prober
//!
//! Issues one `GET_SIM_STATUS` per enable cycle and reduces the answer to
//! card presence. PIN and lock state are parsed but do not gate power-on;
//! a locked or absent card simply stops the bring-up here.

use bytes::Bytes;
use ril_proto::{CardState, CardStatus, ParcelError, RilErrno};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbeState {
    Idle,
    Querying,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    CardPresent(CardStatus),
    CardAbsent(CardState),
    /// The query itself failed.
    QueryFailed(RilErrno),
    /// The response could not be parsed.
    Malformed(ParcelError),
    /// No query was outstanding.
    Ignored,
}

impl ProbeOutcome {
    pub fn card_present(&self) -> bool {
        matches!(self, ProbeOutcome::CardPresent(_))
    }
}

#[derive(Debug, Clone)]
pub struct SimStatusProber {
    state: ProbeState,
}

impl Default for SimStatusProber {
    fn default() -> Self {
        Self::new()
    }
}

impl SimStatusProber {
    pub fn new() -> Self {
        SimStatusProber {
            state: ProbeState::Idle,
        }
    }

    pub fn reset(&mut self) {
        self.state = ProbeState::Idle;
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    /// Claim the single query of this cycle. Returns `false` if it was
    /// already issued.
    pub fn begin(&mut self) -> bool {
        if self.state != ProbeState::Idle {
            return false;
        }
        self.state = ProbeState::Querying;
        true
    }

    /// The query could not be queued.
    pub fn on_send_failed(&mut self) -> ProbeOutcome {
        self.state = ProbeState::Done;
        ProbeOutcome::QueryFailed(RilErrno::RadioNotAvailable)
    }

    pub fn on_response(&mut self, errno: RilErrno, payload: Bytes) -> ProbeOutcome {
        if self.state != ProbeState::Querying {
            return ProbeOutcome::Ignored;
        }
        self.state = ProbeState::Done;

        if !errno.is_success() {
            return ProbeOutcome::QueryFailed(errno);
        }
        match CardStatus::parse(payload) {
            Ok(status) if status.is_present() => ProbeOutcome::CardPresent(status),
            Ok(status) => ProbeOutcome::CardAbsent(status.card_state),
            Err(e) => ProbeOutcome::Malformed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ril_proto::PinState;

    #[test]
    fn queries_once_per_cycle() {
        let mut p = SimStatusProber::new();
        assert!(p.begin());
        assert!(!p.begin());
        p.on_response(
            RilErrno::Success,
            CardStatus::with_state(CardState::Absent).encode(),
        );
        assert!(!p.begin());

        p.reset();
        assert!(p.begin());
    }

    #[test]
    fn present_card() {
        let mut p = SimStatusProber::new();
        p.begin();
        let mut status = CardStatus::with_state(CardState::Present);
        status.universal_pin_state = PinState::EnabledNotVerified;
        let outcome = p.on_response(RilErrno::Success, status.encode());
        assert!(outcome.card_present());
        assert_eq!(p.state(), ProbeState::Done);
    }

    #[test]
    fn absent_card() {
        let mut p = SimStatusProber::new();
        p.begin();
        let outcome = p.on_response(
            RilErrno::Success,
            CardStatus::with_state(CardState::Absent).encode(),
        );
        assert_eq!(outcome, ProbeOutcome::CardAbsent(CardState::Absent));
        assert!(!outcome.card_present());
    }

    #[test]
    fn failed_query_is_not_presence() {
        let mut p = SimStatusProber::new();
        p.begin();
        // Payload would say present, but the result code wins.
        let outcome = p.on_response(
            RilErrno::GenericFailure,
            CardStatus::with_state(CardState::Present).encode(),
        );
        assert_eq!(outcome, ProbeOutcome::QueryFailed(RilErrno::GenericFailure));
    }

    #[test]
    fn malformed_payload() {
        let mut p = SimStatusProber::new();
        p.begin();
        let outcome = p.on_response(RilErrno::Success, Bytes::from_static(&[1, 0]));
        assert!(matches!(outcome, ProbeOutcome::Malformed(_)));
    }

    #[test]
    fn unsolicited_response_ignored() {
        let mut p = SimStatusProber::new();
        let outcome = p.on_response(
            RilErrno::Success,
            CardStatus::with_state(CardState::Present).encode(),
        );
        assert_eq!(outcome, ProbeOutcome::Ignored);
        assert_eq!(p.state(), ProbeState::Idle);
    }

    #[test]
    fn send_failure_ends_the_probe() {
        let mut p = SimStatusProber::new();
        p.begin();
        assert_eq!(
            p.on_send_failed(),
            ProbeOutcome::QueryFailed(RilErrno::RadioNotAvailable)
        );
        assert_eq!(p.state(), ProbeState::Done);
        let late = p.on_response(
            RilErrno::Success,
            CardStatus::with_state(CardState::Present).encode(),
        );
        assert_eq!(late, ProbeOutcome::Ignored);
    }
}
