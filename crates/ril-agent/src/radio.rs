//! Simulated radio backend.
//!
//! Stands in for the socket daemon on the far side of the transport. Each
//! connect spawns one backend task that answers request frames in order after
//! a jittered delay:
//!
//! - `GET_SIM_STATUS` → encoded card status (present or absent)
//! - `RADIO_POWER` → the configured number of failures, then success
//! - `GET_IMEI` → a fixed identity string
//! - anything else → `REQUEST_NOT_SUPPORTED`

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use ril_modem::transport::{format_completion, DebugHook};
use ril_modem::{ChannelTransport, CompletionSink, RequestFrame, TransportConnector, TransportHandle};
use ril_proto::{CardState, CardStatus, Parcel, RadioPowerRequest, RequestType, RilErrno};
use tokio::sync::mpsc;

use crate::config::RadioConfig;

pub const SIMULATED_IMEI: &str = "356938035643809";

pub struct SimulatedConnector {
    radio: RadioConfig,
}

impl SimulatedConnector {
    pub fn new(radio: RadioConfig) -> Self {
        Self { radio }
    }
}

impl TransportConnector for SimulatedConnector {
    fn connect(&self, interface: &str, sink: CompletionSink) -> io::Result<TransportHandle> {
        if self.radio.fail_connect {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no radio daemon on {interface}"),
            ));
        }

        let (transport, frames) = ChannelTransport::new();
        tracing::debug!(modem = %sink.modem(), interface, cycle = sink.cycle(), "simulated radio attached");

        let backend = RadioBackend::new(self.radio.clone(), sink, transport.debug_hook());
        tokio::spawn(backend.run(frames));
        Ok(Arc::new(transport))
    }
}

pub struct RadioBackend {
    config: RadioConfig,
    sink: CompletionSink,
    debug: DebugHook,
    failures_left: u32,
    radio_on: bool,
}

impl RadioBackend {
    pub fn new(config: RadioConfig, sink: CompletionSink, debug: DebugHook) -> Self {
        let failures_left = config.power_on_failures;
        Self {
            config,
            sink,
            debug,
            failures_left,
            radio_on: false,
        }
    }

    /// Serve frames until the transport is dropped.
    pub async fn run(mut self, mut frames: mpsc::UnboundedReceiver<RequestFrame>) {
        while let Some(frame) = frames.recv().await {
            tokio::time::sleep(self.latency()).await;
            let (errno, payload) = self.answer(&frame);
            self.debug
                .trace(&format_completion(frame.id, errno, payload.len()));
            self.sink.complete(frame.id, errno, payload);
        }
        tracing::debug!(modem = %self.sink.modem(), cycle = self.sink.cycle(), "simulated radio detached");
    }

    pub fn radio_on(&self) -> bool {
        self.radio_on
    }

    fn latency(&self) -> Duration {
        let base = self.config.latency_ms;
        if base == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }

    pub fn answer(&mut self, frame: &RequestFrame) -> (RilErrno, Bytes) {
        match frame.request {
            RequestType::GetSimStatus => {
                let state = if self.config.card_present {
                    CardState::Present
                } else {
                    CardState::Absent
                };
                (RilErrno::Success, CardStatus::with_state(state).encode())
            }
            RequestType::RadioPower => {
                let request = match RadioPowerRequest::decode(frame.payload.clone()) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(id = %frame.id, error = %e, "malformed radio power request");
                        return (RilErrno::GenericFailure, Bytes::new());
                    }
                };
                if self.failures_left > 0 {
                    self.failures_left -= 1;
                    return (RilErrno::RadioNotAvailable, Bytes::new());
                }
                self.radio_on = request.is_on();
                (RilErrno::Success, Bytes::new())
            }
            RequestType::GetImei => {
                let mut parcel = Parcel::new();
                parcel.write_string(Some(SIMULATED_IMEI));
                (RilErrno::Success, parcel.freeze())
            }
            _ => (RilErrno::RequestNotSupported, Bytes::new()),
        }
    }
}
