//! # Radio Transport
//!
//! The radio is driven through fire-and-forget requests. `send` returns a
//! request id immediately; the result arrives later, out of order, as a
//! [`Completion`] pushed through a [`CompletionSink`] into the control loop.
//!
//! Connection management and the wire framing of requests belong to the
//! transport implementation. [`ChannelTransport`] is the in-process flavour:
//! request frames go to a backend task over a tokio channel.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use ril_proto::{RequestType, RilErrno};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::host::HostEvent;

// ─── Request Identity ───────────────────────────────────────────────────────

/// Serial number of an outstanding request, unique per transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Result of one request, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: RequestId,
    /// Enable cycle of the transport that produced this completion.
    pub cycle: u64,
    pub errno: RilErrno,
    pub payload: Bytes,
}

/// Trace line for an outgoing request. Built per call.
pub fn format_request(id: RequestId, request: RequestType) -> String {
    format!("[{id}]> {request}")
}

/// Trace line for a completion.
pub fn format_completion(id: RequestId, errno: RilErrno, payload_len: usize) -> String {
    format!("[{id}]< {errno} ({payload_len} bytes)")
}

// ─── Transport Traits ───────────────────────────────────────────────────────

/// Client side of the radio control protocol.
pub trait RadioTransport: Send + Sync {
    /// Queue a request. Never blocks; the result arrives as a [`Completion`].
    fn send(&self, request: RequestType, payload: Bytes) -> Result<RequestId, TransportError>;

    /// Install (or clear) the protocol trace hook. Every frame is logged with
    /// the given prefix while set.
    fn set_debug(&self, prefix: Option<String>);
}

/// Shared handle passed to the controller and every subsystem driver.
pub type TransportHandle = Arc<dyn RadioTransport>;

/// Opens a transport for a modem interface.
pub trait TransportConnector: Send {
    fn connect(&self, interface: &str, sink: CompletionSink) -> std::io::Result<TransportHandle>;
}

// ─── Completion Sink ────────────────────────────────────────────────────────

/// Route from a transport back into the single control loop.
///
/// Each sink is stamped with the modem name and the enable cycle it was
/// created for, so a completion from a released transport is recognised as
/// stale.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    modem: Arc<str>,
    cycle: u64,
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl CompletionSink {
    pub fn new(modem: impl Into<Arc<str>>, tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        CompletionSink {
            modem: modem.into(),
            cycle: 0,
            tx,
        }
    }

    pub fn for_cycle(&self, cycle: u64) -> Self {
        CompletionSink {
            modem: self.modem.clone(),
            cycle,
            tx: self.tx.clone(),
        }
    }

    pub fn modem(&self) -> &str {
        &self.modem
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Deliver a completion. Silently dropped if the control loop is gone.
    pub fn complete(&self, id: RequestId, errno: RilErrno, payload: Bytes) {
        let event = HostEvent::Completion {
            modem: self.modem.clone(),
            completion: Completion {
                id,
                cycle: self.cycle,
                errno,
                payload,
            },
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(modem = %self.modem, %id, "completion dropped, control loop gone");
        }
    }
}

// ─── Pending Requests ───────────────────────────────────────────────────────

/// Outstanding requests keyed by id. Taking an entry completes it, so a
/// duplicate or unknown completion finds nothing.
#[derive(Debug)]
pub struct PendingRequests<T> {
    entries: HashMap<RequestId, T>,
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        PendingRequests {
            entries: HashMap::new(),
        }
    }
}

impl<T> PendingRequests<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: RequestId, tag: T) {
        self.entries.insert(id, tag);
    }

    pub fn take(&mut self, id: RequestId) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ─── Debug Hook ─────────────────────────────────────────────────────────────

/// Optional protocol trace shared between a transport and its backend.
#[derive(Debug, Clone, Default)]
pub struct DebugHook(Arc<Mutex<Option<String>>>);

impl DebugHook {
    pub fn set(&self, prefix: Option<String>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = prefix;
    }

    pub fn is_enabled(&self) -> bool {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    pub fn trace(&self, text: &str) {
        let guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prefix) = guard.as_deref() {
            tracing::info!("{prefix}{text}");
        }
    }
}

// ─── Channel Transport ──────────────────────────────────────────────────────

/// A request as handed to the backend.
#[derive(Debug, Clone)]
pub struct RequestFrame {
    pub id: RequestId,
    pub request: RequestType,
    pub payload: Bytes,
}

/// Transport that forwards request frames to a backend task over an unbounded
/// channel. The backend answers through the [`CompletionSink`] it was given.
#[derive(Debug)]
pub struct ChannelTransport {
    next_id: AtomicU32,
    frames: mpsc::UnboundedSender<RequestFrame>,
    debug: DebugHook,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RequestFrame>) {
        let (frames, rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                next_id: AtomicU32::new(1),
                frames,
                debug: DebugHook::default(),
            },
            rx,
        )
    }

    /// Hook the backend uses to trace completions with the same prefix.
    pub fn debug_hook(&self) -> DebugHook {
        self.debug.clone()
    }
}

impl RadioTransport for ChannelTransport {
    fn send(&self, request: RequestType, payload: Bytes) -> Result<RequestId, TransportError> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.frames
            .send(RequestFrame {
                id,
                request,
                payload,
            })
            .map_err(|_| TransportError::Closed)?;
        self.debug.trace(&format_request(id, request));
        Ok(id)
    }

    fn set_debug(&self, prefix: Option<String>) {
        self.debug.set(prefix);
    }
}
