use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

/// The state of the broker session, as last observed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum State {
    /// No session. Nothing may be published until a handshake completes.
    Disconnected,

    /// A handshake has been started and has neither completed nor failed yet.
    /// Reported as not connected.
    Connecting,

    /// The broker has acknowledged the session.
    Connected,
}

/// A shared handle to the session's connectivity state.
///
/// The session manager owns one of these; clones are handed to transports so
/// that asynchronous loss notifications (e.g. a broker disconnect delivered on
/// the network stack's own task) land in the same cell the telemetry loop
/// queries. Transports may only report loss; promoting the link to
/// [`State::Connected`] is reserved to the session manager.
#[derive(Clone)]
pub struct Link(Arc<AtomicU8>);

impl State {
    fn from_u8(u: u8) -> Self {
        match u {
            u if u == State::Connecting as u8 => State::Connecting,
            u if u == State::Connected as u8 => State::Connected,
            // anything else is treated as "no session".
            _ => State::Disconnected,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Disconnected => f.write_str("disconnected"),
            State::Connecting => f.write_str("connecting"),
            State::Connected => f.write_str("connected"),
        }
    }
}

// === impl Link ===

impl Link {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(State::Disconnected as u8)))
    }

    #[must_use]
    pub fn state(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == State::Connected
    }

    /// Records that the transport has lost the session, returning the state
    /// it was in before.
    pub fn report_lost(&self) -> State {
        let prev = self.0.swap(State::Disconnected as u8, Ordering::AcqRel);
        State::from_u8(prev)
    }

    pub(crate) fn begin_handshake(&self) {
        self.0.store(State::Connecting as u8, Ordering::Release);
    }

    /// Promotes an in-flight handshake to `Connected`.
    ///
    /// Fails if a loss was reported since [`Link::begin_handshake`], so a
    /// disconnect racing with the handshake is never overwritten.
    pub(crate) fn complete_handshake(&self) -> bool {
        self.transition(State::Connecting, State::Connected)
    }

    pub(crate) fn abort_handshake(&self) {
        self.transition(State::Connecting, State::Disconnected);
    }

    fn transition(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Link").field(&self.state()).finish()
    }
}
