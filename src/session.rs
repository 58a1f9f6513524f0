//! The publish session: connect, publish, notice loss, reconnect.
use std::fmt;

mod link;
pub use self::link::{Link, State};

/// The network transport underneath a [`Session`].
///
/// Implementations are expected to bound every call with their own timeouts;
/// the session never waits on a transport beyond what a single call takes.
pub trait Transport {
    type Error: fmt::Debug + fmt::Display;

    /// Establishes (or re-establishes) a broker session.
    ///
    /// Returns `Ok` only once the broker has acknowledged the session.
    fn connect(&mut self) -> Result<(), Self::Error>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SendError<Self::Error>>;
}

/// Why a transport failed to send a message.
#[derive(Debug)]
pub enum SendError<E> {
    /// The session is gone; nothing more can be sent until it is reconnected.
    SessionLost(E),
    /// This message could not be sent, but the session is still usable.
    Failed(E),
}

#[derive(Debug)]
pub enum ConnectError<E> {
    Transport(E),
    /// The transport reported the session lost before the handshake
    /// completed.
    LostDuringHandshake,
}

#[derive(Debug)]
pub enum PublishError<E> {
    /// `publish` was called without a session. The transport was not touched.
    NotConnected,
    SessionLost(E),
    Transport(E),
}

/// The device's single, long-lived broker session.
pub struct Session<T> {
    transport: T,
    link: Link,
    device_id: &'static str,
}

impl<T: Transport> Session<T> {
    /// `link` must be the same link the transport reports loss on.
    pub fn new(transport: T, link: Link, device_id: &'static str) -> Self {
        Self {
            transport,
            link,
            device_id,
        }
    }

    /// Connects to the broker if there is no session yet.
    ///
    /// Calling this while connected does nothing and does not touch the
    /// transport.
    pub fn connect(&mut self) -> Result<(), ConnectError<T::Error>> {
        if self.link.is_connected() {
            log::trace!(target: "lumiconnect::session", "already connected");
            return Ok(());
        }

        self.link.begin_handshake();
        match self.transport.connect() {
            Ok(()) if self.link.complete_handshake() => {
                log::debug!(target: "lumiconnect::session", "handshake complete as {}", self.device_id);
                Ok(())
            }
            Ok(()) => Err(ConnectError::LostDuringHandshake),
            Err(error) => {
                self.link.abort_handshake();
                Err(ConnectError::Transport(error))
            }
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.link.state()
    }

    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError<T::Error>> {
        if !self.link.is_connected() {
            return Err(PublishError::NotConnected);
        }

        match self.transport.publish(topic, payload) {
            Ok(()) => Ok(()),
            Err(SendError::SessionLost(error)) => {
                self.link.report_lost();
                log::debug!(target: "lumiconnect::session", "session lost while publishing to {topic}");
                Err(PublishError::SessionLost(error))
            }
            Err(SendError::Failed(error)) => Err(PublishError::Transport(error)),
        }
    }

    pub fn device_id(&self) -> &'static str {
        self.device_id
    }

    /// Returns a handle for reporting loss from outside the session.
    pub fn link(&self) -> Link {
        self.link.clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

// === impl ConnectError ===

impl<E: fmt::Display> fmt::Display for ConnectError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Transport(error) => write!(f, "failed to connect to broker: {error}"),
            ConnectError::LostDuringHandshake => {
                f.write_str("connection lost before the broker handshake completed")
            }
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ConnectError<E> {}

// === impl PublishError ===

impl<E: fmt::Display> fmt::Display for PublishError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::NotConnected => f.write_str("not connected to broker"),
            PublishError::SessionLost(error) => write!(f, "session lost: {error}"),
            PublishError::Transport(error) => write!(f, "publish failed: {error}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for PublishError<E> {}

impl<E> PublishError<E> {
    #[must_use]
    pub fn is_session_lost(&self) -> bool {
        matches!(self, PublishError::SessionLost(_))
    }
}

// === impl SendError ===

impl<E: fmt::Display> fmt::Display for SendError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::SessionLost(error) => write!(f, "session lost: {error}"),
            SendError::Failed(error) => error.fmt(f),
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) struct MockError(pub &'static str);

    /// A scripted transport. Results are popped from the front of each queue;
    /// an empty queue means success.
    #[derive(Debug)]
    pub(crate) struct MockTransport {
        pub(crate) link: Link,
        pub(crate) connect_results: VecDeque<Result<(), MockError>>,
        pub(crate) publish_results: VecDeque<Result<(), SendError<MockError>>>,
        /// Report loss on the link while the next handshake is in flight.
        pub(crate) drop_during_handshake: bool,
        pub(crate) connects: usize,
        pub(crate) published: Vec<(String, String)>,
    }

    impl MockTransport {
        pub(crate) fn new(link: Link) -> Self {
            Self {
                link,
                connect_results: VecDeque::new(),
                publish_results: VecDeque::new(),
                drop_during_handshake: false,
                connects: 0,
                published: Vec::new(),
            }
        }
    }

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Transport for MockTransport {
        type Error = MockError;

        fn connect(&mut self) -> Result<(), MockError> {
            self.connects += 1;
            if std::mem::take(&mut self.drop_during_handshake) {
                self.link.report_lost();
            }
            self.connect_results.pop_front().unwrap_or(Ok(()))
        }

        fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SendError<MockError>> {
            assert!(
                self.link.is_connected(),
                "publish reached the transport while the session was {}",
                self.link.state()
            );
            let result = self.publish_results.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                let payload = String::from_utf8(payload.to_vec()).expect("payload is ASCII");
                self.published.push((topic.to_string(), payload));
            }
            result
        }
    }

    pub(crate) fn session() -> Session<MockTransport> {
        let link = Link::new();
        Session::new(MockTransport::new(link.clone()), link, "DEV1")
    }

    impl Session<MockTransport> {
        pub(crate) fn transport_mut(&mut self) -> &mut MockTransport {
            &mut self.transport
        }
    }
}
