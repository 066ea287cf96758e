use std::fmt;
use std::time::Duration;

/// Delay between reconnection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectState {
    Connecting,
    Connected,
    Waiting { attempt: u32 },
    GaveUp,
}

impl ReconnectState {
    pub fn is_retrying(self) -> bool {
        matches!(self, ReconnectState::Waiting { .. })
    }
}

impl fmt::Display for ReconnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconnectState::Connecting => write!(f, "Connecting"),
            ReconnectState::Connected => write!(f, "Connected"),
            ReconnectState::Waiting { attempt } => {
                write!(f, "Connection lost, retry {attempt} in {}s", RECONNECT_DELAY.as_secs())
            }
            ReconnectState::GaveUp => write!(f, "Offline"),
        }
    }
}

/// Decides whether and when a dropped connection is retried.
#[derive(Clone, Debug)]
pub struct Reconnector {
    state: ReconnectState,
    was_connected: bool,
}

impl Default for Reconnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconnector {
    pub fn new() -> Self {
        Self {
            state: ReconnectState::Connecting,
            was_connected: false,
        }
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Returns true when this open follows an earlier connection, i.e. the
    /// identity should be restored.
    pub fn on_connected(&mut self) -> bool {
        let reconnected = self.was_connected;
        self.state = ReconnectState::Connected;
        self.was_connected = true;
        reconnected
    }

    /// Called when the socket closes. Returns the delay before the next
    /// attempt, or `None` once the user gave up.
    pub fn on_disconnect(&mut self) -> Option<Duration> {
        let attempt = match self.state {
            ReconnectState::GaveUp => return None,
            ReconnectState::Waiting { attempt } => attempt + 1,
            ReconnectState::Connecting | ReconnectState::Connected => 1,
        };
        self.state = ReconnectState::Waiting { attempt };
        Some(RECONNECT_DELAY)
    }

    pub fn give_up(&mut self) {
        self.state = ReconnectState::GaveUp;
    }
}
