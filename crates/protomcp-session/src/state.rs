//! Session state machine.

use std::sync::Mutex;

use protomcp_protocol::error::{Error, ErrorKind};

/// The five states a [`crate::session::Session`] passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed but `connect`/handshake has not begun.
    Created,
    /// `initialize` sent (or received) but not yet acknowledged.
    Handshaking,
    /// Handshake complete; any method may be routed.
    Active,
    /// Local `close` called; draining the outbound mailbox.
    Closing,
    /// Terminal. Every pending waiter has been released.
    Closed,
}

/// Tracks the current state and rejects illegal transitions.
#[derive(Default)]
pub struct StateMachine {
    state: Mutex<SessionState>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Created
    }
}

impl StateMachine {
    /// Current state.
    pub fn get(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// `CREATED -> HANDSHAKING`, failing if already past `CREATED`.
    pub fn begin_handshake(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        match *state {
            SessionState::Created => {
                *state = SessionState::Handshaking;
                Ok(())
            }
            other => Err(Error::new(
                ErrorKind::InvalidRequest,
                format!("cannot begin handshake from state {other:?}"),
            )),
        }
    }

    /// `HANDSHAKING -> ACTIVE`.
    pub fn complete_handshake(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        match *state {
            SessionState::Handshaking => {
                *state = SessionState::Active;
                Ok(())
            }
            other => Err(Error::new(
                ErrorKind::InvalidRequest,
                format!("cannot complete handshake from state {other:?}"),
            )),
        }
    }

    /// `ACTIVE -> CLOSING`, the entry point for a local `close`.
    pub fn begin_closing(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Active || *state == SessionState::Handshaking {
            *state = SessionState::Closing;
            true
        } else {
            false
        }
    }

    /// `* -> CLOSED`, idempotent: returns `true` only the first time.
    pub fn force_closed(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Closed {
            false
        } else {
            *state = SessionState::Closed;
            true
        }
    }

    /// Whether a non-`initialize` request may be routed right now: any
    /// prior inbound request gets `InvalidRequest` while handshaking.
    pub fn accepts_requests(&self) -> bool {
        self.get() == SessionState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let sm = StateMachine::default();
        assert_eq!(sm.get(), SessionState::Created);
        sm.begin_handshake().unwrap();
        assert_eq!(sm.get(), SessionState::Handshaking);
        sm.complete_handshake().unwrap();
        assert_eq!(sm.get(), SessionState::Active);
        assert!(sm.begin_closing());
        assert_eq!(sm.get(), SessionState::Closing);
        assert!(sm.force_closed());
        assert_eq!(sm.get(), SessionState::Closed);
    }

    #[test]
    fn double_handshake_begin_is_rejected() {
        let sm = StateMachine::default();
        sm.begin_handshake().unwrap();
        assert!(sm.begin_handshake().is_err());
    }

    #[test]
    fn force_closed_is_idempotent() {
        let sm = StateMachine::default();
        assert!(sm.force_closed());
        assert!(!sm.force_closed());
    }
}
