//! Call session state machine.
//!
//! One `Session` exists per call attempt and owns nothing but state: every
//! event handler in the client feeds it a [`SessionEvent`] and performs the
//! [`SessionAction`] it returns. Events that have no transition from the
//! current state are dropped (logged at debug), which pins down the
//! handler-ordering behavior instead of leaving it to arrival timing.

use tracing::debug;

/// Where a call attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not started.
    Idle,
    /// Channel connect and capture request are in flight.
    AwaitingCapture,
    /// Capture granted, offer sent, waiting on answer/candidates/track.
    Negotiating,
    /// Remote audio is flowing to playback.
    Connected,
    /// Terminal: the attempt died (capture denied, channel lost early).
    Failed,
    /// Terminal: the session ended cleanly (bye, hangup, channel close).
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Closed)
    }
}

/// Everything that can happen to a session, from any event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The call attempt begins.
    Start,
    /// Local capture device granted.
    CaptureGranted,
    /// Local capture device denied or unavailable.
    CaptureDenied { code: u32 },
    /// `answer` arrived from the relay.
    AnswerReceived { sdp: String },
    /// `candidate` arrived from the relay.
    CandidateReceived { label: String, candidate: String },
    /// The peer connection surfaced the remote audio track.
    RemoteTrackAdded,
    /// `bye` arrived from the relay.
    ByeReceived,
    /// The relay channel closed or errored.
    ChannelClosed,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open the channel and request capture, in parallel.
    RequestCapture,
    /// Create the peer connection, attach the local track, build and send
    /// exactly one offer, start candidate gathering.
    SendOffer,
    /// Report the capture failure to the user, once, with its code.
    /// No signaling message may be sent for this attempt.
    ReportCaptureFailure { code: u32 },
    /// Apply the remote session description.
    ApplyAnswer { sdp: String },
    /// Hand the candidate record to the peer connection.
    ApplyCandidate { label: String, candidate: String },
    /// Attach the remote track to the playback sink.
    AttachPlayback,
    /// Close the peer connection and stop the capture loop.
    Teardown,
}

/// Per-call-attempt state machine. No I/O.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the machine. Returns the action the caller must perform, or
    /// `None` when the event has no transition from the current state.
    pub fn on_event(&mut self, event: SessionEvent) -> Option<SessionAction> {
        use SessionEvent as E;
        use SessionState as S;

        match (self.state, event) {
            (S::Idle, E::Start) => {
                self.state = S::AwaitingCapture;
                Some(SessionAction::RequestCapture)
            }
            (S::AwaitingCapture, E::CaptureGranted) => {
                self.state = S::Negotiating;
                Some(SessionAction::SendOffer)
            }
            (S::AwaitingCapture, E::CaptureDenied { code }) => {
                self.state = S::Failed;
                Some(SessionAction::ReportCaptureFailure { code })
            }
            (S::Negotiating, E::AnswerReceived { sdp }) => Some(SessionAction::ApplyAnswer { sdp }),
            (S::Negotiating | S::Connected, E::CandidateReceived { label, candidate }) => {
                Some(SessionAction::ApplyCandidate { label, candidate })
            }
            (S::Negotiating, E::RemoteTrackAdded) => {
                self.state = S::Connected;
                Some(SessionAction::AttachPlayback)
            }
            (S::Negotiating | S::Connected, E::ByeReceived) => {
                self.state = S::Closed;
                Some(SessionAction::Teardown)
            }
            (S::Negotiating | S::Connected, E::ChannelClosed) => {
                self.state = S::Closed;
                Some(SessionAction::Teardown)
            }
            (S::Idle | S::AwaitingCapture, E::ChannelClosed) => {
                self.state = S::Failed;
                Some(SessionAction::Teardown)
            }
            (state, event) => {
                debug!(?state, ?event, "ignoring event with no transition");
                None
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
