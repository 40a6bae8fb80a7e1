//! Opener-side message receiver
//!
//! The completion context may deliver the same result several times
//! (redundant broadcasts, no acknowledgment). The receiver accepts the
//! first well-formed message from the expected origin and ignores
//! everything after it, so duplicate delivery is a no-op.

use super::message::HandshakeMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiverState {
    Pending,
    Done,
}

/// Origin-checked, idempotent receiver for handshake messages
#[derive(Debug)]
pub struct OpenerReceiver {
    expected_origin: String,
    state: ReceiverState,
    accepted: Option<HandshakeMessage>,
}

impl OpenerReceiver {
    #[must_use]
    pub fn new(expected_origin: impl Into<String>) -> Self {
        Self {
            expected_origin: expected_origin.into(),
            state: ReceiverState::Pending,
            accepted: None,
        }
    }

    /// Offer a raw payload from the message channel. Returns the
    /// decoded message only on the first acceptance.
    pub fn accept(&mut self, origin: &str, payload: &serde_json::Value) -> Option<&HandshakeMessage> {
        if self.state == ReceiverState::Done {
            tracing::debug!("duplicate handshake message ignored");
            return None;
        }

        if origin != self.expected_origin {
            tracing::warn!(%origin, "handshake message from unexpected origin rejected");
            return None;
        }

        let Ok(message) = serde_json::from_value::<HandshakeMessage>(payload.clone()) else {
            tracing::debug!("payload does not match the handshake union; ignored");
            return None;
        };

        self.state = ReceiverState::Done;
        self.accepted = Some(message);
        self.accepted.as_ref()
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, ReceiverState::Pending)
    }

    /// The accepted message, if any
    #[must_use]
    pub const fn result(&self) -> Option<&HandshakeMessage> {
        self.accepted.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://app.kcaltrack.com";

    fn success_payload() -> serde_json::Value {
        serde_json::to_value(HandshakeMessage::success(
            Some("a@b.com".to_string()),
            "T1".to_string(),
        ))
        .unwrap()
    }

    #[test]
    fn test_accepts_first_valid_message() {
        let mut receiver = OpenerReceiver::new(ORIGIN);
        assert!(receiver.is_pending());

        let message = receiver.accept(ORIGIN, &success_payload());
        assert!(message.unwrap().is_success());
        assert!(!receiver.is_pending());
    }

    #[test]
    fn test_duplicate_delivery_is_noop() {
        let mut receiver = OpenerReceiver::new(ORIGIN);
        assert!(receiver.accept(ORIGIN, &success_payload()).is_some());
        assert!(receiver.accept(ORIGIN, &success_payload()).is_none());
        assert!(receiver.accept(ORIGIN, &success_payload()).is_none());
        // The first accepted result is retained.
        assert!(receiver.result().unwrap().is_success());
    }

    #[test]
    fn test_rejects_unexpected_origin() {
        let mut receiver = OpenerReceiver::new(ORIGIN);
        assert!(
            receiver
                .accept("https://evil.example.com", &success_payload())
                .is_none()
        );
        // Still pending: a later legitimate message is accepted.
        assert!(receiver.is_pending());
        assert!(receiver.accept(ORIGIN, &success_payload()).is_some());
    }

    #[test]
    fn test_rejects_payload_outside_union() {
        let mut receiver = OpenerReceiver::new(ORIGIN);
        let payload = serde_json::json!({"type": "SOMETHING_ELSE", "timestamp": 1});
        assert!(receiver.accept(ORIGIN, &payload).is_none());
        assert!(receiver.is_pending());
    }

    #[test]
    fn test_accepts_error_message() {
        let mut receiver = OpenerReceiver::new(ORIGIN);
        let payload =
            serde_json::to_value(HandshakeMessage::error(Some("access_denied".to_string())))
                .unwrap();
        let message = receiver.accept(ORIGIN, &payload).unwrap();
        assert!(!message.is_success());
    }
}
