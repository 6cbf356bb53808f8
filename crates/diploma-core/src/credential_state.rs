use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// States of a single verification run.
///
/// Every run starts at `Unchecked` and ends in exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// No check has been performed yet.
    Unchecked,
    /// The presented record could not be read at all.
    Malformed,
    /// No credential with the presented id exists in the registry.
    NotFound,
    /// The credential exists but has been revoked.
    Revoked,
    /// The signature does not match the presented fields.
    SignatureInvalid,
    /// Known, not revoked, signature matches.
    Valid,
}

impl VerificationState {
    /// Whether this is a terminal state.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Unchecked)
    }

    /// Human-readable reason reported alongside the verdict.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Malformed => "malformed credential",
            Self::NotFound => "unknown credential",
            Self::Revoked => "revoked credential",
            Self::SignatureInvalid => "invalid signature",
            Self::Valid => "signature valid",
        }
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchecked => write!(f, "Unchecked"),
            Self::Malformed => write!(f, "Malformed"),
            Self::NotFound => write!(f, "NotFound"),
            Self::Revoked => write!(f, "Revoked"),
            Self::SignatureInvalid => write!(f, "SignatureInvalid"),
            Self::Valid => write!(f, "Valid"),
        }
    }
}

/// Observations that drive a verification run forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationEvent {
    /// The presented record failed to parse.
    InputRejected,
    /// Registry lookup by id missed.
    LookupMissed,
    /// Registry lookup hit a record flagged as revoked.
    RevokedFlagSet,
    /// Signature check failed.
    SignatureRejected,
    /// Signature check passed.
    SignatureAccepted,
}

impl fmt::Display for VerificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Transition table for verification runs.
///
/// Valid transitions, all from `Unchecked`:
/// - InputRejected → Malformed
/// - LookupMissed → NotFound
/// - RevokedFlagSet → Revoked
/// - SignatureRejected → SignatureInvalid
/// - SignatureAccepted → Valid
///
/// Terminal states accept no further events.
pub struct VerificationStateMachine;

impl VerificationStateMachine {
    pub fn transition(
        current: VerificationState,
        event: VerificationEvent,
    ) -> Result<VerificationState, CoreError> {
        if current != VerificationState::Unchecked {
            return Err(CoreError::InvalidStateTransition {
                from: current,
                event: event.to_string(),
            });
        }

        let next = match event {
            VerificationEvent::InputRejected => VerificationState::Malformed,
            VerificationEvent::LookupMissed => VerificationState::NotFound,
            VerificationEvent::RevokedFlagSet => VerificationState::Revoked,
            VerificationEvent::SignatureRejected => VerificationState::SignatureInvalid,
            VerificationEvent::SignatureAccepted => VerificationState::Valid,
        };

        tracing::debug!(
            from = %current,
            to = %next,
            event = ?event,
            "verification state transition"
        );

        Ok(next)
    }

    pub fn can_transition(current: VerificationState, event: VerificationEvent) -> bool {
        Self::transition(current, event).is_ok()
    }
}

/// Outcome of a verification run, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub state: VerificationState,
    pub reason: String,
    /// Echoed on success only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    /// Echoed on success only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
}

impl Verdict {
    /// Build the verdict for a terminal state.
    pub fn from_state(state: VerificationState) -> Self {
        Self {
            valid: state == VerificationState::Valid,
            state,
            reason: state.reason().to_string(),
            credential_id: None,
            subject_name: None,
        }
    }

    /// Attach the verified credential's id and subject.
    pub fn with_subject(mut self, credential_id: &str, subject_name: &str) -> Self {
        self.credential_id = Some(credential_id.to_string());
        self.subject_name = Some(subject_name.to_string());
        self
    }
}
