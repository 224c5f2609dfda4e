use thiserror::Error;

/// Why an inbound frame could not become a [`SignalingMessage`](crate::SignalingMessage).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("message has no 'action' field")]
    MissingAction,

    /// Discriminator the codec does not know. Callers drop these.
    #[error("unknown action '{0}'")]
    UnknownKind(String),

    #[error("{kind}: missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("{kind}: invalid field '{field}': {reason}")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl ParseError {
    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, ParseError::UnknownKind(_))
    }
}
