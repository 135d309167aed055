use thiserror::Error;

/// Failure raised by a timetable data source.
///
/// The two variants carry the fault attribution across the producer boundary: callers map
/// `User` to a client-facing error and `System` to a server-facing one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("invalid request: {message}")]
    User { message: String },
    #[error("source failure: {message}")]
    System { message: String },
}

impl SourceError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn is_user_fault(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::User { message } | Self::System { message } => message,
        }
    }
}
