use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Session expired or invalid, please log in again")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Cannot {transition} an incident that is {from}")]
    InvalidTransition {
        from: &'static str,
        transition: &'static str,
    },

    #[error("Incident {0} already has an update in progress")]
    AlreadyInFlight(i64),

    #[error("An SOS alert has already been sent from this dashboard")]
    SosAlreadyTriggered,

    #[error("User identity is still loading")]
    IdentityUnresolved,

    #[error("Not logged in")]
    NoActiveSession,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Failures that must end the current session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }

    pub fn storage(e: impl std::fmt::Display) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Decode(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

/// Uniform result shape handed to the frontend for every action.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ActionOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T> From<Result<T>> for ActionOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => ActionOutcome::ok(data),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unauthorized_is_auth_failure() {
        assert!(Error::Unauthorized.is_auth_failure());
        assert!(!Error::Forbidden("x".into()).is_auth_failure());
        assert!(!Error::Network("down".into()).is_auth_failure());
    }

    #[test]
    fn outcome_from_err_carries_message() {
        let outcome: ActionOutcome<()> = Err(Error::AlreadyInFlight(9)).into();
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Incident 9 already has an update in progress")
        );
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let json = serde_json::to_string(&ActionOutcome::ok(3)).unwrap();
        assert_eq!(json, r#"{"success":true,"data":3}"#);
        let json = serde_json::to_string(&ActionOutcome::<u8>::failed("nope")).unwrap();
        assert_eq!(json, r#"{"success":false,"message":"nope"}"#);
    }

    #[test]
    fn invalid_transition_message_names_states() {
        let e = Error::InvalidTransition {
            from: "pending",
            transition: "revoke",
        };
        assert_eq!(e.to_string(), "Cannot revoke an incident that is pending");
    }
}
