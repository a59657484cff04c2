//! Error types for FOREMAN operations

use crate::EntityId;
use thiserror::Error;

/// Validation errors. Resolved locally, before any event is emitted; a
/// malformed request never produces a partial event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Event log errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventLogError {
    /// The backing store is unavailable. Callers retry with backoff; a lost
    /// event breaks replay correctness.
    #[error("Event write failed for run {run_id}: {reason}")]
    WriteFailed { run_id: EntityId, reason: String },

    #[error("No events found for run {run_id}")]
    NotFound { run_id: EntityId },
}

/// Backend dispatch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Publish failure, wrapped with the backend name and propagated
    /// uninterpreted. The engine treats this as an immediate run failure.
    #[error("{backend}: publish task: {reason}")]
    PublishFailed { backend: String, reason: String },

    #[error("No backend registered with capabilities {required}")]
    NoCapableBackend { required: String },

    #[error("No {kind} registered under name: {name}")]
    NotRegistered { kind: String, name: String },
}

/// Feedback gate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedbackError {
    /// The notification transport could not deliver. The engine falls back
    /// to the configured default policy rather than blocking.
    #[error("Feedback channel {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("Feedback request for run {run_id} call {call_id} timed out")]
    Timeout { run_id: EntityId, call_id: EntityId },
}

/// Resilience layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResilienceError {
    /// The protected dependency is currently unavailable. Distinct from
    /// other failures so callers can apply their own backoff or fallback.
    #[error("Circuit open for {dependency}, retry later")]
    CircuitOpen { dependency: String },

    #[error("Cache tier {tier} unavailable: {reason}")]
    TierUnavailable { tier: String, reason: String },
}

/// Payload sealing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Seal failed: {reason}")]
    SealFailed { reason: String },

    #[error("Open failed: {reason}")]
    OpenFailed { reason: String },

    #[error("Ciphertext too short: {len} bytes, need at least {min}")]
    CiphertextTooShort { len: usize, min: usize },

    #[error("Invalid key length: {len} bytes, need 32")]
    InvalidKeyLength { len: usize },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all FOREMAN errors.
#[derive(Debug, Clone, Error)]
pub enum ForemanError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Event log error: {0}")]
    EventLog(#[from] EventLogError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Feedback error: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("Resilience error: {0}")]
    Resilience(#[from] ResilienceError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for FOREMAN operations.
pub type ForemanResult<T> = Result<T, ForemanError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_publish_failed_display_wraps_backend_and_cause() {
        let err = DispatchError::PublishFailed {
            backend: "claude-worker".to_string(),
            reason: "broker connection refused".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "claude-worker: publish task: broker connection refused"
        );
    }

    #[test]
    fn test_circuit_open_is_operator_readable() {
        let err = ResilienceError::CircuitOpen {
            dependency: "notifier".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("retry later"));
        assert!(msg.contains("notifier"));
    }

    #[test]
    fn test_write_failed_names_run() {
        let run_id = Uuid::nil();
        let err = EventLogError::WriteFailed {
            run_id,
            reason: "store down".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
        assert!(msg.contains("store down"));
    }

    #[test]
    fn test_foreman_error_from_variants() {
        let validation = ForemanError::from(ValidationError::RequiredFieldMissing {
            field: "context".to_string(),
        });
        assert!(matches!(validation, ForemanError::Validation(_)));

        let log = ForemanError::from(EventLogError::NotFound { run_id: Uuid::nil() });
        assert!(matches!(log, ForemanError::EventLog(_)));

        let dispatch = ForemanError::from(DispatchError::NotRegistered {
            kind: "backend".to_string(),
            name: "ghost".to_string(),
        });
        assert!(matches!(dispatch, ForemanError::Dispatch(_)));

        let feedback = ForemanError::from(FeedbackError::Timeout {
            run_id: Uuid::nil(),
            call_id: Uuid::nil(),
        });
        assert!(matches!(feedback, ForemanError::Feedback(_)));

        let resilience = ForemanError::from(ResilienceError::CircuitOpen {
            dependency: "broker".to_string(),
        });
        assert!(matches!(resilience, ForemanError::Resilience(_)));

        let crypto = ForemanError::from(CryptoError::CiphertextTooShort { len: 4, min: 12 });
        assert!(matches!(crypto, ForemanError::Crypto(_)));
    }
}
