//! Structured error types for heatlink transfers.
//!
//! The split mirrors the phases of a session: control-phase errors are
//! fatal (no stream is opened), streaming errors end the session, and
//! per-frame persistence errors are soft and only counted.

use std::time::Duration;
use thiserror::Error;

/// Errors from the control phase.
///
/// Any of these is fatal to the session: when a control call fails the
/// stream is never opened.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Request never produced a response (connect failure, timeout, TLS)
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Server answered 2xx but the body did not parse
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedBody { endpoint: String, reason: String },
}

/// Errors from the streaming phase.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The websocket never opened
    #[error("websocket connect to {url} failed: {reason}")]
    OpenFailed { url: String, reason: String },

    /// Transport-level failure below the message layer
    #[error("websocket transport error: {reason}")]
    Transport { reason: String },

    /// No message arrived within the per-read window
    #[error("no message within {timeout:?}")]
    ReadTimeout { timeout: Duration },
}

impl StreamError {
    /// Terminal classification: a read timeout is a recognized outcome of
    /// its own, everything else fails the session.
    pub fn outcome(&self) -> Outcome {
        match self {
            StreamError::ReadTimeout { .. } => Outcome::TimedOut,
            other => Outcome::Failed(other.to_string()),
        }
    }
}

/// Per-frame persistence failures.
///
/// Never fatal: the orchestrator counts them and keeps draining the
/// stream, and the mismatch shows up in the summary.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Artifact name is absolute or would escape the output root
    #[error("unsafe artifact name: {name}")]
    UnsafeName { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal classification of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Server reported the transfer complete
    Completed,
    /// The per-read window expired mid-stream
    TimedOut,
    /// Control call, connection open, transport, or cancellation
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Label used in the summary record and console output.
    pub fn label(&self) -> String {
        match self {
            Outcome::Completed => "complete".to_string(),
            Outcome::TimedOut => "timed out".to_string(),
            Outcome::Failed(reason) => format!("failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_its_own_outcome() {
        let err = StreamError::ReadTimeout {
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.outcome(), Outcome::TimedOut);

        let err = StreamError::Transport {
            reason: "connection reset".to_string(),
        };
        assert!(matches!(err.outcome(), Outcome::Failed(_)));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Completed.label(), "complete");
        assert_eq!(Outcome::TimedOut.label(), "timed out");
        assert_eq!(
            Outcome::Failed("cancelled".to_string()).label(),
            "failed: cancelled"
        );
        assert!(Outcome::Completed.is_success());
        assert!(!Outcome::TimedOut.is_success());
    }
}
