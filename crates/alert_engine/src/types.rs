use std::fmt;

use alert_core::FailureStage;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeouts, connection failures, throttling and server errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => code == 429 || (500..=599).contains(&code),
            FailureKind::InvalidUrl | FailureKind::InvalidResponse => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    InvalidResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::InvalidResponse => write!(f, "invalid response"),
        }
    }
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEvent {
    Listed {
        count: usize,
    },
    MessageCompleted {
        message_id: String,
        records: usize,
        skipped: usize,
        stored: usize,
    },
    MessageFailed {
        message_id: String,
        stage: FailureStage,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(HarvestEvent) + Send + Sync,
{
    fn emit(&self, event: HarvestEvent) {
        self(event)
    }
}
