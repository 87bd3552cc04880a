//! Error taxonomy. See the Error Handling Design notes for the propagation
//! policy: item-level errors are absorbed into work-item rows, phase-level
//! errors fail the pipeline unless the phase is non-critical.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transient external error calling {service}: {source}")]
    TransientExternal {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("permanent external error calling {service}: {source}")]
    PermanentExternal {
        service: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("quota exhausted for {service}, resets at {reset_at}")]
    QuotaExhausted {
        service: String,
        reset_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("circuit open for {service}, retry after {retry_after}")]
    CircuitOpen {
        service: String,
        retry_after: chrono::DateTime<chrono::Utc>,
    },

    #[error("data invariant violated: {0}")]
    DataInvariant(String),

    #[error("state store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx_error::SqlxErrorShim),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// How the retry/backoff helper should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Retry with backoff.
    Transient,
    /// Never retry, fail the item immediately.
    Permanent,
    /// Retry after the server-indicated (or default) delay.
    RateLimited,
}

impl PipelineError {
    /// Classify this error for the retry helper. Circuit-open errors are
    /// treated like transient-external for retry purposes (§7): attempts
    /// still count toward the per-item failure ceiling.
    pub fn classify(&self) -> Classification {
        match self {
            PipelineError::TransientExternal { .. } => Classification::Transient,
            PipelineError::CircuitOpen { .. } => Classification::Transient,
            PipelineError::StoreUnavailable(_) => Classification::Transient,
            PipelineError::QuotaExhausted { .. } => Classification::RateLimited,
            PipelineError::PermanentExternal { .. } => Classification::Permanent,
            PipelineError::DataInvariant(_) => Classification::Permanent,
            PipelineError::Database(_) => Classification::Transient,
            PipelineError::Anyhow(_) => Classification::Permanent,
        }
    }
}

/// `sqlx::Error` lives behind a thin newtype so `dsi-common` doesn't need to
/// depend on `sqlx` itself — only the crates that actually talk to Postgres do.
pub mod sqlx_error {
    use std::fmt;

    #[derive(Debug)]
    pub struct SqlxErrorShim(pub String);

    impl fmt::Display for SqlxErrorShim {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for SqlxErrorShim {}
}
