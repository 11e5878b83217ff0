//! Error taxonomy for routing, validation and adapter failures

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Domain;

/// Failure reported by an external service adapter.
///
/// Carries the provider's HTTP status (when there is one) and a short
/// machine-readable code so callers can decide whether a retry makes sense.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{provider} error{}: {message}", status_suffix(.status))]
pub struct AdapterError {
    pub provider: String,
    pub status: Option<u16>,
    pub code: String,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl AdapterError {
    pub fn new(provider: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            status: None,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// An adapter call that did not finish within the step timeout
    pub fn timeout(provider: impl Into<String>, secs: u64) -> Self {
        Self::new(provider, "timeout", format!("call did not complete within {secs}s"))
    }
}

/// Errors surfaced synchronously by the routing and orchestration layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("capability `{name}` is already registered")]
    DuplicateCapability { name: String },

    #[error("unknown capability `{name}`")]
    UnknownCapability { name: String },

    #[error("missing required argument `{parameter}` for `{capability}`")]
    MissingArgument { capability: String, parameter: String },

    #[error("invalid argument `{parameter}` for `{capability}`: expected {expected}, found {found}")]
    ArgumentFormat {
        capability: String,
        parameter: String,
        expected: String,
        found: String,
    },

    #[error("no domain claims the instruction")]
    NoMatchingDomain,

    #[error("no {domain} capability matches the instruction")]
    NoMatchingCapability { domain: Domain },

    #[error("capability `{capability}` belongs to {owner}, not {requested}")]
    DomainMismatch {
        capability: String,
        owner: Domain,
        requested: Domain,
    },

    #[error("instruction is claimed equally by {}", join_domains(.candidates))]
    AmbiguousDomain { candidates: Vec<Domain> },

    #[error("invalid composite action `{action}`: {reason}")]
    InvalidComposite { action: String, reason: String },

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("request was cancelled")]
    Cancelled,
}

fn join_domains(domains: &[Domain]) -> String {
    domains
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::new("gmail", "forbidden", "insufficient scope").with_status(403);
        assert_eq!(err.to_string(), "gmail error (status 403): insufficient scope");

        let err = AdapterError::new("ledger", "sqlite", "no such table");
        assert_eq!(err.to_string(), "ledger error: no such table");
    }

    #[test]
    fn test_ambiguous_domain_lists_candidates() {
        let err = CoreError::AmbiguousDomain {
            candidates: vec![Domain::Financial, Domain::Communication],
        };
        assert_eq!(
            err.to_string(),
            "instruction is claimed equally by financial, communication"
        );
    }

    #[test]
    fn test_adapter_error_converts() {
        let err: CoreError = AdapterError::timeout("calendar", 30).into();
        match err {
            CoreError::Adapter(inner) => assert_eq!(inner.code, "timeout"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
