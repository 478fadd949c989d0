//! Request-level errors
//!
//! Module errors (`RangeError`, `ConfigError`, `SourceError`) are converted
//! here, at the engine boundary, and tagged with the request they belong to.
//! An empty range is not an error: it yields a gap-filled report.

use std::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::Domain;
use crate::range::TimeRange;
use crate::source::SourceError;

/// Which request an error belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Requested device
    pub device_id: String,
    /// Requested range
    pub range: TimeRange,
    /// Domain being computed, if the failure is specific to one
    pub domain: Option<Domain>,
}

impl RequestContext {
    /// Context for a whole request
    pub fn new(device_id: impl Into<String>, range: TimeRange) -> Self {
        Self {
            device_id: device_id.into(),
            range,
            domain: None,
        }
    }

    /// The same request, narrowed to one domain
    pub fn with_domain(&self, domain: Domain) -> Self {
        Self {
            domain: Some(domain),
            ..self.clone()
        }
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device '{}', range {}", self.device_id, self.range)?;
        if let Some(domain) = self.domain {
            write!(f, ", domain {}", domain)?;
        }
        Ok(())
    }
}

/// Errors returned by the analytics engine
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// The requested range is unparsable, inverted or too large
    #[error("Invalid range for device '{device_id}' ({start} .. {end}): {reason}")]
    InvalidRange {
        /// Device of the request
        device_id: String,
        /// Start bound as given
        start: String,
        /// End bound as given
        end: String,
        /// What is wrong with the bounds
        reason: String,
    },

    /// No reading of the device was ever recorded
    #[error("Unknown device ({context})")]
    UnknownDevice {
        /// Request that failed
        context: RequestContext,
    },

    /// The engine was built with an invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The reading source failed
    #[error("Reading source unavailable ({context}): {source}")]
    UpstreamUnavailable {
        /// Request that failed
        context: RequestContext,
        /// Underlying source failure
        #[source]
        source: SourceError,
    },

    /// The caller cancelled the request
    #[error("Request cancelled ({context})")]
    Cancelled {
        /// Request that was cancelled
        context: RequestContext,
    },
}

impl AnalyticsError {
    /// The request the error belongs to, when one was running
    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            AnalyticsError::UnknownDevice { context }
            | AnalyticsError::UpstreamUnavailable { context, .. }
            | AnalyticsError::Cancelled { context } => Some(context),
            AnalyticsError::InvalidRange { .. } | AnalyticsError::Configuration(_) => None,
        }
    }

    /// Whether the caller cancelled the request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalyticsError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let range = TimeRange::parse("2024-01-01", "2024-01-07").unwrap();
        let context = RequestContext::new("truck-17", range).with_domain(Domain::Fuel);
        let text = context.to_string();

        assert!(text.starts_with("device 'truck-17', range [2024-01-01T00:00:00"));
        assert!(text.ends_with(", domain fuel"));
    }

    #[test]
    fn test_error_messages_carry_context() {
        let range = TimeRange::parse("2024-01-01", "2024-01-01").unwrap();
        let err = AnalyticsError::UpstreamUnavailable {
            context: RequestContext::new("truck-17", range),
            source: SourceError::Unavailable("connection refused".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("truck-17"));
        assert!(message.contains("connection refused"));
        assert!(err.context().is_some());
        assert!(!err.is_cancelled());
    }
}
