//! Transfer error types.
//!
//! Defines [`TransferError`], the domain error enum shared by both transfer
//! engines. Variants map one-to-one onto the failure classes the engines can
//! encounter: synchronous misconfiguration, asynchronous transport failures,
//! protocol violations on a read channel, and individual segment-upload
//! failures.
//!
//! The enum is cloneable: a settled segment result is observed both by the
//! caller that dispatched the segment and by finalize, through a shared
//! future, so the error travels by value to every observer.

/// Result alias used throughout the transfer engines.
pub type TransferResult<T> = Result<T, TransferError>;

/// Transfer error taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransferError {
    // -----------------------------------------------------------------------
    // Synchronous, caller-side errors
    // -----------------------------------------------------------------------
    /// Invalid configuration or invalid use of an adapter. Raised
    /// synchronously, before any remote call, and never retried.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// What was wrong with the configuration or call.
        message: String,
    },

    // -----------------------------------------------------------------------
    // Asynchronous, remote-side errors
    // -----------------------------------------------------------------------
    /// A network or HTTP-level failure, including a failure status code from
    /// the remote store. Surfaced exactly once through the owning adapter.
    #[error("transport failure{}: {message}", fmt_status(.status))]
    Transport {
        /// HTTP-style status code, when one was observed.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// The remote side violated the read-channel contract, e.g. the channel
    /// completed without ever delivering headers.
    #[error("protocol violation: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// An individual segment upload failed. Propagates into finalize and,
    /// from there, into the write adapter's terminal error.
    #[error("segment {sequence_number} upload failed: {source}")]
    Segment {
        /// Sequence number of the failed segment (1-based).
        sequence_number: u32,
        /// The underlying failure.
        #[source]
        source: Box<TransferError>,
    },
}

impl TransferError {
    /// Shorthand for a [`TransferError::Configuration`].
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Shorthand for a [`TransferError::Transport`] without a status code.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Shorthand for a [`TransferError::Transport`] carrying a status code.
    #[must_use]
    pub fn transport_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Shorthand for a [`TransferError::Protocol`].
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Wrap an error as the failure of segment `sequence_number`.
    #[must_use]
    pub fn segment(sequence_number: u32, source: TransferError) -> Self {
        Self::Segment {
            sequence_number,
            source: Box::new(source),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |code| format!(" (status {code})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_format_transport_error_with_status() {
        let err = TransferError::transport_status(404, "object not found");
        assert_eq!(
            err.to_string(),
            "transport failure (status 404): object not found"
        );
    }

    #[test]
    fn test_should_format_transport_error_without_status() {
        let err = TransferError::transport("connection reset");
        assert_eq!(err.to_string(), "transport failure: connection reset");
    }

    #[test]
    fn test_should_chain_segment_error_source() {
        let inner = TransferError::transport_status(500, "internal error");
        let err = TransferError::segment(4, inner);
        assert!(err.to_string().starts_with("segment 4 upload failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_should_clone_errors() {
        let err = TransferError::segment(2, TransferError::protocol("no header received"));
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
