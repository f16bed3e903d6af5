//! Unified error types for the coldtrace core library.
//!
//! Each module has its own error type ([`DecodeError`], [`StoreError`],
//! [`NotifyError`], [`ConfigError`], [`DeliveryFailure`]); all of them
//! convert into [`ColdtraceError`], which carries the service-level
//! taxonomy:
//!
//! - `MalformedRecord`: the only failure surfaced to an ingesting client.
//! - `PersistenceFailure`, `NotificationFailure`, `SubscriberDeliveryFailure`:
//!   logged and absorbed by the component that hit them.
//!
//! # Example
//!
//! ```rust
//! use coldtrace_core::error::{ColdtraceError, Result};
//!
//! fn ingest(raw: &str) -> Result<()> {
//!     coldtrace_core::decoder::decode(raw)?;
//!     Ok(())
//! }
//!
//! let err = ingest("garbage").unwrap_err();
//! assert!(matches!(err, ColdtraceError::MalformedRecord(_)));
//! assert_eq!(err.http_status_code(), 400);
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use crate::decoder::DecodeError;
use crate::hub::DeliveryFailure;
use crate::notify::NotifyError;
use crate::store::StoreError;

/// The unified error type for all coldtrace operations.
#[derive(Debug, Error)]
pub enum ColdtraceError {
    // =========================================================================
    // INGESTION ERRORS
    // =========================================================================
    /// The raw record does not match the wire grammar.
    #[error("Invalid manufacturer data format: {0}")]
    MalformedRecord(#[from] DecodeError),

    // =========================================================================
    // DEGRADABLE FAILURES
    // =========================================================================
    /// A reading could not be persisted.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StoreError),

    /// An alert could not be delivered.
    #[error("Notification failure: {0}")]
    NotificationFailure(#[from] NotifyError),

    /// A live subscriber could not receive a reading.
    #[error("Subscriber delivery failure: {0}")]
    SubscriberDeliveryFailure(#[from] DeliveryFailure),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A specialized [`Result`] type for coldtrace operations.
pub type Result<T> = std::result::Result<T, ColdtraceError>;

impl ColdtraceError {
    /// Returns `true` if the caller sent bad input.
    #[inline]
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedRecord(_))
    }

    /// Returns `true` if the failure is absorbed rather than surfaced.
    #[inline]
    #[must_use]
    pub const fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::PersistenceFailure(_)
                | Self::NotificationFailure(_)
                | Self::SubscriberDeliveryFailure(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MalformedRecord(_) => 400,
            Self::Config(_) => 422,
            Self::PersistenceFailure(_) => 500,
            Self::NotificationFailure(_) => 502,
            Self::SubscriberDeliveryFailure(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedRecord(_) => "MALFORMED_RECORD",
            Self::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            Self::NotificationFailure(_) => "NOTIFICATION_FAILURE",
            Self::SubscriberDeliveryFailure(_) => "SUBSCRIBER_DELIVERY_FAILURE",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}
