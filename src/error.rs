//! Unified error types for the controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! subroutine tasks and the event-layer entry points uniform.  Dependency
//! gaps surface as [`Error::NotManageable`] and are logged, never fatal;
//! malformed external input surfaces as [`Error::InvalidArgument`].

use thiserror::Error;

use crate::subroutines::{Missing, SubroutineKind};

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A dependency (hardware, configuration, another subroutine) is missing.
    #[error("{kind} is not manageable: missing {missing}")]
    NotManageable { kind: SubroutineKind, missing: Missing },

    /// `routine()` was invoked on a subroutine that is not started.
    #[error("{0} is not started")]
    NotStarted(SubroutineKind),

    /// Unknown capability, mode, parameter or out-of-range value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Update or delete targeting an absent entity.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The subroutine does not accept this hardware.
    #[error("hardware '{uid}' is incompatible with {kind}")]
    HardwareIncompatible { kind: SubroutineKind, uid: String },

    /// Subroutine name not recognised.
    #[error("unknown subroutine '{0}'")]
    UnknownSubroutine(String),

    /// A driver port failed.
    #[error("hardware: {0}")]
    Hardware(#[from] HardwareError),

    /// Configuration failed validation.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// The driver did not answer in time or the bus failed.
    #[error("read failed on '{0}'")]
    ReadFailed(String),
    /// The output could not be switched.
    #[error("write failed on '{0}'")]
    WriteFailed(String),
    /// The camera returned no frame.
    #[error("capture failed on '{0}'")]
    CaptureFailed(String),
    /// No driver exists for this model.
    #[error("unsupported model '{0}'")]
    UnsupportedModel(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field failed range validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// The stored document could not be parsed.
    #[error("malformed config: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
