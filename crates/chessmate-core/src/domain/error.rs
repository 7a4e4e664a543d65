//! Domain Error Types
//!
//! Contract violations and primitive failures surfaced by the controller.
//! Infrastructure concerns that happen outside a scheduling operation (the
//! sequence file) live in [`crate::infrastructure::sequence_file`].

use super::types::{MutexKey, ThreadIdentity};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Primitive Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Failure of a real (non-instrumented) primitive
#[derive(Debug, thiserror::Error)]
pub enum PrimitiveError {
    /// A real primitive could not be located
    #[error("real primitive `{symbol}` could not be resolved")]
    Unresolved {
        /// Symbol name that failed to resolve
        symbol: &'static str,
    },

    /// A real primitive returned a non-zero status code
    #[error("real `{operation}` failed with code {code}")]
    Failed {
        /// Operation name
        operation: &'static str,
        /// Status code returned by the primitive
        code: i32,
    },

    /// The OS refused to create a thread
    #[error("thread creation failed: {0}")]
    Spawn(#[from] std::io::Error),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lookup of an identity that was never registered
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No thread record with this identity
    #[error("thread {0} is not registered")]
    ThreadNotFound(ThreadIdentity),

    /// No mutex record with this key
    #[error("mutex {0} has never been locked")]
    MutexNotFound(MutexKey),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Controller Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error returned by an instrumented operation
///
/// Every variant except [`ControllerError::Primitive`] is a programming
/// contract violation: the instrumented program did something the two-thread
/// model cannot represent.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Registry lookup failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A creation was attempted after both thread slots were taken
    #[error("thread {creator} attempted a second thread creation; only two threads are supported")]
    ThreadLimit {
        /// Thread that attempted the creation
        creator: ThreadIdentity,
    },

    /// Underlying primitive failed
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}

impl ControllerError {
    /// Returns `true` when the error means the program broke the model
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::Primitive(_))
    }
}
