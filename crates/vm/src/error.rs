//! Error types for the Quill VM crate.
//!
//! These errors cover embedder-facing failures such as module linking and
//! bytecode validation. Script-level runtime failures are not represented
//! here; they are raised as exception objects on the activation context.

use thiserror::Error;

/// VM-level errors reported to the embedder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// A module refers to an external function that was never registered.
    #[error("unresolved external `{name}` (dependency {index})")]
    UnresolvedExternal { name: String, index: usize },

    /// A module failed structural validation during load.
    #[error("invalid module: {reason}")]
    InvalidModule { reason: String },

    /// An index operand in the module is out of range.
    #[error("invalid {kind} index {index} at pc {pc:#06x} (limit {limit})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        pc: usize,
        limit: usize,
    },

    /// Too many externals registered with the VM.
    #[error("external registry full: {count} callbacks registered, limit {limit}")]
    ExternalRegistryFull { count: usize, limit: usize },
}

impl VmError {
    /// Convenience constructor for [`VmError::InvalidModule`].
    pub fn invalid_module(reason: impl Into<String>) -> Self {
        VmError::InvalidModule {
            reason: reason.into(),
        }
    }
}

/// Result type used throughout the VM crate.
pub type VmResult<T> = Result<T, VmError>;
