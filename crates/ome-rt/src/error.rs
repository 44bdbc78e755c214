//! Runtime Error Types
//!
//! Infrastructure failures only: reserving address space, the mapping layer,
//! configuration validation. Language-level errors (Type-Error, Overflow,
//! Divide-By-Zero, ...) are ordinary tagged values carrying the error flag
//! and never appear here.

use thiserror::Error;

/// Errors the runtime can report before or while standing up a context.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to reserve heap address space ({smallest_attempt} bytes and below)")]
    HeapReservation { smallest_attempt: usize },

    #[error("page-granular memory mapping is not available on this platform")]
    MappingUnsupported,

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Terminal exhaustion: the escalation ladder ran out of options.
///
/// The process exits rather than unwinding; generated code has no frame to
/// recover into once the heap cannot hold another object.
pub fn memory_exhausted() -> ! {
    eprintln!("ome: memory exhausted, aborting");
    std::process::exit(1);
}

/// A big-object request beyond the representable descriptor size.
pub fn invalid_object_size(size: usize) -> ! {
    eprintln!("ome: invalid object size {}", size);
    std::process::exit(1);
}
