//! Runtime Configuration
//!
//! Tuning knobs for a context: heap sizing, operand-stack size, the
//! collector's latency target, and statistics. Most programs run on the
//! defaults; the env-var overrides exist for tuning a compiled program
//! without rebuilding it.

use crate::error::{Result, RuntimeError};

const KB: usize = 1024;
const GB: usize = 1024 * 1024 * 1024;

/// Smallest heap the runtime will start with.
pub const MIN_HEAP_SIZE: usize = 0x1000;

/// Ceiling on the reserved heap address range.
pub const MAX_HEAP_SIZE: usize = 64 * GB;

/// Configuration for a runtime context.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Operand-stack size in value slots. The traceback ring shares this
    /// buffer, growing down from its top.
    ///
    /// Default: 4096 slots (32 KB)
    pub stack_size: usize,

    /// Usable heap size at startup; the heap grows from here on demand.
    ///
    /// Default: 64 KB
    pub initial_heap_size: usize,

    /// Reserved address range the heap may grow into. Reservation halves on
    /// failure until it fits; below [`MIN_HEAP_SIZE`] the runtime refuses
    /// to start.
    ///
    /// Default: 64 GB
    pub max_heap_size: usize,

    /// Collector latency target in milliseconds. Incremental mark and
    /// compact passes yield once this much time has elapsed. Full
    /// collections ignore it.
    ///
    /// Default: 50 ms
    pub latency_ms: u64,

    /// Print a collection summary when the context tears down.
    ///
    /// Default: false
    pub gc_stats: bool,

    /// Record call-site entries for tracebacks.
    ///
    /// Default: true
    pub traceback: bool,

    /// Include source lines and caret underlines in printed tracebacks.
    ///
    /// Default: true
    pub source_traceback: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: 4 * KB,
            initial_heap_size: 64 * KB,
            max_heap_size: MAX_HEAP_SIZE,
            latency_ms: 50,
            gc_stats: false,
            traceback: true,
            source_traceback: true,
        }
    }
}

impl RuntimeConfig {
    /// Check that all values are in valid ranges.
    pub fn validate(&self) -> Result<()> {
        if self.stack_size < 16 {
            return Err(RuntimeError::Configuration(
                "stack_size must be at least 16 slots".to_string(),
            ));
        }
        if self.initial_heap_size < MIN_HEAP_SIZE {
            return Err(RuntimeError::Configuration(format!(
                "initial_heap_size must be at least {:#x}",
                MIN_HEAP_SIZE
            )));
        }
        if self.initial_heap_size > self.max_heap_size {
            return Err(RuntimeError::Configuration(
                "initial_heap_size cannot exceed max_heap_size".to_string(),
            ));
        }
        if self.max_heap_size > MAX_HEAP_SIZE {
            return Err(RuntimeError::Configuration(format!(
                "max_heap_size cannot exceed {:#x}",
                MAX_HEAP_SIZE
            )));
        }
        Ok(())
    }

    /// Build configuration from environment variables.
    ///
    /// Overrides defaults with:
    /// - `OME_STACK_SIZE` (slots)
    /// - `OME_HEAP_SIZE` (initial bytes)
    /// - `OME_MAX_HEAP` (reserved bytes)
    /// - `OME_LATENCY_MS`
    /// - `OME_GC_STATS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("OME_STACK_SIZE") {
            if let Ok(slots) = val.parse::<usize>() {
                config.stack_size = slots;
            }
        }
        if let Ok(val) = std::env::var("OME_HEAP_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                config.initial_heap_size = size;
            }
        }
        if let Ok(val) = std::env::var("OME_MAX_HEAP") {
            if let Ok(size) = val.parse::<usize>() {
                config.max_heap_size = size;
            }
        }
        if let Ok(val) = std::env::var("OME_LATENCY_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.latency_ms = ms;
            }
        }
        if let Ok(val) = std::env::var("OME_GC_STATS") {
            config.gc_stats = val == "1" || val.eq_ignore_ascii_case("true");
        }

        config
    }
}
