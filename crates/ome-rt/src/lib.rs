//! # ome-rt - Runtime for Object Message Expressions
//!
//! The managed runtime compiled OME programs link against: a tagged-value
//! ABI, a per-thread execution context, and a precise, incrementally
//! bounded, sliding mark-compact garbage collector.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Generated Code                          │
//! │   push_frame / pop_frame / append_traceback / allocate      │
//! └───────────────────────────┬────────────────────────────────┘
//!                             │
//! ┌───────────────────────────┼────────────────────────────────┐
//! │  Context                  ▼                                 │
//! │  ┌───────────────┐  ┌───────────┐  ┌────────────────────┐  │
//! │  │ operand stack │  │ traceback │  │        Heap         │  │
//! │  │   (roots)     │  │   ring    │  │ inline + big objects│  │
//! │  └───────────────┘  └───────────┘  └─────────┬──────────┘  │
//! │                                              │              │
//! │                    ┌─────────────────────────┼───────────┐  │
//! │                    │ Collector               ▼           │  │
//! │                    │   mark (bitmap + worklist)          │  │
//! │                    │   compact (sliding, bounded table)  │  │
//! │                    │   big-object sweep                  │  │
//! │                    └─────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collection is synchronous with the mutator: the only suspension point
//! is inside `allocate`. Mark and compact passes yield when the configured
//! latency budget expires, leaving a consistent heap for the next cycle to
//! continue; full collections run unbounded and only on the exhaustion
//! ladder.
//!
//! ## Modules
//!
//! - [`value`]: tagged-value encoding and small-integer arithmetic
//! - [`context`]: operand stack, traceback ring, per-thread state
//! - [`heap`]: heap layout, object headers, the mapping layer, big objects
//! - [`marker`] / [`relocate`] / [`gc`]: the collector
//! - [`allocator`]: bump allocation and the exhaustion ladder
//! - [`builtins`]: print and string concatenation
//! - [`traceback`]: call-site table and rendering
//! - [`config`] / [`error`] / [`stats`] / [`timer`]: ambient concerns

pub mod allocator;
pub mod builtins;
pub mod config;
pub mod context;
pub mod error;
pub mod gc;
pub mod heap;
pub mod marker;
pub mod object;
pub mod relocate;
pub mod stats;
pub mod timer;
pub mod traceback;
pub mod value;

use std::sync::OnceLock;

pub use config::RuntimeConfig;
pub use context::Context;
pub use error::{Result, RuntimeError};
pub use gc::CollectOutcome;
pub use traceback::{set_traceback_table, TracebackEntry};
pub use value::{Constant, Value};

/// Process-wide read-only state, fixed at [`initialize`].
pub struct Globals {
    /// Command-line arguments as permanent string values.
    pub argv: Vec<Value>,
    /// Calibrated cycle-counter units per millisecond.
    pub cycles_per_ms: u64,
}

static GLOBALS: OnceLock<Globals> = OnceLock::new();

/// Capture argv as permanent string objects and calibrate the cycle
/// counter. Call once at process start, before creating contexts; later
/// calls are ignored.
pub fn initialize<I, S>(args: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let argv = args
        .into_iter()
        .map(|arg| {
            let body = object::permanent_string(arg.as_ref().as_bytes());
            Value::pointer(value::TAG_STRING, body)
        })
        .collect();
    let _ = GLOBALS.set(Globals {
        argv,
        cycles_per_ms: timer::estimate_cycles_per_ms(),
    });
}

/// The process globals. Calibrates lazily (with empty argv) when
/// [`initialize`] was never called, so library embedders and tests need no
/// startup ceremony.
pub fn globals() -> &'static Globals {
    GLOBALS.get_or_init(|| Globals {
        argv: Vec::new(),
        cycles_per_ms: timer::estimate_cycles_per_ms(),
    })
}

/// Run a program's `main` on a fresh context.
///
/// Creates the context, invokes `main`, prints a traceback to stderr when
/// the result is an error value, optionally prints collector statistics,
/// tears the context down (every big object is unmapped, then the
/// reservation), and returns the process exit code: 1 on error, else 0.
pub fn thread_main<F>(config: RuntimeConfig, main: F) -> i32
where
    F: FnOnce(&mut Context) -> Value,
{
    let mut context = match Context::new(config) {
        Ok(context) => context,
        Err(error) => {
            eprintln!("ome: failed to allocate heap memory, aborting ({})", error);
            return 1;
        }
    };

    let value = main(&mut context);
    if value.is_error() {
        context.print_traceback_stderr(value);
    }

    if context.config.gc_stats {
        let start_time = context.start_time;
        context
            .heap
            .stats
            .print_summary(&mut std::io::stdout(), start_time);
    }

    drop(context);
    if value.is_error() {
        1
    } else {
        0
    }
}
