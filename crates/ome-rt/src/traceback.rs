//! Traceback Rendering
//!
//! The compiler emits an immutable table of call-site descriptions; the
//! 32-bit IDs recorded by `append_traceback` index into it. Rendering
//! walks the recorded entries newest-first, one line per call site, with
//! the source line and a caret underline when source tracebacks are
//! enabled. ANSI styling is applied only when the output stream is a
//! terminal.

use std::io::{IsTerminal, Write};
use std::sync::OnceLock;

use crate::builtins::print;
use crate::context::Context;
use crate::value::Value;

/// One call site, as emitted by the code generator.
#[derive(Debug, Clone, Copy)]
pub struct TracebackEntry {
    pub stream_name: &'static str,
    pub line_number: u32,
    pub method_name: &'static str,
    pub source_line: &'static str,
    pub column: u32,
    pub underline: u32,
}

static TRACEBACK_TABLE: OnceLock<&'static [TracebackEntry]> = OnceLock::new();

/// Register the compiler-emitted traceback table. Write-once; later calls
/// are ignored.
pub fn set_traceback_table(table: &'static [TracebackEntry]) {
    let _ = TRACEBACK_TABLE.set(table);
}

pub(crate) fn traceback_table() -> &'static [TracebackEntry] {
    TRACEBACK_TABLE.get().copied().unwrap_or(&[])
}

impl Context {
    /// Render the recorded traceback and the stripped error message.
    pub fn print_traceback(&self, out: &mut dyn Write, error: Value, colors: bool) {
        let table = traceback_table();

        if self.traceback_len() > 0 {
            let _ = writeln!(out, "Traceback (most recent call last):");
        }
        for id in self.traceback_entries() {
            let Some(tb) = table.get(id as usize) else {
                continue;
            };
            let _ = writeln!(
                out,
                "  File \"{}\", line {}, in |{}|",
                tb.stream_name, tb.line_number, tb.method_name
            );
            if self.config.source_traceback {
                if colors {
                    let _ = write!(out, "\x1b[1m");
                }
                let _ = write!(out, "    {}\n    ", tb.source_line);
                for _ in 0..tb.column {
                    let _ = write!(out, " ");
                }
                if colors {
                    let _ = write!(out, "\x1b[31m");
                }
                for _ in 0..tb.underline {
                    let _ = write!(out, "^");
                }
                if colors {
                    let _ = write!(out, "\x1b[0m");
                }
                let _ = writeln!(out);
            }
        }

        let _ = write!(out, "Error: ");
        print(out, error.strip_error());
        let _ = writeln!(out);
        let _ = out.flush();
    }

    /// Render to stderr, with ANSI styling when stderr is a terminal.
    pub fn print_traceback_stderr(&self, error: Value) {
        let mut err = std::io::stderr();
        let colors = err.is_terminal();
        self.print_traceback(&mut err, error, colors);
    }
}
