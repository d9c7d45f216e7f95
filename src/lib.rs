//! A rule-compiling transliteration engine.
//!
//! `sarati` transcribes text between writing systems (Quenya/Sindarin/English
//! to Tengwar being the motivating family) by compiling a declarative rule
//! grammar (variables, macros, conditionals, combinatorial "sheaves",
//! position-permuting "cross rules") into a deterministic longest-match trie,
//! walking that trie over segmented input, and resolving context-dependent
//! ("virtual") output characters in a post-processing pass.
//!
//! ```text
//! mode source ── markup::parse ──▶ Mode (options, rule-group ASTs, pre/post config)
//!                                    │  Mode::compile(options)
//!                                    ▼
//! charset source ── Charset::parse ──▶ CompiledMode (trie + charsets, immutable)
//!                                    │  CompiledMode::transcribe(text)
//!                                    ▼
//!                         Transcription { output, trace }
//! ```
//!
//! A [`CompiledMode`] is immutable and safe to share across threads; changing
//! options means compiling a fresh one (recompile-and-swap).
//!
//! Set `SARATI_DEBUG_RULES=1` to print compilation and trie-walk traces.

#[macro_use]
mod macros;
mod api;
mod charset;
mod engine;
pub mod markup;
mod mode;

pub use api::{CompileFailed, CompiledMode, OptionValues, Transcription, TranscribeError, compile};
pub use charset::{Char, Charset, VirtualChar, VirtualClass};
pub use engine::TraceEntry;
pub use mode::{Mode, ModeOption};

use std::fmt;

// --- Shared diagnostics ------------------------------------------------------

/// A diagnostic produced while compiling a mode or charset.
///
/// Compilation errors are accumulated, never thrown: every detected problem is
/// appended to a mode-scoped list with the source line it came from, and
/// compilation continues best-effort so one bad rule does not take down the
/// rest of the mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// 1-based source line the problem was detected on (0 when unattributable).
    pub line: usize,
    pub message: String,
}

impl CompileError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        CompileError { line, message: message.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}
