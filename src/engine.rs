//! Rule compilation and trie-based transcription.
//!
//! ```text
//!   rule-group AST (markup)          options
//!          │                            │
//!          ▼                            ▼
//!   RuleGroup::finalize ── vars, macros, conditionals, sheaf expansion
//!          │
//!          ▼       SubRules (flat src-token → dst-token pairs)
//!   TranscriptionTree ── longest-match trie over source characters
//!          │
//!          ▼
//!   TranscriptionProcessor ── segmentation + trie walk ──▶ output tokens
//!          │
//!          ▼
//!   PostProcessor ── sequences, swaps, virtual resolution ──▶ text
//! ```

#[path = "engine/rule_group.rs"]
pub(crate) mod rule_group;

#[path = "engine/sheaf.rs"]
pub(crate) mod sheaf;

#[path = "engine/iterator.rs"]
pub(crate) mod iterator;

#[path = "engine/rule.rs"]
pub(crate) mod rule;

#[path = "engine/tree.rs"]
pub(crate) mod tree;

#[path = "engine/processor.rs"]
pub(crate) mod processor;

#[path = "engine/post_process.rs"]
pub(crate) mod post_process;

pub use processor::TraceEntry;

pub(crate) use post_process::PostProcessor;
pub(crate) use processor::TranscriptionProcessor;
pub(crate) use rule_group::RuleGroup;

/// Token emitted when no rule matches the input character.
pub(crate) const UNKNOWN_TOKEN: &str = "*UNKNOWN";
/// Token standing for an input space run.
pub(crate) const SPACE_TOKEN: &str = "*SPACE";
/// Token standing for an input line break.
pub(crate) const LF_TOKEN: &str = "*LF";

/// Non-printable stand-in for the `_` word-boundary marker of rule source, so
/// that a literal underscore in input text never matches a boundary rule.
pub(crate) const WORD_BOUNDARY_TREE: char = '\u{10}';

pub(crate) fn debug_rules() -> bool {
    std::env::var_os("SARATI_DEBUG_RULES").is_some()
}
