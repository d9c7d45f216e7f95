//! Public entry points: one-shot compilation and the compiled, shareable mode.

use std::collections::HashMap;

use thiserror::Error;

use crate::CompileError;
use crate::charset::Charset;
use crate::engine::{PostProcessor, TraceEntry, TranscriptionProcessor};
use crate::mode::{Mode, PreOp};

/// Option values a mode is compiled under, keyed by option name.
pub type OptionValues = HashMap<String, String>;

/// Compilation produced errors; the full list is carried along.
#[derive(Debug, Error)]
#[error("mode compilation failed with {} error(s)", .0.len())]
pub struct CompileFailed(pub Vec<CompileError>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscribeError {
    #[error("mode has no usable destination charset")]
    NoCharset,
    #[error("mode was compiled with errors and cannot transcribe")]
    NoProcessor,
}

/// The result of transcribing one input text.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub output: String,
    /// Which input slice produced which tokens, step by step.
    pub trace: Vec<TraceEntry>,
}

/// A mode compiled under one specific set of option values.
///
/// Immutable and `Send + Sync`: share it freely, and compile a fresh one to
/// change options.
#[derive(Debug)]
pub struct CompiledMode {
    pub(crate) name: String,
    pub(crate) options: OptionValues,
    pub(crate) errors: Vec<CompileError>,
    pub(crate) processor: Option<TranscriptionProcessor>,
    pub(crate) pre_ops: Vec<PreOp>,
    pub(crate) post: PostProcessor,
    pub(crate) charsets: HashMap<String, Charset>,
    pub(crate) default_charset: Option<String>,
}

impl CompiledMode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fully resolved option values this mode was compiled under.
    pub fn options(&self) -> &OptionValues {
        &self.options
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Transcribes `text` against the mode's default charset.
    pub fn transcribe(&self, text: &str) -> Result<Transcription, TranscribeError> {
        let name = self
            .default_charset
            .clone()
            .ok_or(TranscribeError::NoCharset)?;
        self.transcribe_with(text, &name)
    }

    /// Transcribes `text` against a specific charset of this mode.
    pub fn transcribe_with(&self, text: &str, charset: &str) -> Result<Transcription, TranscribeError> {
        let processor = self.processor.as_ref().ok_or(TranscribeError::NoProcessor)?;
        let charset = self.charsets.get(charset).ok_or(TranscribeError::NoCharset)?;
        let text = self
            .pre_ops
            .iter()
            .fold(text.to_string(), |t, op| op.apply(&t));
        let mut trace = Vec::new();
        let tokens = processor.transcribe(&text, &mut trace);
        let output = self.post.apply(tokens, charset);
        Ok(Transcription { output, trace })
    }
}

/// Parses and compiles a mode in one go, failing fast on any compilation
/// error. For error-tolerant workflows parse a [`Mode`] and call
/// [`Mode::compile`] instead.
pub fn compile(
    name: &str,
    source: &str,
    charsets: Vec<Charset>,
    options: &OptionValues,
) -> Result<CompiledMode, CompileFailed> {
    let mut mode = Mode::parse(name, source);
    for charset in charsets {
        mode.add_charset(charset, false);
    }
    let compiled = mode.compile(options);
    if compiled.errors.is_empty() {
        Ok(compiled)
    } else {
        Err(CompileFailed(compiled.errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODE: &str = "\
\\language Quenya
\\writing Tengwar
\\mode \"Classical test mode\"
\\version 0.1
\\authors tests

\\charset tengwar_test true

\\beg options
  \\option long_carriers false
\\end

\\beg preprocessor
  \\downcase
\\end

\\beg processor
  \\beg rules litteral
    {VOWELS} === a*o*u

    \\beg macro lone_vowel V T
      _{V}_ --> CARRIER {T}
    \\end
    \\deploy lone_vowel a A_TEHTA
    \\deploy lone_vowel o O_TEHTA
    \\deploy lone_vowel u U_TEHTA

    \\if long_carriers
      y --> LONG_CARRIER
    \\endif

    [{VOWELS}]i --> TELCO [A_TEHTA*O_TEHTA*U_TEHTA]
  \\end
\\end
";

    const CHARSET: &str = "\
\\char E02A TELCO
\\char E02D CARRIER
\\char E02E LONG_CARRIER
\\char E050 O_TEHTA_TELCO
\\char E051 U_TEHTA_TELCO
\\char EC42 A_TEHTA_TELCO
\\char EC43 A_TEHTA_CARRIER
\\beg virtual A_TEHTA
  \\beg class A_TEHTA_TELCO TELCO A_TEHTA_TELCO
  \\end
  \\beg class A_TEHTA_CARRIER CARRIER
  \\end
\\end
\\beg virtual O_TEHTA
  \\beg class O_TEHTA_TELCO TELCO
  \\end
\\end
\\beg virtual U_TEHTA
  \\beg class U_TEHTA_TELCO TELCO
  \\end
\\end
";

    fn charset() -> Charset {
        let cs = Charset::parse("tengwar_test", CHARSET);
        assert!(cs.errors.is_empty(), "{:?}", cs.errors);
        cs
    }

    #[test]
    fn compiles_and_transcribes_with_virtual_resolution() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        let t = compiled.transcribe("Ai").unwrap();
        assert_eq!(t.output, "\u{e02a}\u{ec42}");
        let t = compiled.transcribe("oi ui").unwrap();
        assert_eq!(t.output, "\u{e02a}\u{e050} \u{e02a}\u{e051}");
    }

    #[test]
    fn macros_feed_lone_vowel_rules() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        let t = compiled.transcribe("a").unwrap();
        assert_eq!(t.output, "\u{e02d}\u{ec43}");
    }

    #[test]
    fn unknown_input_maps_to_question_marks() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        assert_eq!(compiled.transcribe("zzz").unwrap().output, "???");
    }

    #[test]
    fn options_gate_rules() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        assert_eq!(compiled.transcribe("y").unwrap().output, "?");

        let mut opts = OptionValues::new();
        opts.insert("long_carriers".to_string(), "true".to_string());
        let compiled = compile("quenya_test", MODE, vec![charset()], &opts).unwrap();
        assert_eq!(compiled.transcribe("y").unwrap().output, "\u{e02e}");
    }

    #[test]
    fn trace_names_consumed_slices() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        let t = compiled.transcribe("ai").unwrap();
        let step = t.trace.iter().find(|e| e.consumed == "ai").unwrap();
        assert_eq!(step.tokens, vec!["TELCO", "A_TEHTA"]);
    }

    #[test]
    fn compile_fails_fast_on_bad_rules() {
        let bad = "\
\\charset tengwar_test true
\\beg processor
  \\beg rules litteral
    {MISSING} --> TINCO
  \\end
\\end
";
        let err = compile("bad", bad, vec![charset()], &OptionValues::new()).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert!(err.0[0].message.contains("MISSING"));
        assert!(err.to_string().contains("1 error(s)"));
    }

    #[test]
    fn transcribing_without_a_charset_fails() {
        let compiled = compile("empty", "\\beg processor\n\\beg rules r\nt --> TINCO\n\\end\n\\end\n", vec![], &OptionValues::new()).unwrap();
        assert_eq!(compiled.transcribe("t").unwrap_err(), TranscribeError::NoCharset);
    }

    #[test]
    fn unknown_charset_name_fails() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        assert_eq!(
            compiled.transcribe_with("ai", "nope").unwrap_err(),
            TranscribeError::NoCharset
        );
    }

    #[test]
    fn compiled_modes_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledMode>();
    }

    #[test]
    fn resolved_options_are_exposed() {
        let compiled = compile("quenya_test", MODE, vec![charset()], &OptionValues::new()).unwrap();
        assert_eq!(compiled.name(), "quenya_test");
        assert_eq!(compiled.options()["long_carriers"], "false");
        assert!(compiled.errors().is_empty());
    }
}
