//! Mode files: metadata, declared options, pre/post processing directives and
//! the rule groups making up the transcription processor.

use std::collections::HashMap;

use crate::CompileError;
use crate::api::{CompiledMode, OptionValues};
use crate::charset::Charset;
use crate::engine::{PostProcessor, RuleGroup, TranscriptionProcessor};
use crate::markup;

/// An option declared by the mode, with a default and the values it admits.
#[derive(Debug, Clone)]
pub struct ModeOption {
    pub name: String,
    pub default_value: String,
    pub line: usize,
    /// Declared admissible values; empty when the option is free-form.
    pub values: Vec<String>,
}

/// A text normalization applied before transcription.
#[derive(Debug, Clone)]
pub(crate) enum PreOp {
    Downcase,
    RxSubstitute { pattern: regex::Regex, replacement: String },
}

impl PreOp {
    pub(crate) fn apply(&self, text: &str) -> String {
        match self {
            PreOp::Downcase => text.to_lowercase(),
            PreOp::RxSubstitute { pattern, replacement } => {
                pattern.replace_all(text, replacement.as_str()).into_owned()
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mode {
    pub name: String,
    pub language: String,
    pub writing: String,
    pub human_name: String,
    pub authors: String,
    pub version: String,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileError>,
    pub options: HashMap<String, ModeOption>,
    charsets: HashMap<String, Charset>,
    default_charset: Option<String>,
    pre_ops: Vec<PreOp>,
    out_space: Option<Vec<String>>,
    rule_groups: Vec<RuleGroup>,
}

impl Mode {
    /// Parses mode source. Like everywhere else in compilation, problems are
    /// collected on the mode rather than aborting the parse.
    pub fn parse(name: &str, source: &str) -> Mode {
        let doc = markup::parse(source);
        let mut mode = Mode { name: name.to_string(), ..Default::default() };
        mode.errors = doc.errors;

        for node in &doc.root.children {
            if node.is_text() {
                mode.warnings.push(CompileError::new(
                    node.line,
                    format!("Stray text '{}' outside any block.", node.text()),
                ));
                continue;
            }
            match node.name.as_str() {
                "language" => mode.language = node.args.join(" "),
                "writing" => mode.writing = node.args.join(" "),
                "mode" => mode.human_name = node.args.join(" "),
                "version" => mode.version = node.args.join(" "),
                "authors" => mode.authors = node.args.join(" "),
                "charset" => {
                    // The actual charset arrives through `add_charset`; here
                    // we only learn which one the mode treats as default.
                    if node.args.get(1).map(String::as_str) == Some("true") {
                        if let Some(cs_name) = node.args.first() {
                            mode.default_charset = Some(cs_name.clone());
                        }
                    }
                }
                "options" => mode.parse_options(node),
                "preprocessor" => mode.parse_preprocessor(node),
                "postprocessor" => mode.parse_postprocessor(node),
                "processor" => {
                    for rules in node.gpath("rules") {
                        let group = RuleGroup::from_markup(rules, &mut mode.errors);
                        mode.rule_groups.push(group);
                    }
                }
                other => {
                    mode.warnings.push(CompileError::new(
                        node.line,
                        format!("Unknown element '\\{other}'."),
                    ));
                }
            }
        }

        if mode.default_charset.is_none() {
            mode.warnings
                .push(CompileError::new(0, "Mode declares no default charset.".to_string()));
        }
        mode
    }

    fn parse_options(&mut self, node: &markup::Node) {
        for opt in node.gpath("option") {
            if opt.args.len() < 2 {
                self.errors.push(CompileError::new(
                    opt.line,
                    "An option needs a name and a default value.".to_string(),
                ));
                continue;
            }
            let values = opt
                .gpath("value")
                .iter()
                .filter_map(|v| v.args.first().cloned())
                .collect();
            self.options.insert(
                opt.args[0].clone(),
                ModeOption {
                    name: opt.args[0].clone(),
                    default_value: opt.args[1].clone(),
                    line: opt.line,
                    values,
                },
            );
        }
    }

    fn parse_preprocessor(&mut self, node: &markup::Node) {
        for op in node.children.iter().filter(|c| c.is_element()) {
            match op.name.as_str() {
                "downcase" => self.pre_ops.push(PreOp::Downcase),
                "rxsubstitute" => {
                    if op.args.len() < 2 {
                        self.errors.push(CompileError::new(
                            op.line,
                            "'rxsubstitute' needs a pattern and a replacement.".to_string(),
                        ));
                        continue;
                    }
                    match regex::Regex::new(&op.args[0]) {
                        Ok(pattern) => self.pre_ops.push(PreOp::RxSubstitute {
                            pattern,
                            replacement: op.args[1].clone(),
                        }),
                        Err(e) => {
                            self.errors.push(CompileError::new(
                                op.line,
                                format!("Invalid substitution pattern: {e}."),
                            ));
                        }
                    }
                }
                other => {
                    self.warnings.push(CompileError::new(
                        op.line,
                        format!("Unknown preprocessor operator '\\{other}'."),
                    ));
                }
            }
        }
    }

    fn parse_postprocessor(&mut self, node: &markup::Node) {
        for op in node.children.iter().filter(|c| c.is_element()) {
            match op.name.as_str() {
                // Virtual resolution always runs; the directive is legacy.
                "resolve_virtuals" => {}
                "outspace" => self.out_space = Some(op.args.clone()),
                other => {
                    self.warnings.push(CompileError::new(
                        op.line,
                        format!("Unknown postprocessor operator '\\{other}'."),
                    ));
                }
            }
        }
    }

    /// Registers a destination charset under its own name. The first charset
    /// added becomes the default unless the mode named one explicitly.
    pub fn add_charset(&mut self, charset: Charset, is_default: bool) {
        if is_default || self.default_charset.is_none() {
            self.default_charset = Some(charset.name.clone());
        }
        self.charsets.insert(charset.name.clone(), charset);
    }

    /// Compiles the mode under the given option values. Unknown keys are
    /// ignored; missing ones take their declared defaults. The result always
    /// exists, carrying whatever errors compilation produced.
    pub fn compile(&self, options: &OptionValues) -> CompiledMode {
        let mut errors = self.errors.clone();

        let mut resolved = OptionValues::new();
        for (name, opt) in &self.options {
            let value = options.get(name).unwrap_or(&opt.default_value);
            resolved.insert(name.clone(), value.clone());
        }

        for charset in self.charsets.values() {
            errors.extend(charset.errors.iter().cloned());
        }

        let mut groups = self.rule_groups.clone();
        for group in &mut groups {
            group.finalize(&resolved, &mut errors);
        }
        let processor = TranscriptionProcessor::build(&groups, &mut errors);

        CompiledMode {
            name: self.name.clone(),
            options: resolved,
            processor: if errors.is_empty() { Some(processor) } else { None },
            errors,
            pre_ops: self.pre_ops.clone(),
            post: PostProcessor::new(self.out_space.clone()),
            charsets: self.charsets.clone(),
            default_charset: self.default_charset.clone(),
        }
    }
}
