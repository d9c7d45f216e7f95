//! Input segmentation and trie-driven token emission.
//!
//! Input is cut into words on whitespace and on changes of owning rule group
//! (each group claims the characters its rules consume, so a mode can e.g.
//! keep letters and digits in separate groups). Every word is wrapped in
//! boundary sentinels and walked through the merged longest-match trie.

use std::collections::HashMap;

use crate::CompileError;
use crate::engine::rule_group::RuleGroup;
use crate::engine::tree::TranscriptionTree;
use crate::engine::{LF_TOKEN, SPACE_TOKEN, WORD_BOUNDARY_TREE, debug_rules};

/// One step of a transcription walk: the input slice that was consumed and
/// the tokens it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub consumed: String,
    pub tokens: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct TranscriptionProcessor {
    /// Which rule group owns each input character.
    in_charset: HashMap<char, usize>,
    tree: TranscriptionTree,
}

impl TranscriptionProcessor {
    pub(crate) fn build(groups: &[RuleGroup], errors: &mut Vec<CompileError>) -> Self {
        let mut in_charset: HashMap<char, usize> = HashMap::new();
        for (gi, group) in groups.iter().enumerate() {
            for &c in &group.in_chars {
                if let Some(&other) = in_charset.get(&c) {
                    if other != gi {
                        errors.push(CompileError::new(
                            0,
                            format!(
                                "Ambiguous segmentation: '{c}' is claimed by rule groups '{}' and '{}'.",
                                groups[other].name, group.name
                            ),
                        ));
                    }
                } else {
                    in_charset.insert(c, gi);
                }
            }
        }

        let mut tree = TranscriptionTree::default();
        // A lone boundary must always match so word wrapping never emits
        // unknown tokens by itself.
        tree.insert(&WORD_BOUNDARY_TREE.to_string(), vec![String::new()]);
        for group in groups {
            for rule in &group.rules {
                for sub in &rule.sub_rules {
                    tree.insert(&sub.src_key(), sub.dst.clone());
                }
            }
        }
        TranscriptionProcessor { in_charset, tree }
    }

    /// Turns input text into output tokens, recording every trie step in
    /// `trace`.
    pub(crate) fn transcribe(&self, text: &str, trace: &mut Vec<TraceEntry>) -> Vec<String> {
        let mut out = Vec::new();
        let mut word = String::new();
        let mut current: Option<usize> = None;
        for c in text.chars() {
            match c {
                ' ' | '\t' => {
                    self.transcribe_word(&word, &mut out, trace);
                    word.clear();
                    current = None;
                    out.push(SPACE_TOKEN.to_string());
                }
                '\r' => {}
                '\n' => {
                    self.transcribe_word(&word, &mut out, trace);
                    word.clear();
                    current = None;
                    out.push(LF_TOKEN.to_string());
                }
                _ => {
                    let group = self.in_charset.get(&c).copied();
                    if group != current && !word.is_empty() {
                        self.transcribe_word(&word, &mut out, trace);
                        word.clear();
                    }
                    current = group;
                    word.push(c);
                }
            }
        }
        self.transcribe_word(&word, &mut out, trace);
        out
    }

    fn transcribe_word(&self, word: &str, out: &mut Vec<String>, trace: &mut Vec<TraceEntry>) {
        if word.is_empty() {
            return;
        }
        let mut wrapped = Vec::with_capacity(word.chars().count() + 2);
        wrapped.push(WORD_BOUNDARY_TREE);
        wrapped.extend(word.chars());
        wrapped.push(WORD_BOUNDARY_TREE);

        let mut pos = 0;
        while pos < wrapped.len() {
            let (tokens, eaten) = self.tree.lookup(&wrapped[pos..]);
            let consumed: String = wrapped[pos..pos + eaten]
                .iter()
                .map(|&c| if c == WORD_BOUNDARY_TREE { '_' } else { c })
                .collect();
            if debug_rules() {
                eprintln!("sarati: '{consumed}' -> {tokens:?}");
            }
            trace.push(TraceEntry { consumed, tokens: tokens.clone() });
            out.extend(tokens.into_iter().filter(|t| !t.is_empty()));
            pos += eaten;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OptionValues;
    use crate::markup;

    fn processor(sources: &[&str]) -> (TranscriptionProcessor, Vec<CompileError>) {
        let mut errors = Vec::new();
        let mut groups = Vec::new();
        for src in sources {
            let doc = markup::parse(src);
            errors.extend(doc.errors);
            let mut g = RuleGroup::from_markup(doc.root.gpath("rules")[0], &mut errors);
            g.finalize(&OptionValues::new(), &mut errors);
            groups.push(g);
        }
        let p = TranscriptionProcessor::build(&groups, &mut errors);
        (p, errors)
    }

    const LETTERS: &str = "\
\\beg rules letters
th --> THULE
t --> TINCO
a --> TELCO A_TEHTA
_s_ --> LONE_S
\\end
";

    const DIGITS: &str = "\
\\beg rules digits
1 --> ONE
2 --> TWO
\\end
";

    fn run(p: &TranscriptionProcessor, text: &str) -> Vec<String> {
        let mut trace = Vec::new();
        p.transcribe(text, &mut trace)
    }

    #[test]
    fn longest_match_drives_tokens() {
        let (p, errors) = processor(&[LETTERS]);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(run(&p, "tha"), vec!["THULE", "TELCO", "A_TEHTA"]);
        assert_eq!(run(&p, "t"), vec!["TINCO"]);
    }

    #[test]
    fn whitespace_becomes_space_tokens() {
        let (p, _) = processor(&[LETTERS]);
        assert_eq!(run(&p, "t t"), vec!["TINCO", "*SPACE", "TINCO"]);
        assert_eq!(run(&p, "t\tt"), vec!["TINCO", "*SPACE", "TINCO"]);
        assert_eq!(run(&p, "t  t"), vec!["TINCO", "*SPACE", "*SPACE", "TINCO"]);
    }

    #[test]
    fn line_breaks_survive_and_cr_is_dropped() {
        let (p, _) = processor(&[LETTERS]);
        assert_eq!(run(&p, "t\r\nt"), vec!["TINCO", "*LF", "TINCO"]);
    }

    #[test]
    fn boundary_rules_see_word_edges() {
        let (p, _) = processor(&[LETTERS]);
        assert_eq!(run(&p, "s"), vec!["LONE_S"]);
        // An interior "s" has no rule of its own.
        assert_eq!(run(&p, "ts"), vec!["TINCO", "*UNKNOWN"]);
    }

    #[test]
    fn unmatched_chars_produce_unknown_tokens() {
        let (p, _) = processor(&[LETTERS]);
        assert_eq!(run(&p, "x"), vec!["*UNKNOWN"]);
    }

    #[test]
    fn group_change_splits_words() {
        let (p, errors) = processor(&[LETTERS, DIGITS]);
        assert!(errors.is_empty(), "{errors:?}");
        // "s" matches its lone-word rule even with digits glued on, because
        // the group switch inserts a word boundary.
        assert_eq!(run(&p, "s12"), vec!["LONE_S", "ONE", "TWO"]);
    }

    #[test]
    fn overlapping_groups_are_reported() {
        let other: &str = "\
\\beg rules clashing
t --> OTHER_T
\\end
";
        let (_, errors) = processor(&[LETTERS, other]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Ambiguous segmentation"));
        assert!(errors[0].message.contains("'letters'"));
        assert!(errors[0].message.contains("'clashing'"));
    }

    #[test]
    fn trace_records_every_step() {
        let (p, _) = processor(&[LETTERS]);
        let mut trace = Vec::new();
        p.transcribe("tha", &mut trace);
        let consumed: Vec<&str> = trace.iter().map(|t| t.consumed.as_str()).collect();
        assert_eq!(consumed, vec!["_", "th", "a", "_"]);
        assert_eq!(trace[1].tokens, vec!["THULE"]);
    }
}
