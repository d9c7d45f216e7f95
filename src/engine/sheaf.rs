//! Combinatorial rule predicates.
//!
//! A rule predicate like `[a*o*u]i` is a chain of sheaves: the bracketed part
//! is a linkable sheaf whose `*`-separated fragments line up positionally with
//! the linkable sheaves on the other side of the rule, and the bare `i` is a
//! non-linkable sheaf contributing to every expansion. Inside a fragment,
//! parenthesized groups like `h(a,ä)i` hold equivalent alternatives that
//! multiply out into separate sub-rules.

use crate::CompileError;
use crate::engine::rule_group::convert_unicode_vars;
use crate::engine::WORD_BOUNDARY_TREE;

#[derive(Debug, Clone)]
pub(crate) struct Fragment {
    /// Every expanded alternative of this fragment, each a token list.
    pub combinations: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Sheaf {
    pub linkable: bool,
    pub fragments: Vec<Fragment>,
}

#[derive(Debug, Clone)]
pub(crate) struct SheafChain {
    pub is_src: bool,
    pub sheaves: Vec<Sheaf>,
}

impl SheafChain {
    pub(crate) fn parse(
        is_src: bool,
        line: usize,
        expr: &str,
        errors: &mut Vec<CompileError>,
    ) -> SheafChain {
        let re = regex!(r"\[(.*?)\]");
        let mut sheaves = Vec::new();
        let mut last = 0;
        for caps in re.captures_iter(expr) {
            let whole = caps.get(0).unwrap();
            push_sheaf(&mut sheaves, &expr[last..whole.start()], false, is_src, line, errors);
            push_sheaf(&mut sheaves, &caps[1], true, is_src, line, errors);
            last = whole.end();
        }
        push_sheaf(&mut sheaves, &expr[last..], false, is_src, line, errors);
        if sheaves.is_empty() {
            sheaves.push(Sheaf::parse("", false, is_src, line, errors));
        }
        SheafChain { is_src, sheaves }
    }

    pub(crate) fn linkable_indices(&self) -> Vec<usize> {
        self.sheaves
            .iter()
            .enumerate()
            .filter(|(_, s)| s.linkable)
            .map(|(i, _)| i)
            .collect()
    }
}

fn push_sheaf(
    sheaves: &mut Vec<Sheaf>,
    text: &str,
    linkable: bool,
    is_src: bool,
    line: usize,
    errors: &mut Vec<CompileError>,
) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    sheaves.push(Sheaf::parse(text, linkable, is_src, line, errors));
}

impl Sheaf {
    fn parse(
        text: &str,
        linkable: bool,
        is_src: bool,
        line: usize,
        errors: &mut Vec<CompileError>,
    ) -> Sheaf {
        // Keep empty fragments: `[a*]` has two positions, the second empty.
        let fragments = text
            .split('*')
            .map(|f| Fragment::parse(f.trim(), is_src, line, errors))
            .collect();
        Sheaf { linkable, fragments }
    }
}

impl Fragment {
    fn parse(text: &str, is_src: bool, line: usize, errors: &mut Vec<CompileError>) -> Fragment {
        let re = regex!(r"\((.*?)\)");
        // Each segment is a list of alternatives; each alternative a token list.
        let mut segments: Vec<Vec<Vec<String>>> = Vec::new();
        let mut last = 0;
        for caps in re.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            push_plain_segment(&mut segments, &text[last..whole.start()], is_src, line, errors);
            // Equivalence group: comma-separated alternatives, empties kept so
            // `(a,)` can mean "a or nothing".
            let alts = caps[1]
                .split(',')
                .map(|alt| leaf_tokens(alt.trim(), is_src, line, errors))
                .collect();
            segments.push(alts);
            last = whole.end();
        }
        push_plain_segment(&mut segments, &text[last..], is_src, line, errors);

        let mut combinations: Vec<Vec<String>> = vec![Vec::new()];
        for segment in segments {
            let mut next = Vec::with_capacity(combinations.len() * segment.len());
            for combo in &combinations {
                for alt in &segment {
                    let mut c = combo.clone();
                    c.extend(alt.iter().cloned());
                    next.push(c);
                }
            }
            combinations = next;
        }
        Fragment { combinations }
    }
}

fn push_plain_segment(
    segments: &mut Vec<Vec<Vec<String>>>,
    text: &str,
    is_src: bool,
    line: usize,
    errors: &mut Vec<CompileError>,
) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    segments.push(vec![leaf_tokens(text, is_src, line, errors)]);
}

/// Splits leaf text into tokens. On the source side the authoring boundary
/// marker is swapped for its trie sentinel before `{UNI_XXXX}` escapes are
/// expanded, so an escaped underscore survives as a literal character.
fn leaf_tokens(
    text: &str,
    is_src: bool,
    line: usize,
    errors: &mut Vec<CompileError>,
) -> Vec<String> {
    text.split_whitespace()
        .map(|tok| {
            if is_src {
                // Skip over escapes so the underscore inside {UNI_5F} itself
                // is not taken for a boundary.
                let swapped = regex!(r"\{UNI_[0-9A-Fa-f]+\}|_").replace_all(tok, |caps: &regex::Captures<'_>| {
                    if &caps[0] == "_" {
                        WORD_BOUNDARY_TREE.to_string()
                    } else {
                        caps[0].to_string()
                    }
                });
                convert_unicode_vars(line, &swapped, errors)
            } else {
                tok.to_string()
            }
        })
        .collect()
}
