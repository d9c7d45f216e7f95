//! Token stream finishing: cleanup, sequence expansion, swaps, virtual
//! character resolution and the final mapping to charset output text.

use crate::charset::Charset;
use crate::engine::{LF_TOKEN, SPACE_TOKEN, UNKNOWN_TOKEN};

/// Output for tokens the charset cannot express.
const UNKNOWN_CHAR_OUTPUT: &str = "?";

#[derive(Debug, Default)]
pub(crate) struct PostProcessor {
    /// Replacement character names for `*SPACE`; plain space when unset.
    out_space: Option<Vec<String>>,
}

impl PostProcessor {
    pub(crate) fn new(out_space: Option<Vec<String>>) -> Self {
        PostProcessor { out_space }
    }

    pub(crate) fn apply(&self, tokens: Vec<String>, charset: &Charset) -> String {
        let mut tokens: Vec<String> = tokens
            .into_iter()
            .filter(|t| !t.is_empty() && t != "\\")
            .flat_map(|t| match charset.sequence(&t) {
                Some(seq) => seq.to_vec(),
                None => vec![t],
            })
            .collect();

        self.apply_swaps(&mut tokens, charset);

        if !charset.virtuals.is_empty() {
            // Both passes scan the pristine stream so forward and reverse
            // resolution cannot feed on each other's rewrites.
            let pristine = tokens.clone();
            resolve_virtuals(&pristine, &mut tokens, charset, false);
            resolve_virtuals(&pristine, &mut tokens, charset, true);
        }

        let mut out = String::new();
        for token in &tokens {
            match token.as_str() {
                UNKNOWN_TOKEN => out.push_str(UNKNOWN_CHAR_OUTPUT),
                SPACE_TOKEN => match &self.out_space {
                    Some(names) => {
                        for name in names {
                            out.push_str(charset.get_character(name).unwrap_or(UNKNOWN_CHAR_OUTPUT));
                        }
                    }
                    None => out.push(' '),
                },
                LF_TOKEN => out.push('\n'),
                name => {
                    if let Some(s) = charset.get_character(name) {
                        out.push_str(s);
                    } else if let Some(vi) = charset.virtual_index(name) {
                        out.push_str(charset.virtual_fallback(vi));
                    } else {
                        out.push_str(UNKNOWN_CHAR_OUTPUT);
                    }
                }
            }
        }
        out
    }

    /// A swapped pair is final: the walk steps past both tokens so a chain of
    /// declarations cannot bubble a character further than one position.
    fn apply_swaps(&self, tokens: &mut [String], charset: &Charset) {
        let mut i = 0;
        while i + 1 < tokens.len() {
            if charset.has_swap(&tokens[i], &tokens[i + 1]) {
                tokens.swap(i, i + 1);
                i += 2;
            } else {
                i += 1;
            }
        }
    }
}

/// One resolution sweep. The forward sweep resolves plain virtuals against
/// the latest concrete character before them; the reverse sweep does the same
/// for `reversed` virtuals against the character after them. A resolved
/// virtual becomes concrete immediately, so it can trigger later virtuals in
/// the same sweep.
fn resolve_virtuals(pristine: &[String], out: &mut [String], charset: &Charset, reverse: bool) {
    let mut last: Vec<Option<usize>> = vec![None; charset.virtuals.len()];
    let len = pristine.len();
    for step in 0..len {
        let idx = if reverse { len - 1 - step } else { step };
        let mut token = pristine[idx].clone();
        if token == SPACE_TOKEN || token == LF_TOKEN {
            // Virtual context does not cross word breaks.
            last.fill(None);
            continue;
        }
        if let Some(vi) = charset.virtual_index(&token) {
            if charset.virtual_at(vi).reversed == reverse {
                if let Some(ci) = last[vi] {
                    let name = charset.char_at(ci).names[0].clone();
                    out[idx] = name.clone();
                    token = name;
                }
            }
        }
        for (vi, vc) in charset.virtuals.iter().enumerate() {
            if let Some(ci) = vc.resolve(&token) {
                last[vi] = Some(ci);
            }
        }
    }
}
