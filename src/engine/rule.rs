//! A single transcription rule and its flat expansions.

use crate::CompileError;
use crate::engine::iterator::SheafChainIterator;
use crate::engine::sheaf::SheafChain;

/// One fully expanded source → destination pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubRule {
    /// Source fragments; concatenated they form the trie path.
    pub src: Vec<String>,
    /// Destination token names.
    pub dst: Vec<String>,
}

impl SubRule {
    pub(crate) fn src_key(&self) -> String {
        self.src.concat()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Rule {
    pub line: usize,
    pub src_chain: SheafChain,
    pub dst_chain: SheafChain,
    pub sub_rules: Vec<SubRule>,
}

impl Rule {
    pub(crate) fn new(line: usize, src_chain: SheafChain, dst_chain: SheafChain) -> Rule {
        Rule { line, src_chain, dst_chain, sub_rules: Vec::new() }
    }

    /// Expands the rule into sub-rules by walking both chains in lockstep.
    /// Equivalent source spellings all map onto the current destination
    /// expansion.
    pub(crate) fn finalize(&mut self, cross: Option<&str>, errors: &mut Vec<CompileError>) {
        let mut src_it = match SheafChainIterator::new(&self.src_chain, self.line, None) {
            Ok(it) => it,
            Err(e) => {
                errors.push(e);
                return;
            }
        };
        let mut dst_it = match SheafChainIterator::new(&self.dst_chain, self.line, cross) {
            Ok(it) => it,
            Err(e) => {
                errors.push(e);
                return;
            }
        };
        if src_it.prototype() != dst_it.prototype() {
            errors.push(CompileError::new(
                self.line,
                format!(
                    "Source and destination are not compatible ({} vs {}).",
                    src_it.prototype(),
                    dst_it.prototype()
                ),
            ));
            return;
        }
        loop {
            let dst = dst_it.combinations().into_iter().next().unwrap_or_default();
            for src in src_it.combinations() {
                self.sub_rules.push(SubRule { src, dst: dst.clone() });
            }
            if !src_it.iterate() {
                break;
            }
            dst_it.iterate();
        }
    }
}
