//! Longest-match trie over source characters.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct TreeNode {
    replacement: Option<Vec<String>>,
    children: HashMap<char, TreeNode>,
}

#[derive(Debug, Default)]
pub(crate) struct TranscriptionTree {
    root: TreeNode,
}

impl TranscriptionTree {
    /// Registers `path`'s replacement tokens. A later insert on the same path
    /// wins, matching source order of the rules.
    pub(crate) fn insert(&mut self, path: &str, replacement: Vec<String>) {
        if path.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for c in path.chars() {
            node = node.children.entry(c).or_default();
        }
        node.replacement = Some(replacement);
    }

    /// Finds the longest registered prefix of `input`, returning its tokens
    /// and how many chars it consumed. With no match at all, one char is
    /// swallowed and the unknown token returned, so the walk always advances.
    pub(crate) fn lookup(&self, input: &[char]) -> (Vec<String>, usize) {
        let mut walked: Vec<&TreeNode> = vec![&self.root];
        for c in input {
            match walked.last().and_then(|n| n.children.get(c)) {
                Some(child) => walked.push(child),
                None => break,
            }
        }
        while walked.len() > 1 {
            let node = walked.pop().filter(|n| n.replacement.is_some());
            if let Some(node) = node {
                let tokens = node.replacement.clone().unwrap_or_default();
                return (tokens, walked.len());
            }
        }
        (vec![crate::engine::UNKNOWN_TOKEN.to_string()], 1)
    }
}
