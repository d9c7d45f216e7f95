//! Lockstep iteration over a sheaf chain's fragment positions.
//!
//! Source and destination chains of a rule are expanded in lockstep: both
//! iterators advance their linkable fragment cursors in the same order, so the
//! n-th source expansion pairs with the n-th destination expansion. A cross
//! rule schema permutes which destination sheaf advances with which source
//! sheaf.

use crate::CompileError;
use crate::engine::sheaf::SheafChain;

#[derive(Debug)]
pub(crate) struct SheafChainIterator<'a> {
    chain: &'a SheafChain,
    /// Fragment count per sheaf.
    sizes: Vec<usize>,
    cursors: Vec<usize>,
    /// Advance order: position `i` in the lockstep walk moves sheaf `cross[i]`.
    cross: Vec<usize>,
    /// Shape signature of the linkable positions, e.g. "3x2", or "CONST".
    prototype: String,
}

impl<'a> SheafChainIterator<'a> {
    pub(crate) fn new(
        chain: &'a SheafChain,
        line: usize,
        cross_schema: Option<&str>,
    ) -> Result<Self, CompileError> {
        let sizes: Vec<usize> = chain.sheaves.iter().map(|s| s.fragments.len()).collect();
        let cursors = vec![0; sizes.len()];
        let cross: Vec<usize> = (0..sizes.len()).collect();
        let mut it = SheafChainIterator { chain, sizes, cursors, cross, prototype: String::new() };
        if let Some(schema_text) = cross_schema {
            it.apply_schema(line, schema_text)?;
        } else {
            it.recompute_prototype();
        }
        Ok(it)
    }

    fn apply_schema(&mut self, line: usize, schema_text: &str) -> Result<(), CompileError> {
        let linkable = self.chain.linkable_indices();
        let mut schema = Vec::new();
        for part in schema_text.split(',') {
            match part.trim().parse::<usize>() {
                Ok(n) if n >= 1 => schema.push(n - 1),
                _ => {
                    return Err(CompileError::new(
                        line,
                        "Cross schema must contain comma-separated integers.".to_string(),
                    ));
                }
            }
        }
        if schema.len() != linkable.len() {
            return Err(CompileError::new(
                line,
                format!(
                    "{} linkable sheaves found in right predicate, but {} elements in cross rule.",
                    linkable.len(),
                    schema.len()
                ),
            ));
        }
        let mut sorted = schema.clone();
        sorted.sort_unstable();
        if sorted != (0..schema.len()).collect::<Vec<_>>() {
            return Err(CompileError::new(
                line,
                format!(
                    "Cross schema '{schema_text}' is not a permutation of 1..{}.",
                    schema.len()
                ),
            ));
        }
        let before = self.cross.clone();
        for (to_idx, &from_idx) in schema.iter().enumerate() {
            self.cross[linkable[from_idx]] = before[linkable[to_idx]];
        }
        self.recompute_prototype();
        Ok(())
    }

    fn recompute_prototype(&mut self) {
        // Shape in advance order: the schema permutes which sheaf sits at
        // each lockstep position.
        let linkable = self.chain.linkable_indices();
        let proto_sizes: Vec<usize> = linkable.iter().map(|&i| self.sizes[self.cross[i]]).collect();
        self.prototype = if proto_sizes.is_empty() {
            "CONST".to_string()
        } else {
            proto_sizes.iter().map(usize::to_string).collect::<Vec<_>>().join("x")
        };
    }

    pub(crate) fn prototype(&self) -> &str {
        &self.prototype
    }

    /// Advances to the next cursor state, odometer style in `cross` order.
    /// Returns false once every position has wrapped around.
    pub(crate) fn iterate(&mut self) -> bool {
        let mut pos = 0;
        while pos < self.cross.len() {
            let real = self.cross[pos];
            self.cursors[real] += 1;
            if self.cursors[real] >= self.sizes[real] {
                self.cursors[real] = 0;
                pos += 1;
            } else {
                return true;
            }
        }
        false
    }

    /// All token-list expansions of the current cursor state: the product of
    /// every sheaf's selected fragment alternatives, concatenated in chain
    /// order.
    pub(crate) fn combinations(&self) -> Vec<Vec<String>> {
        let mut result: Vec<Vec<String>> = vec![Vec::new()];
        for (i, sheaf) in self.chain.sheaves.iter().enumerate() {
            let fragment = &sheaf.fragments[self.cursors[i]];
            let mut next = Vec::with_capacity(result.len() * fragment.combinations.len());
            for combo in &result {
                for alt in &fragment.combinations {
                    let mut c = combo.clone();
                    c.extend(alt.iter().cloned());
                    next.push(c);
                }
            }
            result = next;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(is_src: bool, expr: &str) -> SheafChain {
        let mut errors = Vec::new();
        let c = SheafChain::parse(is_src, 1, expr, &mut errors);
        assert!(errors.is_empty(), "{errors:?}");
        c
    }

    fn collect(it: &mut SheafChainIterator<'_>) -> Vec<String> {
        let mut out = Vec::new();
        loop {
            for combo in it.combinations() {
                out.push(combo.concat());
            }
            if !it.iterate() {
                break;
            }
        }
        out
    }

    #[test]
    fn prototype_reflects_linkable_shape() {
        let c = chain(true, "[a*o*u]i");
        let it = SheafChainIterator::new(&c, 1, None).unwrap();
        assert_eq!(it.prototype(), "3");
        let c = chain(true, "xyz");
        let it = SheafChainIterator::new(&c, 1, None).unwrap();
        assert_eq!(it.prototype(), "CONST");
        let c = chain(false, "[A*B][C*D*E]");
        let it = SheafChainIterator::new(&c, 1, None).unwrap();
        assert_eq!(it.prototype(), "2x3");
    }

    #[test]
    fn identity_iteration_walks_first_sheaf_fastest() {
        let c = chain(true, "[a*b][c*d]");
        let mut it = SheafChainIterator::new(&c, 1, None).unwrap();
        assert_eq!(collect(&mut it), vec!["ac", "bc", "ad", "bd"]);
    }

    #[test]
    fn cross_schema_swaps_advance_order() {
        let c = chain(false, "[X*Y][1*2]");
        let mut it = SheafChainIterator::new(&c, 1, Some("2,1")).unwrap();
        // With 2,1 the second sheaf advances fastest, pairing against an
        // identity-ordered source as ac→X1, bc→X2, ad→Y1, bd→Y2.
        assert_eq!(collect(&mut it), vec!["X1", "X2", "Y1", "Y2"]);
    }

    #[test]
    fn applying_a_schema_twice_restores_identity_order() {
        let c = chain(false, "[X*Y][1*2]");
        let mut base = SheafChainIterator::new(&c, 1, None).unwrap();
        let identity = collect(&mut base);
        let mut twice = SheafChainIterator::new(&c, 1, Some("2,1")).unwrap();
        twice.apply_schema(1, "2,1").unwrap();
        assert_eq!(twice.prototype(), "2x2");
        assert_eq!(collect(&mut twice), identity);
    }

    #[test]
    fn cross_schema_permutes_prototype() {
        let c = chain(false, "[A*B][C*D*E]");
        let it = SheafChainIterator::new(&c, 1, Some("2,1")).unwrap();
        assert_eq!(it.prototype(), "3x2");
    }

    #[test]
    fn cross_schema_arity_mismatch_is_an_error() {
        let c = chain(false, "[A*B][C*D]");
        let err = SheafChainIterator::new(&c, 7, Some("1")).unwrap_err();
        assert_eq!(err.line, 7);
        assert!(err.message.contains("2 linkable sheaves"));
    }

    #[test]
    fn cross_schema_must_be_a_permutation() {
        let c = chain(false, "[A*B][C*D]");
        let err = SheafChainIterator::new(&c, 1, Some("1,1")).unwrap_err();
        assert!(err.message.contains("not a permutation"));
        let err = SheafChainIterator::new(&c, 1, Some("1,x")).unwrap_err();
        assert!(err.message.contains("comma-separated integers"));
    }

    #[test]
    fn nonlinkable_sheaves_contribute_to_every_expansion() {
        let c = chain(true, "[a*b]i");
        let mut it = SheafChainIterator::new(&c, 1, None).unwrap();
        assert_eq!(collect(&mut it), vec!["ai", "bi"]);
    }
}
