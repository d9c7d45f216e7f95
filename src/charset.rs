//! Destination charsets: named output characters, virtual (context-resolved)
//! characters, token sequences, and swap pairs.
//!
//! A charset maps the token names emitted by the transcription trie to actual
//! output strings. Virtual characters are placeholders whose concrete glyph
//! depends on a previously (or, when reversed, subsequently) emitted trigger
//! character; they are resolved by the post-processor.

use std::collections::{HashMap, HashSet};

use crate::CompileError;
use crate::markup;

/// A concrete output character with one or more names.
#[derive(Debug, Clone)]
pub struct Char {
    pub line: usize,
    pub str_value: String,
    pub names: Vec<String>,
}

/// One resolution class of a virtual character: when any of `triggers` was
/// the last concrete character seen, the virtual resolves to `target`.
#[derive(Debug, Clone)]
pub struct VirtualClass {
    pub target: String,
    pub triggers: Vec<String>,
}

/// A context-resolved character. `lookup` maps trigger names to the index (in
/// `Charset::chars`) of the resolution target, built by [`Charset::finalize`].
#[derive(Debug, Clone)]
pub struct VirtualChar {
    pub line: usize,
    pub names: Vec<String>,
    pub classes: Vec<VirtualClass>,
    /// Reversed virtuals resolve against the character that FOLLOWS them.
    pub reversed: bool,
    /// Name of the char to fall back to when no trigger was seen.
    pub default: Option<String>,
    lookup: HashMap<String, usize>,
}

impl VirtualChar {
    pub(crate) fn resolve(&self, trigger: &str) -> Option<usize> {
        self.lookup.get(trigger).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Charset {
    pub name: String,
    pub version: String,
    pub chars: Vec<Char>,
    pub virtuals: Vec<VirtualChar>,
    pub errors: Vec<CompileError>,
    by_name: HashMap<String, usize>,
    virtual_by_name: HashMap<String, usize>,
    sequences: HashMap<String, Vec<String>>,
    swaps: HashMap<String, HashSet<String>>,
}

impl Charset {
    pub fn new(name: &str) -> Self {
        Charset { name: name.to_string(), ..Default::default() }
    }

    /// Parses a charset source file. Problems land in `errors`; the charset is
    /// still usable for whatever did parse. Call order: parse already runs
    /// [`Charset::finalize`], callers building a charset by hand must call it
    /// themselves.
    pub fn parse(name: &str, source: &str) -> Charset {
        let doc = markup::parse(source);
        let mut cs = Charset::new(name);
        cs.errors = doc.errors;

        for node in doc.root.gpath("version") {
            cs.version = node.args.first().cloned().unwrap_or_default();
        }

        for node in doc.root.gpath("char") {
            if node.args.is_empty() {
                cs.errors.push(CompileError::new(node.line, "Missing character code.".to_string()));
                continue;
            }
            let code = &node.args[0];
            let value = match u32::from_str_radix(code, 16).ok().and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => {
                    cs.errors.push(CompileError::new(
                        node.line,
                        format!("'{code}' is not a valid character code."),
                    ));
                    continue;
                }
            };
            // "?" marks an intentionally unnamed slot.
            let names: Vec<String> =
                node.args[1..].iter().filter(|n| n.as_str() != "?").cloned().collect();
            if names.is_empty() {
                continue;
            }
            cs.add_char(node.line, &value, names);
        }

        for node in doc.root.gpath("sequence") {
            if node.args.len() < 2 {
                cs.errors
                    .push(CompileError::new(node.line, "A sequence needs a name and members.".to_string()));
                continue;
            }
            cs.add_sequence(&node.args[0], node.args[1..].to_vec());
        }

        for node in doc.root.gpath("swap") {
            if node.args.len() < 2 {
                cs.errors
                    .push(CompileError::new(node.line, "A swap needs a character and its followers.".to_string()));
                continue;
            }
            cs.add_swap(&node.args[0], node.args[1..].to_vec());
        }

        for node in doc.root.gpath("virtual") {
            let names: Vec<String> =
                node.args.iter().filter(|n| n.as_str() != "?").cloned().collect();
            if names.is_empty() {
                cs.errors.push(CompileError::new(node.line, "A virtual needs a name.".to_string()));
                continue;
            }
            let mut classes = Vec::new();
            for class in node.gpath("class") {
                if class.args.is_empty() {
                    cs.errors
                        .push(CompileError::new(class.line, "A class needs a target character.".to_string()));
                    continue;
                }
                let target = class.args[0].clone();
                let mut triggers: Vec<String> = class.args[1..].to_vec();
                for text in class.children.iter().filter(|c| c.is_text()) {
                    triggers.extend(text.text().split_whitespace().map(str::to_string));
                }
                classes.push(VirtualClass { target, triggers });
            }
            let reversed = !node.gpath("reversed").is_empty();
            let default = node
                .gpath("default")
                .first()
                .and_then(|d| d.args.first().cloned());
            cs.add_virtual(node.line, names, classes, reversed, default);
        }

        cs.finalize();
        cs
    }

    pub fn add_char(&mut self, line: usize, value: &str, names: Vec<String>) {
        let idx = self.chars.len();
        for name in &names {
            self.by_name.insert(name.clone(), idx);
        }
        self.chars.push(Char { line, str_value: value.to_string(), names });
    }

    pub fn add_virtual(
        &mut self,
        line: usize,
        names: Vec<String>,
        classes: Vec<VirtualClass>,
        reversed: bool,
        default: Option<String>,
    ) {
        let idx = self.virtuals.len();
        for name in &names {
            self.virtual_by_name.insert(name.clone(), idx);
        }
        self.virtuals.push(VirtualChar { line, names, classes, reversed, default, lookup: HashMap::new() });
    }

    pub fn add_sequence(&mut self, name: &str, members: Vec<String>) {
        self.sequences.insert(name.to_string(), members);
    }

    pub fn add_swap(&mut self, target: &str, followers: Vec<String>) {
        self.swaps
            .entry(target.to_string())
            .or_default()
            .extend(followers);
    }

    /// Builds the per-virtual trigger lookup tables and validates class
    /// references. Must run after all chars and virtuals are registered.
    pub fn finalize(&mut self) {
        let mut lookups: Vec<HashMap<String, usize>> = Vec::with_capacity(self.virtuals.len());
        for vc in &self.virtuals {
            let mut lookup = HashMap::new();
            for class in &vc.classes {
                let target_idx = match self.by_name.get(&class.target) {
                    Some(&i) => i,
                    None => {
                        self.errors.push(CompileError::new(
                            vc.line,
                            format!("Unknown target character '{}' in virtual class.", class.target),
                        ));
                        continue;
                    }
                };
                for trigger in &class.triggers {
                    if self.virtual_by_name.contains_key(trigger) {
                        self.errors.push(CompileError::new(
                            vc.line,
                            format!("Virtual character '{trigger}' cannot trigger another virtual."),
                        ));
                        continue;
                    }
                    if !self.by_name.contains_key(trigger) {
                        self.errors.push(CompileError::new(
                            vc.line,
                            format!("Unknown trigger character '{trigger}' in virtual class."),
                        ));
                        continue;
                    }
                    if lookup.insert(trigger.clone(), target_idx).is_some() {
                        self.errors.push(CompileError::new(
                            vc.line,
                            format!("Trigger '{trigger}' appears in more than one class."),
                        ));
                    }
                }
            }
            lookups.push(lookup);
        }
        for (vc, lookup) in self.virtuals.iter_mut().zip(lookups) {
            vc.lookup = lookup;
        }
    }

    pub fn has_character(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The output string for a named concrete character.
    pub fn get_character(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|&i| self.chars[i].str_value.as_str())
    }

    pub(crate) fn char_at(&self, idx: usize) -> &Char {
        &self.chars[idx]
    }

    pub(crate) fn virtual_index(&self, name: &str) -> Option<usize> {
        self.virtual_by_name.get(name).copied()
    }

    pub(crate) fn virtual_at(&self, idx: usize) -> &VirtualChar {
        &self.virtuals[idx]
    }

    pub(crate) fn sequence(&self, name: &str) -> Option<&[String]> {
        self.sequences.get(name).map(Vec::as_slice)
    }

    pub(crate) fn has_swap(&self, target: &str, follower: &str) -> bool {
        self.swaps.get(target).is_some_and(|f| f.contains(follower))
    }

    /// Output for an unresolved virtual: its default char if declared and
    /// known, otherwise the unknown-output marker.
    pub(crate) fn virtual_fallback(&self, idx: usize) -> &str {
        self.virtuals[idx]
            .default
            .as_deref()
            .and_then(|d| self.get_character(d))
            .unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = "\
\\version 1.1
\\char E02A TELCO
\\char E02B ARA
\\char EC42 A_TEHTA_TELCO
\\char EC44 A_TEHTA_ARA
\\sequence W_TEHTA O_TEHTA U_TEHTA
\\swap TELCO ARA
\\beg virtual A_TEHTA
  \\beg class A_TEHTA_TELCO
    TELCO
  \\end
  \\beg class A_TEHTA_ARA ARA
  \\end
  \\beg default A_TEHTA_TELCO
  \\end
\\end
";

    #[test]
    fn parses_chars_and_metadata() {
        let cs = Charset::parse("tengwar_test", SRC);
        assert!(cs.errors.is_empty(), "{:?}", cs.errors);
        assert_eq!(cs.version, "1.1");
        assert_eq!(cs.get_character("TELCO"), Some("\u{e02a}"));
        assert_eq!(cs.get_character("A_TEHTA_ARA"), Some("\u{ec44}"));
        assert!(!cs.has_character("A_TEHTA"));
    }

    #[test]
    fn virtual_lookup_resolves_per_trigger() {
        let cs = Charset::parse("tengwar_test", SRC);
        let vi = cs.virtual_index("A_TEHTA").unwrap();
        let vc = cs.virtual_at(vi);
        assert!(!vc.reversed);
        let telco = vc.resolve("TELCO").unwrap();
        assert_eq!(cs.char_at(telco).str_value, "\u{ec42}");
        let ara = vc.resolve("ARA").unwrap();
        assert_eq!(cs.char_at(ara).str_value, "\u{ec44}");
        assert!(vc.resolve("A_TEHTA_TELCO").is_none());
        assert_eq!(cs.virtual_fallback(vi), "\u{ec42}");
    }

    #[test]
    fn sequences_and_swaps() {
        let cs = Charset::parse("tengwar_test", SRC);
        assert_eq!(cs.sequence("W_TEHTA").unwrap(), ["O_TEHTA", "U_TEHTA"]);
        assert!(cs.has_swap("TELCO", "ARA"));
        assert!(!cs.has_swap("ARA", "TELCO"));
    }

    #[test]
    fn bad_char_code_is_reported() {
        let cs = Charset::parse("x", "\\char ZZZZ NAME\n");
        assert_eq!(cs.errors.len(), 1);
        assert!(cs.errors[0].message.contains("not a valid character code"));
        assert!(!cs.has_character("NAME"));
    }

    #[test]
    fn unnamed_slots_are_skipped() {
        let cs = Charset::parse("x", "\\char E000 ?\n\\char E001 A ? B\n");
        assert!(cs.errors.is_empty());
        assert_eq!(cs.chars.len(), 1);
        assert_eq!(cs.chars[0].names, vec!["A", "B"]);
    }

    #[test]
    fn unknown_trigger_and_target_are_reported() {
        let src = "\
\\char E000 A
\\beg virtual V
  \\beg class NOPE A
  \\end
  \\beg class A MISSING
  \\end
\\end
";
        let cs = Charset::parse("x", src);
        assert_eq!(cs.errors.len(), 2);
        assert!(cs.errors[0].message.contains("Unknown target"));
        assert!(cs.errors[1].message.contains("Unknown trigger"));
    }

    #[test]
    fn virtual_cannot_trigger_virtual() {
        let src = "\
\\char E000 A
\\char E001 B
\\beg virtual V
  \\beg class A B
  \\end
\\end
\\beg virtual W
  \\beg class B V
  \\end
\\end
";
        let cs = Charset::parse("x", src);
        assert_eq!(cs.errors.len(), 1);
        assert!(cs.errors[0].message.contains("cannot trigger another virtual"));
    }
}
