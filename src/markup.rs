//! Line-oriented markup reader for mode and charset source files.
//!
//! The format is a flat command language: every non-blank line is either a
//! comment (`** ...`), an element (`\name arg arg ...`), or plain text.
//! `\beg TYPE name args` opens a block element that collects children until the
//! matching `\end`, so a parsed file is a shallow tree of [`Node`]s.

use crate::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Inline,
    Block,
}

#[derive(Debug, Clone)]
pub struct Node {
    /// 1-based source line this node starts on.
    pub line: usize,
    pub kind: NodeKind,
    /// Element name; for text nodes this is empty.
    pub name: String,
    /// Element arguments; for text nodes, the single raw line.
    pub args: Vec<String>,
    pub children: Vec<Node>,
}

impl Node {
    fn element(line: usize, kind: NodeKind, name: String, args: Vec<String>) -> Self {
        Node { line, kind, name, args, children: Vec::new() }
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_element(&self) -> bool {
        !self.is_text()
    }

    /// The raw text of a text node.
    pub fn text(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// All direct children that are elements named `name`.
    pub fn gpath(&self, name: &str) -> Vec<&Node> {
        self.children
            .iter()
            .filter(|c| c.is_element() && c.name == name)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    /// Synthetic block node holding all top-level nodes.
    pub root: Node,
    pub errors: Vec<CompileError>,
}

/// Parses markup source into a document. Parse problems are collected in
/// `Document::errors` rather than aborting; the tree is best-effort.
pub fn parse(content: &str) -> Document {
    let mut errors = Vec::new();
    let mut root = Node::element(0, NodeKind::Block, String::new(), Vec::new());
    // Stack of open blocks; indices into a scratch arena would be overkill for
    // trees this shallow, so we keep owned nodes and splice on close.
    let mut stack: Vec<Node> = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("**") {
            continue;
        }

        let node = if let Some(rest) = line.strip_prefix('\\') {
            let mut parts = split_args(line_no, rest, &mut errors);
            if parts.is_empty() {
                continue;
            }
            let cmd = parts.remove(0);
            match cmd.as_str() {
                "beg" => {
                    if parts.is_empty() {
                        errors.push(CompileError::new(line_no, "'beg' without an element type.".to_string()));
                        continue;
                    }
                    let name = parts.remove(0);
                    stack.push(Node::element(line_no, NodeKind::Block, name, parts));
                    continue;
                }
                "end" => {
                    match stack.pop() {
                        Some(done) => match stack.last_mut() {
                            Some(parent) => parent.children.push(done),
                            None => root.children.push(done),
                        },
                        None => {
                            errors.push(CompileError::new(line_no, "'end' without a 'beg'.".to_string()));
                        }
                    }
                    continue;
                }
                _ => Node::element(line_no, NodeKind::Inline, cmd, parts),
            }
        } else {
            Node {
                line: line_no,
                kind: NodeKind::Text,
                name: String::new(),
                args: vec![line.to_string()],
                children: Vec::new(),
            }
        };

        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => root.children.push(node),
        }
    }

    while let Some(done) = stack.pop() {
        errors.push(CompileError::new(done.line, format!("'beg {}' is never closed.", done.name)));
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => root.children.push(done),
        }
    }

    Document { root, errors }
}

/// Splits an element's argument list on whitespace, honoring double-quoted
/// arguments (which may contain spaces). An unterminated quote is reported and
/// the line falls back to plain whitespace splitting.
fn split_args(line_no: usize, s: &str, errors: &mut Vec<CompileError>) -> Vec<String> {
    let mut args = Vec::new();
    let mut cur = String::new();
    let mut chars = s.chars();
    loop {
        match chars.next() {
            Some('"') => {
                // Quoted argument runs to the closing quote.
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => cur.push(c),
                        None => {
                            errors.push(CompileError::new(
                                line_no,
                                "Unterminated quoted argument.".to_string(),
                            ));
                            return s.split_whitespace().map(str::to_string).collect();
                        }
                    }
                }
                args.push(std::mem::take(&mut cur));
            }
            Some(c) if c.is_whitespace() => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            Some(c) => cur.push(c),
            None => break,
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let doc = parse("** a comment\n\n\\version 1.0\n");
        assert!(doc.errors.is_empty());
        assert_eq!(doc.root.children.len(), 1);
        assert_eq!(doc.root.children[0].name, "version");
        assert_eq!(doc.root.children[0].args, vec!["1.0"]);
    }

    #[test]
    fn blocks_nest_and_collect_children() {
        let src = "\\beg options\n\\option style classical\n\\beg inner x\nplain text\n\\end\n\\end\n";
        let doc = parse(src);
        assert!(doc.errors.is_empty());
        let opts = &doc.root.children[0];
        assert_eq!(opts.kind, NodeKind::Block);
        assert_eq!(opts.name, "options");
        assert_eq!(opts.children.len(), 2);
        assert_eq!(opts.children[0].name, "option");
        let inner = &opts.children[1];
        assert_eq!(inner.args, vec!["x"]);
        assert!(inner.children[0].is_text());
        assert_eq!(inner.children[0].text(), "plain text");
    }

    #[test]
    fn quoted_args_keep_spaces() {
        let doc = parse("\\human_name \"Classical Quenya\" short\n");
        assert_eq!(doc.root.children[0].args, vec!["Classical Quenya", "short"]);
    }

    #[test]
    fn unterminated_quote_reports_and_falls_back() {
        let doc = parse("\\name \"oops\n");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].line, 1);
        assert_eq!(doc.root.children[0].args, vec!["\"oops"]);
    }

    #[test]
    fn stray_end_is_an_error() {
        let doc = parse("\\end\n");
        assert_eq!(doc.errors.len(), 1);
        assert!(doc.errors[0].message.contains("'end' without a 'beg'"));
    }

    #[test]
    fn unclosed_block_is_an_error_but_kept() {
        let doc = parse("\\beg processor\n\\rule a\n");
        assert_eq!(doc.errors.len(), 1);
        assert!(doc.errors[0].message.contains("never closed"));
        assert_eq!(doc.root.children[0].name, "processor");
        assert_eq!(doc.root.children[0].children.len(), 1);
    }

    #[test]
    fn gpath_filters_by_name() {
        let doc = parse("\\beg charset x\n\\char E000 A\n\\char E001 B\n\\sequence S A B\n\\end\n");
        let cs = &doc.root.children[0];
        assert_eq!(cs.gpath("char").len(), 2);
        assert_eq!(cs.gpath("sequence").len(), 1);
        assert!(cs.gpath("virtual").is_empty());
    }
}
