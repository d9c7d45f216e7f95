//! Rule group compilation: variables, macros, conditional blocks and rule
//! lines, evaluated against the chosen option values into flat [`Rule`]s.
//!
//! Parsing builds a small arena of code blocks once; `finalize` re-walks that
//! arena for every compilation, so the same mode can be compiled under many
//! option sets without touching the source again.

use std::collections::{BTreeSet, HashMap};

use crate::CompileError;
use crate::api::OptionValues;
use crate::engine::rule::Rule;
use crate::engine::sheaf::SheafChain;
use crate::engine::{WORD_BOUNDARY_TREE, debug_rules};
use crate::markup::Node;

/// Variable substitution passes allowed before declaring a cycle.
const MAX_VAR_DEPTH: usize = 16;

pub(crate) type BlockId = usize;

#[derive(Debug, Clone)]
struct CodeLine {
    line: usize,
    expression: String,
}

#[derive(Debug, Clone)]
struct IfCond {
    line: usize,
    expression: String,
    block: BlockId,
}

#[derive(Debug, Clone)]
struct IfTerm {
    conds: Vec<IfCond>,
}

#[derive(Debug, Clone)]
struct MacroDeploy {
    line: usize,
    name: String,
    arg_exprs: Vec<String>,
}

#[derive(Debug, Clone)]
enum Term {
    Line(CodeLine),
    If(IfTerm),
    Deploy(MacroDeploy),
}

#[derive(Debug, Clone, Default)]
struct CodeBlock {
    terms: Vec<Term>,
}

#[derive(Debug, Clone)]
struct Macro {
    arg_names: Vec<String>,
    block: BlockId,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RuleGroup {
    pub(crate) name: String,
    blocks: Vec<CodeBlock>,
    root: BlockId,
    macros: HashMap<String, Macro>,
    vars: HashMap<String, String>,
    pub(crate) rules: Vec<Rule>,
    /// Source characters this group claims for input segmentation.
    pub(crate) in_chars: BTreeSet<char>,
}

impl RuleGroup {
    /// Builds a group from a `rules` block. Structural problems (dangling
    /// conditionals, duplicate macros) are reported here; everything that
    /// depends on option values waits for [`RuleGroup::finalize`].
    pub(crate) fn from_markup(node: &Node, errors: &mut Vec<CompileError>) -> RuleGroup {
        let mut group = RuleGroup {
            name: node.args.first().cloned().unwrap_or_default(),
            ..Default::default()
        };
        group.root = group.build_block(&node.children, errors);
        group
    }

    fn new_block(&mut self) -> BlockId {
        self.blocks.push(CodeBlock::default());
        self.blocks.len() - 1
    }

    fn build_block(&mut self, children: &[Node], errors: &mut Vec<CompileError>) -> BlockId {
        let root = self.new_block();
        // Each entry locates an open If term; lines land in its latest branch.
        let mut if_stack: Vec<(BlockId, usize)> = Vec::new();
        for child in children {
            let target = self.current_block(root, &if_stack);
            if child.is_text() {
                self.blocks[target].terms.push(Term::Line(CodeLine {
                    line: child.line,
                    expression: child.text().to_string(),
                }));
                continue;
            }
            match child.name.as_str() {
                "if" => {
                    let block = self.new_block();
                    let idx = self.blocks[target].terms.len();
                    self.blocks[target].terms.push(Term::If(IfTerm {
                        conds: vec![IfCond {
                            line: child.line,
                            expression: child.args.join(" "),
                            block,
                        }],
                    }));
                    if_stack.push((target, idx));
                }
                "elsif" | "else" => {
                    let expression = if child.name == "else" {
                        "true".to_string()
                    } else {
                        child.args.join(" ")
                    };
                    let block = self.new_block();
                    match if_stack.last() {
                        Some(&(bid, idx)) => {
                            if let Term::If(t) = &mut self.blocks[bid].terms[idx] {
                                t.conds.push(IfCond { line: child.line, expression, block });
                            }
                        }
                        None => {
                            errors.push(CompileError::new(
                                child.line,
                                format!("'{}' without a 'if'.", child.name),
                            ));
                        }
                    }
                }
                "endif" => {
                    if if_stack.pop().is_none() {
                        errors.push(CompileError::new(child.line, "'endif' without a 'if'.".to_string()));
                    }
                }
                "deploy" => {
                    if child.args.is_empty() {
                        errors.push(CompileError::new(child.line, "'deploy' without a macro name.".to_string()));
                        continue;
                    }
                    self.blocks[target].terms.push(Term::Deploy(MacroDeploy {
                        line: child.line,
                        name: child.args[0].clone(),
                        arg_exprs: child.args[1..].to_vec(),
                    }));
                }
                "macro" => {
                    if child.args.is_empty() {
                        errors.push(CompileError::new(child.line, "'macro' without a name.".to_string()));
                        continue;
                    }
                    let name = child.args[0].clone();
                    let arg_names = child.args[1..].to_vec();
                    let block = self.build_block(&child.children, errors);
                    if self.macros.contains_key(&name) {
                        errors.push(CompileError::new(
                            child.line,
                            format!("Macro '{name}' is already defined."),
                        ));
                        continue;
                    }
                    self.macros.insert(name, Macro { arg_names, block });
                }
                other => {
                    errors.push(CompileError::new(
                        child.line,
                        format!("Unknown element '\\{other}' in rules group."),
                    ));
                }
            }
        }
        for (bid, idx) in if_stack {
            if let Term::If(t) = &self.blocks[bid].terms[idx] {
                errors.push(CompileError::new(
                    t.conds[0].line,
                    "'if' without a 'endif'.".to_string(),
                ));
            }
        }
        root
    }

    fn current_block(&self, root: BlockId, if_stack: &[(BlockId, usize)]) -> BlockId {
        match if_stack.last() {
            Some(&(bid, idx)) => match &self.blocks[bid].terms[idx] {
                Term::If(t) => t.conds.last().map(|c| c.block).unwrap_or(root),
                _ => root,
            },
            None => root,
        }
    }

    /// Evaluates the group under `options`: seeds builtin variables, walks the
    /// code arena resolving conditionals and macro deployments, and expands
    /// every reached rule line into sub-rules.
    pub(crate) fn finalize(&mut self, options: &OptionValues, errors: &mut Vec<CompileError>) {
        self.vars.clear();
        self.rules.clear();
        self.in_chars.clear();

        for (name, value) in [
            ("NULL", ""),
            ("NBSP", "{UNI_A0}"),
            ("WJ", "{UNI_2060}"),
            ("ZWSP", "{UNI_200B}"),
            ("ZWNJ", "{UNI_200C}"),
            ("UNDERSCORE", "{UNI_5F}"),
            ("ASTERISK", "{UNI_2A}"),
            ("COMMA", "{UNI_2C}"),
            ("LPAREN", "{UNI_28}"),
            ("RPAREN", "{UNI_29}"),
            ("LBRACKET", "{UNI_5B}"),
            ("RBRACKET", "{UNI_5D}"),
        ] {
            self.vars.insert(name.to_string(), value.to_string());
        }

        self.descend(self.root, options, errors);

        for rule in &self.rules {
            for sub in &rule.sub_rules {
                for c in sub.src_key().chars() {
                    if c != WORD_BOUNDARY_TREE {
                        self.in_chars.insert(c);
                    }
                }
            }
        }

        if debug_rules() {
            let subs: usize = self.rules.iter().map(|r| r.sub_rules.len()).sum();
            eprintln!(
                "sarati: group '{}' finalized: {} rules, {} sub-rules, {} input chars",
                self.name,
                self.rules.len(),
                subs,
                self.in_chars.len()
            );
        }
    }

    fn descend(&mut self, block: BlockId, options: &OptionValues, errors: &mut Vec<CompileError>) {
        for i in 0..self.blocks[block].terms.len() {
            let term = self.blocks[block].terms[i].clone();
            match term {
                Term::Line(l) => self.dispatch_line(&l, errors),
                Term::If(t) => {
                    for cond in &t.conds {
                        if self.eval_condition(&cond.expression, options) {
                            self.descend(cond.block, options, errors);
                            break;
                        }
                    }
                }
                Term::Deploy(d) => self.deploy_macro(&d, options, errors),
            }
        }
    }

    fn dispatch_line(&mut self, l: &CodeLine, errors: &mut Vec<CompileError>) {
        let var_decl = regex!(r"^\s*\{([0-9A-Z_]+)\}\s+===\s+(.+?)\s*$");
        let pointer_decl = regex!(r"^\s*\{([0-9A-Z_]+)\}\s+<=>\s+(.+?)\s*$");
        let cross_rule = regex!(
            r"^\s*(.*?)\s+-->\s+([0-9]+(?:\s*,\s*[0-9]+)*|\{[0-9A-Z_]+\}|identity)\s+-->\s+(.+?)\s*$"
        );
        let plain_rule = regex!(r"^\s*(.*?)\s+-->\s+(.+?)\s*$");

        if let Some(caps) = var_decl.captures(&l.expression).or_else(|| pointer_decl.captures(&l.expression)) {
            if let Some(value) = self.apply_vars(l.line, &caps[2], true, errors) {
                self.vars.insert(caps[1].to_string(), value);
            }
            return;
        }
        if let Some(caps) = cross_rule.captures(&l.expression) {
            let schema = caps[2].to_string();
            let schema = if schema == "identity" {
                None
            } else if regex!(r"^\{[0-9A-Z_]+\}$").is_match(&schema) {
                match self.apply_vars(l.line, &schema, false, errors) {
                    Some(v) => Some(v),
                    None => return,
                }
            } else {
                Some(schema)
            };
            self.finalize_rule(l.line, &caps[1], &caps[3], schema.as_deref(), errors);
            return;
        }
        if let Some(caps) = plain_rule.captures(&l.expression) {
            self.finalize_rule(l.line, &caps[1], &caps[2], None, errors);
            return;
        }
        errors.push(CompileError::new(l.line, format!("Cannot understand '{}'.", l.expression)));
    }

    fn finalize_rule(
        &mut self,
        line: usize,
        src_expr: &str,
        dst_expr: &str,
        cross: Option<&str>,
        errors: &mut Vec<CompileError>,
    ) {
        let Some(src) = self.apply_vars(line, src_expr, true, errors) else { return };
        let Some(dst) = self.apply_vars(line, dst_expr, false, errors) else { return };
        let src_chain = SheafChain::parse(true, line, &src, errors);
        let dst_chain = SheafChain::parse(false, line, &dst, errors);
        let mut rule = Rule::new(line, src_chain, dst_chain);
        rule.finalize(cross, errors);
        self.rules.push(rule);
    }

    /// Substitutes `{NAME}` references in `expr` until none remain. Unicode
    /// escapes (`{UNI_XXXX}`) pass through untouched when allowed; rule
    /// destinations refuse them since their tokens are charset names. Returns
    /// `None` after reporting when substitution fails or cycles.
    pub(crate) fn apply_vars(
        &self,
        line: usize,
        expr: &str,
        allow_unicode: bool,
        errors: &mut Vec<CompileError>,
    ) -> Option<String> {
        let re = regex!(r"\{([0-9A-Z_]+)\}");
        let mut s = expr.to_string();
        for _ in 0..MAX_VAR_DEPTH {
            let mut failed = false;
            let result = re
                .replace_all(&s, |caps: &regex::Captures<'_>| {
                    let name = &caps[1];
                    if name.starts_with("UNI_") {
                        if allow_unicode {
                            return caps[0].to_string();
                        }
                        errors.push(CompileError::new(
                            line,
                            format!("Unicode variable '{}' is not allowed here.", &caps[0]),
                        ));
                        failed = true;
                        return String::new();
                    }
                    match self.vars.get(name) {
                        Some(v) => v.clone(),
                        None => {
                            errors.push(CompileError::new(
                                line,
                                format!("Failed to evaluate variable '{name}'."),
                            ));
                            failed = true;
                            // Left in place so error context stays readable.
                            caps[0].to_string()
                        }
                    }
                })
                .into_owned();
            if failed {
                return None;
            }
            if result == s {
                return Some(s);
            }
            s = result;
        }
        errors.push(CompileError::new(
            line,
            format!("Variable evaluation stack overflow in '{expr}'."),
        ));
        None
    }

    fn eval_condition(&self, expr: &str, options: &OptionValues) -> bool {
        fn strip(s: &str) -> &str {
            s.trim().trim_matches('"')
        }
        if let Some((left, right)) = expr.split_once("==") {
            let left = strip(left);
            let right = strip(right);
            return options.get(left).map(String::as_str).unwrap_or("") == right;
        }
        let name = strip(expr);
        match options.get(name) {
            Some(v) => v == "true",
            None => name == "true",
        }
    }

    fn deploy_macro(&mut self, d: &MacroDeploy, options: &OptionValues, errors: &mut Vec<CompileError>) {
        let mark = errors.len();
        match self.macros.get(&d.name).cloned() {
            None => {
                errors.push(CompileError::new(d.line, format!("Macro '{}' does not exist.", d.name)));
            }
            Some(mac) => {
                if d.arg_exprs.len() != mac.arg_names.len() {
                    errors.push(CompileError::new(
                        d.line,
                        format!(
                            "Macro '{}' takes {} argument(s), {} given.",
                            d.name,
                            mac.arg_names.len(),
                            d.arg_exprs.len()
                        ),
                    ));
                } else {
                    // Argument names must not shadow live variables; on any
                    // collision nothing is bound and the body is skipped.
                    let mut collided = false;
                    for name in &mac.arg_names {
                        if self.vars.contains_key(name) {
                            errors.push(CompileError::new(
                                d.line,
                                format!("Macro argument '{name}' collides with an existing variable."),
                            ));
                            collided = true;
                        }
                    }
                    if !collided {
                        let mut bound = Vec::with_capacity(mac.arg_names.len());
                        let mut ok = true;
                        for (name, arg_expr) in mac.arg_names.iter().zip(&d.arg_exprs) {
                            match self.apply_vars(d.line, arg_expr, true, errors) {
                                Some(v) => bound.push((name.clone(), v)),
                                None => {
                                    errors.push(CompileError::new(
                                        d.line,
                                        format!("Macro argument '{name}' could not be declared."),
                                    ));
                                    ok = false;
                                    break;
                                }
                            }
                        }
                        if ok {
                            for (name, value) in &bound {
                                self.vars.insert(name.clone(), value.clone());
                            }
                            self.descend(mac.block, options, errors);
                            for (name, _) in &bound {
                                self.vars.remove(name);
                            }
                        }
                    }
                }
            }
        }
        if errors.len() > mark {
            errors.insert(mark, CompileError::new(d.line, format!(">> in macro '{}'", d.name)));
        }
    }

    #[cfg(test)]
    pub(crate) fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn set_raw_var(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }
}

/// Expands `{UNI_XXXX}` escapes into their characters. Invalid code points are
/// reported and the escape text kept, so the problem stays visible in output.
pub(crate) fn convert_unicode_vars(line: usize, s: &str, errors: &mut Vec<CompileError>) -> String {
    let re = regex!(r"\{UNI_([0-9A-Fa-f]+)\}");
    re.replace_all(s, |caps: &regex::Captures<'_>| {
        match u32::from_str_radix(&caps[1], 16).ok().and_then(char::from_u32) {
            Some(c) => c.to_string(),
            None => {
                errors.push(CompileError::new(
                    line,
                    format!("'{}' is not a valid unicode code point.", &caps[0]),
                ));
                caps[0].to_string()
            }
        }
    })
    .into_owned()
}
