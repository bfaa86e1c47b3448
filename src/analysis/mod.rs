//! The semantic analyzer: a fixed chain of passes that turns the raw
//! AST into an executable grammar.
//!
//! Pass order: pragma collection, filler-rule synthesis, static
//! checks (with positional-label materialization and identifier
//! classification), qualifier rewriting, scope insertion, recursion
//! rewriting, filler insertion, single-child collapsing, rule
//! wrapping, `can_fail` propagation, host-expression type checking,
//! and feature-flag computation.

pub mod filler;
pub mod recursion;
pub mod types;

use std::collections::HashSet;

use log::debug;

use crate::ast::{IdentKind, Node, NodeKind, NodeValue};
use crate::error::Error;
use crate::functions::{self, BuiltinKind};
use crate::grammar::{Assoc, ExternKind, ExternSig, Grammar};
use crate::value::Value;

/// Analyze a parsed grammar AST.
pub fn analyze(ast: Node) -> Result<Grammar, Error> {
    let (mut g, pragmas) = Grammar::new(ast);
    let mut errors = Vec::new();

    if g.starting_rule.is_empty() {
        return Err(Error::Analysis(vec!["No rules were defined".to_string()]));
    }
    let user_rules: Vec<String> = g.rules.keys().cloned().collect();

    collect_pragmas(&mut g, pragmas, &mut errors);
    filler::add_filler_rules(&mut g);
    run_checks(&mut g, &user_rules, &mut errors);
    if !errors.is_empty() {
        return Err(Error::Analysis(errors));
    }
    debug!("analysis checks passed ({} rules)", g.rules.len());

    for name in &user_rules {
        map_rule(&mut g, name, rewrite_quals);
    }
    rewrite_scopes(&mut g);
    recursion::rewrite(&mut g);
    filler::insert_filler(&mut g);
    rewrite_singles(&mut g);
    wrap_rules(&mut g);

    let names: Vec<String> = g.rules.keys().cloned().collect();
    for name in &names {
        g.set_can_fail(name);
    }

    type_check(&mut g, &mut errors);
    set_flags(&mut g, &mut errors);
    if !errors.is_empty() {
        return Err(Error::Analysis(errors));
    }
    debug!(
        "analysis complete: leftrec={} operators={} filler={}",
        g.leftrec_needed,
        g.operator_needed,
        g.rules.contains_key(filler::FILLER)
    );
    Ok(g)
}

fn map_rule(g: &mut Grammar, name: &str, f: fn(Node) -> Node) {
    if let Some(slot) = g.rules.get_mut(name) {
        let body = std::mem::replace(slot, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
        *g.rules.get_mut(name).expect("rule slot") = f(body);
    }
}

// ----------------------------------------------------------------------
// Pragma collection.
// ----------------------------------------------------------------------

fn collect_pragmas(g: &mut Grammar, pragmas: Vec<Node>, errors: &mut Vec<String>) {
    let mut current_prec = 0i64;
    for pragma in pragmas {
        match pragma.name() {
            "%whitespace" => g.whitespace = Some(pragma.ch.into_iter().next().expect("pragma body")),
            "%comment" => g.comment = Some(pragma.ch.into_iter().next().expect("pragma body")),
            "%tokens" => {
                for t in &pragma.ch {
                    let name = t.name().to_string();
                    if !g.rules.contains_key(&name) {
                        errors.push(format!("Unknown token rule \"{name}\""));
                    }
                    g.tokens.insert(name);
                }
            }
            "%externs" => {
                for decl in &pragma.ch {
                    let name = decl.ch[0].name().to_string();
                    let default = decl.ch[1].child();
                    match extern_sig(default) {
                        Some(sig) => {
                            g.externs.insert(name, sig);
                        }
                        None => errors.push(format!(
                            "Bad value for extern \"{name}\""
                        )),
                    }
                }
            }
            "%prec" => {
                // Each %prec line declares a tighter-binding class
                // than the one before it.
                for op in &pragma.ch {
                    g.prec.insert(op.name().to_string(), current_prec);
                }
                current_prec += 2;
            }
            "%assoc" => {
                let op = pragma.ch[0].name().to_string();
                let dir = match pragma.ch[1].name() {
                    "right" => Assoc::Right,
                    _ => Assoc::Left,
                };
                g.assoc.insert(op, dir);
            }
            other => errors.push(format!("Unknown pragma \"{other}\"")),
        }
    }
}

fn extern_sig(default: &Node) -> Option<ExternSig> {
    match default.kind {
        NodeKind::EIdent if default.name() == "func" => Some(ExternSig {
            kind: ExternKind::Func,
            default: Value::Null,
        }),
        NodeKind::EIdent if default.name() == "pfunc" => Some(ExternSig {
            kind: ExternKind::PFunc,
            default: Value::Null,
        }),
        NodeKind::EConst => {
            let v = match default.name() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::Null,
                "Infinity" => Value::Float(f64::INFINITY),
                _ => Value::Float(f64::NAN),
            };
            Some(ExternSig { kind: ExternKind::Const, default: v })
        }
        NodeKind::ENum => {
            let text = default.name();
            let v = if text.contains('.') || (!text.contains("0x") && text.contains(['e', 'E'])) {
                Value::Float(text.parse().ok()?)
            } else if let Some(hex) = text.strip_prefix("0x") {
                Value::Int(i64::from_str_radix(hex, 16).ok()?)
            } else {
                Value::Int(text.parse().ok()?)
            };
            Some(ExternSig { kind: ExternKind::Const, default: v })
        }
        NodeKind::ELit => Some(ExternSig {
            kind: ExternKind::Const,
            default: Value::from(default.name()),
        }),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Static checks.
// ----------------------------------------------------------------------

fn run_checks(g: &mut Grammar, user_rules: &[String], errors: &mut Vec<String>) {
    for name in user_rules {
        if name.starts_with('_') {
            errors.push(format!(
                "Illegal rule name \"{name}\": names starting with an \"_\" are reserved"
            ));
        }
    }
    let rule_names: HashSet<String> = g.rules.keys().cloned().collect();
    for name in user_rules {
        let Some(slot) = g.rules.get_mut(name) else {
            continue;
        };
        let mut body = std::mem::replace(slot, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
        check_unknown_rules(&body, &rule_names, errors);
        check_unknown_functions(&body, g, errors);
        check_positional_vars(&mut body, errors);
        let mut vars = NamedVars {
            g: &mut *g,
            rule: name,
            errors: &mut *errors,
            frames: Vec::new(),
        };
        vars.walk(&mut body);
        *g.rules.get_mut(name).expect("rule slot") = body;
    }
}

fn check_unknown_rules(node: &Node, rules: &HashSet<String>, errors: &mut Vec<String>) {
    if node.kind == NodeKind::Apply {
        let name = node.name();
        if !rules.contains(name) && name != "any" && name != "end" {
            errors.push(format!("Unknown rule \"{name}\""));
        }
    }
    for c in &node.ch {
        check_unknown_rules(c, rules, errors);
    }
}

fn check_unknown_functions(node: &Node, g: &Grammar, errors: &mut Vec<String>) {
    if node.kind == NodeKind::EQual
        && node.ch.len() >= 2
        && node.ch[1].kind == NodeKind::ECall
        && node.ch[0].kind == NodeKind::EIdent
    {
        let name = node.ch[0].name();
        if !functions::is_builtin(name) && !g.externs.contains_key(name) {
            errors.push(format!("Unknown function \"{name}\" called"));
        }
    }
    for c in &node.ch {
        check_unknown_functions(c, g, errors);
    }
}

/// Reject explicit `$k` definitions and forward references, then
/// materialize label nodes for the positional vars each sequence
/// actually uses.
fn check_positional_vars(node: &mut Node, errors: &mut Vec<String>) {
    if node.kind != NodeKind::Seq {
        for c in &mut node.ch {
            check_positional_vars(c, errors);
        }
        return;
    }
    let mut labels_needed = HashSet::new();
    for (i, c) in node.ch.iter_mut().enumerate() {
        let index = i + 1;
        match c.kind {
            NodeKind::Label => {
                if c.name().starts_with('$') {
                    errors.push(format!(
                        "\"{}\" is a reserved variable name and cannot be explicitly defined",
                        c.name()
                    ));
                }
                check_positional_vars(c.child_mut(), errors);
            }
            NodeKind::Action | NodeKind::Equals | NodeKind::Pred => {
                check_positional_refs(c.child(), index, &mut labels_needed, errors);
            }
            _ => check_positional_vars(c, errors),
        }
    }
    for (i, c) in node.ch.iter_mut().enumerate() {
        let name = format!("${}", i + 1);
        if labels_needed.contains(&name) {
            let inner = std::mem::replace(c, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
            *c = Node::label(name, inner);
        }
    }
}

fn check_positional_refs(
    node: &Node,
    current_index: usize,
    labels_needed: &mut HashSet<String>,
    errors: &mut Vec<String>,
) {
    if node.kind == NodeKind::EIdent && node.name().starts_with('$') {
        let num: usize = node.name()[1..].parse().unwrap_or(0);
        if num >= current_index {
            errors.push(format!(
                "Variable \"{}\" referenced before it was available",
                node.name()
            ));
        } else {
            labels_needed.insert(node.name().to_string());
        }
    }
    // Skip over callee names; they are functions, not labels.
    let start = if node.kind == NodeKind::EQual
        && node.ch.len() >= 2
        && node.ch[1].kind == NodeKind::ECall
    {
        1
    } else {
        0
    };
    for c in node.ch.iter().skip(start) {
        check_positional_refs(c, current_index, labels_needed, errors);
    }
}

/// Classifies every `e_ident`, detects outer-scope label references,
/// and rejects unknown or unused variables.
struct NamedVars<'a> {
    g: &'a mut Grammar,
    rule: &'a str,
    errors: &'a mut Vec<String>,
    /// One frame per enclosing sequence: label name -> referenced?
    frames: Vec<Vec<(String, bool)>>,
}

impl NamedVars<'_> {
    fn walk(&mut self, node: &mut Node) {
        match node.kind {
            NodeKind::Seq => {
                self.frames.push(Vec::new());
                for c in &mut node.ch {
                    if c.kind == NodeKind::Label && !c.name().starts_with('$') {
                        let name = c.name().to_string();
                        self.frames.last_mut().expect("frame").push((name, false));
                        self.walk(c.child_mut());
                    } else {
                        self.walk(c);
                    }
                }
                let frame = self.frames.pop().expect("frame");
                for (name, used) in frame {
                    if !used {
                        self.errors.push(format!("Variable \"{name}\" never used"));
                    }
                }
            }
            NodeKind::EIdent => self.classify(node),
            NodeKind::EQual
                if node.ch.len() >= 2 && node.ch[1].kind == NodeKind::ECall =>
            {
                // The callee resolves as a function or extern, never
                // as a label.
                let name = node.ch[0].name();
                if functions::is_builtin(name) {
                    node.ch[0].attrs.ident_kind = Some(IdentKind::Function);
                } else if self.g.externs.contains_key(name) {
                    node.ch[0].attrs.ident_kind = Some(IdentKind::Extern);
                }
                for c in node.ch.iter_mut().skip(1) {
                    self.walk(c);
                }
            }
            _ => {
                for c in &mut node.ch {
                    self.walk(c);
                }
            }
        }
    }

    fn classify(&mut self, node: &mut Node) {
        let name = node.name().to_string();
        if name.starts_with('$') {
            node.attrs.ident_kind = Some(IdentKind::Local);
            return;
        }
        let depth = self.frames.len();
        for (level, frame) in self.frames.iter_mut().enumerate().rev() {
            if let Some(entry) = frame.iter_mut().rev().find(|(n, _)| *n == name) {
                entry.1 = true;
                if level + 1 == depth {
                    node.attrs.ident_kind = Some(IdentKind::Local);
                } else {
                    node.attrs.ident_kind = Some(IdentKind::Outer);
                    node.attrs.outer_scope = true;
                    self.g.lookup_needed = true;
                    self.g.outer_scope_rules.insert(self.rule.to_string());
                }
                return;
            }
        }
        if self.g.externs.contains_key(&name) {
            node.attrs.ident_kind = Some(IdentKind::Extern);
            return;
        }
        if functions::is_builtin(&name) {
            node.attrs.ident_kind = Some(IdentKind::Function);
            return;
        }
        self.errors
            .push(format!("Unknown variable \"{name}\" referenced"));
    }
}

// ----------------------------------------------------------------------
// Tree rewrites.
// ----------------------------------------------------------------------

/// Fold `e_qual` chains into the infix call/index forms the
/// interpreter executes.
fn rewrite_quals(mut node: Node) -> Node {
    node.ch = node.ch.into_iter().map(rewrite_quals).collect();
    if node.kind != NodeKind::EQual {
        return node;
    }
    let mut it = node.ch.into_iter();
    let mut acc = it.next().expect("qual head");
    for post in it {
        acc = match post.kind {
            NodeKind::ECall => {
                let mut ch = vec![acc];
                ch.extend(post.ch);
                Node::synth(NodeKind::ECallInfix, NodeValue::Null, ch)
            }
            NodeKind::EGetitem => {
                let mut ch = vec![acc];
                ch.extend(post.ch);
                Node::synth(NodeKind::EGetitemInfix, NodeValue::Null, ch)
            }
            other => unreachable!("unexpected qualifier {other:?}"),
        };
    }
    acc
}

/// Wrap label-bearing sequences in `scope` nodes for rules whose
/// labels are referenced from nested sequences.
fn rewrite_scopes(g: &mut Grammar) {
    let names: Vec<String> = g.outer_scope_rules.iter().cloned().collect();
    for name in names {
        map_rule(g, &name, scope_node);
    }
}

fn scope_node(mut node: Node) -> Node {
    node.ch = node.ch.into_iter().map(scope_node).collect();
    if node.kind == NodeKind::Seq && node.ch.iter().any(|c| c.kind == NodeKind::Label) {
        return Node::scope(node);
    }
    node
}

/// Replace single-child `choice`/`seq` nodes by their child.
fn rewrite_singles(g: &mut Grammar) {
    let names: Vec<String> = g.rules.keys().cloned().collect();
    for name in names {
        map_rule(g, &name, single_node);
    }
}

fn single_node(mut node: Node) -> Node {
    if matches!(node.kind, NodeKind::Choice | NodeKind::Seq) && node.ch.len() == 1 {
        return single_node(node.ch.remove(0));
    }
    node.ch = node.ch.into_iter().map(single_node).collect();
    node
}

/// Wrap every rule body in a `rule_wrapper` carrying the rule name;
/// the interpreter keeps a rule stack off these for diagnostics and
/// the recursion ceiling.
fn wrap_rules(g: &mut Grammar) {
    let names: Vec<String> = g.rules.keys().cloned().collect();
    for name in names {
        let slot = g.rules.get_mut(&name).expect("rule body");
        let body = std::mem::replace(slot, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
        *g.rules.get_mut(&name).expect("rule body") = Node::rule_wrapper(name.clone(), body);
    }
}

// ----------------------------------------------------------------------
// Type checking and feature flags.
// ----------------------------------------------------------------------

fn type_check(g: &mut Grammar, errors: &mut Vec<String>) {
    let names: Vec<String> = g.rules.keys().cloned().collect();
    for name in names {
        let Some(slot) = g.rules.get_mut(&name) else {
            continue;
        };
        let mut body = std::mem::replace(slot, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
        type_check_node(&mut body, errors);
        *g.rules.get_mut(&name).expect("rule slot") = body;
    }
}

fn type_check_node(node: &mut Node, errors: &mut Vec<String>) {
    match node.kind {
        NodeKind::Action | NodeKind::Pred | NodeKind::Equals => {
            types::infer(node.child_mut(), errors);
        }
        _ => {
            for c in &mut node.ch {
                type_check_node(c, errors);
            }
        }
    }
}

fn set_flags(g: &mut Grammar, errors: &mut Vec<String>) {
    for op in ["error", "fail", "offsets", "rewind", "succeed"] {
        g.needed_operators.insert(op.to_string());
    }
    let names: Vec<String> = g.rules.keys().cloned().collect();
    let mut bodies: Vec<Node> = Vec::with_capacity(names.len());
    for name in &names {
        bodies.push(g.rules[name].clone());
    }
    for body in &bodies {
        flag_node(g, body);
    }
    g.seeds_needed = g.leftrec_needed || g.operator_needed;
    g.unicodedata_needed = g.unicat_needed
        || g.needed_builtin_functions.contains("ucategory")
        || g.needed_builtin_functions.contains("ulookup")
        || g.needed_builtin_functions.contains("uname");

    for name in g.needed_builtin_functions.clone() {
        if let Some(b) = functions::lookup(&name) {
            if b.kind == BuiltinKind::Unsupported {
                errors.push(format!("Unsupported function \"{name}\""));
            }
        }
    }
}

fn flag_node(g: &mut Grammar, node: &Node) {
    match node.kind {
        NodeKind::Regexp | NodeKind::Set => {
            g.re_needed = true;
            g.needed_operators.insert("regexp".to_string());
        }
        NodeKind::Unicat => {
            g.unicat_needed = true;
            g.needed_operators.insert("unicat".to_string());
        }
        NodeKind::Range => {
            g.needed_operators.insert("range".to_string());
        }
        NodeKind::Lit => {
            g.needed_operators.insert("ch".to_string());
            if node.name().chars().count() > 1 {
                g.needed_operators.insert("str".to_string());
            }
        }
        NodeKind::Equals => {
            g.needed_operators.insert("ch".to_string());
            g.needed_operators.insert("str".to_string());
        }
        NodeKind::Leftrec => {
            g.needed_operators.insert("leftrec".to_string());
        }
        NodeKind::Operator => {
            g.needed_operators.insert("operator".to_string());
        }
        NodeKind::Apply => {
            let name = node.name();
            if name == "any" || name == "end" {
                g.needed_builtin_rules.insert(name.to_string());
            }
        }
        NodeKind::EndsIn | NodeKind::NotOne => {
            g.needed_builtin_rules.insert("any".to_string());
        }
        NodeKind::EIdent => {
            if node.attrs.ident_kind == Some(IdentKind::Function) {
                g.needed_builtin_functions.insert(node.name().to_string());
            }
        }
        _ => {}
    }
    if g.lookup_needed {
        g.needed_operators.insert("lookup".to_string());
    }
    for c in &node.ch {
        flag_node(g, c);
    }
}
