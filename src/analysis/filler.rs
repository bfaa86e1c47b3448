//! Filler (whitespace/comment) rule synthesis and insertion.
//!
//! When a grammar declares `%whitespace` or `%comment`, a `_filler`
//! rule is synthesized and an application of it is inlined in front of
//! every literal-like match in non-token rules. Token rules, and the
//! filler rules themselves, are left alone.

use crate::ast::{Node, NodeKind, NodeValue};
use crate::grammar::Grammar;

pub const FILLER: &str = "_filler";
pub const WHITESPACE: &str = "_whitespace";
pub const COMMENT: &str = "_comment";

/// Install the `_whitespace` / `_comment` / `_filler` rules from the
/// pragma bodies. No-op when neither pragma is present.
pub fn add_filler_rules(g: &mut Grammar) {
    if g.whitespace.is_none() && g.comment.is_none() {
        return;
    }
    if let Some(ws) = g.whitespace.clone() {
        g.rules.insert(WHITESPACE.to_string(), ws);
        g.tokens.insert(WHITESPACE.to_string());
    }
    if let Some(c) = g.comment.clone() {
        g.rules.insert(COMMENT.to_string(), c);
        g.tokens.insert(COMMENT.to_string());
    }

    // When both sub-grammars are plain regexps the filler fuses into a
    // single regexp; otherwise it is a star over the alternation.
    let ws_re = g.whitespace.as_ref().and_then(as_regexp);
    let c_re = g.comment.as_ref().and_then(as_regexp);
    let filler = match (&g.whitespace, &g.comment) {
        (Some(_), Some(_)) => match (ws_re, c_re) {
            (Some(w), Some(c)) => Node::regexp(format!("(({w})|({c}))*")),
            _ => Node::star(Node::choice(vec![
                Node::apply(WHITESPACE),
                Node::apply(COMMENT),
            ])),
        },
        (Some(_), None) => match ws_re {
            Some(w) => Node::regexp(format!("({w})*")),
            None => Node::star(Node::apply(WHITESPACE)),
        },
        (None, Some(_)) => match c_re {
            Some(c) => Node::regexp(format!("({c})*")),
            None => Node::star(Node::apply(COMMENT)),
        },
        (None, None) => unreachable!(),
    };
    g.rules
        .insert(FILLER.to_string(), Node::choice(vec![filler]));
    g.tokens.insert(FILLER.to_string());
}

/// The body, if it is a single regexp (possibly wrapped in the
/// parser's choice/seq shell).
fn as_regexp(node: &Node) -> Option<String> {
    match node.kind {
        NodeKind::Regexp => Some(node.name().to_string()),
        NodeKind::Choice | NodeKind::Seq | NodeKind::Paren if node.ch.len() == 1 => {
            as_regexp(&node.ch[0])
        }
        _ => None,
    }
}

/// Expand the token set to everything reachable from a token rule.
pub fn collect_tokens(g: &mut Grammar) {
    let mut work: Vec<String> = g.tokens.iter().cloned().collect();
    while let Some(name) = work.pop() {
        let Some(body) = g.rules.get(&name) else {
            continue;
        };
        let mut reached = Vec::new();
        collect_applies(body, &mut reached);
        for r in reached {
            if r != "any" && r != "end" && g.tokens.insert(r.clone()) {
                work.push(r);
            }
        }
    }
}

fn collect_applies(node: &Node, out: &mut Vec<String>) {
    if node.kind == NodeKind::Apply {
        out.push(node.name().to_string());
    }
    for c in &node.ch {
        collect_applies(c, out);
    }
}

/// Inline `_filler` applications into every non-token rule.
pub fn insert_filler(g: &mut Grammar) {
    if !g.rules.contains_key(FILLER) {
        return;
    }
    collect_tokens(g);
    let names: Vec<String> = g.rules.keys().cloned().collect();
    for name in names {
        if g.tokens.contains(&name) || name.starts_with('_') {
            continue;
        }
        let body = g.rules.get_mut(&name).expect("rule body");
        let old = std::mem::replace(body, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
        *g.rules.get_mut(&name).expect("rule body") = add_filler_nodes(g, old);
    }
}

fn should_fill(g: &Grammar, node: &Node) -> bool {
    match node.kind {
        NodeKind::Lit
        | NodeKind::Range
        | NodeKind::Set
        | NodeKind::Regexp
        | NodeKind::Unicat
        | NodeKind::Empty => true,
        NodeKind::Apply => {
            let name = node.name();
            if name == FILLER || name == WHITESPACE || name == COMMENT {
                false
            } else {
                name == "end" || g.tokens.contains(name)
            }
        }
        _ => false,
    }
}

fn add_filler_nodes(g: &Grammar, mut node: Node) -> Node {
    if node.kind == NodeKind::Seq {
        let mut children = Vec::with_capacity(node.ch.len() * 2);
        for c in node.ch {
            if should_fill(g, &c) {
                children.push(Node::apply(FILLER));
                children.push(c);
            } else {
                children.push(add_filler_nodes(g, c));
            }
        }
        node.ch = children;
        return node;
    }
    if should_fill(g, &node) {
        return Node::paren(Node::seq(vec![Node::apply(FILLER), node]));
    }
    node.ch = node
        .ch
        .into_iter()
        .map(|c| add_filler_nodes(g, c))
        .collect();
    node
}
