//! Left-recursion detection and operator-rule rewriting.
//!
//! Left-recursive choices are wrapped in `leftrec` nodes (named
//! `rule#i`) so the interpreter can drive them through the seeded
//! fixed-point algorithm. Rules shaped like precedence climbs (every
//! non-final alternative `head OP head [action]` with OP declared via
//! `%prec`) are rewritten into `operator` nodes with static
//! precedence tables instead.

use crate::ast::{Node, NodeKind, NodeValue};
use crate::grammar::{Assoc, Grammar, OperatorTable};

/// Rewrite all rules, in declaration order.
pub fn rewrite(g: &mut Grammar) {
    let names: Vec<String> = g.rules.keys().cloned().collect();
    for name in &names {
        if name.starts_with('_') {
            continue;
        }
        if let Some(op_node) = check_operator(g, name) {
            g.operator_needed = true;
            g.rules[name] = op_node;
            continue;
        }
        rewrite_leftrec(g, name);
    }
    g.seeds_needed = g.leftrec_needed || g.operator_needed;
}

fn rewrite_leftrec(g: &mut Grammar, name: &str) {
    let body = g.rules.get(name).expect("rule body").clone();
    debug_assert_eq!(body.kind, NodeKind::Choice);
    let mut choices = body.ch;
    for (i, choice) in choices.iter_mut().enumerate() {
        let mut seen = std::collections::HashSet::new();
        let has_lr = check_lr(name, choice, g, &mut seen) == Some(true);
        if !has_lr {
            continue;
        }
        g.leftrec_rules.extend(seen);
        g.leftrec_needed = true;
        let node_name = format!("{name}#{}", i + 1);
        let left = g.assoc.get(&node_name).copied().unwrap_or(Assoc::Left) == Assoc::Left;
        let inner = std::mem::replace(choice, Node::synth(NodeKind::Empty, NodeValue::Null, vec![]));
        let mut wrapped = Node::leftrec(node_name, inner);
        wrapped.attrs.left_assoc = left;
        *choice = wrapped;
    }
    *g.rules.get_mut(name).expect("rule body") = Node::choice(choices);
}

/// Does this node left-recurse back into `rule_name`?
///
/// `Some(true)`: yes. `Some(false)`: no, and the node consumes input
/// (so nothing after it can be in leftmost position). `None`: no, and
/// the node may match empty.
fn check_lr(
    rule_name: &str,
    node: &Node,
    g: &Grammar,
    seen: &mut std::collections::HashSet<String>,
) -> Option<bool> {
    use NodeKind::*;
    match node.kind {
        Apply => {
            let name = node.name();
            if name == rule_name {
                seen.insert(name.to_string());
                return Some(true);
            }
            if name == "any" || name == "end" {
                return Some(false);
            }
            if seen.contains(name) {
                // Left recursion on some other rule; not ours.
                return Some(false);
            }
            seen.insert(name.to_string());
            match g.rules.get(name) {
                Some(body) => check_lr(rule_name, body, g, seen),
                None => Some(false),
            }
        }
        Lit | EndsIn | NotOne | Plus | Unicat => Some(false),
        Seq => {
            for c in &node.ch {
                if c.kind == Lit {
                    return Some(false);
                }
                let r = check_lr(rule_name, c, g, seen);
                if r.is_some() {
                    return r;
                }
            }
            Some(false)
        }
        Choice => {
            for c in &node.ch {
                let r = check_lr(rule_name, c, g, seen);
                if r.is_some() {
                    return r;
                }
            }
            None
        }
        Opt | Star => None,
        Count | Label | Not | Paren | Run | Scope => {
            check_lr(rule_name, &node.ch[0], g, seen)
        }
        _ => Some(false),
    }
}

/// If the rule is operator-shaped, build its `operator` node and
/// precedence tables.
fn check_operator(g: &mut Grammar, name: &str) -> Option<Node> {
    let body = g.rules.get(name)?.clone();
    debug_assert_eq!(body.kind, NodeKind::Choice);
    let choices = &body.ch;
    if choices.len() < 2 {
        return None;
    }

    let mut table = OperatorTable::default();
    let mut op_children = Vec::new();
    for choice in &choices[..choices.len() - 1] {
        let (seq, _scoped) = match choice.kind {
            NodeKind::Scope => (choice.child(), true),
            _ => (choice, false),
        };
        if seq.kind != NodeKind::Seq || !(seq.ch.len() == 3 || seq.ch.len() == 4) {
            return None;
        }
        if !is_head_operand(&seq.ch[0], name, "$1") {
            return None;
        }
        if seq.ch[1].kind != NodeKind::Lit {
            return None;
        }
        let op = seq.ch[1].name().to_string();
        let Some(&prec) = g.prec.get(&op) else {
            return None;
        };
        if !is_head_operand(&seq.ch[2], name, "$3") {
            return None;
        }
        if seq.ch.len() == 4 && seq.ch[3].kind != NodeKind::Action {
            return None;
        }

        table.prec_ops.entry(prec).or_default().push(op.clone());
        if g.assoc.get(&op) == Some(&Assoc::Right) {
            table.rassoc.insert(op.clone());
        }
        table.choices.insert(op, op_children.len());
        op_children.push(choice.clone());
    }

    let last = choices.last().expect("final operand alternative");
    if last.ch.len() != 1 {
        return None;
    }

    g.operators.insert(name.to_string(), table);
    let operator = Node::synth(
        NodeKind::Operator,
        NodeValue::Str(name.to_string()),
        op_children,
    );
    Some(Node::choice(vec![operator, last.clone()]))
}

/// `expr` or `expr:$k` where expr applies the rule itself.
fn is_head_operand(node: &Node, rule_name: &str, label: &str) -> bool {
    match node.kind {
        NodeKind::Apply => node.name() == rule_name,
        NodeKind::Label => {
            node.name() == label
                && node.child().kind == NodeKind::Apply
                && node.child().name() == rule_name
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parser;

    fn grammar_for(src: &str) -> Grammar {
        let ast = parser::parse(src, "<test>").unwrap();
        Grammar::new(ast).0
    }

    #[test]
    fn test_direct_left_recursion_is_wrapped() {
        let mut g = grammar_for("g = g '+' 'a' | 'a'");
        rewrite(&mut g);
        let body = &g.rules["g"];
        assert_eq!(body.ch[0].kind, NodeKind::Leftrec);
        assert_eq!(body.ch[0].name(), "g#1");
        assert!(body.ch[0].attrs.left_assoc);
        assert_eq!(body.ch[1].kind, NodeKind::Seq);
        assert!(g.leftrec_needed && g.seeds_needed);
    }

    #[test]
    fn test_indirect_left_recursion_is_wrapped() {
        let mut g = grammar_for("g = b '+' 'a' | 'a'\nb = g");
        rewrite(&mut g);
        assert_eq!(g.rules["g"].ch[0].kind, NodeKind::Leftrec);
        assert!(g.leftrec_rules.contains("b"));
    }

    #[test]
    fn test_right_recursion_is_not_wrapped() {
        let mut g = grammar_for("g = 'a' '+' g | 'a'");
        rewrite(&mut g);
        assert_eq!(g.rules["g"].ch[0].kind, NodeKind::Seq);
        assert!(!g.leftrec_needed);
    }

    #[test]
    fn test_assoc_pragma_controls_blocking() {
        let mut g = grammar_for("g = g 'a' | 'a'");
        g.assoc.insert("g#1".to_string(), Assoc::Right);
        rewrite(&mut g);
        assert!(!g.rules["g"].ch[0].attrs.left_assoc);
    }

    #[test]
    fn test_operator_rule_is_rewritten() {
        let mut g = grammar_for(
            "expr = expr '+' expr | expr '*' expr | '0'..'9'",
        );
        g.prec.insert("+".to_string(), 0);
        g.prec.insert("*".to_string(), 2);
        rewrite(&mut g);
        let body = &g.rules["expr"];
        assert_eq!(body.ch[0].kind, NodeKind::Operator);
        assert_eq!(body.ch.len(), 2);
        let table = &g.operators["expr"];
        assert_eq!(table.prec_ops[&0], vec!["+".to_string()]);
        assert_eq!(table.prec_ops[&2], vec!["*".to_string()]);
        assert!(g.operator_needed && g.seeds_needed);
    }

    #[test]
    fn test_undeclared_operator_stays_leftrec() {
        // No %prec for '+', so this is plain left recursion.
        let mut g = grammar_for("expr = expr '+' expr | '0'..'9'");
        rewrite(&mut g);
        assert_eq!(g.rules["expr"].ch[0].kind, NodeKind::Leftrec);
    }
}
