//! Grammar metadata produced by analysis and consumed by the
//! interpreter (and, eventually, code generators).

pub mod parser;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;

use crate::ast::{Node, NodeKind};
use crate::value::Value;

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// The declared kind of an extern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternKind {
    /// A plain value.
    Const,
    /// A callable taking the evaluated arguments.
    Func,
    /// A callable that receives the parser as an implicit first
    /// argument.
    PFunc,
}

/// A declared extern: its kind plus the default value for `const`s.
#[derive(Debug, Clone)]
pub struct ExternSig {
    pub kind: ExternKind,
    pub default: Value,
}

/// Static precedence-climbing tables for one operator rule.
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    /// Precedence level -> operator literals at that level, in
    /// declaration order.
    pub prec_ops: BTreeMap<i64, Vec<String>>,
    /// Operator literals that are right-associative.
    pub rassoc: HashSet<String>,
    /// Operator literal -> index of the subrule (`operand OP operand`)
    /// among the `operator` node's children.
    pub choices: IndexMap<String, usize>,
}

/// An analyzed grammar: the rule map plus everything the passes
/// learned about it. Read-only during parsing and safely sharable
/// across parses.
#[derive(Debug, Clone)]
pub struct Grammar {
    /// Rule name -> body, in declaration order.
    pub rules: IndexMap<String, Node>,
    /// The first non-pragma rule.
    pub starting_rule: String,
    /// Rules that are tokens (transitive closure of `%tokens`).
    pub tokens: HashSet<String>,
    /// The `%whitespace` body, if declared.
    pub whitespace: Option<Node>,
    /// The `%comment` body, if declared.
    pub comment: Option<Node>,
    /// Operator or leftrec-name associativity from `%assoc`.
    pub assoc: HashMap<String, Assoc>,
    /// Operator literal -> precedence level from `%prec`.
    pub prec: HashMap<String, i64>,
    /// Declared externs, in declaration order.
    pub externs: IndexMap<String, ExternSig>,
    /// Rule name -> precedence tables for operator rules.
    pub operators: HashMap<String, OperatorTable>,
    /// Rules involved in left recursion.
    pub leftrec_rules: HashSet<String>,
    /// Rules whose labels are referenced from nested scopes.
    pub outer_scope_rules: HashSet<String>,

    // Capability flags driving what runtime state gets materialized.
    pub leftrec_needed: bool,
    pub operator_needed: bool,
    pub seeds_needed: bool,
    pub re_needed: bool,
    pub lookup_needed: bool,
    pub unicat_needed: bool,
    pub unicodedata_needed: bool,

    // Dependency sets for interpreter wiring and code generation.
    pub needed_builtin_functions: BTreeSet<String>,
    pub needed_builtin_rules: BTreeSet<String>,
    pub needed_operators: BTreeSet<String>,
}

impl Grammar {
    /// Split a parsed `rules` tree into the rule map and remember the
    /// starting rule. Pragmas are returned separately for the
    /// analyzer to drain.
    pub fn new(ast: Node) -> (Grammar, Vec<Node>) {
        debug_assert_eq!(ast.kind, NodeKind::Rules);
        let mut rules = IndexMap::new();
        let mut pragmas = Vec::new();
        let mut starting_rule = String::new();
        for node in ast.ch {
            match node.kind {
                NodeKind::Pragma => pragmas.push(node),
                NodeKind::Rule => {
                    if starting_rule.is_empty() {
                        starting_rule = node.name().to_string();
                    }
                    let name = node.name().to_string();
                    let mut ch = node.ch;
                    rules.insert(name, ch.remove(0));
                }
                _ => unreachable!("unexpected top-level node {:?}", node.kind),
            }
        }
        let g = Grammar {
            rules,
            starting_rule,
            tokens: HashSet::new(),
            whitespace: None,
            comment: None,
            assoc: HashMap::new(),
            prec: HashMap::new(),
            externs: IndexMap::new(),
            operators: HashMap::new(),
            leftrec_rules: HashSet::new(),
            outer_scope_rules: HashSet::new(),
            leftrec_needed: false,
            operator_needed: false,
            seeds_needed: false,
            re_needed: false,
            lookup_needed: false,
            unicat_needed: false,
            unicodedata_needed: false,
            needed_builtin_functions: BTreeSet::new(),
            needed_builtin_rules: BTreeSet::new(),
            needed_operators: BTreeSet::new(),
        };
        (g, pragmas)
    }

    /// Is this rule name an operator rule?
    pub fn is_operator_rule(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Compute and store `can_fail` for `node` and everything under
    /// it. Rule applications recurse into the rule map; re-entry into
    /// a rule currently being computed is treated as fallible.
    pub fn set_can_fail(&mut self, rule_name: &str) {
        let mut visiting = HashSet::new();
        self.can_fail_rule(rule_name, &mut visiting);
    }

    fn can_fail_node(&mut self, node: &mut Node, visiting: &mut HashSet<String>) -> bool {
        if let Some(flag) = node.attrs.can_fail {
            return flag;
        }
        let flag = self.can_fail_of(node, visiting);
        node.attrs.can_fail = Some(flag);
        flag
    }

    fn can_fail_of(&mut self, node: &mut Node, visiting: &mut HashSet<String>) -> bool {
        use NodeKind::*;
        match node.kind {
            Action | Empty | Opt | Star => {
                for c in &mut node.ch {
                    self.can_fail_node(c, visiting);
                }
                false
            }
            Apply => {
                let name = node.name().to_string();
                if name == "any" || name == "end" {
                    return true;
                }
                self.can_fail_rule(&name, visiting)
            }
            Label | Paren | Run | RuleWrapper | Scope => {
                self.can_fail_node(node.child_mut(), visiting)
            }
            Count => {
                self.can_fail_node(node.child_mut(), visiting);
                match node.v {
                    crate::ast::NodeValue::Count(min, _) => min != 0,
                    _ => true,
                }
            }
            Leftrec | Operator => {
                for c in &mut node.ch {
                    self.can_fail_node(c, visiting);
                }
                true
            }
            Choice | Rules => {
                let mut all = true;
                for i in 0..node.ch.len() {
                    let mut c = std::mem::replace(&mut node.ch[i], Node::seq(vec![]));
                    let f = self.can_fail_node(&mut c, visiting);
                    node.ch[i] = c;
                    all = all && f;
                }
                all
            }
            Seq => {
                let mut any = false;
                for i in 0..node.ch.len() {
                    let mut c = std::mem::replace(&mut node.ch[i], Node::seq(vec![]));
                    let f = self.can_fail_node(&mut c, visiting);
                    node.ch[i] = c;
                    any = any || f;
                }
                any
            }
            _ => {
                // Matching primitives, predicates, and host
                // expressions all count as fallible.
                for i in 0..node.ch.len() {
                    let mut c = std::mem::replace(&mut node.ch[i], Node::seq(vec![]));
                    self.can_fail_node(&mut c, visiting);
                    node.ch[i] = c;
                }
                true
            }
        }
    }

    fn can_fail_rule(&mut self, name: &str, visiting: &mut HashSet<String>) -> bool {
        if visiting.contains(name) {
            return true;
        }
        // Swap the body out by value so the map's declaration order is
        // untouched while we recurse through it.
        let Some(slot) = self.rules.get_mut(name) else {
            return true;
        };
        let mut body = std::mem::replace(slot, Node::synth(NodeKind::Empty, crate::ast::NodeValue::Null, vec![]));
        visiting.insert(name.to_string());
        let flag = self.can_fail_node(&mut body, visiting);
        visiting.remove(name);
        *self.rules.get_mut(name).expect("rule slot") = body;
        flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeValue;

    fn rules_node(rules: Vec<(&str, Node)>) -> Node {
        Node::synth(
            NodeKind::Rules,
            NodeValue::Null,
            rules
                .into_iter()
                .map(|(name, body)| {
                    Node::synth(NodeKind::Rule, NodeValue::Str(name.into()), vec![body])
                })
                .collect(),
        )
    }

    #[test]
    fn test_split_rules_and_pragmas() {
        let ast = Node::synth(
            NodeKind::Rules,
            NodeValue::Null,
            vec![
                Node::synth(
                    NodeKind::Pragma,
                    NodeValue::Str("%tokens".into()),
                    vec![Node::apply("foo")],
                ),
                Node::synth(
                    NodeKind::Rule,
                    NodeValue::Str("g".into()),
                    vec![Node::lit("x")],
                ),
            ],
        );
        let (g, pragmas) = Grammar::new(ast);
        assert_eq!(g.starting_rule, "g");
        assert_eq!(pragmas.len(), 1);
        assert!(g.rules.contains_key("g"));
    }

    #[test]
    fn test_can_fail_basics() {
        let ast = rules_node(vec![
            ("g", Node::seq(vec![Node::star(Node::lit("a"))])),
            ("h", Node::lit("b")),
        ]);
        let (mut g, _) = Grammar::new(ast);
        g.set_can_fail("g");
        g.set_can_fail("h");
        assert_eq!(g.rules["g"].attrs.can_fail, Some(false));
        assert_eq!(g.rules["h"].attrs.can_fail, Some(true));
    }

    #[test]
    fn test_can_fail_recursive_rule_terminates() {
        // g = 'x' g | 'y' -- right recursion must not loop forever.
        let body = Node::choice(vec![
            Node::seq(vec![Node::lit("x"), Node::apply("g")]),
            Node::lit("y"),
        ]);
        let (mut g, _) = Grammar::new(rules_node(vec![("g", body)]));
        g.set_can_fail("g");
        assert_eq!(g.rules["g"].attrs.can_fail, Some(true));
    }
}
