//! The uniform AST used by every stage of the pipeline.
//!
//! Every node is a tagged record `{kind, v, ch, span, attrs}`. The
//! grammar front-end produces the raw tree; analysis passes mutate the
//! tree in place (rewriting children and filling in `attrs`); the
//! interpreter walks it read-only.

/// A half-open span of code-point offsets into the grammar source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // Structural.
    Rules,
    Rule,
    Pragma,
    Seq,
    Choice,
    Empty,
    Paren,
    Apply,
    Action,
    Pred,
    Equals,
    Label,
    Scope,
    Operator,
    Leftrec,
    RuleWrapper,

    // Matching.
    Any,
    End,
    Lit,
    Range,
    Set,
    Regexp,
    Unicat,
    Run,
    Opt,
    Star,
    Plus,
    Count,
    Not,
    NotOne,
    EndsIn,

    // Host expressions.
    EConst,
    ENum,
    ELit,
    EIdent,
    EArr,
    EParen,
    EGetitem,
    EGetitemInfix,
    ECall,
    ECallInfix,
    EPlus,
    EMinus,
    ENot,
    EQual,
}

/// The node value, interpreted per kind: a string (literal text,
/// identifier, rule name, pattern), a pair of strings (range
/// endpoints), a numeric pair (count bounds), or nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Null,
    Str(String),
    Pair(String, String),
    Count(usize, usize),
}

impl NodeValue {
    /// The string payload; panics if this node kind carries none.
    pub fn as_str(&self) -> &str {
        match self {
            NodeValue::Str(s) => s,
            _ => panic!("node value is not a string: {self:?}"),
        }
    }
}

/// How an `e_ident` resolves, decided during analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    /// Bound by a label in the innermost scope.
    Local,
    /// Bound by a label in an enclosing scope.
    Outer,
    /// Declared via `%externs`.
    Extern,
    /// A built-in function.
    Function,
}

/// Mutable analysis attributes. Populated over the course of the pass
/// chain; the front-end leaves everything defaulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeAttrs {
    /// Can executing this node ever set the failure flag?
    pub can_fail: Option<bool>,
    /// Resolution class for `e_ident` nodes.
    pub ident_kind: Option<IdentKind>,
    /// Set on labels and identifiers that cross a sequence boundary.
    pub outer_scope: bool,
    /// Associativity for `leftrec` nodes (true = left).
    pub left_assoc: bool,
    /// Inferred host-expression type, as a type-descriptor string.
    pub ty: Option<String>,
}

/// A single AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub v: NodeValue,
    pub ch: Vec<Node>,
    pub span: Span,
    pub attrs: NodeAttrs,
}

impl Node {
    pub fn new(kind: NodeKind, v: NodeValue, ch: Vec<Node>, span: Span) -> Node {
        Node {
            kind,
            v,
            ch,
            span,
            attrs: NodeAttrs {
                left_assoc: true,
                ..NodeAttrs::default()
            },
        }
    }

    /// A node synthesized by an analysis pass; carries no source span.
    pub fn synth(kind: NodeKind, v: NodeValue, ch: Vec<Node>) -> Node {
        Node::new(kind, v, ch, Span::default())
    }

    pub fn apply(rule_name: impl Into<String>) -> Node {
        Node::synth(NodeKind::Apply, NodeValue::Str(rule_name.into()), vec![])
    }

    pub fn lit(s: impl Into<String>) -> Node {
        Node::synth(NodeKind::Lit, NodeValue::Str(s.into()), vec![])
    }

    pub fn regexp(pattern: impl Into<String>) -> Node {
        Node::synth(NodeKind::Regexp, NodeValue::Str(pattern.into()), vec![])
    }

    pub fn seq(ch: Vec<Node>) -> Node {
        Node::synth(NodeKind::Seq, NodeValue::Null, ch)
    }

    pub fn choice(ch: Vec<Node>) -> Node {
        Node::synth(NodeKind::Choice, NodeValue::Null, ch)
    }

    pub fn star(child: Node) -> Node {
        Node::synth(NodeKind::Star, NodeValue::Null, vec![child])
    }

    pub fn paren(child: Node) -> Node {
        Node::synth(NodeKind::Paren, NodeValue::Null, vec![child])
    }

    pub fn scope(child: Node) -> Node {
        Node::synth(NodeKind::Scope, NodeValue::Null, vec![child])
    }

    pub fn label(name: impl Into<String>, child: Node) -> Node {
        Node::synth(NodeKind::Label, NodeValue::Str(name.into()), vec![child])
    }

    pub fn leftrec(name: impl Into<String>, child: Node) -> Node {
        Node::synth(NodeKind::Leftrec, NodeValue::Str(name.into()), vec![child])
    }

    pub fn rule_wrapper(name: impl Into<String>, child: Node) -> Node {
        Node::synth(
            NodeKind::RuleWrapper,
            NodeValue::Str(name.into()),
            vec![child],
        )
    }

    /// The single child of a one-child node.
    pub fn child(&self) -> &Node {
        debug_assert_eq!(self.ch.len(), 1);
        &self.ch[0]
    }

    pub fn child_mut(&mut self) -> &mut Node {
        debug_assert_eq!(self.ch.len(), 1);
        &mut self.ch[0]
    }

    /// The string value (rule name, literal text, identifier, ...).
    pub fn name(&self) -> &str {
        self.v.as_str()
    }

    /// True for the `e_*` host-expression kinds.
    pub fn is_expr(&self) -> bool {
        use NodeKind::*;
        matches!(
            self.kind,
            EConst
                | ENum
                | ELit
                | EIdent
                | EArr
                | EParen
                | EGetitem
                | EGetitemInfix
                | ECall
                | ECallInfix
                | EPlus
                | EMinus
                | ENot
                | EQual
        )
    }

    /// Compact s-expression rendering, for tests and debugging.
    pub fn repr(&self) -> String {
        let mut s = String::new();
        self.write_repr(&mut s);
        s
    }

    fn write_repr(&self, out: &mut String) {
        out.push('(');
        out.push_str(&format!("{:?}", self.kind).to_lowercase());
        match &self.v {
            NodeValue::Null => {}
            NodeValue::Str(v) => out.push_str(&format!(" {v:?}")),
            NodeValue::Pair(a, b) => out.push_str(&format!(" {a:?}..{b:?}")),
            NodeValue::Count(min, max) => out.push_str(&format!(" {min},{max}")),
        }
        for c in &self.ch {
            out.push(' ');
            c.write_repr(out);
        }
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr() {
        let n = Node::seq(vec![Node::lit("foo"), Node::apply("bar")]);
        assert_eq!(n.repr(), "(seq (lit \"foo\") (apply \"bar\"))");
    }

    #[test]
    fn test_child_accessor() {
        let n = Node::label("x", Node::lit("a"));
        assert_eq!(n.name(), "x");
        assert_eq!(n.child().kind, NodeKind::Lit);
    }
}
