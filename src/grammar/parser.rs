//! The grammar front-end: parses Floyd grammar source into the raw
//! AST.
//!
//! This is a hand-written recursive-descent parser with PEG semantics:
//! every production backtracks on failure and the farthest failure
//! offset is kept for error reporting.
//!
//! The surface: `name = alt` rules, ordered choice (`|`), sequences by
//! juxtaposition, postfix `?` `*` `+` and counted `{n}`/`{m,n}`,
//! prefix `~` (not), `^` (not-one), `^.` (ends-in), grouping `(...)`,
//! run capture `<...>`, string literals with escapes, ranges
//! `'a'..'z'`, character classes `[...]`, regexes `/.../`, Unicode
//! categories `\p{Xx}`, actions (`-> expr`, `{ expr }`), predicates
//! (`?( expr )`, `?{ expr }`), literal-from-expression (`={ expr }`),
//! labels (`expr:name`), and the `%whitespace` `%comment` `%tokens`
//! `%externs` `%prec` `%assoc` pragmas.

use crate::ast::{Node, NodeKind, NodeValue, Span};
use crate::error::Error;
use crate::source::SourceText;

/// Characters allowed in `%prec`/`%assoc` operator tokens.
const OP_CHARS: &str = "!$%&*+-./:<=>?@\\^`|~";

/// Parse grammar source into a `rules` AST node.
pub fn parse(source: &str, path: &str) -> Result<Node, Error> {
    let mut p = GrammarParser::new(source);
    match p.rules() {
        Some(node) => Ok(node),
        None => {
            let src = SourceText::new(source);
            Err(Error::GrammarParse(crate::source::format_unexpected(
                &src, path, p.errpos, None,
            )))
        }
    }
}

struct GrammarParser {
    chars: Vec<char>,
    pos: usize,
    end: usize,
    errpos: usize,
}

impl GrammarParser {
    fn new(source: &str) -> GrammarParser {
        let chars: Vec<char> = source.chars().collect();
        let end = chars.len();
        GrammarParser {
            chars,
            pos: 0,
            end,
            errpos: 0,
        }
    }

    // ------------------------------------------------------------------
    // Primitives.
    // ------------------------------------------------------------------

    fn fail<T>(&mut self) -> Option<T> {
        if self.pos >= self.errpos {
            self.errpos = self.pos;
        }
        None
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn ch(&mut self, want: char) -> Option<char> {
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Some(c)
            }
            _ => self.fail(),
        }
    }

    fn tok(&mut self, s: &str) -> Option<()> {
        let start = self.pos;
        for want in s.chars() {
            if self.ch(want).is_none() {
                self.pos = start;
                return None;
            }
        }
        Some(())
    }

    fn in_range(&mut self, lo: char, hi: char) -> Option<char> {
        match self.peek() {
            Some(c) if c >= lo && c <= hi => {
                self.pos += 1;
                Some(c)
            }
            _ => self.fail(),
        }
    }

    fn span(&self, start: usize) -> Span {
        Span::new(start, self.pos)
    }

    // ------------------------------------------------------------------
    // Whitespace and comments.
    // ------------------------------------------------------------------

    fn ws1(&mut self) -> Option<()> {
        match self.peek() {
            Some(' ' | '\t' | '\r' | '\n') => {
                self.pos += 1;
                Some(())
            }
            Some('/') => self.comment(),
            _ => self.fail(),
        }
    }

    fn comment(&mut self) -> Option<()> {
        if self.tok("//").is_some() {
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.pos += 1;
            }
            return Some(());
        }
        let start = self.pos;
        if self.tok("/*").is_some() {
            while self.pos < self.end {
                if self.tok("*/").is_some() {
                    return Some(());
                }
                self.pos += 1;
            }
            self.fail::<()>();
            self.pos = start;
            return None;
        }
        self.fail()
    }

    fn sp(&mut self) {
        while self.ws1().is_some() {}
    }

    // ------------------------------------------------------------------
    // Lexical pieces.
    // ------------------------------------------------------------------

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.pos += 1,
            _ => return self.fail(),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn digits(&mut self) -> Option<String> {
        let start = self.pos;
        while self.in_range('0', '9').is_some() {}
        if self.pos == start {
            return self.fail();
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn lit(&mut self) -> Option<String> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return self.fail(),
        };
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    self.fail::<()>();
                    self.pos = start;
                    return None;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Some(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.esc_char() {
                        Some(c) => out.push(c),
                        None => {
                            self.pos = start;
                            return None;
                        }
                    }
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
    }

    fn esc_char(&mut self) -> Option<char> {
        match self.advance() {
            Some('b') => Some('\u{0008}'),
            Some('f') => Some('\u{000c}'),
            Some('n') => Some('\n'),
            Some('r') => Some('\r'),
            Some('t') => Some('\t'),
            Some('v') => Some('\u{000b}'),
            Some('\'') => Some('\''),
            Some('"') => Some('"'),
            Some('\\') => Some('\\'),
            Some('x') => self.hex_escape(2),
            Some('u') => self.hex_escape(4),
            Some('U') => self.hex_escape(8),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                self.fail()
            }
        }
    }

    fn hex_escape(&mut self, n: usize) -> Option<char> {
        let start = self.pos;
        let mut v: u32 = 0;
        for _ in 0..n {
            let c = match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => c,
                _ => {
                    self.fail::<()>();
                    self.pos = start;
                    return None;
                }
            };
            self.pos += 1;
            v = v * 16 + c.to_digit(16).unwrap();
        }
        match char::from_u32(v) {
            Some(c) => Some(c),
            None => {
                self.pos = start;
                self.fail()
            }
        }
    }

    // ------------------------------------------------------------------
    // Grammar structure.
    // ------------------------------------------------------------------

    fn rules(&mut self) -> Option<Node> {
        let start = self.pos;
        let mut ch = Vec::new();
        loop {
            self.sp();
            let item = if self.peek() == Some('%') {
                self.pragma()
            } else {
                self.rule()
            };
            match item {
                Some(n) => ch.push(n),
                None => break,
            }
        }
        self.sp();
        if self.pos != self.end {
            return self.fail();
        }
        Some(Node::new(
            NodeKind::Rules,
            NodeValue::Null,
            ch,
            self.span(start),
        ))
    }

    fn rule(&mut self) -> Option<Node> {
        let start = self.pos;
        let name = self.ident()?;
        self.sp();
        if self.ch('=').is_none() {
            self.pos = start;
            return None;
        }
        self.sp();
        let body = match self.choice() {
            Some(c) => c,
            None => {
                self.pos = start;
                return None;
            }
        };
        let p = self.pos;
        self.sp();
        if self.ch(',').is_none() {
            self.pos = p;
        }
        Some(Node::new(
            NodeKind::Rule,
            NodeValue::Str(name),
            vec![body],
            self.span(start),
        ))
    }

    fn choice(&mut self) -> Option<Node> {
        let start = self.pos;
        let first = self.seq()?;
        let mut alts = vec![first];
        loop {
            let p = self.pos;
            self.sp();
            if self.ch('|').is_some() {
                self.sp();
                if let Some(s) = self.seq() {
                    alts.push(s);
                    continue;
                }
            }
            self.pos = p;
            break;
        }
        Some(Node::new(
            NodeKind::Choice,
            NodeValue::Null,
            alts,
            self.span(start),
        ))
    }

    fn seq(&mut self) -> Option<Node> {
        let start = self.pos;
        let Some(first) = self.expr() else {
            // The empty alternative, e.g. `a = 'x' |`.
            return Some(Node::new(
                NodeKind::Empty,
                NodeValue::Null,
                vec![],
                self.span(start),
            ));
        };
        let mut items = vec![first];
        loop {
            let p = self.pos;
            if self.ws1().is_some() {
                self.sp();
                if let Some(e) = self.expr() {
                    items.push(e);
                    continue;
                }
            }
            self.pos = p;
            break;
        }
        Some(Node::new(
            NodeKind::Seq,
            NodeValue::Null,
            items,
            self.span(start),
        ))
    }

    fn expr(&mut self) -> Option<Node> {
        let start = self.pos;
        let e = self.post_expr()?;
        let p = self.pos;
        if self.ch(':').is_some() {
            if let Some(name) = self.label_name() {
                return Some(Node::new(
                    NodeKind::Label,
                    NodeValue::Str(name),
                    vec![e],
                    self.span(start),
                ));
            }
            self.pos = p;
        }
        Some(e)
    }

    fn label_name(&mut self) -> Option<String> {
        if self.ch('$').is_some() {
            let ds = self.digits()?;
            return Some(format!("${ds}"));
        }
        self.ident()
    }

    fn post_expr(&mut self) -> Option<Node> {
        let start = self.pos;
        let e = self.prim_expr()?;
        match self.peek() {
            Some('?') if self.peek_at(1) != Some('(') && self.peek_at(1) != Some('{') => {
                self.pos += 1;
                Some(Node::new(
                    NodeKind::Opt,
                    NodeValue::Null,
                    vec![e],
                    self.span(start),
                ))
            }
            Some('*') => {
                self.pos += 1;
                Some(Node::new(
                    NodeKind::Star,
                    NodeValue::Null,
                    vec![e],
                    self.span(start),
                ))
            }
            Some('+') => {
                self.pos += 1;
                Some(Node::new(
                    NodeKind::Plus,
                    NodeValue::Null,
                    vec![e],
                    self.span(start),
                ))
            }
            Some('{') => match self.count_suffix() {
                Some((min, max)) => Some(Node::new(
                    NodeKind::Count,
                    NodeValue::Count(min, max),
                    vec![e],
                    self.span(start),
                )),
                None => Some(e),
            },
            _ => Some(e),
        }
    }

    fn count_suffix(&mut self) -> Option<(usize, usize)> {
        let start = self.pos;
        self.ch('{')?;
        self.sp();
        let Some(min_s) = self.digits() else {
            self.pos = start;
            return None;
        };
        self.sp();
        let max_s = if self.ch(',').is_some() {
            self.sp();
            match self.digits() {
                Some(ds) => ds,
                None => {
                    self.pos = start;
                    return None;
                }
            }
        } else {
            min_s.clone()
        };
        self.sp();
        if self.ch('}').is_none() {
            self.pos = start;
            return None;
        }
        let min = min_s.parse::<usize>().ok()?;
        let max = max_s.parse::<usize>().ok()?;
        Some((min, max))
    }

    fn prim_expr(&mut self) -> Option<Node> {
        let start = self.pos;

        // Range before bare literal so `'a'..'z'` wins.
        if let Some(node) = self.range_expr() {
            return Some(node);
        }
        if let Some(s) = self.lit() {
            return Some(Node::new(
                NodeKind::Lit,
                NodeValue::Str(s),
                vec![],
                self.span(start),
            ));
        }
        if self.tok("\\p{").is_some() {
            let cat = match self.ident() {
                Some(c) => c,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            if self.ch('}').is_none() {
                self.pos = start;
                return None;
            }
            return Some(Node::new(
                NodeKind::Unicat,
                NodeValue::Str(cat),
                vec![],
                self.span(start),
            ));
        }
        if self.peek() == Some('[') {
            return self.set_expr();
        }
        if self.peek() == Some('/') && self.peek_at(1) != Some('/') && self.peek_at(1) != Some('*') {
            return self.regexp_expr();
        }
        if self.tok("->").is_some() {
            self.sp();
            let e = match self.ll_expr() {
                Some(e) => e,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            return Some(Node::new(
                NodeKind::Action,
                NodeValue::Null,
                vec![e],
                self.span(start),
            ));
        }
        if self.tok("?(").is_some() {
            return self.bracketed(start, NodeKind::Pred, ')');
        }
        if self.tok("?{").is_some() {
            return self.bracketed(start, NodeKind::Pred, '}');
        }
        if self.tok("={").is_some() {
            return self.bracketed(start, NodeKind::Equals, '}');
        }
        if self.peek() == Some('{') {
            self.pos += 1;
            return self.bracketed(start, NodeKind::Action, '}');
        }
        if self.ch('~').is_some() {
            let e = match self.prim_expr() {
                Some(e) => e,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            return Some(Node::new(
                NodeKind::Not,
                NodeValue::Null,
                vec![e],
                self.span(start),
            ));
        }
        if self.tok("^.").is_some() {
            let e = match self.prim_expr() {
                Some(e) => e,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            return Some(Node::new(
                NodeKind::EndsIn,
                NodeValue::Null,
                vec![e],
                self.span(start),
            ));
        }
        if self.ch('^').is_some() {
            let e = match self.prim_expr() {
                Some(e) => e,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            return Some(Node::new(
                NodeKind::NotOne,
                NodeValue::Null,
                vec![e],
                self.span(start),
            ));
        }
        if self.ch('(').is_some() {
            self.sp();
            let c = match self.choice() {
                Some(c) => c,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            self.sp();
            if self.ch(')').is_none() {
                self.pos = start;
                return None;
            }
            return Some(Node::new(
                NodeKind::Paren,
                NodeValue::Null,
                vec![c],
                self.span(start),
            ));
        }
        if self.ch('<').is_some() {
            self.sp();
            let c = match self.choice() {
                Some(c) => c,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            self.sp();
            if self.ch('>').is_none() {
                self.pos = start;
                return None;
            }
            return Some(Node::new(
                NodeKind::Run,
                NodeValue::Null,
                vec![c],
                self.span(start),
            ));
        }
        if let Some(name) = self.ident() {
            // An identifier followed by `=` is the next rule's name.
            let p = self.pos;
            self.sp();
            if self.ch('=').is_some() {
                self.pos = start;
                return self.fail();
            }
            self.pos = p;
            return Some(Node::new(
                NodeKind::Apply,
                NodeValue::Str(name),
                vec![],
                self.span(start),
            ));
        }
        self.fail()
    }

    /// Shared tail for `?( e )`, `?{ e }`, `={ e }`, and `{ e }`.
    fn bracketed(&mut self, start: usize, kind: NodeKind, close: char) -> Option<Node> {
        self.sp();
        let e = match self.ll_expr() {
            Some(e) => e,
            None => {
                self.pos = start;
                return None;
            }
        };
        self.sp();
        if self.ch(close).is_none() {
            self.pos = start;
            return None;
        }
        Some(Node::new(kind, NodeValue::Null, vec![e], self.span(start)))
    }

    fn range_expr(&mut self) -> Option<Node> {
        let start = self.pos;
        let lo = self.lit()?;
        let p = self.pos;
        self.sp();
        if self.tok("..").is_none() {
            self.pos = start;
            return None;
        }
        self.sp();
        let hi = match self.lit() {
            Some(s) => s,
            None => {
                self.pos = start;
                return None;
            }
        };
        if lo.chars().count() != 1 || hi.chars().count() != 1 {
            self.pos = p;
            self.fail::<()>();
            self.pos = start;
            return None;
        }
        Some(Node::new(
            NodeKind::Range,
            NodeValue::Pair(lo, hi),
            vec![],
            self.span(start),
        ))
    }

    fn set_expr(&mut self) -> Option<Node> {
        let start = self.pos;
        self.ch('[')?;
        let mut pat = String::new();
        loop {
            match self.peek() {
                None => {
                    self.fail::<()>();
                    self.pos = start;
                    return None;
                }
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    pat.push('\\');
                    self.pos += 1;
                    match self.advance() {
                        Some(c) => pat.push(c),
                        None => {
                            self.fail::<()>();
                            self.pos = start;
                            return None;
                        }
                    }
                }
                Some(c) => {
                    pat.push(c);
                    self.pos += 1;
                }
            }
        }
        if pat.is_empty() {
            self.pos = start;
            return self.fail();
        }
        Some(Node::new(
            NodeKind::Set,
            NodeValue::Str(pat),
            vec![],
            self.span(start),
        ))
    }

    fn regexp_expr(&mut self) -> Option<Node> {
        let start = self.pos;
        self.ch('/')?;
        let mut pat = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.fail::<()>();
                    self.pos = start;
                    return None;
                }
                Some('/') => {
                    self.pos += 1;
                    break;
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.advance() {
                        Some('/') => pat.push('/'),
                        Some(c) => {
                            pat.push('\\');
                            pat.push(c);
                        }
                        None => {
                            self.fail::<()>();
                            self.pos = start;
                            return None;
                        }
                    }
                }
                Some(c) => {
                    pat.push(c);
                    self.pos += 1;
                }
            }
        }
        if pat.is_empty() {
            self.pos = start;
            return self.fail();
        }
        Some(Node::new(
            NodeKind::Regexp,
            NodeValue::Str(pat),
            vec![],
            self.span(start),
        ))
    }

    // ------------------------------------------------------------------
    // Pragmas.
    // ------------------------------------------------------------------

    fn pragma(&mut self) -> Option<Node> {
        let start = self.pos;
        self.ch('%')?;
        let Some(name) = self.ident() else {
            self.pos = start;
            return None;
        };
        let node = match name.as_str() {
            "whitespace" | "comment" => {
                self.sp();
                if self.ch('=').is_none() {
                    self.pos = start;
                    return None;
                }
                self.sp();
                let body = match self.choice() {
                    Some(c) => c,
                    None => {
                        self.pos = start;
                        return None;
                    }
                };
                Node::new(
                    NodeKind::Pragma,
                    NodeValue::Str(format!("%{name}")),
                    vec![body],
                    self.span(start),
                )
            }
            "tokens" => {
                self.line_sp();
                if self.ch('=').is_none() {
                    self.pos = start;
                    return None;
                }
                self.line_sp();
                let mut ch = Vec::new();
                let Some(first) = self.ident() else {
                    self.pos = start;
                    return None;
                };
                ch.push(Node::apply(first));
                // The token list stays on the pragma's line.
                loop {
                    let p = self.pos;
                    if self.line_sp() {
                        if let Some(tok) = self.ident() {
                            ch.push(Node::apply(tok));
                            continue;
                        }
                    }
                    self.pos = p;
                    break;
                }
                Node::new(
                    NodeKind::Pragma,
                    NodeValue::Str("%tokens".into()),
                    ch,
                    self.span(start),
                )
            }
            "externs" => {
                self.sp();
                if self.ch('=').is_none() {
                    self.pos = start;
                    return None;
                }
                let mut ch = Vec::new();
                loop {
                    self.sp();
                    let Some(decl) = self.extern_decl() else {
                        self.pos = start;
                        return None;
                    };
                    ch.push(decl);
                    let p = self.pos;
                    self.sp();
                    if self.ch('|').is_none() {
                        self.pos = p;
                        break;
                    }
                }
                Node::new(
                    NodeKind::Pragma,
                    NodeValue::Str("%externs".into()),
                    ch,
                    self.span(start),
                )
            }
            "prec" => {
                let mut ch = Vec::new();
                loop {
                    let p = self.pos;
                    // Operators stay on the pragma's line.
                    if !self.line_sp() {
                        self.pos = p;
                        break;
                    }
                    match self.op_word() {
                        Some(op) => ch.push(Node::lit(op)),
                        None => {
                            self.pos = p;
                            break;
                        }
                    }
                }
                if ch.is_empty() {
                    // Leave errpos pointing at the bad operator token.
                    return None;
                }
                Node::new(
                    NodeKind::Pragma,
                    NodeValue::Str("%prec".into()),
                    ch,
                    self.span(start),
                )
            }
            "assoc" => {
                if !self.line_sp() {
                    self.pos = start;
                    return None;
                }
                let Some(op) = self.op_word().or_else(|| self.hash_name()) else {
                    return None;
                };
                if !self.line_sp() {
                    self.pos = start;
                    return None;
                }
                let dir = match self.ident() {
                    Some(d) if d == "left" || d == "right" => d,
                    _ => {
                        self.pos = start;
                        return self.fail();
                    }
                };
                Node::new(
                    NodeKind::Pragma,
                    NodeValue::Str("%assoc".into()),
                    vec![Node::lit(op), Node::lit(dir)],
                    self.span(start),
                )
            }
            _ => {
                self.pos = start;
                return self.fail();
            }
        };
        Some(node)
    }

    /// Space or tab only; keeps pragma arguments on one line.
    fn line_sp(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn op_word(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if OP_CHARS.contains(c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return self.fail();
        }
        Some(self.chars[start..self.pos].iter().collect())
    }

    /// An identifier with an optional `#N` suffix, for `%assoc` on
    /// generated left-recursion names like `expr#1`.
    fn hash_name(&mut self) -> Option<String> {
        let mut name = self.ident()?;
        if self.ch('#').is_some() {
            match self.digits() {
                Some(ds) => {
                    name.push('#');
                    name.push_str(&ds);
                }
                None => {
                    self.pos -= 1;
                }
            }
        }
        Some(name)
    }

    fn extern_decl(&mut self) -> Option<Node> {
        let start = self.pos;
        let name = self.ident()?;
        self.sp();
        if self.tok("->").is_none() {
            self.pos = start;
            return None;
        }
        self.sp();
        let default = match self.ll_expr() {
            Some(e) => e,
            None => {
                self.pos = start;
                return None;
            }
        };
        Some(Node::new(
            NodeKind::Seq,
            NodeValue::Null,
            vec![
                Node::apply(name),
                Node::new(
                    NodeKind::Action,
                    NodeValue::Null,
                    vec![default],
                    Span::default(),
                ),
            ],
            self.span(start),
        ))
    }

    // ------------------------------------------------------------------
    // Host expressions.
    // ------------------------------------------------------------------

    fn ll_expr(&mut self) -> Option<Node> {
        let start = self.pos;
        if self.ch('!').is_some() {
            self.sp();
            let e = match self.ll_expr() {
                Some(e) => e,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            return Some(Node::new(
                NodeKind::ENot,
                NodeValue::Null,
                vec![e],
                self.span(start),
            ));
        }
        let left = self.ll_qual()?;
        let p = self.pos;
        self.sp();
        let kind = match self.peek() {
            Some('+') => Some(NodeKind::EPlus),
            Some('-') => Some(NodeKind::EMinus),
            _ => None,
        };
        if let Some(kind) = kind {
            self.pos += 1;
            self.sp();
            if let Some(right) = self.ll_expr() {
                return Some(Node::new(
                    kind,
                    NodeValue::Null,
                    vec![left, right],
                    self.span(start),
                ));
            }
        }
        self.pos = p;
        Some(left)
    }

    fn ll_exprs(&mut self) -> Vec<Node> {
        let mut out = Vec::new();
        let Some(first) = self.ll_expr() else {
            return out;
        };
        out.push(first);
        loop {
            let p = self.pos;
            self.sp();
            if self.ch(',').is_some() {
                self.sp();
                if let Some(e) = self.ll_expr() {
                    out.push(e);
                    continue;
                }
            }
            self.pos = p;
            break;
        }
        out
    }

    fn ll_qual(&mut self) -> Option<Node> {
        let start = self.pos;
        let prim = self.ll_prim()?;
        let mut posts = Vec::new();
        loop {
            let p = self.pos;
            match self.peek() {
                Some('[') => {
                    self.pos += 1;
                    self.sp();
                    let idx = match self.ll_expr() {
                        Some(e) => e,
                        None => {
                            self.pos = p;
                            break;
                        }
                    };
                    self.sp();
                    if self.ch(']').is_none() {
                        self.pos = p;
                        break;
                    }
                    posts.push(Node::new(
                        NodeKind::EGetitem,
                        NodeValue::Null,
                        vec![idx],
                        self.span(p),
                    ));
                }
                Some('(') => {
                    self.pos += 1;
                    self.sp();
                    let args = self.ll_exprs();
                    self.sp();
                    if self.ch(')').is_none() {
                        self.pos = p;
                        break;
                    }
                    posts.push(Node::new(
                        NodeKind::ECall,
                        NodeValue::Null,
                        args,
                        self.span(p),
                    ));
                }
                Some('.') => {
                    self.pos += 1;
                    let name = match self.ident() {
                        Some(n) => n,
                        None => {
                            self.pos = p;
                            break;
                        }
                    };
                    posts.push(Node::new(
                        NodeKind::EGetitem,
                        NodeValue::Null,
                        vec![Node::new(
                            NodeKind::ELit,
                            NodeValue::Str(name),
                            vec![],
                            self.span(p),
                        )],
                        self.span(p),
                    ));
                }
                _ => break,
            }
        }
        if posts.is_empty() {
            return Some(prim);
        }
        let mut ch = vec![prim];
        ch.extend(posts);
        Some(Node::new(
            NodeKind::EQual,
            NodeValue::Null,
            ch,
            self.span(start),
        ))
    }

    fn ll_prim(&mut self) -> Option<Node> {
        let start = self.pos;
        if let Some(name) = self.ll_ident() {
            let kind = match name.as_str() {
                "true" | "false" | "null" | "Infinity" | "NaN" => NodeKind::EConst,
                _ => NodeKind::EIdent,
            };
            return Some(Node::new(
                kind,
                NodeValue::Str(name),
                vec![],
                self.span(start),
            ));
        }
        if let Some(text) = self.ll_num() {
            return Some(Node::new(
                NodeKind::ENum,
                NodeValue::Str(text),
                vec![],
                self.span(start),
            ));
        }
        if let Some(s) = self.lit() {
            return Some(Node::new(
                NodeKind::ELit,
                NodeValue::Str(s),
                vec![],
                self.span(start),
            ));
        }
        if self.ch('(').is_some() {
            self.sp();
            let e = match self.ll_expr() {
                Some(e) => e,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            self.sp();
            if self.ch(')').is_none() {
                self.pos = start;
                return None;
            }
            return Some(Node::new(
                NodeKind::EParen,
                NodeValue::Null,
                vec![e],
                self.span(start),
            ));
        }
        if self.ch('[').is_some() {
            self.sp();
            let items = self.ll_exprs();
            self.sp();
            if self.ch(']').is_none() {
                self.pos = start;
                return None;
            }
            return Some(Node::new(
                NodeKind::EArr,
                NodeValue::Null,
                items,
                self.span(start),
            ));
        }
        self.fail()
    }

    fn ll_ident(&mut self) -> Option<String> {
        if self.ch('$').is_some() {
            match self.digits() {
                Some(ds) => return Some(format!("${ds}")),
                None => {
                    self.pos -= 1;
                    return self.fail();
                }
            }
        }
        self.ident()
    }

    fn ll_num(&mut self) -> Option<String> {
        let start = self.pos;
        let _ = self.ch('-');
        if self.tok("0x").is_some() {
            let mut any = false;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.pos += 1;
                any = true;
            }
            if !any {
                self.pos = start;
                return self.fail();
            }
            return Some(self.chars[start..self.pos].iter().collect());
        }
        if self.digits().is_none() {
            self.pos = start;
            return None;
        }
        let p = self.pos;
        if self.ch('.').is_some() {
            if self.digits().is_none() {
                self.pos = p;
            }
        }
        let p = self.pos;
        if matches!(self.peek(), Some('e' | 'E')) {
            self.pos += 1;
            let _ = self.ch('+').or_else(|| self.ch('-'));
            if self.digits().is_none() {
                self.pos = p;
            }
        }
        Some(self.chars[start..self.pos].iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(grammar: &str) -> Node {
        parse(grammar, "<string>").expect("grammar should parse")
    }

    fn err(grammar: &str) -> String {
        match parse(grammar, "<string>") {
            Ok(_) => panic!("grammar unexpectedly parsed"),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_parse_simple_rule() {
        let ast = ok("grammar = 'foo' 'bar'");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"grammar\" (choice (seq (lit \"foo\") (lit \"bar\")))))"
        );
    }

    #[test]
    fn test_parse_choice_and_postfix() {
        let ast = ok("g = 'a'* | 'b'+ | 'c'?");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (star (lit \"a\"))) \
             (seq (plus (lit \"b\"))) (seq (opt (lit \"c\"))))))"
        );
    }

    #[test]
    fn test_parse_count() {
        let ast = ok("g = 'a'{2,3}");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (count 2,3 (lit \"a\"))))))"
        );
        let ast = ok("g = 'a'{2}");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (count 2,2 (lit \"a\"))))))"
        );
    }

    #[test]
    fn test_parse_range_and_set_and_regexp() {
        let ast = ok("g = 'a'..'z' [xyz] /fo+/");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (range \"a\"..\"z\") \
             (set \"xyz\") (regexp \"fo+\")))))"
        );
    }

    #[test]
    fn test_parse_unicat() {
        let ast = ok("g = \\p{Lu}");
        assert_eq!(ast.repr(), "(rules (rule \"g\" (choice (seq (unicat \"Lu\")))))");
    }

    #[test]
    fn test_parse_lookahead_forms() {
        let ast = ok("g = ~'a' ^'b' ^.'c'");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (not (lit \"a\")) \
             (notone (lit \"b\")) (endsin (lit \"c\"))))))"
        );
    }

    #[test]
    fn test_parse_action_forms() {
        let ast = ok("g = end -> true");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (apply \"end\") (action (econst \"true\"))))))"
        );
        let ast = ok("g = end { true }");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (apply \"end\") (action (econst \"true\"))))))"
        );
    }

    #[test]
    fn test_parse_pred_and_equals() {
        let ast = ok("g = ?(true) ={ x } end");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (pred (econst \"true\")) \
             (equals (eident \"x\")) (apply \"end\")))))"
        );
    }

    #[test]
    fn test_parse_label_and_run() {
        let ast = ok("g = <'a' 'b'>:v -> v");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (label \"v\" (run (choice \
             (seq (lit \"a\") (lit \"b\"))))) (action (eident \"v\"))))))"
        );
    }

    #[test]
    fn test_parse_host_expressions() {
        let ast = ok("g = -> [1, 'a'][0] + f(x) - 0x10");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (action (eplus (equal \
             (earr (enum \"1\") (elit \"a\")) (egetitem (enum \"0\"))) \
             (eminus (equal (eident \"f\") (ecall (eident \"x\"))) (enum \"0x10\"))))))))"
        );
    }

    #[test]
    fn test_parse_getattr_sugar() {
        let ast = ok("g = -> d.key");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (action (equal (eident \"d\") \
             (egetitem (elit \"key\"))))))))"
        );
    }

    #[test]
    fn test_parse_positional_var() {
        let ast = ok("g = 'a' -> $1");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (lit \"a\") (action (eident \"$1\"))))))"
        );
    }

    #[test]
    fn test_parse_pragmas() {
        let ast = ok("%whitespace = ' '\n%tokens = foo bar\ng = foo\nfoo = 'x'\nbar = 'y'");
        assert!(ast.repr().starts_with(
            "(rules (pragma \"%whitespace\" (choice (seq (lit \" \")))) \
             (pragma \"%tokens\" (apply \"foo\") (apply \"bar\"))"
        ));
    }

    #[test]
    fn test_parse_prec_and_assoc_pragmas() {
        let ast = ok("%prec + -\n%prec ^\n%assoc ^ right\ng = 'x'");
        assert!(ast.repr().contains("(pragma \"%prec\" (lit \"+\") (lit \"-\"))"));
        assert!(ast.repr().contains("(pragma \"%assoc\" (lit \"^\") (lit \"right\"))"));
    }

    #[test]
    fn test_parse_assoc_hash_name() {
        let ast = ok("%assoc grammar#1 right\ngrammar = 'x'");
        assert!(ast.repr().contains("(pragma \"%assoc\" (lit \"grammar#1\") (lit \"right\"))"));
    }

    #[test]
    fn test_parse_externs_pragma() {
        let ast = ok("%externs = a -> false | f -> func\ng = 'x'");
        assert!(ast.repr().contains(
            "(pragma \"%externs\" (seq (apply \"a\") (action (econst \"false\"))) \
             (seq (apply \"f\") (action (eident \"func\"))))"
        ));
    }

    #[test]
    fn test_unterminated_literal_error() {
        assert_eq!(
            err("grammar = '"),
            "<string>:1 Unexpected end of input at column 12"
        );
    }

    #[test]
    fn test_prec_rejects_identifier_operators() {
        let msg = err("\n%prec a\nexpr = 'x'");
        assert_eq!(msg, "<string>:2 Unexpected \"a\" at column 7");
    }

    #[test]
    fn test_comments_are_skipped() {
        let ast = ok("// leading\ng = /* inline */ 'a'");
        assert_eq!(ast.repr(), "(rules (rule \"g\" (choice (seq (lit \"a\")))))");
    }

    #[test]
    fn test_trailing_comma_after_rule() {
        let ast = ok("g = end -> true,");
        assert!(ast.repr().contains("(apply \"end\")"));
    }

    #[test]
    fn test_escapes_in_literals() {
        let ast = ok("g = '\\n' \"\\x41\" '\\u0042'");
        assert_eq!(
            ast.repr(),
            "(rules (rule \"g\" (choice (seq (lit \"\\n\") (lit \"A\") (lit \"B\")))))"
        );
    }
}
