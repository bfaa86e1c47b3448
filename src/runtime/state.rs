//! Per-parse mutable state.
//!
//! A fresh `ParserState` is built for every `parse()` call. The
//! grammar and its AST are shared read-only; everything here is owned
//! by the single parse in flight.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use regex::Regex;

use crate::error::HostError;
use crate::source::SourceText;
use crate::value::Value;

use super::memo::{MemoCache, RuleIds, SeedTable};

/// A caller-supplied extern binding.
#[derive(Clone)]
pub enum ExternValue {
    /// A plain value (`const` externs).
    Value(Value),
    /// A callable taking the evaluated arguments.
    Func(Rc<dyn Fn(&[Value]) -> Result<Value, HostError>>),
    /// A callable that also receives a view of the parser.
    PFunc(Rc<dyn Fn(&ParserView, &[Value]) -> Result<Value, HostError>>),
}

impl std::fmt::Debug for ExternValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExternValue::Value(v) => write!(f, "Value({v:?})"),
            ExternValue::Func(_) => write!(f, "Func(..)"),
            ExternValue::PFunc(_) => write!(f, "PFunc(..)"),
        }
    }
}

/// The read-only view of the parser handed to `pfunc` externs.
pub struct ParserView<'a> {
    pub path: &'a str,
    pub pos: usize,
    src: &'a SourceText,
}

impl ParserView<'_> {
    /// 1-based line number at the current position.
    pub fn lineno(&self) -> usize {
        self.src.line_col(self.pos).0
    }

    /// 1-based column at the current position.
    pub fn colno(&self) -> usize {
        self.src.line_col(self.pos).1
    }

    /// The input text between two code-point offsets.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        self.src.slice(start, end)
    }
}

/// Per-rule working state for the precedence climber.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpFrame {
    pub current_depth: usize,
    pub current_prec: i64,
}

/// All mutable state for one parse.
pub struct ParserState {
    pub src: SourceText,
    pub path: String,
    pub pos: usize,
    pub end: usize,
    pub val: Value,
    pub failed: bool,
    pub errpos: usize,
    pub errstr: Option<String>,
    /// Stack of label-binding frames.
    pub scopes: Vec<HashMap<String, Value>>,
    pub cache: MemoCache,
    pub seeds: SeedTable,
    pub rule_ids: RuleIds,
    /// Left-associative leftrec rules blocked from re-entry.
    pub blocked: HashSet<String>,
    /// Precedence-climber frames, keyed by operator rule name.
    pub op_frames: HashMap<String, OpFrame>,
    /// Compiled regexes, keyed by anchored pattern.
    pub regexps: HashMap<String, Regex>,
    pub externs: HashMap<String, ExternValue>,
    /// (start pos, rule name) for every rule application in flight.
    pub rule_stack: Vec<(usize, String)>,
    pub max_depth: usize,
}

impl ParserState {
    pub fn new(
        text: &str,
        path: &str,
        externs: HashMap<String, ExternValue>,
        max_depth: usize,
    ) -> ParserState {
        let src = SourceText::new(text);
        let end = src.len();
        ParserState {
            src,
            path: path.to_string(),
            pos: 0,
            end,
            val: Value::Null,
            failed: false,
            errpos: 0,
            errstr: None,
            scopes: vec![HashMap::new()],
            cache: MemoCache::default(),
            seeds: SeedTable::default(),
            rule_ids: RuleIds::default(),
            blocked: HashSet::new(),
            op_frames: HashMap::new(),
            regexps: HashMap::new(),
            externs,
            rule_stack: Vec::new(),
            max_depth,
        }
    }

    pub fn succeed(&mut self, val: Value) {
        self.val = val;
        self.failed = false;
        self.errstr = None;
    }

    pub fn succeed_at(&mut self, val: Value, newpos: usize) {
        self.succeed(val);
        self.pos = newpos;
    }

    /// Succeed without touching the current value; used by `end`.
    pub fn succeed_keep(&mut self) {
        self.failed = false;
        self.errstr = None;
    }

    pub fn fail(&mut self) {
        self.fail_with(None);
    }

    pub fn fail_with(&mut self, errstr: Option<String>) {
        self.failed = true;
        self.val = Value::Null;
        if self.pos >= self.errpos {
            self.errpos = self.pos;
            self.errstr = errstr;
        }
    }

    /// Backtrack to `newpos`, clearing the failure flag.
    pub fn rewind(&mut self, newpos: usize) {
        self.succeed_at(Value::Null, newpos);
    }

    pub fn view(&self) -> ParserView<'_> {
        ParserView {
            path: &self.path,
            pos: self.pos,
            src: &self.src,
        }
    }

    /// The formatted failure message for the farthest failure.
    pub fn format_error(&self) -> String {
        crate::source::format_unexpected(
            &self.src,
            &self.path,
            self.errpos,
            self.errstr.as_deref(),
        )
    }

    /// Match `s` literally at the current position, advancing past
    /// whatever prefix matched. The caller restores position on
    /// failure if it needs to backtrack.
    pub fn match_str(&mut self, s: &str) {
        let start = self.pos;
        let mut matched = 0;
        let total = s.chars().count();
        for want in s.chars() {
            if self.pos < self.end && self.src.char_at(self.pos) == Some(want) {
                self.pos += 1;
                matched += 1;
            } else {
                break;
            }
        }
        if matched == total {
            let text = self.src.slice(start, self.pos).to_string();
            self.succeed(Value::Str(text));
        } else {
            self.fail();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(text: &str) -> ParserState {
        ParserState::new(text, "<string>", HashMap::new(), 512)
    }

    #[test]
    fn test_match_str() {
        let mut st = state("foobar");
        st.match_str("foo");
        assert!(!st.failed);
        assert_eq!(st.pos, 3);
        assert_eq!(st.val, Value::from("foo"));

        st.match_str("baz");
        assert!(st.failed);
        // Position is left at the first mismatch; errpos tracks it.
        assert_eq!(st.pos, 5);
        assert_eq!(st.errpos, 5);
    }

    #[test]
    fn test_errpos_is_monotone() {
        let mut st = state("abc");
        st.pos = 2;
        st.fail();
        assert_eq!(st.errpos, 2);
        st.pos = 1;
        st.fail();
        assert_eq!(st.errpos, 2);
    }

    #[test]
    fn test_format_error_at_end() {
        let mut st = state("");
        st.fail();
        assert_eq!(
            st.format_error(),
            "<string>:1 Unexpected end of input at column 1"
        );
    }

    #[test]
    fn test_custom_errstr() {
        let mut st = state("x");
        st.fail_with(Some("Bad predicate value".to_string()));
        assert_eq!(st.format_error(), "<string>:1 Bad predicate value");
    }
}
