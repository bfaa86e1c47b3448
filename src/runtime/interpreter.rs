//! The packrat PEG engine.
//!
//! Every AST node executes under one contract: consume input starting
//! at `pos`; on success set `val` and advance `pos`; on failure set
//! `failed`, leave `val` null, and bump `errpos`, without restoring
//! `pos`. Callers that need to backtrack save and restore position
//! themselves. Fatal (host) errors propagate as `Err` and abort the
//! parse.

use std::collections::HashMap;

use log::{debug, trace};

use crate::ast::{IdentKind, Node, NodeKind, NodeValue};
use crate::error::HostError;
use crate::functions::{self, BuiltinKind};
use crate::grammar::Grammar;
use crate::value::{FuncRef, Value};
use crate::ParseResult;

use super::memo::{MemoEntry, MemoKey};
use super::state::{ExternValue, ParserState};

/// A grammar bound to an execution strategy. Stateless across parses;
/// every `parse` call gets a fresh `ParserState`.
pub struct Interpreter<'g> {
    grammar: &'g Grammar,
    memoize: bool,
}

impl<'g> Interpreter<'g> {
    pub fn new(grammar: &'g Grammar, memoize: bool) -> Interpreter<'g> {
        Interpreter { grammar, memoize }
    }

    pub fn parse(
        &self,
        text: &str,
        path: &str,
        externs: HashMap<String, ExternValue>,
        start: Option<&str>,
        max_depth: usize,
    ) -> ParseResult {
        // Declared consts provide defaults; caller bindings override.
        // A caller name the grammar never declared is an immediate
        // error.
        let mut bindings: HashMap<String, ExternValue> = HashMap::new();
        for (name, sig) in &self.grammar.externs {
            if sig.kind == crate::grammar::ExternKind::Const {
                bindings.insert(name.clone(), ExternValue::Value(sig.default.clone()));
            }
        }
        let mut errors = Vec::new();
        for (name, value) in externs {
            if self.grammar.externs.contains_key(&name) {
                bindings.insert(name, value);
            } else {
                errors.push(format!("Missing extern \"{name}\""));
            }
        }
        if !errors.is_empty() {
            return ParseResult {
                val: None,
                err: Some(errors.join("\n")),
                pos: 0,
            };
        }

        let start_rule = start.unwrap_or(&self.grammar.starting_rule);
        let Some(body) = self.grammar.rules.get(start_rule) else {
            return ParseResult {
                val: None,
                err: Some(format!("Unknown rule \"{start_rule}\"")),
                pos: 0,
            };
        };

        debug!("parse start: rule={start_rule} path={path} len={}", text.chars().count());
        let mut st = ParserState::new(text, path, bindings, max_depth);
        match self.interpret(body, &mut st) {
            Err(e) => ParseResult {
                val: None,
                err: Some(e.to_string()),
                pos: st.pos,
            },
            Ok(()) => {
                if st.failed {
                    ParseResult {
                        val: None,
                        err: Some(st.format_error()),
                        pos: st.errpos,
                    }
                } else {
                    debug!("parse ok: pos={}", st.pos);
                    ParseResult {
                        val: Some(std::mem::replace(&mut st.val, Value::Null)),
                        err: None,
                        pos: st.pos,
                    }
                }
            }
        }
    }

    fn interpret(&self, node: &Node, st: &mut ParserState) -> Result<(), HostError> {
        use NodeKind::*;
        match node.kind {
            Empty => {
                st.succeed(Value::Null);
                Ok(())
            }
            Lit => {
                st.match_str(node.name());
                Ok(())
            }
            Range => self.r_range(node, st),
            Set => self.r_regexp(&format!("[{}]", node.name()), st),
            Regexp => self.r_regexp(node.name(), st),
            Unicat => self.r_unicat(node, st),
            Seq => {
                for c in &node.ch {
                    self.interpret(c, st)?;
                    if st.failed {
                        break;
                    }
                }
                Ok(())
            }
            Choice => {
                let pos = st.pos;
                let (last, rest) = node.ch.split_last().expect("choice alternatives");
                for c in rest {
                    self.interpret(c, st)?;
                    if !st.failed {
                        return Ok(());
                    }
                    st.rewind(pos);
                }
                self.interpret(last, st)
            }
            Opt => {
                let pos = st.pos;
                self.interpret(node.child(), st)?;
                if st.failed {
                    st.succeed_at(Value::List(vec![]), pos);
                } else {
                    let v = std::mem::replace(&mut st.val, Value::Null);
                    st.val = Value::List(vec![v]);
                }
                Ok(())
            }
            Star => self.r_star(node.child(), st, Vec::new()),
            Plus => {
                self.interpret(node.child(), st)?;
                if st.failed {
                    return Ok(());
                }
                let hd = std::mem::replace(&mut st.val, Value::Null);
                self.r_star(node.child(), st, vec![hd])
            }
            Count => {
                let (min, max) = match node.v {
                    NodeValue::Count(min, max) => (min, max),
                    _ => unreachable!("count bounds"),
                };
                let mut vs = Vec::new();
                let mut i = 0;
                while i < max {
                    self.interpret(node.child(), st)?;
                    if st.failed {
                        if i >= min {
                            st.succeed(Value::List(vs));
                        }
                        return Ok(());
                    }
                    vs.push(std::mem::replace(&mut st.val, Value::Null));
                    i += 1;
                }
                st.succeed(Value::List(vs));
                Ok(())
            }
            Not => {
                let pos = st.pos;
                let errpos = st.errpos;
                let errstr = st.errstr.clone();
                self.interpret(node.child(), st)?;
                if st.failed {
                    st.errpos = errpos;
                    st.errstr = errstr;
                    st.succeed_at(Value::Null, pos);
                } else {
                    st.pos = pos;
                    st.fail();
                }
                Ok(())
            }
            NotOne => {
                let pos = st.pos;
                let errpos = st.errpos;
                let errstr = st.errstr.clone();
                self.interpret(node.child(), st)?;
                if st.failed {
                    st.errpos = errpos;
                    st.errstr = errstr;
                    st.succeed_at(Value::Null, pos);
                    self.r_any(st);
                } else {
                    st.pos = pos;
                    st.fail();
                }
                Ok(())
            }
            EndsIn => loop {
                self.interpret(node.child(), st)?;
                if !st.failed {
                    return Ok(());
                }
                self.r_any(st);
                if st.failed {
                    return Ok(());
                }
            },
            Run => {
                let start = st.pos;
                self.interpret(node.child(), st)?;
                if !st.failed {
                    st.val = Value::Str(st.src.slice(start, st.pos).to_string());
                }
                Ok(())
            }
            Equals => {
                self.interpret(node.child(), st)?;
                if st.failed {
                    return Ok(());
                }
                let s = st.val.as_str()?.to_string();
                st.match_str(&s);
                Ok(())
            }
            Label => {
                self.interpret(node.child(), st)?;
                if !st.failed {
                    let v = std::mem::replace(&mut st.val, Value::Null);
                    st.scopes
                        .last_mut()
                        .expect("scope frame")
                        .insert(node.name().to_string(), v);
                    st.succeed(Value::Null);
                }
                Ok(())
            }
            Scope => {
                st.scopes.push(HashMap::new());
                let r = self.interpret(node.child(), st);
                st.scopes.pop();
                r
            }
            Action => self.interpret(node.child(), st),
            Pred => {
                self.interpret(node.child(), st)?;
                match st.val {
                    Value::Bool(true) => st.succeed(Value::Null),
                    Value::Bool(false) => st.fail(),
                    _ => st.fail_with(Some("Bad predicate value".to_string())),
                }
                Ok(())
            }
            Paren => self.interpret(node.child(), st),
            Apply => self.r_apply(node, st),
            RuleWrapper => {
                if st.rule_stack.len() >= st.max_depth {
                    return Err(HostError::runtime(
                        "Maximum recursion depth exceeded",
                    ));
                }
                st.rule_stack.push((st.pos, node.name().to_string()));
                let r = self.interpret(node.child(), st);
                st.rule_stack.pop();
                r
            }
            Leftrec => self.r_leftrec(node, st),
            Operator => self.r_operator(node, st),

            EConst => {
                let v = match node.name() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    "Infinity" => Value::Float(f64::INFINITY),
                    _ => Value::Float(f64::NAN),
                };
                st.succeed(v);
                Ok(())
            }
            ENum => {
                let v = parse_number(node.name())?;
                st.succeed(v);
                Ok(())
            }
            ELit => {
                st.succeed(Value::Str(node.name().to_string()));
                Ok(())
            }
            EIdent => {
                let v = self.resolve_ident(node, st)?;
                st.succeed(v);
                Ok(())
            }
            EArr => {
                let mut vals = Vec::with_capacity(node.ch.len());
                for c in &node.ch {
                    self.interpret(c, st)?;
                    vals.push(std::mem::replace(&mut st.val, Value::Null));
                }
                st.succeed(Value::List(vals));
                Ok(())
            }
            EParen => self.interpret(node.child(), st),
            ENot => {
                self.interpret(node.child(), st)?;
                let v = Value::Bool(!st.val.truthy());
                st.succeed(v);
                Ok(())
            }
            EPlus | EMinus => {
                self.interpret(&node.ch[0], st)?;
                let left = std::mem::replace(&mut st.val, Value::Null);
                self.interpret(&node.ch[1], st)?;
                let right = std::mem::replace(&mut st.val, Value::Null);
                let v = if node.kind == EPlus {
                    left.add(&right)?
                } else {
                    left.sub(&right)?
                };
                st.succeed(v);
                Ok(())
            }
            EGetitemInfix => {
                self.interpret(&node.ch[0], st)?;
                let obj = std::mem::replace(&mut st.val, Value::Null);
                self.interpret(&node.ch[1], st)?;
                let key = std::mem::replace(&mut st.val, Value::Null);
                let v = obj.get_item(&key)?;
                st.succeed(v);
                Ok(())
            }
            ECallInfix => {
                self.interpret(&node.ch[0], st)?;
                let callee = std::mem::replace(&mut st.val, Value::Null);
                let fref = match callee {
                    Value::Func(fref) => fref,
                    other => {
                        return Err(HostError::runtime(format!(
                            "Cannot call a value of type {}",
                            other.type_name()
                        )))
                    }
                };
                let mut args = Vec::with_capacity(node.ch.len() - 1);
                for c in &node.ch[1..] {
                    self.interpret(c, st)?;
                    args.push(std::mem::replace(&mut st.val, Value::Null));
                }
                let v = self.call_func(&fref, &args, st)?;
                st.succeed(v);
                Ok(())
            }
            EQual | ECall | EGetitem => {
                // Rewritten to the infix forms during analysis.
                Err(HostError::runtime(format!(
                    "Internal error: unrewritten {:?} node",
                    node.kind
                )))
            }
            Rules | Rule | Pragma | Any | End => {
                // `any`/`end` arrive as rule applications; the
                // structural kinds never reach the interpreter.
                Err(HostError::runtime(format!(
                    "Internal error: unexpected {:?} node",
                    node.kind
                )))
            }
        }
    }

    // ------------------------------------------------------------------
    // Built-in rules.
    // ------------------------------------------------------------------

    fn r_any(&self, st: &mut ParserState) {
        match st.src.char_at(st.pos) {
            Some(c) => st.succeed_at(Value::Str(c.to_string()), st.pos + 1),
            None => st.fail(),
        }
    }

    fn r_end(&self, st: &mut ParserState) {
        if st.pos == st.end {
            // Succeeds without consuming and without disturbing the
            // last produced value.
            st.succeed_keep();
        } else {
            st.fail();
        }
    }

    fn r_range(&self, node: &Node, st: &mut ParserState) -> Result<(), HostError> {
        let (lo, hi) = match &node.v {
            NodeValue::Pair(lo, hi) => (
                lo.chars().next().expect("range endpoint"),
                hi.chars().next().expect("range endpoint"),
            ),
            _ => unreachable!("range endpoints"),
        };
        match st.src.char_at(st.pos) {
            Some(c) if c >= lo && c <= hi => {
                st.succeed_at(Value::Str(c.to_string()), st.pos + 1)
            }
            _ => st.fail(),
        }
        Ok(())
    }

    fn r_regexp(&self, pattern: &str, st: &mut ParserState) -> Result<(), HostError> {
        let anchored = format!(r"\A(?:{pattern})");
        if !st.regexps.contains_key(&anchored) {
            let re = regex::Regex::new(&anchored).map_err(|e| {
                HostError::runtime(format!("Bad regexp /{pattern}/: {e}"))
            })?;
            st.regexps.insert(anchored.clone(), re);
        }
        let matched = {
            let re = st.regexps.get(&anchored).expect("compiled regexp");
            re.find(st.src.tail(st.pos)).map(|m| m.as_str().to_string())
        };
        match matched {
            Some(text) => {
                let n = text.chars().count();
                st.succeed_at(Value::Str(text), st.pos + n);
            }
            None => st.fail(),
        }
        Ok(())
    }

    fn r_unicat(&self, node: &Node, st: &mut ParserState) -> Result<(), HostError> {
        let want = node.name();
        match st.src.char_at(st.pos) {
            Some(c) => {
                let cat = functions::general_category(c);
                if cat == want || (want.len() == 1 && cat.starts_with(want)) {
                    st.succeed_at(Value::Str(c.to_string()), st.pos + 1);
                } else {
                    st.fail();
                }
            }
            None => st.fail(),
        }
        Ok(())
    }

    fn r_star(
        &self,
        child: &Node,
        st: &mut ParserState,
        mut vs: Vec<Value>,
    ) -> Result<(), HostError> {
        while !st.failed && st.pos < st.end {
            let p = st.pos;
            self.interpret(child, st)?;
            if st.failed {
                st.rewind(p);
                break;
            }
            if st.pos == p {
                // Zero consumption; bail before looping forever.
                break;
            }
            vs.push(std::mem::replace(&mut st.val, Value::Null));
        }
        st.succeed(Value::List(vs));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rule application, left recursion, precedence climbing.
    // ------------------------------------------------------------------

    fn r_apply(&self, node: &Node, st: &mut ParserState) -> Result<(), HostError> {
        let name = node.name();
        if name == "any" {
            self.r_any(st);
            return Ok(());
        }
        if name == "end" {
            self.r_end(st);
            return Ok(());
        }
        trace!("apply {name} at {}", st.pos);

        // Each rule starts with a fresh scope stack.
        let saved_scopes = std::mem::replace(&mut st.scopes, vec![HashMap::new()]);

        let memoize = self.memoize
            && !self.grammar.leftrec_rules.contains(name)
            && !self.grammar.is_operator_rule(name);
        let pos = st.pos;
        if memoize {
            let key = MemoKey { rule: st.rule_ids.get_id(name), pos };
            if let Some(entry) = st.cache.get(key) {
                let entry = entry.clone();
                st.val = entry.val;
                st.failed = entry.failed;
                st.pos = entry.pos;
                st.scopes = saved_scopes;
                return Ok(());
            }
        }

        let Some(body) = self.grammar.rules.get(name) else {
            st.scopes = saved_scopes;
            return Err(HostError::runtime(format!("Unknown rule \"{name}\"")));
        };
        let r = self.interpret(body, st);
        st.scopes = saved_scopes;
        r?;
        if memoize {
            let key = MemoKey { rule: st.rule_ids.get_id(name), pos };
            st.cache.insert(
                key,
                MemoEntry { val: st.val.clone(), failed: st.failed, pos: st.pos },
            );
        }
        Ok(())
    }

    // The seeded fixed-point algorithm, after "Parsing Expression
    // Grammars Made Practical" (Laurent & Mens, 2016).
    fn r_leftrec(&self, node: &Node, st: &mut ParserState) -> Result<(), HostError> {
        let name = node.name();
        let pos0 = st.pos;
        let key = MemoKey { rule: st.rule_ids.get_id(name), pos: pos0 };
        if let Some(seed) = st.seeds.get(key) {
            let seed = seed.clone();
            st.val = seed.val;
            st.failed = seed.failed;
            st.pos = seed.pos;
            return Ok(());
        }
        if st.blocked.contains(name) {
            st.val = Value::Null;
            st.failed = true;
            return Ok(());
        }
        let mut current = MemoEntry { val: Value::Null, failed: true, pos: pos0 };
        st.seeds.insert(key, current.clone());
        let left = node.attrs.left_assoc;
        if left {
            st.blocked.insert(name.to_string());
        }
        loop {
            self.interpret(node.child(), st)?;
            if st.pos > current.pos {
                current = MemoEntry { val: st.val.clone(), failed: st.failed, pos: st.pos };
                st.seeds.insert(key, current.clone());
                st.pos = pos0;
            } else {
                st.seeds.remove(key);
                st.val = current.val;
                st.failed = current.failed;
                st.pos = current.pos;
                if left {
                    st.blocked.remove(name);
                }
                return Ok(());
            }
        }
    }

    // Precedence climbing, sharing the seed table with the leftrec
    // algorithm but driven by precedence classes.
    fn r_operator(&self, node: &Node, st: &mut ParserState) -> Result<(), HostError> {
        let name = node.name();
        let pos0 = st.pos;
        let key = MemoKey { rule: st.rule_ids.get_id(name), pos: pos0 };
        if let Some(seed) = st.seeds.get(key) {
            let seed = seed.clone();
            st.val = seed.val;
            st.failed = seed.failed;
            st.pos = seed.pos;
            return Ok(());
        }
        let table = self
            .grammar
            .operators
            .get(name)
            .ok_or_else(|| HostError::runtime(format!("No operator table for \"{name}\"")))?;

        st.op_frames.entry(name.to_string()).or_default().current_depth += 1;
        let min_prec = st.op_frames[name].current_prec;
        let mut current = MemoEntry { val: Value::Null, failed: true, pos: pos0 };
        st.seeds.insert(key, current.clone());

        let precs: Vec<i64> = table.prec_ops.keys().rev().copied().collect();
        let mut i = 0;
        while i < precs.len() {
            let prec = precs[i];
            if prec < min_prec {
                break;
            }
            let ops = &table.prec_ops[&prec];
            let mut climb_prec = prec;
            if !table.rassoc.contains(&ops[0]) {
                // Left association: operand calls refuse operators at
                // the same level.
                climb_prec += 1;
            }
            st.op_frames.get_mut(name).expect("operator frame").current_prec = climb_prec;

            let mut repeat = false;
            for op in ops {
                let idx = table.choices[op.as_str()];
                self.interpret(&node.ch[idx], st)?;
                if !st.failed && st.pos > pos0 {
                    current = MemoEntry { val: st.val.clone(), failed: false, pos: st.pos };
                    st.seeds.insert(key, current.clone());
                    repeat = true;
                    break;
                }
                st.rewind(pos0);
            }
            if !repeat {
                i += 1;
            }
        }
        st.seeds.remove(key);
        let frame = st.op_frames.get_mut(name).expect("operator frame");
        frame.current_depth -= 1;
        if frame.current_depth == 0 {
            frame.current_prec = 0;
        }
        st.val = current.val;
        st.failed = current.failed;
        st.pos = current.pos;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Host-expression support.
    // ------------------------------------------------------------------

    fn resolve_ident(&self, node: &Node, st: &ParserState) -> Result<Value, HostError> {
        let name = node.name();
        if name.starts_with('$') {
            return st
                .scopes
                .last()
                .and_then(|frame| frame.get(name))
                .cloned()
                .ok_or_else(|| HostError::runtime(format!("Unknown label \"{name}\"")));
        }
        match node.attrs.ident_kind {
            Some(IdentKind::Local) => st
                .scopes
                .last()
                .and_then(|frame| frame.get(name))
                .cloned()
                .ok_or_else(|| HostError::runtime(format!("Unknown label \"{name}\""))),
            Some(IdentKind::Outer) => {
                for frame in st.scopes.iter().rev() {
                    if let Some(v) = frame.get(name) {
                        return Ok(v.clone());
                    }
                }
                Err(HostError::runtime(format!("Unknown label \"{name}\"")))
            }
            Some(IdentKind::Extern) => match st.externs.get(name) {
                Some(ExternValue::Value(v)) => Ok(v.clone()),
                Some(ExternValue::Func(_)) | Some(ExternValue::PFunc(_)) => {
                    Ok(Value::Func(FuncRef::Extern(name.to_string())))
                }
                None => Err(HostError::runtime(format!(
                    "Extern \"{name}\" is not bound"
                ))),
            },
            Some(IdentKind::Function) => {
                let b = functions::lookup(name).ok_or_else(|| {
                    HostError::runtime(format!("Unknown function \"{name}\""))
                })?;
                Ok(Value::Func(FuncRef::Builtin(b.name)))
            }
            None => Err(HostError::runtime(format!(
                "Unresolved identifier \"{name}\""
            ))),
        }
    }

    fn call_func(
        &self,
        fref: &FuncRef,
        args: &[Value],
        st: &ParserState,
    ) -> Result<Value, HostError> {
        match fref {
            FuncRef::Builtin(name) => {
                let b = functions::lookup(name).ok_or_else(|| {
                    HostError::runtime(format!("Unknown function \"{name}\""))
                })?;
                match b.kind {
                    BuiltinKind::Pure => (b.func.expect("pure builtin"))(args),
                    BuiltinKind::Parser => self.call_parser_builtin(name, args, st),
                    BuiltinKind::Unsupported => Err(HostError::runtime(format!(
                        "Unsupported function \"{name}\""
                    ))),
                }
            }
            FuncRef::Extern(name) => match st.externs.get(name) {
                Some(ExternValue::Func(f)) => f(args),
                Some(ExternValue::PFunc(f)) => f(&st.view(), args),
                Some(ExternValue::Value(_)) => Err(HostError::runtime(format!(
                    "Extern \"{name}\" is not callable"
                ))),
                None => Err(HostError::runtime(format!(
                    "Extern \"{name}\" is not bound"
                ))),
            },
        }
    }

    fn call_parser_builtin(
        &self,
        name: &str,
        args: &[Value],
        st: &ParserState,
    ) -> Result<Value, HostError> {
        match name {
            "pos" => Ok(Value::Int(st.pos as i64)),
            "colno" => Ok(Value::Int(st.src.colno(st.pos) as i64)),
            "map" => {
                let [f, xs] = args else {
                    return Err(HostError::runtime("map() takes 2 argument(s)"));
                };
                let Value::Func(fref) = f else {
                    return Err(HostError::runtime("map: first argument must be callable"));
                };
                let mut out = Vec::new();
                for x in xs.as_list()? {
                    out.push(self.call_func(fref, &[x.clone()], st)?);
                }
                Ok(Value::List(out))
            }
            "map_items" => {
                let [f, d] = args else {
                    return Err(HostError::runtime("map_items() takes 2 argument(s)"));
                };
                let Value::Func(fref) = f else {
                    return Err(HostError::runtime(
                        "map_items: first argument must be callable",
                    ));
                };
                let mut out = Vec::new();
                for (k, v) in d.as_dict()? {
                    out.push(self.call_func(
                        fref,
                        &[Value::Str(k.clone()), v.clone()],
                        st,
                    )?);
                }
                Ok(Value::List(out))
            }
            _ => Err(HostError::runtime(format!(
                "Unknown parser builtin \"{name}\""
            ))),
        }
    }
}

fn parse_number(text: &str) -> Result<Value, HostError> {
    let (neg, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if let Some(hex) = body.strip_prefix("0x") {
        let v = i64::from_str_radix(hex, 16)
            .map_err(|_| HostError::runtime(format!("Bad number literal {text:?}")))?;
        return Ok(Value::Int(if neg { -v } else { v }));
    }
    if body.contains('.') || body.contains(['e', 'E']) {
        let v: f64 = text
            .parse()
            .map_err(|_| HostError::runtime(format!("Bad number literal {text:?}")))?;
        return Ok(Value::Float(v));
    }
    text.parse::<i64>()
        .map(Value::Int)
        .map_err(|_| HostError::runtime(format!("Integer literal {text} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42").unwrap(), Value::Int(42));
        assert_eq!(parse_number("-3").unwrap(), Value::Int(-3));
        assert_eq!(parse_number("0x20").unwrap(), Value::Int(32));
        assert_eq!(parse_number("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(parse_number("1e3").unwrap(), Value::Float(1000.0));
        assert!(parse_number("99999999999999999999").is_err());
    }
}
