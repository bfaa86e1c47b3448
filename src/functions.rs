//! The built-in function library available to host expressions.
//!
//! Each built-in carries a typed signature (as type-descriptor strings,
//! consumed by the analyzer's type checker) and, for the pure ones, a
//! reference implementation. Functions that need parser state (`pos`,
//! `colno`) or re-entry into the evaluator (`map`, `map_items`) are
//! implemented by the interpreter; functions the crate does not carry
//! (`ulookup`, `uname`) are rejected at analysis time when a grammar
//! needs them.

use std::collections::HashMap;
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::HostError;
use crate::value::Value;

/// How a built-in is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// A pure function of its arguments.
    Pure,
    /// Needs parser state or evaluator re-entry; handled in the
    /// interpreter.
    Parser,
    /// Declared in the catalog but not implemented here; grammars that
    /// need it fail analysis.
    Unsupported,
}

type PureFn = fn(&[Value]) -> Result<Value, HostError>;

/// A catalog entry.
pub struct Builtin {
    pub name: &'static str,
    /// Parameter types as type-descriptor strings.
    pub params: &'static [&'static str],
    /// Return type as a type-descriptor string.
    pub ret: &'static str,
    /// Trailing parameters may repeat.
    pub variadic: bool,
    pub kind: BuiltinKind,
    pub func: Option<PureFn>,
}

/// Look up a built-in by name.
pub fn lookup(name: &str) -> Option<&'static Builtin> {
    static INDEX: OnceLock<HashMap<&'static str, &'static Builtin>> = OnceLock::new();
    let index = INDEX.get_or_init(|| CATALOG.iter().map(|b| (b.name, b)).collect());
    index.get(name).copied()
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

/// The catalog. Kept alphabetical.
pub static CATALOG: &[Builtin] = &[
    Builtin { name: "atof", params: &["str"], ret: "float", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_atof) },
    Builtin { name: "atoi", params: &["str", "int"], ret: "int", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_atoi) },
    Builtin { name: "atou", params: &["str", "int"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_atou) },
    Builtin { name: "btoa", params: &["bool"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_btoa) },
    Builtin { name: "cat", params: &["list[str]"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_cat) },
    Builtin { name: "cdr", params: &["list[any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_cdr) },
    Builtin { name: "colno", params: &[], ret: "int", variadic: false, kind: BuiltinKind::Parser, func: None },
    Builtin { name: "concat", params: &["list[any]", "list[any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_concat) },
    Builtin { name: "cons", params: &["any", "list[any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_cons) },
    Builtin { name: "dedent", params: &["str", "int", "int"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_dedent) },
    Builtin { name: "dict", params: &["list[list[any]]"], ret: "dict[str, any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_dict) },
    Builtin { name: "encode_string", params: &["str"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_encode_string) },
    Builtin { name: "equal", params: &["any", "any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_equal) },
    Builtin { name: "ftoa", params: &["float"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_ftoa) },
    Builtin { name: "ftoi", params: &["float"], ret: "int", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_ftoi) },
    Builtin { name: "get", params: &["dict[str, any]", "str"], ret: "any", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_get) },
    Builtin { name: "has", params: &["dict[str, any]", "str"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_has) },
    Builtin { name: "in", params: &["list[any]", "any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_in) },
    Builtin { name: "is_atom", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_atom) },
    Builtin { name: "is_bool", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_bool) },
    Builtin { name: "is_dict", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_dict) },
    Builtin { name: "is_float", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_float) },
    Builtin { name: "is_int", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_int) },
    Builtin { name: "is_list", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_list) },
    Builtin { name: "is_null", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_null) },
    Builtin { name: "is_num", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_num) },
    Builtin { name: "is_str", params: &["any"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_is_str) },
    Builtin { name: "item", params: &["list[any]", "int"], ret: "any", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_item) },
    Builtin { name: "itoa", params: &["int"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_itoa) },
    Builtin { name: "itof", params: &["int"], ret: "float", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_itof) },
    Builtin { name: "itou", params: &["int"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_itou) },
    Builtin { name: "join", params: &["str", "list[str]"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_join) },
    Builtin { name: "keys", params: &["dict[str, any]"], ret: "list[str]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_keys) },
    Builtin { name: "len", params: &["any"], ret: "int", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_len) },
    Builtin { name: "list", params: &["any"], ret: "list[any]", variadic: true, kind: BuiltinKind::Pure, func: Some(fn_list) },
    Builtin { name: "map", params: &["func", "list[any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Parser, func: None },
    Builtin { name: "map_items", params: &["func", "dict[str, any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Parser, func: None },
    Builtin { name: "node", params: &["any"], ret: "any", variadic: true, kind: BuiltinKind::Pure, func: Some(fn_node) },
    Builtin { name: "pairs", params: &["dict[str, any]"], ret: "list[list[any]]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_pairs) },
    Builtin { name: "pos", params: &[], ret: "int", variadic: false, kind: BuiltinKind::Parser, func: None },
    Builtin { name: "replace", params: &["str", "str", "str"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_replace) },
    Builtin { name: "scat", params: &["list[str]"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_cat) },
    Builtin { name: "scons", params: &["str", "list[str]"], ret: "list[str]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_cons) },
    Builtin { name: "slice", params: &["list[any]", "int", "int"], ret: "list[any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_slice) },
    Builtin { name: "sort", params: &["list[any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_sort) },
    Builtin { name: "split", params: &["str", "str"], ret: "list[str]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_split) },
    Builtin { name: "str2td", params: &["str"], ret: "dict[str, any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_str2td) },
    Builtin { name: "strcat", params: &["str", "str"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_strcat) },
    Builtin { name: "strin", params: &["str", "str"], ret: "bool", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_strin) },
    Builtin { name: "strlen", params: &["str"], ret: "int", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_strlen) },
    Builtin { name: "substr", params: &["str", "int", "int"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_substr) },
    Builtin { name: "td2str", params: &["dict[str, any]"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_td2str) },
    Builtin { name: "throw", params: &["str"], ret: "any", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_throw) },
    Builtin { name: "ucategory", params: &["str"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_ucategory) },
    Builtin { name: "ulookup", params: &["str"], ret: "str", variadic: false, kind: BuiltinKind::Unsupported, func: None },
    Builtin { name: "uname", params: &["str"], ret: "str", variadic: false, kind: BuiltinKind::Unsupported, func: None },
    Builtin { name: "utoi", params: &["str"], ret: "int", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_utoi) },
    Builtin { name: "values", params: &["dict[str, any]"], ret: "list[any]", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_values) },
    Builtin { name: "xtoi", params: &["str"], ret: "int", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_xtoi) },
    Builtin { name: "xtou", params: &["str"], ret: "str", variadic: false, kind: BuiltinKind::Pure, func: Some(fn_xtou) },
];

fn want(name: &str, args: &[Value], n: usize) -> Result<(), HostError> {
    if args.len() != n {
        return Err(HostError::runtime(format!(
            "{name}() takes {n} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn fn_atof(args: &[Value]) -> Result<Value, HostError> {
    want("atof", args, 1)?;
    let s = args[0].as_str()?;
    s.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| HostError::runtime(format!("atof: bad float literal {s:?}")))
}

fn fn_atoi(args: &[Value]) -> Result<Value, HostError> {
    want("atoi", args, 2)?;
    let s = args[0].as_str()?;
    let base = args[1].as_int()?;
    if !(2..=36).contains(&base) {
        return Err(HostError::runtime(format!("atoi: bad base {base}")));
    }
    i64::from_str_radix(s, base as u32)
        .map(Value::Int)
        .map_err(|_| HostError::runtime(format!("atoi: bad int literal {s:?}")))
}

fn fn_atou(args: &[Value]) -> Result<Value, HostError> {
    want("atou", args, 2)?;
    let s = args[0].as_str()?;
    let base = args[1].as_int()?;
    if !(2..=36).contains(&base) {
        return Err(HostError::runtime(format!("atou: bad base {base}")));
    }
    let n = i64::from_str_radix(s, base as u32)
        .map_err(|_| HostError::runtime(format!("atou: bad int literal {s:?}")))?;
    code_point("atou", n)
}

fn fn_btoa(args: &[Value]) -> Result<Value, HostError> {
    want("btoa", args, 1)?;
    match &args[0] {
        Value::Bool(true) => Ok(Value::from("true")),
        Value::Bool(false) => Ok(Value::from("false")),
        v => Err(HostError::runtime(format!(
            "btoa: expected a bool, got {}",
            v.type_name()
        ))),
    }
}

fn fn_cat(args: &[Value]) -> Result<Value, HostError> {
    want("cat", args, 1)?;
    let mut out = String::new();
    for v in args[0].as_list()? {
        out.push_str(v.as_str()?);
    }
    Ok(Value::Str(out))
}

fn fn_cdr(args: &[Value]) -> Result<Value, HostError> {
    want("cdr", args, 1)?;
    let xs = args[0].as_list()?;
    Ok(Value::List(xs.iter().skip(1).cloned().collect()))
}

fn fn_concat(args: &[Value]) -> Result<Value, HostError> {
    want("concat", args, 2)?;
    let mut xs = args[0].as_list()?.to_vec();
    xs.extend(args[1].as_list()?.iter().cloned());
    Ok(Value::List(xs))
}

fn fn_cons(args: &[Value]) -> Result<Value, HostError> {
    want("cons", args, 2)?;
    let mut xs = vec![args[0].clone()];
    xs.extend(args[1].as_list()?.iter().cloned());
    Ok(Value::List(xs))
}

// The first line of a dedented block began at `colno`; its indent is
// colno - 1. Tabs count as single columns (see DESIGN.md).
fn fn_dedent(args: &[Value]) -> Result<Value, HostError> {
    want("dedent", args, 3)?;
    let s = args[0].as_str()?;
    let colno = args[1].as_int()?.max(1) as usize;
    let min_indent = args[2].as_int()?.max(0) as usize;

    let lines: Vec<&str> = s.split('\n').collect();
    let mut common = colno - 1;
    for line in lines.iter().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        common = common.min(indent);
    }
    let strip = common.saturating_sub(min_indent);

    let mut out = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            out.push(line.to_string());
            continue;
        }
        let mut stripped = 0;
        let mut rest = *line;
        while stripped < strip {
            match rest.chars().next() {
                Some(c @ (' ' | '\t')) => {
                    rest = &rest[c.len_utf8()..];
                    stripped += 1;
                }
                _ => break,
            }
        }
        out.push(rest.to_string());
    }
    Ok(Value::Str(out.join("\n")))
}

fn fn_dict(args: &[Value]) -> Result<Value, HostError> {
    want("dict", args, 1)?;
    let mut d = IndexMap::new();
    for pair in args[0].as_list()? {
        let pair = pair.as_list()?;
        if pair.len() != 2 {
            return Err(HostError::runtime("dict: each pair must have 2 elements"));
        }
        d.insert(pair[0].as_str()?.to_string(), pair[1].clone());
    }
    Ok(Value::Dict(d))
}

fn fn_encode_string(args: &[Value]) -> Result<Value, HostError> {
    want("encode_string", args, 1)?;
    let s = args[0].as_str()?;
    Ok(Value::Str(
        serde_json::to_string(s)
            .map_err(|e| HostError::runtime(format!("encode_string: {e}")))?,
    ))
}

fn fn_equal(args: &[Value]) -> Result<Value, HostError> {
    want("equal", args, 2)?;
    Ok(Value::Bool(args[0] == args[1]))
}

fn fn_ftoa(args: &[Value]) -> Result<Value, HostError> {
    want("ftoa", args, 1)?;
    match &args[0] {
        Value::Float(f) => {
            if f.is_finite() && f.fract() == 0.0 {
                Ok(Value::Str(format!("{f:.1}")))
            } else {
                Ok(Value::Str(format!("{f}")))
            }
        }
        v => Err(HostError::runtime(format!(
            "ftoa: expected a float, got {}",
            v.type_name()
        ))),
    }
}

fn fn_ftoi(args: &[Value]) -> Result<Value, HostError> {
    want("ftoi", args, 1)?;
    match &args[0] {
        Value::Float(f) if f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() <= i64::MAX as f64 => {
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Float(f) => Err(HostError::runtime(format!("ftoi: {f} out of range"))),
        v => Err(HostError::runtime(format!(
            "ftoi: expected a float, got {}",
            v.type_name()
        ))),
    }
}

fn fn_get(args: &[Value]) -> Result<Value, HostError> {
    want("get", args, 2)?;
    let d = args[0].as_dict()?;
    let k = args[1].as_str()?;
    d.get(k)
        .cloned()
        .ok_or_else(|| HostError::runtime(format!("get: missing key {k:?}")))
}

fn fn_has(args: &[Value]) -> Result<Value, HostError> {
    want("has", args, 2)?;
    Ok(Value::Bool(args[0].as_dict()?.contains_key(args[1].as_str()?)))
}

fn fn_in(args: &[Value]) -> Result<Value, HostError> {
    want("in", args, 2)?;
    Ok(Value::Bool(args[0].as_list()?.contains(&args[1])))
}

fn fn_is_atom(args: &[Value]) -> Result<Value, HostError> {
    want("is_atom", args, 1)?;
    Ok(Value::Bool(matches!(
        args[0],
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
    )))
}

fn fn_is_bool(args: &[Value]) -> Result<Value, HostError> {
    want("is_bool", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn fn_is_dict(args: &[Value]) -> Result<Value, HostError> {
    want("is_dict", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Dict(_))))
}

fn fn_is_float(args: &[Value]) -> Result<Value, HostError> {
    want("is_float", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Float(_))))
}

fn fn_is_int(args: &[Value]) -> Result<Value, HostError> {
    want("is_int", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
}

fn fn_is_list(args: &[Value]) -> Result<Value, HostError> {
    want("is_list", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::List(_))))
}

fn fn_is_null(args: &[Value]) -> Result<Value, HostError> {
    want("is_null", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Null)))
}

fn fn_is_num(args: &[Value]) -> Result<Value, HostError> {
    want("is_num", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Int(_) | Value::Float(_))))
}

fn fn_is_str(args: &[Value]) -> Result<Value, HostError> {
    want("is_str", args, 1)?;
    Ok(Value::Bool(matches!(args[0], Value::Str(_))))
}

fn fn_item(args: &[Value]) -> Result<Value, HostError> {
    want("item", args, 2)?;
    args[0].get_item(&args[1])
}

fn fn_itoa(args: &[Value]) -> Result<Value, HostError> {
    want("itoa", args, 1)?;
    Ok(Value::Str(args[0].as_int()?.to_string()))
}

fn fn_itof(args: &[Value]) -> Result<Value, HostError> {
    want("itof", args, 1)?;
    Ok(Value::Float(args[0].as_int()? as f64))
}

fn fn_itou(args: &[Value]) -> Result<Value, HostError> {
    want("itou", args, 1)?;
    code_point("itou", args[0].as_int()?)
}

fn fn_join(args: &[Value]) -> Result<Value, HostError> {
    want("join", args, 2)?;
    let sep = args[0].as_str()?;
    let parts: Result<Vec<&str>, HostError> =
        args[1].as_list()?.iter().map(Value::as_str).collect();
    Ok(Value::Str(parts?.join(sep)))
}

fn fn_keys(args: &[Value]) -> Result<Value, HostError> {
    want("keys", args, 1)?;
    Ok(Value::List(
        args[0]
            .as_dict()?
            .keys()
            .map(|k| Value::Str(k.clone()))
            .collect(),
    ))
}

fn fn_len(args: &[Value]) -> Result<Value, HostError> {
    want("len", args, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(xs) => xs.len(),
        Value::Dict(d) => d.len(),
        v => {
            return Err(HostError::runtime(format!(
                "len: expected a string, list, or dict, got {}",
                v.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

fn fn_list(args: &[Value]) -> Result<Value, HostError> {
    Ok(Value::List(args.to_vec()))
}

fn fn_node(args: &[Value]) -> Result<Value, HostError> {
    Ok(args.first().cloned().unwrap_or(Value::Null))
}

fn fn_pairs(args: &[Value]) -> Result<Value, HostError> {
    want("pairs", args, 1)?;
    Ok(Value::List(
        args[0]
            .as_dict()?
            .iter()
            .map(|(k, v)| Value::List(vec![Value::Str(k.clone()), v.clone()]))
            .collect(),
    ))
}

fn fn_replace(args: &[Value]) -> Result<Value, HostError> {
    want("replace", args, 3)?;
    Ok(Value::Str(
        args[0]
            .as_str()?
            .replace(args[1].as_str()?, args[2].as_str()?),
    ))
}

fn fn_slice(args: &[Value]) -> Result<Value, HostError> {
    want("slice", args, 3)?;
    let xs = args[0].as_list()?;
    let (start, end) = clamp_range(args[1].as_int()?, args[2].as_int()?, xs.len());
    Ok(Value::List(xs[start..end].to_vec()))
}

fn fn_sort(args: &[Value]) -> Result<Value, HostError> {
    want("sort", args, 1)?;
    let mut xs = args[0].as_list()?.to_vec();
    if xs.iter().all(|v| matches!(v, Value::Str(_))) {
        xs.sort_by(|a, b| match (a, b) {
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            _ => std::cmp::Ordering::Equal,
        });
    } else if xs.iter().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) {
        xs.sort_by(|a, b| {
            num(a).partial_cmp(&num(b)).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        return Err(HostError::runtime(
            "sort: list elements must be all strings or all numbers",
        ));
    }
    Ok(Value::List(xs))
}

fn fn_split(args: &[Value]) -> Result<Value, HostError> {
    want("split", args, 2)?;
    let s = args[0].as_str()?;
    let sep = args[1].as_str()?;
    if sep.is_empty() {
        return Err(HostError::runtime("split: empty separator"));
    }
    Ok(Value::List(
        s.split(sep).map(|p| Value::Str(p.to_string())).collect(),
    ))
}

fn fn_str2td(args: &[Value]) -> Result<Value, HostError> {
    want("str2td", args, 1)?;
    let td = crate::analysis::types::TypeDesc::parse(args[0].as_str()?)
        .map_err(HostError::runtime)?;
    Ok(td.to_value())
}

fn fn_strcat(args: &[Value]) -> Result<Value, HostError> {
    want("strcat", args, 2)?;
    Ok(Value::Str(format!("{}{}", args[0].as_str()?, args[1].as_str()?)))
}

fn fn_strin(args: &[Value]) -> Result<Value, HostError> {
    want("strin", args, 2)?;
    Ok(Value::Bool(args[0].as_str()?.contains(args[1].as_str()?)))
}

fn fn_strlen(args: &[Value]) -> Result<Value, HostError> {
    want("strlen", args, 1)?;
    Ok(Value::Int(args[0].as_str()?.chars().count() as i64))
}

fn fn_substr(args: &[Value]) -> Result<Value, HostError> {
    want("substr", args, 3)?;
    let chars: Vec<char> = args[0].as_str()?.chars().collect();
    let (start, end) = clamp_range(args[1].as_int()?, args[2].as_int()?, chars.len());
    Ok(Value::Str(chars[start..end].iter().collect()))
}

fn fn_td2str(args: &[Value]) -> Result<Value, HostError> {
    want("td2str", args, 1)?;
    let td = crate::analysis::types::TypeDesc::from_value(&args[0])
        .map_err(HostError::runtime)?;
    Ok(Value::Str(td.to_string()))
}

fn fn_throw(args: &[Value]) -> Result<Value, HostError> {
    want("throw", args, 1)?;
    Err(HostError::User(args[0].as_str()?.to_string()))
}

fn fn_ucategory(args: &[Value]) -> Result<Value, HostError> {
    want("ucategory", args, 1)?;
    let c = args[0]
        .as_str()?
        .chars()
        .next()
        .ok_or_else(|| HostError::runtime("ucategory: empty string"))?;
    Ok(Value::Str(general_category(c).to_string()))
}

fn fn_utoi(args: &[Value]) -> Result<Value, HostError> {
    want("utoi", args, 1)?;
    let c = args[0]
        .as_str()?
        .chars()
        .next()
        .ok_or_else(|| HostError::runtime("utoi: empty string"))?;
    Ok(Value::Int(c as i64))
}

fn fn_values(args: &[Value]) -> Result<Value, HostError> {
    want("values", args, 1)?;
    Ok(Value::List(args[0].as_dict()?.values().cloned().collect()))
}

fn fn_xtoi(args: &[Value]) -> Result<Value, HostError> {
    want("xtoi", args, 1)?;
    let s = args[0].as_str()?;
    i64::from_str_radix(s, 16)
        .map(Value::Int)
        .map_err(|_| HostError::runtime(format!("xtoi: bad hex literal {s:?}")))
}

fn fn_xtou(args: &[Value]) -> Result<Value, HostError> {
    want("xtou", args, 1)?;
    let s = args[0].as_str()?;
    let n = i64::from_str_radix(s, 16)
        .map_err(|_| HostError::runtime(format!("xtou: bad hex literal {s:?}")))?;
    code_point("xtou", n)
}

fn code_point(name: &str, n: i64) -> Result<Value, HostError> {
    u32::try_from(n)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::Str(c.to_string()))
        .ok_or_else(|| HostError::runtime(format!("{name}: bad code point {n}")))
}

fn num(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

fn clamp_range(start: i64, end: i64, len: usize) -> (usize, usize) {
    let start = start.clamp(0, len as i64) as usize;
    let end = end.clamp(start as i64, len as i64) as usize;
    (start, end)
}

/// All two-letter Unicode general categories, probed via `regex`'s
/// Unicode class support.
const CATEGORIES: &[&str] = &[
    "Lu", "Ll", "Lt", "Lm", "Lo", "Mn", "Mc", "Me", "Nd", "Nl", "No", "Pc",
    "Pd", "Ps", "Pe", "Pi", "Pf", "Po", "Sm", "Sc", "Sk", "So", "Zs", "Zl",
    "Zp", "Cc", "Cf", "Co",
];

fn category_probes() -> &'static Vec<(&'static str, Regex)> {
    static PROBES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PROBES.get_or_init(|| {
        CATEGORIES
            .iter()
            .filter_map(|cat| {
                Regex::new(&format!(r"\A\p{{{cat}}}")).ok().map(|re| (*cat, re))
            })
            .collect()
    })
}

/// The Unicode general category of a code point, e.g. `"Lu"`.
pub fn general_category(c: char) -> &'static str {
    let mut buf = [0u8; 4];
    let s = c.encode_utf8(&mut buf);
    for (cat, re) in category_probes() {
        if re.is_match(s) {
            return cat;
        }
    }
    "Cn"
}
