//! Type descriptors and the host-expression type checker.
//!
//! The lattice is `null | bool | int | float | str | func | list[T] |
//! dict[str, T] | tuple[...] | any`. `any` unifies with everything;
//! only statically-certain mismatches are reported.

use indexmap::IndexMap;

use crate::ast::{IdentKind, Node, NodeKind};
use crate::functions;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Any,
    Null,
    Bool,
    Int,
    Float,
    Str,
    Func,
    List(Box<TypeDesc>),
    Dict(Box<TypeDesc>, Box<TypeDesc>),
    Tuple(Vec<TypeDesc>),
}

impl TypeDesc {
    pub fn list(elem: TypeDesc) -> TypeDesc {
        TypeDesc::List(Box::new(elem))
    }

    pub fn dict(key: TypeDesc, val: TypeDesc) -> TypeDesc {
        TypeDesc::Dict(Box::new(key), Box::new(val))
    }

    /// Parse a descriptor string like `list[str]` or
    /// `dict[str, any]`.
    pub fn parse(s: &str) -> Result<TypeDesc, String> {
        let (td, rest) = TypeDesc::parse_prefix(s.trim())?;
        if !rest.is_empty() {
            return Err(format!("Bad type descriptor: {s}"));
        }
        Ok(td)
    }

    fn parse_prefix(s: &str) -> Result<(TypeDesc, &str), String> {
        let bad = || format!("Bad type descriptor: {s}");
        let base_end = s
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(s.len());
        let (base, mut rest) = s.split_at(base_end);
        let simple = match base {
            "any" => Some(TypeDesc::Any),
            "null" => Some(TypeDesc::Null),
            "bool" => Some(TypeDesc::Bool),
            "int" => Some(TypeDesc::Int),
            "float" => Some(TypeDesc::Float),
            "str" => Some(TypeDesc::Str),
            "func" => Some(TypeDesc::Func),
            _ => None,
        };
        if let Some(td) = simple {
            return Ok((td, rest));
        }
        if !matches!(base, "list" | "dict" | "tuple") || !rest.starts_with('[') {
            return Err(bad());
        }
        rest = &rest[1..];
        let mut elements = Vec::new();
        loop {
            let (el, r) = TypeDesc::parse_prefix(rest.trim_start())?;
            elements.push(el);
            rest = r.trim_start();
            if let Some(r) = rest.strip_prefix(',') {
                rest = r;
                continue;
            }
            if let Some(r) = rest.strip_prefix(']') {
                rest = r;
                break;
            }
            return Err(bad());
        }
        match base {
            "list" => {
                if elements.len() != 1 {
                    return Err(bad());
                }
                Ok((TypeDesc::List(Box::new(elements.remove(0))), rest))
            }
            "dict" => {
                if elements.len() != 2 || elements[0] != TypeDesc::Str {
                    return Err(bad());
                }
                let val = elements.pop().expect("dict value type");
                let key = elements.pop().expect("dict key type");
                Ok((TypeDesc::Dict(Box::new(key), Box::new(val)), rest))
            }
            _ => Ok((TypeDesc::Tuple(elements), rest)),
        }
    }

    fn base_name(&self) -> &'static str {
        match self {
            TypeDesc::Any => "any",
            TypeDesc::Null => "null",
            TypeDesc::Bool => "bool",
            TypeDesc::Int => "int",
            TypeDesc::Float => "float",
            TypeDesc::Str => "str",
            TypeDesc::Func => "func",
            TypeDesc::List(_) => "list",
            TypeDesc::Dict(_, _) => "dict",
            TypeDesc::Tuple(_) => "tuple",
        }
    }

    fn elements(&self) -> Vec<&TypeDesc> {
        match self {
            TypeDesc::List(el) => vec![el],
            TypeDesc::Dict(k, v) => vec![k, v],
            TypeDesc::Tuple(els) => els.iter().collect(),
            _ => vec![],
        }
    }

    /// The `{base, elements}` dict shape exposed by `str2td`.
    pub fn to_value(&self) -> Value {
        let mut d = IndexMap::new();
        d.insert("base".to_string(), Value::from(self.base_name()));
        d.insert(
            "elements".to_string(),
            Value::List(self.elements().iter().map(|el| el.to_value()).collect()),
        );
        Value::Dict(d)
    }

    /// Rebuild a descriptor from the `{base, elements}` dict shape.
    pub fn from_value(v: &Value) -> Result<TypeDesc, String> {
        let bad = || "Bad type descriptor dict".to_string();
        let d = v.as_dict().map_err(|_| bad())?;
        let base = match d.get("base") {
            Some(Value::Str(s)) => s.clone(),
            _ => return Err(bad()),
        };
        let elements = match d.get("elements") {
            Some(Value::List(els)) => els
                .iter()
                .map(TypeDesc::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![],
            _ => return Err(bad()),
        };
        if elements.is_empty() {
            return TypeDesc::parse(&base);
        }
        let el_str = elements
            .iter()
            .map(|el| el.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        TypeDesc::parse(&format!("{base}[{el_str}]"))
    }

    /// Does a value of type `got` satisfy an expectation of `self`?
    pub fn accepts(&self, got: &TypeDesc) -> bool {
        if self == got || matches!(self, TypeDesc::Any) || matches!(got, TypeDesc::Any) {
            return true;
        }
        match (self, got) {
            (TypeDesc::List(exp), TypeDesc::Tuple(els)) => {
                els.iter().all(|el| exp.accepts(el))
            }
            (TypeDesc::List(a), TypeDesc::List(b)) => a.accepts(b),
            (TypeDesc::Dict(ak, av), TypeDesc::Dict(bk, bv)) => {
                ak.accepts(bk) && av.accepts(bv)
            }
            (TypeDesc::Float, TypeDesc::Int) => true,
            _ => false,
        }
    }

    /// The join of a set of element types, used for list displays.
    pub fn merge(types: &[TypeDesc]) -> TypeDesc {
        match types {
            [] => TypeDesc::Any,
            [only] => only.clone(),
            [first, rest @ ..] => {
                if rest.iter().all(|t| t == first) {
                    first.clone()
                } else {
                    TypeDesc::Any
                }
            }
        }
    }
}

impl std::fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeDesc::List(el) => write!(f, "list[{el}]"),
            TypeDesc::Dict(k, v) => write!(f, "dict[{k}, {v}]"),
            TypeDesc::Tuple(els) => {
                let parts: Vec<String> = els.iter().map(|e| e.to_string()).collect();
                write!(f, "tuple[{}]", parts.join(", "))
            }
            other => write!(f, "{}", other.base_name()),
        }
    }
}

/// Infer the type of a host expression bottom-up, recording the result
/// on the node and appending statically-certain mismatches to
/// `errors`.
pub fn infer(node: &mut Node, errors: &mut Vec<String>) -> TypeDesc {
    let td = infer_inner(node, errors);
    node.attrs.ty = Some(td.to_string());
    td
}

fn infer_inner(node: &mut Node, errors: &mut Vec<String>) -> TypeDesc {
    use NodeKind::*;
    match node.kind {
        EConst => match node.name() {
            "true" | "false" => TypeDesc::Bool,
            "null" => TypeDesc::Null,
            _ => TypeDesc::Float,
        },
        ENum => {
            let text = node.name();
            if !text.contains("0x") && (text.contains('.') || text.contains(['e', 'E'])) {
                TypeDesc::Float
            } else {
                TypeDesc::Int
            }
        }
        ELit => TypeDesc::Str,
        EIdent => match node.attrs.ident_kind {
            Some(IdentKind::Function) => TypeDesc::Func,
            _ => TypeDesc::Any,
        },
        EArr => {
            let els: Vec<TypeDesc> =
                node.ch.iter_mut().map(|c| infer(c, errors)).collect();
            TypeDesc::list(TypeDesc::merge(&els))
        }
        EParen | ENot => {
            let inner = infer(node.child_mut(), errors);
            if node.kind == ENot {
                TypeDesc::Bool
            } else {
                inner
            }
        }
        EGetitemInfix => {
            let mut it = node.ch.iter_mut();
            let obj = infer(it.next().expect("getitem object"), errors);
            let idx = infer(it.next().expect("getitem index"), errors);
            match obj {
                TypeDesc::Any | TypeDesc::Tuple(_) => TypeDesc::Any,
                TypeDesc::List(el) => {
                    if !TypeDesc::Int.accepts(&idx) {
                        errors.push(format!("List index must be an int, not {idx}"));
                    }
                    *el
                }
                TypeDesc::Str => {
                    if !TypeDesc::Int.accepts(&idx) {
                        errors.push(format!("String index must be an int, not {idx}"));
                    }
                    TypeDesc::Str
                }
                TypeDesc::Dict(_, val) => {
                    if !TypeDesc::Str.accepts(&idx) {
                        errors.push(format!("Dict key must be a str, not {idx}"));
                    }
                    *val
                }
                other => {
                    errors.push(format!("Cannot index a value of type {other}"));
                    TypeDesc::Any
                }
            }
        }
        ECallInfix => {
            let (callee, args) = node.ch.split_first_mut().expect("call callee");
            let arg_types: Vec<TypeDesc> =
                args.iter_mut().map(|a| infer(a, errors)).collect();
            if callee.kind == EIdent
                && callee.attrs.ident_kind == Some(IdentKind::Function)
            {
                let name = callee.name().to_string();
                callee.attrs.ty = Some("func".to_string());
                return check_builtin_call(&name, &arg_types, errors);
            }
            let callee_ty = infer(callee, errors);
            if !matches!(callee_ty, TypeDesc::Func | TypeDesc::Any) {
                errors.push(format!("Cannot call a value of type {callee_ty}"));
            }
            TypeDesc::Any
        }
        EPlus => {
            let mut it = node.ch.iter_mut();
            let left = infer(it.next().expect("plus lhs"), errors);
            let right = infer(it.next().expect("plus rhs"), errors);
            plus_type(&left, &right, errors)
        }
        EMinus => {
            let mut it = node.ch.iter_mut();
            let left = infer(it.next().expect("minus lhs"), errors);
            let right = infer(it.next().expect("minus rhs"), errors);
            match (&left, &right) {
                (TypeDesc::Int, TypeDesc::Int) => TypeDesc::Int,
                (TypeDesc::Int | TypeDesc::Float, TypeDesc::Int | TypeDesc::Float) => {
                    TypeDesc::Float
                }
                (TypeDesc::Any, _) | (_, TypeDesc::Any) => TypeDesc::Any,
                _ => {
                    errors.push(format!(
                        "Unsupported operand types for -: {left} and {right}"
                    ));
                    TypeDesc::Any
                }
            }
        }
        _ => {
            debug_assert!(
                false,
                "type inference reached unexpected node {:?}",
                node.kind
            );
            TypeDesc::Any
        }
    }
}

fn plus_type(left: &TypeDesc, right: &TypeDesc, errors: &mut Vec<String>) -> TypeDesc {
    match (left, right) {
        (TypeDesc::Str, TypeDesc::Str) => TypeDesc::Str,
        (TypeDesc::Int, TypeDesc::Int) => TypeDesc::Int,
        (TypeDesc::Int | TypeDesc::Float, TypeDesc::Int | TypeDesc::Float) => {
            TypeDesc::Float
        }
        (TypeDesc::List(a), TypeDesc::List(b)) => {
            TypeDesc::list(TypeDesc::merge(&[(**a).clone(), (**b).clone()]))
        }
        (TypeDesc::Any, _) | (_, TypeDesc::Any) => TypeDesc::Any,
        _ => {
            errors.push(format!(
                "Unsupported operand types for +: {left} and {right}"
            ));
            TypeDesc::Any
        }
    }
}

fn check_builtin_call(
    name: &str,
    arg_types: &[TypeDesc],
    errors: &mut Vec<String>,
) -> TypeDesc {
    let Some(b) = functions::lookup(name) else {
        return TypeDesc::Any;
    };
    if !b.variadic && arg_types.len() != b.params.len() {
        errors.push(format!(
            "{name}() takes {} argument(s), got {}",
            b.params.len(),
            arg_types.len()
        ));
    }
    for (i, got) in arg_types.iter().enumerate() {
        let param = if i < b.params.len() {
            b.params[i]
        } else if b.variadic {
            b.params.last().copied().unwrap_or("any")
        } else {
            break;
        };
        let expected = TypeDesc::parse(param).unwrap_or(TypeDesc::Any);
        if !expected.accepts(got) {
            errors.push(format!(
                "Argument {} to {name}() should be {expected}, got {got}",
                i + 1
            ));
        }
    }
    TypeDesc::parse(b.ret).unwrap_or(TypeDesc::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        for s in ["any", "int", "list[str]", "dict[str, any]", "list[list[int]]"] {
            assert_eq!(TypeDesc::parse(s).unwrap().to_string(), s);
        }
        assert!(TypeDesc::parse("list[]").is_err());
        assert!(TypeDesc::parse("dict[int, str]").is_err());
        assert!(TypeDesc::parse("bogus").is_err());
    }

    #[test]
    fn test_accepts() {
        let any = TypeDesc::Any;
        let ls = TypeDesc::parse("list[str]").unwrap();
        assert!(any.accepts(&ls));
        assert!(ls.accepts(&any));
        assert!(ls.accepts(&TypeDesc::parse("list[str]").unwrap()));
        assert!(!ls.accepts(&TypeDesc::parse("list[int]").unwrap()));
        assert!(TypeDesc::Float.accepts(&TypeDesc::Int));
        assert!(!TypeDesc::Int.accepts(&TypeDesc::Float));
    }

    #[test]
    fn test_merge() {
        let str_ty = TypeDesc::Str;
        assert_eq!(TypeDesc::merge(&[str_ty.clone(), str_ty.clone()]), TypeDesc::Str);
        assert_eq!(
            TypeDesc::merge(&[TypeDesc::Str, TypeDesc::Int]),
            TypeDesc::Any
        );
        assert_eq!(TypeDesc::merge(&[]), TypeDesc::Any);
    }

    #[test]
    fn test_value_roundtrip() {
        let td = TypeDesc::parse("dict[str, list[int]]").unwrap();
        let v = td.to_value();
        assert_eq!(TypeDesc::from_value(&v).unwrap(), td);
    }
}
