//! Conformance tests for the built-in function catalog, driven
//! through grammars so the whole evaluation path is exercised.

use floyd::{parse, Value};

fn check(grammar: &str, text: &str, expected: Value) {
    let r = parse(grammar, text);
    assert_eq!(r.err, None, "grammar {grammar:?} on {text:?}");
    assert_eq!(r.val, Some(expected), "grammar {grammar:?} on {text:?}");
}

fn check_expr(expr: &str, expected: Value) {
    check(&format!("g = -> {expr}"), "", expected);
}

fn s(x: &str) -> Value {
    Value::from(x)
}

fn list(xs: Vec<Value>) -> Value {
    Value::List(xs)
}

#[test]
fn test_fn_atoi_atof() {
    check_expr("atoi('17', 10)", Value::Int(17));
    check_expr("atoi('ff', 16)", Value::Int(255));
    check_expr("atof('1.5')", Value::Float(1.5));
}

#[test]
fn test_fn_btoa() {
    check_expr("btoa(true)", s("true"));
    check_expr("btoa(false)", s("false"));
}

#[test]
fn test_fn_cat_scat() {
    check_expr("cat(['ab', 'c'])", s("abc"));
    check_expr("scat(['ab', 'c'])", s("abc"));
    check("g = 'x'*:v -> cat(v)", "xxx", s("xxx"));
}

#[test]
fn test_fn_cons_cdr() {
    check_expr("cons('a', ['b'])", list(vec![s("a"), s("b")]));
    check_expr("scons('a', ['b'])", list(vec![s("a"), s("b")]));
    check_expr("cdr(['a', 'b', 'c'])", list(vec![s("b"), s("c")]));
}

#[test]
fn test_fn_concat() {
    check_expr("concat([1], [2, 3])", list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
}

#[test]
fn test_fn_dict_accessors() {
    check_expr("get(dict([['a', 1]]), 'a')", Value::Int(1));
    check_expr("has(dict([['a', 1]]), 'a')", Value::Bool(true));
    check_expr("has(dict([['a', 1]]), 'b')", Value::Bool(false));
    check_expr("keys(dict([['a', 1], ['b', 2]]))", list(vec![s("a"), s("b")]));
    check_expr("values(dict([['a', 1], ['b', 2]]))", list(vec![Value::Int(1), Value::Int(2)]));
    check_expr(
        "pairs(dict([['a', 1]]))",
        list(vec![list(vec![s("a"), Value::Int(1)])]),
    );
}

#[test]
fn test_fn_dedent() {
    check_expr("dedent('a\\n    b', 5, 0)", s("a\nb"));
    check_expr("dedent('a\\n    b', 5, 2)", s("a\n  b"));
}

#[test]
fn test_fn_encode_string() {
    check_expr("encode_string('a\"b')", s("\"a\\\"b\""));
}

#[test]
fn test_fn_equal() {
    check_expr("equal(1, 1)", Value::Bool(true));
    check_expr("equal('a', 'b')", Value::Bool(false));
    check_expr("equal([1, 2], [1, 2])", Value::Bool(true));
}

#[test]
fn test_fn_float_int_conversions() {
    check_expr("ftoa(2.0)", s("2.0"));
    check_expr("ftoa(2.5)", s("2.5"));
    check_expr("ftoi(2.9)", Value::Int(2));
    check_expr("itoa(42)", s("42"));
    check_expr("itof(2)", Value::Float(2.0));
}

#[test]
fn test_fn_in() {
    check_expr("in(['a', 'b'], 'a')", Value::Bool(true));
    check_expr("in(['a', 'b'], 'c')", Value::Bool(false));
}

#[test]
fn test_fn_is_predicates() {
    check_expr("is_null(null)", Value::Bool(true));
    check_expr("is_bool(true)", Value::Bool(true));
    check_expr("is_int(1)", Value::Bool(true));
    check_expr("is_float(1.5)", Value::Bool(true));
    check_expr("is_num(1)", Value::Bool(true));
    check_expr("is_str('s')", Value::Bool(true));
    check_expr("is_list([1])", Value::Bool(true));
    check_expr("is_dict(dict([]))", Value::Bool(true));
    check_expr("is_atom('s')", Value::Bool(true));
    check_expr("is_atom([1])", Value::Bool(false));
}

#[test]
fn test_fn_item_len() {
    check_expr("item(['a', 'b'], 1)", s("b"));
    check_expr("len('abc')", Value::Int(3));
    check_expr("len([1, 2])", Value::Int(2));
    check_expr("len(dict([['a', 1]]))", Value::Int(1));
}

#[test]
fn test_fn_itou_utoi() {
    check_expr("itou(32)", s(" "));
    check_expr("utoi(' ')", Value::Int(32));
    check_expr("atou('65', 10)", s("A"));
    check_expr("xtou('41')", s("A"));
    check_expr("xtoi('ff')", Value::Int(255));
}

#[test]
fn test_fn_join_split() {
    check_expr("join(',', ['a', 'b'])", s("a,b"));
    check_expr("split('a,b', ',')", list(vec![s("a"), s("b")]));
}

#[test]
fn test_fn_list() {
    check_expr("list(1, 'a', true)", list(vec![Value::Int(1), s("a"), Value::Bool(true)]));
}

#[test]
fn test_fn_map() {
    check_expr("map(itoa, [1, 2])", list(vec![s("1"), s("2")]));
    check_expr(
        "map_items(strcat, dict([['a', 'x'], ['b', 'y']]))",
        list(vec![s("ax"), s("by")]),
    );
}

#[test]
fn test_fn_node() {
    check_expr("node(1, 2, 3)", Value::Int(1));
}

#[test]
fn test_fn_replace() {
    check_expr("replace('aaa', 'a', 'b')", s("bbb"));
}

#[test]
fn test_fn_slice_substr() {
    check_expr("slice([1, 2, 3], 1, 3)", list(vec![Value::Int(2), Value::Int(3)]));
    check_expr("substr('hello', 1, 3)", s("el"));
}

#[test]
fn test_fn_sort() {
    check_expr("sort(['b', 'a'])", list(vec![s("a"), s("b")]));
    check_expr("sort([3, 1, 2])", list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
}

#[test]
fn test_fn_strcat_strin_strlen() {
    check_expr("strcat('ab', 'c')", s("abc"));
    check_expr("strin('hello', 'ell')", Value::Bool(true));
    check_expr("strin('hello', 'xyz')", Value::Bool(false));
    check_expr("strlen('abc')", Value::Int(3));
}

#[test]
fn test_fn_type_descriptors() {
    check_expr("td2str(str2td('list[str]'))", s("list[str]"));
    check_expr("get(str2td('int'), 'base')", s("int"));
}

#[test]
fn test_fn_ucategory() {
    check_expr("ucategory('A')", s("Lu"));
    check_expr("ucategory('a')", s("Ll"));
    check_expr("ucategory('5')", s("Nd"));
}

#[test]
fn test_unsupported_unicode_functions_fail_analysis() {
    let r = parse("g = 'a' -> uname($1)", "a");
    assert_eq!(
        r.err.as_deref(),
        Some("Errors were found:\n  Unsupported function \"uname\"\n")
    );
    let r = parse("g = 'a' -> ulookup($1)", "a");
    assert_eq!(
        r.err.as_deref(),
        Some("Errors were found:\n  Unsupported function \"ulookup\"\n")
    );
}

#[test]
fn test_numeric_promotion_in_expressions() {
    check_expr("1 + 2", Value::Int(3));
    check_expr("1 + 2.5", Value::Float(3.5));
    check_expr("2.5 - 1", Value::Float(1.5));
}

#[test]
fn test_string_and_list_plus() {
    check_expr("'a' + 'b'", s("ab"));
    check_expr("[1] + [2]", list(vec![Value::Int(1), Value::Int(2)]));
}
