//! End-to-end tests driving the public facade: compile a grammar,
//! parse input text, check the produced value or error.

use std::collections::HashMap;
use std::rc::Rc;

use floyd::{
    compile_to_parser, parse, CompileOptions, ExternValue, ParseOptions, Value,
};

fn check(grammar: &str, text: &str, expected: Value) {
    let r = parse(grammar, text);
    assert_eq!(r.err, None, "grammar {grammar:?} on {text:?}");
    assert_eq!(r.val, Some(expected), "grammar {grammar:?} on {text:?}");
}

fn check_err(grammar: &str, text: &str, err: &str) {
    let r = parse(grammar, text);
    assert_eq!(r.val, None, "grammar {grammar:?} on {text:?}");
    assert_eq!(r.err.as_deref(), Some(err), "grammar {grammar:?} on {text:?}");
}

fn check_grammar_err(grammar: &str, err: &str) {
    match compile_to_parser(grammar, "<string>", CompileOptions::default()) {
        Ok(_) => panic!("grammar {grammar:?} unexpectedly compiled"),
        Err(e) => assert_eq!(e.to_string(), err),
    }
}

fn s(x: &str) -> Value {
    Value::from(x)
}

fn list(xs: Vec<Value>) -> Value {
    Value::List(xs)
}

#[test]
fn test_action() {
    check("grammar = end -> true", "", Value::Bool(true));
    check("grammar = end { true }", "", Value::Bool(true));
}

#[test]
fn test_any_fails() {
    check_err(
        "grammar = any",
        "",
        "<string>:1 Unexpected end of input at column 1",
    );
}

#[test]
fn test_any_matches() {
    check("grammar = any -> $1", "x", s("x"));
}

#[test]
fn test_basic_seq() {
    check("grammar = 'foo' 'bar' -> true", "foobar", Value::Bool(true));
}

#[test]
fn test_simple_seq_value_and_pos() {
    // The value of a sequence is its last value-producing term; `end`
    // does not disturb it.
    let r = parse("g = 'foo' 'bar' end", "foobar");
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(s("bar")));
    assert_eq!(r.pos, 6);
}

#[test]
fn test_bind() {
    check("grammar = 'a'*:v -> v", "aa", list(vec![s("a"), s("a")]));
}

#[test]
fn test_big_int() {
    check(
        "grammar = { 505874924095815700 }",
        "",
        Value::Int(505874924095815700),
    );
}

#[test]
fn test_choice() {
    let g = "grammar = 'foo' -> true\n        | 'bar' -> false";
    check(g, "foo", Value::Bool(true));
    check(g, "bar", Value::Bool(false));
}

#[test]
fn test_choice_with_rewind() {
    check(
        "grammar = 'a' 'b' -> false\n        | 'a' 'c' -> true",
        "ac",
        Value::Bool(true),
    );
}

#[test]
fn test_count() {
    let g = "grammar = 'a'{2,3}:v end -> v";
    check_err(g, "a", "<string>:1 Unexpected end of input at column 2");
    check(g, "aa", list(vec![s("a"), s("a")]));
    check(g, "aaa", list(vec![s("a"), s("a"), s("a")]));
    check_err(g, "aaaa", "<string>:1 Unexpected \"a\" at column 4");
}

#[test]
fn test_empty_alternative() {
    check("grammar = 'a' -> true |", "", Value::Null);
}

#[test]
fn test_end_fails_mid_input() {
    check_err(
        "grammar = 'a' end -> true",
        "ab",
        "<string>:1 Unexpected \"b\" at column 2",
    );
}

#[test]
fn test_error_on_second_line_of_input() {
    check_err(
        "grammar = '1\\n2'",
        "1\nx",
        "<string>:2 Unexpected \"x\" at column 1",
    );
}

#[test]
fn test_error_unexpected_thing() {
    // Scenario S6: the farthest failure wins, one column in.
    check_err(
        "grammar = 'ab' | 'ac'",
        "ad",
        "<string>:1 Unexpected \"d\" at column 2",
    );
}

#[test]
fn test_escapes_in_string() {
    check("grammar = '\\n' -> true", "\n", Value::Bool(true));
    check("grammar = '\\x41' '\\u0042' -> true", "AB", Value::Bool(true));
    check("grammar = '\\U00000020' -> true", " ", Value::Bool(true));
}

#[test]
fn test_c_style_comment_in_grammar() {
    check("grammar = /* foo */ end -> true", "", Value::Bool(true));
    check("// leading\ngrammar = end -> true", "", Value::Bool(true));
}

#[test]
fn test_label() {
    check("grammar = 'foobar':v -> v", "foobar", s("foobar"));
    check("grammar = 'foobar' -> $1", "foobar", s("foobar"));
    check_grammar_err(
        "grammar = 'foobar':$1 -> $1",
        "Errors were found:\n  \"$1\" is a reserved variable name and cannot be explicitly defined\n",
    );
    check_grammar_err(
        "grammar = 'foobar' -> $2",
        "Errors were found:\n  Variable \"$2\" referenced before it was available\n",
    );
}

#[test]
fn test_lit_str() {
    check("grammar = ('foo')* -> true", "foofoo", Value::Bool(true));
}

#[test]
fn test_ll_getitem() {
    check("grammar = end -> ['a', 'b'][1]", "", s("b"));
    check("grammar = end -> [['a']][0][0]", "", s("a"));
}

#[test]
fn test_ll_num() {
    check("grammar = end -> 1", "", Value::Int(1));
    check("grammar = end -> 0x20", "", Value::Int(32));
    check("grammar = end -> 1.5", "", Value::Float(1.5));
}

#[test]
fn test_ll_minus() {
    check("grammar = end -> 1 - 4", "", Value::Int(-3));
}

#[test]
fn test_ll_plus() {
    check(
        "grammar = 'a':a 'b'*:bs -> a + join('', bs)",
        "abb",
        s("abb"),
    );
}

#[test]
fn test_ll_getattr() {
    check("grammar = end -> dict([['k', 3]]).k", "", Value::Int(3));
}

#[test]
fn test_ll_not() {
    check("grammar = end -> !null", "", Value::Bool(true));
    check("grammar = end -> ![1]", "", Value::Bool(false));
}

#[test]
fn test_not_not() {
    check("grammar = ~~('a') 'a' -> true", "a", Value::Bool(true));
}

#[test]
fn test_not_one() {
    check("grammar = ^'a' end -> $1", "b", s("b"));
    check_err(
        "grammar = ^'a' end -> $1",
        "a",
        "<string>:1 Unexpected \"a\" at column 1",
    );
}

#[test]
fn test_ends_in() {
    let r = parse("grammar = <^.'c'>:v end -> v", "abc");
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(s("abc")));
    assert_eq!(r.pos, 3);
}

#[test]
fn test_opt() {
    check("grammar = 'a' 'b'? -> true", "a", Value::Bool(true));
    check("grammar = 'a' 'b'?:v -> v", "ab", list(vec![s("b")]));
    check("grammar = 'a' 'b'?:v -> v", "a", list(vec![]));
}

#[test]
fn test_optional_comma() {
    check("grammar = end -> true,", "", Value::Bool(true));
}

#[test]
fn test_paren_in_value() {
    check("grammar = -> (true)", "", Value::Bool(true));
}

#[test]
fn test_plus() {
    let g = "grammar = 'a'+ -> true";
    check_err(g, "", "<string>:1 Unexpected end of input at column 1");
    check(g, "a", Value::Bool(true));
    check(g, "aa", Value::Bool(true));
}

#[test]
fn test_pred() {
    check("grammar = ?(true) end -> true", "", Value::Bool(true));
    check("grammar = ?{true} end { true }", "", Value::Bool(true));
    check(
        "grammar = ?(false) end -> 'a'\n        | end -> 'b'",
        "",
        s("b"),
    );
    check_err(
        "grammar = ?(\"foo\") end -> false",
        "",
        "<string>:1 Bad predicate value",
    );
}

#[test]
fn test_range() {
    check("grammar = '0'..'9':d -> d", "7", s("7"));
    check_err(
        "grammar = '0'..'9'",
        "x",
        "<string>:1 Unexpected \"x\" at column 1",
    );
}

#[test]
fn test_set() {
    check("grammar = [abc]+:v -> join('', v)", "cab", s("cab"));
    check("grammar = [^abc]:v -> v", "d", s("d"));
}

#[test]
fn test_regexp() {
    check("grammar = /fo+/:v -> v", "fooo", s("fooo"));
    check_err(
        "grammar = /fo+/",
        "f",
        "<string>:1 Unexpected \"f\" at column 1",
    );
}

#[test]
fn test_unicat() {
    check("grammar = \\p{Lu}:v -> v", "A", s("A"));
    check("grammar = \\p{L}+:v -> join('', v)", "Ab", s("Ab"));
    check_err(
        "grammar = \\p{Lu}",
        "a",
        "<string>:1 Unexpected \"a\" at column 1",
    );
}

#[test]
fn test_run() {
    check("grammar = <'a' 'b'+>:v -> v", "abb", s("abb"));
}

#[test]
fn test_equals() {
    check("grammar = 'a':x ={ x } end -> true", "aa", Value::Bool(true));
    check_err(
        "grammar = 'a':x ={ x } end -> true",
        "ab",
        "<string>:1 Unexpected \"b\" at column 2",
    );
}

#[test]
fn test_rule_with_lit_str() {
    check(
        "grammar = foo* -> true\nfoo     = 'foo'",
        "foofoo",
        Value::Bool(true),
    );
}

#[test]
fn test_seq_value() {
    check("grammar = 'foo' 'bar' -> true", "foobar", Value::Bool(true));
}

#[test]
fn test_star() {
    check("grammar = 'a'* -> true", "", Value::Bool(true));
    check("grammar = 'a'* -> true", "a", Value::Bool(true));
    check("grammar = 'a'* -> true", "aa", Value::Bool(true));
}

#[test]
fn test_star_nested() {
    check("grammar = ('a'*)* 'b' -> true", "b", Value::Bool(true));
}

#[test]
fn test_tabs_are_whitespace() {
    check("grammar\t=\t'a'\t->\ttrue", "a", Value::Bool(true));
}

#[test]
fn test_error_on_unknown_var() {
    check_grammar_err(
        "grammar = 'a' -> nope",
        "Errors were found:\n  Unknown variable \"nope\" referenced\n",
    );
}

#[test]
fn test_error_on_unknown_rule() {
    check_grammar_err(
        "grammar = foo",
        "Errors were found:\n  Unknown rule \"foo\"\n",
    );
}

#[test]
fn test_error_on_unknown_function() {
    check_grammar_err(
        "grammar = 'a' -> frob($1)",
        "Errors were found:\n  Unknown function \"frob\" called\n",
    );
}

#[test]
fn test_grammar_parse_error() {
    check_grammar_err(
        "grammar = '",
        "<string>:1 Unexpected end of input at column 12",
    );
}

// ----------------------------------------------------------------------
// Filler.
// ----------------------------------------------------------------------

#[test]
fn test_whitespace_pragma() {
    let g = "%whitespace = ' '+\ngrammar = 'foo' 'bar' end -> true";
    check(g, "foo bar", Value::Bool(true));
    check(g, "foobar", Value::Bool(true));
    check(g, "  foo  bar  ", Value::Bool(true));
    // Tabs are not covered by a space-only whitespace rule.
    let r = parse(g, "foo\tbar");
    assert!(r.err.is_some());
    assert_eq!(r.pos, 3);
}

#[test]
fn test_whitespace_pragma_positions() {
    // Scenario S2.
    let r = parse("%whitespace = ' '+\ng = 'foo' 'bar' end", "foo bar");
    assert_eq!(r.err, None);
    assert_eq!(r.pos, 7);
}

#[test]
fn test_comment_pragma() {
    let g = "%comment = '#' (~'\\n' any)* '\\n'\ngrammar = 'a' 'b' end -> true";
    check(g, "ab", Value::Bool(true));
    check(g, "a# nope\nb", Value::Bool(true));
}

#[test]
fn test_whitespace_and_comment_regexp_fusion() {
    let g = "%whitespace = /[ \\n]+/\n%comment = /#[^\\n]*/\ngrammar = 'a' 'b' end -> true";
    check(g, "ab", Value::Bool(true));
    check(g, "a #x\nb", Value::Bool(true));
}

#[test]
fn test_tokens_pragma() {
    let g = "%tokens = foo bar\n%whitespace = ' '+\ngrammar = (foo bar)+ end -> true\nfoo     = 'f' 'oo'\nbar     = 'bar'";
    check(g, "foobar", Value::Bool(true));
    check(g, "foobar foobar", Value::Bool(true));
    // No filler inside the token rule itself.
    let r = parse(g, "f oobar");
    assert!(r.err.is_some());
}

#[test]
fn test_token_transitive_closure() {
    let g = "%tokens = foo\n%whitespace = ' '+\ngrammar = foo foo end -> true\nfoo     = bar\nbar     = 'b' 'ar'";
    check(g, "bar bar", Value::Bool(true));
    let r = parse(g, "b ar");
    assert!(r.err.is_some());
}

#[test]
fn test_unknown_token_rule() {
    check_grammar_err(
        "%tokens = quux\ngrammar = 'a'",
        "Errors were found:\n  Unknown token rule \"quux\"\n",
    );
}

// ----------------------------------------------------------------------
// Recursion.
// ----------------------------------------------------------------------

#[test]
fn test_recursion_both() {
    // Both-sides recursion is left-associative by default.
    check(
        "expr = expr:l '+' expr:r -> [l, '+', r]\n     | '0'..'9':d        -> d",
        "1+2+3",
        list(vec![list(vec![s("1"), s("+"), s("2")]), s("+"), s("3")]),
    );
}

#[test]
fn test_recursion_left_assoc_with_actions() {
    let g = "expr = expr '+' n -> [$1, '+', $3]\n     | n\nn    = '0'..'9' -> atoi($1, 10)";
    check(
        g,
        "1+2+3",
        list(vec![
            list(vec![Value::Int(1), s("+"), Value::Int(2)]),
            s("+"),
            Value::Int(3),
        ]),
    );
}

#[test]
fn test_recursion_direct_left() {
    check(
        "grammar = grammar:g '+' 'a' -> [g, '+', 'a']\n        | 'a'               -> 'a'",
        "a+a+a",
        list(vec![list(vec![s("a"), s("+"), s("a")]), s("+"), s("a")]),
    );
}

#[test]
fn test_recursion_without_a_label() {
    check(
        "grammar = grammar 'a'\n        | 'a'",
        "aaa",
        s("a"),
    );
}

#[test]
fn test_recursion_direct_right() {
    check(
        "grammar = 'a' '+' grammar:g -> ['a', '+', g]\n        | 'a'               -> 'a'",
        "a+a+a",
        list(vec![s("a"), s("+"), list(vec![s("a"), s("+"), s("a")])]),
    );
}

#[test]
fn test_recursion_indirect_left() {
    check(
        "grammar = b:b '+' 'a'   -> [b, '+', 'a']\n        | 'a'           -> 'a'\nb       = grammar:g     -> g",
        "a+a+a",
        list(vec![list(vec![s("a"), s("+"), s("a")]), s("+"), s("a")]),
    );
}

#[test]
fn test_recursion_indirect_right() {
    check(
        "grammar = 'a' '+' b:b   -> ['a', '+', b]\n        | 'a'           -> 'a'\nb       = grammar:g     -> g",
        "a+a+a",
        list(vec![s("a"), s("+"), list(vec![s("a"), s("+"), s("a")])]),
    );
}

#[test]
fn test_recursion_interior() {
    check(
        "grammar = 'a' grammar:g 'b' -> 'a' + g + 'b' | 'ab' -> 'ab'",
        "aabb",
        s("aabb"),
    );
}

#[test]
fn test_recursion_repeated() {
    check(
        "grammar = grammar:x grammar:y 'a' -> [x, y, 'a']\n        | 'a'                     -> 'a'",
        "aaa",
        list(vec![s("a"), s("a"), s("a")]),
    );
}

#[test]
fn test_recursion_right_assoc_pragma() {
    // Flipping the generated leftrec name to right association
    // unblocks the nested invocation, which then consumes the rest of
    // the input.
    check_err(
        "%assoc grammar#1 right\ngrammar = 'b'?:b grammar:g 'c' -> join('', b) + g + 'c'\n        | 'a'           -> 'a'",
        "bac",
        "<string>:1 Unexpected end of input at column 4",
    );
}

#[test]
fn test_leftrec_with_memoization() {
    // Scenario S5: seeds and the memo cache coexist.
    let p = compile_to_parser(
        "a = a 'x' | 'x'",
        "<string>",
        CompileOptions { memoize: true },
    )
    .unwrap();
    let text = "x".repeat(200);
    let r = p.parse(&text);
    assert_eq!(r.err, None);
    assert_eq!(r.pos, 200);
}

// ----------------------------------------------------------------------
// Operators.
// ----------------------------------------------------------------------

#[test]
fn test_operators() {
    let g = "%prec + -\n%prec * /\n%prec ^\n%assoc ^ right\nexpr = expr '+' expr -> [$1, '+', $3]\n     | expr '-' expr -> [$1, '-', $3]\n     | expr '*' expr -> [$1, '*', $3]\n     | expr '/' expr -> [$1, '/', $3]\n     | expr '^' expr -> [$1, '^', $3]\n     | '0'..'9'";
    check(g, "1", s("1"));
    check(g, "1+2", list(vec![s("1"), s("+"), s("2")]));
    check(
        g,
        "1+2*3",
        list(vec![s("1"), s("+"), list(vec![s("2"), s("*"), s("3")])]),
    );
    check(
        g,
        "1+2-3",
        list(vec![list(vec![s("1"), s("+"), s("2")]), s("-"), s("3")]),
    );
    check(
        g,
        "1^2^3+4*5/6",
        list(vec![
            list(vec![s("1"), s("^"), list(vec![s("2"), s("^"), s("3")])]),
            s("+"),
            list(vec![list(vec![s("4"), s("*"), s("5")]), s("/"), s("6")]),
        ]),
    );
}

#[test]
fn test_operators_precedence_and_right_assoc() {
    // Scenario S4: later %prec lines bind tighter; ^ is right
    // associative.
    let g = "%prec +\n%prec ^\n%assoc ^ right\nexpr = expr '+' expr -> [$1, '+', $3]\n     | expr '^' expr -> [$1, '^', $3]\n     | '0'..'9'";
    check(
        g,
        "1+2^3^4",
        list(vec![
            s("1"),
            s("+"),
            list(vec![s("2"), s("^"), list(vec![s("3"), s("^"), s("4")])]),
        ]),
    );
}

#[test]
fn test_operators_left_assoc_default() {
    let g = "%prec +\nexpr = expr '+' expr -> [$1, '+', $3]\n     | '0'..'9'";
    check(
        g,
        "1+2+3",
        list(vec![list(vec![s("1"), s("+"), s("2")]), s("+"), s("3")]),
    );
}

#[test]
fn test_operators_multichar() {
    let g = "%prec ++\nexpr = expr '++' expr -> [$1, '++', $3]\n     | '0'..'9'";
    check(g, "1++2", list(vec![s("1"), s("++"), s("2")]));
}

#[test]
fn test_operators_with_whitespace() {
    let g = "%whitespace = ' '+\n%prec +\n%prec ^\n%assoc ^ right\nexpr = expr '+' expr -> [$1, '+', $3]\n     | expr '^' expr -> [$1, '^', $3]\n     | '0'..'9'";
    check(
        g,
        "1 + 2 ^ 3",
        list(vec![
            s("1"),
            s("+"),
            list(vec![s("2"), s("^"), s("3")]),
        ]),
    );
}

#[test]
fn test_operator_invalid() {
    check_grammar_err(
        "\n%prec a\nexpr = expr 'a' expr -> [$1, 'a', $3]\n     | '0'..'9'",
        "<string>:2 Unexpected \"a\" at column 7",
    );
}

// ----------------------------------------------------------------------
// Externs.
// ----------------------------------------------------------------------

#[test]
fn test_extern_const_default() {
    check(
        "%externs = greeting -> 'hi'\ng = 'x' -> greeting",
        "x",
        s("hi"),
    );
}

#[test]
fn test_extern_const_override() {
    let p = compile_to_parser(
        "%externs = greeting -> 'hi'\ng = 'x' -> greeting",
        "<string>",
        CompileOptions::default(),
    )
    .unwrap();
    let mut externs = HashMap::new();
    externs.insert(
        "greeting".to_string(),
        ExternValue::Value(Value::from("yo")),
    );
    let r = p.parse_with("x", ParseOptions { externs, ..ParseOptions::default() });
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(s("yo")));
}

#[test]
fn test_extern_func() {
    let p = compile_to_parser(
        "%externs = double -> func\ng = 'x' -> double(2)",
        "<string>",
        CompileOptions::default(),
    )
    .unwrap();
    let mut externs = HashMap::new();
    externs.insert(
        "double".to_string(),
        ExternValue::Func(Rc::new(|args| Ok(Value::Int(args[0].as_int()? * 2)))),
    );
    let r = p.parse_with("x", ParseOptions { externs, ..ParseOptions::default() });
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(Value::Int(4)));
}

#[test]
fn test_extern_pfunc_sees_parser_position() {
    let p = compile_to_parser(
        "%externs = where -> pfunc\ng = 'xy' -> where()",
        "<string>",
        CompileOptions::default(),
    )
    .unwrap();
    let mut externs = HashMap::new();
    externs.insert(
        "where".to_string(),
        ExternValue::PFunc(Rc::new(|view, _args| Ok(Value::Int(view.pos as i64)))),
    );
    let r = p.parse_with("xy", ParseOptions { externs, ..ParseOptions::default() });
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(Value::Int(2)));
}

#[test]
fn test_unknown_extern_name_is_an_error() {
    let p = compile_to_parser("g = 'x' -> true", "<string>", CompileOptions::default())
        .unwrap();
    let mut externs = HashMap::new();
    externs.insert("nope".to_string(), ExternValue::Value(Value::Null));
    let r = p.parse_with("x", ParseOptions { externs, ..ParseOptions::default() });
    assert_eq!(r.err.as_deref(), Some("Missing extern \"nope\""));
    assert_eq!(r.pos, 0);
}

// ----------------------------------------------------------------------
// Memoization and misc runtime behavior.
// ----------------------------------------------------------------------

#[test]
fn test_memoization_is_transparent() {
    let g = "g = r 'b' -> 'rb' | r 'c' -> 'rc'\nr = 'a'";
    for memoize in [false, true] {
        let p = compile_to_parser(g, "<string>", CompileOptions { memoize }).unwrap();
        let r = p.parse("ac");
        assert_eq!(r.err, None);
        assert_eq!(r.val, Some(s("rc")));
    }
}

#[test]
fn test_start_rule_override() {
    let p = compile_to_parser(
        "g = 'a' -> 'top'\nother = 'b' -> 'other'",
        "<string>",
        CompileOptions::default(),
    )
    .unwrap();
    let r = p.parse_with(
        "b",
        ParseOptions { start: Some("other".to_string()), ..ParseOptions::default() },
    );
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(s("other")));
}

#[test]
fn test_recursion_ceiling() {
    let p = compile_to_parser(
        "g = '(' g ')' | 'x'",
        "<string>",
        CompileOptions::default(),
    )
    .unwrap();
    let depth = 64;
    let text = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
    let ok = p.parse_with(&text, ParseOptions { max_depth: 512, ..ParseOptions::default() });
    assert_eq!(ok.err, None);
    let too_deep = p.parse_with(&text, ParseOptions { max_depth: 16, ..ParseOptions::default() });
    assert_eq!(
        too_deep.err.as_deref(),
        Some("Maximum recursion depth exceeded")
    );
}

#[test]
fn test_throw_aborts_the_parse() {
    let r = parse("g = 'a' -> throw('boom')", "a");
    assert_eq!(r.err.as_deref(), Some("boom"));
    assert_eq!(r.val, None);
}

#[test]
fn test_colno_builtin() {
    check("g = 'ab' -> colno()", "ab", Value::Int(3));
    check("g = 'a\\nb' -> colno()", "a\nb", Value::Int(2));
}

#[test]
fn test_pos_builtin() {
    check("g = 'ab' -> pos()", "ab", Value::Int(2));
}

#[test]
fn test_unicode_input_is_code_point_indexed() {
    let r = parse("g = any any end -> pos()", "é¿");
    assert_eq!(r.err, None);
    assert_eq!(r.val, Some(Value::Int(2)));
}

#[test]
fn test_outer_scope_labels() {
    check(
        "g = 'a':a ('b':b -> a + b):v -> v",
        "ab",
        s("ab"),
    );
}
