use sable::ast::SExpr;
use sable::macros::{compile_pattern, instantiate, match_pattern, match_shorthand, unmatch, Pattern};

mod common;
use common::read;

fn numbers(values: &[SExpr]) -> Vec<f64> {
    values.iter().filter_map(SExpr::as_number).collect()
}

#[test]
fn zero_or_more_captures_every_element() {
    let m = match_shorthand("(list . (xs ...))", &read("(list 1 2 3)")).unwrap().unwrap();
    assert_eq!(numbers(m.get("xs")), vec![1.0, 2.0, 3.0]);
}

#[test]
fn zero_or_more_accepts_no_elements() {
    let m = match_shorthand("(list . (xs ...))", &read("(list)")).unwrap().unwrap();
    assert!(m.contains("xs"));
    assert!(m.get("xs").is_empty());
}

#[test]
fn one_or_more_needs_an_element() {
    assert!(match_shorthand("(list xs ...+)", &read("(list)")).unwrap().is_none());
    assert!(match_shorthand("(list xs ...+)", &read("(list 1)")).unwrap().is_some());
}

#[test]
fn literals_and_symbol_variables() {
    assert!(match_shorthand("('let sym-x v)", &read("(let y 1)")).unwrap().is_some());
    assert!(match_shorthand("('let sym-x v)", &read("(let 2 1)")).unwrap().is_none());
    assert!(match_shorthand("('let sym-x v)", &read("(lez y 1)")).unwrap().is_none());
}

#[test]
fn unmatch_inverts_match() {
    let cases = [
        ("(a b ...)", "(f 1 2 3)"),
        ("(a b ...)", "(f)"),
        ("((k v) ...)", "((a 1) (b 2))"),
        ("(a . rest)", "(1 2 . 3)"),
        ("('define sym-name rhs)", "(define x (+ 1 2))"),
        ("(head xs ...+ . tail)", "(h 1 2 . t)"),
        ("('k ... x)", "(k k 5)"),
        ("('k ... x)", "(5)"),
        ("(a ('k ...) ...)", "(f (k) () (k k))"),
    ];
    for (source, text) in cases {
        let pattern = compile_pattern(source).unwrap();
        let form = read(text);
        let m = match_pattern(&form, &pattern).unwrap_or_else(|| panic!("{} should match {}", source, text));
        let rebuilt = unmatch(&m, &pattern).unwrap();
        assert_eq!(rebuilt, form, "{} on {}", source, text);
    }
}

#[test]
fn templates_rearrange_captures() {
    let m = match_shorthand("('let ((sym-n v) ...) body ...+)", &read("(let ((a 1) (b 2)) (+ a b))"))
        .unwrap()
        .unwrap();
    let out = instantiate("(('lambda (sym-n ...) body ...+) v ...)", &m).unwrap();
    assert_eq!(out.to_string(), "((lambda (a b) (+ a b)) 1 2)");
}

#[test]
fn hand_built_patterns_match_like_shorthand() {
    let pattern = Pattern::list(vec![Pattern::literal("quote"), Pattern::var("d")]);
    let m = match_pattern(&read("(quote (1 2))"), &pattern).unwrap();
    assert_eq!(m.first("d").unwrap().to_string(), "(1 2)");
    assert!(match_pattern(&read("(quote 1 2)"), &pattern).is_none());
}

#[test]
fn malformed_shorthand_is_a_pattern_error() {
    let err = compile_pattern("(... x)").unwrap_err();
    assert_eq!(err.code(), "sable::compile::pattern");
}
