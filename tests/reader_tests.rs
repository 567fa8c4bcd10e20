use sable::ast::{equals, SExpr};
use sable::engine::read_program;

mod common;
use common::read;

// ---
// Reading and printing
// ---

#[test]
fn printing_then_reading_gives_back_the_datum() {
    let samples = [
        "(a b c)",
        "(define x (quote 1))",
        "(a . b)",
        "(a b . c)",
        "(1 -2 3.5 #t #f)",
        "(#%plain-app f ... ...+)",
        "((nested (lists)) () x)",
    ];
    for text in samples {
        let datum = read(text);
        let printed = datum.to_string();
        assert!(equals(&read(&printed), &datum), "{} printed as {}", text, printed);
    }
}

#[test]
fn quote_comments_and_long_booleans() {
    assert_eq!(read("'x").to_string(), "(quote x)");
    assert_eq!(read("; leading comment\n(a ; inside\n b)").to_string(), "(a b)");
    assert_eq!(read("(#true #false)").to_string(), "(#t #f)");
    assert_eq!(read("(1.0 2.50)").to_string(), "(1 2.5)");
}

#[test]
fn dotted_list_tails_collapse() {
    assert_eq!(read("(list . (xs ...))").to_string(), "(list xs ...)");
    assert_eq!(read("(a . ())").to_string(), "(a)");
}

#[test]
fn cons_chains_equal_flat_lists() {
    let chain = SExpr::cons(
        SExpr::from(1.0),
        SExpr::cons(SExpr::from(2.0), SExpr::nil()),
    );
    let flat = SExpr::list(vec![SExpr::from(1.0), SExpr::from(2.0)]);
    assert!(equals(&chain, &flat));
    assert!(equals(&flat, &chain));
    assert_eq!(chain.to_string(), flat.to_string());
    assert!(!equals(&flat, &SExpr::list(vec![SExpr::from(1.0)])));
}

#[test]
fn symbols_that_look_like_numbers() {
    let data = read_program("1+ -x ... - +", "test").unwrap();
    assert!(data.iter().all(SExpr::is_symbol));
}

// ---
// Reader errors
// ---

#[test]
fn unbalanced_parentheses_are_read_errors() {
    let err = read_program("(define x 42", "test").unwrap_err();
    assert_eq!(err.code(), "sable::read::read");
    assert!(err.to_string().contains("missing closing parenthesis"));

    let err = read_program("x)", "test").unwrap_err();
    assert!(err.to_string().contains("unexpected `)`"));
}

#[test]
fn a_dot_needs_something_before_it() {
    assert!(read_program("( . a)", "test").is_err());
    assert!(read_program("(a . b c)", "test").is_err());
}
