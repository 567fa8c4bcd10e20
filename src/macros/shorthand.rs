//! Textual pattern shorthand.
//!
//! Patterns are written as s-expressions:
//!
//! - `'x` is the literal atom `x` (any quoted datum is a literal)
//! - `sym-foo` captures an atom as `foo`
//! - any other bare symbol captures anything
//! - numbers, booleans and `()` are literals
//! - `(p ... . rest)` and `(p ...+ . rest)` are repetitions
//!
//! Compiled patterns are cached for the life of the process, keyed by their
//! source text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use super::pattern::{match_pattern, unmatch, Datum, MatchObject, Pattern};
use crate::ast::SExpr;
use crate::errors::{ErrorKind, SableError, SourceContext};
use crate::syntax;

const ELLIPSIS: &str = "...";
const ELLIPSIS_PLUS: &str = "...+";
const SYMBOL_PREFIX: &str = "sym-";

static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Arc<Pattern>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Compile (or fetch from the cache) the pattern written as `source`.
pub fn compile_pattern(source: &str) -> Result<Arc<Pattern>, SableError> {
    if let Some(pattern) = PATTERN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(source)
    {
        return Ok(Arc::clone(pattern));
    }

    let context = SourceContext::from_file("<pattern>", source);
    let datum = syntax::parse_one(source, &context).map_err(|e| pattern_error(source, &e.to_string()))?;
    let pattern = Arc::new(translate(&datum, source)?);

    PATTERN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(source.to_string(), Arc::clone(&pattern));
    Ok(pattern)
}

/// Match `form` against the shorthand pattern `source`.
pub fn match_shorthand(source: &str, form: &SExpr) -> Result<Option<MatchObject>, SableError> {
    let pattern = compile_pattern(source)?;
    Ok(match_pattern(form, &pattern))
}

/// Instantiate the shorthand template `source` from `matches`.
pub fn instantiate(source: &str, matches: &MatchObject) -> Result<SExpr, SableError> {
    let pattern = compile_pattern(source)?;
    unmatch(matches, &pattern)
        .ok_or_else(|| pattern_error(source, "template variables do not fit the captures"))
}

// ============================================================================
// TRANSLATION
// ============================================================================

fn translate(datum: &SExpr, source: &str) -> Result<Pattern, SableError> {
    match datum {
        SExpr::Atom(name) if &**name == ELLIPSIS || &**name == ELLIPSIS_PLUS => Err(pattern_error(
            source,
            &format!("{} must follow a sub-pattern", name),
        )),
        SExpr::Atom(name) => Ok(match name.strip_prefix(SYMBOL_PREFIX) {
            Some(stripped) if !stripped.is_empty() => Pattern::sym_var(stripped),
            _ => Pattern::var(name),
        }),
        SExpr::Number(_) | SExpr::Boolean(_) | SExpr::Nil => literal(datum, source),
        SExpr::Boxed(_) => Err(pattern_error(source, "boxed values cannot appear in patterns")),
        SExpr::Cons(..) | SExpr::List(_) => {
            if datum.has_head("quote") {
                if let Some([quoted]) = datum.cdr().and_then(|rest| rest.to_vec()).as_deref() {
                    return literal(quoted, source);
                }
            }
            translate_list(datum, source)
        }
    }
}

/// Translate a pair, recognizing an ellipsis after its first element.
fn translate_list(datum: &SExpr, source: &str) -> Result<Pattern, SableError> {
    let Some((head, rest)) = datum.uncons() else {
        return translate(datum, source);
    };

    if let Some((marker, after)) = rest.uncons() {
        match marker.as_symbol() {
            Some(ELLIPSIS) => {
                return Ok(Pattern::zero_or_more(
                    translate(head, source)?,
                    translate_tail(&after, source)?,
                ))
            }
            Some(ELLIPSIS_PLUS) => {
                return Ok(Pattern::one_or_more(
                    translate(head, source)?,
                    translate_tail(&after, source)?,
                ))
            }
            _ => {}
        }
    }

    Ok(Pattern::pair(translate(head, source)?, translate_tail(&rest, source)?))
}

fn translate_tail(datum: &SExpr, source: &str) -> Result<Pattern, SableError> {
    if datum.is_list() {
        translate_list(datum, source)
    } else {
        translate(datum, source)
    }
}

/// A pattern that matches exactly `datum`.
fn literal(datum: &SExpr, source: &str) -> Result<Pattern, SableError> {
    if let Some(d) = Datum::from_sexpr(datum) {
        return Ok(Pattern::Datum(d));
    }
    match datum.uncons() {
        Some((car, cdr)) => Ok(Pattern::pair(literal(car, source)?, literal(&cdr, source)?)),
        None => Err(pattern_error(source, "boxed values cannot appear in patterns")),
    }
}

fn pattern_error(source: &str, reason: &str) -> SableError {
    SableError::new(ErrorKind::Pattern {
        pattern: source.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::pattern::PatternLeaf;

    #[test]
    fn quoted_atoms_are_literals() {
        let pattern = compile_pattern("('quote datum)").unwrap();
        assert_eq!(
            *pattern,
            Pattern::list(vec![Pattern::literal("quote"), Pattern::var("datum")])
        );
    }

    #[test]
    fn sym_prefix_makes_symbol_variables() {
        let pattern = compile_pattern("sym-name").unwrap();
        assert_eq!(
            *pattern,
            Pattern::Leaf(PatternLeaf::SymbolVariable("name".into()))
        );
    }

    #[test]
    fn ellipsis_takes_the_rest_as_tail() {
        let pattern = compile_pattern("(f args ... . more)").unwrap();
        assert_eq!(
            *pattern,
            Pattern::pair(
                Pattern::var("f"),
                Pattern::zero_or_more(Pattern::var("args"), Pattern::var("more"))
            )
        );
    }

    #[test]
    fn leading_ellipsis_is_an_error() {
        let err = compile_pattern("(... x)").unwrap_err();
        assert_eq!(err.code(), "sable::compile::pattern");
    }

    #[test]
    fn unreadable_shorthand_is_an_error() {
        assert!(compile_pattern("(a b").is_err());
    }

    #[test]
    fn cache_returns_the_same_pattern() {
        let a = compile_pattern("(cached x ...)").unwrap();
        let b = compile_pattern("(cached x ...)").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn match_and_instantiate_round_trip() {
        let form = SExpr::list(vec!["#%app".into(), "f".into(), 1.0.into(), 2.0.into()]);
        let m = match_shorthand("('#%app f args ...)", &form).unwrap().unwrap();
        let out = instantiate("('#%plain-app f args ...)", &m).unwrap();
        assert_eq!(out.to_string(), "(#%plain-app f 1 2)");
    }
}
