//! Sable Reader
//!
//! Converts source text into s-expressions. Purely syntactic: `'d` becomes
//! `(quote d)` and nothing else is rewritten. Read errors carry the byte span
//! of the offending input.

use pest::{error::Error, error::InputLocation, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::ast::SExpr;
use crate::errors::{ErrorKind, ErrorReporting, SableError, SourceContext, Span};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct SableParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Read every datum in `source_text`.
pub fn parse(source_text: &str, source: &SourceContext) -> Result<Vec<SExpr>, SableError> {
    let mut pairs = SableParser::parse(Rule::program, source_text)
        .map_err(|e| convert_parse_error(e, source_text, source))?;

    let Some(program) = pairs.next() else {
        return Ok(vec![]);
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_datum(p, source))
        .collect()
}

/// Read exactly one datum.
pub fn parse_one(source_text: &str, source: &SourceContext) -> Result<SExpr, SableError> {
    let mut data = parse(source_text, source)?;
    if data.len() != 1 {
        return Err(source
            .report(ErrorKind::Read {
                message: format!("expected exactly one datum, found {}", data.len()),
            })
            .with_source(source, Span::new(0, source_text.len())));
    }
    Ok(data.remove(0))
}

// ============================================================================
// DATUM BUILDERS
// ============================================================================

fn build_datum(pair: Pair<Rule>, source: &SourceContext) -> Result<SExpr, SableError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::boolean => Ok(SExpr::boolean(matches!(pair.as_str(), "#t" | "#true"))),

        Rule::number => {
            let text = pair.as_str();
            text.parse::<f64>().map(SExpr::number).map_err(|_| {
                make_error(source, format!("invalid number literal {}", text), span)
            })
        }

        Rule::symbol => Ok(SExpr::atom(pair.as_str())),

        Rule::bar_symbol => Ok(SExpr::atom(unescape_bars(pair.as_str()))),

        Rule::quoted => {
            let Some(inner) = pair.into_inner().next() else {
                return Err(make_error(source, "expected a datum after '".into(), span));
            };
            let datum = build_datum(inner, source)?;
            Ok(SExpr::list(vec![SExpr::atom("quote"), datum]))
        }

        Rule::list => {
            let mut items = Vec::new();
            let mut tail = SExpr::Nil;
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::dotted_tail {
                    let Some(datum) = inner.into_inner().next() else {
                        return Err(make_error(source, "expected a datum after .".into(), span));
                    };
                    tail = build_datum(datum, source)?;
                } else {
                    items.push(build_datum(inner, source)?);
                }
            }
            if items.is_empty() && !tail.is_nil() {
                return Err(make_error(
                    source,
                    "illegal use of `.` without a preceding datum".into(),
                    span,
                ));
            }
            Ok(SExpr::list_with_tail(items, tail))
        }

        other => Err(make_error(source, format!("unexpected {:?}", other), span)),
    }
}

/// `|a\|b|` reads as the symbol `a|b`.
fn unescape_bars(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut name = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => name.extend(chars.next()),
            c => name.push(c),
        }
    }
    name
}

fn get_span(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn make_error(source: &SourceContext, message: String, span: Span) -> SableError {
    source
        .report(ErrorKind::Read { message })
        .with_source(source, span)
}

fn convert_parse_error(error: Error<Rule>, source_text: &str, source: &SourceContext) -> SableError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span::new(pos, pos),
        InputLocation::Span((start, end)) => Span::new(start, end),
    };

    let remaining = source_text.get(span.start..).unwrap_or("");
    let unclosed = source_text.matches('(').count() > source_text.matches(')').count();
    if unclosed {
        make_error(source, "missing closing parenthesis".into(), span)
    } else if remaining.starts_with(')') {
        make_error(source, "unexpected `)`".into(), span)
            .with_help("remove the extra closing parenthesis")
    } else {
        make_error(source, error.variant.message().to_string(), span)
    }
}
