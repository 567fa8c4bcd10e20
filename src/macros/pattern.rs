//! Structural patterns: matching programs and instantiating templates.
//!
//! A [`Pattern`] is matched against an [`SExpr`] to produce a
//! [`MatchObject`], and a `MatchObject` is fed back through a pattern (used
//! as a template) by [`unmatch`]. For single-level ellipses the two are
//! inverses: `unmatch(match(p, P), P) == p`. An ellipsis over a sub-pattern
//! with no variables has nothing to capture, so the match records how many
//! times it repeated and `unmatch` replays that count.
//!
//! Captures are flat per variable. Nested ellipses over the same variable
//! therefore lose their grouping on the way back out.

use std::collections::HashMap;

use crate::ast::SExpr;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A literal a pattern compares against.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Atom(String),
    Number(f64),
    Boolean(bool),
    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternLeaf {
    /// Captures anything.
    Variable(String),
    /// Captures atoms only.
    SymbolVariable(String),
    /// Greedy repetition of the first pattern, then the tail pattern.
    ZeroOrMore(Box<Pattern>, Box<Pattern>),
    OneOrMore(Box<Pattern>, Box<Pattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Datum(Datum),
    Pair(Box<Pattern>, Box<Pattern>),
    Leaf(PatternLeaf),
}

/// Captures by variable name, in program order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchObject {
    captures: HashMap<String, Vec<SExpr>>,
    /// Repetition counts of variable-free ellipses, keyed by sub-pattern.
    repetitions: HashMap<String, Vec<usize>>,
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

impl Datum {
    pub fn from_sexpr(value: &SExpr) -> Option<Self> {
        match value {
            SExpr::Atom(name) => Some(Datum::Atom(name.to_string())),
            SExpr::Number(n) => Some(Datum::Number(*n)),
            SExpr::Boolean(b) => Some(Datum::Boolean(*b)),
            SExpr::Nil => Some(Datum::Nil),
            _ => None,
        }
    }

    pub fn to_sexpr(&self) -> SExpr {
        match self {
            Datum::Atom(name) => SExpr::atom(name.as_str()),
            Datum::Number(n) => SExpr::number(*n),
            Datum::Boolean(b) => SExpr::boolean(*b),
            Datum::Nil => SExpr::Nil,
        }
    }

    fn matches(&self, program: &SExpr) -> bool {
        match (self, program) {
            (Datum::Atom(a), SExpr::Atom(b)) => a.as_str() == &**b,
            (Datum::Number(a), SExpr::Number(b)) => a == b,
            (Datum::Boolean(a), SExpr::Boolean(b)) => a == b,
            (Datum::Nil, SExpr::Nil) => true,
            _ => false,
        }
    }
}

impl Pattern {
    pub fn var(name: &str) -> Self {
        Pattern::Leaf(PatternLeaf::Variable(name.to_string()))
    }

    pub fn sym_var(name: &str) -> Self {
        Pattern::Leaf(PatternLeaf::SymbolVariable(name.to_string()))
    }

    pub fn literal(name: &str) -> Self {
        Pattern::Datum(Datum::Atom(name.to_string()))
    }

    pub fn nil() -> Self {
        Pattern::Datum(Datum::Nil)
    }

    pub fn pair(car: Pattern, cdr: Pattern) -> Self {
        Pattern::Pair(Box::new(car), Box::new(cdr))
    }

    /// A proper list of patterns.
    pub fn list(items: Vec<Pattern>) -> Self {
        items
            .into_iter()
            .rev()
            .fold(Pattern::nil(), |tail, item| Pattern::pair(item, tail))
    }

    pub fn zero_or_more(sub: Pattern, tail: Pattern) -> Self {
        Pattern::Leaf(PatternLeaf::ZeroOrMore(Box::new(sub), Box::new(tail)))
    }

    pub fn one_or_more(sub: Pattern, tail: Pattern) -> Self {
        Pattern::Leaf(PatternLeaf::OneOrMore(Box::new(sub), Box::new(tail)))
    }

    /// Every variable name in the pattern, left to right.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Pattern::Datum(_) => {}
            Pattern::Pair(car, cdr) => {
                car.collect_variables(names);
                cdr.collect_variables(names);
            }
            Pattern::Leaf(PatternLeaf::Variable(n) | PatternLeaf::SymbolVariable(n)) => {
                if !names.contains(n) {
                    names.push(n.clone());
                }
            }
            Pattern::Leaf(PatternLeaf::ZeroOrMore(sub, tail) | PatternLeaf::OneOrMore(sub, tail)) => {
                sub.collect_variables(names);
                tail.collect_variables(names);
            }
        }
    }
}

impl MatchObject {
    /// All captures for `name`; empty when it captured nothing.
    pub fn get(&self, name: &str) -> &[SExpr] {
        self.captures.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&SExpr> {
        self.get(name).first()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.captures.contains_key(name)
    }

    pub fn capture(&mut self, name: &str, value: SExpr) {
        self.captures.entry(name.to_string()).or_default().push(value);
    }

    fn declare(&mut self, name: &str) {
        self.captures.entry(name.to_string()).or_default();
    }

    /// Append another delta's captures after this one's.
    pub fn merge(&mut self, other: MatchObject) {
        for (name, values) in other.captures {
            self.captures.entry(name).or_default().extend(values);
        }
        for (key, counts) in other.repetitions {
            self.repetitions.entry(key).or_default().extend(counts);
        }
    }

    /// How often each variable-free ellipsis over `sub` repeated, in order.
    pub fn repetitions(&self, sub: &Pattern) -> &[usize] {
        self.repetitions
            .get(&repetition_key(sub))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn record_repetition(&mut self, sub: &Pattern, count: usize) {
        self.repetitions.entry(repetition_key(sub)).or_default().push(count);
    }
}

fn repetition_key(sub: &Pattern) -> String {
    format!("{:?}", sub)
}

// ============================================================================
// MATCHING
// ============================================================================

/// Match `program` against `pattern`.
///
/// Each recursive call builds its own delta; a failed branch contributes
/// nothing to the result.
pub fn match_pattern(program: &SExpr, pattern: &Pattern) -> Option<MatchObject> {
    match pattern {
        Pattern::Datum(datum) => datum.matches(program).then(MatchObject::default),
        Pattern::Pair(car_pattern, cdr_pattern) => {
            let (car, cdr) = program.uncons()?;
            let mut delta = match_pattern(car, car_pattern)?;
            delta.merge(match_pattern(&cdr, cdr_pattern)?);
            Some(delta)
        }
        Pattern::Leaf(PatternLeaf::Variable(name)) => {
            let mut delta = MatchObject::default();
            delta.capture(name, program.clone());
            Some(delta)
        }
        Pattern::Leaf(PatternLeaf::SymbolVariable(name)) => {
            if !program.is_symbol() {
                return None;
            }
            let mut delta = MatchObject::default();
            delta.capture(name, program.clone());
            Some(delta)
        }
        Pattern::Leaf(PatternLeaf::ZeroOrMore(sub, tail)) => match_repetition(program, sub, tail, 0),
        Pattern::Leaf(PatternLeaf::OneOrMore(sub, tail)) => match_repetition(program, sub, tail, 1),
    }
}

fn match_repetition(program: &SExpr, sub: &Pattern, tail: &Pattern, min: usize) -> Option<MatchObject> {
    let mut delta = MatchObject::default();
    for name in sub.variables() {
        delta.declare(&name);
    }

    let mut remaining = program.clone();
    let mut count = 0;
    loop {
        let Some((item, rest)) = remaining.uncons() else {
            break;
        };
        let Some(step) = match_pattern(item, sub) else {
            break;
        };
        delta.merge(step);
        remaining = rest;
        count += 1;
    }

    if count < min {
        return None;
    }
    if sub.variables().is_empty() {
        delta.record_repetition(sub, count);
    }
    delta.merge(match_pattern(&remaining, tail)?);
    Some(delta)
}

// ============================================================================
// UNMATCHING
// ============================================================================

/// Read position into a [`MatchObject`], one index per variable.
///
/// Cloning a cursor is a snapshot; assigning it back commits.
#[derive(Debug, Clone)]
pub struct UnmatchCursor<'m> {
    matches: &'m MatchObject,
    positions: HashMap<String, usize>,
    repetition_positions: HashMap<String, usize>,
    consumed: usize,
}

impl<'m> UnmatchCursor<'m> {
    pub fn new(matches: &'m MatchObject) -> Self {
        Self {
            matches,
            positions: HashMap::new(),
            repetition_positions: HashMap::new(),
            consumed: 0,
        }
    }

    /// Take the next capture for `name`.
    pub fn next(&mut self, name: &str) -> Option<SExpr> {
        let position = self.positions.get(name).copied().unwrap_or(0);
        let value = self.matches.get(name).get(position)?.clone();
        self.positions.insert(name.to_string(), position + 1);
        self.consumed += 1;
        Some(value)
    }

    /// Take the next recorded count for a variable-free ellipsis over `sub`.
    pub fn next_repetition(&mut self, sub: &Pattern) -> Option<usize> {
        let key = repetition_key(sub);
        let position = self.repetition_positions.get(&key).copied().unwrap_or(0);
        let count = *self.matches.repetitions(sub).get(position)?;
        self.repetition_positions.insert(key, position + 1);
        Some(count)
    }

    /// Total captures taken so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// Instantiate `pattern` as a template from `matches`.
pub fn unmatch(matches: &MatchObject, pattern: &Pattern) -> Option<SExpr> {
    let mut cursor = UnmatchCursor::new(matches);
    unmatch_with(&mut cursor, pattern)
}

pub fn unmatch_with(cursor: &mut UnmatchCursor<'_>, pattern: &Pattern) -> Option<SExpr> {
    match pattern {
        Pattern::Datum(datum) => Some(datum.to_sexpr()),
        Pattern::Pair(car_pattern, cdr_pattern) => {
            let car = unmatch_with(cursor, car_pattern)?;
            let cdr = unmatch_with(cursor, cdr_pattern)?;
            Some(SExpr::cons(car, cdr))
        }
        Pattern::Leaf(PatternLeaf::Variable(name) | PatternLeaf::SymbolVariable(name)) => cursor.next(name),
        Pattern::Leaf(PatternLeaf::ZeroOrMore(sub, tail)) => unmatch_repetition(cursor, sub, tail, 0),
        Pattern::Leaf(PatternLeaf::OneOrMore(sub, tail)) => unmatch_repetition(cursor, sub, tail, 1),
    }
}

fn unmatch_repetition(
    cursor: &mut UnmatchCursor<'_>,
    sub: &Pattern,
    tail: &Pattern,
    min: usize,
) -> Option<SExpr> {
    if sub.variables().is_empty() {
        if let Some(count) = cursor.next_repetition(sub) {
            let items = (0..count)
                .map(|_| unmatch_with(cursor, sub))
                .collect::<Option<Vec<_>>>()?;
            let tail = unmatch_with(cursor, tail)?;
            return Some(SExpr::list_with_tail(items, tail));
        }
    }

    let mut items = Vec::new();
    loop {
        let mut attempt = cursor.clone();
        let Some(item) = unmatch_with(&mut attempt, sub) else {
            break;
        };
        let progressed = attempt.consumed() > cursor.consumed();
        if !progressed && items.len() >= min {
            break;
        }
        items.push(item);
        *cursor = attempt;
        if !progressed {
            break;
        }
    }

    if items.len() < min {
        return None;
    }
    let tail = unmatch_with(cursor, tail)?;
    Some(SExpr::list_with_tail(items, tail))
}
