//! # Sable S-expressions
//!
//! The data model shared by the reader, the pattern engine, the expander and
//! the evaluator. [`SExpr`] carries two representations of a pair chain:
//! plain [`SExpr::Cons`] cells and the flattened [`SExpr::List`] spine the
//! reader produces. Every consumer goes through [`SExpr::uncons`] or
//! [`SExpr::iter`] so the representation never leaks.
//!
//! Values are immutable and cheap to clone; structure is shared through `Rc`.

use std::any::Any;
use std::fmt;
use std::mem;
use std::rc::Rc;

use serde::{Serialize, Serializer};

pub mod fep;
pub mod list;

pub use list::SpineIter;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A symbolic expression.
#[derive(Clone)]
pub enum SExpr {
    Atom(Rc<str>),
    Number(f64),
    Boolean(bool),
    Nil,
    Cons(Rc<SExpr>, Rc<SExpr>),
    List(ListSpine),
    /// A run-time value with no surface syntax, such as a procedure.
    Boxed(Opaque),
}

/// A flattened run of list elements followed by a tail.
///
/// `start` lets `cdr` share the element buffer instead of copying it.
/// The visible slice is never empty.
#[derive(Clone)]
pub struct ListSpine {
    items: Rc<[SExpr]>,
    start: usize,
    tail: Rc<SExpr>,
}

impl ListSpine {
    pub fn items(&self) -> &[SExpr] {
        &self.items[self.start..]
    }

    pub fn tail(&self) -> &SExpr {
        &self.tail
    }

    fn rest(&self) -> SExpr {
        if self.start + 1 < self.items.len() {
            SExpr::List(ListSpine {
                items: Rc::clone(&self.items),
                start: self.start + 1,
                tail: Rc::clone(&self.tail),
            })
        } else {
            (*self.tail).clone()
        }
    }
}

/// An opaque run-time payload, compared by identity.
#[derive(Clone)]
pub struct Opaque {
    tag: &'static str,
    payload: Rc<dyn Any>,
}

impl Opaque {
    pub fn new<T: Any>(tag: &'static str, value: T) -> Self {
        Self {
            tag,
            payload: Rc::new(value),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}>", self.tag)
    }
}

// ============================================================================
// CONSTRUCTORS AND ACCESSORS
// ============================================================================

impl SExpr {
    pub fn atom(name: impl Into<Rc<str>>) -> Self {
        SExpr::Atom(name.into())
    }

    pub fn number(n: f64) -> Self {
        SExpr::Number(n)
    }

    pub fn boolean(b: bool) -> Self {
        SExpr::Boolean(b)
    }

    pub fn nil() -> Self {
        SExpr::Nil
    }

    pub fn cons(car: SExpr, cdr: SExpr) -> Self {
        SExpr::Cons(Rc::new(car), Rc::new(cdr))
    }

    /// A proper list.
    pub fn list(items: Vec<SExpr>) -> Self {
        Self::list_with_tail(items, SExpr::Nil)
    }

    /// A possibly improper list; no items collapses to the tail itself.
    pub fn list_with_tail(items: Vec<SExpr>, tail: SExpr) -> Self {
        if items.is_empty() {
            return tail;
        }
        SExpr::List(ListSpine {
            items: items.into(),
            start: 0,
            tail: Rc::new(tail),
        })
    }

    pub fn boxed(value: Opaque) -> Self {
        SExpr::Boxed(value)
    }

    /// Splits a pair into its first element and the rest.
    pub fn uncons(&self) -> Option<(&SExpr, SExpr)> {
        match self {
            SExpr::Cons(car, cdr) => Some((car.as_ref(), (**cdr).clone())),
            SExpr::List(spine) => Some((&spine.items()[0], spine.rest())),
            _ => None,
        }
    }

    pub fn car(&self) -> Option<&SExpr> {
        match self {
            SExpr::Cons(car, _) => Some(car.as_ref()),
            SExpr::List(spine) => Some(&spine.items()[0]),
            _ => None,
        }
    }

    pub fn cdr(&self) -> Option<SExpr> {
        self.uncons().map(|(_, rest)| rest)
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, SExpr::Atom(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, SExpr::Number(_))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, SExpr::Boolean(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, SExpr::Nil)
    }

    /// True for pairs in either representation.
    pub fn is_list(&self) -> bool {
        matches!(self, SExpr::Cons(..) | SExpr::List(_))
    }

    pub fn is_boxed(&self) -> bool {
        matches!(self, SExpr::Boxed(_))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SExpr::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SExpr::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SExpr::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            SExpr::Boxed(o) => Some(o),
            _ => None,
        }
    }

    /// Only `#f` is false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, SExpr::Boolean(false))
    }

    /// True when `self` is a list whose first element is the symbol `name`.
    pub fn has_head(&self, name: &str) -> bool {
        self.car().and_then(SExpr::as_symbol) == Some(name)
    }

    pub fn iter(&self) -> SpineIter {
        SpineIter::new(self.clone())
    }

    /// The elements of a proper list, `None` for anything else.
    pub fn to_vec(&self) -> Option<Vec<SExpr>> {
        let mut iter = self.iter();
        let items: Vec<SExpr> = iter.by_ref().collect();
        iter.rest().is_nil().then_some(items)
    }

    /// Short description of the value's kind, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SExpr::Atom(_) => "symbol",
            SExpr::Number(_) => "number",
            SExpr::Boolean(_) => "boolean",
            SExpr::Nil => "empty list",
            SExpr::Cons(..) | SExpr::List(_) => "pair",
            SExpr::Boxed(o) => o.tag(),
        }
    }
}

// ============================================================================
// EQUALITY
// ============================================================================

/// Structural equality that ignores the pair representation.
///
/// Walks with an explicit stack, so arbitrarily deep data compares without
/// growing the call stack.
pub fn equals(a: &SExpr, b: &SExpr) -> bool {
    let mut pending = vec![(a.clone(), b.clone())];
    while let Some((x, y)) = pending.pop() {
        if !(x.is_list() && y.is_list()) {
            if !leaf_equals(&x, &y) {
                return false;
            }
            continue;
        }
        let mut left = x.iter();
        let mut right = y.iter();
        loop {
            match (left.next(), right.next()) {
                (Some(l), Some(r)) => pending.push((l, r)),
                (None, None) => {
                    pending.push((left.rest().clone(), right.rest().clone()));
                    break;
                }
                _ => return false,
            }
        }
    }
    true
}

/// Identity for pairs and boxed values, value equality for the rest.
pub fn identical(a: &SExpr, b: &SExpr) -> bool {
    match (a, b) {
        (SExpr::Cons(a1, d1), SExpr::Cons(a2, d2)) => Rc::ptr_eq(a1, a2) && Rc::ptr_eq(d1, d2),
        (SExpr::List(s1), SExpr::List(s2)) => {
            Rc::ptr_eq(&s1.items, &s2.items) && s1.start == s2.start && Rc::ptr_eq(&s1.tail, &s2.tail)
        }
        _ if a.is_list() || b.is_list() => false,
        _ => leaf_equals(a, b),
    }
}

fn leaf_equals(a: &SExpr, b: &SExpr) -> bool {
    match (a, b) {
        (SExpr::Atom(x), SExpr::Atom(y)) => x == y,
        (SExpr::Number(x), SExpr::Number(y)) => x == y,
        (SExpr::Boolean(x), SExpr::Boolean(y)) => x == y,
        (SExpr::Nil, SExpr::Nil) => true,
        (SExpr::Boxed(x), SExpr::Boxed(y)) => x.ptr_eq(y),
        _ => false,
    }
}

impl PartialEq for SExpr {
    fn eq(&self, other: &Self) -> bool {
        equals(self, other)
    }
}

// ============================================================================
// DROP
// ============================================================================

/// Tears nested pairs down from a work stack. The derived drop glue would
/// recurse once per nesting level, and runaway macro output nests deeply.
impl Drop for SExpr {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        detach_children(self, &mut stack);
        while let Some(mut child) = stack.pop() {
            detach_children(&mut child, &mut stack);
        }
    }
}

/// Moves uniquely owned pair children onto `stack`, leaving `Nil` behind.
/// Shared children only lose a reference count.
fn detach_children(expr: &mut SExpr, stack: &mut Vec<SExpr>) {
    let mut take = |slot: &mut SExpr| {
        if slot.is_list() {
            stack.push(mem::replace(slot, SExpr::Nil));
        }
    };
    match expr {
        SExpr::Cons(car, cdr) => {
            if let Some(slot) = Rc::get_mut(car) {
                take(slot);
            }
            if let Some(slot) = Rc::get_mut(cdr) {
                take(slot);
            }
        }
        SExpr::List(spine) => {
            if let Some(items) = Rc::get_mut(&mut spine.items) {
                items.iter_mut().for_each(&mut take);
            }
            if let Some(slot) = Rc::get_mut(&mut spine.tail) {
                take(slot);
            }
        }
        _ => {}
    }
}

// ============================================================================
// PRINTER
// ============================================================================

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

/// True when the reader would take `name` back as the same bare symbol.
fn reads_as_plain_symbol(name: &str) -> bool {
    const DELIMITERS: &[char] = &[' ', '\t', '\r', '\n', '(', ')', '\'', ';', '"', '|'];
    !name.is_empty()
        && name != "."
        && !name.contains(DELIMITERS)
        && !matches!(name, "#t" | "#f" | "#true" | "#false")
        && !looks_like_number(name)
}

fn looks_like_number(text: &str) -> bool {
    let unsigned = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && fraction.map_or(true, digits)
}

fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if reads_as_plain_symbol(name) {
        return f.write_str(name);
    }
    f.write_str("|")?;
    for c in name.chars() {
        if c == '|' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("|")
}

fn write_leaf(f: &mut fmt::Formatter<'_>, value: &SExpr) -> fmt::Result {
    match value {
        SExpr::Atom(name) => write_atom(f, name),
        SExpr::Number(n) => write_number(f, *n),
        SExpr::Boolean(true) => f.write_str("#t"),
        SExpr::Boolean(false) => f.write_str("#f"),
        SExpr::Nil => f.write_str("()"),
        SExpr::Boxed(o) => write!(f, "#<{}>", o.tag()),
        SExpr::Cons(..) | SExpr::List(_) => unreachable!("pairs are printed by the caller"),
    }
}

enum Print {
    Value(SExpr),
    Text(&'static str),
}

/// The printer. Nested lists are laid out from a work stack, not by
/// recursion, so depth is bounded only by memory.
impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Print::Value(self.clone())];
        while let Some(task) = stack.pop() {
            let value = match task {
                Print::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Print::Value(value) => value,
            };
            if !value.is_list() {
                write_leaf(f, &value)?;
                continue;
            }

            let mut iter = value.iter();
            let items: Vec<SExpr> = iter.by_ref().collect();
            stack.push(Print::Text(")"));
            if !iter.rest().is_nil() {
                stack.push(Print::Value(iter.rest().clone()));
                stack.push(Print::Text(" . "));
            }
            for (i, item) in items.into_iter().enumerate().rev() {
                stack.push(Print::Value(item));
                if i > 0 {
                    stack.push(Print::Text(" "));
                }
            }
            f.write_str("(")?;
        }
        Ok(())
    }
}

impl fmt::Debug for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// S-expressions serialize as their printed text.
impl Serialize for SExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<f64> for SExpr {
    fn from(n: f64) -> Self {
        SExpr::Number(n)
    }
}

impl From<bool> for SExpr {
    fn from(b: bool) -> Self {
        SExpr::Boolean(b)
    }
}

impl From<&str> for SExpr {
    fn from(name: &str) -> Self {
        SExpr::atom(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cons_chain(items: &[SExpr], tail: SExpr) -> SExpr {
        items
            .iter()
            .rev()
            .fold(tail, |acc, item| SExpr::cons(item.clone(), acc))
    }

    #[test]
    fn cons_and_list_are_interchangeable() {
        let items = vec![SExpr::from("a"), SExpr::from(1.0), SExpr::from(true)];
        let flat = SExpr::list(items.clone());
        let chain = cons_chain(&items, SExpr::Nil);
        assert_eq!(flat, chain);
        assert_eq!(chain, flat);
        assert_eq!(flat.to_string(), "(a 1 #t)");
        assert_eq!(chain.to_string(), "(a 1 #t)");
    }

    #[test]
    fn mixed_representations_compare_equal() {
        let tail = SExpr::list(vec!["c".into(), "d".into()]);
        let mixed = SExpr::cons("a".into(), SExpr::cons("b".into(), tail));
        let flat = SExpr::list(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert_eq!(mixed, flat);
    }

    #[test]
    fn cdr_shares_the_spine() {
        let list = SExpr::list(vec!["a".into(), "b".into(), "c".into()]);
        let rest = list.cdr().unwrap();
        assert_eq!(rest.to_string(), "(b c)");
        let last = rest.cdr().unwrap().cdr().unwrap();
        assert!(last.is_nil());
    }

    #[test]
    fn empty_spine_collapses_to_tail() {
        assert!(SExpr::list(vec![]).is_nil());
        assert_eq!(SExpr::list_with_tail(vec![], "x".into()), SExpr::from("x"));
    }

    #[test]
    fn improper_lists_print_dotted() {
        let dotted = SExpr::list_with_tail(vec!["a".into(), "b".into()], "c".into());
        assert_eq!(dotted.to_string(), "(a b . c)");
        assert!(dotted.to_vec().is_none());
        assert_eq!(SExpr::cons(1.0.into(), 2.0.into()).to_string(), "(1 . 2)");
    }

    #[test]
    fn lists_of_different_length_differ() {
        let short = SExpr::list(vec!["a".into()]);
        let long = SExpr::list(vec!["a".into(), "b".into()]);
        assert_ne!(short, long);
        assert_ne!(long, short);
        assert_ne!(short, SExpr::list_with_tail(vec!["a".into()], "b".into()));
    }

    #[test]
    fn boxed_values_compare_by_identity() {
        let a = SExpr::boxed(Opaque::new("thing", 1u8));
        let b = SExpr::boxed(Opaque::new("thing", 1u8));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "#<thing>");
    }

    #[test]
    fn unreadable_atoms_print_between_bars() {
        assert_eq!(SExpr::atom("plain").to_string(), "plain");
        assert_eq!(SExpr::atom("#%app").to_string(), "#%app");
        assert_eq!(SExpr::atom("5").to_string(), "|5|");
        assert_eq!(SExpr::atom("-1.5").to_string(), "|-1.5|");
        assert_eq!(SExpr::atom(".5").to_string(), ".5");
        assert_eq!(SExpr::atom("").to_string(), "||");
        assert_eq!(SExpr::atom("a b").to_string(), "|a b|");
        assert_eq!(SExpr::atom(".").to_string(), "|.|");
        assert_eq!(SExpr::atom("#t").to_string(), "|#t|");
        assert_eq!(SExpr::atom(r"x|y\z").to_string(), r"|x\|y\\z|");
    }

    fn nested(depth: usize, wrap: impl Fn(SExpr) -> SExpr) -> SExpr {
        let mut value = SExpr::Nil;
        for _ in 0..depth {
            value = wrap(value);
        }
        value
    }

    #[test]
    fn deep_lists_print_compare_and_drop() {
        let depth = 100_000;
        let flat = nested(depth, |inner| SExpr::list(vec!["g".into(), inner]));
        let chain = nested(depth, |inner| SExpr::cons("g".into(), SExpr::cons(inner, SExpr::Nil)));
        assert_eq!(flat, chain);
        let text = flat.to_string();
        assert!(text.starts_with("(g (g (g"));
        assert_eq!(text.len(), depth * 4 + 2);
        drop(flat);
        drop(chain);
    }

    #[test]
    fn dropping_a_shared_tail_keeps_it_alive() {
        let shared = nested(1_000, |inner| SExpr::list(vec![inner]));
        let outer = SExpr::list(vec!["a".into(), shared.clone()]);
        drop(outer);
        assert_eq!(shared.to_string().matches('(').count(), 1_001);
    }

    #[test]
    fn numbers_print_without_needless_fraction() {
        assert_eq!(SExpr::from(3.0).to_string(), "3");
        assert_eq!(SExpr::from(-2.5).to_string(), "-2.5");
    }
}
