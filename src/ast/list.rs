use super::SExpr;

/// An iterator over the spine of a pair chain.
///
/// Works the same over `Cons` cells and flattened `List` spines, and over
/// mixtures of both. Iteration stops at the first value that is not a pair;
/// that value stays available through [`SpineIter::rest`] so callers can
/// tell a proper list (`Nil` tail) from an improper one.
pub struct SpineIter {
    current: SExpr,
}

impl SpineIter {
    pub fn new(value: SExpr) -> Self {
        SpineIter { current: value }
    }

    /// The part of the chain not yet yielded.
    pub fn rest(&self) -> &SExpr {
        &self.current
    }
}

impl Iterator for SpineIter {
    type Item = SExpr;

    fn next(&mut self) -> Option<Self::Item> {
        let (car, cdr) = self.current.uncons()?;
        let car = car.clone();
        self.current = cdr;
        Some(car)
    }
}
