//! Closed 1-based coordinate intervals.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 1-based inclusive interval with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: i32,
    pub end: i32,
}

impl Span {
    /// Build a span, swapping the ends if they arrive reversed.
    #[must_use]
    pub fn new(a: i32, b: i32) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Whole-sequence span used when no window was requested.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            start: 1,
            end: i32::MAX,
        }
    }

    #[must_use]
    pub fn len(self) -> i64 {
        i64::from(self.end) - i64::from(self.start) + 1
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() <= 0
    }

    #[must_use]
    pub fn overlaps(self, other: Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    #[must_use]
    pub fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Portion of `self` inside `window`, if any.
    #[must_use]
    pub fn clamp_to(self, window: Span) -> Option<Span> {
        self.overlaps(window).then(|| Span {
            start: self.start.max(window.start),
            end: self.end.min(window.end),
        })
    }

    #[must_use]
    pub fn union(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_ends() {
        assert_eq!(Span::new(200, 100), Span { start: 100, end: 200 });
        assert_eq!(Span::new(5, 5).len(), 1);
    }

    #[test]
    fn clamp() {
        let window = Span::new(50, 75);
        assert_eq!(Span::new(10, 100).clamp_to(window), Some(window));
        assert_eq!(Span::new(60, 100).clamp_to(window), Some(Span::new(60, 75)));
        assert_eq!(Span::new(76, 100).clamp_to(window), None);
    }

    #[test]
    fn containment_and_union() {
        let outer = Span::new(1, 100);
        assert!(outer.contains(Span::new(1, 100)));
        assert!(!outer.contains(Span::new(0, 10)));
        assert_eq!(Span::new(1, 5).union(Span::new(10, 20)), Span::new(1, 20));
    }
}
