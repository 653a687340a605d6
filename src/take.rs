//! Lazy "first N items" adapter.
//!
//! The bound is checked before each pull, so the input is never asked for
//! item N+1 and a bound of 0 leaves the input untouched.
use std::iter::FusedIterator;

/// Errors for bounds that arrive as signed numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundError {
    /// A negative item count.
    Negative { n: i64 },
}

impl std::fmt::Display for BoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundError::Negative { n } => {
                write!(f, "take bound must be >= 0, got {}", n)
            }
        }
    }
}

impl std::error::Error for BoundError {}

/// Iterator returned by [`bounded_take`].
#[derive(Debug, Clone)]
pub struct BoundedTake<I> {
    iter: I,
    remaining: usize,
}

/// Yield at most the first `n` items of `iter`.
pub fn bounded_take<I: IntoIterator>(iter: I, n: usize) -> BoundedTake<I::IntoIter> {
    BoundedTake {
        iter: iter.into_iter(),
        remaining: n,
    }
}

/// [`bounded_take`] for a bound that may be negative, e.g. from user input.
pub fn try_bounded_take<I: IntoIterator>(
    iter: I,
    n: i64,
) -> Result<BoundedTake<I::IntoIter>, BoundError> {
    let n = usize::try_from(n).map_err(|_| BoundError::Negative { n })?;
    Ok(bounded_take(iter, n))
}

impl<I> BoundedTake<I> {
    /// Items still allowed through.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<I: Iterator> Iterator for BoundedTake<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.iter.next();
        // Exhausted inputs close the bound too, so nothing is pulled again.
        self.remaining = match item {
            Some(_) => self.remaining - 1,
            None => 0,
        };
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            return (0, Some(0));
        }
        let (lower, upper) = self.iter.size_hint();
        let lower = lower.min(self.remaining);
        let upper = match upper {
            Some(upper) => upper.min(self.remaining),
            None => self.remaining,
        };
        (lower, Some(upper))
    }
}

impl<I: Iterator> FusedIterator for BoundedTake<I> {}
