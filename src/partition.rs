//! Single-pass split of a sequence into two ordered `Vec`s.
//!
//! Both halves are materialized, so an infinite input never returns.

/// Split `iter` into `(matching, rest)` by `pred`, keeping relative order.
pub fn partition<I, P>(iter: I, mut pred: P) -> (Vec<I::Item>, Vec<I::Item>)
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> bool,
{
    let mut matching = Vec::new();
    let mut rest = Vec::new();
    for item in iter {
        if pred(&item) {
            matching.push(item);
        } else {
            rest.push(item);
        }
    }
    (matching, rest)
}

/// [`partition`] with a fallible predicate; the first error is returned as-is.
pub fn try_partition<I, P, E>(iter: I, mut pred: P) -> Result<(Vec<I::Item>, Vec<I::Item>), E>
where
    I: IntoIterator,
    P: FnMut(&I::Item) -> Result<bool, E>,
{
    let mut matching = Vec::new();
    let mut rest = Vec::new();
    for item in iter {
        if pred(&item)? {
            matching.push(item);
        } else {
            rest.push(item);
        }
    }
    Ok((matching, rest))
}
