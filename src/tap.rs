//! Passthrough adapters that run a callback on every item.
//!
//! Each step fetches one item, calls the callback with its zero-based index,
//! then yields the item. Nothing is buffered.
use std::iter::FusedIterator;

/// Iterator returned by [`tap`].
#[derive(Clone)]
pub struct SideEffectTap<I, F> {
    iter: I,
    index: usize,
    f: F,
}

/// Yield `iter` unchanged, calling `f(index, &item)` before each item.
///
/// ```
/// let mut seen = Vec::new();
/// let items: Vec<_> = iter8::tap([7, 8], |i, x| seen.push((i, *x))).collect();
/// assert_eq!(items, [7, 8]);
/// assert_eq!(seen, [(0, 7), (1, 8)]);
/// ```
pub fn tap<I, F>(iter: I, f: F) -> SideEffectTap<I::IntoIter, F>
where
    I: IntoIterator,
    F: FnMut(usize, &I::Item),
{
    SideEffectTap {
        iter: iter.into_iter(),
        index: 0,
        f,
    }
}

impl<I, F> Iterator for SideEffectTap<I, F>
where
    I: Iterator,
    F: FnMut(usize, &I::Item),
{
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let item = self.iter.next()?;
        (self.f)(self.index, &item);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<I, F> FusedIterator for SideEffectTap<I, F>
where
    I: FusedIterator,
    F: FnMut(usize, &I::Item),
{
}

impl<I: std::fmt::Debug, F> std::fmt::Debug for SideEffectTap<I, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffectTap")
            .field("iter", &self.iter)
            .field("index", &self.index)
            .finish()
    }
}

/// Iterator returned by [`try_tap`].
pub struct TryTap<I, F> {
    iter: I,
    index: usize,
    f: F,
    failed: bool,
}

/// Like [`tap`] with a fallible callback.
///
/// Items come out as `Ok`. The first `Err` from the callback is yielded in
/// place of its item and ends the iteration.
pub fn try_tap<I, F, E>(iter: I, f: F) -> TryTap<I::IntoIter, F>
where
    I: IntoIterator,
    F: FnMut(usize, &I::Item) -> Result<(), E>,
{
    TryTap {
        iter: iter.into_iter(),
        index: 0,
        f,
        failed: false,
    }
}

impl<I, F, E> Iterator for TryTap<I, F>
where
    I: Iterator,
    F: FnMut(usize, &I::Item) -> Result<(), E>,
{
    type Item = Result<I::Item, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.iter.next()?;
        if let Err(e) = (self.f)(self.index, &item) {
            self.failed = true;
            return Some(Err(e));
        }
        self.index += 1;
        Some(Ok(item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            self.iter.size_hint()
        }
    }
}
