use std::collections::VecDeque;

/// Bounded first-in first-out staging buffer.
#[derive(Debug, Clone)]
pub(crate) struct Fifo<T> {
  items: VecDeque<T>,
  depth: usize,
}

impl<T> Fifo<T> {
  pub(crate) fn new(depth: usize) -> Self {
    Self {
      items: VecDeque::with_capacity(depth),
      depth,
    }
  }

  /// Appends `item`, or hands it back if the FIFO is full.
  #[inline]
  pub(crate) fn push(&mut self, item: T) -> Result<(), T> {
    if self.is_full() {
      return Err(item);
    }
    self.items.push_back(item);
    Ok(())
  }

  /// Puts `item` back at the front. May exceed the depth by the one item that
  /// was just popped.
  #[inline]
  pub(crate) fn unpop(&mut self, item: T) {
    self.items.push_front(item);
  }

  #[inline]
  pub(crate) fn pop(&mut self) -> Option<T> {
    self.items.pop_front()
  }

  #[inline]
  pub(crate) fn remove(&mut self, idx: usize) -> Option<T> {
    self.items.remove(idx)
  }

  #[inline]
  pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
    self.items.iter()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.items.len()
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  #[inline]
  pub(crate) fn is_full(&self) -> bool {
    self.items.len() >= self.depth
  }
}
