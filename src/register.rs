use crate::{Entry, Rank};

/// A small fixed-width buffer holding the smallest known entries of a shard.
///
/// Slots are kept in arrival order; the minimum and maximum are found by a
/// linear scan, which is what the hardware register does within its fixed
/// latency. Ties resolve towards arrival order: the earliest of equal minimums
/// leaves first and the latest of equal maximums is evicted first.
#[derive(Debug, Clone)]
pub struct OutputRegister {
  slots: Vec<Entry>,
  width: usize,
  next: Rank,
  next_valid: bool,
}

impl OutputRegister {
  /// Creates an empty register holding at most `width` entries.
  pub fn new(width: usize) -> Self {
    Self {
      slots: Vec::with_capacity(width),
      width,
      next: 0,
      next_valid: false,
    }
  }

  /// Offers an entry to the register.
  ///
  /// Returns `None` if the entry found a free slot. Otherwise returns the entry
  /// that has to be forwarded to the skiplist body: the evicted maximum if the
  /// new entry ranks below it, or the new entry itself.
  pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
    if self.slots.len() < self.width {
      self.slots.push(entry);
      self.refresh();
      return None;
    }

    let (idx, max) = self.max()?;
    if entry.rank < max.rank {
      self.slots.remove(idx);
      self.slots.push(entry);
      self.refresh();
      Some(max)
    } else {
      Some(entry)
    }
  }

  /// Removes the entry with the smallest rank, or returns `None` if the
  /// register is empty.
  pub fn remove(&mut self) -> Option<Entry> {
    let mut min: Option<(usize, Rank)> = None;
    for (idx, e) in self.slots.iter().enumerate() {
      if min.map_or(true, |(_, rank)| e.rank < rank) {
        min = Some((idx, e.rank));
      }
    }

    let (idx, _) = min?;
    let entry = self.slots.remove(idx);
    self.refresh();
    Some(entry)
  }

  /// Returns the slot index and entry with the largest rank.
  pub fn max(&self) -> Option<(usize, Entry)> {
    let mut max: Option<(usize, Entry)> = None;
    for (idx, e) in self.slots.iter().enumerate() {
      if max.map_or(true, |(_, m)| e.rank >= m.rank) {
        max = Some((idx, *e));
      }
    }
    max
  }

  /// Returns the smallest rank held, if any.
  #[inline]
  pub fn next(&self) -> Option<Rank> {
    self.next_valid.then_some(self.next)
  }

  /// Returns `true` if [`next`](Self::next) holds a rank.
  #[inline]
  pub const fn next_valid(&self) -> bool {
    self.next_valid
  }

  /// Returns the number of entries held.
  #[inline]
  pub fn len(&self) -> usize {
    self.slots.len()
  }

  /// Returns `true` if the register holds nothing.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  /// Returns `true` if every slot is taken.
  #[inline]
  pub fn is_full(&self) -> bool {
    self.slots.len() >= self.width
  }

  /// Returns the number of slots.
  #[inline]
  pub const fn width(&self) -> usize {
    self.width
  }

  /// Returns the entries held, in arrival order.
  #[inline]
  pub fn entries(&self) -> &[Entry] {
    &self.slots
  }

  fn refresh(&mut self) {
    match self.slots.iter().map(|e| e.rank).min() {
      Some(rank) => {
        self.next = rank;
        self.next_valid = true;
      }
      None => self.next_valid = false,
    }
  }
}
