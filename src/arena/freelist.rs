use crate::FreeListError;

/// Pool of unused arena indices.
///
/// Indices come back in last-in first-out order. Membership is tracked in a
/// bitmap so releasing an index twice is caught instead of corrupting the pool.
#[derive(Debug, Clone)]
pub struct FreeList {
  stack: Vec<u32>,
  bits: Vec<u64>,
  cap: u32,
}

impl FreeList {
  /// Creates a free list with every index in `0..cap` free.
  pub fn new(cap: u32) -> Self {
    let words = (cap as usize).div_ceil(64);
    let mut bits = vec![u64::MAX; words];
    let tail = cap as usize % 64;
    if tail != 0 {
      if let Some(last) = bits.last_mut() {
        *last = (1u64 << tail) - 1;
      }
    }

    // pop() hands out the lowest indices first
    Self {
      stack: (0..cap).rev().collect(),
      bits,
      cap,
    }
  }

  /// Takes a free index.
  #[inline]
  pub fn pop(&mut self) -> Result<u32, FreeListError> {
    let idx = self.stack.pop().ok_or(FreeListError::OutOfCapacity)?;
    self.bits[idx as usize / 64] &= !(1u64 << (idx % 64));
    Ok(idx)
  }

  /// Returns an index to the pool.
  #[inline]
  pub fn push(&mut self, idx: u32) -> Result<(), FreeListError> {
    if idx >= self.cap {
      return Err(FreeListError::OutOfRange(idx));
    }
    if self.contains(idx) {
      return Err(FreeListError::DoubleFree(idx));
    }

    self.bits[idx as usize / 64] |= 1u64 << (idx % 64);
    self.stack.push(idx);
    Ok(())
  }

  /// Returns `true` if `idx` is currently free.
  #[inline]
  pub fn contains(&self, idx: u32) -> bool {
    idx < self.cap && self.bits[idx as usize / 64] & (1u64 << (idx % 64)) != 0
  }

  /// Returns the number of free indices.
  #[inline]
  pub fn len(&self) -> usize {
    self.stack.len()
  }

  /// Returns `true` if no index is free.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.stack.is_empty()
  }

  /// Returns the number of indices the pool manages.
  #[inline]
  pub const fn capacity(&self) -> u32 {
    self.cap
  }
}
