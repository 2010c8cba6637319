use crate::{
  AdmissionError, ConfigError, EmptyQueue, Entry, InvariantViolation, Options, Scheduler, Shard,
};

/// A sharded PIFO driven from a single thread.
///
/// Background work of the shards only happens in [`tick`](Pifo::tick) (or
/// inside a dequeue that has to wait for a shard), so the caller decides how
/// much body maintenance runs between requests.
///
/// ## Example
///
/// ```
/// use pifo::{unsync::Pifo, Entry, Options};
///
/// let mut pifo = Pifo::new(Options::new().with_shards(4)).unwrap();
/// for (id, rank) in [40, 10, 30, 20].into_iter().enumerate() {
///   pifo.enqueue(Entry::new(rank, id as u32, 0)).unwrap();
/// }
/// pifo.settle();
///
/// let ranks: Vec<_> = std::iter::from_fn(|| pifo.dequeue().ok()).map(|e| e.rank).collect();
/// assert_eq!(ranks, [10, 20, 30, 40]);
/// ```
#[derive(Debug)]
pub struct Pifo {
  shards: Vec<Shard>,
  len: usize,
}

impl Pifo {
  /// Creates a PIFO with `opts.shards()` shards.
  pub fn new(opts: Options) -> Result<Self, ConfigError> {
    opts.validate()?;
    Ok(Self {
      shards: (0..opts.shards()).map(|i| Shard::with_index(&opts, i)).collect(),
      len: 0,
    })
  }

  /// Admits an entry into the least loaded shard, the lowest index winning
  /// ties. Errors of the selected shard are returned as is.
  ///
  /// No shard is ever mid-tick here, so unlike [`sync::Pifo`](crate::sync::Pifo)
  /// there are no busy shards to skip.
  pub fn enqueue(&mut self, entry: Entry) -> Result<(), AdmissionError> {
    let idx = (1..self.shards.len()).fold(0, |best, i| {
      if self.shards[i].len() < self.shards[best].len() {
        i
      } else {
        best
      }
    });

    #[cfg(feature = "tracing")]
    tracing::trace!(shard = idx, rank = entry.rank, "enqueue");

    self.shards[idx].enqueue(entry)?;
    self.len += 1;
    Ok(())
  }

  /// Removes the entry with the smallest rank across all shards.
  ///
  /// A shard that holds entries but has an empty register is ticked until its
  /// register is valid again rather than skipped.
  pub fn dequeue(&mut self) -> Result<Entry, EmptyQueue> {
    if self.len == 0 {
      return Err(EmptyQueue);
    }

    for shard in &mut self.shards {
      while !shard.is_empty() && !shard.next_valid() {
        shard.tick();
      }
    }

    let (_, idx) = self
      .shards
      .iter()
      .enumerate()
      .filter_map(|(i, s)| s.next().map(|next| (next, i)))
      .min()
      .ok_or(EmptyQueue)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(shard = idx, "dequeue");

    let entry = self.shards[idx].dequeue()?;
    self.len -= 1;
    Ok(entry)
  }

  /// Runs one background step on every shard with work. Returns `true` if any
  /// shard moved an entry.
  pub fn tick(&mut self) -> bool {
    let mut moved = false;
    for shard in &mut self.shards {
      if shard.has_work() {
        shard.tick();
        moved = true;
      }
    }
    moved
  }

  /// Ticks until no shard has background work left.
  pub fn settle(&mut self) {
    while self.tick() {}
  }

  /// Returns the number of entries across all shards.
  #[inline]
  pub const fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` if no shard holds an entry.
  #[inline]
  pub const fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns the shards.
  #[inline]
  pub fn shards(&self) -> &[Shard] {
    &self.shards
  }

  /// Checks the invariants of every shard and the length accounting.
  pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
    for shard in &self.shards {
      shard.check_invariants()?;
    }

    let actual = self.shards.iter().map(Shard::len).sum();
    if actual != self.len {
      return Err(InvariantViolation::LengthMismatch {
        recorded: self.len,
        actual,
      });
    }
    Ok(())
  }
}

impl Scheduler for Pifo {
  #[inline]
  fn enqueue(&mut self, entry: Entry) -> Result<(), AdmissionError> {
    let res = Pifo::enqueue(self, entry);
    self.tick();
    res
  }

  #[inline]
  fn dequeue(&mut self) -> Result<Entry, EmptyQueue> {
    let res = Pifo::dequeue(self);
    self.tick();
    res
  }

  #[inline]
  fn len(&self) -> usize {
    self.len
  }
}

#[cfg(test)]
mod tests {
  use rand::{rngs::StdRng, Rng, SeedableRng};

  use super::*;
  use crate::Leveling;

  fn pifo(shards: usize, width: usize) -> Pifo {
    Pifo::new(
      Options::new()
        .with_capacity(64)
        .with_shards(shards)
        .with_register_width(width)
        .with_seed(Some(9)),
    )
    .unwrap()
  }

  #[test]
  fn test_invalid_options() {
    assert_eq!(
      Pifo::new(Options::new().with_shards(0)).unwrap_err(),
      ConfigError::ZeroShards
    );
  }

  #[test]
  fn test_least_loaded_shard() {
    let mut p = pifo(3, 2);
    for rank in 0..7 {
      p.enqueue(Entry::new(rank, 0, 0)).unwrap();
    }
    let lens: Vec<_> = p.shards().iter().map(Shard::len).collect();
    assert_eq!(lens, [3, 2, 2]);

    // 0 leaves shard 0 and 1 leaves shard 1
    assert_eq!(p.dequeue().unwrap().rank, 0);
    assert_eq!(p.dequeue().unwrap().rank, 1);
    p.enqueue(Entry::new(10, 0, 0)).unwrap();
    assert_eq!(p.shards()[1].len(), 2);
    p.enqueue(Entry::new(11, 0, 0)).unwrap();
    let lens: Vec<_> = p.shards().iter().map(Shard::len).collect();
    assert_eq!(lens, [3, 2, 2]);
  }

  #[test]
  fn test_dequeue_waits_for_lagging_shard() {
    let mut p = pifo(2, 1);
    p.enqueue(Entry::new(1, 0, 0)).unwrap();
    p.enqueue(Entry::new(7, 1, 0)).unwrap();
    p.enqueue(Entry::new(3, 2, 0)).unwrap();
    assert_eq!(p.dequeue().unwrap().rank, 1);

    // shard 0 still holds 3, staged behind an empty register
    assert!(!p.shards()[0].next_valid());
    assert_eq!(p.shards()[1].next(), Some(7));
    assert_eq!(p.dequeue().unwrap().rank, 3);
    assert_eq!(p.dequeue().unwrap().rank, 7);
    assert_eq!(p.dequeue(), Err(EmptyQueue));
  }

  #[test]
  fn test_global_order_without_settling() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut p = Pifo::new(
      Options::new()
        .with_capacity(256)
        .with_shards(4)
        .with_register_width(2)
        .with_staging_depth(64)
        .with_leveling(Leveling::Probabilistic)
        .with_seed(Some(5)),
    )
    .unwrap();

    let mut model: Vec<u64> = Vec::new();
    for id in 0..4000u32 {
      if !model.is_empty() && rng.random_bool(0.45) {
        assert_eq!(p.dequeue().unwrap().rank, model.remove(0), "step {id}");
      } else {
        let rank = rng.random_range(0..1000);
        p.enqueue(Entry::new(rank, id, 0)).unwrap();
        let at = model.partition_point(|&r| r <= rank);
        model.insert(at, rank);
      }
      if id % 2 == 0 {
        p.tick();
      }
    }
    p.check_invariants().unwrap();
    assert_eq!(p.len(), model.len());
  }

  #[test]
  fn test_scheduler_trait() {
    fn drain<S: Scheduler>(s: &mut S) -> Vec<u64> {
      core::iter::from_fn(|| s.dequeue().ok()).map(|e| e.rank).collect()
    }

    let mut p = pifo(2, 2);
    for rank in [9, 2, 7, 4, 5] {
      Scheduler::enqueue(&mut p, Entry::new(rank, 0, 0)).unwrap();
    }
    assert_eq!(Scheduler::len(&p), 5);
    assert_eq!(drain(&mut p), [2, 4, 5, 7, 9]);
    assert!(Scheduler::is_empty(&p));
  }
}
