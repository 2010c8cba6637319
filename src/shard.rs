use crate::{
  fifo::Fifo, AdmissionError, ConfigError, EmptyQueue, Entry, InvariantViolation, Options,
  OutputRegister, Rank, SkipList,
};

/// What one [`Shard::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
  /// Nothing to do.
  Idle,
  /// A staged entry was inserted into the skiplist body.
  Inserted,
  /// The smallest body entry was moved into the output register.
  Refilled,
  /// Entries are staged but the free list cannot cover an insertion yet.
  Stalled,
}

/// Per-shard counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stats {
  /// Enqueues absorbed by the register without touching the body.
  pub bypasses: u64,
  /// Register maximums displaced by a smaller enqueue.
  pub evictions: u64,
  /// Entries pushed to the staging FIFO.
  pub staged: u64,
  /// Staged entries inserted into the skiplist.
  pub inserts: u64,
  /// Register refills taken from the skiplist.
  pub refills: u64,
  /// Register refills taken straight from the staging FIFO.
  pub staged_refills: u64,
  /// Insertions held back by a short free list.
  pub stalls: u64,
  /// Nodes promoted to a higher skiplist level.
  pub promotions: u64,
}

impl core::ops::Add for Stats {
  type Output = Self;

  fn add(self, rhs: Self) -> Self {
    Self {
      bypasses: self.bypasses + rhs.bypasses,
      evictions: self.evictions + rhs.evictions,
      staged: self.staged + rhs.staged,
      inserts: self.inserts + rhs.inserts,
      refills: self.refills + rhs.refills,
      staged_refills: self.staged_refills + rhs.staged_refills,
      stalls: self.stalls + rhs.stalls,
      promotions: self.promotions + rhs.promotions,
    }
  }
}

impl core::iter::Sum for Stats {
  fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
    iter.fold(Self::default(), |acc, s| acc + s)
  }
}

/// One PIFO shard: an output register in front of a skiplist body.
///
/// ```text
///              enqueue                       dequeue
///                 │                             ▲
///                 ▼                             │
///   ┌──────── output register (W smallest) ─────┘
///   │ evicted      ▲
///   ▼              │ refill (deq_sl)
/// staging ──────► skiplist
///  FIFO   enq_sl
/// ```
///
/// Enqueue only touches the register and the staging FIFO, and dequeue only
/// reaches into the body when the register ran dry. Moving entries between
/// the FIFO, the skiplist and the register is left to
/// [`tick`](Shard::tick), one step at a time.
///
/// Every register entry ranks at or below every entry in the body (skiplist
/// and staging FIFO): an enqueue that ranks above the body goes straight to
/// the FIFO even if the register has room, and a refill takes the smaller of
/// the skiplist and FIFO minimums.
#[derive(Debug)]
pub struct Shard {
  register: OutputRegister,
  staging: Fifo<Entry>,
  body: SkipList,
  capacity: usize,
  insert_threshold: usize,
  len: usize,
  busy: bool,
  watermark: Option<Rank>,
  stats: Stats,
}

impl Shard {
  /// Creates a shard.
  ///
  /// ## Example
  ///
  /// ```
  /// use pifo::{Entry, Options, Shard};
  ///
  /// let mut shard = Shard::new(Options::new().with_capacity(16).with_register_width(2)).unwrap();
  /// for rank in [5, 3, 8, 1] {
  ///   shard.enqueue(Entry::new(rank, 0, 0)).unwrap();
  /// }
  /// let ranks: Vec<_> = (0..4).map(|_| shard.dequeue().unwrap().rank).collect();
  /// assert_eq!(ranks, [1, 3, 5, 8]);
  /// ```
  pub fn new(opts: Options) -> Result<Self, ConfigError> {
    opts.validate()?;
    Ok(Self::with_index(&opts, 0))
  }

  /// Creates the `index`-th shard of a wrapper. `opts` must be validated.
  pub(crate) fn with_index(opts: &Options, index: usize) -> Self {
    let seed = opts.seed().map(|s| s.wrapping_add(index as u64));
    Self {
      register: OutputRegister::new(opts.register_width()),
      staging: Fifo::new(opts.staging_depth()),
      body: SkipList::new(opts.capacity(), opts.leveling(), seed),
      capacity: opts.capacity() as usize,
      insert_threshold: opts.insert_threshold(),
      len: 0,
      busy: false,
      watermark: None,
      stats: Stats::default(),
    }
  }

  /// Admits an entry into the register, or into the staging FIFO when it
  /// ranks above the register's contents.
  ///
  /// Fails with [`AdmissionError::ArenaExhausted`] if the shard already holds
  /// `capacity` entries, and with [`AdmissionError::Full`] if the entry would
  /// have to be staged while the staging FIFO is full. If the staging FIFO is
  /// full because the body cannot get enough free nodes for an insertion,
  /// the error is [`AdmissionError::FreeListExhausted`] instead. A failed
  /// enqueue leaves the shard untouched.
  pub fn enqueue(&mut self, entry: Entry) -> Result<(), AdmissionError> {
    if self.len >= self.capacity {
      #[cfg(feature = "tracing")]
      tracing::warn!(rank = entry.rank, len = self.len, "shard at capacity");
      return Err(AdmissionError::ArenaExhausted);
    }

    let above_body = self.body_floor().is_some_and(|floor| entry.rank > floor);
    if (above_body || self.register.is_full()) && self.staging.is_full() {
      if !self.body.can_insert() {
        #[cfg(feature = "tracing")]
        tracing::warn!(
          rank = entry.rank,
          available = self.body.available(),
          "staging fifo full, body short of free nodes"
        );
        return Err(AdmissionError::FreeListExhausted);
      }

      #[cfg(feature = "tracing")]
      tracing::warn!(rank = entry.rank, "register and staging fifo full");
      return Err(AdmissionError::Full);
    }

    if above_body {
      self.stage(entry);
    } else {
      match self.register.insert(entry) {
        None => {
          self.stats.bypasses += 1;

          #[cfg(feature = "tracing")]
          tracing::trace!(rank = entry.rank, "register bypass");
        }
        Some(displaced) => {
          if displaced != entry {
            self.stats.evictions += 1;

            #[cfg(feature = "tracing")]
            tracing::trace!(rank = entry.rank, evicted = displaced.rank, "register eviction");
          }
          self.stage(displaced);
        }
      }
    }

    self.len += 1;
    self.watermark = self.watermark.map(|w| w.min(entry.rank));
    Ok(())
  }

  /// Removes the smallest entry from the register. If the register ran dry,
  /// refills it from the body first.
  pub fn dequeue(&mut self) -> Result<Entry, EmptyQueue> {
    if self.register.is_empty() {
      self.refill();
    }

    let entry = self.register.remove().ok_or(EmptyQueue)?;
    self.len -= 1;

    if let Some(previous) = self.watermark {
      debug_assert!(
        entry.rank >= previous,
        "{}",
        InvariantViolation::OutOfOrderDequeue {
          previous,
          current: entry.rank,
        }
      );
    }
    self.watermark = Some(entry.rank);
    Ok(entry)
  }

  /// Runs one background step: a register refill if the register has room
  /// and the body holds entries, otherwise a staged insertion into the
  /// skiplist once enough entries are staged.
  pub fn tick(&mut self) -> Tick {
    self.busy = true;
    let tick = if !self.register.is_full() && self.has_body() {
      self.refill();
      Tick::Refilled
    } else if self.staging.len() >= self.insert_threshold {
      self.insert()
    } else {
      Tick::Idle
    };
    self.busy = false;
    tick
  }

  /// Returns `true` if [`tick`](Self::tick) would move an entry.
  #[inline]
  pub fn has_work(&self) -> bool {
    (!self.register.is_full() && self.has_body())
      || (self.staging.len() >= self.insert_threshold && self.body.can_insert())
  }

  /// Returns the number of entries held in the register, the staging FIFO
  /// and the skiplist together.
  #[inline]
  pub const fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` if the shard holds nothing.
  #[inline]
  pub const fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns the maximum number of entries.
  #[inline]
  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  /// Returns `true` while a background step runs.
  #[inline]
  pub const fn is_busy(&self) -> bool {
    self.busy
  }

  /// Returns the smallest rank in the register.
  #[inline]
  pub fn next(&self) -> Option<Rank> {
    self.register.next()
  }

  /// Returns `true` if the register holds an entry.
  #[inline]
  pub const fn next_valid(&self) -> bool {
    self.register.next_valid()
  }

  /// Returns the output register.
  #[inline]
  pub const fn register(&self) -> &OutputRegister {
    &self.register
  }

  /// Returns the skiplist body.
  #[inline]
  pub const fn body(&self) -> &SkipList {
    &self.body
  }

  /// Returns the number of staged entries.
  #[inline]
  pub fn staged(&self) -> usize {
    self.staging.len()
  }

  /// Returns the counters.
  #[inline]
  pub fn stats(&self) -> Stats {
    Stats {
      promotions: self.body.promotions(),
      ..self.stats
    }
  }

  /// Checks the skiplist node graph, the register invariant and the length
  /// accounting.
  pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
    self.body.check()?;

    let actual = self.register.len() + self.staging.len() + self.body.len();
    if actual != self.len {
      return Err(InvariantViolation::LengthMismatch {
        recorded: self.len,
        actual,
      });
    }

    if let (Some((_, max)), Some(body)) = (self.register.max(), self.body_floor()) {
      if max.rank > body {
        return Err(InvariantViolation::RegisterAboveBody {
          register: max.rank,
          body,
        });
      }
    }
    Ok(())
  }

  #[inline]
  fn has_body(&self) -> bool {
    !self.body.is_empty() || !self.staging.is_empty()
  }

  /// Returns the smallest rank in the skiplist or the staging FIFO.
  fn body_floor(&self) -> Option<Rank> {
    let staged = self.staged_min().map(|(_, e)| e.rank);
    match (self.body.first().map(|e| e.rank), staged) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    }
  }

  fn staged_min(&self) -> Option<(usize, Entry)> {
    let mut min: Option<(usize, Entry)> = None;
    for (idx, e) in self.staging.iter().enumerate() {
      if min.map_or(true, |(_, m)| e.rank < m.rank) {
        min = Some((idx, *e));
      }
    }
    min
  }

  fn stage(&mut self, entry: Entry) {
    if self.staging.push(entry).is_err() {
      panic!("staging fifo overflow after its room was checked");
    }
    self.stats.staged += 1;
  }

  /// Moves the smallest body entry into the register.
  fn refill(&mut self) -> bool {
    if self.register.is_full() {
      return false;
    }

    let staged = self.staged_min();
    let from_body = match (self.body.first(), staged) {
      (None, None) => return false,
      (Some(b), Some((_, s))) => b.rank <= s.rank,
      (Some(_), None) => true,
      (None, Some(_)) => false,
    };

    let entry = if from_body {
      self.stats.refills += 1;
      self.body.pop_first()
    } else {
      self.stats.staged_refills += 1;
      staged.and_then(|(idx, _)| self.staging.remove(idx))
    };

    match entry {
      Some(entry) => {
        #[cfg(feature = "tracing")]
        tracing::trace!(rank = entry.rank, from_body, "register refill");

        // the register had room, so nothing is displaced
        let displaced = self.register.insert(entry);
        debug_assert!(displaced.is_none());
        true
      }
      None => false,
    }
  }

  /// Inserts the oldest staged entry into the skiplist.
  fn insert(&mut self) -> Tick {
    if !self.body.can_insert() {
      self.stats.stalls += 1;

      #[cfg(feature = "tracing")]
      tracing::warn!(
        available = self.body.available(),
        required = self.body.required_nodes(),
        "body insertion stalled on the free list"
      );
      return Tick::Stalled;
    }

    let Some(entry) = self.staging.pop() else {
      return Tick::Idle;
    };

    match self.body.insert(entry) {
      Ok(()) => {
        self.stats.inserts += 1;

        #[cfg(feature = "tracing")]
        tracing::trace!(rank = entry.rank, level = self.body.max_level(), "body insert");
        Tick::Inserted
      }
      Err(_e) => {
        self.staging.unpop(entry);
        self.stats.stalls += 1;

        #[cfg(feature = "tracing")]
        tracing::warn!(rank = entry.rank, error = %_e, "body insertion failed");
        Tick::Stalled
      }
    }
  }
}
