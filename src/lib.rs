#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]
#![warn(missing_docs)]
#![allow(clippy::type_complexity, rustdoc::bare_urls)]

use rand::Rng;

/// Fixed-capacity node storage and its free list.
pub mod arena;

/// Error types.
pub mod error;
pub use error::{
  AdmissionError, ConfigError, EmptyQueue, Error, FreeListError, InvariantViolation,
};

mod fifo;

mod options;
pub use options::{Leveling, Options};

/// The output register (head cache) of a shard.
pub mod register;
pub use register::OutputRegister;

/// The skiplist body of a shard.
pub mod skiplist;
pub use skiplist::SkipList;

mod shard;
pub use shard::{Shard, Stats, Tick};

/// Single-threaded sharded PIFO, driven by explicit ticks.
pub mod unsync;

/// Threaded sharded PIFO, one worker per shard behind bounded pipes.
pub mod sync;

/// Rank computation for scheduling policies.
pub mod rank;

/// The packet storage collaborator.
pub mod storage;

/// Packet storage and scheduler composed into a traffic manager.
pub mod manager;


/// The sort key of an entry. Lower ranks dequeue first.
pub type Rank = u64;

/// An opaque handle into the packet storage. Never inspected by the queue.
pub type Handle = u32;

/// Number of consecutive same-level nodes that triggers a promotion in the
/// deterministic skiplist.
pub const MAX_CONS_NODES: usize = 3;

/// The hard upper bound of skiplist levels, `log2(u32::MAX) + 1`.
pub(crate) const MAX_HEIGHT: usize = 32;

/// A rank together with the packet handles it schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
  /// The scheduling rank.
  pub rank: Rank,
  /// Handle of the packet payload.
  pub payload: Handle,
  /// Handle of the packet metadata.
  pub meta: Handle,
}

impl Entry {
  /// Creates a new entry.
  #[inline]
  pub const fn new(rank: Rank, payload: Handle, meta: Handle) -> Self {
    Self {
      rank,
      payload,
      meta,
    }
  }
}

impl From<(Rank, Handle, Handle)> for Entry {
  #[inline]
  fn from((rank, payload, meta): (Rank, Handle, Handle)) -> Self {
    Self::new(rank, payload, meta)
  }
}

impl From<Entry> for (Rank, Handle, Handle) {
  #[inline]
  fn from(e: Entry) -> Self {
    (e.rank, e.payload, e.meta)
  }
}

/// The interface the traffic manager drives: admit entries, and hand them
/// back in rank order.
pub trait Scheduler {
  /// Admits an entry, or rejects it with a reason. An entry is never
  /// silently dropped.
  fn enqueue(&mut self, entry: Entry) -> Result<(), AdmissionError>;

  /// Removes the entry with the smallest rank.
  fn dequeue(&mut self) -> Result<Entry, EmptyQueue>;

  /// Returns the number of admitted entries not yet dequeued.
  fn len(&self) -> usize;

  /// Returns `true` if nothing is queued.
  #[inline]
  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Returns a random level in `0..=max`, with each level being `1/e` as likely
/// as the one below it.
pub(crate) fn random_height<R: Rng + ?Sized>(rng: &mut R, max: u8) -> u8 {
  let rnd: u32 = rng.random();
  let mut h = 0;

  while h < max as usize && h + 1 < MAX_HEIGHT && rnd <= PROBABILITIES[h + 1] {
    h += 1;
  }
  h as u8
}

/// Precompute the skiplist probabilities so that only a single random number
/// needs to be generated and so that the optimal pvalue can be used (inverse
/// of Euler's number).
const PROBABILITIES: [u32; MAX_HEIGHT] = {
  const P: f64 = 1.0 / core::f64::consts::E;

  let mut probabilities = [0; MAX_HEIGHT];
  let mut p = 1f64;

  let mut i = 0;
  while i < MAX_HEIGHT {
    probabilities[i] = ((u32::MAX as f64) * p) as u32;
    p *= P;
    i += 1;
  }

  probabilities
};
