use std::collections::HashMap;

use core::num::NonZeroU32;

use crate::Rank;

/// Identifies a flow for fair queueing.
pub type FlowId = u32;

/// The virtual time of a fair queueing scheduler.
///
/// Shared between the rank computation on enqueue and the completion of a
/// dequeue, which moves it forward to the start time of the departing packet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualClock {
  now: Rank,
}

impl VirtualClock {
  /// Creates a clock at time zero.
  #[inline]
  pub const fn new() -> Self {
    Self { now: 0 }
  }

  /// Returns the current virtual time.
  #[inline]
  pub const fn now(&self) -> Rank {
    self.now
  }

  /// Moves the clock to `t`. The clock never runs backwards.
  #[inline]
  pub fn advance_to(&mut self, t: Rank) {
    self.now = self.now.max(t);
  }
}

/// Start-time fair queueing.
///
/// A packet of flow `f` starts at `max(now, last_finish[f])` and finishes
/// `len / weight[f]` later; its rank is the start time. Flows without a
/// weight have weight 1.
///
/// ## Example
///
/// ```
/// use pifo::rank::{Stfq, VirtualClock};
///
/// let mut clock = VirtualClock::new();
/// let mut stfq = Stfq::new();
///
/// assert_eq!(stfq.rank(&clock, 1, 100), 0);
/// assert_eq!(stfq.rank(&clock, 1, 100), 100);
/// assert_eq!(stfq.rank(&clock, 2, 100), 0);
///
/// // the first packet of flow 1 departs
/// clock.advance_to(0);
/// assert_eq!(stfq.rank(&clock, 3, 10), 0);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Stfq {
  last_finish: HashMap<FlowId, Rank>,
  weights: HashMap<FlowId, NonZeroU32>,
}

impl Stfq {
  /// Creates a scheduler with no flow state.
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the weight of `flow`.
  #[inline]
  pub fn set_weight(&mut self, flow: FlowId, weight: NonZeroU32) {
    self.weights.insert(flow, weight);
  }

  /// Returns the weight of `flow`.
  #[inline]
  pub fn weight(&self, flow: FlowId) -> NonZeroU32 {
    self.weights.get(&flow).copied().unwrap_or(NonZeroU32::MIN)
  }

  /// Returns the finish time of the last packet ranked for `flow`.
  #[inline]
  pub fn last_finish(&self, flow: FlowId) -> Option<Rank> {
    self.last_finish.get(&flow).copied()
  }

  /// Computes the rank of a `len` byte packet of `flow` and records its
  /// finish time. A packet always advances its flow's finish time by at least
  /// one.
  pub fn rank(&mut self, clock: &VirtualClock, flow: FlowId, len: u32) -> Rank {
    let now = clock.now();
    let start = self.last_finish.get(&flow).map_or(now, |&finish| finish.max(now));
    let cost = u64::from(len).div_ceil(u64::from(self.weight(flow).get())).max(1);
    self.last_finish.insert(flow, start.saturating_add(cost));
    start
  }

  /// Forgets the state of every flow.
  #[inline]
  pub fn reset(&mut self) {
    self.last_finish.clear();
  }
}
