use crate::{
  rank::VirtualClock, storage::PacketStore, AdmissionError, EmptyQueue, Entry, Rank, Scheduler,
};

/// Error type for the [`TrafficManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerError<E> {
  /// The scheduler did not admit the packet. The packet was taken back out of
  /// the store.
  Admission(AdmissionError),

  /// Nothing to dequeue.
  Empty(EmptyQueue),

  /// The packet store failed.
  Store(E),
}

impl<E: core::fmt::Display> core::fmt::Display for ManagerError<E> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::Admission(e) => write!(f, "{e}"),
      Self::Empty(e) => write!(f, "{e}"),
      Self::Store(e) => write!(f, "packet store: {e}"),
    }
  }
}

impl<E: std::error::Error + 'static> std::error::Error for ManagerError<E> {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Admission(e) => Some(e),
      Self::Empty(e) => Some(e),
      Self::Store(e) => Some(e),
    }
  }
}

/// Packet storage and a rank scheduler put together.
///
/// Enqueued packets go into the store, and only their ranks and handles go
/// into the scheduler. A dequeue takes the smallest rank back out, retrieves
/// the packet and moves the virtual clock to the departing rank.
///
/// ## Example
///
/// ```
/// use pifo::{manager::TrafficManager, rank::Stfq, storage::SlabStore, unsync::Pifo, Options};
///
/// let mut tm = TrafficManager::new(SlabStore::new(64), Pifo::new(Options::new()).unwrap());
/// let mut stfq = Stfq::new();
///
/// for (flow, pkt) in [(1, &b"aaaa"[..]), (1, &b"bbbb"[..]), (2, &b"cc"[..])] {
///   let rank = stfq.rank(tm.clock(), flow, pkt.len() as u32);
///   tm.enqueue(rank, pkt, flow).unwrap();
/// }
///
/// let (_, bytes, flow) = tm.dequeue().unwrap();
/// assert_eq!((bytes.as_slice(), flow), (&b"aaaa"[..], 1));
/// let (_, bytes, flow) = tm.dequeue().unwrap();
/// assert_eq!((bytes.as_slice(), flow), (&b"cc"[..], 2));
/// ```
#[derive(Debug)]
pub struct TrafficManager<S, Q> {
  store: S,
  queue: Q,
  clock: VirtualClock,
}

impl<S, Q> TrafficManager<S, Q>
where
  S: PacketStore,
  Q: Scheduler,
{
  /// Creates a traffic manager with the clock at zero.
  #[inline]
  pub fn new(store: S, queue: Q) -> Self {
    Self {
      store,
      queue,
      clock: VirtualClock::new(),
    }
  }

  /// Stores a packet and schedules it at `rank`.
  ///
  /// If the scheduler rejects the packet it is retrieved from the store again,
  /// so a rejected packet holds no handles.
  pub fn enqueue(
    &mut self,
    rank: Rank,
    bytes: &[u8],
    meta: S::Metadata,
  ) -> Result<(), ManagerError<S::Error>> {
    let (payload, meta) = self.store.store(bytes, meta).map_err(ManagerError::Store)?;
    if let Err(e) = self.queue.enqueue(Entry::new(rank, payload, meta)) {
      #[cfg(feature = "tracing")]
      tracing::warn!(rank, error = %e, "packet rejected");

      self
        .store
        .retrieve(payload, meta)
        .map_err(ManagerError::Store)?;
      return Err(ManagerError::Admission(e));
    }
    Ok(())
  }

  /// Takes the packet with the smallest rank out of the scheduler and the
  /// store.
  pub fn dequeue(&mut self) -> Result<(Rank, Vec<u8>, S::Metadata), ManagerError<S::Error>> {
    let entry = self.queue.dequeue().map_err(ManagerError::Empty)?;
    let (bytes, meta) = self
      .store
      .retrieve(entry.payload, entry.meta)
      .map_err(ManagerError::Store)?;
    self.clock.advance_to(entry.rank);
    Ok((entry.rank, bytes, meta))
  }

  /// Returns the virtual clock, to rank new packets against.
  #[inline]
  pub const fn clock(&self) -> &VirtualClock {
    &self.clock
  }

  /// Returns the packet store.
  #[inline]
  pub const fn store(&self) -> &S {
    &self.store
  }

  /// Returns the scheduler.
  #[inline]
  pub const fn queue(&self) -> &Q {
    &self.queue
  }

  /// Returns the number of queued packets.
  #[inline]
  pub fn len(&self) -> usize {
    self.queue.len()
  }

  /// Returns `true` if no packet is queued.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.queue.is_empty()
  }

  /// Returns the store and the scheduler.
  #[inline]
  pub fn into_parts(self) -> (S, Q) {
    (self.store, self.queue)
  }
}
