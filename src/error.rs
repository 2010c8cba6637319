use crate::Handle;

/// Returned by `enqueue` when an entry cannot be admitted.
///
/// A rejected entry is handed back to the producer untouched; the queue never
/// drops an entry it has admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdmissionError {
  /// The selected shard already holds as many entries as its arena capacity.
  ArenaExhausted,

  /// The skiplist body could not obtain a free node for an insertion.
  FreeListExhausted,

  /// Both the output register and the staging FIFO are full; retry after a
  /// dequeue.
  Full,
}

impl core::fmt::Display for AdmissionError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::ArenaExhausted => write!(f, "shard is at arena capacity"),
      Self::FreeListExhausted => write!(f, "free list has no node left for the insertion"),
      Self::Full => write!(f, "output register and staging fifo are full"),
    }
  }
}

impl std::error::Error for AdmissionError {}

/// Returned by `dequeue` when there is nothing to dequeue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmptyQueue;

impl core::fmt::Display for EmptyQueue {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "dequeue from an empty queue")
  }
}

impl std::error::Error for EmptyQueue {}

/// Error type for the [`FreeList`](crate::arena::FreeList).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreeListError {
  /// Every index is in use.
  OutOfCapacity,

  /// The index is already on the free list.
  DoubleFree(u32),

  /// The index does not belong to this free list.
  OutOfRange(u32),
}

impl core::fmt::Display for FreeListError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::OutOfCapacity => write!(f, "free list is empty"),
      Self::DoubleFree(idx) => write!(f, "index {idx} is already free"),
      Self::OutOfRange(idx) => write!(f, "index {idx} is out of range"),
    }
  }
}

impl std::error::Error for FreeListError {}

/// Returned when [`Options`](crate::Options) describe a queue that cannot be
/// built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigError {
  /// The arena capacity must be a non-zero power of two.
  CapacityNotPowerOfTwo(u32),

  /// At least one shard is required.
  ZeroShards,

  /// The output register must hold at least one entry.
  ZeroRegisterWidth,

  /// The staging FIFO must hold at least one entry.
  ZeroStagingDepth,

  /// The pipes between the wrapper and its shard workers must hold at least
  /// one message.
  ZeroPipeDepth,
}

impl core::fmt::Display for ConfigError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::CapacityNotPowerOfTwo(cap) => {
        write!(f, "capacity {cap} is not a non-zero power of two")
      }
      Self::ZeroShards => write!(f, "number of shards must be at least 1"),
      Self::ZeroRegisterWidth => write!(f, "output register width must be at least 1"),
      Self::ZeroStagingDepth => write!(f, "staging fifo depth must be at least 1"),
      Self::ZeroPipeDepth => write!(f, "pipe depth must be at least 1"),
    }
  }
}

impl std::error::Error for ConfigError {}

/// A broken structural invariant. These are programming errors: a live
/// operation that runs into one panics, and the checkers report them so
/// tests can assert on the node graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantViolation {
  /// An index was released to the free list twice.
  DoubleFree(u32),

  /// An index is both linked into a level and on the free list.
  FreeInUse(u32),

  /// An index is neither linked into any level nor on the free list.
  LeakedNode(u32),

  /// A freed node still carries links or data.
  DanglingLinks(u32),

  /// Two neighbours on a level are out of rank order.
  Unordered {
    /// The level the pair was found on.
    level: u8,
    /// The left node.
    left: u32,
    /// The right node.
    right: u32,
  },

  /// A `left`/`right`/`up`/`down` link does not point back.
  BrokenLink(u32),

  /// A node sits on a level that does not match its `level` field, or its
  /// tower copy carries a different rank.
  LevelMismatch(u32),

  /// The current max level is not the highest non-empty level.
  MaxLevel {
    /// The recorded max level.
    recorded: u8,
    /// The highest level that actually holds nodes.
    actual: u8,
  },

  /// A register entry ranks above an entry still in the body.
  RegisterAboveBody {
    /// The largest rank in the register.
    register: u64,
    /// The smallest rank in the body.
    body: u64,
  },

  /// A counter disagrees with the entries actually held.
  LengthMismatch {
    /// The counter value.
    recorded: usize,
    /// The number of entries found.
    actual: usize,
  },

  /// A shard handed out a rank below one it handed out before, with no
  /// smaller enqueue in between.
  OutOfOrderDequeue {
    /// The rank dequeued before.
    previous: u64,
    /// The rank dequeued now.
    current: u64,
  },
}

impl core::fmt::Display for InvariantViolation {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::DoubleFree(idx) => write!(f, "node {idx} freed twice"),
      Self::FreeInUse(idx) => write!(f, "node {idx} is linked and free at the same time"),
      Self::LeakedNode(idx) => write!(f, "node {idx} is neither linked nor free"),
      Self::DanglingLinks(idx) => write!(f, "freed node {idx} was not cleared"),
      Self::Unordered { level, left, right } => {
        write!(f, "nodes {left} and {right} out of order on level {level}")
      }
      Self::BrokenLink(idx) => write!(f, "node {idx} has a link that does not point back"),
      Self::LevelMismatch(idx) => write!(f, "node {idx} does not match its level"),
      Self::MaxLevel { recorded, actual } => {
        write!(f, "max level is {recorded} but highest used level is {actual}")
      }
      Self::RegisterAboveBody { register, body } => write!(
        f,
        "register holds rank {register} above body rank {body}"
      ),
      Self::LengthMismatch { recorded, actual } => {
        write!(f, "length is {recorded} but {actual} entries were found")
      }
      Self::OutOfOrderDequeue { previous, current } => {
        write!(f, "dequeued rank {current} after rank {previous}")
      }
    }
  }
}

impl std::error::Error for InvariantViolation {}

/// Error type for the pifo crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
  /// An entry was not admitted.
  Admission(AdmissionError),

  /// Nothing to dequeue.
  Empty(EmptyQueue),

  /// The free list refused an operation.
  FreeList(FreeListError),

  /// The options are invalid.
  Config(ConfigError),

  /// The node graph is corrupted.
  Invariant(InvariantViolation),

  /// A handle was not issued by the packet store, or was already retrieved.
  UnknownHandle(Handle),
}

impl core::fmt::Display for Error {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::Admission(e) => write!(f, "{e}"),
      Self::Empty(e) => write!(f, "{e}"),
      Self::FreeList(e) => write!(f, "{e}"),
      Self::Config(e) => write!(f, "{e}"),
      Self::Invariant(e) => write!(f, "{e}"),
      Self::UnknownHandle(h) => write!(f, "unknown handle {h}"),
    }
  }
}

impl std::error::Error for Error {}

impl From<AdmissionError> for Error {
  fn from(e: AdmissionError) -> Self {
    Self::Admission(e)
  }
}

impl From<EmptyQueue> for Error {
  fn from(e: EmptyQueue) -> Self {
    Self::Empty(e)
  }
}

impl From<FreeListError> for Error {
  fn from(e: FreeListError) -> Self {
    Self::FreeList(e)
  }
}

impl From<ConfigError> for Error {
  fn from(e: ConfigError) -> Self {
    Self::Config(e)
  }
}

impl From<InvariantViolation> for Error {
  fn from(e: InvariantViolation) -> Self {
    Self::Invariant(e)
  }
}
