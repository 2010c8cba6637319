use crate::{Entry, FreeListError, Handle, Rank};

mod freelist;
pub use freelist::FreeList;

/// An index into an [`Arena`], or [`NodeRef::NONE`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeRef(u32);

impl core::fmt::Debug for NodeRef {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    if self.is_none() {
      write!(f, "NodeRef(NONE)")
    } else {
      write!(f, "NodeRef({})", self.0)
    }
  }
}

impl NodeRef {
  /// Points nowhere.
  pub const NONE: Self = Self(u32::MAX);

  /// Creates a reference to the slot at `idx`.
  #[inline]
  pub const fn new(idx: u32) -> Self {
    Self(idx)
  }

  /// Returns the slot index.
  #[inline]
  pub const fn index(&self) -> u32 {
    self.0
  }

  /// Returns `true` if this is [`NodeRef::NONE`].
  #[inline]
  pub const fn is_none(&self) -> bool {
    self.0 == u32::MAX
  }

  /// Returns `true` if this points at a slot.
  #[inline]
  pub const fn is_some(&self) -> bool {
    !self.is_none()
  }
}

/// One arena slot: an entry on one skiplist level, linked to its neighbours
/// on the same level and to its copies one level up and down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node {
  /// The rank. Meaningless for sentinels.
  pub value: Rank,
  /// Handle of the packet payload.
  pub payload: Handle,
  /// Handle of the packet metadata.
  pub meta: Handle,
  /// The level this node is linked into.
  pub level: u8,
  /// Left neighbour on the same level.
  pub left: NodeRef,
  /// Right neighbour on the same level.
  pub right: NodeRef,
  /// Copy of this node one level up.
  pub up: NodeRef,
  /// Copy of this node one level down.
  pub down: NodeRef,
}

impl Node {
  /// A cleared slot: no data, no links.
  pub const VACANT: Self = Self {
    value: 0,
    payload: 0,
    meta: 0,
    level: 0,
    left: NodeRef::NONE,
    right: NodeRef::NONE,
    up: NodeRef::NONE,
    down: NodeRef::NONE,
  };

  /// Creates an unlinked node carrying `entry` on `level`.
  #[inline]
  pub const fn new(entry: Entry, level: u8) -> Self {
    Self {
      value: entry.rank,
      payload: entry.payload,
      meta: entry.meta,
      level,
      left: NodeRef::NONE,
      right: NodeRef::NONE,
      up: NodeRef::NONE,
      down: NodeRef::NONE,
    }
  }

  /// Returns the entry this node carries.
  #[inline]
  pub const fn entry(&self) -> Entry {
    Entry::new(self.value, self.payload, self.meta)
  }
}

/// Fixed-capacity pool of skiplist nodes.
///
/// ```text
/// +-------------------------------+---------------------------+
/// | data slots: 0..capacity       | reserved: sentinel slots  |
/// | (handed out by the free list) | (never allocated or freed)|
/// +-------------------------------+---------------------------+
/// ```
///
/// Node state is only ever touched through [`Arena::read`] and
/// [`Arena::write`], so the backing array can be swapped for a memory with
/// modeled access latency.
#[derive(Debug, Clone)]
pub struct Arena {
  nodes: Box<[Node]>,
  free: FreeList,
  cap: u32,
}

impl Arena {
  /// Creates an arena with `capacity` allocatable slots followed by
  /// `reserved` slots that are never handed out.
  pub fn new(capacity: u32, reserved: u32) -> Self {
    Self {
      nodes: vec![Node::VACANT; (capacity + reserved) as usize].into_boxed_slice(),
      free: FreeList::new(capacity),
      cap: capacity,
    }
  }

  /// Returns the `i`-th reserved slot.
  #[inline]
  pub fn reserved(&self, i: u32) -> NodeRef {
    let r = NodeRef::new(self.cap + i);
    assert!((r.index() as usize) < self.nodes.len(), "reserved slot {i} out of range");
    r
  }

  /// Returns `true` if `r` is a reserved slot.
  #[inline]
  pub const fn is_reserved(&self, r: NodeRef) -> bool {
    r.is_some() && r.index() >= self.cap
  }

  /// Takes a slot from the free list.
  #[inline]
  pub fn allocate(&mut self) -> Result<NodeRef, FreeListError> {
    self.free.pop().map(NodeRef::new)
  }

  /// Clears a slot and returns it to the free list. Freeing a slot twice is
  /// reported as [`FreeListError::DoubleFree`] and leaves the arena untouched.
  #[inline]
  pub fn free(&mut self, r: NodeRef) -> Result<(), FreeListError> {
    self.free.push(r.index())?;
    self.nodes[r.index() as usize] = Node::VACANT;
    Ok(())
  }

  /// Reads a slot.
  #[inline]
  pub fn read(&self, r: NodeRef) -> Node {
    self.nodes[r.index() as usize]
  }

  /// Overwrites a slot.
  #[inline]
  pub fn write(&mut self, r: NodeRef, node: Node) {
    self.nodes[r.index() as usize] = node;
  }

  /// Returns the number of free slots.
  #[inline]
  pub fn available(&self) -> usize {
    self.free.len()
  }

  /// Returns the number of allocatable slots.
  #[inline]
  pub const fn capacity(&self) -> u32 {
    self.cap
  }

  /// Returns the number of allocated slots.
  #[inline]
  pub fn allocated(&self) -> usize {
    self.cap as usize - self.free.len()
  }

  /// Returns `true` if slot `r` is on the free list.
  #[inline]
  pub fn is_free(&self, r: NodeRef) -> bool {
    self.free.contains(r.index())
  }
}
