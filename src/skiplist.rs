use rand::{rngs::StdRng, SeedableRng};

use crate::{
  arena::{Arena, Node, NodeRef},
  random_height, Entry, FreeListError, InvariantViolation, Leveling, Rank, MAX_CONS_NODES,
};

mod check;
mod render;

#[cfg(test)]
mod tests;

/// The skiplist body of a shard.
///
/// Every level is a doubly linked list bounded by a head (−∞) and a tail (+∞)
/// sentinel, and every node on level `L > 0` is a copy of a node on level
/// `L - 1`, linked through `up`/`down`:
///
/// ```text
/// level 2:  HEAD ───────────────────► 5 ─────────────────────► TAIL
///             │                       │                          │
/// level 1:  HEAD ────────► 2 ───────► 5 ────────► 9 ───────────► TAIL
///             │            │          │           │              │
/// level 0:  HEAD ──► 1 ──► 2 ──► 3 ──► 5 ──► 7 ──► 9 ──► 11 ───► TAIL
/// ```
///
/// Equal ranks keep their insertion order: a new node is linked after every
/// node of the same rank.
#[derive(Debug)]
pub struct SkipList {
  arena: Arena,
  head: Box<[NodeRef]>,
  tail: Box<[NodeRef]>,
  len: usize,
  max_level: u8,
  leveling: Leveling,
  rng: StdRng,
  promotions: u64,
}

impl SkipList {
  /// Creates an empty skiplist for `capacity` entries, with levels
  /// `0..=log2(capacity)`.
  ///
  /// The arena holds `2 * capacity` nodes, which leaves room for the upper
  /// levels of a full list, plus one head and one tail sentinel per level.
  pub fn new(capacity: u32, leveling: Leveling, seed: Option<u64>) -> Self {
    debug_assert!(capacity.is_power_of_two());
    let levels = capacity.trailing_zeros() + 1;
    let sentinels = 2 * levels;
    let nodes = capacity.saturating_mul(2).min(u32::MAX - sentinels - 1);
    let mut arena = Arena::new(nodes, sentinels);

    let head: Box<[NodeRef]> = (0..levels).map(|l| arena.reserved(2 * l)).collect();
    let tail: Box<[NodeRef]> = (0..levels).map(|l| arena.reserved(2 * l + 1)).collect();

    for l in 0..levels as usize {
      let below = |v: &[NodeRef]| if l > 0 { v[l - 1] } else { NodeRef::NONE };
      let above = |v: &[NodeRef]| v.get(l + 1).copied().unwrap_or(NodeRef::NONE);

      arena.write(
        head[l],
        Node {
          value: Rank::MIN,
          right: tail[l],
          up: above(&head[..]),
          down: below(&head[..]),
          ..Node::VACANT
        }
        .with_level(l as u8),
      );
      arena.write(
        tail[l],
        Node {
          value: Rank::MAX,
          left: head[l],
          up: above(&tail[..]),
          down: below(&tail[..]),
          ..Node::VACANT
        }
        .with_level(l as u8),
      );
    }

    let rng = match seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };

    Self {
      arena,
      head,
      tail,
      len: 0,
      max_level: 0,
      leveling,
      rng,
      promotions: 0,
    }
  }

  /// Returns the number of entries.
  #[inline]
  pub const fn len(&self) -> usize {
    self.len
  }

  /// Returns `true` if the list holds no entry.
  #[inline]
  pub const fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Returns the highest level holding a node.
  #[inline]
  pub const fn max_level(&self) -> u8 {
    self.max_level
  }

  /// Returns the number of levels, `log2(capacity) + 1`.
  #[inline]
  pub fn levels(&self) -> u8 {
    self.head.len() as u8
  }

  /// Returns the leveling in use.
  #[inline]
  pub const fn leveling(&self) -> Leveling {
    self.leveling
  }

  /// Returns the number of free nodes.
  #[inline]
  pub fn available(&self) -> usize {
    self.arena.available()
  }

  /// Returns the node arena.
  #[inline]
  pub const fn arena(&self) -> &Arena {
    &self.arena
  }

  /// Returns the head sentinel of `level`.
  #[inline]
  pub fn head(&self, level: u8) -> NodeRef {
    self.head[level as usize]
  }

  /// Returns the tail sentinel of `level`.
  #[inline]
  pub fn tail(&self, level: u8) -> NodeRef {
    self.tail[level as usize]
  }

  /// Returns how many nodes have been promoted to a higher level so far.
  #[inline]
  pub const fn promotions(&self) -> u64 {
    self.promotions
  }

  /// Returns the entry with the smallest rank.
  #[inline]
  pub fn first(&self) -> Option<Entry> {
    let first = self.arena.read(self.head[0]).right;
    (!self.arena.is_reserved(first)).then(|| self.arena.read(first).entry())
  }

  /// Returns the level-0 entries in rank order.
  #[inline]
  pub fn iter(&self) -> Iter<'_> {
    Iter {
      list: self,
      cur: self.arena.read(self.head[0]).right,
    }
  }

  /// Returns how many free nodes an insertion needs before the background
  /// mover may start it: one per level in use plus the level-0 node, and for
  /// the deterministic leveling one more for a new top level.
  #[inline]
  pub fn required_nodes(&self) -> usize {
    let per_level = self.max_level as usize + 1;
    match self.leveling {
      Leveling::Deterministic if self.max_level + 1 < self.levels() => per_level + 1,
      _ => per_level,
    }
  }

  /// Returns `true` if the free list can cover an insertion.
  #[inline]
  pub fn can_insert(&self) -> bool {
    self.arena.available() >= self.required_nodes()
  }

  /// Walks from `start` towards the insertion point of `value`: right while the
  /// next node ranks at or below `value`, down when it cannot move right, until
  /// it stands on `stop_level`.
  ///
  /// Returns the node immediately left of the insertion point on `stop_level`,
  /// and that node's `down` link to resume the search from one level lower.
  pub fn search(&self, start: NodeRef, stop_level: u8, value: Rank) -> (NodeRef, NodeRef) {
    let mut x = start;
    loop {
      x = self.walk(x, value);
      let node = self.arena.read(x);
      if node.level <= stop_level {
        return (x, node.down);
      }
      x = node.down;
    }
  }

  /// Inserts an entry.
  ///
  /// Fails with [`FreeListError::OutOfCapacity`] without touching the list if
  /// there is no node left for level 0. Promotions that do not fit in the free
  /// list are skipped.
  pub fn insert(&mut self, entry: Entry) -> Result<(), FreeListError> {
    if self.arena.available() == 0 {
      return Err(FreeListError::OutOfCapacity);
    }

    match self.leveling {
      Leveling::Deterministic => self.insert_deterministic(entry),
      Leveling::Probabilistic => self.insert_probabilistic(entry),
    }?;
    self.len += 1;
    Ok(())
  }

  /// Removes the entry with the smallest rank, together with its copies on
  /// the levels above, and drops empty top levels.
  pub fn pop_first(&mut self) -> Option<Entry> {
    let first = self.arena.read(self.head[0]).right;
    if self.arena.is_reserved(first) {
      return None;
    }

    let entry = self.arena.read(first).entry();
    let mut cur = first;
    while cur.is_some() {
      let node = self.arena.read(cur);
      self.unlink(&node);
      self.release(cur);
      cur = node.up;
    }

    self.len -= 1;
    self.collapse();
    Some(entry)
  }

  fn insert_deterministic(&mut self, entry: Entry) -> Result<(), FreeListError> {
    let value = entry.rank;
    // one node stays reserved for level 0
    let mut spare = self.arena.available() - 1;

    let top = self.max_level;
    if spare > 0 && top + 1 < self.levels() {
      let (h, t) = (self.head[top as usize], self.tail[top as usize]);
      if let Some(mid) = self.crowded(h, t) {
        self.promote(self.head[top as usize + 1], mid)?;
        self.max_level = top + 1;
        spare -= 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(level = self.max_level, "skiplist grew a level");
      }
    }

    let mut level = self.max_level;
    let mut x = self.head[level as usize];
    loop {
      x = self.walk(x, value);
      if level == 0 {
        break;
      }

      let node = self.arena.read(x);
      if spare > 0 {
        let end = self.arena.read(node.right).down;
        if let Some(mid) = self.crowded(node.down, end) {
          let m = self.promote(x, mid)?;
          spare -= 1;
          if self.precedes(m, value) {
            x = m;
          }
        }
      }

      x = self.arena.read(x).down;
      level -= 1;
    }

    let n = self.arena.allocate()?;
    self.link_after(x, n, Node::new(entry, 0));
    Ok(())
  }

  fn insert_probabilistic(&mut self, entry: Entry) -> Result<(), FreeListError> {
    let value = entry.rank;
    let budget = (self.arena.available() - 1).min(u8::MAX as usize) as u8;
    let max = (self.levels() - 1).min(budget);
    let height = random_height(&mut self.rng, max);
    if height > self.max_level {
      self.max_level = height;

      #[cfg(feature = "tracing")]
      tracing::debug!(level = self.max_level, "skiplist grew a level");
    }

    let mut start = self.head[self.max_level as usize];
    let mut above = NodeRef::NONE;
    for level in (0..=height).rev() {
      let (left, down) = self.search(start, level, value);
      let n = self.arena.allocate()?;
      let mut node = Node::new(entry, level);
      node.up = above;
      self.link_after(left, n, node);

      if above.is_some() {
        let mut a = self.arena.read(above);
        a.down = n;
        self.arena.write(above, a);
      }
      above = n;
      start = down;
    }
    Ok(())
  }

  /// Returns `true` if `r` is a data node ranking at or below `value`.
  #[inline]
  fn precedes(&self, r: NodeRef, value: Rank) -> bool {
    !self.arena.is_reserved(r) && self.arena.read(r).value <= value
  }

  /// Moves right from `x` as long as the next node precedes `value`.
  #[inline]
  fn walk(&self, mut x: NodeRef, value: Rank) -> NodeRef {
    loop {
      let r = self.arena.read(x).right;
      if !self.precedes(r, value) {
        return x;
      }
      x = r;
    }
  }

  /// Returns the middle node of the run strictly between `start` and `end` if
  /// the run has at least `MAX_CONS_NODES` nodes.
  fn crowded(&self, start: NodeRef, end: NodeRef) -> Option<NodeRef> {
    let mut run = 0;
    let mut mid = NodeRef::NONE;
    let mut x = self.arena.read(start).right;
    while x != end && run < MAX_CONS_NODES {
      run += 1;
      if run == MAX_CONS_NODES / 2 + 1 {
        mid = x;
      }
      x = self.arena.read(x).right;
    }
    (run >= MAX_CONS_NODES).then_some(mid)
  }

  /// Copies `below` onto the level above it, right after `left`.
  fn promote(&mut self, left: NodeRef, below: NodeRef) -> Result<NodeRef, FreeListError> {
    let m = self.arena.allocate()?;
    let mut b = self.arena.read(below);
    let mut node = Node::new(b.entry(), b.level + 1);
    node.down = below;
    self.link_after(left, m, node);

    b.up = m;
    self.arena.write(below, b);
    self.promotions += 1;

    #[cfg(feature = "tracing")]
    tracing::trace!(rank = b.value, level = b.level + 1, "promoted node");
    Ok(m)
  }

  /// Writes `node` into slot `n` and splices it between `left` and its right
  /// neighbour.
  fn link_after(&mut self, left: NodeRef, n: NodeRef, mut node: Node) {
    let mut l = self.arena.read(left);
    let right = l.right;
    node.left = left;
    node.right = right;
    self.arena.write(n, node);

    l.right = n;
    self.arena.write(left, l);

    let mut r = self.arena.read(right);
    r.left = n;
    self.arena.write(right, r);
  }

  fn unlink(&mut self, node: &Node) {
    let mut l = self.arena.read(node.left);
    l.right = node.right;
    self.arena.write(node.left, l);

    let mut r = self.arena.read(node.right);
    r.left = node.left;
    self.arena.write(node.right, r);
  }

  fn release(&mut self, r: NodeRef) {
    match self.arena.free(r) {
      Ok(()) => {}
      Err(FreeListError::DoubleFree(idx)) => {
        let e = InvariantViolation::DoubleFree(idx);
        #[cfg(feature = "tracing")]
        tracing::error!(node = idx, "free list rejected a release: {e}");
        panic!("skiplist node graph is corrupted: {e}");
      }
      Err(e) => {
        #[cfg(feature = "tracing")]
        tracing::error!(node = r.index(), "free list rejected a release: {e}");
        panic!("skiplist node graph is corrupted: {e}");
      }
    }
  }

  fn collapse(&mut self) {
    while self.max_level > 0 {
      let top = self.max_level as usize;
      if self.arena.read(self.head[top]).right != self.tail[top] {
        break;
      }
      self.max_level -= 1;

      #[cfg(feature = "tracing")]
      tracing::debug!(level = self.max_level, "skiplist dropped its top level");
    }
  }
}

impl Node {
  #[inline]
  const fn with_level(mut self, level: u8) -> Self {
    self.level = level;
    self
  }
}

/// Iterator over the level-0 entries of a [`SkipList`], in rank order.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
  list: &'a SkipList,
  cur: NodeRef,
}

impl Iterator for Iter<'_> {
  type Item = Entry;

  fn next(&mut self) -> Option<Self::Item> {
    if self.list.arena.is_reserved(self.cur) {
      return None;
    }
    let node = self.list.arena.read(self.cur);
    self.cur = node.right;
    Some(node.entry())
  }
}
