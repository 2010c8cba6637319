use super::SkipList;
use crate::{
  arena::{Node, NodeRef},
  InvariantViolation,
};

impl SkipList {
  /// Walks every level and every arena slot and reports the first broken
  /// structural invariant:
  ///
  /// - every level is ordered and doubly linked from its head to its tail,
  /// - every upper-level node is linked `down` to a copy of itself whose `up`
  ///   points back,
  /// - `max_level` is the highest non-empty level and level 0 holds `len`
  ///   nodes,
  /// - every data slot is either linked exactly once or cleared and free.
  pub fn check(&self) -> Result<(), InvariantViolation> {
    let cap = self.arena.capacity() as usize;
    let mut seen = vec![false; cap];
    let mut highest = 0;

    for level in 0..self.levels() {
      let head = self.head(level);
      let tail = self.tail(level);
      let mut prev = head;
      let mut prev_node = self.arena.read(head);
      let mut count = 0;

      loop {
        let cur = prev_node.right;
        if cur.is_none() {
          return Err(InvariantViolation::BrokenLink(prev.index()));
        }
        let node = self.arena.read(cur);
        if node.left != prev {
          return Err(InvariantViolation::BrokenLink(cur.index()));
        }
        if cur == tail {
          break;
        }
        if self.arena.is_reserved(cur) || seen[cur.index() as usize] {
          return Err(InvariantViolation::BrokenLink(prev.index()));
        }
        seen[cur.index() as usize] = true;

        if self.arena.is_free(cur) {
          return Err(InvariantViolation::FreeInUse(cur.index()));
        }
        if node.level != level {
          return Err(InvariantViolation::LevelMismatch(cur.index()));
        }
        if prev != head && prev_node.value > node.value {
          return Err(InvariantViolation::Unordered {
            level,
            left: prev.index(),
            right: cur.index(),
          });
        }
        self.check_tower(cur, &node)?;

        count += 1;
        prev = cur;
        prev_node = node;
      }

      if level == 0 && count != self.len {
        return Err(InvariantViolation::LengthMismatch {
          recorded: self.len,
          actual: count,
        });
      }
      if count > 0 {
        highest = level;
      }
    }

    if highest != self.max_level {
      return Err(InvariantViolation::MaxLevel {
        recorded: self.max_level,
        actual: highest,
      });
    }

    for (idx, linked) in seen.into_iter().enumerate() {
      let r = NodeRef::new(idx as u32);
      if linked {
        continue;
      }
      if !self.arena.is_free(r) {
        return Err(InvariantViolation::LeakedNode(r.index()));
      }
      if self.arena.read(r) != Node::VACANT {
        return Err(InvariantViolation::DanglingLinks(r.index()));
      }
    }

    Ok(())
  }

  fn check_tower(&self, cur: NodeRef, node: &Node) -> Result<(), InvariantViolation> {
    if node.level == 0 {
      if node.down.is_some() {
        return Err(InvariantViolation::BrokenLink(cur.index()));
      }
    } else {
      if node.down.is_none() || self.arena.is_reserved(node.down) {
        return Err(InvariantViolation::BrokenLink(cur.index()));
      }
      let below = self.arena.read(node.down);
      if below.up != cur {
        return Err(InvariantViolation::BrokenLink(cur.index()));
      }
      if below.level + 1 != node.level || below.entry() != node.entry() {
        return Err(InvariantViolation::LevelMismatch(cur.index()));
      }
    }

    if node.up.is_some() && self.arena.read(node.up).down != cur {
      return Err(InvariantViolation::BrokenLink(cur.index()));
    }
    Ok(())
  }
}
