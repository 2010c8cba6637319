use core::fmt;

use super::SkipList;
use crate::arena::Node;

impl SkipList {
  fn height(&self, node: &Node) -> u8 {
    let mut h = node.level;
    let mut up = node.up;
    while up.is_some() {
      let n = self.arena.read(up);
      h = n.level;
      up = n.up;
    }
    h
  }
}

/// Draws one row per level, top level first, with every rank aligned to its
/// column on level 0:
///
/// ```text
/// -oo--------3-----------+oo
/// -oo--1-----3-----7-----+oo
/// -oo--1--2--3--5--7--9--+oo
/// ```
impl fmt::Display for SkipList {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for level in (0..=self.max_level).rev() {
      f.write_str("-oo--")?;
      let mut cur = self.arena.read(self.head(0)).right;
      while !self.arena.is_reserved(cur) {
        let node = self.arena.read(cur);
        if self.height(&node) >= level {
          write!(f, "{}--", node.value)?;
        } else {
          let width = node.value.to_string().len() + 2;
          write!(f, "{:-<width$}", "")?;
        }
        cur = node.right;
      }
      writeln!(f, "+oo")?;
    }
    Ok(())
  }
}
