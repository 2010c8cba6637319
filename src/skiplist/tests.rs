use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::*;
use crate::InvariantViolation;

fn e(rank: Rank) -> Entry {
  Entry::new(rank, rank as u32, 0)
}

fn ranks(list: &SkipList) -> Vec<Rank> {
  list.iter().map(|e| e.rank).collect()
}

fn list(capacity: u32, leveling: Leveling) -> SkipList {
  SkipList::new(capacity, leveling, Some(42))
}

macro_rules! leveling_tests {
  ($($name:ident),+ $(,)?) => {
    paste::paste! {
      $(
        #[test]
        fn [< test_ $name _deterministic >]() {
          $name(Leveling::Deterministic);
        }

        #[test]
        fn [< test_ $name _probabilistic >]() {
          $name(Leveling::Probabilistic);
        }
      )+
    }
  };
}

leveling_tests!(
  empty,
  sorted_insert,
  reverse_insert,
  shuffled_insert,
  equal_ranks_keep_arrival_order,
  pop_releases_every_node,
  fill_to_capacity,
  interleaved,
);

fn empty(leveling: Leveling) {
  let mut l = list(16, leveling);
  assert!(l.is_empty());
  assert_eq!(l.levels(), 5);
  assert_eq!(l.max_level(), 0);
  assert_eq!(l.first(), None);
  assert_eq!(l.pop_first(), None);
  assert_eq!(l.available(), 32);
  l.check().unwrap();
}

fn sorted_insert(leveling: Leveling) {
  let mut l = list(64, leveling);
  for r in 0..64 {
    l.insert(e(r)).unwrap();
    l.check().unwrap();
  }
  assert_eq!(ranks(&l), (0..64).collect::<Vec<_>>());
  assert_eq!(l.len(), 64);
}

fn reverse_insert(leveling: Leveling) {
  let mut l = list(64, leveling);
  for r in (0..64).rev() {
    l.insert(e(r)).unwrap();
    l.check().unwrap();
  }
  assert_eq!(ranks(&l), (0..64).collect::<Vec<_>>());
  for r in 0..64 {
    assert_eq!(l.pop_first(), Some(e(r)));
    l.check().unwrap();
  }
  assert!(l.is_empty());
}

fn shuffled_insert(leveling: Leveling) {
  let mut rng = StdRng::seed_from_u64(7);
  let mut input: Vec<Rank> = (0..128).map(|r| r * 3 % 101).collect();
  input.shuffle(&mut rng);

  let mut l = list(128, leveling);
  for &r in &input {
    l.insert(e(r)).unwrap();
  }
  l.check().unwrap();

  input.sort_unstable();
  assert_eq!(ranks(&l), input);
  let popped: Vec<_> = core::iter::from_fn(|| l.pop_first().map(|e| e.rank)).collect();
  assert_eq!(popped, input);
  l.check().unwrap();
}

fn equal_ranks_keep_arrival_order(leveling: Leveling) {
  let mut l = list(32, leveling);
  for i in 0..20u32 {
    let rank = if i % 2 == 0 { 5 } else { Rank::from(i) + 100 };
    l.insert(Entry::new(rank, i, 0)).unwrap();
  }
  l.check().unwrap();

  let fives: Vec<_> = l.iter().filter(|e| e.rank == 5).map(|e| e.payload).collect();
  assert_eq!(fives, (0..20).step_by(2).collect::<Vec<_>>());

  let popped: Vec<_> = core::iter::from_fn(|| l.pop_first())
    .filter(|e| e.rank == 5)
    .map(|e| e.payload)
    .collect();
  assert_eq!(popped, fives);
}

fn pop_releases_every_node(leveling: Leveling) {
  let mut l = list(32, leveling);
  for r in [9, 4, 7, 1, 8, 2, 6, 3, 5, 0, 11, 10] {
    l.insert(e(r)).unwrap();
  }
  assert!(l.arena().allocated() >= 12);
  while l.pop_first().is_some() {
    l.check().unwrap();
  }
  assert_eq!(l.arena().allocated(), 0);
  assert_eq!(l.max_level(), 0);
}

fn fill_to_capacity(leveling: Leveling) {
  let mut l = list(16, leveling);
  let mut rng = StdRng::seed_from_u64(3);
  let mut input: Vec<Rank> = (0..16).collect();
  input.shuffle(&mut rng);

  for &r in &input {
    l.insert(e(r)).unwrap();
  }
  l.check().unwrap();
  assert!(l.max_level() < l.levels());
  assert_eq!(ranks(&l), (0..16).collect::<Vec<_>>());
}

fn interleaved(leveling: Leveling) {
  let mut rng = StdRng::seed_from_u64(11);
  let mut l = list(64, leveling);
  let mut model: Vec<Entry> = Vec::new();
  let mut next_payload = 0u32;

  for round in 0..500 {
    let pop = !model.is_empty() && (model.len() >= 60 || rand::Rng::random_bool(&mut rng, 0.45));
    if pop {
      let expected = model.remove(0);
      assert_eq!(l.pop_first(), Some(expected), "round {round}");
    } else {
      let rank = rand::Rng::random_range(&mut rng, 0..40);
      let entry = Entry::new(rank, next_payload, 0);
      next_payload += 1;
      l.insert(entry).unwrap();
      let at = model.partition_point(|e| e.rank <= rank);
      model.insert(at, entry);
    }
    l.check().unwrap();
    assert_eq!(l.first(), model.first().copied());
  }
}

#[test]
fn test_deterministic_promotion() {
  let mut l = list(16, Leveling::Deterministic);
  for r in 1..=3 {
    l.insert(e(r)).unwrap();
  }
  assert_eq!(l.max_level(), 0);
  assert_eq!(l.promotions(), 0);

  // three nodes on the top level: the middle one is promoted first
  l.insert(e(4)).unwrap();
  assert_eq!(l.max_level(), 1);
  assert_eq!(l.promotions(), 1);
  assert_eq!(
    l.to_string(),
    "-oo-----2--------+oo\n-oo--1--2--3--4--+oo\n"
  );
  l.check().unwrap();
}

#[test]
fn test_deterministic_runs_stay_short() {
  let mut l = list(256, Leveling::Deterministic);
  for r in 0..256 {
    l.insert(e(r)).unwrap();
  }
  l.check().unwrap();

  // every run between two towers on the level above is at most three long,
  // checked on the levels an insertion descends through
  for level in 1..=l.max_level() {
    let mut x = l.arena().read(l.head(level)).right;
    let mut towers = vec![l.head(level - 1)];
    while !l.arena().is_reserved(x) {
      let node = l.arena().read(x);
      towers.push(node.down);
      x = node.right;
    }
    towers.push(l.tail(level - 1));

    for pair in towers.windows(2) {
      let mut run = 0;
      let mut y = l.arena().read(pair[0]).right;
      while y != pair[1] {
        run += 1;
        y = l.arena().read(y).right;
      }
      assert!(run <= MAX_CONS_NODES, "run of {run} on level {}", level - 1);
    }
  }
  assert!(l.max_level() <= 8);
}

#[test]
fn test_search_returns_left_and_down() {
  let mut l = list(16, Leveling::Deterministic);
  for r in [10, 20, 30, 40, 50] {
    l.insert(e(r)).unwrap();
  }
  assert!(l.max_level() >= 1);

  let (left, down) = l.search(l.head(l.max_level()), 0, 35);
  assert_eq!(l.arena().read(left).value, 30);
  assert!(down.is_none());

  let (left, _) = l.search(l.head(l.max_level()), 0, 5);
  assert_eq!(left, l.head(0));

  let (left, _) = l.search(l.head(l.max_level()), 0, 30);
  assert_eq!(l.arena().read(left).value, 30);

  let (left, down) = l.search(l.head(1), 1, 100);
  assert_eq!(l.arena().read(left).level, 1);
  assert_eq!(l.arena().read(down).level, 0);
}

#[test]
fn test_insert_fails_without_free_node() {
  let mut l = list(2, Leveling::Deterministic);
  for r in 0..4 {
    l.insert(e(r)).unwrap();
  }
  assert_eq!(l.available(), 0);
  assert!(!l.can_insert());
  assert_eq!(l.insert(e(9)), Err(FreeListError::OutOfCapacity));
  assert_eq!(l.len(), 4);
  l.check().unwrap();
}

#[test]
fn test_required_nodes() {
  let mut l = list(16, Leveling::Deterministic);
  assert_eq!(l.required_nodes(), 2);
  for r in 0..4 {
    l.insert(e(r)).unwrap();
  }
  assert_eq!(l.max_level(), 1);
  assert_eq!(l.required_nodes(), 3);

  let mut p = list(16, Leveling::Probabilistic);
  assert_eq!(p.required_nodes(), 1);
  p.insert(e(0)).unwrap();
  assert_eq!(p.required_nodes(), p.max_level() as usize + 1);
}

#[test]
fn test_render_single_level() {
  let mut l = list(16, Leveling::Deterministic);
  for r in [3, 12, 100] {
    l.insert(e(r)).unwrap();
  }
  assert_eq!(l.to_string(), "-oo--3--12--100--+oo\n");
}

#[test]
fn test_check_catches_corruption() {
  let mut l = list(16, Leveling::Deterministic);
  for r in 0..6 {
    l.insert(e(r)).unwrap();
  }
  l.check().unwrap();

  let first = l.arena().read(l.head(0)).right;
  let mut node = l.arena().read(first);
  node.value = 99;
  l.arena.write(first, node);
  assert!(matches!(
    l.check(),
    Err(InvariantViolation::Unordered { level: 0, .. })
  ));
}

#[test]
fn test_check_catches_leak() {
  let mut l = list(16, Leveling::Deterministic);
  l.insert(e(1)).unwrap();
  let leaked = l.arena.allocate().unwrap();
  assert_eq!(
    l.check(),
    Err(InvariantViolation::LeakedNode(leaked.index()))
  );
}

#[test]
#[should_panic(expected = "freed twice")]
fn test_double_release_panics() {
  let mut l = list(16, Leveling::Deterministic);
  l.insert(e(1)).unwrap();
  let first = l.arena().read(l.head(0)).right;
  l.release(first);
  l.release(first);
}
