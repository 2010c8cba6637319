use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{AdmissionError, EmptyQueue, Shard, Tick};

use super::*;

macro_rules! shard_tests {
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

shard_tests!(
  scenario,
  round_trip,
  order,
  conservation,
  capacity_boundary,
  register_invariant,
  matches_sorted_model,
  empty_dequeue,
);

fn new_shard(base: Options, leveling: Leveling) -> Shard {
  Shard::new(options(base, leveling)).unwrap()
}

/// Enqueues, running background steps while the staging fifo pushes back.
fn push(s: &mut Shard, e: Entry) {
  loop {
    match s.enqueue(e) {
      Ok(()) => return,
      Err(AdmissionError::Full) => assert_ne!(s.tick(), Tick::Idle),
      Err(err) => panic!("unexpected admission error: {err}"),
    }
  }
}

fn settle(s: &mut Shard) {
  while s.has_work() {
    s.tick();
  }
}

fn drain(s: &mut Shard) -> Vec<Entry> {
  core::iter::from_fn(|| s.dequeue().ok()).collect()
}

fn scenario(leveling: Leveling) {
  let mut s = new_shard(TEST_SMALL_OPTIONS, leveling);
  for (id, rank) in [5, 3, 8].into_iter().enumerate() {
    s.enqueue(entry(rank, id as u32)).unwrap();
  }
  assert_eq!(s.next(), Some(3));

  // the register holds {5, 3}: 1 evicts 5 into the body
  s.enqueue(entry(1, 3)).unwrap();
  let mut held = ranks(s.register().entries());
  held.sort_unstable();
  assert_eq!(held, [1, 3]);
  assert_eq!(s.stats().evictions, 1);

  settle(&mut s);
  assert_eq!(s.body().iter().map(|e| e.rank).collect::<Vec<_>>(), [5, 8]);
  s.check_invariants().unwrap();

  let out: Vec<_> = (0..4).map(|_| s.dequeue().unwrap()).collect();
  assert_eq!(ranks(&out), [1, 3, 5, 8]);
  assert_eq!(out[0], entry(1, 3));
  assert!(s.is_empty());
}

fn round_trip(leveling: Leveling) {
  let mut s = new_shard(TEST_OPTIONS, leveling);
  let e = Entry::new(42, 7, 9);
  s.enqueue(e).unwrap();
  assert_eq!(s.dequeue(), Ok(e));
  assert_eq!(s.dequeue(), Err(EmptyQueue));
}

fn order(leveling: Leveling) {
  let mut rng = StdRng::seed_from_u64(1);
  let mut s = new_shard(TEST_OPTIONS, leveling);
  for id in 0..1000 {
    push(&mut s, entry(rng.random_range(0..500), id));
    if id % 3 == 0 {
      s.tick();
    }
  }
  s.check_invariants().unwrap();

  let out = drain(&mut s);
  assert_eq!(out.len(), 1000);
  assert!(is_sorted(&ranks(&out)));
  s.check_invariants().unwrap();
  assert_eq!(s.body().arena().allocated(), 0);
}

fn conservation(leveling: Leveling) {
  let mut rng = StdRng::seed_from_u64(2);
  let mut s = new_shard(TEST_OPTIONS, leveling);
  let mut out = Vec::new();

  for id in 0..600u32 {
    push(&mut s, entry(rng.random_range(0..64), id));
    if rng.random_bool(0.3) {
      out.push(s.dequeue().unwrap());
    }
    if rng.random_bool(0.5) {
      s.tick();
    }
  }
  assert_eq!(s.len(), 600 - out.len());

  out.extend(drain(&mut s));
  let mut ids: Vec<_> = out.iter().map(|e| e.payload).collect();
  ids.sort_unstable();
  assert_eq!(ids, (0..600).collect::<Vec<_>>());
  for e in &out {
    assert_eq!(e.meta, e.payload.wrapping_mul(31));
  }
}

fn capacity_boundary(leveling: Leveling) {
  let mut s = new_shard(TEST_SMALL_OPTIONS, leveling);
  for id in 0..16 {
    push(&mut s, entry(Rank::from(16 - id), id));
  }
  assert_eq!(s.len(), s.capacity());
  assert_eq!(s.enqueue(entry(0, 99)), Err(AdmissionError::ArenaExhausted));
  s.check_invariants().unwrap();

  let out = drain(&mut s);
  assert_eq!(ranks(&out), (1..=16).collect::<Vec<_>>());
  s.check_invariants().unwrap();

  // the freed nodes are reusable
  for id in 0..16 {
    push(&mut s, entry(Rank::from(id), id));
  }
  assert_eq!(s.len(), 16);
}

fn register_invariant(leveling: Leveling) {
  let mut rng = StdRng::seed_from_u64(3);
  let mut s = new_shard(TEST_SMALL_OPTIONS, leveling);
  for id in 0..2000u32 {
    match rng.random_range(0..4) {
      0 if !s.is_empty() => {
        s.dequeue().unwrap();
      }
      1 => {
        s.tick();
      }
      _ => {
        let _ = s.enqueue(entry(rng.random_range(0..32), id));
      }
    }
    s.check_invariants().unwrap();
  }
}

fn matches_sorted_model(leveling: Leveling) {
  let mut rng = StdRng::seed_from_u64(4);
  let mut s = new_shard(
    TEST_OPTIONS.with_register_width(3).with_staging_depth(4),
    leveling,
  );
  let mut model: Vec<Rank> = Vec::new();

  for id in 0..3000u32 {
    if !model.is_empty() && rng.random_bool(0.4) {
      let got = s.dequeue().unwrap();
      assert_eq!(got.rank, model.remove(0), "step {id}");
    } else {
      let rank = rng.random_range(0..100);
      match s.enqueue(entry(rank, id)) {
        Ok(()) => {
          let at = model.partition_point(|&r| r <= rank);
          model.insert(at, rank);
        }
        Err(AdmissionError::Full) => {}
        Err(e) => panic!("unexpected admission error: {e}"),
      }
    }
    if rng.random_bool(0.6) {
      s.tick();
    }
  }
  assert_eq!(s.len(), model.len());
}

fn empty_dequeue(leveling: Leveling) {
  let mut s = new_shard(TEST_SMALL_OPTIONS, leveling);
  let before = s.stats();
  assert_eq!(s.dequeue(), Err(EmptyQueue));
  assert_eq!(s.tick(), Tick::Idle);
  assert!(!s.has_work());
  assert_eq!(s.stats(), before);
  assert!(s.is_empty());
  s.check_invariants().unwrap();
}

#[test]
fn test_insert_threshold_holds_back_body() {
  let mut s = Shard::new(TEST_SMALL_OPTIONS.with_insert_threshold(3)).unwrap();
  for (id, rank) in [1, 2, 3, 4].into_iter().enumerate() {
    s.enqueue(entry(rank, id as u32)).unwrap();
  }
  assert_eq!(s.staged(), 2);
  assert!(!s.has_work());
  assert_eq!(s.tick(), Tick::Idle);

  s.enqueue(entry(5, 4)).unwrap();
  assert_eq!(s.tick(), Tick::Inserted);
  assert_eq!(s.body().len(), 1);
}

#[test]
fn test_dequeue_refills_empty_register() {
  let mut s = Shard::new(TEST_SMALL_OPTIONS).unwrap();
  for (id, rank) in [9, 7, 5, 3].into_iter().enumerate() {
    s.enqueue(entry(rank, id as u32)).unwrap();
  }
  settle(&mut s);
  assert_eq!(s.body().len(), 2);

  assert_eq!(s.dequeue().unwrap().rank, 3);
  assert_eq!(s.dequeue().unwrap().rank, 5);
  // no tick in between: the register is empty, the body is not
  assert!(!s.next_valid());
  assert_eq!(s.dequeue().unwrap().rank, 7);
  assert_eq!(s.dequeue().unwrap().rank, 9);
  assert_eq!(s.dequeue(), Err(EmptyQueue));
}
