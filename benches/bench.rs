use criterion::*;
use pifo::{sync, unsync, Entry, Leveling, Options, SkipList};
use rand::prelude::*;
use std::{
  sync::{atomic::*, *},
  thread,
};

const LEVELINGS: [(&str, Leveling); 2] = [
  ("deterministic", Leveling::Deterministic),
  ("probabilistic", Leveling::Probabilistic),
];

fn random_entry(rng: &mut ThreadRng) -> Entry {
  Entry::new(rng.random_range(0..1 << 20), rng.random(), 0)
}

fn bench_skiplist_insert_pop(c: &mut Criterion) {
  let mut group = c.benchmark_group("skiplist_insert_pop");
  for (name, leveling) in LEVELINGS {
    group.bench_function(BenchmarkId::from_parameter(name), |b| {
      let mut list = SkipList::new(1 << 16, leveling, Some(0));
      let mut rng = rand::rng();
      for _ in 0..1 << 15 {
        list.insert(random_entry(&mut rng)).unwrap();
      }
      b.iter_batched(
        || random_entry(&mut rng),
        |entry| {
          list.insert(entry).unwrap();
          black_box(list.pop_first());
        },
        BatchSize::SmallInput,
      );
    });
  }
  group.finish();
}

fn bench_unsync_steady_state(c: &mut Criterion) {
  let mut group = c.benchmark_group("unsync_steady_state");
  for shards in [1, 4] {
    for (name, leveling) in LEVELINGS {
      let opts = Options::new()
        .with_capacity(1 << 14)
        .with_shards(shards)
        .with_leveling(leveling)
        .with_seed(Some(0));
      group.bench_with_input(
        BenchmarkId::new(name, shards),
        &opts,
        |b, opts| {
          let mut pifo = unsync::Pifo::new(*opts).unwrap();
          let mut rng = rand::rng();
          for _ in 0..1 << 12 {
            while pifo.enqueue(random_entry(&mut rng)).is_err() {
              pifo.tick();
            }
          }
          pifo.settle();
          b.iter_batched(
            || random_entry(&mut rng),
            |entry| {
              while pifo.enqueue(entry).is_err() {
                pifo.tick();
              }
              black_box(pifo.dequeue().unwrap());
              pifo.tick();
            },
            BatchSize::SmallInput,
          );
        },
      );
    }
  }
  group.finish();
}

fn bench_sync_dequeue_under_load(c: &mut Criterion) {
  let mut group = c.benchmark_group("sync_dequeue_under_load");
  for shards in [1, 2, 4] {
    group.bench_with_input(
      BenchmarkId::from_parameter(shards),
      &shards,
      |b, &shards| {
        let pifo = Arc::new(
          sync::Pifo::new(
            Options::new()
              .with_capacity(1 << 14)
              .with_shards(shards),
          )
          .unwrap(),
        );
        let p = pifo.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let s = stop.clone();
        let j = thread::spawn(move || {
          let mut rng = rand::rng();
          while !s.load(Ordering::SeqCst) {
            if p.len() < 1 << 12 {
              let _ = p.enqueue(random_entry(&mut rng));
            } else {
              thread::yield_now();
            }
          }
        });

        while pifo.len() < 1 << 10 {
          thread::yield_now();
        }
        b.iter(|| black_box(pifo.dequeue()));
        stop.store(true, Ordering::SeqCst);
        j.join().unwrap();
      },
    );
  }
  group.finish();
}

criterion_group!(
  benches,
  bench_skiplist_insert_pop,
  bench_unsync_steady_state,
  bench_sync_dequeue_under_load,
);
criterion_main!(benches);
