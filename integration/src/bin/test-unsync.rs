use integration::{assert_handles, random_entry};
use pifo::{unsync::Pifo, AdmissionError, Leveling, Options, Shard, Stats};

fn main() {
  const ROUNDS: u32 = 200_000;

  for leveling in [Leveling::Deterministic, Leveling::Probabilistic] {
    let mut pifo = Pifo::new(
      Options::new()
        .with_capacity(1 << 12)
        .with_shards(8)
        .with_leveling(leveling),
    )
    .unwrap();
    let mut rng = rand::rng();
    let mut last = 0;

    for id in 0..ROUNDS {
      // keep the queue about half full
      if rand::Rng::random_bool(&mut rng, 0.5) && !pifo.is_empty() {
        let e = pifo.dequeue().unwrap();
        assert_handles(&e);
        last = e.rank;
      } else {
        // ranks never go below the last dequeued one, so the output is sorted
        let mut e = random_entry(&mut rng, id, 1 << 10);
        e.rank += last;
        match pifo.enqueue(e) {
          Ok(()) | Err(AdmissionError::Full) => {}
          Err(err) => panic!("broken: {err}"),
        }
      }
      pifo.tick();
    }
    pifo.check_invariants().unwrap();

    let mut prev = last;
    while let Ok(e) = pifo.dequeue() {
      assert!(e.rank >= prev, "broken: {} after {prev}", e.rank);
      prev = e.rank;
    }

    let stats: Stats = pifo.shards().iter().map(Shard::stats).sum();
    println!("{leveling:?}: {stats:?}");
  }
}
