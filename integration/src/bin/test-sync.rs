use integration::{assert_handles, random_entry};
use pifo::{sync::Pifo, AdmissionError, Options};
use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  thread,
};

fn main() {
  const PRODUCERS: u32 = 8;
  const N: u32 = 5000;

  let pifo = Arc::new(
    Pifo::new(
      Options::new()
        .with_capacity(1 << 13)
        .with_shards(4)
        .with_register_width(8)
        .with_staging_depth(32),
    )
    .unwrap(),
  );

  let done = Arc::new(AtomicBool::new(false));
  let consumer = {
    let pifo = pifo.clone();
    let done = done.clone();
    thread::spawn(move || {
      let mut seen = Vec::with_capacity((PRODUCERS * N) as usize);
      loop {
        match pifo.dequeue() {
          Ok(e) => {
            assert_handles(&e);
            seen.push(e.payload);
          }
          Err(_) if done.load(Ordering::Acquire) && pifo.is_empty() => break,
          Err(_) => thread::yield_now(),
        }
      }
      seen
    })
  };

  let producers: Vec<_> = (0..PRODUCERS)
    .map(|t| {
      let pifo = pifo.clone();
      thread::spawn(move || {
        let mut rng = rand::rng();
        for i in 0..N {
          let e = random_entry(&mut rng, t * N + i, 1 << 16);
          loop {
            match pifo.enqueue(e) {
              Ok(()) => break,
              Err(AdmissionError::Full) | Err(AdmissionError::ArenaExhausted) => {
                thread::yield_now()
              }
              Err(err) => panic!("broken: {err}"),
            }
          }
        }
      })
    })
    .collect();
  for p in producers {
    p.join().unwrap();
  }
  done.store(true, Ordering::Release);

  let mut seen = consumer.join().unwrap();
  seen.sort_unstable();
  assert_eq!(seen, (0..PRODUCERS * N).collect::<Vec<_>>());
  println!("{} entries went through {} shards", seen.len(), pifo.shards());
}
