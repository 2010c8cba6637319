use std::{collections::BTreeMap, num::NonZeroU32};

use pifo::{
  manager::{ManagerError, TrafficManager},
  rank::{FlowId, Stfq},
  storage::SlabStore,
  unsync::Pifo,
  Options,
};

const PACKETS_PER_FLOW: usize = 64;

fn main() {
  let queue = Pifo::new(
    Options::new()
      .with_capacity(256)
      .with_shards(4)
      .with_register_width(4),
  )
  .unwrap();
  let mut tm = TrafficManager::new(SlabStore::<FlowId>::new(1024), queue);

  // flow 3 gets four times the bandwidth of flow 1
  let mut stfq = Stfq::new();
  for (flow, weight) in [(1, 1), (2, 2), (3, 4)] {
    stfq.set_weight(flow, NonZeroU32::new(weight).unwrap());
  }

  for i in 0..PACKETS_PER_FLOW {
    for flow in [1, 2, 3] {
      let pkt = vec![flow as u8; 100 + i % 7];
      let rank = stfq.rank(tm.clock(), flow, pkt.len() as u32);
      tm.enqueue(rank, &pkt, flow).unwrap();
    }
  }

  // serve half the backlog, then look at who got the link
  let mut served = BTreeMap::<FlowId, usize>::new();
  for _ in 0..PACKETS_PER_FLOW * 3 / 2 {
    match tm.dequeue() {
      Ok((_, bytes, flow)) => *served.entry(flow).or_default() += bytes.len(),
      Err(ManagerError::Empty(_)) => break,
      Err(err) => panic!("traffic manager failed: {err}"),
    }
  }

  println!("virtual time: {}", tm.clock().now());
  for (flow, bytes) in &served {
    println!("flow {flow} (weight {}): {bytes} bytes", stfq.weight(*flow));
  }

  let (store, queue) = tm.into_parts();
  println!(
    "{} packets still stored, {} still queued",
    store.len(),
    queue.len()
  );
}
