use std::{
  sync::{
    atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
    Arc,
  },
  thread::JoinHandle,
};

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::Mutex;

use crate::{
  AdmissionError, ConfigError, EmptyQueue, Entry, Options, Rank, Scheduler, Shard, Tick,
};

/// Bounded pipes between the wrapper and its shard workers.
pub mod pipe;
use pipe::{Consumer, PipeError, Producer};

bitflags::bitflags! {
  /// What a shard worker publishes about its shard.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct Status: u8 {
    /// The worker is running a background step.
    const BUSY = 1;
    /// The shard's register holds an entry, its rank is published as `next`.
    const NEXT_VALID = 1 << 1;
  }
}

enum Request {
  Enqueue(Entry),
  Dequeue,
}

/// Shard state written by the worker only and read by the wrapper.
#[derive(Debug)]
struct Published {
  status: CachePadded<AtomicU8>,
  next: CachePadded<AtomicU64>,
  len: CachePadded<AtomicUsize>,
}

impl Published {
  fn new() -> Self {
    Self {
      status: CachePadded::new(AtomicU8::new(0)),
      next: CachePadded::new(AtomicU64::new(Rank::MAX)),
      len: CachePadded::new(AtomicUsize::new(0)),
    }
  }

  #[inline]
  fn status(&self) -> Status {
    Status::from_bits_truncate(self.status.load(Ordering::Acquire))
  }
}

/// The wrapper's end of one shard.
struct Port {
  requests: Producer<Request>,
  admitted: Consumer<Result<(), AdmissionError>>,
  dequeued: Consumer<Result<Entry, EmptyQueue>>,
  published: Arc<Published>,
  /// Entries admitted to this shard and not yet dequeued, as counted by the
  /// wrapper.
  count: CachePadded<AtomicUsize>,
}

impl Port {
  fn request<T>(&self, req: Request, response: &Consumer<T>) -> T {
    if self.requests.push(req).is_err() {
      panic!("shard worker terminated");
    }
    match response.pop() {
      Ok(res) => res,
      Err(_) => panic!("shard worker terminated"),
    }
  }
}

struct Worker {
  shard: Shard,
  requests: Consumer<Request>,
  admitted: Producer<Result<(), AdmissionError>>,
  dequeued: Producer<Result<Entry, EmptyQueue>>,
  published: Arc<Published>,
}

impl Worker {
  fn run(mut self) {
    loop {
      let req = match self.requests.try_pop() {
        Ok(req) => req,
        Err(PipeError::Empty) if self.shard.has_work() => {
          self.tick();
          continue;
        }
        Err(PipeError::Empty) => match self.requests.pop() {
          Ok(req) => req,
          Err(_) => break,
        },
        Err(_) => break,
      };

      let sent = match req {
        Request::Enqueue(entry) => {
          let res = self.shard.enqueue(entry);
          self.publish();
          self.admitted.push(res).is_ok()
        }
        Request::Dequeue => {
          let res = self.shard.dequeue();
          self.publish();
          self.dequeued.push(res).is_ok()
        }
      };
      if !sent {
        break;
      }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(len = self.shard.len(), "shard worker stopped");
  }

  fn tick(&mut self) -> Tick {
    self
      .published
      .status
      .fetch_or(Status::BUSY.bits(), Ordering::AcqRel);
    let tick = self.shard.tick();
    self.publish();
    tick
  }

  /// Publishes `next` before the status that validates it.
  fn publish(&self) {
    let mut status = Status::empty();
    status.set(Status::BUSY, self.shard.is_busy());
    match self.shard.next() {
      Some(next) => {
        self.published.next.store(next, Ordering::Release);
        status.insert(Status::NEXT_VALID);
      }
      None => self.published.next.store(Rank::MAX, Ordering::Release),
    }
    self.published.len.store(self.shard.len(), Ordering::Release);
    self.published.status.store(status.bits(), Ordering::Release);
  }
}

/// A sharded PIFO with one worker thread per shard.
///
/// Each worker owns its shard outright and runs the shard's background steps
/// whenever its request pipe is idle. The wrapper talks to a worker only
/// through bounded pipes and reads the [`Status`], `next` and length the
/// worker publishes.
///
/// All methods take `&self`: any number of producers and consumers can share
/// the queue behind an [`Arc`]. Enqueues are serialized among themselves, as
/// are dequeues.
///
/// Dropping the queue disconnects the pipes and joins the workers; entries
/// still queued are dropped with their shards.
///
/// ## Example
///
/// ```
/// use pifo::{sync::Pifo, Entry, Options};
///
/// let pifo = Pifo::new(Options::new().with_shards(2)).unwrap();
/// for rank in [30, 10, 20] {
///   pifo.enqueue(Entry::new(rank, 0, 0)).unwrap();
/// }
/// assert_eq!(pifo.dequeue().unwrap().rank, 10);
/// assert_eq!(pifo.dequeue().unwrap().rank, 20);
/// assert_eq!(pifo.dequeue().unwrap().rank, 30);
/// assert!(pifo.dequeue().is_err());
/// ```
pub struct Pifo {
  ports: Vec<Port>,
  workers: Vec<JoinHandle<()>>,
  enqueue_port: Mutex<()>,
  dequeue_port: Mutex<()>,
  len: CachePadded<AtomicUsize>,
}

impl core::fmt::Debug for Pifo {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Pifo")
      .field("shards", &self.ports.len())
      .field("len", &self.len())
      .finish()
  }
}

impl Pifo {
  /// Creates the queue and spawns one worker per shard.
  pub fn new(opts: Options) -> Result<Self, ConfigError> {
    opts.validate()?;

    let mut ports = Vec::with_capacity(opts.shards());
    let mut workers = Vec::with_capacity(opts.shards());
    for i in 0..opts.shards() {
      let (requests_tx, requests_rx) = pipe::bounded(opts.pipe_depth());
      let (admitted_tx, admitted_rx) = pipe::bounded(1);
      let (dequeued_tx, dequeued_rx) = pipe::bounded(1);
      let published = Arc::new(Published::new());

      let worker = Worker {
        shard: Shard::with_index(&opts, i),
        requests: requests_rx,
        admitted: admitted_tx,
        dequeued: dequeued_tx,
        published: published.clone(),
      };
      workers.push(std::thread::spawn(move || worker.run()));

      ports.push(Port {
        requests: requests_tx,
        admitted: admitted_rx,
        dequeued: dequeued_rx,
        published,
        count: CachePadded::new(AtomicUsize::new(0)),
      });
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(shards = opts.shards(), capacity = opts.capacity(), "spawned shard workers");

    Ok(Self {
      ports,
      workers,
      enqueue_port: Mutex::new(()),
      dequeue_port: Mutex::new(()),
      len: CachePadded::new(AtomicUsize::new(0)),
    })
  }

  /// Admits an entry into the least loaded shard that is not busy, the lowest
  /// index winning ties. Backs off while every shard is busy.
  ///
  /// ## Panics
  ///
  /// Panics if the selected shard's worker has terminated, which only happens
  /// when the worker itself panicked on a corrupted node graph.
  pub fn enqueue(&self, entry: Entry) -> Result<(), AdmissionError> {
    let _port = self.enqueue_port.lock();

    let backoff = Backoff::new();
    let idx = loop {
      let idle = self
        .ports
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.published.status().contains(Status::BUSY))
        .min_by_key(|(i, p)| (p.count.load(Ordering::Acquire), *i))
        .map(|(i, _)| i);
      match idle {
        Some(idx) => break idx,
        None => backoff.snooze(),
      }
    };

    #[cfg(feature = "tracing")]
    tracing::trace!(shard = idx, rank = entry.rank, "enqueue");

    let port = &self.ports[idx];
    port.request(Request::Enqueue(entry), &port.admitted)?;
    port.count.fetch_add(1, Ordering::AcqRel);
    self.len.fetch_add(1, Ordering::AcqRel);
    Ok(())
  }

  /// Removes the entry with the smallest rank across all shards.
  ///
  /// Waits for every shard holding entries to publish a valid register head
  /// before choosing, so a shard whose register is momentarily empty is never
  /// skipped.
  ///
  /// ## Panics
  ///
  /// Panics if the selected shard's worker has terminated.
  pub fn dequeue(&self) -> Result<Entry, EmptyQueue> {
    let _port = self.dequeue_port.lock();
    if self.len.load(Ordering::Acquire) == 0 {
      return Err(EmptyQueue);
    }

    let backoff = Backoff::new();
    let idx = loop {
      match self.select() {
        Some(idx) => break idx,
        None => backoff.snooze(),
      }
    };

    #[cfg(feature = "tracing")]
    tracing::trace!(shard = idx, "dequeue");

    let port = &self.ports[idx];
    let entry = port.request(Request::Dequeue, &port.dequeued)?;
    port.count.fetch_sub(1, Ordering::AcqRel);
    self.len.fetch_sub(1, Ordering::AcqRel);
    Ok(entry)
  }

  /// Returns the shard with the smallest published head, or `None` while a
  /// shard with entries has not published one yet.
  fn select(&self) -> Option<usize> {
    let mut best: Option<(Rank, usize)> = None;
    for (i, port) in self.ports.iter().enumerate() {
      if port.count.load(Ordering::Acquire) == 0 {
        continue;
      }
      if !port.published.status().contains(Status::NEXT_VALID) {
        return None;
      }
      let next = port.published.next.load(Ordering::Acquire);
      if best.map_or(true, |(b, _)| next < b) {
        best = Some((next, i));
      }
    }
    best.map(|(_, i)| i)
  }

  /// Returns the number of entries across all shards.
  #[inline]
  pub fn len(&self) -> usize {
    self.len.load(Ordering::Acquire)
  }

  /// Returns `true` if no shard holds an entry.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the number of shards.
  #[inline]
  pub fn shards(&self) -> usize {
    self.ports.len()
  }

  /// Returns the number of entries each shard holds.
  pub fn shard_lens(&self) -> Vec<usize> {
    self
      .ports
      .iter()
      .map(|p| p.count.load(Ordering::Acquire))
      .collect()
  }

  /// Returns the status last published by shard `idx`, with the rank at its
  /// register head if [`Status::NEXT_VALID`] is set.
  pub fn status(&self, idx: usize) -> (Status, Option<Rank>) {
    let published = &self.ports[idx].published;
    let status = published.status();
    let next = status
      .contains(Status::NEXT_VALID)
      .then(|| published.next.load(Ordering::Acquire));
    (status, next)
  }

  /// Returns the shard length last published by the worker of shard `idx`.
  #[inline]
  pub fn published_len(&self, idx: usize) -> usize {
    self.ports[idx].published.len.load(Ordering::Acquire)
  }
}

impl Drop for Pifo {
  fn drop(&mut self) {
    // disconnecting the request pipes stops the workers
    self.ports.clear();
    for worker in self.workers.drain(..) {
      let _ = worker.join();
    }
  }
}

impl Scheduler for Pifo {
  #[inline]
  fn enqueue(&mut self, entry: Entry) -> Result<(), AdmissionError> {
    Pifo::enqueue(self, entry)
  }

  #[inline]
  fn dequeue(&mut self) -> Result<Entry, EmptyQueue> {
    Pifo::dequeue(self)
  }

  #[inline]
  fn len(&self) -> usize {
    Pifo::len(self)
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;

  fn pifo(shards: usize) -> Pifo {
    Pifo::new(
      Options::new()
        .with_capacity(1024)
        .with_shards(shards)
        .with_seed(Some(1)),
    )
    .unwrap()
  }

  /// Enqueues, backing off while the selected shard pushes back.
  fn push(p: &Pifo, entry: Entry) {
    let backoff = Backoff::new();
    loop {
      match p.enqueue(entry) {
        Ok(()) => return,
        Err(AdmissionError::Full) => backoff.snooze(),
        Err(e) => panic!("unexpected admission error: {e}"),
      }
    }
  }

  #[test]
  fn test_empty() {
    let p = pifo(2);
    assert!(p.is_empty());
    assert_eq!(p.dequeue(), Err(EmptyQueue));
    assert_eq!(p.shard_lens(), [0, 0]);
  }

  #[test]
  fn test_invalid_options() {
    assert_eq!(
      Pifo::new(Options::new().with_pipe_depth(0)).unwrap_err(),
      ConfigError::ZeroPipeDepth
    );
  }

  #[test]
  fn test_sorted_drain() {
    let p = pifo(4);
    for id in 0..500u32 {
      push(&p, Entry::new(Rank::from(id * 7919 % 500), id, 0));
    }
    assert_eq!(p.len(), 500);

    let ranks: Vec<_> = core::iter::from_fn(|| p.dequeue().ok())
      .map(|e| e.rank)
      .collect();
    assert_eq!(ranks, (0..500).collect::<Vec<_>>());
    assert!(p.is_empty());
  }

  #[test]
  fn test_status_is_published() {
    let p = pifo(1);
    p.enqueue(Entry::new(12, 0, 0)).unwrap();
    // the admission response is sent after publishing
    let (status, next) = p.status(0);
    assert!(status.contains(Status::NEXT_VALID));
    assert_eq!(next, Some(12));
    assert_eq!(p.published_len(0), 1);

    p.dequeue().unwrap();
    let (status, next) = p.status(0);
    assert!(!status.contains(Status::NEXT_VALID));
    assert_eq!(next, None);
  }

  #[test]
  fn test_concurrent_producers() {
    let p = Arc::new(pifo(4));
    let producers: Vec<_> = (0..4u32)
      .map(|t| {
        let p = p.clone();
        thread::spawn(move || {
          for i in 0..200u32 {
            push(&p, Entry::new(Rank::from((i * 13 + t) % 97), t * 1000 + i, t));
          }
        })
      })
      .collect();
    for h in producers {
      h.join().unwrap();
    }
    assert_eq!(p.len(), 800);

    let out: Vec<_> = core::iter::from_fn(|| p.dequeue().ok()).collect();
    assert_eq!(out.len(), 800);
    assert!(out.windows(2).all(|w| w[0].rank <= w[1].rank));

    let mut ids: Vec<_> = out.iter().map(|e| e.payload).collect();
    ids.sort_unstable();
    let mut expected: Vec<_> = (0..4u32)
      .flat_map(|t| (0..200).map(move |i| t * 1000 + i))
      .collect();
    expected.sort_unstable();
    assert_eq!(ids, expected);
  }

  #[test]
  fn test_drop_with_entries_joins_workers() {
    let p = pifo(3);
    for rank in 0..50 {
      push(&p, Entry::new(rank, 0, 0));
    }
    drop(p);
  }
}
