use pifo::{Entry, Rank};
use rand::Rng;

/// Only used for testing
pub fn entry(rank: Rank, id: u32) -> Entry {
  Entry::new(rank, id, !id)
}

/// Only used for testing
pub fn random_entry<R: Rng + ?Sized>(rng: &mut R, id: u32, max_rank: Rank) -> Entry {
  entry(rng.random_range(0..max_rank), id)
}

/// Only used for testing
pub fn assert_handles(e: &Entry) {
  assert_eq!(e.meta, !e.payload, "handles of {e:?} were mixed up");
}
