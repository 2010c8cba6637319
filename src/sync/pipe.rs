use crossbeam_channel::{Receiver, RecvError, SendError, Sender, TryRecvError, TrySendError};

/// Why a pipe operation did not go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeError {
  /// The pipe holds `depth` items.
  Full,
  /// The pipe holds nothing.
  Empty,
  /// The other end is gone.
  Disconnected,
}

impl core::fmt::Display for PipeError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Self::Full => write!(f, "pipe is full"),
      Self::Empty => write!(f, "pipe is empty"),
      Self::Disconnected => write!(f, "pipe is disconnected"),
    }
  }
}

impl std::error::Error for PipeError {}

/// Creates a pipe that holds at most `depth` items in flight.
pub fn bounded<T>(depth: usize) -> (Producer<T>, Consumer<T>) {
  let (tx, rx) = crossbeam_channel::bounded(depth);
  (Producer { tx }, Consumer { rx })
}

/// The sending end of a pipe.
#[derive(Debug)]
pub struct Producer<T> {
  tx: Sender<T>,
}

impl<T> Clone for Producer<T> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}

impl<T> Producer<T> {
  /// Pushes without waiting. On failure the item is handed back.
  #[inline]
  pub fn try_push(&self, item: T) -> Result<(), (PipeError, T)> {
    self.tx.try_send(item).map_err(|e| match e {
      TrySendError::Full(item) => (PipeError::Full, item),
      TrySendError::Disconnected(item) => (PipeError::Disconnected, item),
    })
  }

  /// Pushes, waiting for room.
  #[inline]
  pub fn push(&self, item: T) -> Result<(), (PipeError, T)> {
    self
      .tx
      .send(item)
      .map_err(|SendError(item)| (PipeError::Disconnected, item))
  }

  /// Returns the number of items in flight.
  #[inline]
  pub fn len(&self) -> usize {
    self.tx.len()
  }

  /// Returns `true` if nothing is in flight.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.tx.is_empty()
  }

  /// Returns `true` if a [`try_push`](Self::try_push) would fail with
  /// [`PipeError::Full`].
  #[inline]
  pub fn is_full(&self) -> bool {
    self.tx.is_full()
  }
}

/// The receiving end of a pipe.
#[derive(Debug)]
pub struct Consumer<T> {
  rx: Receiver<T>,
}

impl<T> Consumer<T> {
  /// Pops without waiting.
  #[inline]
  pub fn try_pop(&self) -> Result<T, PipeError> {
    self.rx.try_recv().map_err(|e| match e {
      TryRecvError::Empty => PipeError::Empty,
      TryRecvError::Disconnected => PipeError::Disconnected,
    })
  }

  /// Pops, waiting for an item. Fails once the pipe is empty and every
  /// producer is gone.
  #[inline]
  pub fn pop(&self) -> Result<T, PipeError> {
    self.rx.recv().map_err(|RecvError| PipeError::Disconnected)
  }

  /// Returns the number of items in flight.
  #[inline]
  pub fn len(&self) -> usize {
    self.rx.len()
  }

  /// Returns `true` if nothing is in flight.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.rx.is_empty()
  }
}
