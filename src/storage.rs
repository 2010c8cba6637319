use crate::{arena::FreeList, Error, FreeListError, Handle};

/// Keeps packet bytes and metadata while their ranks are queued.
///
/// The scheduler only ever carries the two handles returned by
/// [`store`](PacketStore::store); it never looks at the packet itself.
pub trait PacketStore {
  /// Per-packet metadata kept next to the bytes.
  type Metadata;

  /// The error type.
  type Error;

  /// Stores a packet and returns its payload and metadata handles.
  fn store(&mut self, bytes: &[u8], meta: Self::Metadata) -> Result<(Handle, Handle), Self::Error>;

  /// Takes a packet back out, releasing both handles.
  fn retrieve(
    &mut self,
    payload: Handle,
    meta: Handle,
  ) -> Result<(Vec<u8>, Self::Metadata), Self::Error>;
}

/// A fixed-capacity in-memory [`PacketStore`].
///
/// Payloads and metadata live in separate slabs with their own free lists, so
/// the two handles of a packet are independent.
#[derive(Debug)]
pub struct SlabStore<M> {
  payloads: Vec<Option<Vec<u8>>>,
  metas: Vec<Option<M>>,
  free_payloads: FreeList,
  free_metas: FreeList,
}

impl<M> SlabStore<M> {
  /// Creates a store for `capacity` packets.
  pub fn new(capacity: u32) -> Self {
    Self {
      payloads: (0..capacity).map(|_| None).collect(),
      metas: (0..capacity).map(|_| None).collect(),
      free_payloads: FreeList::new(capacity),
      free_metas: FreeList::new(capacity),
    }
  }

  /// Returns the number of packets held.
  #[inline]
  pub fn len(&self) -> usize {
    self.payloads.len() - self.free_payloads.len()
  }

  /// Returns `true` if no packet is held.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the number of packets the store can hold.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.payloads.len()
  }
}

impl<M> PacketStore for SlabStore<M> {
  type Metadata = M;
  type Error = Error;

  fn store(&mut self, bytes: &[u8], meta: M) -> Result<(Handle, Handle), Error> {
    if self.free_payloads.is_empty() || self.free_metas.is_empty() {
      return Err(Error::FreeList(FreeListError::OutOfCapacity));
    }

    let payload = self.free_payloads.pop()?;
    let m = self.free_metas.pop()?;
    self.payloads[payload as usize] = Some(bytes.to_vec());
    self.metas[m as usize] = Some(meta);
    Ok((payload, m))
  }

  fn retrieve(&mut self, payload: Handle, meta: Handle) -> Result<(Vec<u8>, M), Error> {
    if !self.payloads.get(payload as usize).is_some_and(Option::is_some) {
      return Err(Error::UnknownHandle(payload));
    }
    if !self.metas.get(meta as usize).is_some_and(Option::is_some) {
      return Err(Error::UnknownHandle(meta));
    }

    self.free_payloads.push(payload)?;
    self.free_metas.push(meta)?;
    let bytes = self.payloads[payload as usize]
      .take()
      .ok_or(Error::UnknownHandle(payload))?;
    let metadata = self.metas[meta as usize]
      .take()
      .ok_or(Error::UnknownHandle(meta))?;
    Ok((bytes, metadata))
  }
}
