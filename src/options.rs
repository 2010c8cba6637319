use crate::ConfigError;

/// How the skiplist body decides which nodes get copies on higher levels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum Leveling {
  /// Top-down 1-2-3 skiplist: whenever a search is about to drop into a run of
  /// [`MAX_CONS_NODES`](crate::MAX_CONS_NODES) nodes without a tower, the middle
  /// one is promoted. Bounded height, no randomness.
  #[default]
  Deterministic,
  /// Classic skiplist: every insertion draws a random tower height.
  Probabilistic,
}

/// Construction parameters for [`Shard`](crate::Shard),
/// [`unsync::Pifo`](crate::unsync::Pifo) and [`sync::Pifo`](crate::sync::Pifo).
#[viewit::viewit(vis_all = "pub(super)", getters(skip), setters(skip))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Options {
  capacity: u32,
  shards: usize,
  register_width: usize,
  staging_depth: usize,
  insert_threshold: usize,
  leveling: Leveling,
  seed: Option<u64>,
  pipe_depth: usize,
}

impl Default for Options {
  #[inline]
  fn default() -> Options {
    Options::new()
  }
}

impl Options {
  /// Creates a new set of options with the default values.
  #[inline]
  pub const fn new() -> Self {
    Self {
      capacity: 128,
      shards: 1,
      register_width: 4,
      staging_depth: 12,
      insert_threshold: 1,
      leveling: Leveling::Deterministic,
      seed: None,
      pipe_depth: 16,
    }
  }

  /// Set the number of entries each shard can hold. Must be a power of two,
  /// the skiplist body grows to `log2(capacity) + 1` levels.
  ///
  /// The default capacity is `128`.
  ///
  /// ## Example
  ///
  /// ```
  /// use pifo::Options;
  ///
  /// let opts = Options::new().with_capacity(1024);
  /// ```
  #[inline]
  pub const fn with_capacity(mut self, capacity: u32) -> Self {
    self.capacity = capacity;
    self
  }

  /// Set the number of skiplist shards the wrapper spreads entries across.
  ///
  /// The default is `1`.
  ///
  /// ## Example
  ///
  /// ```
  /// use pifo::Options;
  ///
  /// let opts = Options::new().with_shards(4);
  /// ```
  #[inline]
  pub const fn with_shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  /// Set the width of each shard's output register, i.e. how many of the
  /// smallest entries are kept out of the skiplist body.
  ///
  /// The default is `4`.
  #[inline]
  pub const fn with_register_width(mut self, width: usize) -> Self {
    self.register_width = width;
    self
  }

  /// Set the depth of the staging FIFO that buffers entries on their way
  /// into the skiplist body. When the register and this FIFO are both full,
  /// enqueue pushes back with [`AdmissionError::Full`](crate::AdmissionError::Full).
  ///
  /// The default is `12`.
  #[inline]
  pub const fn with_staging_depth(mut self, depth: usize) -> Self {
    self.staging_depth = depth;
    self
  }

  /// Set how many entries must be staged before the background mover starts
  /// inserting them into the skiplist body.
  ///
  /// The default is `1`, values of `0` are treated as `1`.
  #[inline]
  pub const fn with_insert_threshold(mut self, threshold: usize) -> Self {
    self.insert_threshold = threshold;
    self
  }

  /// Set the [`Leveling`] of the skiplist bodies.
  ///
  /// The default is [`Leveling::Deterministic`].
  ///
  /// ## Example
  ///
  /// ```
  /// use pifo::{Leveling, Options};
  ///
  /// let opts = Options::new().with_leveling(Leveling::Probabilistic).with_seed(Some(7));
  /// ```
  #[inline]
  pub const fn with_leveling(mut self, leveling: Leveling) -> Self {
    self.leveling = leveling;
    self
  }

  /// Seed the height generator of the probabilistic leveling. Shard `i` uses
  /// `seed + i`. With `None` the generator is seeded from the OS.
  ///
  /// The default is `None`.
  #[inline]
  pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
    self.seed = seed;
    self
  }

  /// Set the depth of the request pipe of each shard worker in
  /// [`sync::Pifo`](crate::sync::Pifo).
  ///
  /// The default is `16`.
  #[inline]
  pub const fn with_pipe_depth(mut self, depth: usize) -> Self {
    self.pipe_depth = depth;
    self
  }

  /// Returns the number of entries each shard can hold.
  #[inline]
  pub const fn capacity(&self) -> u32 {
    self.capacity
  }

  /// Returns the number of shards.
  #[inline]
  pub const fn shards(&self) -> usize {
    self.shards
  }

  /// Returns the output register width.
  #[inline]
  pub const fn register_width(&self) -> usize {
    self.register_width
  }

  /// Returns the staging FIFO depth.
  #[inline]
  pub const fn staging_depth(&self) -> usize {
    self.staging_depth
  }

  /// Returns the number of staged entries that triggers a body insertion.
  #[inline]
  pub const fn insert_threshold(&self) -> usize {
    if self.insert_threshold == 0 {
      1
    } else {
      self.insert_threshold
    }
  }

  /// Returns the leveling of the skiplist bodies.
  #[inline]
  pub const fn leveling(&self) -> Leveling {
    self.leveling
  }

  /// Returns the seed of the probabilistic leveling.
  #[inline]
  pub const fn seed(&self) -> Option<u64> {
    self.seed
  }

  /// Returns the request pipe depth.
  #[inline]
  pub const fn pipe_depth(&self) -> usize {
    self.pipe_depth
  }

  /// Returns the number of levels a skiplist body with these options has.
  #[inline]
  pub const fn levels(&self) -> u8 {
    self.capacity.trailing_zeros() as u8 + 1
  }

  /// Checks that the options describe a buildable queue.
  ///
  /// ## Example
  ///
  /// ```
  /// use pifo::{ConfigError, Options};
  ///
  /// assert!(Options::new().validate().is_ok());
  /// assert_eq!(
  ///   Options::new().with_capacity(100).validate(),
  ///   Err(ConfigError::CapacityNotPowerOfTwo(100)),
  /// );
  /// ```
  pub const fn validate(&self) -> Result<(), ConfigError> {
    if !self.capacity.is_power_of_two() {
      return Err(ConfigError::CapacityNotPowerOfTwo(self.capacity));
    }
    if self.shards == 0 {
      return Err(ConfigError::ZeroShards);
    }
    if self.register_width == 0 {
      return Err(ConfigError::ZeroRegisterWidth);
    }
    if self.staging_depth == 0 {
      return Err(ConfigError::ZeroStagingDepth);
    }
    if self.pipe_depth == 0 {
      return Err(ConfigError::ZeroPipeDepth);
    }
    Ok(())
  }
}
