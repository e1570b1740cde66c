//! Collection configuration.

/// Default prefix for generated document ids.
pub const DEFAULT_ID_PREFIX: &str = "document";

/// Configuration for a [`crate::Collection`] and the indexes it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of concurrent row fetches per query.
    ///
    /// `None` spawns one fetch per candidate id. `Some(0)` behaves as
    /// `Some(1)`.
    pub hydrate_concurrency: Option<usize>,

    /// Prefix of generated document ids (`<prefix>_<uuid>`).
    pub id_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hydrate_concurrency: None,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds concurrent row fetches per query. Zero is treated as one.
    #[must_use]
    pub fn hydrate_concurrency(mut self, limit: usize) -> Self {
        self.hydrate_concurrency = Some(limit.max(1));
        self
    }

    /// Removes the bound on concurrent row fetches.
    #[must_use]
    pub fn unbounded_hydration(mut self) -> Self {
        self.hydrate_concurrency = None;
        self
    }

    /// Sets the prefix of generated document ids.
    #[must_use]
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }
}
