use super::correspondence::SearchStrategy;

/// Settings shared by the mirroring operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorParams {
    /// Nearest-point search used for mirrored correspondences (default: brute force).
    pub search: SearchStrategy,
}

impl MirrorParams {
    /// Creates parameters with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nearest-point search strategy.
    #[must_use]
    pub const fn with_search(mut self, search: SearchStrategy) -> Self {
        self.search = search;
        self
    }
}
