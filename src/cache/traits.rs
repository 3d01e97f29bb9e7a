//! Unified cache trait for coordinated invalidation
//!
//! Every cache the analyzer keeps implements this trait so the pipeline's
//! invalidation barrier reaches all of them at once.

/// Common interface for cache layers.
///
/// Layers use interior mutability so they can be shared across rayon
/// workers and still be invalidated from the pipeline thread.
pub trait CacheLayer: Send + Sync {
    /// Name of this cache layer (for logging)
    fn name(&self) -> &str;

    /// Number of cached entries
    fn entry_count(&self) -> usize;

    fn is_populated(&self) -> bool {
        self.entry_count() > 0
    }

    /// Invalidate all cached data
    fn invalidate_all(&self);
}

/// Coordinates invalidation across multiple cache layers
#[derive(Default)]
pub struct CacheCoordinator<'a> {
    layers: Vec<&'a dyn CacheLayer>,
}

impl<'a> CacheCoordinator<'a> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn register(mut self, layer: &'a dyn CacheLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Invalidate all data across all cache layers
    pub fn invalidate_all(&self) {
        for layer in &self.layers {
            let dropped = layer.entry_count();
            layer.invalidate_all();
            tracing::debug!("Dropped {} entries from cache layer: {}", dropped, layer.name());
        }
    }

    pub fn any_populated(&self) -> bool {
        self.layers.iter().any(|l| l.is_populated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl CacheLayer for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn entry_count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }

        fn invalidate_all(&self) {
            self.0.store(0, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_coordinator_invalidates_every_layer() {
        let a = Counter(AtomicUsize::new(3));
        let b = Counter(AtomicUsize::new(0));
        let coordinator = CacheCoordinator::new().register(&a).register(&b);
        assert!(coordinator.any_populated());

        coordinator.invalidate_all();
        assert!(!coordinator.any_populated());
        assert_eq!(a.entry_count(), 0);
    }
}
