//! LRU cache for built text layers

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::geometry::Viewport;
use super::text_layer::TextRun;

/// Cache key for text layers
///
/// Bounding boxes depend on zoom and rotation, so both are part of the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayerKey {
    /// Page number (0-indexed)
    pub page: usize,
    /// Scale factor (stored as millionths for stable hashing)
    pub scale_millionths: u64,
    pub rotation: u16,
}

impl LayerKey {
    #[must_use]
    pub fn from_viewport(page: usize, viewport: &Viewport) -> Self {
        Self {
            page,
            scale_millionths: (viewport.scale * 1_000_000.0).round() as u64,
            rotation: viewport.rotation,
        }
    }
}

struct CachedLayer {
    runs: Arc<[TextRun]>,
    /// Glyph runs the layer was built from
    source_runs: usize,
}

/// LRU cache of text layers
pub struct TextLayerCache {
    cache: LruCache<LayerKey, CachedLayer>,
}

impl TextLayerCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached layer built from `source_runs` glyph runs, promoting it
    /// in the LRU order. A layer built from a different run count is stale.
    #[must_use]
    pub fn get(&mut self, key: &LayerKey, source_runs: usize) -> Option<Arc<[TextRun]>> {
        self.cache
            .get(key)
            .filter(|layer| layer.source_runs == source_runs)
            .map(|layer| layer.runs.clone())
    }

    #[must_use]
    pub fn contains(&self, key: &LayerKey) -> bool {
        self.cache.contains(key)
    }

    pub fn insert(
        &mut self,
        key: LayerKey,
        runs: Vec<TextRun>,
        source_runs: usize,
    ) -> Arc<[TextRun]> {
        let runs: Arc<[TextRun]> = runs.into();
        self.cache.put(
            key,
            CachedLayer {
                runs: runs.clone(),
                source_runs,
            },
        );
        runs
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Invalidate every zoom level cached for a page
    pub fn invalidate_page(&mut self, page: usize) {
        let keys_to_remove: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys_to_remove {
            self.cache.pop(&key);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::text_layer::BoundingBox;

    fn layer(text: &str) -> Vec<TextRun> {
        vec![TextRun {
            text: text.to_string(),
            bounding_box: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            run_index: 0,
        }]
    }

    #[test]
    fn zoom_levels_are_distinct_keys() {
        let mut cache = TextLayerCache::new(4);
        let at_one = LayerKey::from_viewport(2, &Viewport::new(612.0, 792.0, 1.0, 0));
        let at_two = LayerKey::from_viewport(2, &Viewport::new(612.0, 792.0, 2.0, 0));

        cache.insert(at_one.clone(), layer("one"), 1);
        assert!(cache.contains(&at_one));
        assert!(!cache.contains(&at_two));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = TextLayerCache::new(2);
        let viewport = Viewport::new(612.0, 792.0, 1.0, 0);
        let k0 = LayerKey::from_viewport(0, &viewport);
        let k1 = LayerKey::from_viewport(1, &viewport);
        let k2 = LayerKey::from_viewport(2, &viewport);

        cache.insert(k0.clone(), layer("a"), 1);
        cache.insert(k1.clone(), layer("b"), 1);
        let _ = cache.get(&k0, 1);
        cache.insert(k2.clone(), layer("c"), 1);

        assert!(cache.contains(&k0));
        assert!(!cache.contains(&k1));
        assert!(cache.contains(&k2));
    }

    #[test]
    fn invalidate_page_removes_all_zoom_levels() {
        let mut cache = TextLayerCache::new(8);
        for scale in [1.0, 1.5, 2.0] {
            let key = LayerKey::from_viewport(3, &Viewport::new(612.0, 792.0, scale, 0));
            cache.insert(key, layer("x"), 1);
        }
        let other = LayerKey::from_viewport(4, &Viewport::new(612.0, 792.0, 1.0, 0));
        cache.insert(other.clone(), layer("y"), 1);

        cache.invalidate_page(3);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&other));

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_falls_back_to_one() {
        let mut cache = TextLayerCache::new(0);
        let key = LayerKey::from_viewport(0, &Viewport::new(612.0, 792.0, 1.0, 0));
        cache.insert(key.clone(), layer("a"), 1);
        assert!(cache.get(&key, 1).is_some());
    }

    #[test]
    fn different_source_count_misses() {
        let mut cache = TextLayerCache::new(2);
        let key = LayerKey::from_viewport(0, &Viewport::new(612.0, 792.0, 1.0, 0));
        cache.insert(key.clone(), layer("a"), 3);

        assert!(cache.get(&key, 3).is_some());
        assert!(cache.get(&key, 5).is_none());
    }
}
