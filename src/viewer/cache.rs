//! LRU cache for rasterized page slots

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;

use super::request::SlotJob;

/// Cache key for slot rasters
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number
    pub page: usize,
    /// Crop rectangle in thousandths of a content unit, `None` for the full page
    pub crop_millis: Option<[i64; 4]>,
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
}

impl CacheKey {
    /// Create a cache key from a slot job
    #[must_use]
    pub fn from_job(job: &SlotJob) -> Self {
        let millis = |v: f32| (f64::from(v) * 1000.0).round() as i64;
        Self {
            page: job.page,
            crop_millis: job
                .crop
                .map(|c| [millis(c.x), millis(c.y), millis(c.width), millis(c.height)]),
            width: job.target.0,
            height: job.target.1,
        }
    }
}

/// LRU cache of source rasters. Entries are never recolored in place.
pub struct RasterCache {
    cache: LruCache<CacheKey, Arc<RgbaImage>>,
}

impl RasterCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached raster, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<RgbaImage>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a raster, returning the shared handle
    pub fn insert(&mut self, key: CacheKey, image: RgbaImage) -> Arc<RgbaImage> {
        let arc = Arc::new(image);
        self.cache.put(key, Arc::clone(&arc));
        arc
    }

    /// Clear all cached rasters
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Drop every cached raster of one page
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

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::types::Rect;

    fn job(page: usize, crop: Option<Rect>) -> SlotJob {
        SlotJob {
            page,
            crop,
            target: (10, 20),
        }
    }

    fn raster() -> RgbaImage {
        RgbaImage::new(10, 20)
    }

    #[test]
    fn cache_insert_and_get() {
        let mut cache = RasterCache::new(10);
        let key = CacheKey::from_job(&job(0, None));
        cache.insert(key.clone(), raster());

        assert!(cache.contains(&key));
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn halves_of_one_page_are_distinct_entries() {
        let left = CacheKey::from_job(&job(3, Some(Rect::new(0.0, 0.0, 300.0, 800.0))));
        let right = CacheKey::from_job(&job(3, Some(Rect::new(300.0, 0.0, 300.0, 800.0))));
        assert_ne!(left, right);
    }

    #[test]
    fn cache_lru_eviction() {
        let mut cache = RasterCache::new(2);
        for i in 0..3 {
            cache.insert(CacheKey::from_job(&job(i, None)), raster());
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&CacheKey::from_job(&job(0, None))));
        assert!(cache.contains(&CacheKey::from_job(&job(2, None))));
    }

    #[test]
    fn cache_invalidate_page() {
        let mut cache = RasterCache::new(10);
        cache.insert(CacheKey::from_job(&job(0, None)), raster());
        cache.insert(
            CacheKey::from_job(&job(0, Some(Rect::new(0.0, 0.0, 5.0, 5.0)))),
            raster(),
        );
        let other = CacheKey::from_job(&job(1, None));
        cache.insert(other.clone(), raster());

        cache.invalidate_page(0);

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&other));

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        assert_eq!(RasterCache::new(0).capacity(), 1);
    }
}
