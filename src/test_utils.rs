pub mod test_helpers {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use image::{Rgba, RgbaImage};

    use crate::viewer::{RasterizeError, Rasterizer, Rect, Size};

    /// Letter-ish page used when no sizes are given
    pub const DEFAULT_PAGE: Size = Size::new(600.0, 800.0);

    /// Solid fill the fake rasterizer uses for `page`
    pub fn page_color(page: usize) -> Rgba<u8> {
        Rgba([(page * 40 % 256) as u8, 80, 160, 255])
    }

    /// Rasterizer that paints each page a solid color.
    ///
    /// Can be told to fail selected pages or to take a while. Records calls
    /// and requested crops so tests can check cache hits and concurrency.
    pub struct FakeRasterizer {
        sizes: Vec<Size>,
        fail_pages: HashSet<usize>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        size_queries: AtomicUsize,
        crops: Mutex<Vec<(usize, Option<Rect>)>>,
    }

    impl FakeRasterizer {
        pub fn new(page_count: usize) -> Self {
            Self::with_sizes(vec![DEFAULT_PAGE; page_count])
        }

        pub fn with_sizes(sizes: Vec<Size>) -> Self {
            Self {
                sizes,
                fail_pages: HashSet::new(),
                delay: None,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                size_queries: AtomicUsize::new(0),
                crops: Mutex::new(Vec::new()),
            }
        }

        /// Rasterizing `page` reports a corrupt page
        pub fn failing(mut self, page: usize) -> Self {
            self.fail_pages.insert(page);
            self
        }

        /// Every rasterization sleeps for `delay` first
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of rasterize calls so far
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Highest number of rasterize calls that overlapped
        pub fn max_concurrent(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }

        /// Number of `page_size` calls so far
        pub fn size_queries(&self) -> usize {
            self.size_queries.load(Ordering::SeqCst)
        }

        /// Page and crop of every rasterize call, in call order
        pub fn crops(&self) -> Vec<(usize, Option<Rect>)> {
            self.crops
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    impl Rasterizer for FakeRasterizer {
        fn page_size(&self, page: usize) -> Result<Size, RasterizeError> {
            self.size_queries.fetch_add(1, Ordering::SeqCst);
            self.sizes
                .get(page)
                .copied()
                .ok_or(RasterizeError::NotFound { page })
        }

        fn rasterize(
            &self,
            page: usize,
            crop: Option<Rect>,
            target: (u32, u32),
        ) -> Result<RgbaImage, RasterizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.crops
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((page, crop));
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }

            let result = if page >= self.sizes.len() {
                Err(RasterizeError::NotFound { page })
            } else if self.fail_pages.contains(&page) {
                Err(RasterizeError::corrupt(page, "broken xref table"))
            } else {
                Ok(RgbaImage::from_pixel(target.0, target.1, page_color(page)))
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::viewer::Rasterizer;

    #[test]
    fn fake_rasterizer_paints_and_fails() {
        let rasterizer = FakeRasterizer::new(2).failing(1);

        let image = rasterizer.rasterize(0, None, (3, 2)).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1), &page_color(0));

        assert!(rasterizer.rasterize(1, None, (3, 2)).is_err());
        assert!(rasterizer.page_size(5).is_err());
        assert_eq!(rasterizer.calls(), 2);
        assert_eq!(rasterizer.size_queries(), 1);
        assert_eq!(rasterizer.crops(), vec![(0, None), (1, None)]);
    }
}
