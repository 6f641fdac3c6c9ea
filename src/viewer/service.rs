//! Render service - manages worker pool, cache and plan generations

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use image::RgbaImage;
use log::{debug, warn};

use super::cache::{CacheKey, RasterCache};
use super::compose::compose;
use super::request::{
    Generation, RasterRequest, RasterResponse, RasterizeError, Rasterizer, RequestId, SlotJob,
};
use super::layout::FALLBACK_PAGE_SIZE;
use super::types::{RenderPlan, Size};
use super::worker::raster_worker;
use super::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS};

/// Progress of one slot of the current plan
#[derive(Clone, Debug)]
pub enum SlotStatus {
    Pending,
    Ready(Arc<RgbaImage>),
    Failed(RasterizeError),
}

/// Change to the current plan reported by [`RenderService::poll`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotEvent {
    Ready { slot: usize, page: usize },
    Failed { slot: usize, page: usize, error: RasterizeError },
}

/// Rasterizes render plans on worker threads.
///
/// Each submitted plan gets a new [`Generation`]; responses tagged with an
/// older generation are dropped, so the latest navigation always wins. A
/// slot never has more than one request in flight: a newer job for a busy
/// slot waits until the older one returns.
pub struct RenderService {
    request_tx: Sender<RasterRequest>,
    response_rx: Receiver<RasterResponse>,
    cache: Arc<Mutex<RasterCache>>,
    num_workers: usize,
    next_request_id: u64,
    generation: Generation,
    plan: RenderPlan,
    slots: Vec<SlotStatus>,
    in_flight: HashMap<usize, RequestId>,
    queued: HashMap<usize, SlotJob>,
    // Events collected by `wait`, handed out by the next `poll`
    pending_events: Vec<SlotEvent>,
}

impl RenderService {
    /// Create a new render service with default configuration
    #[must_use]
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self::with_config(rasterizer, DEFAULT_WORKERS, DEFAULT_CACHE_SIZE)
    }

    /// Create a new render service with custom configuration
    #[must_use]
    pub fn with_config(
        rasterizer: Arc<dyn Rasterizer>,
        num_workers: usize,
        cache_size: usize,
    ) -> Self {
        let cache = Arc::new(Mutex::new(RasterCache::new(cache_size)));

        // Workers share one request queue, so the receiver must be cloneable
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        for _ in 0..num_workers.max(1) {
            let rasterizer = Arc::clone(&rasterizer);
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            let cache = Arc::clone(&cache);

            std::thread::spawn(move || {
                raster_worker(rasterizer, rx, tx, cache);
            });
        }

        Self {
            request_tx,
            response_rx,
            cache,
            num_workers: num_workers.max(1),
            next_request_id: 1,
            generation: Generation::default(),
            plan: RenderPlan::default(),
            slots: Vec::new(),
            in_flight: HashMap::new(),
            queued: HashMap::new(),
            pending_events: Vec::new(),
        }
    }

    /// Start rasterizing `plan`, superseding whatever was submitted before.
    ///
    /// `page_size` returns the sizes the plan was resolved with; pages
    /// without a known size are taken to be [`FALLBACK_PAGE_SIZE`], the same
    /// as the layout does.
    pub fn submit<F>(&mut self, plan: &RenderPlan, page_size: F) -> Generation
    where
        F: Fn(usize) -> Option<Size>,
    {
        self.generation = self.generation.next();
        self.plan = plan.clone();
        self.slots = vec![SlotStatus::Pending; plan.slots.len()];
        self.queued.clear();
        self.pending_events.clear();

        for (index, slot) in plan.slots.iter().enumerate() {
            let size = page_size(slot.page_index)
                .filter(|size| size.is_drawable())
                .unwrap_or(FALLBACK_PAGE_SIZE);
            let crop = slot.raster_crop(size);
            let job = SlotJob {
                page: slot.page_index,
                crop,
                target: slot.target_pixels(),
            };

            let cached = self
                .cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .get(&CacheKey::from_job(&job));
            if let Some(image) = cached {
                self.slots[index] = SlotStatus::Ready(image);
            } else if self.in_flight.contains_key(&index) {
                self.queued.insert(index, job);
            } else {
                self.dispatch(index, job);
            }
        }

        debug!(
            "Submitted plan {:?} for pages {:?}",
            self.generation,
            plan.pages().collect::<Vec<_>>()
        );
        self.generation
    }

    /// Collect finished work without blocking, including events already
    /// consumed by [`RenderService::wait`]
    pub fn poll(&mut self) -> Vec<SlotEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        while let Ok(response) = self.response_rx.try_recv() {
            events.extend(self.handle_response(response));
        }
        events
    }

    /// Block until every slot of the current plan resolved or `timeout`
    /// passed. Returns whether the plan is complete.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_complete() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if let Some(event) = self.handle_response(response) {
                        self.pending_events.push(event);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        self.is_complete()
    }

    fn handle_response(&mut self, response: RasterResponse) -> Option<SlotEvent> {
        let slot = response.slot();
        if self.in_flight.get(&slot) == Some(&response.id()) {
            self.in_flight.remove(&slot);
            if let Some(job) = self.queued.remove(&slot) {
                self.dispatch(slot, job);
            }
        }

        if response.generation() != self.generation {
            debug!(
                "Discarding stale raster for slot {slot} from {:?}",
                response.generation()
            );
            return None;
        }

        let page = self.plan.slots.get(slot)?.page_index;
        match response {
            RasterResponse::Slot { image, .. } => {
                self.slots[slot] = SlotStatus::Ready(image);
                Some(SlotEvent::Ready { slot, page })
            }
            RasterResponse::Error { error, .. } => {
                warn!("Slot {slot} (page {page}) failed: {error}");
                self.slots[slot] = SlotStatus::Failed(error.clone());
                Some(SlotEvent::Failed { slot, page, error })
            }
        }
    }

    fn dispatch(&mut self, slot: usize, job: SlotJob) {
        let id = self.next_id();
        let request = RasterRequest::Slot {
            id,
            generation: self.generation,
            slot,
            job,
        };
        if self.request_tx.send(request).is_err() {
            warn!("Raster workers are gone, slot {slot} will stay pending");
            return;
        }
        self.in_flight.insert(slot, id);
    }

    /// Generation of the plan currently being served
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    #[must_use]
    pub fn slots(&self) -> &[SlotStatus] {
        &self.slots
    }

    /// True once no slot of the current plan is pending
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self
            .slots
            .iter()
            .any(|status| matches!(status, SlotStatus::Pending))
    }

    /// Number of slots with a request on a worker
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Compose the current plan; pending and failed slots show placeholders
    #[must_use]
    pub fn composite(&self, night_mode: bool) -> Option<RgbaImage> {
        let rasters: Vec<Option<Arc<RgbaImage>>> = self
            .slots
            .iter()
            .map(|status| match status {
                SlotStatus::Ready(image) => Some(Arc::clone(image)),
                SlotStatus::Pending | SlotStatus::Failed(_) => None,
            })
            .collect();
        compose(&self.plan, &rasters, night_mode)
    }

    /// Drop cached rasters, e.g. after the document changed on disk
    pub fn invalidate_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .invalidate_all();
    }

    /// Drop cached rasters of one page so the next plan showing it re-renders
    pub fn invalidate_page(&self, page: usize) {
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .invalidate_page(page);
    }

    /// Shutdown all workers
    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RasterRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
