//! Page navigation, layout and view-transform engine

mod cache;
mod color;
mod compose;
mod layout;
mod navigation;
mod request;
mod service;
mod types;
mod worker;
mod zoom;

pub use cache::{CacheKey, RasterCache};
pub use color::{invert, invert_in_place};
pub use compose::{BACKGROUND, PLACEHOLDER, compose};
pub use layout::{FALLBACK_PAGE_SIZE, SPREAD_FILL, resolve};
pub use navigation::{Command, Effect, Notification, ViewerState, spread_anchor};
pub use request::{
    Generation, RasterRequest, RasterResponse, RasterizeError, Rasterizer, RequestId, SlotJob,
};
pub use service::{RenderService, SlotEvent, SlotStatus};
pub use types::*;
pub use zoom::{
    InteractionMode, ScaleLimits, TapAction, Transform, TransformController, clamp,
};

/// Default number of raster worker threads
pub const DEFAULT_WORKERS: usize = 2;

/// Default number of slot rasters kept in the LRU cache
pub const DEFAULT_CACHE_SIZE: usize = 16;
