//! Rasterization request and response types

use std::sync::Arc;

use image::RgbaImage;

use super::types::{Rect, Size};

/// Unique identifier for raster requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Plan generation a request belongs to. Bumped on every submitted plan,
/// so a response from an older generation is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Errors from the page rasterizer
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RasterizeError {
    #[error("page {page} not found")]
    NotFound { page: usize },

    #[error("page {page} is corrupt: {detail}")]
    Corrupt { page: usize, detail: String },

    #[error("out of memory rendering page {page}")]
    OutOfMemory { page: usize },
}

impl RasterizeError {
    pub fn corrupt(page: usize, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            page,
            detail: detail.into(),
        }
    }
}

/// Converts document pages into raster images.
///
/// Implementations wrap a real document backend; the engine only needs page
/// dimensions and cropped renders at a target pixel size.
pub trait Rasterizer: Send + Sync {
    /// Natural page size in content units
    fn page_size(&self, page: usize) -> Result<Size, RasterizeError>;

    /// Render `crop` of `page` (whole page when `None`) into `target` pixels
    fn rasterize(
        &self,
        page: usize,
        crop: Option<Rect>,
        target: (u32, u32),
    ) -> Result<RgbaImage, RasterizeError>;
}

/// Work item for one page slot
#[derive(Clone, Debug)]
pub struct SlotJob {
    pub page: usize,
    pub crop: Option<Rect>,
    pub target: (u32, u32),
}

/// Request sent to raster workers
#[derive(Debug)]
pub enum RasterRequest {
    /// Rasterize one slot of the plan identified by `generation`
    Slot {
        id: RequestId,
        generation: Generation,
        slot: usize,
        job: SlotJob,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Response from raster workers
#[derive(Debug)]
pub enum RasterResponse {
    /// Rendered slot raster
    Slot {
        id: RequestId,
        generation: Generation,
        slot: usize,
        image: Arc<RgbaImage>,
    },

    /// Rasterizer failed for this slot
    Error {
        id: RequestId,
        generation: Generation,
        slot: usize,
        error: RasterizeError,
    },
}

impl RasterResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            RasterResponse::Slot { id, .. } | RasterResponse::Error { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        match self {
            RasterResponse::Slot { generation, .. } | RasterResponse::Error { generation, .. } => {
                *generation
            }
        }
    }

    #[must_use]
    pub fn slot(&self) -> usize {
        match self {
            RasterResponse::Slot { slot, .. } | RasterResponse::Error { slot, .. } => *slot,
        }
    }
}
