//! Raster worker - runs in separate thread(s)

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use log::{debug, warn};

use super::cache::{CacheKey, RasterCache};
use super::request::{
    Generation, RasterRequest, RasterResponse, RasterizeError, Rasterizer, RequestId, SlotJob,
};

/// Pull requests until shutdown or until the service goes away
pub fn raster_worker(
    rasterizer: Arc<dyn Rasterizer>,
    requests: Receiver<RasterRequest>,
    responses: Sender<RasterResponse>,
    cache: Arc<Mutex<RasterCache>>,
) {
    for request in requests {
        match request {
            RasterRequest::Slot {
                id,
                generation,
                slot,
                job,
            } => {
                let response = handle_slot(rasterizer.as_ref(), id, generation, slot, &job, &cache);
                if responses.send(response).is_err() {
                    break;
                }
            }

            RasterRequest::Shutdown => break,
        }
    }
    debug!("Raster worker exiting");
}

fn handle_slot(
    rasterizer: &dyn Rasterizer,
    id: RequestId,
    generation: Generation,
    slot: usize,
    job: &SlotJob,
    cache: &Arc<Mutex<RasterCache>>,
) -> RasterResponse {
    let key = CacheKey::from_job(job);

    let cached = cache
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .get(&key);
    if let Some(image) = cached {
        return RasterResponse::Slot {
            id,
            generation,
            slot,
            image,
        };
    }

    match rasterize_checked(rasterizer, job) {
        Ok(image) => {
            let image = cache
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .insert(key, image);
            RasterResponse::Slot {
                id,
                generation,
                slot,
                image,
            }
        }
        Err(error) => {
            warn!("Rasterizing page {} failed: {error}", job.page);
            RasterResponse::Error {
                id,
                generation,
                slot,
                error,
            }
        }
    }
}

/// Rasterize, resampling output that does not match the requested size
fn rasterize_checked(
    rasterizer: &dyn Rasterizer,
    job: &SlotJob,
) -> Result<RgbaImage, RasterizeError> {
    let image = rasterizer.rasterize(job.page, job.crop, job.target)?;
    if image.dimensions() == job.target {
        return Ok(image);
    }
    debug!(
        "Page {} came back {:?}, resampling to {:?}",
        job.page,
        image.dimensions(),
        job.target
    );
    let (width, height) = job.target;
    Ok(imageops::resize(&image, width, height, FilterType::Triangle))
}
