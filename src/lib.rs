pub mod engine;
pub mod progress;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::{ReaderEngine, Snapshot};
pub use progress::{JsonProgressStore, MemoryProgressStore, ReadingProgress, ReadingProgressStore};
pub use settings::Settings;
