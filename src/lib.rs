mod rect;
pub use rect::Rect;

mod detection;
pub use detection::{
    scale_factors, Descriptor, DetectionParams, FaceBackend, FaceDescription, FaceOverlayError,
    FaceOverlayResult, FaceRegion, Landmarks, ModelKind, Point, DESCRIPTOR_LEN, LANDMARK_COUNT,
};

mod nms;
pub use nms::Nms;

#[cfg(feature = "onnx")]
mod imaging;

#[cfg(feature = "onnx")]
mod priorboxes;

#[cfg(feature = "onnx")]
mod ssd;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OrtBackend;

#[cfg(test)]
pub mod testing;

mod model_repository;
pub use model_repository::{
    default_cache_dir, BuildMode, ModelRepository, WeightsLocation, WeightsRepository,
    DEVELOPMENT_WEIGHTS_DIR, PRODUCTION_WEIGHTS_URL,
};

mod pipeline;
pub use pipeline::{
    status_text, DetectionStatus, FacePipeline, DETECTING_STATUS, NOT_FOUND_STATUS,
};

mod builder;
pub use builder::{FacePipelineBuilder, InferParams, Provider};

pub mod viz;

pub mod crop;
pub use crop::{CropRegion, CropUnit};

pub mod object_url;
pub use object_url::{Blob, BlobRegistry, ObjectUrl};

mod app;
pub use app::{AppConfig, AppState, DetectionOutcome, DetectionTicket, DisplaySource, SelectedFile};

use log::LevelFilter;

/// Installs `env_logger`, honouring `RUST_LOG` and falling back to
/// `default_filter` when it is unset. Calling it again is a no-op.
pub fn init_logging(default_filter: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
