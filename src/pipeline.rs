use image::RgbImage;
use log::{debug, info};

use crate::{
    detection::{FaceBackend, FaceDescription, FaceOverlayResult, ModelKind},
    model_repository::ModelRepository,
};

/// Status shown while the combined detection call runs.
pub const DETECTING_STATUS: &str = "Detection";

/// Status shown when detection finds no face.
pub const NOT_FOUND_STATUS: &str = "Face not found";

/// Human-readable pipeline phase. Overwritten at every transition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionStatus(String);

impl DetectionStatus {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final status of a successful run. See [`status_text`].
    pub fn from_results(faces: &[FaceDescription]) -> Self {
        Self(status_text(faces))
    }

    /// Terminal status of a failed run.
    pub fn failed(error: &impl std::fmt::Display) -> Self {
        Self(format!("Detection failed: {error}"))
    }
}

/// `"Face not found"` when `faces` is empty, otherwise one
/// `" Detection {i} score: {score}"` annotation per face, in order.
pub fn status_text(faces: &[FaceDescription]) -> String {
    if faces.is_empty() {
        return NOT_FOUND_STATUS.to_string();
    }
    faces
        .iter()
        .enumerate()
        .map(|(i, face)| format!(" Detection {i} score: {}", face.detection.score))
        .collect()
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loads the three model stages and runs the combined detection.
pub struct FacePipeline {
    repository: Box<dyn ModelRepository>,
    backend: Box<dyn FaceBackend>,
}

impl FacePipeline {
    pub fn new(repository: Box<dyn ModelRepository>, backend: Box<dyn FaceBackend>) -> Self {
        Self {
            repository,
            backend,
        }
    }

    pub fn backend(&self) -> &dyn FaceBackend {
        self.backend.as_ref()
    }

    /// Makes every stage resident, detector first.
    ///
    /// `on_status` is called once per stage before it starts, even when the
    /// stage is already loaded and nothing has to be fetched.
    pub fn load_models(
        &mut self,
        mut on_status: impl FnMut(DetectionStatus),
    ) -> FaceOverlayResult<()> {
        for kind in ModelKind::LOAD_ORDER {
            on_status(DetectionStatus::new(kind.loading_status()));
            if self.backend.is_loaded(kind) {
                debug!("{kind} already loaded");
                continue;
            }
            let path = self.repository.get_model(kind)?;
            info!("Loading {kind} from {}", path.display());
            self.backend.load_model(kind, &path)?;
        }
        Ok(())
    }

    /// Loads models as needed, then detects all faces with landmarks and descriptors.
    ///
    /// Returns an empty list when no face is found. Any load or inference
    /// failure is returned to the caller; `on_status` has then seen only the
    /// phases reached before the failure.
    pub fn detect_faces(
        &mut self,
        image: &RgbImage,
        mut on_status: impl FnMut(DetectionStatus),
    ) -> FaceOverlayResult<Vec<FaceDescription>> {
        self.load_models(&mut on_status)?;
        on_status(DetectionStatus::new(DETECTING_STATUS));
        let faces = self.backend.detect_all_faces(image)?;
        info!(
            "Detected {} face(s) in {}x{} image",
            faces.len(),
            image.width(),
            image.height()
        );
        Ok(faces)
    }
}
