use std::path::PathBuf;

use crate::{
    detection::{DetectionParams, FaceBackend, FaceOverlayResult},
    model_repository::{default_cache_dir, BuildMode, WeightsLocation, WeightsRepository},
    pipeline::FacePipeline,
    Nms,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    /// Uses the, default, CPU inference
    OrtCpu,
    /// Uses the Cuda inference. May not be available depending of your Onnx runtime installation.
    OrtCuda,
    /// Uses Intel's OpenVINO inference. May not be available depending of your Onnx runtime installation.
    OrtVino,
}

/// Inference parameters.
#[derive(Clone, Copy, Debug)]
pub struct InferParams {
    /// Chooses the ONNX runtime provider.
    pub provider: Provider,
    /// Sets the number of intra-op threads.
    pub intra_threads: Option<usize>,
}

impl Default for InferParams {
    fn default() -> Self {
        Self {
            provider: Provider::OrtCpu,
            intra_threads: None,
        }
    }
}

/// Builder for the detection pipeline: where weights come from and which
/// backend runs them.
pub struct FacePipelineBuilder {
    location: WeightsLocation,
    cache_dir: Option<PathBuf>,
    backend: Option<Box<dyn FaceBackend>>,
    params: DetectionParams,
    infer_params: InferParams,
}

impl Default for FacePipelineBuilder {
    fn default() -> Self {
        Self::new(BuildMode::from_build())
    }
}

impl FacePipelineBuilder {
    /// Create a new builder reading weights from the location of `mode`.
    ///
    /// # Arguments
    ///
    /// * `mode` - Development reads `weights/` locally, production downloads.
    pub fn new(mode: BuildMode) -> Self {
        Self {
            location: WeightsLocation::for_build_mode(mode),
            cache_dir: None,
            backend: None,
            params: DetectionParams::default(),
            infer_params: InferParams::default(),
        }
    }

    /// Read the weights from the given directory.
    pub fn from_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.location = WeightsLocation::Local(dir.into());
        self
    }

    /// Download the weights from the given base URL.
    pub fn from_url(mut self, base_url: impl Into<String>) -> Self {
        self.location = WeightsLocation::Remote(base_url.into());
        self
    }

    /// Directory for downloaded weights (default: `~/.face_overlay/weights`).
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Use a custom backend instead of the built-in ONNX one.
    pub fn backend(mut self, backend: Box<dyn FaceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the detection parameters.
    pub fn detect_params(mut self, params: DetectionParams) -> Self {
        self.params = params;
        self
    }

    /// Set the non-maximum suppression.
    pub fn nms(mut self, nms: Nms) -> Self {
        self.params.nms = nms;
        self
    }

    /// Sets the inference parameters.
    pub fn infer_params(mut self, params: InferParams) -> Self {
        self.infer_params = params;
        self
    }

    pub fn location(&self) -> &WeightsLocation {
        &self.location
    }

    /// Builds the pipeline. Models are loaded lazily on the first detection.
    pub fn build(self) -> FaceOverlayResult<FacePipeline> {
        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };
        let repository = WeightsRepository::new(self.location, cache_dir);

        let backend = match self.backend {
            Some(backend) => backend,
            None => default_backend(self.params, self.infer_params)?,
        };

        Ok(FacePipeline::new(Box::new(repository), backend))
    }
}

#[cfg(feature = "onnx")]
fn default_backend(
    params: DetectionParams,
    infer_params: InferParams,
) -> FaceOverlayResult<Box<dyn FaceBackend>> {
    Ok(Box::new(crate::onnx::OrtBackend::new(params, infer_params)?))
}

#[cfg(not(feature = "onnx"))]
fn default_backend(
    _params: DetectionParams,
    _infer_params: InferParams,
) -> FaceOverlayResult<Box<dyn FaceBackend>> {
    Err(crate::FaceOverlayError::Other(
        "no face backend configured; enable the `onnx` feature or call `backend()`".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection::ModelKind,
        testing::{sample_image, ScriptedBackend},
    };
    use image::RgbImage;
    use rstest::rstest;

    #[test]
    fn location_defaults_follow_mode() {
        assert_eq!(
            FacePipelineBuilder::new(BuildMode::Development).location(),
            &WeightsLocation::Local(PathBuf::from("weights"))
        );
        assert!(matches!(
            FacePipelineBuilder::new(BuildMode::Production).location(),
            WeightsLocation::Remote(_)
        ));
    }

    #[rstest]
    fn builds_pipeline_over_local_weights(sample_image: RgbImage) {
        let dir = tempfile::tempdir().unwrap();
        for kind in ModelKind::LOAD_ORDER {
            std::fs::write(dir.path().join(kind.file_name()), b"weights").unwrap();
        }

        let mut pipeline = FacePipelineBuilder::new(BuildMode::Development)
            .from_dir(dir.path())
            .cache_dir(dir.path().join("cache"))
            .backend(Box::new(ScriptedBackend::with_faces(vec![])))
            .build()
            .unwrap();

        assert!(pipeline.detect_faces(&sample_image, |_| {}).unwrap().is_empty());
        for kind in ModelKind::LOAD_ORDER {
            assert!(pipeline.backend().is_loaded(kind));
        }
    }

    #[rstest]
    fn missing_weights_fail_detection(sample_image: RgbImage) {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = FacePipelineBuilder::new(BuildMode::Development)
            .from_dir(dir.path())
            .cache_dir(dir.path().join("cache"))
            .backend(Box::new(ScriptedBackend::with_faces(vec![])))
            .build()
            .unwrap();

        assert!(pipeline.detect_faces(&sample_image, |_| {}).is_err());
    }
}
