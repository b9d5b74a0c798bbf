use std::{path::Path, sync::Arc};

use image::RgbImage;
use log::info;
use ndarray::Array4;
use ort::{
    tensor::{FromArray, InputTensor, OrtOwnedTensor},
    Environment, ExecutionProvider, OrtError, Session, SessionBuilder,
};

use crate::{
    builder::{InferParams, Provider},
    detection::{
        Descriptor, DetectionParams, FaceBackend, FaceOverlayError, FaceOverlayResult, FaceRegion,
        Landmarks, ModelKind, Point, LANDMARK_COUNT,
    },
    imaging::{crop_patch, to_nchw},
    ssd::SsdDetector,
    Rect,
};

const LANDMARK_INPUT_SIZE: u32 = 112;
const RECOGNITION_INPUT_SIZE: u32 = 150;
const RECOGNITION_MEAN_RGB: [f32; 3] = [122.782, 117.001, 104.298];

impl From<OrtError> for FaceOverlayError {
    fn from(err: OrtError) -> Self {
        FaceOverlayError::Inference(err.to_string())
    }
}

/// ONNX Runtime backend: SSD detector, 68-point landmark net and
/// recognition net, each loaded from its own weights file.
pub struct OrtBackend {
    env: Arc<Environment>,
    params: DetectionParams,
    infer_params: InferParams,
    detector: Option<SsdDetector>,
    landmark_net: Option<Session>,
    recognition_net: Option<Session>,
}

impl OrtBackend {
    pub fn new(params: DetectionParams, infer_params: InferParams) -> FaceOverlayResult<Self> {
        let provider = match infer_params.provider {
            Provider::OrtCpu => ExecutionProvider::cpu(),
            Provider::OrtCuda => ExecutionProvider::cuda(),
            Provider::OrtVino => ExecutionProvider::openvino(),
        };
        let env = Arc::new(
            Environment::builder()
                .with_name("FaceOverlay")
                .with_execution_providers([provider])
                .build()?,
        );
        Ok(Self {
            env,
            params,
            infer_params,
            detector: None,
            landmark_net: None,
            recognition_net: None,
        })
    }

    fn open_session(&self, path: &Path) -> FaceOverlayResult<Session> {
        let mut builder = SessionBuilder::new(&self.env)?;
        if let Some(threads) = self.infer_params.intra_threads {
            builder = builder.with_intra_threads(threads as i16)?;
        }
        Ok(builder.with_model_from_file(path)?)
    }
}

/// Runs a single-input, single-output network and flattens its output.
fn run_flat(session: &Session, input: Array4<f32>) -> FaceOverlayResult<Vec<f32>> {
    let outputs = session.run(vec![InputTensor::from_array(input.into_dyn())])?;
    let output: OrtOwnedTensor<f32, _> = outputs
        .first()
        .ok_or_else(|| FaceOverlayError::Inference("network produced no output".to_string()))?
        .try_extract()?;
    let values = output.view().iter().copied().collect();
    Ok(values)
}

/// Maps landmark-net output, `(x, y)` pairs relative to the input patch,
/// back into image coordinates.
fn landmarks_from_patch(values: &[f32], source: &Rect) -> FaceOverlayResult<Landmarks> {
    if values.len() != LANDMARK_COUNT * 2 {
        return Err(FaceOverlayError::InvalidLandmarks(values.len() / 2));
    }
    Landmarks::new(
        values
            .chunks(2)
            .map(|xy| {
                Point::new(
                    source.x + xy[0] * source.width,
                    source.y + xy[1] * source.height,
                )
            })
            .collect(),
    )
}

fn face_patch(image: &RgbImage, rect: &Rect, size: u32) -> FaceOverlayResult<(RgbImage, Rect)> {
    crop_patch(image, &rect.square_around_center(1.0), size)
        .ok_or_else(|| FaceOverlayError::Inference(format!("face {rect} lies outside the image")))
}

impl FaceBackend for OrtBackend {
    fn load_model(&mut self, kind: ModelKind, path: &Path) -> FaceOverlayResult<()> {
        let session = self.open_session(path)?;
        match kind {
            ModelKind::Detector => self.detector = Some(SsdDetector::new(session, self.params)),
            ModelKind::Landmarks => self.landmark_net = Some(session),
            ModelKind::Recognition => self.recognition_net = Some(session),
        }
        info!("Loaded {kind} from {}", path.display());
        Ok(())
    }

    fn is_loaded(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::Detector => self.detector.is_some(),
            ModelKind::Landmarks => self.landmark_net.is_some(),
            ModelKind::Recognition => self.recognition_net.is_some(),
        }
    }

    fn detect(&self, image: &RgbImage) -> FaceOverlayResult<Vec<FaceRegion>> {
        self.detector
            .as_ref()
            .ok_or(FaceOverlayError::ModelNotLoaded(ModelKind::Detector))?
            .detect(image)
    }

    fn landmarks(&self, image: &RgbImage, region: &FaceRegion) -> FaceOverlayResult<Landmarks> {
        let session = self
            .landmark_net
            .as_ref()
            .ok_or(FaceOverlayError::ModelNotLoaded(ModelKind::Landmarks))?;
        let (patch, source) = face_patch(image, &region.rect, LANDMARK_INPUT_SIZE)?;
        let values = run_flat(session, to_nchw(&patch, |_, value| value as f32 / 255.0))?;
        landmarks_from_patch(&values, &source)
    }

    fn descriptor(
        &self,
        image: &RgbImage,
        _region: &FaceRegion,
        landmarks: &Landmarks,
    ) -> FaceOverlayResult<Descriptor> {
        let session = self
            .recognition_net
            .as_ref()
            .ok_or(FaceOverlayError::ModelNotLoaded(ModelKind::Recognition))?;
        let (patch, _) = face_patch(image, &landmarks.bounding_rect(), RECOGNITION_INPUT_SIZE)?;
        let input = to_nchw(&patch, |c, value| {
            (value as f32 - RECOGNITION_MEAN_RGB[c]) / 256.0
        });
        Descriptor::new(run_flat(session, input)?)
    }
}
