use std::path::Path;

use image::RgbImage;
use ndarray::Array1;
use thiserror::Error;

use crate::{nms::Nms, Rect};

/// Number of points in a landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// Length of a face descriptor.
pub const DESCRIPTOR_LEN: usize = 128;

#[derive(Error, Debug)]
pub enum FaceOverlayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Download error: {0}")]
    Download(String),
    #[error("Inference error: {0}")]
    Inference(String),
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(ModelKind),
    #[error("Expected 68 landmarks, got {0}")]
    InvalidLandmarks(usize),
    #[error("Expected a descriptor of length 128, got {0}")]
    InvalidDescriptor(usize),
    #[error("Unknown object URL: {0}")]
    UnknownObjectUrl(String),
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
    #[error("Other error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for FaceOverlayError {
    fn from(err: reqwest::Error) -> Self {
        FaceOverlayError::Download(err.to_string())
    }
}

pub type FaceOverlayResult<R> = Result<R, FaceOverlayError>;

/// The three model stages a face backend needs resident before detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// SSD face detector.
    Detector,
    /// 68-point landmark regressor.
    Landmarks,
    /// Descriptor network.
    Recognition,
}

impl ModelKind {
    /// Stages in load order. Landmarks and recognition depend on the detector.
    pub const LOAD_ORDER: [ModelKind; 3] = [
        ModelKind::Detector,
        ModelKind::Landmarks,
        ModelKind::Recognition,
    ];

    /// Name of the weights file under the weights base location.
    pub fn file_name(&self) -> &'static str {
        match self {
            ModelKind::Detector => "ssd_mobilenetv1.onnx",
            ModelKind::Landmarks => "face_landmark_68.onnx",
            ModelKind::Recognition => "face_recognition.onnx",
        }
    }

    /// Status shown while this stage loads.
    pub fn loading_status(&self) -> &'static str {
        match self {
            ModelKind::Detector => "Load SsdModel",
            ModelKind::Landmarks => "Load LandmarkModel",
            ModelKind::Recognition => "Load RecognitionModel",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(&self, x_scale: f32, y_scale: f32) -> Point {
        Point {
            x: self.x * x_scale,
            y: self.y * y_scale,
        }
    }
}

/// Detection region: where a face is and how confident the detector is.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRegion {
    pub rect: Rect,
    /// Confidence in `[0, 1]`.
    pub score: f32,
}

/// Fixed-count landmark set.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    points: Vec<Point>,
}

impl Landmarks {
    /// Builds a landmark set, rejecting anything other than [`LANDMARK_COUNT`] points.
    pub fn new(points: Vec<Point>) -> FaceOverlayResult<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(FaceOverlayError::InvalidLandmarks(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Smallest rectangle containing every point.
    pub fn bounding_rect(&self) -> Rect {
        let (mut left, mut top) = (f32::MAX, f32::MAX);
        let (mut right, mut bottom) = (f32::MIN, f32::MIN);
        for point in &self.points {
            left = left.min(point.x);
            top = top.min(point.y);
            right = right.max(point.x);
            bottom = bottom.max(point.y);
        }
        Rect::at(left, top).ending_at(right, bottom)
    }

    pub fn scale(&self, x_scale: f32, y_scale: f32) -> Landmarks {
        Landmarks {
            points: self
                .points
                .iter()
                .map(|point| point.scale(x_scale, y_scale))
                .collect(),
        }
    }
}

/// Fixed-length feature vector summarizing a face.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor(Array1<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> FaceOverlayResult<Self> {
        if values.len() != DESCRIPTOR_LEN {
            return Err(FaceOverlayError::InvalidDescriptor(values.len()));
        }
        Ok(Self(Array1::from_vec(values)))
    }

    pub fn values(&self) -> &Array1<f32> {
        &self.0
    }

    /// Euclidean distance between two descriptors; smaller means more alike.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        let diff = &self.0 - &other.0;
        diff.dot(&diff).sqrt()
    }
}

/// One detected face with its landmarks and descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDescription {
    pub detection: FaceRegion,
    pub landmarks: Landmarks,
    pub descriptor: Descriptor,
}

impl FaceDescription {
    /// Maps the face from one coordinate space into another by scaling each
    /// axis by `to / from`. The descriptor is coordinate-free and kept as is.
    pub fn resize(&self, from: (u32, u32), to: (u32, u32)) -> FaceDescription {
        let (x_scale, y_scale) = scale_factors(from, to);
        FaceDescription {
            detection: FaceRegion {
                rect: self.detection.rect.scale(x_scale, y_scale),
                score: self.detection.score,
            },
            landmarks: self.landmarks.scale(x_scale, y_scale),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Index of the closest reference descriptor, if its distance is below `threshold`.
    pub fn best_match(&self, references: &[Descriptor], threshold: f32) -> Option<usize> {
        references
            .iter()
            .enumerate()
            .map(|(i, reference)| (i, self.descriptor.euclidean_distance(reference)))
            .filter(|(_, distance)| *distance < threshold)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

/// Per-axis factors mapping `from` dimensions onto `to` dimensions.
pub fn scale_factors(from: (u32, u32), to: (u32, u32)) -> (f32, f32) {
    let ratio = |to: u32, from: u32| {
        if from == 0 {
            1.0
        } else {
            to as f32 / from as f32
        }
    };
    (ratio(to.0, from.0), ratio(to.1, from.1))
}

/// Face inference engine: loads weights per stage and runs them.
///
/// Loading is expected to be idempotent; the pipeline checks
/// [`FaceBackend::is_loaded`] and skips stages already resident.
pub trait FaceBackend {
    /// Loads the weights of one stage from a local file.
    fn load_model(&mut self, kind: ModelKind, path: &Path) -> FaceOverlayResult<()>;

    /// Whether the given stage is resident.
    fn is_loaded(&self, kind: ModelKind) -> bool;

    /// Finds face regions in the image.
    fn detect(&self, image: &RgbImage) -> FaceOverlayResult<Vec<FaceRegion>>;

    /// Regresses landmarks for one detected region.
    fn landmarks(&self, image: &RgbImage, region: &FaceRegion) -> FaceOverlayResult<Landmarks>;

    /// Computes the descriptor of one detected face.
    fn descriptor(
        &self,
        image: &RgbImage,
        region: &FaceRegion,
        landmarks: &Landmarks,
    ) -> FaceOverlayResult<Descriptor>;

    /// Detects all faces, then attaches landmarks and descriptors to each.
    fn detect_all_faces(&self, image: &RgbImage) -> FaceOverlayResult<Vec<FaceDescription>> {
        for kind in ModelKind::LOAD_ORDER {
            if !self.is_loaded(kind) {
                return Err(FaceOverlayError::ModelNotLoaded(kind));
            }
        }

        self.detect(image)?
            .into_iter()
            .map(|detection| {
                let landmarks = self.landmarks(image, &detection)?;
                let descriptor = self.descriptor(image, &detection, &landmarks)?;
                Ok(FaceDescription {
                    detection,
                    landmarks,
                    descriptor,
                })
            })
            .collect()
    }
}

#[derive(Debug, Copy, Clone)]
pub struct DetectionParams {
    pub score_threshold: f32,
    pub max_faces: usize,
    pub nms: Nms,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            max_faces: 100,
            nms: Nms::default(),
        }
    }
}
