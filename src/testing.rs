use std::{
    cell::Cell,
    path::{Path, PathBuf},
    rc::Rc,
};

use image::{codecs::jpeg::JpegEncoder, ColorType, RgbImage};
use rstest::fixture;

use crate::{
    detection::{
        Descriptor, FaceBackend, FaceDescription, FaceOverlayError, FaceOverlayResult,
        FaceRegion, Landmarks, ModelKind, Point, DESCRIPTOR_LEN, LANDMARK_COUNT,
    },
    model_repository::ModelRepository,
    Rect,
};

/// Gradient image standing in for a photo.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

pub fn encode_jpeg(image: &RgbImage) -> Vec<u8> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 90)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .unwrap();
    buffer
}

#[fixture]
pub fn sample_image() -> RgbImage {
    gradient_image(400, 300)
}

#[fixture]
pub fn sample_jpeg() -> Vec<u8> {
    encode_jpeg(&gradient_image(400, 300))
}

#[fixture]
pub fn output_dir() -> PathBuf {
    let output_path = PathBuf::from("tests/output");
    std::fs::create_dir_all(output_path.clone()).expect("Can't create output directory");
    output_path
}

pub fn flat_descriptor(value: f32) -> Descriptor {
    Descriptor::new(vec![value; DESCRIPTOR_LEN]).unwrap()
}

/// Landmarks spread along the diagonal of `rect`.
pub fn diagonal_landmarks(rect: &Rect) -> Landmarks {
    let step = 1.0 / (LANDMARK_COUNT - 1) as f32;
    Landmarks::new(
        (0..LANDMARK_COUNT)
            .map(|i| {
                let t = i as f32 * step;
                Point::new(rect.x + rect.width * t, rect.y + rect.height * t)
            })
            .collect(),
    )
    .unwrap()
}

pub fn face_at(rect: Rect, score: f32) -> FaceDescription {
    FaceDescription {
        landmarks: diagonal_landmarks(&rect),
        detection: FaceRegion { rect, score },
        descriptor: flat_descriptor(0.0),
    }
}

/// Repository whose paths are never read; pairs with [`ScriptedBackend`].
pub struct StaticRepository;

impl ModelRepository for StaticRepository {
    fn get_model(&self, kind: ModelKind) -> FaceOverlayResult<PathBuf> {
        Ok(PathBuf::from("weights").join(kind.file_name()))
    }
}

/// Backend returning a fixed set of faces.
pub struct ScriptedBackend {
    faces: Vec<FaceDescription>,
    loaded: Vec<ModelKind>,
    loads: Rc<Cell<usize>>,
    fail_load: Option<ModelKind>,
    fail_detect: bool,
}

impl ScriptedBackend {
    pub fn with_faces(faces: Vec<FaceDescription>) -> Self {
        Self {
            faces,
            loaded: Vec::new(),
            loads: Rc::new(Cell::new(0)),
            fail_load: None,
            fail_detect: false,
        }
    }

    pub fn failing_load(kind: ModelKind) -> Self {
        Self {
            fail_load: Some(kind),
            ..Self::with_faces(vec![])
        }
    }

    pub fn failing_detect() -> Self {
        Self {
            fail_detect: true,
            ..Self::with_faces(vec![])
        }
    }

    /// Shared counter of successful `load_model` calls.
    pub fn load_counter(&self) -> Rc<Cell<usize>> {
        self.loads.clone()
    }

    fn find(&self, region: &FaceRegion) -> FaceOverlayResult<&FaceDescription> {
        self.faces
            .iter()
            .find(|face| face.detection == *region)
            .ok_or_else(|| FaceOverlayError::Inference("unknown region".to_string()))
    }
}

impl FaceBackend for ScriptedBackend {
    fn load_model(&mut self, kind: ModelKind, _path: &Path) -> FaceOverlayResult<()> {
        if self.fail_load == Some(kind) {
            return Err(FaceOverlayError::Download(format!("{kind} unavailable")));
        }
        if !self.loaded.contains(&kind) {
            self.loaded.push(kind);
        }
        self.loads.set(self.loads.get() + 1);
        Ok(())
    }

    fn is_loaded(&self, kind: ModelKind) -> bool {
        self.loaded.contains(&kind)
    }

    fn detect(&self, _image: &RgbImage) -> FaceOverlayResult<Vec<FaceRegion>> {
        if self.fail_detect {
            return Err(FaceOverlayError::Inference("detector crashed".to_string()));
        }
        Ok(self.faces.iter().map(|face| face.detection.clone()).collect())
    }

    fn landmarks(&self, _image: &RgbImage, region: &FaceRegion) -> FaceOverlayResult<Landmarks> {
        Ok(self.find(region)?.landmarks.clone())
    }

    fn descriptor(
        &self,
        _image: &RgbImage,
        region: &FaceRegion,
        _landmarks: &Landmarks,
    ) -> FaceOverlayResult<Descriptor> {
        Ok(self.find(region)?.descriptor.clone())
    }
}
