//! Overlay painting: maps detections into rendered-image space and draws
//! boxes and landmarks onto a canvas laid over the image.

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use log::debug;

use crate::{detection::FaceDescription, Rect};

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 160, 255, 255]);
const LANDMARK_RADIUS: i32 = 1;

impl From<Rect> for imageproc::rect::Rect {
    fn from(rect: Rect) -> Self {
        imageproc::rect::Rect::at(rect.x.round() as i32, rect.y.round() as i32).of_size(
            (rect.width.round() as u32).max(1),
            (rect.height.round() as u32).max(1),
        )
    }
}

/// A bitmap as laid out on screen: its pixels plus the size it is rendered at.
#[derive(Clone, Debug)]
pub struct RenderedImage {
    image: DynamicImage,
    rendered_size: (u32, u32),
}

impl RenderedImage {
    pub fn new(image: DynamicImage, rendered_width: u32, rendered_height: u32) -> Self {
        Self {
            image,
            rendered_size: (rendered_width, rendered_height),
        }
    }

    /// Rendered at the bitmap's own size.
    pub fn natural(image: DynamicImage) -> Self {
        let size = image.dimensions();
        Self::new(image, size.0, size.1)
    }

    /// Rendered at most `max_width` wide, keeping the aspect ratio.
    pub fn fit_width(image: DynamicImage, max_width: u32) -> Self {
        let (width, height) = image.dimensions();
        if width <= max_width || width == 0 {
            return Self::natural(image);
        }
        let rendered_height = ((height as f64 * max_width as f64) / width as f64).round() as u32;
        Self::new(image, max_width, rendered_height.max(1))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn natural_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn rendered_size(&self) -> (u32, u32) {
        self.rendered_size
    }
}

/// Transparent RGBA surface drawn over the rendered image.
#[derive(Clone, Debug)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Resizes to `width` x `height` and clears everything previously drawn.
    pub fn reset(&mut self, width: u32, height: u32) {
        if self.pixels.dimensions() == (width, height) {
            self.pixels.pixels_mut().for_each(|pixel| *pixel = Rgba([0, 0, 0, 0]));
        } else {
            self.pixels = RgbaImage::new(width, height);
        }
    }

    /// True when nothing has been drawn.
    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|pixel| pixel[3] == 0)
    }
}

/// Handles to the rendered surfaces, acquired by the caller at the point of use.
#[derive(Default)]
pub struct Surfaces<'a> {
    pub image: Option<&'a RenderedImage>,
    pub canvas: Option<&'a mut Canvas>,
}

impl<'a> Surfaces<'a> {
    pub fn new(image: &'a RenderedImage, canvas: &'a mut Canvas) -> Self {
        Self {
            image: Some(image),
            canvas: Some(canvas),
        }
    }

    /// No surface mounted.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Rescales every face from `original_size` coordinates to `rendered_size` coordinates.
pub fn resize_results(
    faces: &[FaceDescription],
    original_size: (u32, u32),
    rendered_size: (u32, u32),
) -> Vec<FaceDescription> {
    faces
        .iter()
        .map(|face| face.resize(original_size, rendered_size))
        .collect()
}

/// Draws a hollow box around each face.
pub fn draw_detections(canvas: &mut Canvas, faces: &[FaceDescription]) {
    for face in faces {
        if face.detection.rect.is_empty() {
            continue;
        }
        imageproc::drawing::draw_hollow_rect_mut(
            &mut canvas.pixels,
            face.detection.rect.into(),
            BOX_COLOR,
        );
    }
}

/// Draws each landmark point as a small dot.
pub fn draw_face_landmarks(canvas: &mut Canvas, faces: &[FaceDescription]) {
    for face in faces {
        for point in face.landmarks.points() {
            imageproc::drawing::draw_filled_circle_mut(
                &mut canvas.pixels,
                (point.x.round() as i32, point.y.round() as i32),
                LANDMARK_RADIUS,
                LANDMARK_COLOR,
            );
        }
    }
}

/// Repaints the overlay for a new result set.
///
/// Returns `false` without touching anything when either surface is missing.
/// Otherwise the canvas is sized to the rendered image, cleared, and the
/// rescaled boxes and landmarks are drawn.
pub fn redraw_overlay(surfaces: Surfaces<'_>, faces: &[FaceDescription]) -> bool {
    let (Some(image), Some(canvas)) = (surfaces.image, surfaces.canvas) else {
        debug!("Overlay surfaces not mounted, skipping redraw");
        return false;
    };

    let rendered_size = image.rendered_size();
    let resized = resize_results(faces, image.natural_size(), rendered_size);
    canvas.reset(rendered_size.0, rendered_size.1);
    draw_detections(canvas, &resized);
    draw_face_landmarks(canvas, &resized);
    debug!(
        "Drew {} face(s) on {}x{} overlay",
        resized.len(),
        rendered_size.0,
        rendered_size.1
    );
    true
}
