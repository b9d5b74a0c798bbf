//! Application state and the transitions that mutate it.
//!
//! All state lives in one [`AppState`]. Rendered surfaces are never stored;
//! callers pass them in through [`Surfaces`] whenever a transition needs them.

use std::sync::Arc;

use image::DynamicImage;
use log::{debug, error, info, warn};

use crate::{
    crop::{encode_jpeg, rasterize_crop, CropRegion, CROP_FILE_NAME, CROP_JPEG_QUALITY},
    detection::{FaceDescription, FaceOverlayResult},
    object_url::{decode_data_url, image_mime, to_data_url, Blob, BlobRegistry, ObjectUrl},
    pipeline::{DetectionStatus, FacePipeline},
    viz::{redraw_overlay, RenderedImage, Surfaces},
};

/// A file handed over by the file picker.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The image currently on display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplaySource {
    /// Selected file, inlined as a base64 `data:` URL.
    DataUrl(String),
    /// Saved crop, owned through the blob registry.
    ObjectUrl(ObjectUrl),
}

#[derive(Clone, Copy, Debug)]
pub struct AppConfig {
    /// Device pixels per rendered pixel, applied to crop output.
    pub device_pixel_ratio: f32,
    /// Crop selection shown when the crop dialog opens.
    pub initial_crop: CropRegion,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            initial_crop: CropRegion::default(),
        }
    }
}

/// Identifies one detection request. Only the most recent one may commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectionTicket(u64);

/// What became of a detection request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionOutcome {
    /// No image was mounted; nothing ran.
    NoImage,
    /// A newer request was issued meanwhile; the result was dropped.
    Stale,
    /// Loading or inference failed; the status reports the error.
    Failed,
    /// Results were stored. `redrawn` tells whether the overlay was painted.
    Committed { redrawn: bool },
}

pub struct AppState {
    config: AppConfig,
    source: Option<DisplaySource>,
    crop: CropRegion,
    cropped_image_url: Option<ObjectUrl>,
    crop_dialog_open: bool,
    detections: Option<Arc<[FaceDescription]>>,
    status: DetectionStatus,
    generation: u64,
    overlay_revision: u64,
    blobs: BlobRegistry,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            source: None,
            crop: config.initial_crop,
            cropped_image_url: None,
            crop_dialog_open: false,
            detections: None,
            status: DetectionStatus::default(),
            generation: 0,
            overlay_revision: 0,
            blobs: BlobRegistry::new(),
        }
    }

    pub fn source(&self) -> Option<&DisplaySource> {
        self.source.as_ref()
    }

    pub fn crop(&self) -> &CropRegion {
        &self.crop
    }

    pub fn cropped_image_url(&self) -> Option<&ObjectUrl> {
        self.cropped_image_url.as_ref()
    }

    pub fn is_crop_dialog_open(&self) -> bool {
        self.crop_dialog_open
    }

    pub fn detections(&self) -> Option<&Arc<[FaceDescription]>> {
        self.detections.as_ref()
    }

    pub fn status(&self) -> &DetectionStatus {
        &self.status
    }

    /// Number of times the detection-changed transition has fired.
    pub fn overlay_revision(&self) -> u64 {
        self.overlay_revision
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Decodes the image currently on display.
    pub fn displayed_image(&self) -> FaceOverlayResult<Option<DynamicImage>> {
        let bytes = match &self.source {
            None => return Ok(None),
            Some(DisplaySource::DataUrl(url)) => decode_data_url(url)?,
            Some(DisplaySource::ObjectUrl(url)) => self.blobs.get(url)?.bytes.clone(),
        };
        Ok(Some(image::load_from_memory(&bytes)?))
    }

    fn replace_source(&mut self, source: DisplaySource) {
        if let Some(DisplaySource::ObjectUrl(previous)) = self.source.take() {
            self.blobs.revoke_object_url(&previous);
        }
        self.source = Some(source);
    }

    /// Shows the selected file and opens the crop dialog. Any crop preview
    /// of the previous image is revoked.
    ///
    /// Empty selections, empty files and bytes that are not an image are
    /// ignored and leave the state as it was.
    pub fn on_select_file(&mut self, file: Option<SelectedFile>) {
        let Some(file) = file else {
            return;
        };
        if file.bytes.is_empty() {
            warn!("Ignoring empty file {}", file.name);
            return;
        }
        let Some(mime) = image_mime(&file.bytes) else {
            warn!("Ignoring {}: not a supported image", file.name);
            return;
        };

        info!("Selected {} ({mime}, {} bytes)", file.name, file.bytes.len());
        self.replace_source(DisplaySource::DataUrl(to_data_url(mime, &file.bytes)));
        if let Some(preview) = self.cropped_image_url.take() {
            self.blobs.revoke_object_url(&preview);
        }
        self.crop = self.config.initial_crop;
        self.crop_dialog_open = true;
    }

    /// Tracks the selection while it is being dragged.
    pub fn on_crop_change(&mut self, region: CropRegion) {
        self.crop = region;
    }

    /// Rasterizes the finished selection into a new crop preview.
    ///
    /// `view` is the image as shown inside the crop dialog. The previous
    /// preview URL is revoked before the new one is created. Nothing changes
    /// when the selection is empty or encoding produces no bytes.
    pub fn on_crop_complete(&mut self, region: CropRegion, view: &RenderedImage) {
        self.crop = region;
        if !region.has_area() {
            return;
        }
        let Some(cropped) = rasterize_crop(view, &region, self.config.device_pixel_ratio) else {
            debug!("Crop selection lies outside the image");
            return;
        };

        let bytes = match encode_jpeg(&cropped, CROP_JPEG_QUALITY) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                error!("Canvas is empty");
                return;
            }
            Err(err) => {
                error!("Failed to encode crop: {err}");
                return;
            }
        };

        if let Some(previous) = self.cropped_image_url.take() {
            self.blobs.revoke_object_url(&previous);
        }
        self.cropped_image_url = Some(self.blobs.create_object_url(Blob {
            bytes,
            mime: "image/jpeg".to_string(),
            name: Some(CROP_FILE_NAME.to_string()),
        }));
    }

    /// Displays the latest crop preview and closes the crop dialog.
    ///
    /// The preview URL moves into the display source, so later crops never
    /// revoke the image on display. Without a preview the source is kept.
    pub fn on_save(&mut self) {
        if let Some(url) = self.cropped_image_url.take() {
            info!("Saving crop {url}");
            self.replace_source(DisplaySource::ObjectUrl(url));
        }
        self.crop_dialog_open = false;
    }

    /// Issues a new detection request, superseding any in flight.
    pub fn begin_detection(&mut self) -> DetectionTicket {
        self.generation += 1;
        DetectionTicket(self.generation)
    }

    pub fn is_current(&self, ticket: DetectionTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Records an intermediate status. Ignored for superseded requests.
    pub fn set_status(&mut self, ticket: DetectionTicket, status: DetectionStatus) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.status = status;
        true
    }

    /// Stores a new result set and repaints the overlay for it.
    ///
    /// Fires only when `faces` is a different allocation from the current set;
    /// storing the same `Arc` again changes nothing. Returns whether the
    /// overlay was painted.
    pub fn set_detections(
        &mut self,
        faces: Arc<[FaceDescription]>,
        surfaces: Surfaces<'_>,
    ) -> bool {
        if let Some(current) = &self.detections {
            if Arc::ptr_eq(current, &faces) {
                return false;
            }
        }
        self.overlay_revision += 1;
        let redrawn = redraw_overlay(surfaces, &faces);
        self.detections = Some(faces);
        redrawn
    }

    /// Applies the outcome of a detection request.
    ///
    /// Superseded requests are dropped. Failures resolve the status to an
    /// error message and keep the previous results.
    pub fn commit_detection(
        &mut self,
        ticket: DetectionTicket,
        outcome: FaceOverlayResult<Vec<FaceDescription>>,
        surfaces: Surfaces<'_>,
    ) -> DetectionOutcome {
        if !self.is_current(ticket) {
            debug!("Dropping result of superseded detection request {}", ticket.0);
            return DetectionOutcome::Stale;
        }
        match outcome {
            Ok(faces) => {
                self.status = DetectionStatus::from_results(&faces);
                let redrawn = self.set_detections(Arc::from(faces), surfaces);
                DetectionOutcome::Committed { redrawn }
            }
            Err(err) => {
                error!("Detection failed: {err}");
                self.status = DetectionStatus::failed(&err);
                DetectionOutcome::Failed
            }
        }
    }

    /// Runs detection on the mounted image and commits the result.
    pub fn handle_detect_face(
        &mut self,
        pipeline: &mut FacePipeline,
        surfaces: Surfaces<'_>,
    ) -> DetectionOutcome {
        let Some(image) = surfaces.image else {
            return DetectionOutcome::NoImage;
        };
        let rgb = image.image().to_rgb8();
        let ticket = self.begin_detection();
        let outcome = pipeline.detect_faces(&rgb, |status| {
            self.set_status(ticket, status);
        });
        self.commit_detection(ticket, outcome, surfaces)
    }
}
