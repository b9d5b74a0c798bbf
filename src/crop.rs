use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, RgbImage};

use crate::{
    detection::{scale_factors, FaceOverlayResult},
    viz::RenderedImage,
    Rect,
};

/// JPEG quality used for crop previews.
pub const CROP_JPEG_QUALITY: u8 = 100;

/// File name attached to crop preview blobs.
pub const CROP_FILE_NAME: &str = "newFile.jpeg";

/// Unit of a [`CropRegion`]'s coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropUnit {
    /// Percent of the rendered image size.
    Percent,
    /// Rendered pixels.
    Pixel,
}

/// User's crop selection over the rendered image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x: f32,
    pub y: f32,
    width: f32,
    height: f32,
    pub unit: CropUnit,
    /// Fixed width/height ratio, held by the crop widget while dragging.
    pub aspect: Option<f32>,
}

impl Default for CropRegion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 0.0,
            unit: CropUnit::Percent,
            aspect: Some(1.0),
        }
    }
}

impl CropRegion {
    /// Negative sizes are clamped to zero.
    pub fn new(x: f32, y: f32, width: f32, height: f32, unit: CropUnit) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
            unit,
            aspect: None,
        }
    }

    pub fn pixels(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, width, height, CropUnit::Pixel)
    }

    pub fn percent(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, width, height, CropUnit::Percent)
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = Some(aspect);
        self
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// A selection with zero width or height produces no output.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Region in rendered pixels for an image rendered at `rendered_size`.
    pub fn to_pixel_rect(&self, rendered_size: (u32, u32)) -> Rect {
        match self.unit {
            CropUnit::Pixel => Rect::at(self.x, self.y).with_size(self.width, self.height),
            CropUnit::Percent => {
                let (w, h) = (rendered_size.0 as f32 / 100.0, rendered_size.1 as f32 / 100.0);
                Rect::at(self.x * w, self.y * h).with_size(self.width * w, self.height * h)
            }
        }
    }
}

/// Rasterizes the selected part of `view` at full source resolution.
///
/// The selection is expressed in rendered pixels; it is mapped into the
/// bitmap's natural pixels, and the output is `selection * natural/rendered *
/// device_pixel_ratio` in size. Parts of the selection past the image edge
/// stay black. Returns `None` when the selection is empty or lies entirely
/// outside the image.
pub fn rasterize_crop(
    view: &RenderedImage,
    region: &CropRegion,
    device_pixel_ratio: f32,
) -> Option<RgbImage> {
    if !region.has_area() {
        return None;
    }
    let rendered_size = view.rendered_size();
    let natural_size = view.natural_size();
    let (scale_x, scale_y) = scale_factors(rendered_size, natural_size);

    let selection = region.to_pixel_rect(rendered_size).scale(scale_x, scale_y);
    let out_width = (selection.width * device_pixel_ratio).round() as u32;
    let out_height = (selection.height * device_pixel_ratio).round() as u32;

    let source = selection.clamp(natural_size.0 as f32, natural_size.1 as f32);
    let (sx, sy) = (source.x.round() as u32, source.y.round() as u32);
    let sw = (source.width.round() as u32).min(natural_size.0.saturating_sub(sx));
    let sh = (source.height.round() as u32).min(natural_size.1.saturating_sub(sy));
    if sw == 0 || sh == 0 || out_width == 0 || out_height == 0 {
        return None;
    }

    // Output pixels per source pixel, and where the clipped source lands.
    let (fx, fy) = (
        out_width as f32 / selection.width,
        out_height as f32 / selection.height,
    );
    let dx = (((sx as f32 - selection.x) * fx).round() as u32).min(out_width - 1);
    let dy = (((sy as f32 - selection.y) * fy).round() as u32).min(out_height - 1);
    let dw = ((sw as f32 * fx).round() as u32).clamp(1, out_width - dx);
    let dh = ((sh as f32 * fy).round() as u32).clamp(1, out_height - dy);

    let mut rgb = view.image().crop_imm(sx, sy, sw, sh).to_rgb8();
    if (sw, sh) != (dw, dh) {
        rgb = image::imageops::resize(&rgb, dw, dh, FilterType::CatmullRom);
    }
    if (dx, dy, dw, dh) == (0, 0, out_width, out_height) {
        return Some(rgb);
    }
    let mut output = RgbImage::new(out_width, out_height);
    image::imageops::overlay(&mut output, &rgb, dx as i64, dy as i64);
    Some(output)
}

/// Encodes a bitmap as JPEG at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> FaceOverlayResult<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::gradient_image;
    use image::DynamicImage;
    use rstest::rstest;

    fn view(width: u32, height: u32, rendered_width: u32, rendered_height: u32) -> RenderedImage {
        RenderedImage::new(
            DynamicImage::ImageRgb8(gradient_image(width, height)),
            rendered_width,
            rendered_height,
        )
    }

    #[test]
    fn negative_sizes_are_clamped() {
        let region = CropRegion::pixels(5.0, 5.0, -10.0, 20.0);
        assert_eq!(region.width(), 0.0);
        assert!(!region.has_area());
    }

    #[test]
    fn percent_region_maps_to_rendered_pixels() {
        let region = CropRegion::percent(10.0, 20.0, 50.0, 50.0);
        assert_eq!(
            region.to_pixel_rect((400, 300)).to_xywh(),
            (40.0, 60.0, 200.0, 150.0)
        );
    }

    #[rstest]
    #[case(1.0, (100, 100))]
    #[case(2.0, (200, 200))]
    fn pixel_crop_at_natural_size(#[case] dpr: f32, #[case] expected: (u32, u32)) {
        let region = CropRegion::pixels(50.0, 50.0, 100.0, 100.0);
        let cropped = rasterize_crop(&view(400, 300, 400, 300), &region, dpr).unwrap();
        assert_eq!(cropped.dimensions(), expected);
    }

    #[test]
    fn crop_on_downscaled_view_uses_natural_pixels() {
        // 800x600 bitmap shown at 400x300: a 100px selection covers 200 source pixels.
        let region = CropRegion::pixels(50.0, 50.0, 100.0, 100.0);
        let cropped = rasterize_crop(&view(800, 600, 400, 300), &region, 1.0).unwrap();
        assert_eq!(cropped.dimensions(), (200, 200));
    }

    #[test]
    fn crop_keeps_source_pixels() {
        let source = gradient_image(400, 300);
        let region = CropRegion::pixels(50.0, 60.0, 10.0, 10.0);
        let cropped = rasterize_crop(&view(400, 300, 400, 300), &region, 1.0).unwrap();
        assert_eq!(cropped.get_pixel(0, 0), source.get_pixel(50, 60));
    }

    #[test]
    fn selection_past_edge_is_not_stretched() {
        let source = gradient_image(400, 300);
        let region = CropRegion::pixels(350.0, 0.0, 100.0, 100.0);
        let cropped = rasterize_crop(&view(400, 300, 400, 300), &region, 1.0).unwrap();

        assert_eq!(cropped.dimensions(), (100, 100));
        assert_eq!(cropped.get_pixel(0, 0), source.get_pixel(350, 0));
        assert_eq!(cropped.get_pixel(49, 0), source.get_pixel(399, 0));
        assert_eq!(cropped.get_pixel(75, 10), &image::Rgb([0, 0, 0]));
    }

    #[test]
    fn selection_before_origin_is_offset() {
        let source = gradient_image(400, 300);
        let region = CropRegion::pixels(-20.0, 0.0, 40.0, 40.0);
        let cropped = rasterize_crop(&view(400, 300, 400, 300), &region, 2.0).unwrap();

        assert_eq!(cropped.dimensions(), (80, 80));
        assert_eq!(cropped.get_pixel(10, 10), &image::Rgb([0, 0, 0]));
        assert_eq!(cropped.get_pixel(40, 0)[2], source.get_pixel(0, 0)[2]);
        assert_eq!(cropped.get_pixel(79, 79)[2], 128);
    }

    #[test]
    fn empty_or_outside_selection_yields_nothing() {
        let view = view(100, 100, 100, 100);
        assert!(rasterize_crop(&view, &CropRegion::pixels(0.0, 0.0, 0.0, 10.0), 1.0).is_none());
        assert!(rasterize_crop(&view, &CropRegion::pixels(200.0, 200.0, 10.0, 10.0), 1.0).is_none());
    }

    #[test]
    fn encode_jpeg_produces_jpeg() {
        let data = encode_jpeg(&gradient_image(16, 16), CROP_JPEG_QUALITY).unwrap();
        assert_eq!(&data[..2], &[0xFF, 0xD8]);
    }
}
