use image::{
    imageops::{self, FilterType},
    GenericImageView, ImageBuffer, Pixel, RgbImage,
};
use ndarray::{Array4, Axis};

use crate::Rect;

pub fn make_border<I: GenericImageView>(
    image: &I,
    top: u32,
    bottom: u32,
    left: u32,
    right: u32,
    color: I::Pixel,
) -> ImageBuffer<I::Pixel, Vec<<I::Pixel as Pixel>::Subpixel>>
where
    I::Pixel: 'static,
    <I::Pixel as Pixel>::Subpixel: 'static,
{
    let (width, height) = image.dimensions();

    let mut new_image = ImageBuffer::new(width + left + right, height + top + bottom);

    for (x, y, pixel) in new_image.enumerate_pixels_mut() {
        if x < left || x >= width + left || y < top || y >= height + top {
            *pixel = color;
        } else {
            *pixel = image.get_pixel(x - left, y - top);
        }
    }
    new_image
}

/// Cuts `rect` out of the image (clamped to its bounds) and resizes it to `size` x `size`.
///
/// Returns the patch together with the source rectangle actually used.
pub fn crop_patch(image: &RgbImage, rect: &Rect, size: u32) -> Option<(RgbImage, Rect)> {
    let bounds = rect.clamp(image.width() as f32, image.height() as f32);
    let (x, y) = (bounds.x.floor() as u32, bounds.y.floor() as u32);
    let width = (bounds.width.round() as u32).min(image.width().saturating_sub(x));
    let height = (bounds.height.round() as u32).min(image.height().saturating_sub(y));
    if width == 0 || height == 0 {
        return None;
    }
    let patch = imageops::crop_imm(image, x, y, width, height).to_image();
    let source = Rect::at(x as f32, y as f32).with_size(width as f32, height as f32);
    Some((
        imageops::resize(&patch, size, size, FilterType::Triangle),
        source,
    ))
}

/// Converts an RGB image into a `1 x 3 x H x W` tensor, normalizing each
/// channel value with `normalize(channel, value)`.
pub fn to_nchw<F>(image: &RgbImage, normalize: F) -> Array4<f32>
where
    F: Fn(usize, u8) -> f32,
{
    let (width, height) = image.dimensions();
    ndarray::Array3::<f32>::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        normalize(c, image.get_pixel(x as u32, y as u32)[c])
    })
    .insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::gradient_image;
    use image::Rgb;

    #[test]
    fn make_border_pads_with_color() {
        let image = gradient_image(4, 4);
        let bordered = make_border(&image, 1, 2, 3, 0, Rgb([0, 255, 0]));
        assert_eq!(bordered.dimensions(), (7, 7));
        assert_eq!(bordered.get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(bordered.get_pixel(3, 1), image.get_pixel(0, 0));
    }

    #[test]
    fn crop_patch_clamps_to_image() {
        let image = gradient_image(50, 50);
        let (patch, source) =
            crop_patch(&image, &Rect::at(-10.0, 40.0).with_size(30.0, 30.0), 16).unwrap();
        assert_eq!(patch.dimensions(), (16, 16));
        assert_eq!(source.to_xywh(), (0.0, 40.0, 20.0, 10.0));
    }

    #[test]
    fn to_nchw_layout() {
        let image = gradient_image(3, 2);
        let tensor = to_nchw(&image, |_, value| value as f32);
        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        assert_eq!(tensor[[0, 1, 1, 2]], image.get_pixel(2, 1)[1] as f32);
    }
}
