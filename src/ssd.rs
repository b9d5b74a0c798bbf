use image::{
    imageops::{self, FilterType},
    GenericImageView, ImageBuffer, Pixel, Rgb, RgbImage,
};
use ndarray::{ArrayView2, Axis};
use ort::tensor::{FromArray, OrtOwnedTensor};

use crate::{
    detection::{DetectionParams, FaceOverlayError, FaceOverlayResult, FaceRegion},
    imaging::{make_border, to_nchw},
    priorboxes::{PriorBoxes, PriorBoxesParams},
};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// Downscales `image` to fit `output_size` and pads the right and bottom
/// edges to exactly that size. Returns the padded image and the scale ratio.
fn resize_and_border<I: GenericImageView>(
    image: &I,
    output_size: (u32, u32),
    border_color: I::Pixel,
) -> (Image<I::Pixel>, f32)
where
    I::Pixel: 'static,
    <I::Pixel as Pixel>::Subpixel: 'static,
{
    let (input_width, input_height) = image.dimensions();
    let (output_width, output_height) = output_size;
    let ratio = (output_width as f32 / input_width as f32)
        .min(output_height as f32 / input_height as f32)
        .min(1.0); // avoid scaling up.

    let (resize_width, resize_height) = (
        ((input_width as f32 * ratio).round() as u32).clamp(1, output_width),
        ((input_height as f32 * ratio).round() as u32).clamp(1, output_height),
    );
    let resized = imageops::resize(image, resize_width, resize_height, FilterType::Triangle);

    (
        make_border(
            &resized,
            0,
            output_height - resize_height,
            0,
            output_width - resize_width,
            border_color,
        ),
        ratio,
    )
}

/// Turns raw SSD outputs into face regions in input-image pixels.
///
/// `boxes` holds one `(dx, dy, dw, dh)` row per anchor, `scores` one
/// `(background, face)` row per anchor. `scale` maps normalized coordinates
/// back to the source image.
fn decode_detections(
    priors: &PriorBoxes,
    boxes: ArrayView2<f32>,
    scores: ArrayView2<f32>,
    params: &DetectionParams,
    scale: (f32, f32),
) -> Vec<FaceRegion> {
    let candidates = priors
        .anchors
        .iter()
        .zip(boxes.axis_iter(Axis(0)))
        .zip(scores.axis_iter(Axis(0)))
        .filter_map(|((prior, pred), score)| {
            let score = score[1];
            if score > params.score_threshold {
                let rect = priors
                    .decode_box(prior, &(pred[0], pred[1], pred[2], pred[3]))
                    .scale(scale.0, scale.1);
                Some(FaceRegion { rect, score })
            } else {
                None
            }
        })
        .collect();

    let mut faces = params.nms.suppress_non_maxima(candidates);
    faces.truncate(params.max_faces);
    faces
}

/// SSD MobileNet V1 face detector.
pub struct SsdDetector {
    session: ort::Session,
    params: DetectionParams,
    target_size: u32,
    prior_boxes_params: PriorBoxesParams,
}

impl SsdDetector {
    pub fn new(session: ort::Session, params: DetectionParams) -> Self {
        Self {
            session,
            params,
            target_size: 512,
            prior_boxes_params: PriorBoxesParams::default(),
        }
    }

    pub fn detect(&self, image: &RgbImage) -> FaceOverlayResult<Vec<FaceRegion>> {
        let (padded, ratio) = resize_and_border(
            image,
            (self.target_size, self.target_size),
            Rgb([0, 0, 0]),
        );
        let (input_width, input_height) = padded.dimensions();
        let input = to_nchw(&padded, |_, value| value as f32 / 127.5 - 1.0);

        let output_tensors = self
            .session
            .run(vec![ort::tensor::InputTensor::from_array(input.into_dyn())])?;

        let boxes: OrtOwnedTensor<f32, _> = output_tensors[0].try_extract()?;
        let scores: OrtOwnedTensor<f32, _> = output_tensors[1].try_extract()?;

        let priors = PriorBoxes::new(
            &self.prior_boxes_params,
            (input_width as usize, input_height as usize),
        );
        let num_boxes = priors.len();
        let shape_error =
            |e: ndarray::ShapeError| FaceOverlayError::Inference(format!("unexpected SSD output: {e}"));
        let boxes = boxes.view().to_shape((num_boxes, 4)).map_err(shape_error)?.to_owned();
        let scores = scores.view().to_shape((num_boxes, 2)).map_err(shape_error)?.to_owned();

        let scale = (input_width as f32 / ratio, input_height as f32 / ratio);
        Ok(decode_detections(
            &priors,
            boxes.view(),
            scores.view(),
            &self.params,
            scale,
        ))
    }
}
