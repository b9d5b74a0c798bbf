use itertools::iproduct;

use crate::Rect;

/// Anchor layout of an SSD head: one feature map per step, with square
/// anchors of each listed size (in input pixels) at every cell.
#[derive(Debug, Clone)]
pub struct PriorBoxesParams {
    min_sizes: Vec<Vec<usize>>,
    steps: Vec<usize>,
    variance: (f32, f32),
}

impl Default for PriorBoxesParams {
    fn default() -> Self {
        Self {
            min_sizes: vec![
                vec![20, 32],
                vec![48, 64],
                vec![96, 128],
                vec![192],
                vec![256],
                vec![384, 512],
            ],
            steps: vec![16, 32, 64, 128, 256, 512],
            variance: (0.1, 0.2),
        }
    }
}

/// Anchors as normalized `(cx, cy, width, height)`.
pub struct PriorBoxes {
    pub anchors: Vec<(f32, f32, f32, f32)>,
    variances: (f32, f32),
}

impl PriorBoxes {
    pub fn new(params: &PriorBoxesParams, image_size: (usize, usize)) -> Self {
        let feature_map_sizes: Vec<(usize, usize)> = params
            .steps
            .iter()
            .map(|&step| ((image_size.0 + step - 1) / step, (image_size.1 + step - 1) / step))
            .collect();

        let mut anchors = Vec::new();

        for ((f, min_sizes), step) in feature_map_sizes
            .iter()
            .zip(params.min_sizes.iter())
            .zip(params.steps.iter())
        {
            let step = *step;
            for (i, j) in iproduct!(0..f.1, 0..f.0) {
                for min_size in min_sizes {
                    let s_kx = *min_size as f32 / image_size.0 as f32;
                    let s_ky = *min_size as f32 / image_size.1 as f32;
                    let cx = (j as f32 + 0.5) * step as f32 / image_size.0 as f32;
                    let cy = (i as f32 + 0.5) * step as f32 / image_size.1 as f32;
                    anchors.push((cx, cy, s_kx, s_ky));
                }
            }
        }

        Self {
            anchors,
            variances: params.variance,
        }
    }

    #[cfg(test)]
    pub fn with_anchors(anchors: Vec<(f32, f32, f32, f32)>) -> Self {
        Self {
            anchors,
            variances: (0.1, 0.2),
        }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Decodes a `(dx, dy, dw, dh)` regression against its anchor into a
    /// normalized rectangle.
    pub fn decode_box(&self, prior: &(f32, f32, f32, f32), pred: &(f32, f32, f32, f32)) -> Rect {
        let (anchor_cx, anchor_cy, s_kx, s_ky) = prior;
        let (dx, dy, dw, dh) = pred;

        let cx = anchor_cx + dx * self.variances.0 * s_kx;
        let cy = anchor_cy + dy * self.variances.0 * s_ky;
        let width = s_kx * (dw * self.variances.1).exp();
        let height = s_ky * (dh * self.variances.1).exp();
        let x_start = cx - width / 2.0;
        let y_start = cy - height / 2.0;
        Rect::at(x_start, y_start).ending_at(width + x_start, height + y_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_follows_feature_maps() {
        let params = PriorBoxesParams {
            min_sizes: vec![vec![8, 16], vec![32]],
            steps: vec![8, 16],
            variance: (0.1, 0.2),
        };
        let priors = PriorBoxes::new(&params, (32, 32));
        assert_eq!(priors.len(), 4 * 4 * 2 + 2 * 2);
        assert_eq!(priors.anchors[0], (0.125, 0.125, 0.25, 0.25));
    }

    #[test]
    fn zero_regression_decodes_to_anchor() {
        let priors = PriorBoxes::new(&PriorBoxesParams::default(), (512, 512));
        let prior = (0.5, 0.5, 0.25, 0.25);
        let rect = priors.decode_box(&prior, &(0.0, 0.0, 0.0, 0.0));
        assert_eq!(rect.to_xywh(), (0.375, 0.375, 0.25, 0.25));
    }
}
