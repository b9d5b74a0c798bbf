use std::collections::HashMap;

use crate::FaceRegion;

/// Non-maximum suppression.
#[derive(Copy, Clone, Debug)]
pub struct Nms {
    pub iou_threshold: f32,
}

impl Default for Nms {
    fn default() -> Self {
        Self { iou_threshold: 0.3 }
    }
}

impl Nms {
    /// Suppress non-maxima regions.
    ///
    /// # Arguments
    ///
    /// * `regions` - Regions to suppress.
    ///
    /// # Returns
    ///
    /// * `Vec<FaceRegion>` - Surviving regions, highest score first.
    pub fn suppress_non_maxima(&self, mut regions: Vec<FaceRegion>) -> Vec<FaceRegion> {
        regions.sort_by(|a, b| a.score.total_cmp(&b.score));

        let mut regions_map = HashMap::new();
        regions.iter().rev().enumerate().for_each(|(i, region)| {
            regions_map.insert(i, region);
        });

        let mut kept = Vec::with_capacity(regions.len());
        let mut count = 0;
        while !regions_map.is_empty() {
            if let Some((_, region)) = regions_map.remove_entry(&count) {
                kept.push(region.clone());
                regions_map.retain(|_, other| region.rect.iou(&other.rect) < self.iou_threshold);
            }
            count += 1;
        }

        kept
    }
}
