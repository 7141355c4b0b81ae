//! microtome-pipeline: tissue segmentation and patch sampling core (sans-IO).
//!
//! Extracts labeled patch coordinates from gigapixel pathology slides:
//! saturation thresholding -> contour hierarchy (tissue regions and
//! their holes) -> level-0 rescaling -> per-region candidate grids ->
//! parallel containment filtering and disease labeling -> flat
//! coordinate/label dataset.
//!
//! This crate has **no I/O dependencies** -- slides are read through
//! the [`ImagePyramid`] trait and results are returned as structured
//! data. Slide decoding, annotation parsing, and dataset persistence
//! live in `microtome-io`.

pub mod dataset;
pub mod geometry;
pub mod predicate;
pub mod pyramid;
pub mod sampler;
pub mod segment;
pub mod types;

#[cfg(test)]
mod testutil;

pub use dataset::Dataset;
pub use predicate::{ContainmentRule, ContainmentRuleKind};
pub use pyramid::{ImagePyramid, PyramidError};
pub use sampler::sample_patches;
pub use segment::{Segmentation, segment_tissue};
pub use types::{
    Contour, Dimensions, PatchRecord, PipelineError, Point, RgbImage, SampleConfig, SegmentConfig,
    ThresholdPolicy, TissueRegion,
};

/// Result of running segmentation and sampling on one slide.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    /// Retained tissue regions in level-0 coordinates.
    pub regions: Vec<TissueRegion>,
    /// Segmentation inspection overlay at the segmentation level's
    /// resolution.
    pub overlay: RgbImage,
    /// Labeled patch records per region.
    pub dataset: Dataset,
}

/// Run the full extraction pipeline on one slide.
///
/// Segments the tissue foreground at `segment_config.level`, then
/// samples a labeled patch grid inside every retained region.
/// `disease_contours` (level-0 coordinates) drive both the overlay
/// rendering and the patch labels; without them every label is 0.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-domain
/// parameters, [`PipelineError::Pyramid`] for invalid levels or an
/// unreadable source, and the sampler's errors for malformed geometry.
/// Zero tissue regions is a valid outcome: the dataset is simply empty.
pub fn extract_patches(
    pyramid: &dyn ImagePyramid,
    disease_contours: Option<&[Contour]>,
    segment_config: &SegmentConfig,
    sample_config: &SampleConfig,
) -> Result<ExtractResult, PipelineError> {
    let segmentation = segment_tissue(pyramid, segment_config, disease_contours)?;
    let dataset = sample_patches(
        pyramid,
        &segmentation.regions,
        disease_contours,
        sample_config,
    )?;
    Ok(ExtractResult {
        regions: segmentation.regions,
        overlay: segmentation.overlay,
        dataset,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testutil::InMemoryPyramid;
    use image::Rgb;

    const TISSUE: Rgb<u8> = Rgb([200, 40, 40]);
    const GLASS: Rgb<u8> = Rgb([255, 255, 255]);

    /// 200x200 slide: 100x100 tissue block at (40, 40) with a 30x30
    /// hole at (80, 80).
    fn slide() -> InMemoryPyramid {
        let mut img = image::RgbImage::from_pixel(200, 200, GLASS);
        for y in 40..140 {
            for x in 40..140 {
                img.put_pixel(x, y, TISSUE);
            }
        }
        for y in 80..110 {
            for x in 80..110 {
                img.put_pixel(x, y, GLASS);
            }
        }
        InMemoryPyramid::single_level(img)
    }

    fn configs() -> (SegmentConfig, SampleConfig) {
        let segment = SegmentConfig {
            level: 0,
            threshold: ThresholdPolicy::Fixed(8),
            min_tissue_area: 100.0,
            min_hole_area: 4.0,
            max_holes_per_tissue: 8,
            median_radius: 1,
            close_radius: 1,
        };
        let sample = SampleConfig {
            patch_level: 0,
            patch_size: (10, 10),
            step_size: (10, 10),
            rule: ContainmentRuleKind::Center,
            corner_shift: 0.5,
            workers: 0,
        };
        (segment, sample)
    }

    #[test]
    fn end_to_end_without_annotations() {
        let (segment, sample) = configs();
        let result = extract_patches(&slide(), None, &segment, &sample).unwrap();

        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].holes.len(), 1);

        let (coordinates, labels) = result.dataset.flatten();
        assert_eq!(coordinates.len(), labels.len());
        assert!(!coordinates.is_empty());
        assert!(labels.iter().all(|&l| l == 0));

        // No patch center falls strictly inside the hole.
        for c in &coordinates {
            let center = (c.x + 5, c.y + 5);
            assert!(
                !(80 < center.0 && center.0 < 110 && 80 < center.1 && center.1 < 110),
                "patch at {c:?} has its center inside the hole",
            );
        }
    }

    #[test]
    fn end_to_end_with_annotations_labels_patches() {
        let (segment, sample) = configs();
        // Disease region inside the tissue block, clear of the hole.
        let disease = vec![Contour::new(vec![
            Point::new(45, 45),
            Point::new(70, 45),
            Point::new(70, 70),
            Point::new(45, 70),
        ])];
        let result = extract_patches(&slide(), Some(&disease), &segment, &sample).unwrap();

        let (_, labels) = result.dataset.flatten();
        let positives = labels.iter().filter(|&&l| l == 1).count();
        assert!(positives > 0, "expected some disease-labeled patches");
        assert!(
            positives < labels.len(),
            "expected some healthy patches too",
        );
    }

    #[test]
    fn empty_slide_yields_empty_dataset() {
        let (segment, sample) = configs();
        let glass = InMemoryPyramid::single_level(image::RgbImage::from_pixel(64, 64, GLASS));
        let result = extract_patches(&glass, None, &segment, &sample).unwrap();
        assert!(result.regions.is_empty());
        assert!(result.dataset.is_empty());
    }

    #[test]
    fn config_errors_fail_fast() {
        let (segment, sample) = configs();
        let bad_sample = SampleConfig {
            corner_shift: 2.0,
            ..sample
        };
        assert!(matches!(
            extract_patches(&slide(), None, &segment, &bad_sample),
            Err(PipelineError::InvalidConfig(_)),
        ));
    }
}
