//! Tissue segmentation: threshold a downsampled slide rendering and
//! extract a two-level contour hierarchy of tissue regions and their
//! internal holes.
//!
//! Glass background has near-zero color saturation while stained tissue
//! is measurably saturated, so foreground extraction thresholds the HSV
//! saturation channel rather than luminance. The binary mask is cleaned
//! with a median blur (speckle) and a morphological closing (small
//! gaps), then Suzuki-Abe border following yields the contour
//! hierarchy. Retained contours are rescaled into level-0 coordinates;
//! an overlay at the segmentation level's native resolution is rendered
//! for visual inspection.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_line_segment_mut;
use imageproc::filter::median_filter;
use imageproc::morphology::close;

use crate::geometry::{area, scale_contour};
use crate::pyramid::ImagePyramid;
use crate::types::{Contour, PipelineError, Point, SegmentConfig, ThresholdPolicy, TissueRegion};

/// Overlay stroke thickness in pixels.
const STROKE_WIDTH: i32 = 3;
/// Overlay stroke for tissue contours.
const TISSUE_COLOR: Rgb<u8> = Rgb([69, 183, 135]);
/// Overlay stroke for hole contours.
const HOLE_COLOR: Rgb<u8> = Rgb([47, 144, 185]);
/// Overlay stroke for disease-region contours.
const DISEASE_COLOR: Rgb<u8> = Rgb([238, 63, 77]);

/// Output of tissue segmentation.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Retained tissue regions in level-0 coordinates.
    pub regions: Vec<TissueRegion>,
    /// Inspection overlay at the segmentation level's resolution, with
    /// tissue, hole, and disease contours drawn over the slide raster.
    pub overlay: RgbImage,
}

/// Segment the tissue-bearing foreground of a slide.
///
/// Reads the full raster at `config.level`, extracts tissue contours
/// and their holes, filters them by (downsample-adjusted) area and hole
/// count, and rescales the survivors to level-0 coordinates.
/// `disease_contours`, when given, are only drawn on the overlay --
/// they play no part in filtering.
///
/// An all-background raster yields zero regions and a fully saturated
/// one yields a single giant region; both are valid outputs.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-domain
/// parameters and [`PipelineError::Pyramid`] if `config.level` is not a
/// valid pyramid level or the raster cannot be read. Both config and
/// level are checked before any raster read.
pub fn segment_tissue(
    pyramid: &dyn ImagePyramid,
    config: &SegmentConfig,
    disease_contours: Option<&[Contour]>,
) -> Result<Segmentation, PipelineError> {
    config.validate()?;
    let dimensions = pyramid.level_dimensions(config.level)?;
    let downsample = pyramid.level_downsample(config.level)?;

    // Area thresholds arrive in level-0 units; contour areas are
    // measured in segmentation-level pixels.
    let min_tissue_area = config.min_tissue_area / (downsample * downsample);
    let min_hole_area = config.min_hole_area / (downsample * downsample);

    let rgb = pyramid.read_region(Point::new(0, 0), config.level, dimensions)?;

    let saturation = saturation_channel(&rgb);
    let blurred = median_filter(&saturation, config.median_radius, config.median_radius);
    let binary = match config.threshold {
        ThresholdPolicy::Fixed(level) => threshold(&blurred, level, ThresholdType::Binary),
        ThresholdPolicy::Otsu => {
            let level = otsu_level(&blurred);
            log::debug!("otsu selected saturation threshold {level}");
            threshold(&blurred, level, ThresholdType::Binary)
        }
    };
    let closed = close(&binary, Norm::LInf, config.close_radius);

    let raw = find_contours::<i32>(&closed);
    let regions = filter_contours(&raw, min_tissue_area, min_hole_area, config.max_holes_per_tissue);
    log::info!(
        "segmented {} tissue region(s) at level {} ({}x{}, downsample {downsample})",
        regions.len(),
        config.level,
        dimensions.width,
        dimensions.height,
    );

    let overlay = render_overlay(&rgb, &regions, disease_contours, downsample);

    // Lift everything into level-0 coordinates last; the overlay above
    // is drawn in segmentation-level space.
    let regions = regions
        .into_iter()
        .map(|region| TissueRegion {
            contour: scale_contour(&region.contour, downsample),
            holes: region
                .holes
                .iter()
                .map(|hole| scale_contour(hole, downsample))
                .collect(),
        })
        .collect();

    Ok(Segmentation { regions, overlay })
}

/// Extract the HSV saturation channel of an RGB raster.
///
/// `S = 255 * (max - min) / max`, with zero for black pixels.
fn saturation_channel(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max == 0 {
            image::Luma([0])
        } else {
            let spread = u32::from(max - min);
            #[allow(clippy::cast_possible_truncation)]
            image::Luma([(spread * 255 / u32::from(max)) as u8])
        }
    })
}

/// Apply the two-level hierarchy filter to raw border-following output.
///
/// Tissue candidates are the top-level outer contours; their direct
/// children are hole candidates. A candidate survives if its true area
/// (outer minus all direct holes) is positive and strictly above the
/// minimum. Surviving regions keep at most `max_holes` holes -- the
/// largest by area -- and of those only the ones strictly above the
/// hole minimum.
fn filter_contours(
    raw: &[imageproc::contours::Contour<i32>],
    min_tissue_area: f64,
    min_hole_area: f64,
    max_holes: usize,
) -> Vec<TissueRegion> {
    let mut regions = Vec::new();
    for (index, candidate) in raw.iter().enumerate() {
        if candidate.border_type != BorderType::Outer || candidate.parent.is_some() {
            continue;
        }
        let outer = to_contour(&candidate.points);
        let outer_area = area(&outer);
        if outer_area <= 0.0 {
            continue;
        }

        let holes: Vec<Contour> = raw
            .iter()
            .filter(|c| c.parent == Some(index))
            .map(|c| to_contour(&c.points))
            .collect();

        let true_area = outer_area - holes.iter().map(area).sum::<f64>();
        if true_area <= 0.0 || true_area <= min_tissue_area {
            continue;
        }

        // Cap to the largest holes first, then area-filter what is left.
        let mut holes = holes;
        holes.sort_by(|a, b| area(b).total_cmp(&area(a)));
        holes.truncate(max_holes);
        holes.retain(|hole| area(hole) > min_hole_area);

        regions.push(TissueRegion {
            contour: outer,
            holes,
        });
    }
    regions
}

fn to_contour(points: &[imageproc::point::Point<i32>]) -> Contour {
    Contour::new(
        points
            .iter()
            .map(|p| Point::new(i64::from(p.x), i64::from(p.y)))
            .collect(),
    )
}

/// Draw tissue, hole, and disease contours over the slide raster.
///
/// Disease contours are supplied in level-0 coordinates and projected
/// down by the reciprocal downsample for display.
fn render_overlay(
    rgb: &RgbImage,
    regions: &[TissueRegion],
    disease_contours: Option<&[Contour]>,
    downsample: f64,
) -> RgbImage {
    let mut overlay = rgb.clone();
    for region in regions {
        draw_contour(&mut overlay, &region.contour, TISSUE_COLOR);
        for hole in &region.holes {
            draw_contour(&mut overlay, hole, HOLE_COLOR);
        }
    }
    if let Some(contours) = disease_contours {
        for contour in contours {
            let projected = scale_contour(contour, 1.0 / downsample);
            draw_contour(&mut overlay, &projected, DISEASE_COLOR);
        }
    }
    overlay
}

/// Stroke a closed contour as line segments between consecutive
/// vertices, [`STROKE_WIDTH`] pixels wide.
#[allow(clippy::cast_precision_loss)]
fn draw_contour(canvas: &mut RgbImage, contour: &Contour, color: Rgb<u8>) {
    let points = contour.points();
    if points.len() < 2 {
        return;
    }
    for window in points.windows(2) {
        draw_thick_segment(
            canvas,
            (window[0].x as f32, window[0].y as f32),
            (window[1].x as f32, window[1].y as f32),
            color,
        );
    }
    // Closing edge back to the first vertex.
    if let (Some(last), Some(first)) = (points.last(), points.first()) {
        draw_thick_segment(
            canvas,
            (last.x as f32, last.y as f32),
            (first.x as f32, first.y as f32),
            color,
        );
    }
}

/// Draw one segment with a visible stroke: the 1-px line plus parallel
/// offsets on both axes, covering both shallow and steep slopes.
#[allow(clippy::cast_precision_loss)]
fn draw_thick_segment(
    canvas: &mut RgbImage,
    start: (f32, f32),
    end: (f32, f32),
    color: Rgb<u8>,
) {
    let reach = STROKE_WIDTH / 2;
    for offset in -reach..=reach {
        let o = offset as f32;
        draw_line_segment_mut(canvas, (start.0 + o, start.1), (end.0 + o, end.1), color);
        draw_line_segment_mut(canvas, (start.0, start.1 + o), (end.0, end.1 + o), color);
    }
}
