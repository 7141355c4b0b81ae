//! Patch sampling: generate a filtered, labeled coordinate grid inside
//! each tissue region.
//!
//! All coordinate arithmetic happens in level-0 space: patch and step
//! sizes arrive in patch-level pixels and are scaled up by that level's
//! downsample factor first, matching the contour coordinate space. The
//! per-candidate filter is a pure function of immutable inputs, so the
//! grid can be evaluated by a rayon pool or strictly sequentially with
//! bit-identical results; indexed parallel collection keeps records in
//! grid-generation (x-major) order either way.

use rayon::prelude::*;

use crate::dataset::Dataset;
use crate::geometry::{BoundingRect, PreparedContour, bounding_rect};
use crate::predicate::ContainmentRule;
use crate::pyramid::ImagePyramid;
use crate::types::{Contour, PatchRecord, PipelineError, Point, SampleConfig, TissueRegion};

/// Sample labeled patch coordinates from every tissue region.
///
/// `disease_contours`, when given, must be in level-0 coordinates; a
/// patch is labeled 1 iff any of its four corners or its center falls
/// inside-or-on-boundary one of them. Without disease contours every
/// label is 0.
///
/// A region whose bounding rectangle has zero width or height yields an
/// empty record list, not an error.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-domain
/// parameters (checked before any grid generation),
/// [`PipelineError::Pyramid`] for an invalid patch level,
/// [`PipelineError::MalformedContour`] if a region, hole, or disease
/// contour cannot bound an area, and [`PipelineError::WorkerPool`] if
/// the parallel pool cannot be built.
pub fn sample_patches(
    pyramid: &dyn ImagePyramid,
    regions: &[TissueRegion],
    disease_contours: Option<&[Contour]>,
    config: &SampleConfig,
) -> Result<Dataset, PipelineError> {
    config.validate()?;
    let downsample = pyramid.level_downsample(config.patch_level)?;
    let full_extent = full_extent(pyramid)?;

    // Patch-level units -> level-0 units.
    #[allow(clippy::cast_possible_truncation)]
    let ref_patch = (
        (f64::from(config.patch_size.0) * downsample) as i64,
        (f64::from(config.patch_size.1) * downsample) as i64,
    );
    #[allow(clippy::cast_possible_truncation)]
    let ref_step = (
        (f64::from(config.step_size.0) * downsample) as i64,
        (f64::from(config.step_size.1) * downsample) as i64,
    );

    // Geometry shared by every region: prepared once, read-only after.
    let disease: Vec<PreparedContour> = disease_contours
        .unwrap_or_default()
        .iter()
        .map(PreparedContour::new)
        .collect::<Result<_, _>>()?;

    let pool = worker_pool(config.workers)?;

    let mut dataset = Dataset::new();
    for (region_id, region) in regions.iter().enumerate() {
        let rect = if region.contour.is_empty() {
            full_extent
        } else {
            // Non-empty contour always has a bounding rectangle.
            match bounding_rect(&region.contour) {
                Some(rect) => rect,
                None => continue,
            }
        };
        if rect.width == 0 || rect.height == 0 {
            log::debug!("region {region_id}: degenerate bounding rectangle, no candidates");
            dataset.insert(region_id, Vec::new());
            continue;
        }

        let rule = ContainmentRule::new(config.rule, &region.contour, ref_patch, config.corner_shift)?;
        let holes: Vec<PreparedContour> = region
            .holes
            .iter()
            .map(PreparedContour::new)
            .collect::<Result<_, _>>()?;

        let candidates = candidate_grid(rect, ref_step);
        let filter = CandidateFilter {
            rule: &rule,
            holes: &holes,
            disease: &disease,
            ref_patch,
        };

        let records: Vec<Option<PatchRecord>> = match pool {
            Some(ref pool) => pool.install(|| {
                candidates
                    .par_iter()
                    .map(|&anchor| filter.evaluate(anchor))
                    .collect()
            }),
            // Sequential fallback: same pure function, same order.
            None => candidates
                .iter()
                .map(|&anchor| filter.evaluate(anchor))
                .collect(),
        };
        let records: Vec<PatchRecord> = records.into_iter().flatten().collect();

        log::info!(
            "region {region_id}: {} of {} candidates retained",
            records.len(),
            candidates.len(),
        );
        dataset.insert(region_id, records);
    }
    Ok(dataset)
}

/// The per-candidate filter-and-label function.
///
/// Reads only immutable geometry; evaluating a candidate has no
/// dependency on any other candidate.
struct CandidateFilter<'a> {
    rule: &'a ContainmentRule,
    holes: &'a [PreparedContour],
    disease: &'a [PreparedContour],
    ref_patch: (i64, i64),
}

impl CandidateFilter<'_> {
    fn evaluate(&self, anchor: Point) -> Option<PatchRecord> {
        if !self.rule.accepts(anchor) {
            return None;
        }
        // Hole exclusion is boundary-exclusive: only a strictly
        // interior center rejects, so boundary-adjacent tissue survives.
        let center = anchor.offset(self.ref_patch.0 / 2, self.ref_patch.1 / 2);
        if self.holes.iter().any(|hole| hole.contains_strict(center)) {
            return None;
        }
        Some(PatchRecord {
            coordinate: anchor,
            label: self.label(anchor, center),
        })
    }

    /// Boundary-inclusive five-point disease test: the patch's four
    /// corners and its center.
    fn label(&self, anchor: Point, center: Point) -> u8 {
        if self.disease.is_empty() {
            return 0;
        }
        let (w, h) = self.ref_patch;
        let samples = [
            anchor,
            anchor.offset(w, 0),
            anchor.offset(0, h),
            anchor.offset(w, h),
            center,
        ];
        let hit = self
            .disease
            .iter()
            .any(|contour| samples.iter().any(|&p| contour.contains_inclusive(p)));
        u8::from(hit)
    }
}

/// Materialize the candidate grid over `rect` in x-major order: the x
/// coordinate varies slowest, striding to the exclusive end.
fn candidate_grid(rect: BoundingRect, step: (i64, i64)) -> Vec<Point> {
    let mut candidates = Vec::new();
    let mut x = rect.x;
    while x < rect.x + rect.width {
        let mut y = rect.y;
        while y < rect.y + rect.height {
            candidates.push(Point::new(x, y));
            y += step.1;
        }
        x += step.0;
    }
    candidates
}

/// Build the worker pool, or `None` for the sequential path.
///
/// The requested count is capped to the available hardware concurrency.
fn worker_pool(workers: usize) -> Result<Option<rayon::ThreadPool>, PipelineError> {
    if workers == 0 {
        return Ok(None);
    }
    let hardware = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.min(hardware))
        .build()
        .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;
    Ok(Some(pool))
}

/// Level-0 extent of the slide, the grid fallback for whole-slide
/// sampling when a region carries the empty-contour sentinel.
fn full_extent(pyramid: &dyn ImagePyramid) -> Result<BoundingRect, PipelineError> {
    let dimensions = pyramid.level_dimensions(0)?;
    Ok(BoundingRect {
        x: 0,
        y: 0,
        width: i64::from(dimensions.width),
        height: i64::from(dimensions.height),
    })
}
