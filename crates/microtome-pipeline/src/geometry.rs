//! Geometry primitives: contour area, bounding rectangles, and the
//! three-way point-in-polygon test.
//!
//! Containment distinguishes boundary points from interior points
//! because the two patch filters disagree on polarity: inclusion checks
//! (tissue membership, disease labeling) treat a boundary hit as
//! positive, while the hole-exclusion check rejects only strictly
//! interior centers. Callers pick the polarity via
//! [`PreparedContour::contains_inclusive`] and
//! [`PreparedContour::contains_strict`].

use geo::{Area, Contains, Coord, Intersects, LineString, Polygon};

use crate::types::{Contour, PipelineError, Point};

/// Result of testing a point against a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Strictly inside the contour.
    Inside,
    /// On the contour boundary.
    OnBoundary,
    /// Outside the contour.
    Outside,
}

/// Axis-aligned bounding rectangle of a contour.
///
/// `width` and `height` are `max - min`, so `x + width` is an exclusive
/// end: striding from `x` to `x + width` never emits an anchor past the
/// last vertex column. A single-point contour has zero extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingRect {
    /// Left edge.
    pub x: i64,
    /// Top edge.
    pub y: i64,
    /// Horizontal extent (exclusive end at `x + width`).
    pub width: i64,
    /// Vertical extent (exclusive end at `y + height`).
    pub height: i64,
}

/// Absolute polygon area of a contour, in squared pixels of whatever
/// level the contour is expressed at.
///
/// Contours with fewer than three vertices have zero area.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn area(contour: &Contour) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }
    to_polygon(contour).unsigned_area()
}

/// Axis-aligned bounding rectangle, or `None` for an empty contour.
#[must_use]
pub fn bounding_rect(contour: &Contour) -> Option<BoundingRect> {
    let first = contour.points().first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in contour.points() {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingRect {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    })
}

/// Three-way point-in-polygon test over a bare contour.
///
/// Convenience form of [`PreparedContour::containment`] for one-shot
/// tests; hot paths should prepare the contour once instead.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedContour`] if the contour has fewer
/// than three vertices.
pub fn point_polygon_test(contour: &Contour, point: Point) -> Result<Containment, PipelineError> {
    Ok(PreparedContour::new(contour)?.containment(point))
}

/// A contour converted once into a float polygon so that repeated
/// containment tests skip the conversion.
///
/// Constructed per tissue region (and per hole / disease contour) by
/// the patch sampler, then queried for every grid candidate.
#[derive(Debug, Clone)]
pub struct PreparedContour {
    polygon: Polygon<f64>,
}

impl PreparedContour {
    /// Prepare a contour for repeated containment tests.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedContour`] if the contour has
    /// fewer than three vertices.
    pub fn new(contour: &Contour) -> Result<Self, PipelineError> {
        if contour.len() < 3 {
            return Err(PipelineError::MalformedContour {
                points: contour.len(),
            });
        }
        Ok(Self {
            polygon: to_polygon(contour),
        })
    }

    /// Three-way containment of `point`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn containment(&self, point: Point) -> Containment {
        let p = geo::Point::new(point.x as f64, point.y as f64);
        if self.polygon.contains(&p) {
            Containment::Inside
        } else if self.polygon.exterior().intersects(&p) {
            Containment::OnBoundary
        } else {
            Containment::Outside
        }
    }

    /// Inside-or-on-boundary: the polarity used by inclusion checks
    /// (tissue membership, disease labeling).
    #[must_use]
    pub fn contains_inclusive(&self, point: Point) -> bool {
        !matches!(self.containment(point), Containment::Outside)
    }

    /// Strictly inside: the polarity used by the hole-exclusion check,
    /// so boundary-adjacent tissue is not over-excluded.
    #[must_use]
    pub fn contains_strict(&self, point: Point) -> bool {
        matches!(self.containment(point), Containment::Inside)
    }
}

/// Rescale a contour's coordinates by `factor`, truncating toward zero.
///
/// Used to lift contours from the segmentation level into level-0
/// coordinates (factor = downsample) and to project level-0 contours
/// down for overlay rendering (factor = 1 / downsample). Round-tripping
/// through a factor and its reciprocal lands within one pixel of the
/// original coordinates.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn scale_contour(contour: &Contour, factor: f64) -> Contour {
    Contour::new(
        contour
            .points()
            .iter()
            .map(|p| Point::new((p.x as f64 * factor) as i64, (p.y as f64 * factor) as i64))
            .collect(),
    )
}

#[allow(clippy::cast_precision_loss)]
fn to_polygon(contour: &Contour) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = contour
        .points()
        .iter()
        .map(|p| Coord {
            x: p.x as f64,
            y: p.y as f64,
        })
        .collect();
    Polygon::new(LineString::new(coords), vec![])
}
