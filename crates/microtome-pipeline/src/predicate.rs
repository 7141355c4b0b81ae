//! Containment predicates: does a candidate anchor's patch belong to a
//! tissue contour?
//!
//! Four interchangeable rules, selected by [`ContainmentRuleKind`] and
//! dispatched by a single match -- the variant set is closed, so no
//! trait objects. A [`ContainmentRule`] is constructed once per tissue
//! region (it closes over the region's contour, the level-0 patch size,
//! and the corner-shift fraction) and then invoked for every grid
//! candidate.

use serde::{Deserialize, Serialize};

use crate::geometry::PreparedContour;
use crate::types::{Contour, PipelineError, Point};

/// Selects which containment rule decides patch membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainmentRuleKind {
    /// The anchor point itself must be inside-or-on-boundary.
    LeftTop,
    /// The patch center (anchor + half patch size) must be
    /// inside-or-on-boundary.
    Center,
    /// At least one of five points -- the center and four diagonal
    /// offsets from it -- must be inside-or-on-boundary. The permissive
    /// default.
    #[default]
    AnyOfFive,
    /// All four diagonal offset points (center excluded) must be
    /// inside-or-on-boundary. The strict variant.
    AllFour,
}

/// A containment rule bound to one tissue contour.
#[derive(Debug, Clone)]
pub struct ContainmentRule {
    kind: ContainmentRuleKind,
    /// `None` for the whole-slide sentinel (empty contour): every
    /// anchor is accepted.
    contour: Option<PreparedContour>,
    half: (i64, i64),
    shift: (i64, i64),
}

impl ContainmentRule {
    /// Bind a rule to a contour.
    ///
    /// `patch_size` is in level-0 pixels, matching the contour's
    /// coordinate space. `corner_shift` is the fraction of the half
    /// patch size the four diagonal test points are offset from the
    /// center; when it truncates to zero pixels on either axis, both
    /// multi-point rules degrade to a pure center test.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedContour`] if the contour is
    /// non-empty but has fewer than three vertices.
    pub fn new(
        kind: ContainmentRuleKind,
        contour: &Contour,
        patch_size: (i64, i64),
        corner_shift: f64,
    ) -> Result<Self, PipelineError> {
        let prepared = if contour.is_empty() {
            None
        } else {
            Some(PreparedContour::new(contour)?)
        };
        let half = (patch_size.0 / 2, patch_size.1 / 2);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let shift = (
            (half.0 as f64 * corner_shift) as i64,
            (half.1 as f64 * corner_shift) as i64,
        );
        Ok(Self {
            kind,
            contour: prepared,
            half,
            shift,
        })
    }

    /// Whether the patch anchored at `anchor` counts as inside the
    /// bound contour.
    #[must_use]
    pub fn accepts(&self, anchor: Point) -> bool {
        let Some(ref contour) = self.contour else {
            return true;
        };
        let center = anchor.offset(self.half.0, self.half.1);
        match self.kind {
            ContainmentRuleKind::LeftTop => contour.contains_inclusive(anchor),
            ContainmentRuleKind::Center => contour.contains_inclusive(center),
            ContainmentRuleKind::AnyOfFive => {
                if self.shift.0 > 0 && self.shift.1 > 0 {
                    self.corner_points(center)
                        .into_iter()
                        .chain(std::iter::once(center))
                        .any(|p| contour.contains_inclusive(p))
                } else {
                    contour.contains_inclusive(center)
                }
            }
            ContainmentRuleKind::AllFour => {
                if self.shift.0 > 0 && self.shift.1 > 0 {
                    self.corner_points(center)
                        .into_iter()
                        .all(|p| contour.contains_inclusive(p))
                } else {
                    contour.contains_inclusive(center)
                }
            }
        }
    }

    /// The four diagonal test points around `center`.
    const fn corner_points(&self, center: Point) -> [Point; 4] {
        let (sx, sy) = self.shift;
        [
            center.offset(-sx, -sy),
            center.offset(sx, sy),
            center.offset(sx, -sy),
            center.offset(-sx, sy),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square(x0: i64, y0: i64, x1: i64, y1: i64) -> Contour {
        Contour::new(vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    const PATCH: (i64, i64) = (10, 10);

    fn rule(kind: ContainmentRuleKind, contour: &Contour) -> ContainmentRule {
        ContainmentRule::new(kind, contour, PATCH, 0.5).unwrap()
    }

    #[test]
    fn default_is_any_of_five() {
        assert_eq!(ContainmentRuleKind::default(), ContainmentRuleKind::AnyOfFive);
    }

    #[test]
    fn left_top_accepts_boundary_anchor() {
        let contour = square(0, 0, 100, 100);
        let lt = rule(ContainmentRuleKind::LeftTop, &contour);
        assert!(lt.accepts(Point::new(0, 0)));
        assert!(lt.accepts(Point::new(100, 100)));
        assert!(!lt.accepts(Point::new(101, 50)));
    }

    #[test]
    fn center_tests_anchor_plus_half() {
        let contour = square(0, 0, 100, 100);
        let center = rule(ContainmentRuleKind::Center, &contour);
        // Anchor outside, center (anchor + 5) inside.
        assert!(center.accepts(Point::new(-5, -5)));
        // Center at 105 is outside.
        assert!(!center.accepts(Point::new(100, 100)));
    }

    #[test]
    fn any_of_five_is_more_permissive_than_all_four() {
        let contour = square(0, 0, 30, 30);
        let easy = rule(ContainmentRuleKind::AnyOfFive, &contour);
        let hard = rule(ContainmentRuleKind::AllFour, &contour);
        for x in -20..50 {
            for y in -20..50 {
                let anchor = Point::new(x, y);
                if hard.accepts(anchor) {
                    assert!(
                        easy.accepts(anchor),
                        "all-four accepted ({x}, {y}) but any-of-five rejected it",
                    );
                }
            }
        }
    }

    #[test]
    fn all_four_rejects_straddling_patch() {
        let contour = square(0, 0, 100, 100);
        let hard = rule(ContainmentRuleKind::AllFour, &contour);
        // Anchor at (-4, -4): center (1, 1), corners at (-1, -1) .. (3, 3).
        // The (-1, -1) corner is outside, so all-four rejects.
        assert!(!hard.accepts(Point::new(-4, -4)));
        let easy = rule(ContainmentRuleKind::AnyOfFive, &contour);
        assert!(easy.accepts(Point::new(-4, -4)));
    }

    #[test]
    fn zero_shift_degrades_to_center_test() {
        let contour = square(0, 0, 100, 100);
        let easy = ContainmentRule::new(ContainmentRuleKind::AnyOfFive, &contour, PATCH, 0.0)
            .unwrap();
        let hard = ContainmentRule::new(ContainmentRuleKind::AllFour, &contour, PATCH, 0.0)
            .unwrap();
        let center = rule(ContainmentRuleKind::Center, &contour);
        for anchor in [Point::new(-5, -5), Point::new(50, 50), Point::new(96, 96)] {
            assert_eq!(easy.accepts(anchor), center.accepts(anchor));
            assert_eq!(hard.accepts(anchor), center.accepts(anchor));
        }
    }

    #[test]
    fn shift_converges_rules_toward_center() {
        // As the corner shift shrinks, all-four and any-of-five both
        // approach the center-only rule.
        let contour = square(0, 0, 40, 40);
        let center = rule(ContainmentRuleKind::Center, &contour);
        let tight = ContainmentRule::new(ContainmentRuleKind::AllFour, &contour, PATCH, 0.19)
            .unwrap();
        // 0.19 * 5 truncates to 0 pixels: identical to center.
        for x in -10..55 {
            for y in -10..55 {
                let anchor = Point::new(x, y);
                assert_eq!(tight.accepts(anchor), center.accepts(anchor));
            }
        }
    }

    #[test]
    fn empty_contour_accepts_everything() {
        let whole = Contour::new(vec![]);
        for kind in [
            ContainmentRuleKind::LeftTop,
            ContainmentRuleKind::Center,
            ContainmentRuleKind::AnyOfFive,
            ContainmentRuleKind::AllFour,
        ] {
            let r = ContainmentRule::new(kind, &whole, PATCH, 0.5).unwrap();
            assert!(r.accepts(Point::new(-1_000_000, 42)));
        }
    }

    #[test]
    fn malformed_contour_fails_construction() {
        let line = Contour::new(vec![Point::new(0, 0), Point::new(5, 5)]);
        assert!(matches!(
            ContainmentRule::new(ContainmentRuleKind::Center, &line, PATCH, 0.5),
            Err(PipelineError::MalformedContour { points: 2 }),
        ));
    }
}
