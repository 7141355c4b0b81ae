//! Disease-region annotation parsing.
//!
//! Reads ASAP-style annotation XML: `Annotation` elements holding
//! `Coordinate` elements with float `X`/`Y` attributes, one closed
//! polygon per annotation, in level-0 slide coordinates. Contours are
//! returned sorted by descending area -- display priority for overlay
//! rendering; consumers must not rely on the order for correctness.

use std::path::Path;

use microtome_pipeline::geometry;
use microtome_pipeline::types::{Contour, Point};

/// Errors loading an annotation file.
#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    /// The annotation file could not be read.
    #[error("failed to read annotation file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not well-formed XML.
    #[error("malformed annotation XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A `Coordinate` element is missing an `X`/`Y` attribute or holds
    /// a non-numeric value.
    #[error("bad coordinate in annotation: {0}")]
    BadCoordinate(String),
}

/// Load disease-region contours from an annotation file.
///
/// # Errors
///
/// Returns [`AnnotationError::Io`] if the file cannot be read, and the
/// parse errors of [`parse_contours`].
pub fn load_contours(path: &Path) -> Result<Vec<Contour>, AnnotationError> {
    let text = std::fs::read_to_string(path)?;
    let contours = parse_contours(&text)?;
    log::debug!(
        "loaded {} annotation contour(s) from {}",
        contours.len(),
        path.display(),
    );
    Ok(contours)
}

/// Parse disease-region contours from annotation XML text.
///
/// # Errors
///
/// Returns [`AnnotationError::Xml`] for malformed XML and
/// [`AnnotationError::BadCoordinate`] for missing or non-numeric
/// coordinate attributes.
pub fn parse_contours(xml: &str) -> Result<Vec<Contour>, AnnotationError> {
    let document = roxmltree::Document::parse(xml)?;
    let mut contours = Vec::new();
    for annotation in document
        .descendants()
        .filter(|node| node.has_tag_name("Annotation"))
    {
        let mut points = Vec::new();
        for coordinate in annotation
            .descendants()
            .filter(|node| node.has_tag_name("Coordinate"))
        {
            let x = parse_attribute(&coordinate, "X")?;
            let y = parse_attribute(&coordinate, "Y")?;
            #[allow(clippy::cast_possible_truncation)]
            points.push(Point::new(x as i64, y as i64));
        }
        if !points.is_empty() {
            contours.push(Contour::new(points));
        }
    }
    // Largest regions first.
    contours.sort_by(|a, b| geometry::area(b).total_cmp(&geometry::area(a)));
    Ok(contours)
}

fn parse_attribute(
    node: &roxmltree::Node<'_, '_>,
    name: &str,
) -> Result<f64, AnnotationError> {
    let value = node.attribute(name).ok_or_else(|| {
        AnnotationError::BadCoordinate(format!("missing {name} attribute"))
    })?;
    value.parse().map_err(|_| {
        AnnotationError::BadCoordinate(format!("non-numeric {name} attribute: {value:?}"))
    })
}
