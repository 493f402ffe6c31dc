use super::rect::Rect;
use itertools::Itertools;
use nalgebra::{Point2, Vector2};

/// A closed polygon on a single GDSII layer/datatype pair.
///
/// Coordinates are micrometres relative to the owning cell's origin. The
/// closing edge from the last point back to the first is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub layer: u32,
    pub datatype: u32,
    pub points: Vec<Point2<f64>>,
}

impl Polygon {
    pub fn new(layer: u32, datatype: u32, points: Vec<Point2<f64>>) -> Self {
        Self {
            layer,
            datatype,
            points,
        }
    }

    /// An axis-aligned rectangle spanned by two opposite corners.
    pub fn rectangle(layer: u32, datatype: u32, corner1: Point2<f64>, corner2: Point2<f64>) -> Self {
        let (x0, x1) = (corner1.x.min(corner2.x), corner1.x.max(corner2.x));
        let (y0, y1) = (corner1.y.min(corner2.y), corner1.y.max(corner2.y));
        Self::new(
            layer,
            datatype,
            vec![
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ],
        )
    }

    /// Unsigned enclosed area (shoelace formula).
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let twice_signed: f64 = self
            .points
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum();
        twice_signed.abs() / 2.0
    }

    pub fn bounding_box(&self) -> Option<Rect> {
        Rect::bounding(&self.points)
    }

    pub fn translate(&mut self, offset: Vector2<f64>) {
        for p in &mut self.points {
            *p += offset;
        }
    }
}
