use super::polygon::Polygon;
use super::rect::Rect;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The capabilities a positionlist needs from a layout cell.
///
/// Implement this for the cell type of whichever GDSII library is in use;
/// [`LayoutCell`] is the implementation used by [`super::CellLibrary`].
pub trait Cell {
    /// The cell name. Positionlist entries refer to cells by this name.
    fn name(&self) -> &str;

    fn polygons(&self) -> &[Polygon];

    /// The bounding box of all polygons, or `None` for an empty cell.
    fn bounding_box(&self) -> Option<Rect> {
        self.polygons()
            .iter()
            .filter_map(Polygon::bounding_box)
            .reduce(|a, b| a.union(&b))
    }

    /// Enclosed area per `(layer, datatype)` pair, in square micrometres.
    fn area_by_layer(&self) -> BTreeMap<(u32, u32), f64> {
        let mut areas = BTreeMap::new();
        for polygon in self.polygons() {
            *areas.entry((polygon.layer, polygon.datatype)).or_insert(0.0) += polygon.area();
        }
        areas
    }
}

/// A named collection of polygons.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutCell {
    name: String,
    polygons: Vec<Polygon>,
}

impl LayoutCell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            polygons: Vec::new(),
        }
    }

    pub fn with_polygons(name: impl Into<String>, polygons: Vec<Polygon>) -> Self {
        Self {
            name: name.into(),
            polygons,
        }
    }

    pub fn add(&mut self, polygon: Polygon) -> &mut Self {
        self.polygons.push(polygon);
        self
    }

    /// Orders polygons by the left edge of their bounding boxes, so that
    /// neighbouring structures are written one after another.
    pub fn sort_polygons(&mut self) {
        self.polygons.sort_by(|a, b| {
            let left = |p: &Polygon| p.bounding_box().map(|r| r.left);
            left(a).partial_cmp(&left(b)).unwrap_or(Ordering::Equal)
        });
    }
}

impl Cell for LayoutCell {
    fn name(&self) -> &str {
        &self.name
    }

    fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn two_layer_cell() -> LayoutCell {
        let mut cell = LayoutCell::new("test_cell");
        cell.add(Polygon::rectangle(
            0,
            1000,
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, 1.0),
        ))
        .add(Polygon::rectangle(
            1,
            1000,
            Point2::new(3.0, 0.0),
            Point2::new(4.0, 2.0),
        ))
        .add(Polygon::rectangle(
            0,
            1000,
            Point2::new(10.0, 10.0),
            Point2::new(11.0, 11.0),
        ));
        cell
    }

    #[test]
    fn empty_cell_has_no_bounding_box() {
        assert_eq!(LayoutCell::new("empty").bounding_box(), None);
    }

    #[test]
    fn bounding_box_spans_all_layers() {
        assert_eq!(
            two_layer_cell().bounding_box(),
            Some(Rect::new(-1.0, -1.0, 11.0, 11.0))
        );
    }

    #[test]
    fn area_by_layer_sums_per_layer_and_datatype() {
        let areas = two_layer_cell().area_by_layer();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[&(0, 1000)], 5.0);
        assert_eq!(areas[&(1, 1000)], 2.0);
    }

    #[test]
    fn sort_polygons_orders_by_left_edge() {
        let mut cell = LayoutCell::with_polygons(
            "unsorted",
            vec![
                Polygon::rectangle(0, 0, Point2::new(5.0, 0.0), Point2::new(6.0, 1.0)),
                Polygon::rectangle(0, 0, Point2::new(-2.0, 0.0), Point2::new(-1.0, 1.0)),
                Polygon::rectangle(0, 0, Point2::new(1.0, 0.0), Point2::new(2.0, 1.0)),
            ],
        );
        cell.sort_polygons();
        let lefts: Vec<f64> = cell
            .polygons()
            .iter()
            .map(|p| p.bounding_box().unwrap().left)
            .collect();
        assert_eq!(lefts, vec![-2.0, 1.0, 5.0]);
    }
}
