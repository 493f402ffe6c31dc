//! Wafer layouts known to the VOYAGER.
//!
//! A positionlist always refers to one of these layouts by its `.wlo` file
//! name. Dimensions are in micrometres; circular wafers are centred on the
//! stage origin while square carriers span `(0, 0)` to `(width, height)`.

use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_WAFER_LAYOUT: &str = "DEFAULT.wlo";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaferShape {
    Circle { diameter: f64 },
    Rectangle { width: f64, height: f64 },
}

impl WaferShape {
    /// Whether a stage position (in millimetres) lies on the substrate.
    pub fn contains(&self, u_mm: f64, v_mm: f64) -> bool {
        let (x, y) = (u_mm * 1e3, v_mm * 1e3);
        match *self {
            WaferShape::Circle { diameter } => {
                let radius = diameter / 2.0;
                x * x + y * y <= radius * radius
            }
            WaferShape::Rectangle { width, height } => {
                (0.0..=width).contains(&x) && (0.0..=height).contains(&y)
            }
        }
    }

    /// Extents `(min_x, min_y, max_x, max_y)` in micrometres.
    pub fn extents(&self) -> (f64, f64, f64, f64) {
        match *self {
            WaferShape::Circle { diameter } => {
                let r = diameter / 2.0;
                (-r, -r, r, r)
            }
            WaferShape::Rectangle { width, height } => (0.0, 0.0, width, height),
        }
    }
}

static WAFER_LAYOUTS: Map<&'static str, WaferShape> = phf_map! {
    "3 inch left.wlo" => WaferShape::Circle { diameter: 76_200.0 },
    "4 inch left.wlo" => WaferShape::Circle { diameter: 100_000.0 },
    "4.8x4.8.wlo" => WaferShape::Rectangle { width: 4_800.0, height: 4_800.0 },
    "10x10.wlo" => WaferShape::Rectangle { width: 10_000.0, height: 10_000.0 },
    "12x12mm.wlo" => WaferShape::Rectangle { width: 12_000.0, height: 12_000.0 },
    "20mm2.wlo" => WaferShape::Rectangle { width: 20_000.0, height: 20_000.0 },
    "24mm2.wlo" => WaferShape::Rectangle { width: 24_000.0, height: 24_000.0 },
    "50x50.wlo" => WaferShape::Rectangle { width: 50_000.0, height: 50_000.0 },
    "Bare_4inch.wlo" => WaferShape::Circle { diameter: 100_000.0 },
    "Bare_6inch.wlo" => WaferShape::Circle { diameter: 150_000.0 },
    "Bare_8inch.wlo" => WaferShape::Circle { diameter: 200_000.0 },
    "DEFAULT.wlo" => WaferShape::Circle { diameter: 150_000.0 },
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum WaferError {
    #[error("Unknown wafer layout '{0}'. Known layouts: {known}", known = known_layout_names().join(", "))]
    UnknownLayout(String),
}

/// A validated reference to one of the known wafer layouts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaferLayout {
    name: &'static str,
    shape: WaferShape,
}

impl WaferLayout {
    pub fn from_name(name: &str) -> Result<Self, WaferError> {
        WAFER_LAYOUTS
            .get_entry(name)
            .map(|(&name, &shape)| Self { name, shape })
            .ok_or_else(|| WaferError::UnknownLayout(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> WaferShape {
        self.shape
    }
}

impl Default for WaferLayout {
    fn default() -> Self {
        Self {
            name: DEFAULT_WAFER_LAYOUT,
            shape: WaferShape::Circle {
                diameter: 150_000.0,
            },
        }
    }
}

impl FromStr for WaferLayout {
    type Err = WaferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for WaferLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Names of all known layouts, sorted.
pub fn known_layout_names() -> Vec<&'static str> {
    let mut names: Vec<_> = WAFER_LAYOUTS.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_layout_resolves() {
        let layout = WaferLayout::from_name("12x12mm.wlo").unwrap();
        assert_eq!(layout.name(), "12x12mm.wlo");
        assert_eq!(
            layout.shape(),
            WaferShape::Rectangle {
                width: 12_000.0,
                height: 12_000.0
            }
        );
    }

    #[test]
    fn unknown_layout_is_rejected() {
        let err = WaferLayout::from_name("13x13mm.wlo").unwrap_err();
        assert_eq!(err, WaferError::UnknownLayout("13x13mm.wlo".to_string()));
        assert!(err.to_string().contains("DEFAULT.wlo"));
    }

    #[test]
    fn default_layout_matches_table() {
        assert_eq!(
            WaferLayout::default(),
            WaferLayout::from_name(DEFAULT_WAFER_LAYOUT).unwrap()
        );
    }

    #[test]
    fn contains_respects_shape() {
        let square = WaferLayout::from_name("10x10.wlo").unwrap().shape();
        assert!(square.contains(5.0, 5.0));
        assert!(!square.contains(-0.1, 5.0));
        assert!(!square.contains(5.0, 10.5));

        let wafer = WaferLayout::from_name("Bare_4inch.wlo").unwrap().shape();
        assert!(wafer.contains(-49.0, 0.0));
        assert!(!wafer.contains(40.0, 40.0));
    }

    #[test]
    fn extents_follow_shape_origin() {
        let square = WaferLayout::from_name("12x12mm.wlo").unwrap().shape();
        assert_eq!(square.extents(), (0.0, 0.0, 12_000.0, 12_000.0));
        let wafer = WaferLayout::from_name("Bare_4inch.wlo").unwrap().shape();
        assert_eq!(wafer.extents(), (-50_000.0, -50_000.0, 50_000.0, 50_000.0));
    }

    #[test]
    fn known_layout_names_are_sorted_and_complete() {
        let names = known_layout_names();
        assert_eq!(names.len(), 12);
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }
}
