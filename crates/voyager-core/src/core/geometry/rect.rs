use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimals kept when biasing sizes and areas upward.
pub const ROUNDING_DECIMALS: i32 = 2;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum GeometryError {
    #[error("A rectangle requires exactly 4 values (left, bottom, right, top), got {0}")]
    WrongLength(usize),
    #[error("Rectangle coordinates must be finite, got {0:?}")]
    NonFinite([f64; 4]),
    #[error("Rectangle is inverted: left {left} > right {right} or bottom {bottom} > top {top}")]
    Inverted {
        left: f64,
        bottom: f64,
        right: f64,
        top: f64,
    },
}

/// Rounds `x` away from zero to `decimals` decimal digits.
///
/// The VOYAGER silently truncates sizes, so every derived size or area is
/// biased outward to avoid under-covering the exposed region.
///
/// ```
/// use voyager::core::geometry::round_up;
/// assert_eq!(round_up(1.231, 2), 1.24);
/// assert_eq!(round_up(-1.231, 2), -1.24);
/// ```
pub fn round_up(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    x.signum() * (x.abs() * scale).ceil() / scale
}

/// An axis-aligned rectangle stored as `(left, bottom, right, top)`.
///
/// Units depend on the context: micrometres relative to a cell origin for
/// entry areas and working areas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rect {
    pub const fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Builds a rectangle from a flat `[left, bottom, right, top]` slice.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::WrongLength`] unless exactly four values are
    /// given, and [`GeometryError::NonFinite`] for NaN or infinite values.
    pub fn from_slice(values: &[f64]) -> Result<Self, GeometryError> {
        let [left, bottom, right, top] = <[f64; 4]>::try_from(values)
            .map_err(|_| GeometryError::WrongLength(values.len()))?;
        let rect = Self::new(left, bottom, right, top);
        if !rect.is_finite() {
            return Err(GeometryError::NonFinite(rect.to_array()));
        }
        Ok(rect)
    }

    /// Like [`Rect::from_slice`], additionally rejecting inverted rectangles.
    pub fn ordered_from_slice(values: &[f64]) -> Result<Self, GeometryError> {
        let rect = Self::from_slice(values)?;
        rect.check_ordered()?;
        Ok(rect)
    }

    pub fn check_ordered(&self) -> Result<(), GeometryError> {
        if self.left > self.right || self.bottom > self.top {
            return Err(GeometryError::Inverted {
                left: self.left,
                bottom: self.bottom,
                right: self.right,
                top: self.top,
            });
        }
        Ok(())
    }

    /// The smallest rectangle containing every point, or `None` for no points.
    pub fn bounding<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self::new(p.x, p.y, p.x, p.y),
                Some(r) => r.expanded_to(p),
            })
        })
    }

    #[inline]
    pub fn to_array(&self) -> [f64; 4] {
        [self.left, self.bottom, self.right, self.top]
    }

    #[inline]
    pub fn width(&self) -> f64 {
        (self.right - self.left).abs()
    }

    #[inline]
    pub fn height(&self) -> f64 {
        (self.top - self.bottom).abs()
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.left + self.right) / 2.0,
            (self.bottom + self.top) / 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Applies [`round_up`] to every coordinate.
    pub fn round_up(&self) -> Self {
        let [l, b, r, t] = self.to_array().map(|v| round_up(v, ROUNDING_DECIMALS));
        Self::new(l, b, r, t)
    }

    pub fn translated(&self, du: f64, dv: f64) -> Self {
        Self::new(
            self.left + du,
            self.bottom + dv,
            self.right + du,
            self.top + dv,
        )
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let [l, b, r, t] = self.to_array().map(|v| v * factor);
        Self::new(l, b, r, t)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.left.min(other.left),
            self.bottom.min(other.bottom),
            self.right.max(other.right),
            self.top.max(other.top),
        )
    }

    fn expanded_to(&self, p: &Point2<f64>) -> Self {
        Self::new(
            self.left.min(p.x),
            self.bottom.min(p.y),
            self.right.max(p.x),
            self.top.max(p.y),
        )
    }
}

impl From<[f64; 4]> for Rect {
    fn from([left, bottom, right, top]: [f64; 4]) -> Self {
        Self::new(left, bottom, right, top)
    }
}
