//! Geometry primitives and the cell abstraction consumed by positionlists.
//!
//! Actual GDSII parsing lives outside this crate. Anything that can report a
//! name, a bounding box and a list of polygons can be placed on a wafer through
//! the [`Cell`] trait; [`CellLibrary`] is the owning registry used by the rest
//! of the library to resolve cell names back to geometry.

pub mod cell;
pub mod ids;
pub mod library;
pub mod polygon;
pub mod rect;

pub use cell::{Cell, LayoutCell};
pub use library::{CellLibrary, CellLibraryError};
pub use polygon::Polygon;
pub use rect::{GeometryError, Rect, round_up};
