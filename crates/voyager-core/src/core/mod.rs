//! # Core Module
//!
//! This module provides the fundamental building blocks for describing an
//! exposure job on the VOYAGER.
//!
//! ## Architecture
//!
//! - **Geometry** ([`geometry`]) - Rectangles, polygons, the [`geometry::Cell`] capability
//!   and the owning [`geometry::CellLibrary`]
//! - **Wafer Layouts** ([`wafer`]) - The closed set of substrates known to the tool
//! - **Models** ([`models`]) - Positionlist entries, selections, the positionlist itself
//!   and the working area registry
//! - **File I/O** ([`io`]) - Reading and writing `.pls` and `.wor` files

pub mod geometry;
pub mod io;
pub mod models;
pub mod wafer;
