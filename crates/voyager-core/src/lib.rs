//! # VOYAGER Core Library
//!
//! A library for generating and editing positionlist (`.pls`) and working area
//! (`.wor`) files for the RAITH VOYAGER electron-beam lithography system.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Positionlist`,
//!   `WorkingAreaRegistry`, `CellLibrary`), the selection language used to
//!   address subsets of entries, and the text formats understood by the tool.
//!
//! - **[`engine`]: The Logic Core.** The writing-order optimizer (simulated
//!   annealing over stage travel distance) and the writing area and writing
//!   time estimates.
//!
//! - **[`workflows`]: The Public API.** Complete procedures built from the two
//!   layers below, such as building a positionlist from a job description.

pub mod core;
pub mod engine;
pub mod workflows;
