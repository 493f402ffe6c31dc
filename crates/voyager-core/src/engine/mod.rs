//! # Engine Module
//!
//! The computational layer on top of the positionlist model.
//!
//! - **Route optimization** ([`route`]) - Simulated annealing over the
//!   writing order, minimising Manhattan stage travel between consecutive
//!   exposures.
//! - **Estimates** ([`estimate`]) - Exposed area and the writing-time
//!   heuristic used to plan a session.
//! - **Configuration** ([`config`]) - Annealing parameters and their builder.
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//!   consumed by front ends.
//! - **Error Handling** ([`error`]) - Engine-specific error types.

pub mod config;
pub mod error;
pub mod estimate;
pub mod progress;
pub mod route;
