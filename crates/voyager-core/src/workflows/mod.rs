//! # Workflows Module
//!
//! Complete procedures assembled from the core model and the engine. Each
//! workflow takes a validated configuration, reports its phases through a
//! [`crate::engine::progress::ProgressReporter`] and returns plain data.
//!
//! - **Build Workflow** ([`build`]) - Places cells on a wafer, replicates
//!   them in matrices, assigns files and areas, optionally optimizes the
//!   writing order and estimates the writing time.

pub mod build;
