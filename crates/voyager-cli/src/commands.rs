pub mod build;
pub mod edit;
pub mod estimate;
pub mod show;
pub mod sort;
pub mod wor;

use crate::error::{CliError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use tracing::info;
use voyager::core::geometry::CellLibrary;
use voyager::core::io::pls::ViewProfile;
use voyager::core::models::positionlist::Positionlist;

pub(crate) fn read_positionlist(path: &Path) -> Result<Positionlist> {
    info!("Loading positionlist from {:?}", path);
    Positionlist::read(path).map_err(|e| CliError::parsing(path, e))
}

pub(crate) fn write_positionlist(pls: &Positionlist, path: &Path, view: ViewProfile) -> Result<()> {
    pls.write(path, view).map_err(|e| CliError::writing(path, e))
}

pub(crate) fn load_library(path: &Path) -> Result<CellLibrary> {
    info!("Loading cell library from {:?}", path);
    CellLibrary::load(path).map_err(|e| CliError::parsing(path, e))
}

/// A seeded generator, or one drawn from entropy when no seed is given.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            info!("Using random seed {}.", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    }
}
