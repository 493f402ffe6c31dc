use crate::core::geometry::CellLibrary;
use crate::core::io::wor::WorError;
use crate::core::models::positionlist::{Positionlist, PositionlistError};
use crate::core::models::selection::Selection;
use crate::core::models::working_area::WorkingAreaRegistry;
use crate::engine::config::{AreaPolicy, BuildConfig};
use crate::engine::error::EngineError;
use crate::engine::estimate::{self, WritingEstimate};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::route::{self, SortOutcome};
use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cell '{0}' is not present in the cell library")]
    UnknownCell(String),
    #[error(transparent)]
    Positionlist(#[from] PositionlistError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Failed to read working areas: {0}")]
    WorkingAreas(#[from] WorError),
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    pub positionlist: Positionlist,
    /// Present when the writing order was optimized.
    pub sort: Option<SortOutcome>,
    pub estimate: WritingEstimate,
}

#[instrument(skip_all, name = "build_workflow")]
pub fn run<R: Rng + ?Sized>(
    config: &BuildConfig,
    library: &CellLibrary,
    rng: &mut R,
    reporter: &ProgressReporter,
) -> Result<BuildResult, WorkflowError> {
    // === Phase 1: Placement ===
    reporter.report(Progress::StageStart {
        name: "Placing cells",
    });
    let mut positionlist = Positionlist::new(config.wafer_layout);
    for placement in &config.placements {
        let cell = library
            .get(&placement.cell)
            .ok_or_else(|| WorkflowError::UnknownCell(placement.cell.clone()))?;
        positionlist.add(
            cell,
            placement.position,
            &placement.layers,
            placement.dose_factor,
        )?;
    }
    for step in &config.matrix_copies {
        positionlist.matrix_copy(step.grid, |dose| step.dose_step.apply(dose), &step.selection)?;
    }
    warn_outside_wafer(&positionlist);
    info!(
        "Placed {} entr(ies) of {} cell(s) on {}.",
        positionlist.len(),
        positionlist.cells().count(),
        positionlist.wafer_layout()
    );
    reporter.report(Progress::StageFinish {
        summary: format!("{} entries placed", positionlist.len()),
    });

    // === Phase 2: Files and areas ===
    reporter.report(Progress::StageStart {
        name: "Assigning writefield areas",
    });
    positionlist.assign_file(&config.gds_file, &Selection::All);
    let source = match &config.area {
        AreaPolicy::BoundingBox => {
            positionlist.update_area(library, false)?;
            "cell bounding boxes".to_string()
        }
        AreaPolicy::Fixed { area, centered } => {
            let values = area.to_array();
            if *centered {
                positionlist.set_area_centered(&values, library, &Selection::All)?;
            } else {
                positionlist.set_area(&values, &Selection::All)?;
            }
            "a fixed rectangle".to_string()
        }
        AreaPolicy::WorkingAreas(path) => {
            let registry = WorkingAreaRegistry::read(path)?;
            positionlist.assign_working_areas(&registry, &Selection::All)?;
            path.display().to_string()
        }
    };
    reporter.report(Progress::StageFinish {
        summary: format!("Areas set from {}", source),
    });

    // === Phase 3: Writing order (optional) ===
    let sort = match &config.annealing {
        Some(annealing) => Some(route::short_sort(
            &mut positionlist,
            annealing,
            rng,
            reporter,
        )?),
        None => None,
    };

    // === Phase 4: Estimate ===
    let estimate = estimate::estimate(&positionlist, library, &config.estimate)?;
    info!(
        "Build complete: {} entr(ies), estimated writing time {:.1} s.",
        estimate.entries, estimate.seconds
    );

    Ok(BuildResult {
        positionlist,
        sort,
        estimate,
    })
}

/// IDs of entries placed off the substrate.
fn outside_wafer(positionlist: &Positionlist) -> Vec<usize> {
    let shape = positionlist.wafer_layout().shape();
    positionlist
        .iter()
        .filter(|e| !shape.contains(e.u, e.v))
        .map(|e| e.id)
        .collect()
}

fn warn_outside_wafer(positionlist: &Positionlist) {
    let outside = outside_wafer(positionlist);
    if !outside.is_empty() {
        let (min_u, min_v, max_u, max_v) = positionlist.wafer_layout().shape().extents();
        warn!(
            "{} entr(ies) lie outside wafer layout {} (u {:.1}..{:.1} mm, v {:.1}..{:.1} mm): IDs {:?}",
            outside.len(),
            positionlist.wafer_layout(),
            min_u / 1e3,
            max_u / 1e3,
            min_v / 1e3,
            max_v / 1e3,
            outside
        );
    }
}
