use super::error::EngineError;
use crate::core::geometry::{Cell, CellLibrary};
use crate::core::models::positionlist::Positionlist;
use std::collections::BTreeMap;
use tracing::instrument;

/// Default beam current in ampere.
pub const DEFAULT_BEAM_CURRENT: f64 = 5e-10;
/// Default area dose in µC/cm².
pub const DEFAULT_AREA_DOSE: f64 = 150.0;

/// Fixed overhead per exposure, in seconds.
const SECONDS_PER_ENTRY: f64 = 2.5;
/// µm² · µC/cm² → C.
const DOSE_SCALE: f64 = 1e-14;
/// Stage travel time in seconds per 10 mm.
const TRAVEL_SECONDS_PER_10MM: f64 = 5.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateParams {
    pub beam_current: f64,
    pub area_dose: f64,
}

impl Default for EstimateParams {
    fn default() -> Self {
        Self {
            beam_current: DEFAULT_BEAM_CURRENT,
            area_dose: DEFAULT_AREA_DOSE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WritingEstimate {
    pub entries: usize,
    /// Exposed polygon area in µm².
    pub area: f64,
    /// Exposed area weighted by each entry's dose factor.
    pub weighted_area: f64,
    /// Stage travel term in millimetres.
    pub stage_travel: f64,
    /// Estimated writing time in seconds.
    pub seconds: f64,
}

fn per_entry_areas(
    positionlist: &Positionlist,
    library: &CellLibrary,
) -> Result<Vec<(f64, f64)>, EngineError> {
    let mut cache: BTreeMap<&str, BTreeMap<(u32, u32), f64>> = BTreeMap::new();
    let mut areas = Vec::with_capacity(positionlist.len());
    for entry in positionlist.iter() {
        let name = entry.comment.as_str();
        if !cache.contains_key(name) {
            let cell = positionlist.resolve(library, name)?;
            cache.insert(name, cell.area_by_layer());
        }
        let area: f64 = cache
            .get(name)
            .into_iter()
            .flat_map(|by_layer| by_layer.iter())
            .filter(|((layer, _), _)| entry.layer.contains(layer))
            .map(|(_, area)| area)
            .sum();
        areas.push((area, entry.dose_factor));
    }
    Ok(areas)
}

/// Total polygon area exposed by the positionlist, in µm².
///
/// Each entry contributes the area of its cell on the entry's layers, summed
/// over all datatypes. With `weighted`, contributions are scaled by the
/// entry's dose factor.
pub fn writing_area(
    positionlist: &Positionlist,
    library: &CellLibrary,
    weighted: bool,
) -> Result<f64, EngineError> {
    Ok(per_entry_areas(positionlist, library)?
        .into_iter()
        .map(|(area, dose)| if weighted { area * dose } else { area })
        .sum())
}

/// The stage travel term: the first position's `u + v` plus the absolute
/// differences in `u` and `v` between consecutive positions, in millimetres.
fn stage_travel(positionlist: &Positionlist) -> f64 {
    let positions = positionlist.positions();
    let Some(&(u0, v0)) = positions.first() else {
        return 0.0;
    };
    let steps: f64 = positions
        .windows(2)
        .map(|w| (w[1].0 - w[0].0).abs() + (w[1].1 - w[0].1).abs())
        .sum();
    u0 + v0 + steps
}

#[instrument(skip_all, fields(entries = positionlist.len()))]
pub fn estimate(
    positionlist: &Positionlist,
    library: &CellLibrary,
    params: &EstimateParams,
) -> Result<WritingEstimate, EngineError> {
    if !params.beam_current.is_finite() || params.beam_current <= 0.0 {
        return Err(EngineError::InvalidBeamCurrent(params.beam_current));
    }
    if !params.area_dose.is_finite() || params.area_dose < 0.0 {
        return Err(EngineError::InvalidAreaDose(params.area_dose));
    }

    let areas = per_entry_areas(positionlist, library)?;
    let area: f64 = areas.iter().map(|(a, _)| a).sum();
    let weighted_area: f64 = areas.iter().map(|(a, d)| a * d).sum();
    let stage_travel = stage_travel(positionlist);
    let entries = positionlist.len();

    let seconds = SECONDS_PER_ENTRY * entries as f64
        + weighted_area * DOSE_SCALE * params.area_dose / params.beam_current
        + stage_travel * TRAVEL_SECONDS_PER_10MM / 10.0;

    Ok(WritingEstimate {
        entries,
        area,
        weighted_area,
        stage_travel,
        seconds,
    })
}

/// Estimated writing time in seconds.
pub fn writing_time(
    positionlist: &Positionlist,
    library: &CellLibrary,
    params: &EstimateParams,
) -> Result<f64, EngineError> {
    estimate(positionlist, library, params).map(|e| e.seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{LayoutCell, Polygon};
    use crate::core::models::positionlist::PositionlistError;
    use nalgebra::Point2;

    fn library() -> CellLibrary {
        let mut library = CellLibrary::new();
        library
            .add(LayoutCell::with_polygons(
                "chip",
                vec![
                    Polygon::rectangle(0, 0, Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)),
                    Polygon::rectangle(0, 1000, Point2::new(0.0, 0.0), Point2::new(5.0, 2.0)),
                    Polygon::rectangle(1, 0, Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)),
                ],
            ))
            .unwrap();
        library
    }

    fn positionlist(library: &CellLibrary) -> Positionlist {
        let chip = library.get("chip").unwrap();
        let mut pls = Positionlist::default();
        pls.add(chip, (2.0, 1.0), &[0], 1.0).unwrap();
        pls.add(chip, (4.0, 3.0), &[0, 1], 2.0).unwrap();
        pls
    }

    #[test]
    fn writing_area_sums_selected_layers_over_all_datatypes() {
        let library = library();
        let pls = positionlist(&library);
        assert_eq!(writing_area(&pls, &library, false).unwrap(), 110.0 + 111.0);
        assert_eq!(writing_area(&pls, &library, true).unwrap(), 110.0 + 222.0);
    }

    #[test]
    fn writing_time_follows_documented_heuristic() {
        let library = library();
        let pls = positionlist(&library);
        let params = EstimateParams::default();
        let estimate = estimate(&pls, &library, &params).unwrap();
        // u0 + v0 + (4 - 2) + (3 - 1)
        assert_eq!(estimate.stage_travel, 7.0);
        let expected = 2.5 * 2.0 + 332.0 * 1e-14 * 150.0 / 5e-10 + 7.0 * 5.5 / 10.0;
        assert!((estimate.seconds - expected).abs() < 1e-9);
        assert_eq!(writing_time(&pls, &library, &params).unwrap(), estimate.seconds);
    }

    #[test]
    fn stage_travel_counts_moves_back_towards_the_origin() {
        let library = library();
        let chip = library.get("chip").unwrap();
        let mut pls = Positionlist::default();
        pls.add(chip, (5.0, 5.0), &[0], 1.0).unwrap();
        pls.add(chip, (0.0, 0.0), &[0], 1.0).unwrap();
        pls.add(chip, (2.0, 0.0), &[0], 1.0).unwrap();

        let estimate = estimate(&pls, &library, &EstimateParams::default()).unwrap();
        // 5 + 5 + |0 - 5| + |0 - 5| + |2 - 0| + |0 - 0|
        assert_eq!(estimate.stage_travel, 22.0);
    }

    #[test]
    fn empty_positionlist_takes_no_time() {
        let library = library();
        let pls = Positionlist::default();
        assert_eq!(
            writing_time(&pls, &library, &EstimateParams::default()).unwrap(),
            0.0
        );
    }

    #[test]
    fn estimates_require_bound_cells_and_valid_parameters() {
        let library = library();
        let pls = positionlist(&library);
        assert_eq!(
            writing_area(&pls, &CellLibrary::new(), false),
            Err(EngineError::Positionlist(PositionlistError::MissingCell(
                "chip".to_string()
            )))
        );
        let params = EstimateParams {
            beam_current: 0.0,
            ..EstimateParams::default()
        };
        assert_eq!(
            estimate(&pls, &library, &params),
            Err(EngineError::InvalidBeamCurrent(0.0))
        );
    }
}
