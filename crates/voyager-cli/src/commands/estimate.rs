use crate::cli::EstimateArgs;
use crate::error::{CliError, Result};
use tracing::info;
use voyager::engine::estimate::{self, EstimateParams};

pub fn run(args: EstimateArgs) -> Result<()> {
    let mut positionlist = super::read_positionlist(&args.input)?;
    let library = super::load_library(&args.library)?;

    let unbound = positionlist.populate_cells(&library);
    if !unbound.is_empty() {
        return Err(CliError::Argument(format!(
            "Cell library {} lacks {} referenced cell(s): {}",
            args.library.display(),
            unbound.len(),
            unbound.join(", ")
        )));
    }

    let defaults = EstimateParams::default();
    let params = EstimateParams {
        beam_current: args.beam_current.unwrap_or(defaults.beam_current),
        area_dose: args.area_dose.unwrap_or(defaults.area_dose),
    };
    info!(
        "Estimating with beam current {:e} A and area dose {} uC/cm^2.",
        params.beam_current, params.area_dose
    );
    let result = estimate::estimate(&positionlist, &library, &params)?;

    println!("Entries:             {}", result.entries);
    println!("Writing area:        {:.4e} um^2", result.area);
    println!("Dose-weighted area:  {:.4e} um^2", result.weighted_area);
    println!("Stage travel:        {:.3} mm", result.stage_travel);
    println!(
        "Writing time:        {:.1} s ({:.2} h)",
        result.seconds,
        result.seconds / 3600.0
    );
    Ok(())
}
