use crate::cli::SortArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use voyager::engine::config::{AnnealingConfig, AnnealingConfigBuilder};
use voyager::engine::progress::ProgressReporter;
use voyager::engine::route;

fn annealing_config(args: &SortArgs) -> Result<AnnealingConfig> {
    let mut builder = AnnealingConfigBuilder::new();
    if let Some(t0) = args.initial_temperature {
        builder = builder.initial_temperature(t0);
    }
    if let Some(t) = args.final_temperature {
        builder = builder.final_temperature(t);
    }
    if let Some(rate) = args.cooling_rate {
        builder = builder.cooling_rate(rate);
    }
    if let Some(max) = args.max_iterations {
        builder = builder.max_iterations(max);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    builder.build().map_err(|e| CliError::Argument(e.to_string()))
}

pub fn run(args: SortArgs) -> Result<()> {
    let config = annealing_config(&args)?;
    let mut positionlist = super::read_positionlist(&args.input)?;
    let mut rng = super::make_rng(config.seed);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let outcome = route::short_sort(&mut positionlist, &config, &mut rng, &reporter)?;
    super::write_positionlist(&positionlist, &args.output, args.view)?;

    println!(
        "✓ Stage path shortened from {:.3} mm to {:.3} mm; written to: {}",
        outcome.initial_length,
        outcome.best_length,
        args.output.display()
    );
    Ok(())
}
