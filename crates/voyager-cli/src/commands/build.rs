use crate::cli::BuildArgs;
use crate::config::PartialBuildConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use std::path::Path;
use tracing::info;
use voyager::engine::progress::ProgressReporter;
use voyager::workflows;

pub fn run(args: BuildArgs) -> Result<()> {
    let partial_config = PartialBuildConfig::from_file(&args.config)?;
    info!("Merging job description with CLI arguments...");
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let job = partial_config.merge_with_cli(&args, base_dir)?;

    let library = super::load_library(&job.library_path)?;
    let seed = job.config.annealing.as_ref().and_then(|a| a.seed);
    let mut rng = super::make_rng(seed);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Building positionlist...");
    info!("Invoking the core build workflow...");
    let result = workflows::build::run(&job.config, &library, &mut rng, &reporter)?;

    super::write_positionlist(&result.positionlist, &args.output, job.view)?;

    println!(
        "✓ {} entr(ies) written to: {}",
        result.positionlist.len(),
        args.output.display()
    );
    if let Some(sort) = &result.sort {
        println!(
            "  Stage path: {:.3} mm -> {:.3} mm ({} iterations)",
            sort.initial_length, sort.best_length, sort.iterations
        );
    }
    println!(
        "  Writing area: {:.3e} um^2, estimated writing time: {:.1} s",
        result.estimate.area, result.estimate.seconds
    );
    Ok(())
}
