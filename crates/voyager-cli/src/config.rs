pub mod defaults;

use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use voyager::core::geometry::Rect;
use voyager::core::io::pls::ViewProfile;
use voyager::core::models::positionlist::MatrixCopy;
use voyager::core::models::selection::Selection;
use voyager::core::wafer::WaferLayout;
use voyager::engine::config as core_config;
use voyager::engine::estimate::EstimateParams;

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialPlacement {
    cell: String,
    position: [f64; 2],
    layers: Option<Vec<u32>>,
    dose_factor: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMatrixCopy {
    select: Option<String>,
    size: [usize; 2],
    row_vector: [f64; 2],
    column_vector: [f64; 2],
    dose_multiply: Option<f64>,
    dose_add: Option<f64>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case", tag = "policy")]
enum PartialAreaConfig {
    BoundingBox,
    Fixed {
        rect: [f64; 4],
        #[serde(default)]
        centered: bool,
    },
    WorkingAreas {
        file: PathBuf,
    },
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialAnnealingConfig {
    enabled: Option<bool>,
    initial_temperature: Option<f64>,
    final_temperature: Option<f64>,
    cooling_rate: Option<f64>,
    max_iterations: Option<u64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialEstimateConfig {
    beam_current: Option<f64>,
    area_dose: Option<f64>,
}

/// A build job as written in its TOML file; every field may be overridden.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialBuildConfig {
    wafer_layout: Option<String>,
    gds_file: Option<String>,
    cell_library: Option<PathBuf>,
    view: Option<String>,
    #[serde(default)]
    placements: Vec<PartialPlacement>,
    #[serde(default)]
    matrix_copies: Vec<PartialMatrixCopy>,
    area: Option<PartialAreaConfig>,
    annealing: Option<PartialAnnealingConfig>,
    estimate: Option<PartialEstimateConfig>,
}

/// The fully resolved inputs of a `build` run.
#[derive(Debug)]
pub struct BuildJob {
    pub config: core_config::BuildConfig,
    pub library_path: PathBuf,
    pub view: ViewProfile,
}

fn relative_to(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

impl PartialBuildConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading job description from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::parsing(path, e))
    }

    /// Merges the job file with command-line overrides.
    ///
    /// Relative paths in the job file are resolved against `base_dir`, the
    /// directory holding the job file.
    pub fn merge_with_cli(mut self, args: &BuildArgs, base_dir: &Path) -> Result<BuildJob> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let library_path = match &args.library {
            Some(path) => path.clone(),
            None => relative_to(
                base_dir,
                self.cell_library.take().ok_or_else(|| {
                    CliError::Config(
                        "A value for 'cell-library' is required either in the job file or via --library."
                            .to_string(),
                    )
                })?,
            ),
        };

        let view = match args.view {
            Some(view) => view,
            None => self
                .view
                .as_deref()
                .unwrap_or(&defaults.view)
                .parse::<ViewProfile>()
                .map_err(|e| CliError::Config(e.to_string()))?,
        };

        let layout_name = self.wafer_layout.as_deref().unwrap_or(&defaults.wafer_layout);
        let wafer_layout =
            WaferLayout::from_name(layout_name).map_err(|e| CliError::Config(e.to_string()))?;

        let placements = self.placements.into_iter().map(|p| core_config::Placement {
            cell: p.cell,
            position: (p.position[0], p.position[1]),
            layers: p.layers.unwrap_or_else(|| defaults.layers.clone()),
            dose_factor: p.dose_factor.unwrap_or(defaults.dose_factor),
        });

        let mut builder = core_config::BuildConfigBuilder::new()
            .wafer_layout(wafer_layout)
            .placements(placements)
            .area(Self::merge_area(self.area, base_dir)?)
            .annealing(Self::merge_annealing(args, self.annealing, defaults.sort)?)
            .estimate(Self::merge_estimate(self.estimate));
        if let Some(file) = self.gds_file {
            builder = builder.gds_file(file);
        }
        for copy in self.matrix_copies {
            builder = builder.matrix_copy(Self::merge_matrix_copy(copy)?);
        }

        let config = builder.build().map_err(|e| CliError::Config(e.to_string()))?;
        Ok(BuildJob {
            config,
            library_path,
            view,
        })
    }

    fn merge_matrix_copy(partial: PartialMatrixCopy) -> Result<core_config::MatrixCopyStep> {
        let selection = match partial.select.as_deref() {
            Some(expr) => Selection::parse(expr)
                .map_err(|e| CliError::Config(format!("Invalid matrix copy selection: {}", e)))?,
            None => Selection::All,
        };
        let dose_step = match (partial.dose_multiply, partial.dose_add) {
            (Some(_), Some(_)) => {
                return Err(CliError::Config(
                    "A matrix copy accepts either `dose-multiply` or `dose-add`, not both."
                        .to_string(),
                ));
            }
            (Some(factor), None) => core_config::DoseStep::Multiply(factor),
            (None, Some(delta)) => core_config::DoseStep::Add(delta),
            (None, None) => core_config::DoseStep::Constant,
        };
        Ok(core_config::MatrixCopyStep {
            selection,
            grid: MatrixCopy {
                rows: partial.size[0],
                cols: partial.size[1],
                row_vector: (partial.row_vector[0], partial.row_vector[1]),
                column_vector: (partial.column_vector[0], partial.column_vector[1]),
            },
            dose_step,
        })
    }

    fn merge_area(
        partial: Option<PartialAreaConfig>,
        base_dir: &Path,
    ) -> Result<core_config::AreaPolicy> {
        Ok(match partial {
            None | Some(PartialAreaConfig::BoundingBox) => core_config::AreaPolicy::BoundingBox,
            Some(PartialAreaConfig::Fixed { rect, centered }) => {
                let area = Rect::ordered_from_slice(&rect)
                    .map_err(|e| CliError::Config(format!("Invalid `area.rect`: {}", e)))?;
                core_config::AreaPolicy::Fixed { area, centered }
            }
            Some(PartialAreaConfig::WorkingAreas { file }) => {
                core_config::AreaPolicy::WorkingAreas(relative_to(base_dir, file))
            }
        })
    }

    fn merge_annealing(
        args: &BuildArgs,
        partial: Option<PartialAnnealingConfig>,
        default_enabled: bool,
    ) -> Result<Option<core_config::AnnealingConfig>> {
        let partial = partial.unwrap_or_default();
        if args.no_sort || !partial.enabled.unwrap_or(default_enabled) {
            return Ok(None);
        }
        let mut builder = core_config::AnnealingConfigBuilder::new();
        if let Some(t0) = partial.initial_temperature {
            builder = builder.initial_temperature(t0);
        }
        if let Some(t) = partial.final_temperature {
            builder = builder.final_temperature(t);
        }
        if let Some(rate) = args.cooling_rate.or(partial.cooling_rate) {
            builder = builder.cooling_rate(rate);
        }
        if let Some(max) = partial.max_iterations {
            builder = builder.max_iterations(max);
        }
        if let Some(seed) = args.seed.or(partial.seed) {
            builder = builder.seed(seed);
        }
        builder
            .build()
            .map(Some)
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_estimate(partial: Option<PartialEstimateConfig>) -> EstimateParams {
        let partial = partial.unwrap_or_default();
        let defaults = EstimateParams::default();
        EstimateParams {
            beam_current: partial.beam_current.unwrap_or(defaults.beam_current),
            area_dose: partial.area_dose.unwrap_or(defaults.area_dose),
        }
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();

            match key {
                "wafer-layout" => self.wafer_layout = Some(value_str.trim().to_string()),
                "gds-file" => self.gds_file = Some(value_str.trim().to_string()),
                "cell-library" => self.cell_library = Some(PathBuf::from(value_str.trim())),
                "view" => self.view = Some(value_str.trim().to_string()),
                "annealing.enabled" => {
                    self.annealing.get_or_insert_with(Default::default).enabled =
                        Some(parse_value(key, value_str, "boolean")?);
                }
                "annealing.initial-temperature" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .initial_temperature = Some(parse_value(key, value_str, "float")?);
                }
                "annealing.final-temperature" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .final_temperature = Some(parse_value(key, value_str, "float")?);
                }
                "annealing.cooling-rate" => {
                    self.annealing.get_or_insert_with(Default::default).cooling_rate =
                        Some(parse_value(key, value_str, "float")?);
                }
                "annealing.max-iterations" => {
                    self.annealing
                        .get_or_insert_with(Default::default)
                        .max_iterations = Some(parse_value(key, value_str, "integer")?);
                }
                "annealing.seed" => {
                    self.annealing.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "estimate.beam-current" => {
                    self.estimate.get_or_insert_with(Default::default).beam_current =
                        Some(parse_value(key, value_str, "float")?);
                }
                "estimate.area-dose" => {
                    self.estimate.get_or_insert_with(Default::default).area_dose =
                        Some(parse_value(key, value_str, "float")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    const MINIMAL_JOB: &str = r#"
        wafer-layout = "12x12mm.wlo"
        gds-file = "chip.gds"
        cell-library = "cells.toml"

        [[placements]]
        cell = "First_cell"
        position = [3.0, 3.0]

        [[placements]]
        cell = "Second_cell"
        position = [5.0, 3.0]
        layers = [0, 1]
        dose-factor = 1.2
        "#;

    fn write_job_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn build_args(config_path: &Path, extra: &[&str]) -> BuildArgs {
        let mut args = vec![
            "voyager".to_string(),
            "build".to_string(),
            "-c".to_string(),
            config_path.to_str().unwrap().to_string(),
            "-o".to_string(),
            "out.pls".to_string(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(args).command {
            Commands::Build(args) => args,
            _ => panic!("Expected 'build' subcommand"),
        }
    }

    fn merge(name: &str, content: &str, extra: &[&str]) -> Result<BuildJob> {
        let path = write_job_file(name, content);
        let args = build_args(&path, extra);
        PartialBuildConfig::from_file(&path)?.merge_with_cli(&args, TEST_DIR.path())
    }

    #[test]
    fn test_load_from_file_and_merge_with_defaults() {
        let job = merge("job_defaults.toml", MINIMAL_JOB, &[]).unwrap();

        assert_eq!(job.library_path, TEST_DIR.path().join("cells.toml"));
        assert_eq!(job.view, ViewProfile::Default);
        assert_eq!(job.config.wafer_layout.name(), "12x12mm.wlo");
        assert_eq!(job.config.gds_file, "chip.gds");
        assert_eq!(job.config.placements.len(), 2);
        assert_eq!(job.config.placements[0].layers, vec![0]);
        assert_eq!(job.config.placements[0].dose_factor, 1.0);
        assert_eq!(job.config.placements[1].layers, vec![0, 1]);
        assert_eq!(job.config.area, core_config::AreaPolicy::BoundingBox);
        assert_eq!(
            job.config.annealing,
            Some(core_config::AnnealingConfig::default())
        );
        assert_eq!(job.config.estimate, EstimateParams::default());
    }

    #[test]
    fn test_cli_args_override_file_values() {
        let content = format!(
            "{}\n[annealing]\ncooling-rate = 1e-4\nseed = 1\n",
            MINIMAL_JOB
        );
        let job = merge(
            "job_override.toml",
            &content,
            &["--seed", "99", "--cooling-rate", "1e-3", "--view", "minimal"],
        )
        .unwrap();
        let annealing = job.config.annealing.unwrap();
        assert_eq!(annealing.seed, Some(99));
        assert_eq!(annealing.cooling_rate, 1e-3);
        assert_eq!(job.view, ViewProfile::Minimal);

        let job = merge("job_no_sort.toml", &content, &["--no-sort"]).unwrap();
        assert!(job.config.annealing.is_none());
    }

    #[test]
    fn test_set_value_overrides_file_and_defaults() {
        let job = merge(
            "job_set.toml",
            MINIMAL_JOB,
            &[
                "-S",
                "wafer-layout=Bare_8inch.wlo",
                "-S",
                "annealing.max-iterations=500",
                "-S",
                "estimate.area-dose=300",
            ],
        )
        .unwrap();
        assert_eq!(job.config.wafer_layout.name(), "Bare_8inch.wlo");
        assert_eq!(job.config.annealing.unwrap().max_iterations, Some(500));
        assert_eq!(job.config.estimate.area_dose, 300.0);

        let result = merge("job_set_bad.toml", MINIMAL_JOB, &["-S", "annealing.speed=2"]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("annealing.speed")));
    }

    #[test]
    fn test_area_and_matrix_sections_are_merged() {
        let content = format!(
            r#"{}
        [[matrix-copies]]
        select = "Comment == 'First_cell'"
        size = [2, 3]
        row-vector = [0.0, 1.0]
        column-vector = [1.0, 0.0]
        dose-multiply = 1.1

        [area]
        policy = "working-areas"
        file = "areas.wor"
        "#,
            MINIMAL_JOB
        );
        let job = merge("job_sections.toml", &content, &[]).unwrap();
        let copy = &job.config.matrix_copies[0];
        assert_eq!(copy.grid.rows, 2);
        assert_eq!(copy.grid.cols, 3);
        assert_eq!(copy.dose_step, core_config::DoseStep::Multiply(1.1));
        assert_eq!(copy.selection, Selection::cell("First_cell"));
        assert_eq!(
            job.config.area,
            core_config::AreaPolicy::WorkingAreas(TEST_DIR.path().join("areas.wor"))
        );
    }

    #[test]
    fn test_missing_required_field_returns_error() {
        let content = MINIMAL_JOB.replace("gds-file = \"chip.gds\"", "");
        let result = merge("job_missing.toml", &content, &[]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("gds_file")));

        let content = MINIMAL_JOB.replace("cell-library = \"cells.toml\"", "");
        let result = merge("job_missing_library.toml", &content, &[]);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("cell-library")));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let content = format!("{}\nbeam = 3\n", MINIMAL_JOB);
        let result = merge("job_unknown.toml", &content, &[]);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn test_misspelled_area_keys_are_rejected() {
        let content = format!(
            "{}\n[area]\npolicy = \"fixed\"\nrect = [0.0, 0.0, 1.0, 1.0]\ncentred = true\n",
            MINIMAL_JOB
        );
        let result = merge("job_area_typo.toml", &content, &[]);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));

        let content = format!(
            "{}\n[area]\npolicy = \"working-areas\"\nfile = \"a.wor\"\nactive = 2\n",
            MINIMAL_JOB
        );
        let result = merge("job_area_extra.toml", &content, &[]);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));

        let content = format!(
            "{}\n[area]\npolicy = \"fixed\"\nrect = [0.0, 0.0, 1.0, 1.0]\ncentered = true\n",
            MINIMAL_JOB
        );
        let job = merge("job_area_fixed.toml", &content, &[]).unwrap();
        assert!(matches!(
            job.config.area,
            core_config::AreaPolicy::Fixed { centered: true, .. }
        ));
    }
}
