use crate::core::geometry::Rect;
use crate::core::models::positionlist::MatrixCopy;
use crate::core::models::selection::Selection;
use crate::core::wafer::WaferLayout;
use crate::engine::estimate::EstimateParams;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_FINAL_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_COOLING_RATE: f64 = 2e-5;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Parameters of the writing-order annealer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingConfig {
    /// Starting temperature; `None` uses twice the number of entries.
    pub initial_temperature: Option<f64>,
    pub final_temperature: f64,
    /// Fraction by which the temperature drops after every iteration.
    pub cooling_rate: f64,
    pub max_iterations: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: None,
            final_temperature: DEFAULT_FINAL_TEMPERATURE,
            cooling_rate: DEFAULT_COOLING_RATE,
            max_iterations: None,
            seed: None,
        }
    }
}

impl AnnealingConfig {
    /// The starting temperature for a list of `n` entries.
    pub fn initial_temperature_for(&self, n: usize) -> f64 {
        self.initial_temperature.unwrap_or(2.0 * n as f64)
    }
}

#[derive(Default)]
pub struct AnnealingConfigBuilder {
    initial_temperature: Option<f64>,
    final_temperature: Option<f64>,
    cooling_rate: Option<f64>,
    max_iterations: Option<u64>,
    seed: Option<u64>,
}

impl AnnealingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_temperature(mut self, temperature: f64) -> Self {
        self.initial_temperature = Some(temperature);
        self
    }
    pub fn final_temperature(mut self, temperature: f64) -> Self {
        self.final_temperature = Some(temperature);
        self
    }
    pub fn cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = Some(rate);
        self
    }
    pub fn max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<AnnealingConfig, ConfigError> {
        let final_temperature = self.final_temperature.unwrap_or(DEFAULT_FINAL_TEMPERATURE);
        if !final_temperature.is_finite() || final_temperature <= 0.0 {
            return Err(invalid(
                "final_temperature",
                format!("must be positive, got {}", final_temperature),
            ));
        }
        if let Some(t0) = self.initial_temperature {
            if !t0.is_finite() || t0 <= 0.0 {
                return Err(invalid(
                    "initial_temperature",
                    format!("must be positive, got {}", t0),
                ));
            }
        }
        let cooling_rate = self.cooling_rate.unwrap_or(DEFAULT_COOLING_RATE);
        if !(cooling_rate > 0.0 && cooling_rate < 1.0) {
            return Err(invalid(
                "cooling_rate",
                format!("must lie strictly between 0 and 1, got {}", cooling_rate),
            ));
        }
        Ok(AnnealingConfig {
            initial_temperature: self.initial_temperature,
            final_temperature,
            cooling_rate,
            max_iterations: self.max_iterations,
            seed: self.seed,
        })
    }
}

/// One cell placed on the wafer.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub cell: String,
    /// Stage position in millimetres.
    pub position: (f64, f64),
    pub layers: Vec<u32>,
    pub dose_factor: f64,
}

/// How the dose changes from one matrix copy to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DoseStep {
    #[default]
    Constant,
    Multiply(f64),
    Add(f64),
}

impl DoseStep {
    pub fn apply(&self, dose: f64) -> f64 {
        match *self {
            DoseStep::Constant => dose,
            DoseStep::Multiply(factor) => dose * factor,
            DoseStep::Add(delta) => dose + delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixCopyStep {
    pub selection: Selection,
    pub grid: MatrixCopy,
    pub dose_step: DoseStep,
}

/// Where the exposed area of each entry comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AreaPolicy {
    /// The rounded-up bounding box of the cell.
    #[default]
    BoundingBox,
    /// One rectangle for every entry, optionally centred on each cell.
    Fixed { area: Rect, centered: bool },
    /// The active working area of each cell, read from a `.wor` file.
    WorkingAreas(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub wafer_layout: WaferLayout,
    pub placements: Vec<Placement>,
    pub matrix_copies: Vec<MatrixCopyStep>,
    /// File name below the tool's GDSII directory.
    pub gds_file: String,
    pub area: AreaPolicy,
    pub annealing: Option<AnnealingConfig>,
    pub estimate: EstimateParams,
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    wafer_layout: Option<WaferLayout>,
    placements: Vec<Placement>,
    matrix_copies: Vec<MatrixCopyStep>,
    gds_file: Option<String>,
    area: Option<AreaPolicy>,
    annealing: Option<AnnealingConfig>,
    estimate: Option<EstimateParams>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wafer_layout(mut self, layout: WaferLayout) -> Self {
        self.wafer_layout = Some(layout);
        self
    }
    pub fn placement(mut self, placement: Placement) -> Self {
        self.placements.push(placement);
        self
    }
    pub fn placements(mut self, placements: impl IntoIterator<Item = Placement>) -> Self {
        self.placements.extend(placements);
        self
    }
    pub fn matrix_copy(mut self, step: MatrixCopyStep) -> Self {
        self.matrix_copies.push(step);
        self
    }
    pub fn gds_file(mut self, file: impl Into<String>) -> Self {
        self.gds_file = Some(file.into());
        self
    }
    pub fn area(mut self, policy: AreaPolicy) -> Self {
        self.area = Some(policy);
        self
    }
    pub fn annealing(mut self, config: Option<AnnealingConfig>) -> Self {
        self.annealing = config;
        self
    }
    pub fn estimate(mut self, params: EstimateParams) -> Self {
        self.estimate = Some(params);
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        if self.placements.is_empty() {
            return Err(ConfigError::MissingParameter("placements"));
        }
        let gds_file = self
            .gds_file
            .filter(|f| !f.trim().is_empty())
            .ok_or(ConfigError::MissingParameter("gds_file"))?;
        Ok(BuildConfig {
            wafer_layout: self
                .wafer_layout
                .ok_or(ConfigError::MissingParameter("wafer_layout"))?,
            placements: self.placements,
            matrix_copies: self.matrix_copies,
            gds_file,
            area: self.area.unwrap_or_default(),
            annealing: self.annealing,
            estimate: self.estimate.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> Placement {
        Placement {
            cell: "cell".to_string(),
            position: (1.0, 1.0),
            layers: vec![0],
            dose_factor: 1.0,
        }
    }

    #[test]
    fn annealing_defaults_match_documented_schedule() {
        let config = AnnealingConfigBuilder::new().build().unwrap();
        assert_eq!(config, AnnealingConfig::default());
        assert_eq!(config.cooling_rate, 2e-5);
        assert_eq!(config.final_temperature, 1.0);
        assert_eq!(config.initial_temperature_for(50), 100.0);
    }

    #[test]
    fn annealing_builder_rejects_out_of_range_values() {
        assert!(matches!(
            AnnealingConfigBuilder::new().cooling_rate(1.0).build(),
            Err(ConfigError::InvalidParameter { name: "cooling_rate", .. })
        ));
        assert!(matches!(
            AnnealingConfigBuilder::new().final_temperature(0.0).build(),
            Err(ConfigError::InvalidParameter { name: "final_temperature", .. })
        ));
        assert!(matches!(
            AnnealingConfigBuilder::new().initial_temperature(-3.0).build(),
            Err(ConfigError::InvalidParameter { name: "initial_temperature", .. })
        ));
    }

    #[test]
    fn build_config_requires_layout_placements_and_file() {
        assert_eq!(
            BuildConfigBuilder::new().gds_file("a.gds").build(),
            Err(ConfigError::MissingParameter("placements"))
        );
        assert_eq!(
            BuildConfigBuilder::new().placement(placement()).build(),
            Err(ConfigError::MissingParameter("gds_file"))
        );
        assert_eq!(
            BuildConfigBuilder::new()
                .placement(placement())
                .gds_file("a.gds")
                .build(),
            Err(ConfigError::MissingParameter("wafer_layout"))
        );
        let config = BuildConfigBuilder::new()
            .wafer_layout(WaferLayout::default())
            .placement(placement())
            .gds_file("a.gds")
            .build()
            .unwrap();
        assert_eq!(config.area, AreaPolicy::BoundingBox);
        assert!(config.annealing.is_none());
    }

    #[test]
    fn dose_steps_apply_once_per_call() {
        assert_eq!(DoseStep::Constant.apply(1.5), 1.5);
        assert_eq!(DoseStep::Multiply(2.0).apply(1.5), 3.0);
        assert_eq!(DoseStep::Add(0.25).apply(1.5), 1.75);
    }
}
