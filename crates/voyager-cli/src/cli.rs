use crate::utils::parser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use voyager::core::geometry::Rect;
use voyager::core::io::pls::ViewProfile;
use voyager::core::models::positionlist::Pivot;
use voyager::core::models::selection::Selection;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Jente Vandersmissen",
    version,
    about = "VOYAGER CLI - Build, edit and optimize positionlists and working areas for the RAITH VOYAGER electron-beam lithography system.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a positionlist from a TOML job description.
    Build(BuildArgs),
    /// Optimize the writing order of an existing positionlist.
    Sort(SortArgs),
    /// Print the entries of a positionlist as a table.
    Show(ShowArgs),
    /// Modify selected entries of a positionlist.
    Edit(EditArgs),
    /// Estimate the writing area and writing time of a positionlist.
    Estimate(EstimateArgs),
    /// Inspect and modify a working area (.wor) file.
    Wor(WorArgs),
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Path to the job description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Path for the output positionlist (.pls).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Override the cell library named in the job file.
    #[arg(short = 'l', long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Column view profile written to the file ('default' or 'minimal').
    #[arg(long, value_name = "VIEW")]
    pub view: Option<ViewProfile>,

    /// Seed for the writing-order optimizer.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the annealing cooling rate.
    #[arg(long, value_name = "FLOAT")]
    pub cooling_rate: Option<f64>,

    /// Keep the order of the job file; skip the writing-order optimizer.
    #[arg(long)]
    pub no_sort: bool,

    /// Set a specific configuration value, overriding the job file.
    /// Can be used multiple times. Example: -S annealing.seed=42
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `sort` subcommand.
#[derive(Args, Debug)]
pub struct SortArgs {
    /// Path to the input positionlist.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the sorted positionlist.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Seed for the optimizer. A random seed is drawn when omitted.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    #[arg(long, value_name = "FLOAT")]
    pub cooling_rate: Option<f64>,

    /// Starting temperature. Defaults to twice the number of entries.
    #[arg(long, value_name = "FLOAT")]
    pub initial_temperature: Option<f64>,

    #[arg(long, value_name = "FLOAT")]
    pub final_temperature: Option<f64>,

    /// Stop after this many iterations even if the schedule has not finished.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<u64>,

    #[arg(long, value_name = "VIEW", default_value = "default")]
    pub view: ViewProfile,
}

/// Arguments for the `show` subcommand.
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Only show entries matching this expression, e.g. "DoseFactor > 1 and Layer == 0".
    #[arg(long = "select", value_name = "EXPR")]
    pub selection: Option<Selection>,

    /// Comma-separated column names to display.
    #[arg(long, value_name = "COLUMNS", value_parser = parser::parse_columns)]
    pub columns: Option<parser::ColumnList>,
}

/// Arguments for the `edit` subcommand.
#[derive(Args, Debug)]
pub struct EditArgs {
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Restrict every edit to entries matching this expression.
    #[arg(long = "select", value_name = "EXPR")]
    pub selection: Option<Selection>,

    /// Shift the selected entries by DU,DV millimetres.
    #[arg(long, value_name = "DU,DV", value_parser = parser::parse_pair, allow_hyphen_values = true)]
    pub translate: Option<(f64, f64)>,

    /// Rotate the selected entries counter-clockwise by this angle in radians.
    #[arg(long, value_name = "RAD", allow_hyphen_values = true)]
    pub rotate: Option<f64>,

    /// Rotation pivot: origin, corner, center or U,V.
    #[arg(long, value_name = "PIVOT", default_value = "origin", allow_hyphen_values = true)]
    pub pivot: Pivot,

    #[arg(long, value_name = "FLOAT")]
    pub dose: Option<f64>,

    /// Comma-separated layer numbers.
    #[arg(long, value_name = "L,..", value_parser = parser::parse_layers)]
    pub layer: Option<parser::LayerList>,

    /// Link target; an empty value clears it.
    #[arg(long, value_name = "TEXT")]
    pub link: Option<String>,

    /// Stage option after exposure: STAY, DRIVE or none.
    #[arg(long = "option", value_name = "OPTION", value_parser = parser::parse_stage_option)]
    pub stage_option: Option<parser::OptionalStageOption>,

    /// GDSII file name below the tool's GDSII directory.
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,

    /// Exposed area as LEFT,BOTTOM,RIGHT,TOP.
    #[arg(long, value_name = "L,B,R,T", value_parser = parser::parse_rect, allow_hyphen_values = true)]
    pub area: Option<Rect>,

    #[arg(long, value_name = "FLOAT")]
    pub dwelltime: Option<f64>,

    /// Dual-beam stepsizes as SU[,SV]; a single value sets both.
    #[arg(long, value_name = "SU[,SV]", value_parser = parser::parse_stepsize)]
    pub stepsize: Option<(f64, f64)>,

    /// Change the wafer layout of the positionlist.
    #[arg(long, value_name = "NAME")]
    pub wafer_layout: Option<String>,

    /// Remove the selected entries after all other edits.
    #[arg(long)]
    pub remove: bool,

    #[arg(long, value_name = "VIEW", default_value = "default")]
    pub view: ViewProfile,
}

/// Arguments for the `estimate` subcommand.
#[derive(Args, Debug)]
pub struct EstimateArgs {
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Cell library providing the geometry of every referenced cell.
    #[arg(short = 'l', long, required = true, value_name = "PATH")]
    pub library: PathBuf,

    /// Beam current in ampere.
    #[arg(long, value_name = "A")]
    pub beam_current: Option<f64>,

    /// Area dose in uC/cm^2.
    #[arg(long, value_name = "DOSE")]
    pub area_dose: Option<f64>,
}

/// Arguments for the `wor` subcommand.
#[derive(Args, Debug)]
pub struct WorArgs {
    #[command(subcommand)]
    pub command: WorCommands,
}

#[derive(Args, Debug, Clone)]
pub struct WorFileArg {
    /// Path to the working area file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub file: PathBuf,
}

/// Available commands for working area files.
#[derive(Subcommand, Debug)]
pub enum WorCommands {
    /// List every cell with its working areas; '*' marks the active one.
    Show {
        #[command(flatten)]
        target: WorFileArg,
    },
    /// Append a working area to a cell and make it active. Creates the file if needed.
    Add {
        #[command(flatten)]
        target: WorFileArg,
        #[arg(long, required = true)]
        cell: String,
        /// The rectangle as LEFT,BOTTOM,RIGHT,TOP.
        #[arg(long, required = true, value_name = "L,B,R,T", value_parser = parser::parse_rect, allow_hyphen_values = true)]
        area: Rect,
    },
    /// Delete one working area of a cell, or the whole record without --index.
    Delete {
        #[command(flatten)]
        target: WorFileArg,
        #[arg(long, required = true)]
        cell: String,
        #[arg(long, value_name = "INT")]
        index: Option<usize>,
    },
    /// Make a working area of a cell the active one.
    Activate {
        #[command(flatten)]
        target: WorFileArg,
        #[arg(long, required = true)]
        cell: String,
        #[arg(long, required = true, value_name = "INT")]
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn edit_accepts_negative_pairs_and_named_pivots() {
        let cli = Cli::parse_from([
            "voyager", "edit", "-i", "in.pls", "-o", "out.pls", "--translate", "-1.5,2",
            "--rotate", "-0.5", "--pivot", "center", "--select", "ID in {0, 1}",
        ]);
        let Commands::Edit(args) = cli.command else {
            panic!("Expected 'edit' subcommand");
        };
        assert_eq!(args.translate, Some((-1.5, 2.0)));
        assert_eq!(args.rotate, Some(-0.5));
        assert_eq!(args.pivot, Pivot::Center);
        assert!(args.selection.is_some());
        assert_eq!(args.view, ViewProfile::Default);
    }

    #[test]
    fn wor_subcommands_take_the_file_after_the_action() {
        let cli = Cli::parse_from([
            "voyager", "wor", "add", "-f", "areas.wor", "--cell", "chip", "--area",
            "-1,-1,1,1",
        ]);
        let Commands::Wor(WorArgs {
            command: WorCommands::Add { target, cell, area },
        }) = cli.command
        else {
            panic!("Expected 'wor add' subcommand");
        };
        assert_eq!(target.file, PathBuf::from("areas.wor"));
        assert_eq!(cell, "chip");
        assert_eq!(area, Rect::new(-1.0, -1.0, 1.0, 1.0));
    }
}
