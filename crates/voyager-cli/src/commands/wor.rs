use crate::cli::{WorArgs, WorCommands};
use crate::error::{CliError, Result};
use std::path::Path;
use tracing::info;
use voyager::core::models::WorkingAreaRegistry;

fn read_registry(path: &Path) -> Result<WorkingAreaRegistry> {
    WorkingAreaRegistry::read(path).map_err(|e| CliError::parsing(path, e))
}

fn write_registry(registry: &WorkingAreaRegistry, path: &Path) -> Result<()> {
    registry.write(path).map_err(|e| CliError::writing(path, e))
}

/// One line per cell; the active rectangle is marked with `*`.
pub(crate) fn describe(registry: &WorkingAreaRegistry) -> String {
    let mut out = String::new();
    for (cell, set) in registry.iter() {
        out.push_str(cell);
        out.push('\n');
        for (i, rect) in set.rects().iter().enumerate() {
            let marker = if i == set.active() { '*' } else { ' ' };
            out.push_str(&format!(
                " {} [{}] {}, {}, {}, {}\n",
                marker, i, rect.left, rect.bottom, rect.right, rect.top
            ));
        }
    }
    out
}

pub fn run(args: WorArgs) -> Result<()> {
    match args.command {
        WorCommands::Show { target } => {
            let registry = read_registry(&target.file)?;
            if registry.is_empty() {
                println!("{} holds no working areas.", target.file.display());
            } else {
                print!("{}", describe(&registry));
            }
        }
        WorCommands::Add { target, cell, area } => {
            let mut registry = if target.file.exists() {
                read_registry(&target.file)?
            } else {
                info!("Creating new working area file {:?}", target.file);
                WorkingAreaRegistry::new()
            };
            let index = registry.add(&cell, area)?;
            write_registry(&registry, &target.file)?;
            println!("✓ Added working area {} to cell '{}'.", index, cell);
        }
        WorCommands::Delete {
            target,
            cell,
            index,
        } => {
            let mut registry = read_registry(&target.file)?;
            registry.delete(&cell, index)?;
            write_registry(&registry, &target.file)?;
            match index {
                Some(index) => println!("✓ Deleted working area {} of cell '{}'.", index, cell),
                None => println!("✓ Deleted all working areas of cell '{}'.", cell),
            }
        }
        WorCommands::Activate {
            target,
            cell,
            index,
        } => {
            let mut registry = read_registry(&target.file)?;
            registry.set_active(&cell, index)?;
            write_registry(&registry, &target.file)?;
            println!("✓ Working area {} of cell '{}' is now active.", index, cell);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use tempfile::tempdir;

    fn wor_args(argv: &[&str]) -> WorArgs {
        let mut full = vec!["voyager", "wor"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Wor(args) => args,
            _ => panic!("Expected 'wor' subcommand"),
        }
    }

    #[test]
    fn add_creates_the_file_and_activate_switches_areas() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("areas.wor");
        let file = path.to_str().unwrap();

        run(wor_args(&["add", "-f", file, "--cell", "chip", "--area", "-1,-1,1,1"])).unwrap();
        run(wor_args(&["add", "-f", file, "--cell", "chip", "--area", "0,0,2,2"])).unwrap();
        let registry = read_registry(&path).unwrap();
        assert_eq!(registry.get("chip").unwrap().len(), 2);
        assert_eq!(registry.get("chip").unwrap().active(), 1);

        run(wor_args(&["activate", "-f", file, "--cell", "chip", "--index", "0"])).unwrap();
        let registry = read_registry(&path).unwrap();
        assert_eq!(registry.get("chip").unwrap().active(), 0);
        assert!(describe(&registry).contains(" * [0] -1, -1, 1, 1"));
    }

    #[test]
    fn delete_without_index_drops_the_cell() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("areas.wor");
        let file = path.to_str().unwrap();

        run(wor_args(&["add", "-f", file, "--cell", "a", "--area", "0,0,1,1"])).unwrap();
        run(wor_args(&["add", "-f", file, "--cell", "b", "--area", "0,0,1,1"])).unwrap();
        run(wor_args(&["delete", "-f", file, "--cell", "a"])).unwrap();

        let registry = read_registry(&path).unwrap();
        assert!(!registry.contains("a"));
        assert!(registry.contains("b"));
    }

    #[test]
    fn activating_a_missing_index_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("areas.wor");
        let file = path.to_str().unwrap();
        run(wor_args(&["add", "-f", file, "--cell", "a", "--area", "0,0,1,1"])).unwrap();

        let result = run(wor_args(&["activate", "-f", file, "--cell", "a", "--index", "3"]));
        assert!(matches!(result, Err(CliError::WorkingArea(_))));
    }
}
