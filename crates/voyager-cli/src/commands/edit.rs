use crate::cli::EditArgs;
use crate::error::{CliError, Result};
use tracing::{info, warn};
use voyager::core::models::{Positionlist, Selection};

fn has_edits(args: &EditArgs) -> bool {
    args.translate.is_some()
        || args.rotate.is_some()
        || args.dose.is_some()
        || args.layer.is_some()
        || args.link.is_some()
        || args.stage_option.is_some()
        || args.file.is_some()
        || args.area.is_some()
        || args.dwelltime.is_some()
        || args.stepsize.is_some()
        || args.wafer_layout.is_some()
        || args.remove
}

/// Applies every requested edit to the selected rows. Removal runs last.
///
/// Returns the number of rows each edit touched, in application order.
pub(crate) fn apply_edits(
    positionlist: &mut Positionlist,
    args: &EditArgs,
) -> Result<Vec<(&'static str, usize)>> {
    let selection = args.selection.clone().unwrap_or(Selection::All);
    let mut applied = Vec::new();

    if let Some(name) = &args.wafer_layout {
        positionlist.set_wafer_layout(name)?;
        applied.push(("wafer layout", positionlist.len()));
    }
    if let Some(offset) = args.translate {
        applied.push(("translate", positionlist.translate(offset, &selection)?));
    }
    if let Some(angle) = args.rotate {
        applied.push(("rotate", positionlist.rotate(angle, args.pivot, &selection)?));
    }
    if let Some(dose) = args.dose {
        applied.push(("dose factor", positionlist.set_dose_factor(dose, &selection)?));
    }
    if let Some(layers) = &args.layer {
        applied.push(("layer", positionlist.set_layer(&layers.0, &selection)?));
    }
    if let Some(link) = &args.link {
        let link = Some(link.as_str()).filter(|l| !l.is_empty());
        applied.push(("link", positionlist.set_link(link, &selection)));
    }
    if let Some(option) = &args.stage_option {
        applied.push(("stage option", positionlist.set_option(option.0, &selection)));
    }
    if let Some(file) = &args.file {
        applied.push(("file", positionlist.assign_file(file, &selection)));
    }
    if let Some(area) = args.area {
        applied.push(("area", positionlist.set_area(&area.to_array(), &selection)?));
    }
    if let Some(dwelltime) = args.dwelltime {
        applied.push(("dwelltime", positionlist.set_dwelltime(dwelltime, &selection)?));
    }
    if let Some(stepsize) = args.stepsize {
        applied.push(("stepsize", positionlist.set_stepsize(stepsize, &selection)?));
    }
    if args.remove {
        applied.push(("remove", positionlist.remove(&selection)));
    }
    Ok(applied)
}

pub fn run(args: EditArgs) -> Result<()> {
    if !has_edits(&args) {
        return Err(CliError::Argument(
            "No edit requested. Pass at least one of --translate, --rotate, --dose, --layer, \
             --link, --option, --file, --area, --dwelltime, --stepsize, --wafer-layout or --remove."
                .to_string(),
        ));
    }

    let mut positionlist = super::read_positionlist(&args.input)?;
    let applied = apply_edits(&mut positionlist, &args)?;
    for (edit, count) in &applied {
        info!("Applied {} to {} entr(ies).", edit, count);
        if *count == 0 {
            warn!("The selection matched no entries for {}.", edit);
        }
    }

    super::write_positionlist(&positionlist, &args.output, args.view)?;
    println!(
        "✓ {} edit(s) applied; {} entr(ies) written to: {}",
        applied.len(),
        positionlist.len(),
        args.output.display()
    );
    Ok(())
}
