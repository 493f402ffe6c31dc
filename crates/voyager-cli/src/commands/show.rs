use crate::cli::ShowArgs;
use crate::error::Result;
use voyager::core::models::positionlist::SUMMARY_COLUMNS;
use voyager::core::models::{Column, Selection};

pub fn run(args: ShowArgs) -> Result<()> {
    let positionlist = super::read_positionlist(&args.input)?;
    let columns: Vec<Column> = match args.columns {
        Some(list) => list.0,
        None => {
            let mut columns = SUMMARY_COLUMNS.to_vec();
            if positionlist.stepsize_enabled() {
                columns.extend([Column::StepsizeU, Column::StepsizeV]);
            }
            columns
        }
    };
    let selection = args.selection.unwrap_or(Selection::All);

    println!(
        "{} ({} entr(ies), wafer layout {})",
        args.input.display(),
        positionlist.len(),
        positionlist.wafer_layout()
    );
    println!("{}", positionlist.table_of(&columns, &selection));
    Ok(())
}
