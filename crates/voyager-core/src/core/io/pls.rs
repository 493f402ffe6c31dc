use crate::core::io::traits::ToolFile;
use crate::core::models::column::{Column, FORMAT_PREFIX_COLUMNS};
use crate::core::models::entry::{EntryError, PositionlistEntry};
use crate::core::models::positionlist::Positionlist;
use crate::core::wafer::{WaferError, WaferLayout};
use phf::{Map, phf_map};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PlsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error in [DATA] section: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing {0} section")]
    MissingSection(&'static str),
    #[error("Missing WAFERLAYOUT record in [HEADER] section")]
    MissingWaferLayout,
    #[error(transparent)]
    Wafer(#[from] WaferError),
    #[error("Required column {0} is not listed in the [COLUMNS] section")]
    MissingColumn(Column),
    #[error("Invalid data row {row}: {source}")]
    Row { row: usize, source: EntryError },
    #[error("{count} entry(ies) with an unassigned file. Use Positionlist::assign_file() first.")]
    MissingFile { count: usize },
    #[error("{count} entry(ies) without a defined area. Use Positionlist::update_area() before writing.")]
    MissingArea { count: usize },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown view '{0}': expected 'default' or 'minimal'")]
pub struct UnknownView(pub String);

/// Which columns the VOYAGER shows, and how, when it opens the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewProfile {
    #[default]
    Default,
    Minimal,
}

static VISIBLE_DEFAULT: Map<&'static str, u32> = phf_map! {
    "ID" => 25,
    "U" => 50,
    "V" => 50,
    "Attribute" => 55,
    "Template" => 55,
    "Comment" => 100,
    "Options" => 165,
    "Type" => 85,
    "Pos1" => 85,
    "Pos2" => 85,
    "Pos3" => 85,
    "Link" => 25,
    "File" => 154,
    "Layer" => 80,
    "DoseFactor" => 55,
    "FBMSArea" => 88,
    "FBMSLines" => 81,
    "Time" => 85,
    "StepsizeU" => 50,
    "StepsizeV" => 50,
    "CurveLine" => 50,
};

static DIMENSIONS_DEFAULT: Map<&'static str, Option<&'static str>> = phf_map! {
    "X" => None,
    "Y" => None,
    "Z" => None,
    "R" => None,
    "T" => None,
    "U" => None,
    "V" => None,
    "W" => None,
    "Size-U" => Some("um"),
    "Size-V" => Some("um"),
    "Points-U" => Some("px"),
    "Points-V" => Some("px"),
    "Pos1" => Some("um"),
    "Pos2" => Some("um"),
    "Pos3" => Some("um"),
    "Dwelltime" => Some("ms"),
    "Stepsize" => Some("um"),
    "SplDwell" => Some("ms"),
    "SplStep" => Some("um"),
    "CurveStep" => Some("um"),
    "CurveDwell" => Some("ms"),
    "DotDwell" => Some("ms"),
    "FBMSArea" => Some("mm/s"),
    "FBMSLines" => Some("mm/s"),
};

static VISIBLE_MINIMAL: Map<&'static str, u32> = phf_map! {
    "ID" => 25,
    "U" => 50,
    "V" => 50,
    "Comment" => 100,
    "File" => 154,
    "Layer" => 80,
    "DoseFactor" => 55,
    "StepsizeU" => 50,
    "StepsizeV" => 50,
};

static DIMENSIONS_MINIMAL: Map<&'static str, Option<&'static str>> = phf_map! {
    "U" => Some("mm"),
    "V" => Some("mm"),
    "StepsizeU" => Some("um"),
    "StepsizeV" => Some("um"),
};

static COLUMN_DEFAULTS: Map<&'static str, &'static str> = phf_map! {
    "Attribute" => "A",
    "Template" => "UV",
};

const HIDDEN_WIDTH: u32 = 50;

impl ViewProfile {
    fn visible(&self) -> &'static Map<&'static str, u32> {
        match self {
            ViewProfile::Default => &VISIBLE_DEFAULT,
            ViewProfile::Minimal => &VISIBLE_MINIMAL,
        }
    }

    fn dimensions(&self) -> &'static Map<&'static str, Option<&'static str>> {
        match self {
            ViewProfile::Default => &DIMENSIONS_DEFAULT,
            ViewProfile::Minimal => &DIMENSIONS_MINIMAL,
        }
    }

    /// The `[COLUMNS]` record describing `column` under this profile.
    pub fn column_record(&self, column: Column) -> String {
        let name = column.name();
        let mut record = match self.visible().get(name) {
            Some(width) => format!("{}=W:{},VISIBLE", name, width),
            None => format!("{}=W:{},!VISIBLE", name, HIDDEN_WIDTH),
        };
        if let Some(default) = COLUMN_DEFAULTS.get(name) {
            record.push_str(",DEFAULT:");
            record.push_str(default);
        }
        match self.dimensions().get(name) {
            Some(Some(unit)) => {
                record.push_str(",DIM:");
                record.push_str(unit);
                record.push_str(",SHOWDIM");
            }
            Some(None) => record.push_str(",SHOWDIM"),
            None => record.push_str(",!SHOWDIM"),
        }
        record
    }
}

impl FromStr for ViewProfile {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(ViewProfile::Default),
            "minimal" => Ok(ViewProfile::Minimal),
            _ => Err(UnknownView(s.to_string())),
        }
    }
}

impl fmt::Display for ViewProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViewProfile::Default => "default",
            ViewProfile::Minimal => "minimal",
        })
    }
}

fn write_header(
    writer: &mut impl Write,
    columns: &[Column],
    layout: &WaferLayout,
    view: ViewProfile,
) -> io::Result<()> {
    let mut format = String::from("FORMAT=IXYZRTUVWATC");
    for column in columns
        .iter()
        .filter(|c| !FORMAT_PREFIX_COLUMNS.contains(c))
    {
        format.push(',');
        format.push_str(column.name());
        format.push_str(",0");
    }

    writeln!(writer)?;
    writeln!(writer, "[HEADER]")?;
    writeln!(writer, "{}", format)?;
    writeln!(writer, "WAFERLAYOUT={}", layout.name())?;
    writeln!(writer, "LotID=")?;
    writeln!(writer, "WaferID=")?;
    writeln!(writer, "Slot=")?;
    writeln!(writer, "MinimizeWin=FALSE")?;
    writeln!(writer)?;
    writeln!(writer, "[COLUMNS]")?;
    writeln!(writer, "No.=W:25,!VISIBLE,!SHOWDIM")?;
    for column in columns {
        writeln!(writer, "{}", view.column_record(*column))?;
    }
    writeln!(writer)?;
    writeln!(writer, "[DATA]")?;
    Ok(())
}

fn section_index(lines: &[String], marker: &'static str) -> Result<usize, PlsError> {
    lines
        .iter()
        .position(|l| l.trim() == marker)
        .ok_or(PlsError::MissingSection(marker))
}

pub struct PlsFile;

impl ToolFile for PlsFile {
    type Document = Positionlist;
    type WriteOptions = ViewProfile;
    type Error = PlsError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Document, Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        let header = section_index(&lines, "[HEADER]")?;
        let columns_start = section_index(&lines, "[COLUMNS]")?;
        let data_start = section_index(&lines, "[DATA]")?;

        let layout_name = lines[header..]
            .iter()
            .find_map(|l| l.trim().strip_prefix("WAFERLAYOUT="))
            .ok_or(PlsError::MissingWaferLayout)?;
        let layout = WaferLayout::from_name(layout_name.trim())?;

        let mut columns: Vec<Option<Column>> = Vec::new();
        let column_lines = lines
            .get(columns_start + 1..data_start)
            .unwrap_or_default();
        for line in column_lines {
            let Some((name, _)) = line.trim().split_once('=') else {
                continue;
            };
            if name == "No." {
                continue;
            }
            let column = Column::from_name(name);
            if column.is_none() {
                warn!("Ignoring unknown positionlist column '{}'", name);
            }
            columns.push(column);
        }
        for required in [Column::U, Column::V] {
            if !columns.contains(&Some(required)) {
                return Err(PlsError::MissingColumn(required));
            }
        }
        let stepsize_enabled = columns.iter().flatten().any(|c| {
            matches!(c, Column::StepsizeU | Column::StepsizeV | Column::CurveLine)
        });

        let data = lines[data_start + 1..].join("\n");
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut entries = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record?;
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            if record.len() > columns.len() {
                warn!(
                    "Data row {} has {} fields but only {} columns are declared",
                    row + 1,
                    record.len(),
                    columns.len()
                );
            }
            let mut entry = PositionlistEntry::new(entries.len(), "", 0.0, 0.0);
            for (column, field) in columns.iter().zip(record.iter()) {
                if let Some(column) = column {
                    entry
                        .set_text(*column, field)
                        .map_err(|source| PlsError::Row {
                            row: row + 1,
                            source,
                        })?;
                }
            }
            entries.push(entry);
        }

        debug!(
            "Read {} positionlist entr(ies) for wafer layout '{}'",
            entries.len(),
            layout
        );
        Ok(Positionlist::from_parts(layout, entries, stepsize_enabled))
    }

    fn write_to(
        positionlist: &Self::Document,
        view: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        positionlist.check_writable()?;
        let columns = positionlist.columns();
        write_header(writer, &columns, &positionlist.wafer_layout(), *view)?;

        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        for entry in positionlist.iter() {
            csv_writer.write_record(columns.iter().map(|c| entry.text(*c)))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{LayoutCell, Polygon};
    use crate::core::models::entry::StageOption;
    use crate::core::models::selection::Selection;
    use nalgebra::Point2;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn cell(name: &str, size: f64) -> LayoutCell {
        LayoutCell::with_polygons(
            name,
            vec![Polygon::rectangle(
                0,
                1000,
                Point2::new(-size, -size),
                Point2::new(size, size),
            )],
        )
    }

    fn writable_positionlist() -> Positionlist {
        let mut pls = Positionlist::new(WaferLayout::from_name("12x12mm.wlo").unwrap());
        pls.add(&cell("First_cell", 50.0), (3.0, 3.0), &[0], 1.0)
            .unwrap();
        pls.add(&cell("Second, cell", 25.125), (3.2, 3.0), &[0, 1], 1.2)
            .unwrap();
        pls.assign_file("chip.gds", &Selection::All);
        pls
    }

    fn write_to_string(pls: &Positionlist, view: ViewProfile) -> String {
        let mut buffer = Vec::new();
        PlsFile::write_to(pls, &view, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn header_lists_non_prefix_columns_and_profile_records() {
        let text = write_to_string(&writable_positionlist(), ViewProfile::Default);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "[HEADER]");
        assert!(lines[2].starts_with("FORMAT=IXYZRTUVWATC,Options,0,Type,0,Size-U,0"));
        assert!(lines[2].ends_with(",Method,0,Dot,0"));
        assert_eq!(lines[3], "WAFERLAYOUT=12x12mm.wlo");
        assert_eq!(&lines[4..8], &["LotID=", "WaferID=", "Slot=", "MinimizeWin=FALSE"]);
        assert_eq!(lines[10], "No.=W:25,!VISIBLE,!SHOWDIM");
        assert_eq!(lines[11], "ID=W:25,VISIBLE,!SHOWDIM");
        assert!(lines.contains(&"X=W:50,!VISIBLE,SHOWDIM"));
        assert!(lines.contains(&"Attribute=W:55,VISIBLE,DEFAULT:A,!SHOWDIM"));
        assert!(lines.contains(&"Size-U=W:50,!VISIBLE,DIM:um,SHOWDIM"));
        assert!(lines.contains(&"FBMSArea=W:88,VISIBLE,DIM:mm/s,SHOWDIM"));
        assert!(!text.contains("StepsizeU"));
    }

    #[test]
    fn minimal_profile_uses_its_own_tables() {
        let view: ViewProfile = "minimal".parse().unwrap();
        assert_eq!(view.column_record(Column::U), "U=W:50,VISIBLE,DIM:mm,SHOWDIM");
        assert_eq!(
            view.column_record(Column::Template),
            "Template=W:50,!VISIBLE,DEFAULT:UV,!SHOWDIM"
        );
        assert_eq!(
            view.column_record(Column::Pos1),
            "Pos1=W:50,!VISIBLE,!SHOWDIM"
        );
        assert_eq!(
            "fancy".parse::<ViewProfile>(),
            Err(UnknownView("fancy".to_string()))
        );
    }

    #[test]
    fn data_rows_flatten_lists_and_leave_undefined_values_empty() {
        let text = write_to_string(&writable_positionlist(), ViewProfile::Default);
        let data: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "[DATA]")
            .skip(1)
            .collect();
        assert_eq!(data.len(), 2);
        assert!(data[0].starts_with("0,,,,,,3,3,,XN,UV,First_cell,,EXPOSURE,100,100,"));
        assert!(data[0].contains(",%UserRoot%GDSII\\chip.gds,0,-50;-50;50;50,1,"));
        assert!(data[1].contains(",\"Second, cell\","));
        assert!(data[1].contains(",0;1,-25.13;-25.13;25.13;25.13,1.2,"));
    }

    #[test]
    fn round_trip_reproduces_every_written_field() {
        let mut pls = writable_positionlist();
        pls.toggle_stepsize();
        pls.set_stepsize((0.5, 0.25), &Selection::ids([1])).unwrap();
        pls.set_option(Some(StageOption::Stay), &Selection::All);
        pls.set_link(Some("7"), &Selection::ids([0]));
        pls.set_dwelltime(0.0125, &Selection::All).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.pls");
        pls.write(&path, ViewProfile::Default).unwrap();
        let restored = Positionlist::read(&path).unwrap();

        assert_eq!(restored.wafer_layout(), pls.wafer_layout());
        assert!(restored.stepsize_enabled());
        assert_eq!(restored.entries(), pls.entries());
        assert_eq!(restored.cells().count(), 0);
    }

    #[test]
    fn write_refuses_rows_without_file_or_area() {
        let mut pls = Positionlist::new(WaferLayout::default());
        pls.add(&cell("a", 1.0), (0.0, 0.0), &[0], 1.0).unwrap();
        let mut sink = Vec::new();
        let err = PlsFile::write_to(&pls, &ViewProfile::Default, &mut sink).unwrap_err();
        assert!(matches!(err, PlsError::MissingFile { count: 1 }));
        assert!(err.to_string().contains("assign_file"));
        assert!(sink.is_empty());

        pls.assign_file("a.gds", &Selection::All);
        pls.add(&LayoutCell::new("empty"), (1.0, 0.0), &[0], 1.0)
            .unwrap();
        pls.assign_file("a.gds", &Selection::All);
        let err = PlsFile::write_to(&pls, &ViewProfile::Default, &mut sink).unwrap_err();
        assert!(matches!(err, PlsError::MissingArea { count: 1 }));
        assert!(err.to_string().contains("update_area"));
    }

    #[test]
    fn read_ignores_unknown_columns_and_keeps_opaque_ones() {
        let text = "\n[HEADER]\nFORMAT=IXYZRTUVWATC\nWAFERLAYOUT=10x10.wlo\n\n[COLUMNS]\n\
                    No.=W:25,!VISIBLE,!SHOWDIM\nID=W:25,VISIBLE,!SHOWDIM\nU=W:50,VISIBLE,SHOWDIM\n\
                    V=W:50,VISIBLE,SHOWDIM\nComment=W:100,VISIBLE,!SHOWDIM\nMystery=W:50,!VISIBLE,!SHOWDIM\n\
                    Method=W:50,!VISIBLE,!SHOWDIM\n\n[DATA]\n4,1.5,2.5,cell,?,Raster\n";
        let pls = PlsFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(pls.len(), 1);
        let entry = &pls.entries()[0];
        assert_eq!(entry.id, 4);
        assert_eq!((entry.u, entry.v), (1.5, 2.5));
        assert_eq!(entry.comment, "cell");
        assert_eq!(entry.extra.get(&Column::Method).map(String::as_str), Some("Raster"));
        assert!(!pls.stepsize_enabled());
    }

    #[test]
    fn read_rejects_unknown_layouts_and_missing_sections() {
        let text = "[HEADER]\nWAFERLAYOUT=13x13.wlo\n[COLUMNS]\nU=\nV=\n[DATA]\n";
        assert!(matches!(
            PlsFile::read_from(&mut Cursor::new(text)),
            Err(PlsError::Wafer(WaferError::UnknownLayout(name))) if name == "13x13.wlo"
        ));
        let text = "[HEADER]\nWAFERLAYOUT=10x10.wlo\n[COLUMNS]\nU=\nV=\n";
        assert!(matches!(
            PlsFile::read_from(&mut Cursor::new(text)),
            Err(PlsError::MissingSection("[DATA]"))
        ));
    }

    #[test]
    fn read_reports_bad_rows() {
        let text = "[HEADER]\nWAFERLAYOUT=10x10.wlo\n[COLUMNS]\nU=\nV=\nDoseFactor=\n[DATA]\n1,2,1\n1,2,zero\n";
        assert!(matches!(
            PlsFile::read_from(&mut Cursor::new(text)),
            Err(PlsError::Row { row: 2, .. })
        ));
    }
}
