use super::column::Column;
use crate::core::geometry::{Cell, Rect, round_up};
use crate::core::geometry::rect::ROUNDING_DECIMALS;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_ATTRIBUTE: &str = "XN";
pub const DEFAULT_TEMPLATE: &str = "UV";
pub const DEFAULT_ENTRY_TYPE: &str = "EXPOSURE";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum EntryError {
    #[error("Cell name must not be empty")]
    EmptyCellName,
    #[error("Position ({u}, {v}) must be finite")]
    NonFinitePosition { u: f64, v: f64 },
    #[error("At least one layer is required")]
    NoLayers,
    #[error("Dose factor must be positive and finite, got {0}")]
    InvalidDoseFactor(f64),
    #[error("Invalid stage option '{0}': expected STAY, DRIVE or none")]
    InvalidOption(String),
    #[error("Invalid value '{value}' for column {column}")]
    InvalidValue { column: Column, value: String },
    #[error("Column {0} requires a value")]
    MissingValue(Column),
}

/// Stage behaviour after an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOption {
    Stay,
    Drive,
}

impl StageOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOption::Stay => "STAY",
            StageOption::Drive => "DRIVE",
        }
    }

    /// Parses `STAY`, `DRIVE` or `none`/empty (case-insensitive).
    pub fn parse_optional(s: &str) -> Result<Option<Self>, EntryError> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        s.parse().map(Some)
    }
}

impl FromStr for StageOption {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAY" => Ok(StageOption::Stay),
            "DRIVE" => Ok(StageOption::Drive),
            _ => Err(EntryError::InvalidOption(s.to_string())),
        }
    }
}

impl fmt::Display for StageOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a positionlist.
///
/// Columns VOYAGER defines but this crate never interprets are kept verbatim
/// in `extra`, so tables read from the tool are written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionlistEntry {
    pub id: usize,
    pub u: f64,
    pub v: f64,
    pub attribute: Option<String>,
    pub template: Option<String>,
    /// The name of the cell this row exposes.
    pub comment: String,
    pub options: Option<StageOption>,
    pub entry_type: Option<String>,
    pub size_u: Option<f64>,
    pub size_v: Option<f64>,
    pub pos1: Option<f64>,
    pub pos2: Option<f64>,
    pub pos3: Option<f64>,
    pub link: Option<String>,
    pub file: Option<String>,
    pub layer: Vec<u32>,
    pub area: Option<Rect>,
    pub dose_factor: f64,
    pub dwelltime: Option<f64>,
    pub stepsize_u: Option<f64>,
    pub stepsize_v: Option<f64>,
    pub fbms_area: Option<f64>,
    pub fbms_lines: Option<f64>,
    pub extra: BTreeMap<Column, String>,
}

impl PositionlistEntry {
    /// A bare row with no cell-derived metadata.
    pub fn new(id: usize, comment: impl Into<String>, u: f64, v: f64) -> Self {
        Self {
            id,
            u,
            v,
            attribute: None,
            template: None,
            comment: comment.into(),
            options: None,
            entry_type: None,
            size_u: None,
            size_v: None,
            pos1: None,
            pos2: None,
            pos3: None,
            link: None,
            file: None,
            layer: Vec::new(),
            area: None,
            dose_factor: 1.0,
            dwelltime: None,
            stepsize_u: None,
            stepsize_v: None,
            fbms_area: None,
            fbms_lines: None,
            extra: BTreeMap::new(),
        }
    }

    /// Builds the row that exposes `cell` at stage position `(u, v)` mm.
    ///
    /// Sizes and the area are the cell's bounding box rounded outward; an
    /// empty cell leaves them undefined.
    pub fn from_cell<C: Cell + ?Sized>(
        id: usize,
        cell: &C,
        (u, v): (f64, f64),
        layers: &[u32],
        dose_factor: f64,
    ) -> Result<Self, EntryError> {
        if cell.name().is_empty() {
            return Err(EntryError::EmptyCellName);
        }
        if !u.is_finite() || !v.is_finite() {
            return Err(EntryError::NonFinitePosition { u, v });
        }
        if layers.is_empty() {
            return Err(EntryError::NoLayers);
        }
        validate_dose_factor(dose_factor)?;

        let mut entry = Self::new(id, cell.name(), u, v);
        entry.attribute = Some(DEFAULT_ATTRIBUTE.to_string());
        entry.template = Some(DEFAULT_TEMPLATE.to_string());
        entry.entry_type = Some(DEFAULT_ENTRY_TYPE.to_string());
        entry.layer = layers.to_vec();
        entry.dose_factor = dose_factor;

        if let Some(bbox) = cell.bounding_box() {
            entry.size_u = Some(round_up(bbox.width(), ROUNDING_DECIMALS));
            entry.size_v = Some(round_up(bbox.height(), ROUNDING_DECIMALS));
            entry.pos1 = Some(bbox.width() / 2.0);
            entry.pos2 = Some(bbox.height() / 2.0);
            entry.area = Some(bbox.round_up());
        }
        Ok(entry)
    }
}

impl PositionlistEntry {
    /// The text stored in `column`, as written to a `.pls` data row.
    ///
    /// Undefined values are empty; `Layer` and `Area` are `;`-joined lists.
    pub fn text(&self, column: Column) -> String {
        match column {
            Column::Id => self.id.to_string(),
            Column::U => self.u.to_string(),
            Column::V => self.v.to_string(),
            Column::Attribute => self.attribute.clone().unwrap_or_default(),
            Column::Template => self.template.clone().unwrap_or_default(),
            Column::Comment => self.comment.clone(),
            Column::Options => self
                .options
                .map(|o| o.as_str().to_string())
                .unwrap_or_default(),
            Column::Type => self.entry_type.clone().unwrap_or_default(),
            Column::SizeU => number_text(self.size_u),
            Column::SizeV => number_text(self.size_v),
            Column::Pos1 => number_text(self.pos1),
            Column::Pos2 => number_text(self.pos2),
            Column::Pos3 => number_text(self.pos3),
            Column::Link => self.link.clone().unwrap_or_default(),
            Column::File => self.file.clone().unwrap_or_default(),
            Column::Layer => self.layer.iter().join(";"),
            Column::Area => self
                .area
                .map(|a| a.to_array().iter().join(";"))
                .unwrap_or_default(),
            Column::DoseFactor => self.dose_factor.to_string(),
            Column::Dwelltime => number_text(self.dwelltime),
            Column::StepsizeU => number_text(self.stepsize_u),
            Column::StepsizeV => number_text(self.stepsize_v),
            Column::FbmsArea => number_text(self.fbms_area),
            Column::FbmsLines => number_text(self.fbms_lines),
            other => self.extra.get(&other).cloned().unwrap_or_default(),
        }
    }

    /// Stores the `.pls` text `raw` into `column`.
    ///
    /// Blank text clears optional columns and leaves `ID` and `DoseFactor`
    /// untouched; `U` and `V` must always be present.
    pub fn set_text(&mut self, column: Column, raw: &str) -> Result<(), EntryError> {
        let raw = raw.trim();
        let invalid = || EntryError::InvalidValue {
            column,
            value: raw.to_string(),
        };
        let number = |raw: &str| -> Result<Option<f64>, EntryError> {
            if raw.is_empty() {
                Ok(None)
            } else {
                raw.parse::<f64>().map(Some).map_err(|_| invalid())
            }
        };
        let text = |raw: &str| (!raw.is_empty()).then(|| raw.to_string());

        match column {
            Column::Id => {
                if !raw.is_empty() {
                    self.id = parse_integral(raw).ok_or_else(invalid)?;
                }
            }
            Column::U => self.u = number(raw)?.ok_or(EntryError::MissingValue(column))?,
            Column::V => self.v = number(raw)?.ok_or(EntryError::MissingValue(column))?,
            Column::Attribute => self.attribute = text(raw),
            Column::Template => self.template = text(raw),
            Column::Comment => self.comment = raw.to_string(),
            Column::Options => self.options = StageOption::parse_optional(raw)?,
            Column::Type => self.entry_type = text(raw),
            Column::SizeU => self.size_u = number(raw)?,
            Column::SizeV => self.size_v = number(raw)?,
            Column::Pos1 => self.pos1 = number(raw)?,
            Column::Pos2 => self.pos2 = number(raw)?,
            Column::Pos3 => self.pos3 = number(raw)?,
            Column::Link => self.link = text(raw),
            Column::File => self.file = text(raw),
            Column::Layer => {
                self.layer = split_list(raw)
                    .map(|s| parse_integral::<u32>(s).ok_or_else(invalid))
                    .collect::<Result<_, _>>()?;
            }
            Column::Area => {
                self.area = if raw.is_empty() {
                    None
                } else {
                    let values = split_list(raw)
                        .map(|s| s.parse::<f64>().map_err(|_| invalid()))
                        .collect::<Result<Vec<_>, _>>()?;
                    Some(Rect::from_slice(&values).map_err(|_| invalid())?)
                };
            }
            Column::DoseFactor => {
                if let Some(dose) = number(raw)? {
                    validate_dose_factor(dose)?;
                    self.dose_factor = dose;
                }
            }
            Column::Dwelltime => self.dwelltime = number(raw)?,
            Column::StepsizeU => self.stepsize_u = number(raw)?,
            Column::StepsizeV => self.stepsize_v = number(raw)?,
            Column::FbmsArea => self.fbms_area = number(raw)?,
            Column::FbmsLines => self.fbms_lines = number(raw)?,
            other => {
                if raw.is_empty() {
                    self.extra.remove(&other);
                } else {
                    self.extra.insert(other, raw.to_string());
                }
            }
        }
        Ok(())
    }
}

fn number_text(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Splits a `;`-joined list, also accepting the bracketed whitespace form
/// some exports use (`[0 1]`).
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.trim_matches(|c| c == '[' || c == ']')
        .split(|c: char| c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

/// Largest integer an `f64` holds exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Parses a non-negative integer that fits `T`.
///
/// Older tool exports write integral columns as floats, so `"3.0"` is
/// accepted as well as `"3"`.
fn parse_integral<T: TryFrom<u64>>(raw: &str) -> Option<T> {
    let value = match raw.trim().parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            let value = raw.trim().parse::<f64>().ok()?;
            if !(0.0..=MAX_EXACT_INTEGER).contains(&value) || value.fract() != 0.0 {
                return None;
            }
            value as u64
        }
    };
    T::try_from(value).ok()
}

pub fn validate_dose_factor(dose_factor: f64) -> Result<(), EntryError> {
    if dose_factor.is_finite() && dose_factor > 0.0 {
        Ok(())
    } else {
        Err(EntryError::InvalidDoseFactor(dose_factor))
    }
}
