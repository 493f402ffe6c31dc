use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A column of the VOYAGER positionlist table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Id,
    X,
    Y,
    Z,
    R,
    T,
    U,
    V,
    W,
    Attribute,
    Template,
    Comment,
    Options,
    Type,
    SizeU,
    SizeV,
    PointsU,
    PointsV,
    Dir,
    Avg,
    Pos1,
    Pos2,
    Pos3,
    Link,
    File,
    Layer,
    Area,
    DoseFactor,
    Dwelltime,
    Stepsize,
    SplDwell,
    SplStep,
    CurveStep,
    CurveDwell,
    DotDwell,
    FbmsArea,
    FbmsLines,
    SplDot,
    Time,
    Timestamp,
    Method,
    Dot,
    StepsizeU,
    StepsizeV,
    CurveLine,
}

/// Columns present in every positionlist, in file order.
pub const BASE_COLUMNS: [Column; 42] = [
    Column::Id,
    Column::X,
    Column::Y,
    Column::Z,
    Column::R,
    Column::T,
    Column::U,
    Column::V,
    Column::W,
    Column::Attribute,
    Column::Template,
    Column::Comment,
    Column::Options,
    Column::Type,
    Column::SizeU,
    Column::SizeV,
    Column::PointsU,
    Column::PointsV,
    Column::Dir,
    Column::Avg,
    Column::Pos1,
    Column::Pos2,
    Column::Pos3,
    Column::Link,
    Column::File,
    Column::Layer,
    Column::Area,
    Column::DoseFactor,
    Column::Dwelltime,
    Column::Stepsize,
    Column::SplDwell,
    Column::SplStep,
    Column::CurveStep,
    Column::CurveDwell,
    Column::DotDwell,
    Column::FbmsArea,
    Column::FbmsLines,
    Column::SplDot,
    Column::Time,
    Column::Timestamp,
    Column::Method,
    Column::Dot,
];

/// Dual-beam columns appended after [`BASE_COLUMNS`] when stepsizes are enabled.
pub const STEPSIZE_COLUMNS: [Column; 3] = [Column::StepsizeU, Column::StepsizeV, Column::CurveLine];

/// Columns encoded in the fixed `IXYZRTUVWATC` prefix of the `FORMAT` header.
pub const FORMAT_PREFIX_COLUMNS: [Column; 12] = [
    Column::Id,
    Column::X,
    Column::Y,
    Column::Z,
    Column::R,
    Column::T,
    Column::U,
    Column::V,
    Column::W,
    Column::Attribute,
    Column::Template,
    Column::Comment,
];

static COLUMN_NAMES: Map<&'static str, Column> = phf_map! {
    "ID" => Column::Id,
    "X" => Column::X,
    "Y" => Column::Y,
    "Z" => Column::Z,
    "R" => Column::R,
    "T" => Column::T,
    "U" => Column::U,
    "V" => Column::V,
    "W" => Column::W,
    "Attribute" => Column::Attribute,
    "Template" => Column::Template,
    "Comment" => Column::Comment,
    "Options" => Column::Options,
    "Type" => Column::Type,
    "Size-U" => Column::SizeU,
    "Size-V" => Column::SizeV,
    "Points-U" => Column::PointsU,
    "Points-V" => Column::PointsV,
    "Dir" => Column::Dir,
    "Avg" => Column::Avg,
    "Pos1" => Column::Pos1,
    "Pos2" => Column::Pos2,
    "Pos3" => Column::Pos3,
    "Link" => Column::Link,
    "File" => Column::File,
    "Layer" => Column::Layer,
    "Area" => Column::Area,
    "DoseFactor" => Column::DoseFactor,
    "Dwelltime" => Column::Dwelltime,
    "Stepsize" => Column::Stepsize,
    "SplDwell" => Column::SplDwell,
    "SplStep" => Column::SplStep,
    "CurveStep" => Column::CurveStep,
    "CurveDwell" => Column::CurveDwell,
    "DotDwell" => Column::DotDwell,
    "FBMSArea" => Column::FbmsArea,
    "FBMSLines" => Column::FbmsLines,
    "SplDot" => Column::SplDot,
    "Time" => Column::Time,
    "Timestamp" => Column::Timestamp,
    "Method" => Column::Method,
    "Dot" => Column::Dot,
    "StepsizeU" => Column::StepsizeU,
    "StepsizeV" => Column::StepsizeV,
    "CurveLine" => Column::CurveLine,
};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown positionlist column '{0}'")]
pub struct UnknownColumn(pub String);

impl Column {
    /// The column name as written in `.pls` files.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::X => "X",
            Column::Y => "Y",
            Column::Z => "Z",
            Column::R => "R",
            Column::T => "T",
            Column::U => "U",
            Column::V => "V",
            Column::W => "W",
            Column::Attribute => "Attribute",
            Column::Template => "Template",
            Column::Comment => "Comment",
            Column::Options => "Options",
            Column::Type => "Type",
            Column::SizeU => "Size-U",
            Column::SizeV => "Size-V",
            Column::PointsU => "Points-U",
            Column::PointsV => "Points-V",
            Column::Dir => "Dir",
            Column::Avg => "Avg",
            Column::Pos1 => "Pos1",
            Column::Pos2 => "Pos2",
            Column::Pos3 => "Pos3",
            Column::Link => "Link",
            Column::File => "File",
            Column::Layer => "Layer",
            Column::Area => "Area",
            Column::DoseFactor => "DoseFactor",
            Column::Dwelltime => "Dwelltime",
            Column::Stepsize => "Stepsize",
            Column::SplDwell => "SplDwell",
            Column::SplStep => "SplStep",
            Column::CurveStep => "CurveStep",
            Column::CurveDwell => "CurveDwell",
            Column::DotDwell => "DotDwell",
            Column::FbmsArea => "FBMSArea",
            Column::FbmsLines => "FBMSLines",
            Column::SplDot => "SplDot",
            Column::Time => "Time",
            Column::Timestamp => "Timestamp",
            Column::Method => "Method",
            Column::Dot => "Dot",
            Column::StepsizeU => "StepsizeU",
            Column::StepsizeV => "StepsizeV",
            Column::CurveLine => "CurveLine",
        }
    }

    /// Looks a column up by its exact file name.
    pub fn from_name(name: &str) -> Option<Self> {
        COLUMN_NAMES.get(name).copied()
    }

    /// Looks a column up ignoring ASCII case, as used in selection expressions.
    pub fn from_name_ignore_case(name: &str) -> Option<Self> {
        Self::from_name(name).or_else(|| {
            COLUMN_NAMES
                .entries()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, &c)| c)
        })
    }
}

impl FromStr for Column {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name_ignore_case(s.trim()).ok_or_else(|| UnknownColumn(s.to_string()))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for column in BASE_COLUMNS.iter().chain(STEPSIZE_COLUMNS.iter()) {
            assert_eq!(Column::from_name(column.name()), Some(*column));
        }
    }

    #[test]
    fn lookup_ignores_case_when_requested() {
        assert_eq!(Column::from_name("dosefactor"), None);
        assert_eq!(
            Column::from_name_ignore_case("dosefactor"),
            Some(Column::DoseFactor)
        );
        assert_eq!("fbmsarea".parse::<Column>(), Ok(Column::FbmsArea));
        assert_eq!(
            "Bogus".parse::<Column>(),
            Err(UnknownColumn("Bogus".to_string()))
        );
    }

    #[test]
    fn format_prefix_is_leading_base_columns() {
        assert_eq!(&BASE_COLUMNS[..12], &FORMAT_PREFIX_COLUMNS[..]);
    }
}
