use thiserror::Error;
use voyager::core::geometry::Rect;
use voyager::core::models::column::Column;
use voyager::core::models::entry::StageOption;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Expected {expected} comma-separated numbers in '{input}'")]
    WrongCount { expected: &'static str, input: String },

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Number '{0}' must be finite")]
    NonFinite(String),

    #[error("Invalid layer number '{0}'. Layers are non-negative integers.")]
    InvalidLayer(String),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Invalid rectangle '{input}': {reason}")]
    InvalidRect { input: String, reason: String },

    #[error("Invalid stage option '{0}'. Expected STAY, DRIVE or none.")]
    InvalidStageOption(String),

    #[error("Component '{component}' cannot be empty in '{input}'.")]
    EmptyComponent {
        component: &'static str,
        input: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerList(pub Vec<u32>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnList(pub Vec<Column>);

/// A stage option where `None` clears the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalStageOption(pub Option<StageOption>);

fn parse_numbers(input: &str) -> Result<Vec<f64>, ParseError> {
    input
        .split(',')
        .map(str::trim)
        .map(|part| {
            if part.is_empty() {
                return Err(ParseError::EmptyComponent {
                    component: "number",
                    input: input.to_string(),
                });
            }
            let value = part
                .parse::<f64>()
                .map_err(|_| ParseError::InvalidNumber(part.to_string()))?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(ParseError::NonFinite(part.to_string()))
            }
        })
        .collect()
}

/// Parses `A,B` into a pair of numbers.
pub fn parse_pair(input: &str) -> Result<(f64, f64), ParseError> {
    match parse_numbers(input)?.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => Err(ParseError::WrongCount {
            expected: "2",
            input: input.to_string(),
        }),
    }
}

/// Parses `S` or `SU,SV`; a single value applies to both directions.
pub fn parse_stepsize(input: &str) -> Result<(f64, f64), ParseError> {
    match parse_numbers(input)?.as_slice() {
        [s] => Ok((*s, *s)),
        [su, sv] => Ok((*su, *sv)),
        _ => Err(ParseError::WrongCount {
            expected: "1 or 2",
            input: input.to_string(),
        }),
    }
}

/// Parses `LEFT,BOTTOM,RIGHT,TOP` into an ordered rectangle.
pub fn parse_rect(input: &str) -> Result<Rect, ParseError> {
    let values = parse_numbers(input)?;
    if values.len() != 4 {
        return Err(ParseError::WrongCount {
            expected: "4",
            input: input.to_string(),
        });
    }
    Rect::ordered_from_slice(&values).map_err(|e| ParseError::InvalidRect {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

pub fn parse_layers(input: &str) -> Result<LayerList, ParseError> {
    input
        .split(',')
        .map(str::trim)
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| ParseError::InvalidLayer(part.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LayerList)
}

/// Parses a comma-separated list of column names, ignoring case.
pub fn parse_columns(input: &str) -> Result<ColumnList, ParseError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            Column::from_name_ignore_case(part)
                .ok_or_else(|| ParseError::UnknownColumn(part.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ColumnList)
}

pub fn parse_stage_option(input: &str) -> Result<OptionalStageOption, ParseError> {
    StageOption::parse_optional(input)
        .map(OptionalStageOption)
        .map_err(|_| ParseError::InvalidStageOption(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_and_stepsizes_parse() {
        assert_eq!(parse_pair("1.5, -2"), Ok((1.5, -2.0)));
        assert_eq!(parse_stepsize("0.1"), Ok((0.1, 0.1)));
        assert_eq!(parse_stepsize("0.1,0.2"), Ok((0.1, 0.2)));
        assert!(matches!(
            parse_pair("1,2,3"),
            Err(ParseError::WrongCount { expected: "2", .. })
        ));
        assert_eq!(
            parse_pair("1,x"),
            Err(ParseError::InvalidNumber("x".to_string()))
        );
        assert!(matches!(
            parse_pair("1,"),
            Err(ParseError::EmptyComponent { component: "number", .. })
        ));
    }

    #[test]
    fn nan_and_infinity_are_rejected() {
        assert_eq!(
            parse_pair("NaN,0"),
            Err(ParseError::NonFinite("NaN".to_string()))
        );
        assert_eq!(
            parse_stepsize("inf"),
            Err(ParseError::NonFinite("inf".to_string()))
        );
        assert_eq!(
            parse_rect("-infinity,0,1,1"),
            Err(ParseError::NonFinite("-infinity".to_string()))
        );
    }

    #[test]
    fn rects_must_have_four_ordered_values() {
        assert_eq!(
            parse_rect("-1,-2,1,2"),
            Ok(Rect::new(-1.0, -2.0, 1.0, 2.0))
        );
        assert!(matches!(
            parse_rect("1,2,3"),
            Err(ParseError::WrongCount { expected: "4", .. })
        ));
        assert!(matches!(
            parse_rect("1,0,0,1"),
            Err(ParseError::InvalidRect { .. })
        ));
    }

    #[test]
    fn layers_reject_negative_numbers() {
        assert_eq!(parse_layers("0, 2"), Ok(LayerList(vec![0, 2])));
        assert_eq!(
            parse_layers("0,-1"),
            Err(ParseError::InvalidLayer("-1".to_string()))
        );
    }

    #[test]
    fn columns_are_case_insensitive() {
        assert_eq!(
            parse_columns("id,u,DOSEFACTOR"),
            Ok(ColumnList(vec![Column::Id, Column::U, Column::DoseFactor]))
        );
        assert_eq!(
            parse_columns("ID,Nope"),
            Err(ParseError::UnknownColumn("Nope".to_string()))
        );
    }

    #[test]
    fn stage_options_include_none() {
        assert_eq!(
            parse_stage_option("drive"),
            Ok(OptionalStageOption(Some(StageOption::Drive)))
        );
        assert_eq!(parse_stage_option("none"), Ok(OptionalStageOption(None)));
        assert!(parse_stage_option("jump").is_err());
    }
}
