use crate::core::geometry::{GeometryError, Rect, round_up};
use crate::core::geometry::rect::ROUNDING_DECIMALS;
use crate::core::io::traits::ToolFile;
use crate::core::models::working_area::{WorkingAreaRegistry, WorkingAreaSet};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum WorError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: WorParseErrorKind },
    #[error("Cell '{0}' has no indexed working area")]
    EmptyBlock(String),
    #[error("Cell '{0}' has no ActiveWA record")]
    MissingActive(String),
    #[error("ActiveWA={active} of cell '{cell}' does not name one of its {len} working area(s)")]
    InvalidActive {
        cell: String,
        active: usize,
        len: usize,
    },
    #[error("Cell '{0}' appears more than once")]
    DuplicateCell(String),
}

#[derive(Debug, Error)]
pub enum WorParseErrorKind {
    #[error("Record outside of a [cell] block")]
    OutsideBlock,
    #[error("Invalid working area index '{0}'")]
    InvalidIndex(String),
    #[error("Invalid number '{0}'")]
    InvalidNumber(String),
    #[error("Expected at least 4 values, found {0}")]
    TooFewValues(usize),
    #[error("Working area {0} is defined twice")]
    DuplicateIndex(usize),
    #[error("{0}")]
    Rect(GeometryError),
}

pub struct WorFile;

struct Block {
    name: String,
    active: Option<usize>,
    rects: BTreeMap<usize, Rect>,
}

impl Block {
    /// Gaps in the `WorkingArea<k>` numbering are closed up; the active
    /// index follows its rectangle.
    fn finish(self) -> Result<(String, WorkingAreaSet), WorError> {
        if self.rects.is_empty() {
            return Err(WorError::EmptyBlock(self.name));
        }
        let active = self
            .active
            .ok_or_else(|| WorError::MissingActive(self.name.clone()))?;
        let len = self.rects.len();
        let Some(position) = self.rects.keys().position(|&index| index == active) else {
            return Err(WorError::InvalidActive {
                cell: self.name,
                active,
                len,
            });
        };
        if self.rects.keys().copied().ne(0..len) {
            warn!(
                "Working areas of cell '{}' are not numbered 0..{}; renumbering with ActiveWA={} as {}",
                self.name, len, active, position
            );
        }
        let rects = self.rects.into_values().collect();
        match WorkingAreaSet::from_parts(rects, position) {
            Some(set) => Ok((self.name, set)),
            None => Err(WorError::InvalidActive {
                cell: self.name,
                active,
                len,
            }),
        }
    }
}

fn parse_values(raw: &str, line: usize) -> Result<Rect, WorError> {
    let parse_error = |kind| WorError::Parse { line, kind };
    let values = raw
        .split(',')
        .map(str::trim)
        .take(4)
        .map(|v| {
            v.parse::<f64>()
                .map_err(|_| parse_error(WorParseErrorKind::InvalidNumber(v.to_string())))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() < 4 {
        return Err(parse_error(WorParseErrorKind::TooFewValues(values.len())));
    }
    Rect::from_slice(&values).map_err(|e| parse_error(WorParseErrorKind::Rect(e)))
}

impl ToolFile for WorFile {
    type Document = WorkingAreaRegistry;
    type WriteOptions = ();
    type Error = WorError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Document, Self::Error> {
        let mut registry = WorkingAreaRegistry::new();
        let mut current: Option<Block> = None;

        let commit = |block: Block, registry: &mut WorkingAreaRegistry| {
            let (name, set) = block.finish()?;
            if registry.contains(&name) {
                return Err(WorError::DuplicateCell(name));
            }
            registry.insert_set(name, set);
            Ok::<(), WorError>(())
        };

        for (line_num, line_res) in reader.lines().enumerate() {
            let line_number = line_num + 1;
            let line = line_res?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if let Some(block) = current.take() {
                    commit(block, &mut registry)?;
                }
                current = Some(Block {
                    name: name.to_string(),
                    active: None,
                    rects: BTreeMap::new(),
                });
                continue;
            }

            let block = current.as_mut().ok_or_else(|| WorError::Parse {
                line: line_number,
                kind: WorParseErrorKind::OutsideBlock,
            })?;
            let Some((key, value)) = line.split_once('=') else {
                warn!("Ignoring line {} of working area file: '{}'", line_number, line);
                continue;
            };

            if key == "ActiveWA" {
                let active = value.trim().parse::<usize>().map_err(|_| WorError::Parse {
                    line: line_number,
                    kind: WorParseErrorKind::InvalidIndex(value.to_string()),
                })?;
                block.active = Some(active);
            } else if key == "WorkingArea" {
                // Scaled copy of the active area, derived on write.
            } else if let Some(index) = key.strip_prefix("WorkingArea") {
                let index = index.parse::<usize>().map_err(|_| WorError::Parse {
                    line: line_number,
                    kind: WorParseErrorKind::InvalidIndex(index.to_string()),
                })?;
                let rect = parse_values(value, line_number)?;
                if block.rects.insert(index, rect).is_some() {
                    return Err(WorError::Parse {
                        line: line_number,
                        kind: WorParseErrorKind::DuplicateIndex(index),
                    });
                }
            } else {
                warn!("Ignoring unknown working area record '{}'", key);
            }
        }

        if let Some(block) = current.take() {
            commit(block, &mut registry)?;
        }
        debug!("Read working areas for {} cell(s)", registry.len());
        Ok(registry)
    }

    fn write_to(
        registry: &Self::Document,
        _options: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error> {
        let scale = 1e-6 / registry.unit();
        for (name, set) in registry.iter() {
            let scaled = set
                .active_rect()
                .to_array()
                // Drop float noise from the unit conversion before rounding up.
                .map(|v| round_up((v * scale * 1e6).round() / 1e6, ROUNDING_DECIMALS));
            writeln!(writer, "[{}]", name)?;
            writeln!(
                writer,
                "WorkingArea={},{},{},{}",
                scaled[0], scaled[1], scaled[2], scaled[3]
            )?;
            writeln!(writer, "ActiveWA={}", set.active())?;
            for (index, rect) in set.rects().iter().enumerate() {
                writeln!(
                    writer,
                    "WorkingArea{}={:.3},{:.3},{:.3},{:.3},New",
                    index, rect.left, rect.bottom, rect.right, rect.top
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn write_to_string(registry: &WorkingAreaRegistry) -> String {
        let mut buffer = Vec::new();
        WorFile::write_to(registry, &(), &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn write_emits_sorted_blocks_with_scaled_active_area() {
        let mut registry = WorkingAreaRegistry::new();
        registry.add("zeta", Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        registry.add("alpha", Rect::new(-1.5, -2.0, 1.5, 2.0)).unwrap();
        registry.add("alpha", Rect::new(-10.0, -10.0, 10.0, 10.0)).unwrap();

        let text = write_to_string(&registry);
        let expected = "\
[alpha]
WorkingArea=-10000,-10000,10000,10000
ActiveWA=1
WorkingArea0=-1.500,-2.000,1.500,2.000,New
WorkingArea1=-10.000,-10.000,10.000,10.000,New
[zeta]
WorkingArea=0,0,1000,1000
ActiveWA=0
WorkingArea0=0.000,0.000,1.000,1.000,New
";
        assert_eq!(text, expected);
    }

    #[test]
    fn round_trip_preserves_areas_and_active_index() {
        let mut registry = WorkingAreaRegistry::new();
        registry.add("cell", Rect::new(-1.0, -1.0, 1.0, 1.0)).unwrap();
        registry.add("cell", Rect::new(-2.25, -2.0, 2.0, 2.125)).unwrap();
        registry.add("cell", Rect::new(0.0, 0.0, 3.0, 3.0)).unwrap();
        registry.set_active("cell", 1).unwrap();
        registry.add("other", Rect::new(0.0, 0.0, 0.5, 0.5)).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("areas.wor");
        registry.write(&path).unwrap();
        let restored = WorkingAreaRegistry::read(&path).unwrap();
        assert_eq!(restored, registry);
    }

    #[test]
    fn read_fails_for_block_without_areas() {
        let text = "[cell]\nActiveWA=0\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::EmptyBlock(name)) if name == "cell"
        ));
    }

    #[test]
    fn read_fails_for_active_index_out_of_range() {
        let text = "[cell]\nActiveWA=2\nWorkingArea0=0,0,1,1,New\nWorkingArea1=0,0,2,2,New\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::InvalidActive { active: 2, len: 2, .. })
        ));
    }

    #[test]
    fn read_keeps_the_active_area_when_numbering_has_gaps() {
        let text = "[cell]\nWorkingArea=0,0,2000,2000\nActiveWA=1\nWorkingArea1=0.000,0.000,2.000,2.000,New\n";
        let registry = WorFile::read_from(&mut Cursor::new(text)).unwrap();
        let set = registry.get("cell").unwrap();
        assert_eq!(set.rects(), &[Rect::new(0.0, 0.0, 2.0, 2.0)]);
        assert_eq!(set.active(), 0);

        let text = "[cell]\nActiveWA=3\nWorkingArea0=0,0,1,1\nWorkingArea3=0,0,3,3\nWorkingArea5=0,0,5,5\n";
        let registry = WorFile::read_from(&mut Cursor::new(text)).unwrap();
        let set = registry.get("cell").unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.active(), 1);
        assert_eq!(set.active_rect(), Rect::new(0.0, 0.0, 3.0, 3.0));
    }

    #[test]
    fn read_fails_when_the_active_area_is_absent() {
        let text = "[cell]\nActiveWA=1\nWorkingArea0=0,0,1,1\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::InvalidActive { active: 1, len: 1, .. })
        ));
        let text = "[cell]\nWorkingArea0=0,0,1,1\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::MissingActive(name)) if name == "cell"
        ));
    }

    #[test]
    fn read_reports_line_of_malformed_values() {
        let text = "[cell]\nActiveWA=0\nWorkingArea0=0,zero,1,1,New\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::Parse {
                line: 3,
                kind: WorParseErrorKind::InvalidNumber(_)
            })
        ));
        let text = "ActiveWA=0\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::Parse {
                line: 1,
                kind: WorParseErrorKind::OutsideBlock
            })
        ));
    }

    #[test]
    fn read_rejects_duplicate_cells() {
        let text = "[a]\nActiveWA=0\nWorkingArea0=0,0,1,1\n[a]\nActiveWA=0\nWorkingArea0=0,0,1,1\n";
        assert!(matches!(
            WorFile::read_from(&mut Cursor::new(text)),
            Err(WorError::DuplicateCell(name)) if name == "a"
        ));
    }
}
