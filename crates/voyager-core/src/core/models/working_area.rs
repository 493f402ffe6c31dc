use crate::core::geometry::{GeometryError, Rect};
use crate::core::geometry::library::DEFAULT_UNIT;
use crate::core::io::traits::ToolFile;
use crate::core::io::wor::{WorError, WorFile};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum WorkingAreaError {
    #[error("Cell name must not be empty")]
    EmptyName,
    #[error("No working areas are registered for cell '{0}'")]
    UnknownCell(String),
    #[error("Working area index {index} is out of range for cell '{cell}' ({len} area(s))")]
    IndexOutOfRange {
        cell: String,
        index: usize,
        len: usize,
    },
    #[error("Invalid working area: {0}")]
    Geometry(#[from] GeometryError),
}

/// The working areas of one cell. Never empty; `active` is always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingAreaSet {
    rects: Vec<Rect>,
    active: usize,
}

impl WorkingAreaSet {
    pub fn new(rect: Rect) -> Self {
        Self {
            rects: vec![rect],
            active: 0,
        }
    }

    /// Rebuilds a set from file contents, checking the active index.
    pub(crate) fn from_parts(rects: Vec<Rect>, active: usize) -> Option<Self> {
        (active < rects.len()).then_some(Self { rects, active })
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_rect(&self) -> Rect {
        self.rects[self.active]
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Always `false`; a set holds at least one rectangle.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    fn push(&mut self, rect: Rect) -> usize {
        self.rects.push(rect);
        self.active = self.rects.len() - 1;
        self.active
    }

    /// Removes `index` from a set of two or more rectangles.
    fn remove(&mut self, index: usize) {
        self.rects.remove(index);
        if index == self.active {
            self.active = self.rects.len() - 1;
        } else if index < self.active {
            self.active -= 1;
        }
    }
}

/// Working areas per cell, plus the GDSII unit they are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingAreaRegistry {
    cells: BTreeMap<String, WorkingAreaSet>,
    unit: f64,
}

impl Default for WorkingAreaRegistry {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
            unit: DEFAULT_UNIT,
        }
    }
}

impl WorkingAreaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(unit: f64) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    pub fn unit(&self) -> f64 {
        self.unit
    }

    /// Appends `rect` to the areas of `cell` and makes it active.
    ///
    /// Returns the index of the new rectangle.
    pub fn add(&mut self, cell: &str, rect: Rect) -> Result<usize, WorkingAreaError> {
        if cell.is_empty() {
            return Err(WorkingAreaError::EmptyName);
        }
        if !rect.is_finite() {
            return Err(GeometryError::NonFinite(rect.to_array()).into());
        }
        rect.check_ordered()?;

        let index = match self.cells.get_mut(cell) {
            Some(set) => set.push(rect),
            None => {
                self.cells.insert(cell.to_string(), WorkingAreaSet::new(rect));
                0
            }
        };
        debug!("Working area {} of '{}' is now active", index, cell);
        Ok(index)
    }

    /// Removes one rectangle, or the whole record if `index` is `None` or
    /// the cell has a single rectangle left.
    pub fn delete(&mut self, cell: &str, index: Option<usize>) -> Result<(), WorkingAreaError> {
        let set = self
            .cells
            .get_mut(cell)
            .ok_or_else(|| WorkingAreaError::UnknownCell(cell.to_string()))?;

        match index {
            Some(index) if index >= set.len() => Err(WorkingAreaError::IndexOutOfRange {
                cell: cell.to_string(),
                index,
                len: set.len(),
            }),
            Some(index) if set.len() > 1 => {
                set.remove(index);
                Ok(())
            }
            _ => {
                self.cells.remove(cell);
                debug!("Removed all working areas of '{}'", cell);
                Ok(())
            }
        }
    }

    pub fn set_active(&mut self, cell: &str, index: usize) -> Result<(), WorkingAreaError> {
        let set = self
            .cells
            .get_mut(cell)
            .ok_or_else(|| WorkingAreaError::UnknownCell(cell.to_string()))?;
        if index >= set.len() {
            return Err(WorkingAreaError::IndexOutOfRange {
                cell: cell.to_string(),
                index,
                len: set.len(),
            });
        }
        set.active = index;
        Ok(())
    }

    pub fn get(&self, cell: &str) -> Option<&WorkingAreaSet> {
        self.cells.get(cell)
    }

    pub fn active_rect(&self, cell: &str) -> Option<Rect> {
        self.cells.get(cell).map(WorkingAreaSet::active_rect)
    }

    pub fn contains(&self, cell: &str) -> bool {
        self.cells.contains_key(cell)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells and their areas in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkingAreaSet)> {
        self.cells.iter().map(|(name, set)| (name.as_str(), set))
    }

    pub(crate) fn insert_set(&mut self, cell: String, set: WorkingAreaSet) {
        self.cells.insert(cell, set);
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), WorError> {
        WorFile::write_to_path(self, &(), path)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, WorError> {
        WorFile::read_from_path(path)
    }
}
