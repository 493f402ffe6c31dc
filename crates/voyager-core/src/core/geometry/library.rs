use super::cell::{Cell, LayoutCell};
use super::ids::CellId;
use super::polygon::Polygon;
use nalgebra::Point2;
use serde::Deserialize;
use slotmap::SlotMap;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default GDSII database unit (1 nm).
pub const DEFAULT_UNIT: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum CellLibraryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("A cell named '{0}' already exists in the library")]
    DuplicateCell(String),
    #[error("Cell names must not be empty")]
    EmptyName,
    #[error("Polygon {index} of cell '{cell}' has {points} point(s); at least 3 are required")]
    DegeneratePolygon {
        cell: String,
        index: usize,
        points: usize,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLibraryFile {
    unit: Option<f64>,
    #[serde(default)]
    cells: Vec<RawCell>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCell {
    name: String,
    #[serde(default)]
    polygons: Vec<RawPolygon>,
    #[serde(default)]
    rectangles: Vec<RawRectangle>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolygon {
    layer: u32,
    #[serde(default)]
    datatype: u32,
    points: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRectangle {
    layer: u32,
    #[serde(default)]
    datatype: u32,
    corners: [[f64; 2]; 2],
}

/// Owning registry of layout cells, addressable by name.
///
/// Positionlists never own geometry; they store cell names and resolve them
/// against a library when an operation needs bounding boxes or areas.
#[derive(Debug, Clone)]
pub struct CellLibrary {
    cells: SlotMap<CellId, LayoutCell>,
    name_index: HashMap<String, CellId>,
    unit: f64,
}

impl Default for CellLibrary {
    fn default() -> Self {
        Self {
            cells: SlotMap::with_key(),
            name_index: HashMap::new(),
            unit: DEFAULT_UNIT,
        }
    }
}

impl CellLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(unit: f64) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Loads a library from a TOML description of cells and their polygons.
    pub fn load(path: &Path) -> Result<Self, CellLibraryError> {
        debug!("Loading cell library from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CellLibraryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let raw: RawLibraryFile = toml::from_str(&content).map_err(|e| CellLibraryError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawLibraryFile) -> Result<Self, CellLibraryError> {
        let mut library = Self::with_unit(raw.unit.unwrap_or(DEFAULT_UNIT));
        for raw_cell in raw.cells {
            let mut cell = LayoutCell::new(raw_cell.name.clone());
            for (index, p) in raw_cell.polygons.into_iter().enumerate() {
                if p.points.len() < 3 {
                    return Err(CellLibraryError::DegeneratePolygon {
                        cell: raw_cell.name,
                        index,
                        points: p.points.len(),
                    });
                }
                let points = p.points.iter().map(|[x, y]| Point2::new(*x, *y)).collect();
                cell.add(Polygon::new(p.layer, p.datatype, points));
            }
            for r in raw_cell.rectangles {
                let [[x0, y0], [x1, y1]] = r.corners;
                cell.add(Polygon::rectangle(
                    r.layer,
                    r.datatype,
                    Point2::new(x0, y0),
                    Point2::new(x1, y1),
                ));
            }
            library.add(cell)?;
        }
        debug!("Cell library holds {} cell(s)", library.len());
        Ok(library)
    }

    /// The GDSII database unit in metres.
    pub fn unit(&self) -> f64 {
        self.unit
    }

    pub fn add(&mut self, cell: LayoutCell) -> Result<CellId, CellLibraryError> {
        if cell.name().is_empty() {
            return Err(CellLibraryError::EmptyName);
        }
        if self.name_index.contains_key(cell.name()) {
            return Err(CellLibraryError::DuplicateCell(cell.name().to_string()));
        }
        let name = cell.name().to_string();
        let id = self.cells.insert(cell);
        self.name_index.insert(name, id);
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<&LayoutCell> {
        self.name_index.get(name).and_then(|&id| self.cells.get(id))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut LayoutCell> {
        let id = *self.name_index.get(name)?;
        self.cells.get_mut(id)
    }

    pub fn cell(&self, id: CellId) -> Option<&LayoutCell> {
        self.cells.get(id)
    }

    pub fn id_of(&self, name: &str) -> Option<CellId> {
        self.name_index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CellId, &LayoutCell)> {
        self.cells.iter()
    }

    /// Sorts the polygons of every cell by the left edge of their bounding box.
    pub fn sort_polygons(&mut self) {
        for (_, cell) in self.cells.iter_mut() {
            cell.sort_polygons();
        }
    }
}
