use super::column::{BASE_COLUMNS, Column, STEPSIZE_COLUMNS};
use super::entry::{EntryError, PositionlistEntry, StageOption, validate_dose_factor};
use super::selection::Selection;
use super::working_area::WorkingAreaRegistry;
use crate::core::geometry::{Cell, CellLibrary, GeometryError, LayoutCell, Rect};
use crate::core::io::pls::{PlsError, PlsFile, ViewProfile};
use crate::core::io::traits::ToolFile;
use crate::core::wafer::{WaferError, WaferLayout};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prefix of GDSII paths on the VOYAGER control machine.
pub const USER_ROOT_GDSII: &str = "%UserRoot%GDSII\\";

/// Columns shown by [`Positionlist`]'s `Display` implementation.
pub const SUMMARY_COLUMNS: [Column; 6] = [
    Column::Id,
    Column::U,
    Column::V,
    Column::Comment,
    Column::Layer,
    Column::DoseFactor,
];

#[derive(Debug, Error, PartialEq, Clone)]
pub enum PositionlistError {
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    Wafer(#[from] WaferError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("Cell '{0}' is not bound to this positionlist. Use Positionlist::populate_cells() first.")]
    UnboundCell(String),
    #[error("Cell '{0}' is not present in the cell library")]
    MissingCell(String),
    #[error("Cell '{0}' is empty and has no bounding box")]
    EmptyCell(String),
    #[error("No working area is registered for cell '{0}'")]
    MissingWorkingArea(String),
    #[error("Matrix copy size must be at least 1x1, got {rows}x{cols}")]
    InvalidMatrix { rows: usize, cols: usize },
    #[error("Dwelltime must be positive and finite, got {0}")]
    InvalidDwelltime(f64),
    #[error("Stepsize must be positive and finite, got ({0}, {1})")]
    InvalidStepsize(f64, f64),
    #[error("Invalid pivot '{0}': expected origin, corner, center or 'u,v'")]
    InvalidPivot(String),
    #[error("Order is not a permutation of 0..{0}")]
    InvalidOrder(usize),
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },
}

fn check_finite(what: &'static str, values: &[f64]) -> Result<(), PositionlistError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(PositionlistError::NonFinite { what, value }),
        None => Ok(()),
    }
}

/// The point a selection is rotated about.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Pivot {
    #[default]
    Origin,
    /// Minimum `u` and minimum `v` over the selection.
    Corner,
    /// Midpoint of the selection's `u` and `v` extents.
    Center,
    Point(f64, f64),
}

impl FromStr for Pivot {
    type Err = PositionlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PositionlistError::InvalidPivot(s.to_string());
        match s.trim().to_ascii_lowercase().as_str() {
            "origin" => Ok(Pivot::Origin),
            "corner" => Ok(Pivot::Corner),
            "center" | "centre" => Ok(Pivot::Center),
            other => {
                let (u, v) = other.split_once(',').ok_or_else(invalid)?;
                let u = u.trim().parse::<f64>().map_err(|_| invalid())?;
                let v = v.trim().parse::<f64>().map_err(|_| invalid())?;
                if !u.is_finite() || !v.is_finite() {
                    return Err(invalid());
                }
                Ok(Pivot::Point(u, v))
            }
        }
    }
}

/// Grid parameters of [`Positionlist::matrix_copy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixCopy {
    pub rows: usize,
    pub cols: usize,
    /// Offset between consecutive rows, in millimetres.
    pub row_vector: (f64, f64),
    /// Offset between consecutive columns, in millimetres.
    pub column_vector: (f64, f64),
}

/// An ordered table of exposures on one wafer.
///
/// The positionlist never owns geometry. It records which cell names are
/// bound, and operations that need bounding boxes or polygon areas resolve
/// those names against a [`CellLibrary`].
#[derive(Debug, Clone, PartialEq)]
pub struct Positionlist {
    entries: Vec<PositionlistEntry>,
    wafer_layout: WaferLayout,
    cells: BTreeSet<String>,
    stepsize_enabled: bool,
}

impl Default for Positionlist {
    fn default() -> Self {
        Self::new(WaferLayout::default())
    }
}

impl Positionlist {
    pub fn new(wafer_layout: WaferLayout) -> Self {
        Self {
            entries: Vec::new(),
            wafer_layout,
            cells: BTreeSet::new(),
            stepsize_enabled: false,
        }
    }

    /// Creates an empty positionlist for the named wafer layout.
    pub fn with_layout_name(name: &str) -> Result<Self, PositionlistError> {
        Ok(Self::new(WaferLayout::from_name(name)?))
    }

    /// Assembles a positionlist read from a file. No cells are bound.
    pub(crate) fn from_parts(
        wafer_layout: WaferLayout,
        entries: Vec<PositionlistEntry>,
        stepsize_enabled: bool,
    ) -> Self {
        Self {
            entries,
            wafer_layout,
            cells: BTreeSet::new(),
            stepsize_enabled,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, PlsError> {
        PlsFile::read_from_path(path)
    }

    /// Writes the positionlist as a `.pls` file.
    ///
    /// # Errors
    ///
    /// Fails without touching `path` when a row has no file or no area.
    pub fn write(&self, path: impl AsRef<Path>, view: ViewProfile) -> Result<(), PlsError> {
        self.check_writable()?;
        PlsFile::write_to_path(self, &view, path.as_ref())?;
        info!(
            "Wrote {} entr(ies) to {}",
            self.entries.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    pub fn check_writable(&self) -> Result<(), PlsError> {
        let missing_file = self.entries.iter().filter(|e| e.file.is_none()).count();
        if missing_file > 0 {
            return Err(PlsError::MissingFile {
                count: missing_file,
            });
        }
        let missing_area = self.entries.iter().filter(|e| e.area.is_none()).count();
        if missing_area > 0 {
            return Err(PlsError::MissingArea {
                count: missing_area,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PositionlistEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionlistEntry> {
        self.entries.iter()
    }

    pub fn wafer_layout(&self) -> WaferLayout {
        self.wafer_layout
    }

    pub fn set_wafer_layout(&mut self, name: &str) -> Result<(), PositionlistError> {
        self.wafer_layout = WaferLayout::from_name(name)?;
        Ok(())
    }

    /// Names of the cells currently bound to this positionlist.
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(String::as_str)
    }

    pub fn is_bound(&self, cell: &str) -> bool {
        self.cells.contains(cell)
    }

    pub fn stepsize_enabled(&self) -> bool {
        self.stepsize_enabled
    }

    /// The columns written to a `.pls` file, in file order.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = BASE_COLUMNS.to_vec();
        if self.stepsize_enabled {
            columns.extend(STEPSIZE_COLUMNS);
        }
        columns
    }

    /// Stage positions `(u, v)` of every row, in row order.
    pub fn positions(&self) -> Vec<(f64, f64)> {
        self.entries.iter().map(|e| (e.u, e.v)).collect()
    }

    fn selected(&self, selection: &Selection) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| selection.matches(e))
            .map(|(i, _)| i)
            .collect()
    }

    fn for_selected(
        &mut self,
        selection: &Selection,
        mut apply: impl FnMut(&mut PositionlistEntry),
    ) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| selection.matches(e)) {
            apply(entry);
            count += 1;
        }
        count
    }

    pub(crate) fn resolve<'a>(
        &self,
        library: &'a CellLibrary,
        name: &str,
    ) -> Result<&'a LayoutCell, PositionlistError> {
        if !self.cells.contains(name) {
            return Err(PositionlistError::UnboundCell(name.to_string()));
        }
        library
            .get(name)
            .ok_or_else(|| PositionlistError::MissingCell(name.to_string()))
    }

    /// Appends an entry exposing `cell` at `position` (mm) and binds the cell.
    ///
    /// Returns the ID of the new entry.
    pub fn add<C: Cell + ?Sized>(
        &mut self,
        cell: &C,
        position: (f64, f64),
        layers: &[u32],
        dose_factor: f64,
    ) -> Result<usize, PositionlistError> {
        let id = self.entries.len();
        let entry = PositionlistEntry::from_cell(id, cell, position, layers, dose_factor)?;
        self.cells.insert(entry.comment.clone());
        self.entries.push(entry);
        Ok(id)
    }

    /// Drops the selected rows and unbinds cells no remaining row refers to.
    pub fn remove(&mut self, selection: &Selection) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !selection.matches(e));
        let referenced: BTreeSet<&str> = self.entries.iter().map(|e| e.comment.as_str()).collect();
        self.cells.retain(|name| referenced.contains(name.as_str()));
        let removed = before - self.entries.len();
        debug!("Removed {} entr(ies)", removed);
        removed
    }

    /// Points the selected rows at `filename` below the tool's GDSII root.
    pub fn assign_file(&mut self, filename: &str, selection: &Selection) -> usize {
        let path = format!("{}{}", USER_ROOT_GDSII, filename);
        self.for_selected(selection, |e| e.file = Some(path.clone()))
    }

    pub fn translate(
        &mut self,
        (du, dv): (f64, f64),
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        check_finite("Translation offset", &[du, dv])?;
        Ok(self.for_selected(selection, |e| {
            e.u += du;
            e.v += dv;
        }))
    }

    /// Rotates the selected positions counter-clockwise by `angle` radians.
    pub fn rotate(
        &mut self,
        angle: f64,
        pivot: Pivot,
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        check_finite("Rotation angle", &[angle])?;
        if let Pivot::Point(u, v) = pivot {
            check_finite("Rotation pivot", &[u, v])?;
        }
        let indices = self.selected(selection);
        if indices.is_empty() {
            return Ok(0);
        }
        let extent = |f: fn(&PositionlistEntry) -> f64| {
            indices
                .iter()
                .map(|&i| f(&self.entries[i]))
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                    (lo.min(x), hi.max(x))
                })
        };
        let (u_min, u_max) = extent(|e: &PositionlistEntry| e.u);
        let (v_min, v_max) = extent(|e: &PositionlistEntry| e.v);
        let (pu, pv) = match pivot {
            Pivot::Origin => (0.0, 0.0),
            Pivot::Corner => (u_min, v_min),
            Pivot::Center => ((u_min + u_max) / 2.0, (v_min + v_max) / 2.0),
            Pivot::Point(u, v) => (u, v),
        };

        let (sin, cos) = angle.sin_cos();
        for &i in &indices {
            let entry = &mut self.entries[i];
            let (du, dv) = (entry.u - pu, entry.v - pv);
            entry.u = pu + cos * du - sin * dv;
            entry.v = pv + sin * du + cos * dv;
        }
        Ok(indices.len())
    }

    /// Copies the selection onto a `rows` x `cols` grid.
    ///
    /// The copy at grid index `(i, j)` is offset by `i * row_vector +
    /// j * column_vector` and its dose factor is `dose_change` applied
    /// `i * cols + j` times to the source row. Returns the number of new rows.
    pub fn matrix_copy(
        &mut self,
        grid: MatrixCopy,
        dose_change: impl Fn(f64) -> f64,
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        if grid.rows == 0 || grid.cols == 0 {
            return Err(PositionlistError::InvalidMatrix {
                rows: grid.rows,
                cols: grid.cols,
            });
        }
        let indices = self.selected(selection);
        let mut copies = Vec::with_capacity(indices.len() * (grid.rows * grid.cols - 1));

        for i in 0..grid.rows {
            for j in 0..grid.cols {
                if (i, j) == (0, 0) {
                    continue;
                }
                let steps = i * grid.cols + j;
                let du = i as f64 * grid.row_vector.0 + j as f64 * grid.column_vector.0;
                let dv = i as f64 * grid.row_vector.1 + j as f64 * grid.column_vector.1;
                for &k in &indices {
                    let mut copy = self.entries[k].clone();
                    copy.u += du;
                    copy.v += dv;
                    copy.dose_factor = (0..steps).fold(copy.dose_factor, |d, _| dose_change(d));
                    validate_dose_factor(copy.dose_factor)?;
                    copies.push(copy);
                }
            }
        }

        let added = copies.len();
        for mut copy in copies {
            copy.id = self.entries.len();
            self.entries.push(copy);
        }
        debug!(
            "Matrix copy {}x{} added {} entr(ies)",
            grid.rows, grid.cols, added
        );
        Ok(added)
    }

    pub fn set_layer(
        &mut self,
        layers: &[u32],
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        if layers.is_empty() {
            return Err(EntryError::NoLayers.into());
        }
        Ok(self.for_selected(selection, |e| e.layer = layers.to_vec()))
    }

    pub fn set_link(&mut self, link: Option<&str>, selection: &Selection) -> usize {
        self.for_selected(selection, |e| e.link = link.map(str::to_string))
    }

    pub fn set_dose_factor(
        &mut self,
        dose_factor: f64,
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        validate_dose_factor(dose_factor)?;
        Ok(self.for_selected(selection, |e| e.dose_factor = dose_factor))
    }

    /// Sets the area of the selected rows from `[left, bottom, right, top]`.
    pub fn set_area(
        &mut self,
        area: &[f64],
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        let rect = Rect::ordered_from_slice(area)?;
        Ok(self.for_selected(selection, |e| e.area = Some(rect)))
    }

    /// Sets `area` on the selected rows, shifted onto the centre of each
    /// row's cell bounding box.
    pub fn set_area_centered(
        &mut self,
        area: &[f64],
        library: &CellLibrary,
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        let rect = Rect::ordered_from_slice(area)?;
        let updates = self
            .selected(selection)
            .into_iter()
            .map(|i| {
                let name = &self.entries[i].comment;
                let bbox = self
                    .resolve(library, name)?
                    .bounding_box()
                    .ok_or_else(|| PositionlistError::EmptyCell(name.clone()))?;
                let center = bbox.center();
                Ok((i, rect.translated(center.x, center.y)))
            })
            .collect::<Result<Vec<_>, PositionlistError>>()?;
        for &(i, area) in &updates {
            self.entries[i].area = Some(area);
        }
        Ok(updates.len())
    }

    pub fn set_position(
        &mut self,
        (u, v): (f64, f64),
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        if !u.is_finite() || !v.is_finite() {
            return Err(EntryError::NonFinitePosition { u, v }.into());
        }
        Ok(self.for_selected(selection, |e| {
            e.u = u;
            e.v = v;
        }))
    }

    /// Sets the dual-beam stepsizes, enabling their columns if necessary.
    pub fn set_stepsize(
        &mut self,
        (stepsize_u, stepsize_v): (f64, f64),
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        let valid = |s: f64| s.is_finite() && s > 0.0;
        if !valid(stepsize_u) || !valid(stepsize_v) {
            return Err(PositionlistError::InvalidStepsize(stepsize_u, stepsize_v));
        }
        self.stepsize_enabled = true;
        Ok(self.for_selected(selection, |e| {
            e.stepsize_u = Some(stepsize_u);
            e.stepsize_v = Some(stepsize_v);
        }))
    }

    pub fn set_dwelltime(
        &mut self,
        dwelltime: f64,
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        if !dwelltime.is_finite() || dwelltime <= 0.0 {
            return Err(PositionlistError::InvalidDwelltime(dwelltime));
        }
        Ok(self.for_selected(selection, |e| e.dwelltime = Some(dwelltime)))
    }

    pub fn set_option(&mut self, option: Option<StageOption>, selection: &Selection) -> usize {
        self.for_selected(selection, |e| e.options = option)
    }

    /// Enables or disables the dual-beam stepsize columns.
    ///
    /// Disabling clears every stored stepsize and curve-line value.
    pub fn toggle_stepsize(&mut self) {
        self.stepsize_enabled = !self.stepsize_enabled;
        if !self.stepsize_enabled {
            for entry in &mut self.entries {
                entry.stepsize_u = None;
                entry.stepsize_v = None;
                entry.extra.remove(&Column::CurveLine);
            }
        }
        debug!("Stepsize columns enabled: {}", self.stepsize_enabled);
    }

    /// Sets rows without an area (or every row, with `overwrite`) to the
    /// rounded-up bounding box of their cell.
    pub fn update_area(
        &mut self,
        library: &CellLibrary,
        overwrite: bool,
    ) -> Result<usize, PositionlistError> {
        let updates = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| overwrite || e.area.is_none())
            .map(|(i, e)| {
                let bbox = self.resolve(library, &e.comment)?.bounding_box();
                if bbox.is_none() {
                    warn!("Cell '{}' is empty; entry {} keeps no area", e.comment, e.id);
                }
                Ok((i, bbox.map(|b| b.round_up())))
            })
            .collect::<Result<Vec<_>, PositionlistError>>()?;
        let mut updated = 0;
        for (i, area) in updates {
            if area.is_some() {
                self.entries[i].area = area;
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Copies the active working area of each selected row's cell into its area.
    pub fn assign_working_areas(
        &mut self,
        registry: &WorkingAreaRegistry,
        selection: &Selection,
    ) -> Result<usize, PositionlistError> {
        let updates = self
            .selected(selection)
            .into_iter()
            .map(|i| {
                let name = &self.entries[i].comment;
                registry
                    .active_rect(name)
                    .map(|rect| (i, rect))
                    .ok_or_else(|| PositionlistError::MissingWorkingArea(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for &(i, rect) in &updates {
            self.entries[i].area = Some(rect);
        }
        Ok(updates.len())
    }

    /// Binds every referenced cell the library provides.
    ///
    /// Returns the names that remain unbound, sorted.
    pub fn populate_cells(&mut self, library: &CellLibrary) -> Vec<String> {
        let referenced: BTreeSet<&str> = self.entries.iter().map(|e| e.comment.as_str()).collect();
        let mut unbound = Vec::new();
        for name in referenced {
            if library.contains(name) {
                self.cells.insert(name.to_string());
            } else {
                unbound.push(name.to_string());
            }
        }
        if !unbound.is_empty() {
            warn!(
                "{} referenced cell(s) are missing from the library: {}",
                unbound.len(),
                unbound.join(", ")
            );
        }
        unbound
    }

    /// Reorders rows so that row `k` of the result is row `order[k]` now.
    ///
    /// IDs travel with their rows and are not renumbered.
    pub fn reorder(&mut self, order: &[usize]) -> Result<(), PositionlistError> {
        let len = self.entries.len();
        let mut seen = vec![false; len];
        if order.len() != len {
            return Err(PositionlistError::InvalidOrder(len));
        }
        for &i in order {
            if i >= len || std::mem::replace(&mut seen[i], true) {
                return Err(PositionlistError::InvalidOrder(len));
            }
        }
        let mut slots: Vec<Option<PositionlistEntry>> =
            std::mem::take(&mut self.entries).into_iter().map(Some).collect();
        self.entries = order.iter().filter_map(|&i| slots[i].take()).collect();
        Ok(())
    }

    /// Renders the given columns of every row as an aligned text table.
    pub fn table(&self, columns: &[Column]) -> String {
        self.table_of(columns, &Selection::All)
    }

    /// Like [`Positionlist::table`], restricted to the selected rows.
    pub fn table_of(&self, columns: &[Column], selection: &Selection) -> String {
        let rows: Vec<Vec<String>> = self
            .entries
            .iter()
            .filter(|e| selection.matches(e))
            .map(|e| columns.iter().map(|c| e.text(*c)).collect())
            .collect();
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(k, c)| {
                rows.iter()
                    .map(|r| r[k].chars().count())
                    .fold(c.name().len(), usize::max)
            })
            .collect();

        let render = |cells: Vec<String>| {
            let line = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        };
        let mut out = render(columns.iter().map(|c| c.name().to_string()).collect());
        for row in rows {
            out.push('\n');
            out.push_str(&render(row));
        }
        out
    }
}

impl fmt::Display for Positionlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut columns = SUMMARY_COLUMNS.to_vec();
        if self.stepsize_enabled {
            columns.extend([Column::StepsizeU, Column::StepsizeV]);
        }
        f.write_str(&self.table(&columns))
    }
}
