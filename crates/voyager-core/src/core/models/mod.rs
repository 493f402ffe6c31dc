//! The in-memory positionlist model and the data it is built from.

pub mod column;
pub mod entry;
pub mod positionlist;
pub mod selection;
pub mod working_area;

pub use column::Column;
pub use entry::{EntryError, PositionlistEntry, StageOption};
pub use positionlist::{MatrixCopy, Pivot, Positionlist, PositionlistError};
pub use selection::{Selection, SelectionError};
pub use working_area::{WorkingAreaError, WorkingAreaRegistry, WorkingAreaSet};
