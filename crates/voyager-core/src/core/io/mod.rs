//! Reading and writing the text formats understood by the VOYAGER.
//!
//! Both formats share the [`traits::ToolFile`] interface: a positionlist is
//! stored as a `.pls` file ([`pls`]) and the working areas of a set of cells
//! as a `.wor` file ([`wor`]).

pub mod pls;
pub mod traits;
pub mod wor;
