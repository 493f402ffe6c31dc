use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing VOYAGER file formats.
///
/// Implementors handle format-specific parsing and serialization of one
/// in-memory document type; the path helpers open, truncate and buffer
/// files on top of that.
pub trait ToolFile {
    /// The in-memory document stored in this format.
    type Document;

    /// Format-specific options applied when writing.
    type WriteOptions;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a document from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Document, Self::Error>;

    /// Writes a document to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be represented in this format
    /// or writing fails.
    fn write_to(
        document: &Self::Document,
        options: &Self::WriteOptions,
        writer: &mut impl Write,
    ) -> Result<(), Self::Error>;

    /// Reads a document from a file path.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Document, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a document to a file path, replacing any previous content.
    fn write_to_path<P: AsRef<Path>>(
        document: &Self::Document,
        options: &Self::WriteOptions,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(document, options, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
