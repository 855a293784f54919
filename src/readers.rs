//! Format-specific decoders for sales data files.

use serde_json::Value;

use std::{fs, io, path::Path};

use crate::{
    error::{Result, SalesError},
    record::RawRecord,
    registry::Registry,
};

/// Decodes a sales data file into raw records.
pub trait RecordReader {
    /// Reads every record in the file at `path`, in file order.
    ///
    /// # Errors
    ///
    /// * [`SalesError::NotFound`] if `path` does not exist
    /// * [`SalesError::UnsupportedFormat`] if the content is not text this
    ///   reader can decode
    /// * [`SalesError::MalformedInput`] if the content breaks the format's
    ///   grammar
    /// * [`SalesError::Io`] for any other read failure
    fn read(&self, path: &Path) -> Result<Vec<RawRecord>>;
}

/// Reads CSV files with a header row. Every field is kept as a string.
#[derive(Debug, Default)]
pub struct CsvReader;

impl RecordReader for CsvReader {
    fn read(&self, path: &Path) -> Result<Vec<RawRecord>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;
        let headers = rdr.headers().map_err(|e| csv_error(path, e))?.clone();
        let mut records = Vec::new();
        for result in rdr.records() {
            let row = result.map_err(|e| csv_error(path, e))?;
            let record: RawRecord = headers
                .iter()
                .zip(row.iter())
                .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
                .collect();
            records.push(record);
        }
        Ok(records)
    }
}

fn csv_error(path: &Path, err: csv::Error) -> SalesError {
    match err.kind() {
        csv::ErrorKind::Io(e) => io_error(path, io::Error::new(e.kind(), e.to_string())),
        csv::ErrorKind::Utf8 { .. } => not_text(path),
        _ => SalesError::malformed(path, &err),
    }
}

/// Reads JSON files whose top-level value is an array of objects.
#[derive(Debug, Default)]
pub struct JsonReader;

impl RecordReader for JsonReader {
    fn read(&self, path: &Path) -> Result<Vec<RawRecord>> {
        let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
        let text = String::from_utf8(bytes).map_err(|_| not_text(path))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| SalesError::malformed(path, e))?;
        let Value::Array(items) = value else {
            return Err(SalesError::malformed(
                path,
                "top-level value must be an array of records",
            ));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(record) => Ok(record),
                _ => Err(SalesError::malformed(path, format!("element {i} is not an object"))),
            })
            .collect()
    }
}

fn io_error(path: &Path, err: io::Error) -> SalesError {
    if err.kind() == io::ErrorKind::NotFound {
        SalesError::NotFound(path.to_path_buf())
    } else {
        SalesError::io(path, err)
    }
}

fn not_text(path: &Path) -> SalesError {
    SalesError::UnsupportedFormat(format!("{}: not UTF-8 text", path.display()))
}

/// Returns a registry with the built-in readers, keyed by file extension.
#[must_use]
pub fn default_readers() -> Registry<dyn RecordReader> {
    let mut readers: Registry<dyn RecordReader> = Registry::new();
    readers.register("csv", Box::new(CsvReader));
    readers.register("json", Box::new(JsonReader));
    readers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_reader_keeps_every_column_as_a_string() {
        let records = CsvReader.read(Path::new("testdata/sales.csv")).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["user_id"], "42");
        assert_eq!(records[0]["price"], "10.00");
        assert_eq!(records[0]["product"], "Widget");
    }

    #[test]
    fn csv_reader_rejects_ragged_rows() {
        let err = CsvReader.read(Path::new("testdata/ragged.csv")).unwrap_err();
        assert!(matches!(err, SalesError::MalformedInput { .. }), "{err}");
    }

    #[test]
    fn json_reader_preserves_value_types() {
        let records = JsonReader.read(Path::new("testdata/sales.json")).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0]["user_id"], 42);
        assert_eq!(records[0]["price"], 10.0);
    }

    #[test]
    fn json_reader_requires_top_level_array() {
        let err = JsonReader.read(Path::new("testdata/object.json")).unwrap_err();
        assert!(matches!(err, SalesError::MalformedInput { .. }), "{err}");
    }

    #[test]
    fn json_reader_rejects_broken_json() {
        let err = JsonReader.read(Path::new("testdata/broken.json")).unwrap_err();
        assert!(matches!(err, SalesError::MalformedInput { .. }), "{err}");
    }

    #[test]
    fn readers_return_not_found_for_missing_files() {
        for reader in [&CsvReader as &dyn RecordReader, &JsonReader] {
            let err = reader.read(Path::new("testdata/bogus")).unwrap_err();
            assert!(matches!(err, SalesError::NotFound(_)), "{err}");
        }
    }
}
