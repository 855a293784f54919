//! Format-specific encoders for user reports.

use csv::{ErrorKind, Writer};
use serde::Serialize;

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use crate::{
    error::{Result, SalesError},
    registry::Registry,
    report::UserReport,
};

/// The header row of CSV reports.
pub const CSV_HEADER: [&str; 4] = ["Period", "Total Sales", "Average Sale", "Number of Sales"];

/// Encodes a [`UserReport`] to a file, replacing any existing content.
pub trait ReportWriter {
    /// # Errors
    ///
    /// Returns [`SalesError::Io`] if the file cannot be created or written.
    fn write(&self, report: &UserReport, path: &Path) -> Result<()>;
}

/// Writes the whole report as pretty-printed JSON, monthly detail included.
#[derive(Debug, Default)]
pub struct JsonWriter;

impl ReportWriter for JsonWriter {
    fn write(&self, report: &UserReport, path: &Path) -> Result<()> {
        write_json(report, path)
    }
}

/// Writes `value` to `path` as pretty-printed JSON with a trailing newline.
///
/// # Errors
///
/// Returns [`SalesError::Io`] if the file cannot be created or written.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| SalesError::io(path, e))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)
        .map_err(|e| SalesError::io(path, io::Error::from(e)))?;
    out.write_all(b"\n").map_err(|e| SalesError::io(path, e))?;
    out.flush().map_err(|e| SalesError::io(path, e))
}

/// Writes one row per bucket: monthly rows, then yearly rows, each in period
/// order. Monthly detail is left out.
#[derive(Debug, Default)]
pub struct CsvWriter;

impl ReportWriter for CsvWriter {
    fn write(&self, report: &UserReport, path: &Path) -> Result<()> {
        let io_err = |e: csv::Error| SalesError::io(path, csv_io(e));
        let mut wtr = Writer::from_path(path).map_err(io_err)?;
        wtr.write_record(CSV_HEADER).map_err(io_err)?;
        for (period, bucket) in report.rows() {
            wtr.write_record([
                period.to_string(),
                bucket.total.to_string(),
                format!("{:.2}", bucket.average),
                bucket.count.to_string(),
            ])
            .map_err(io_err)?;
        }
        wtr.flush().map_err(|e| SalesError::io(path, e))
    }
}

fn csv_io(err: csv::Error) -> io::Error {
    match err.into_kind() {
        ErrorKind::Io(e) => e,
        kind => io::Error::other(format!("{kind:?}")),
    }
}

/// Returns a registry with the built-in writers, keyed by output type.
#[must_use]
pub fn default_writers() -> Registry<dyn ReportWriter> {
    let mut writers: Registry<dyn ReportWriter> = Registry::new();
    writers.register("json", Box::new(JsonWriter));
    writers.register("csv", Box::new(CsvWriter));
    writers
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{money::Money, record::RawRecord, report::PeriodBucket};

    fn sample_report() -> UserReport {
        let serde_json::Value::Object(item) =
            json!({"user_id": 42, "date": "2024-01-05", "price": 10, "quantity": 2, "product": "Widget"})
        else {
            unreachable!()
        };
        let mut report = UserReport::new("42");
        let mut jan = PeriodBucket::detailed();
        jan.add(Money::from_cents(2000), &item);
        jan.add(Money::from_cents(500), &RawRecord::new());
        let mut feb = PeriodBucket::detailed();
        feb.add(Money::from_cents(1999), &item);
        let mut year = PeriodBucket::default();
        year.add(Money::from_cents(4499), &item);
        for bucket in [&mut jan, &mut feb, &mut year] {
            bucket.finalize();
        }
        report.monthly.insert("2024-02".into(), feb);
        report.monthly.insert("2024-01".into(), jan);
        report.yearly.insert("2024".into(), year);
        report.total_sales = 3;
        report.total_revenue = Money::from_cents(4499);
        report
    }

    #[test]
    fn json_writer_output_parses_back_to_the_same_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = sample_report();
        JsonWriter.write(&report, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: UserReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, report);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["monthly"]["2024-01"]["total"], 25.0);
        assert_eq!(value["monthly"]["2024-01"]["items"][0]["product"], "Widget");
        assert!(value["yearly"]["2024"].get("items").is_none());
    }

    #[test]
    fn csv_writer_emits_monthly_rows_then_yearly_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        CsvWriter.write(&sample_report(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Period,Total Sales,Average Sale,Number of Sales\n\
             2024-01,25.00,12.50,2\n\
             2024-02,19.99,19.99,1\n\
             2024,44.99,44.99,1\n"
        );
    }

    #[test]
    fn writers_report_io_failure_for_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("report.out");
        for writer in [&JsonWriter as &dyn ReportWriter, &CsvWriter] {
            let err = writer.write(&sample_report(), &path).unwrap_err();
            assert!(matches!(err, SalesError::Io { .. }), "{err}");
        }
    }

    #[test]
    fn default_writers_rejects_unknown_output_type() {
        let writers = default_writers();
        assert!(writers.supports("csv"));
        assert!(matches!(
            writers.get("xml"),
            Err(SalesError::UnsupportedFormat(_))
        ));
    }
}
