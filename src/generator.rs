use tracing::{error, info, warn};

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    analyzer::SalesAnalyzer,
    error::{Result, SalesError},
    preferences::Preferences,
    record::{InvalidRecord, RawRecord},
    registry::Registry,
    stats::DatasetStats,
    writers::{default_writers, write_json, ReportWriter},
};

/// The file name of the dataset summary, see [`ReportGenerator::write_summary`].
pub const SUMMARY_FILE: &str = "summary.json";

/// What happened to one user in a call to [`ReportGenerator::generate`].
#[derive(Debug)]
pub enum Outcome {
    /// The report was written to `path`. `invalid_records` lists the records
    /// skipped if the report had to be computed for this batch.
    Written {
        user_id: String,
        path: PathBuf,
        invalid_records: Vec<InvalidRecord>,
    },
    /// No report was written: the user has no sales, or the configured
    /// output type has no writer.
    Skipped { user_id: String, reason: SalesError },
    /// Writing the report failed.
    Failed { user_id: String, error: SalesError },
}

impl Outcome {
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::Written { user_id, .. }
            | Self::Skipped { user_id, .. }
            | Self::Failed { user_id, .. } => user_id,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }
}

/// Tallies of a batch of [`Outcome`]s.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchStats {
    #[must_use]
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Written { .. } => stats.written += 1,
                Outcome::Skipped { .. } => stats.skipped += 1,
                Outcome::Failed { .. } => stats.failed += 1,
            }
        }
        stats
    }
}

/// Writes user reports to files, one per user, in the configured output type.
pub struct ReportGenerator {
    writers: Registry<dyn ReportWriter>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::with_writers(default_writers())
    }
}

impl ReportGenerator {
    /// Creates a generator that can write `json` and `csv` reports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_writers(writers: Registry<dyn ReportWriter>) -> Self {
        Self { writers }
    }

    /// Adds (or replaces) the writer used for `output_type`.
    pub fn register_writer(&mut self, output_type: &str, writer: Box<dyn ReportWriter>) {
        self.writers.register(output_type, writer);
    }

    /// Returns the report file path for `user_id` under `output_dir`.
    ///
    /// Path separators in `user_id` are percent-encoded, along with `%`
    /// itself, so distinct ids always map to distinct files inside
    /// `output_dir`.
    #[must_use]
    pub fn report_path(output_dir: &Path, user_id: &str, output_type: &str) -> PathBuf {
        let user_id = escape_file_stem(user_id);
        let output_type = output_type.trim().to_ascii_lowercase();
        output_dir.join(format!("sales_report_{user_id}.{output_type}"))
    }

    /// Writes a report for each of `user_ids`, or for every user already in
    /// `analyzer`'s cache if `user_ids` is `None`.
    ///
    /// Users without a cached report are processed from `records` first.
    /// Each user's result is returned as an [`Outcome`]; a user with no
    /// sales, an unsupported output type, or a failed write never stops the
    /// rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::Io`] if `output_dir` cannot be created.
    pub fn generate(
        &self,
        analyzer: &mut SalesAnalyzer,
        records: &[RawRecord],
        prefs: &Preferences,
        output_dir: &Path,
        user_ids: Option<&[String]>,
    ) -> Result<Vec<Outcome>> {
        fs::create_dir_all(output_dir).map_err(|e| SalesError::io(output_dir, e))?;
        let targets = match user_ids {
            Some(ids) => ids.to_vec(),
            None => analyzer.user_ids(),
        };
        if targets.is_empty() {
            warn!("no users to report on");
        }
        let mut outcomes = Vec::with_capacity(targets.len());
        for user_id in &targets {
            let user_id = user_id.trim();
            let mut invalid_records = Vec::new();
            if analyzer.report(user_id).is_none() {
                match analyzer.process_user(records, user_id, &prefs.date_format) {
                    Ok(processed) => invalid_records = processed.invalid,
                    Err(reason) => {
                        warn!("skipping report for user {user_id}: {reason}");
                        outcomes.push(Outcome::Skipped {
                            user_id: user_id.to_string(),
                            reason,
                        });
                        continue;
                    }
                }
            }
            let Some(report) = analyzer.report(user_id) else {
                continue;
            };
            let writer = match self.writers.get(&prefs.output_type) {
                Ok(writer) => writer,
                Err(reason) => {
                    warn!("skipping report for user {user_id}: {reason}");
                    outcomes.push(Outcome::Skipped {
                        user_id: user_id.to_string(),
                        reason,
                    });
                    continue;
                }
            };
            let path = Self::report_path(output_dir, user_id, &prefs.output_type);
            match writer.write(report, &path) {
                Ok(()) => {
                    info!("wrote report for user {user_id} to {}", path.display());
                    outcomes.push(Outcome::Written {
                        user_id: user_id.to_string(),
                        path,
                        invalid_records,
                    });
                }
                Err(e) => {
                    error!("failed to write report for user {user_id}: {e}");
                    outcomes.push(Outcome::Failed {
                        user_id: user_id.to_string(),
                        error: e,
                    });
                }
            }
        }
        let stats = BatchStats::from_outcomes(&outcomes);
        info!(
            "batch complete: {} written, {} skipped, {} failed",
            stats.written, stats.skipped, stats.failed
        );
        Ok(outcomes)
    }

    /// Writes `stats` as JSON to [`SUMMARY_FILE`] in `output_dir`, creating the
    /// directory if needed. The summary is always JSON, whatever the
    /// configured output type.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::Io`] if the directory or file cannot be written.
    pub fn write_summary(&self, stats: &DatasetStats, output_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(output_dir).map_err(|e| SalesError::io(output_dir, e))?;
        let path = output_dir.join(SUMMARY_FILE);
        write_json(stats, &path)?;
        info!("wrote dataset summary to {}", path.display());
        Ok(path)
    }
}

fn escape_file_stem(user_id: &str) -> String {
    let mut stem = String::with_capacity(user_id.len());
    for c in user_id.chars() {
        match c {
            '%' => stem.push_str("%25"),
            '/' => stem.push_str("%2F"),
            '\\' => stem.push_str("%5C"),
            c => stem.push(c),
        }
    }
    stem
}
